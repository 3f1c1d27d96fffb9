// Gimbal joints, raw position constants, and the motion phases built from them
//
// Positions are raw device units on a 0..4095 full-turn scale. The angle
// constants are fixed offsets on that scale, not a unit conversion.

use crate::messages::PhaseKind;

pub const CENTER: u32 = 2048;
pub const DEG_45: u32 = 512;
pub const DEG_90: u32 = 1024;
pub const DEG_180: u32 = 2048;

/// Motor IDs for the gimbal (as configured in the motors)
pub const MOTOR_ID_YAW: u8 = 1;
pub const MOTOR_ID_PITCH: u8 = 2;
pub const MOTOR_ID_ROLL: u8 = 3;

/// Gimbal axes, in rig order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Yaw,
    Pitch,
    Roll,
}

impl Joint {
    pub const ALL: [Joint; 3] = [Joint::Yaw, Joint::Pitch, Joint::Roll];

    /// Bus address of the joint's motor
    pub fn id(self) -> u8 {
        match self {
            Joint::Yaw => MOTOR_ID_YAW,
            Joint::Pitch => MOTOR_ID_PITCH,
            Joint::Roll => MOTOR_ID_ROLL,
        }
    }

    /// Half-width of the joint's sweep around center
    pub fn sweep_amplitude(self) -> u32 {
        match self {
            Joint::Yaw | Joint::Roll => DEG_90,
            Joint::Pitch => DEG_45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waypoint {
    pub joint: Joint,
    pub position: u32,
}

impl Waypoint {
    pub fn new(joint: Joint, position: u32) -> Self {
        Self { joint, position }
    }
}

/// An ordered list of moves, each completed before the next is issued
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPhase {
    pub kind: PhaseKind,
    pub waypoints: Vec<Waypoint>,
}

impl MotionPhase {
    /// Every joint to center
    pub fn home() -> Self {
        Self {
            kind: PhaseKind::Home,
            waypoints: Joint::ALL
                .iter()
                .map(|&joint| Waypoint::new(joint, CENTER))
                .collect(),
        }
    }

    /// Each joint in turn: center - amplitude, center + amplitude, center
    pub fn sweep() -> Self {
        let waypoints = Joint::ALL
            .iter()
            .flat_map(|&joint| {
                let amplitude = joint.sweep_amplitude();
                [CENTER - amplitude, CENTER + amplitude, CENTER]
                    .map(|position| Waypoint::new(joint, position))
            })
            .collect();

        Self {
            kind: PhaseKind::RunPattern,
            waypoints,
        }
    }

    /// Pitch half a turn down from center
    pub fn unload() -> Self {
        Self {
            kind: PhaseKind::Unload,
            waypoints: vec![Waypoint::new(Joint::Pitch, CENTER - DEG_180)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_centers_every_joint_in_rig_order() {
        let phase = MotionPhase::home();
        assert_eq!(phase.kind, PhaseKind::Home);
        assert_eq!(
            phase.waypoints,
            vec![
                Waypoint::new(Joint::Yaw, 2048),
                Waypoint::new(Joint::Pitch, 2048),
                Waypoint::new(Joint::Roll, 2048),
            ]
        );
    }

    #[test]
    fn test_sweep_waypoints() {
        let positions: Vec<(Joint, u32)> = MotionPhase::sweep()
            .waypoints
            .iter()
            .map(|w| (w.joint, w.position))
            .collect();
        assert_eq!(
            positions,
            vec![
                (Joint::Yaw, 1024),
                (Joint::Yaw, 3072),
                (Joint::Yaw, 2048),
                (Joint::Pitch, 1536),
                (Joint::Pitch, 2560),
                (Joint::Pitch, 2048),
                (Joint::Roll, 1024),
                (Joint::Roll, 3072),
                (Joint::Roll, 2048),
            ]
        );
    }

    #[test]
    fn test_unload_moves_pitch_to_zero() {
        let phase = MotionPhase::unload();
        assert_eq!(phase.waypoints, vec![Waypoint::new(Joint::Pitch, 0)]);
    }

    #[test]
    fn test_joint_ids() {
        let ids: Vec<u8> = Joint::ALL.iter().map(|j| j.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
