// Drives the gimbal rig through its motion phases
//
// Arm always runs; Home, Run pattern, and Unload follow in that order when
// enabled. One motor operation at a time, and the first failure ends the run.

use tracing::info;

use crate::config::Config;
use crate::messages::{PhaseKind, RunSummary};
use crate::motion::{Joint, MotionPhase};
use crate::motor::{Motor, MotorError, PollPolicy, Protocol, SharedBus};

/// Yaw, pitch and roll motors sharing one bus
pub struct Rig<P> {
    yaw: Motor<P>,
    pitch: Motor<P>,
    roll: Motor<P>,
    poll: PollPolicy,
}

impl<P: Protocol> Rig<P> {
    pub fn new(bus: SharedBus<P>, poll: PollPolicy) -> Self {
        let motor = |joint: Joint| Motor::with_policy(bus.clone(), joint.id(), poll.clone());
        Self {
            yaw: motor(Joint::Yaw),
            pitch: motor(Joint::Pitch),
            roll: motor(Joint::Roll),
            poll,
        }
    }

    pub fn motor(&self, joint: Joint) -> &Motor<P> {
        match joint {
            Joint::Yaw => &self.yaw,
            Joint::Pitch => &self.pitch,
            Joint::Roll => &self.roll,
        }
    }

    /// Motors in rig order
    pub fn motors(&self) -> [&Motor<P>; 3] {
        [&self.yaw, &self.pitch, &self.roll]
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }
}

pub struct Sequencer<P> {
    rig: Rig<P>,
    config: Config,
}

impl<P: Protocol> Sequencer<P> {
    pub fn new(rig: Rig<P>, config: Config) -> Self {
        Self { rig, config }
    }

    pub fn rig(&self) -> &Rig<P> {
        &self.rig
    }

    /// Run every enabled phase to completion
    pub fn run(&self) -> Result<RunSummary, MotorError> {
        let mut summary = RunSummary::default();

        self.arm()?;
        summary.phases.push(PhaseKind::Arm);

        let phases: [(bool, PhaseKind, fn(&Self) -> Result<usize, MotorError>); 3] = [
            (self.config.home, PhaseKind::Home, Self::home),
            (self.config.run, PhaseKind::RunPattern, Self::run_pattern),
            (self.config.unload, PhaseKind::Unload, Self::unload),
        ];
        for (enabled, kind, phase) in phases {
            if enabled {
                summary.moves += phase(self)?;
                summary.phases.push(kind);
            }
        }

        Ok(summary)
    }

    /// Ping each motor, enable torque, and load the motion profile
    pub fn arm(&self) -> Result<(), MotorError> {
        info!(
            "Arming motors (velocity={}, acceleration={})",
            self.config.velocity, self.config.acceleration
        );

        for motor in self.rig.motors() {
            motor.ping()?;
            motor.set_torque_enable(true)?;
            motor.set_profile_velocity(self.config.velocity)?;
            motor.set_profile_acceleration(self.config.acceleration)?;
        }
        Ok(())
    }

    pub fn home(&self) -> Result<usize, MotorError> {
        self.apply(&MotionPhase::home())
    }

    pub fn run_pattern(&self) -> Result<usize, MotorError> {
        self.apply(&MotionPhase::sweep())
    }

    pub fn unload(&self) -> Result<usize, MotorError> {
        self.apply(&MotionPhase::unload())
    }

    /// Execute a phase move by move, returning how many moves completed
    fn apply(&self, phase: &MotionPhase) -> Result<usize, MotorError> {
        info!("Starting {:?} ({} moves)", phase.kind, phase.waypoints.len());

        for waypoint in &phase.waypoints {
            let motor = self.rig.motor(waypoint.joint);
            if self.rig.poll_policy().cancel.is_cancelled() {
                return Err(MotorError::Cancelled { id: motor.id() });
            }
            motor.set_goal_position_and_wait_for_stop(waypoint.position)?;
        }
        Ok(phase.waypoints.len())
    }
}
