// Single-actuator driver
//
// Every call is a live register transaction on the shared bus. The motor keeps
// no copy of device state between calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::protocol::{BusError, Protocol, SharedBus};
use crate::config::POLL_INTERVAL;

/// Control-table registers used by the gimbal (X-series layout)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    TorqueEnable = 64,         // 1 byte: 0=off, 1=on
    ProfileAcceleration = 108, // 4 bytes
    ProfileVelocity = 112,     // 4 bytes
    GoalPosition = 116,        // 4 bytes
    Moving = 122,              // 1 byte, read-only: 0=stopped
}

impl Register {
    pub fn address(self) -> u16 {
        self as u16
    }

    /// Width in bytes
    pub fn width(self) -> u16 {
        match self {
            Register::TorqueEnable | Register::Moving => 1,
            Register::ProfileAcceleration | Register::ProfileVelocity | Register::GoalPosition => 4,
        }
    }

    /// Little-endian encoding of `value`, truncated to the register width
    pub fn encode(self, value: u32) -> Vec<u8> {
        value.to_le_bytes()[..self.width() as usize].to_vec()
    }

    /// Inverse of `encode`; `None` when `bytes` is not exactly register-sized
    pub fn decode(self, bytes: &[u8]) -> Option<u32> {
        if bytes.len() != self.width() as usize {
            return None;
        }
        let mut le = [0u8; 4];
        le[..bytes.len()].copy_from_slice(bytes);
        Some(u32::from_le_bytes(le))
    }
}

/// Error types for motor operations
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("Ping failed for motor {id}: {source}")]
    PingFailure { id: u8, source: BusError },

    #[error(
        "Failed to write motor {id}, addr={addr}, value={value}: {source}",
        addr = .register.address()
    )]
    Write {
        id: u8,
        register: Register,
        value: u32,
        source: BusError,
    },

    #[error(
        "Failed to read motor {id}, addr={addr}, len={len}: {source}",
        addr = .register.address(),
        len = .register.width()
    )]
    Read {
        id: u8,
        register: Register,
        source: BusError,
    },

    #[error("Motor {id} still moving after {elapsed:?}")]
    WaitTimeout { id: u8, elapsed: Duration },

    #[error("Cancelled while commanding motor {id}")]
    Cancelled { id: u8 },
}

impl MotorError {
    /// True for failures of the bus transaction itself
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            MotorError::PingFailure { .. } | MotorError::Write { .. } | MotorError::Read { .. }
        )
    }
}

/// Shared stop signal for a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How `wait_for_stop` polls the moving flag
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the motor stops, however long that takes
    pub deadline: Option<Duration>,
    pub cancel: CancelToken,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            deadline: None,
            cancel: CancelToken::new(),
        }
    }
}

/// One addressable actuator on the bus
pub struct Motor<P> {
    id: u8,
    bus: SharedBus<P>,
    poll: PollPolicy,
}

impl<P> Clone for Motor<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            bus: Arc::clone(&self.bus),
            poll: self.poll.clone(),
        }
    }
}

impl<P: Protocol> Motor<P> {
    pub fn new(bus: SharedBus<P>, id: u8) -> Self {
        Self::with_policy(bus, id, PollPolicy::default())
    }

    pub fn with_policy(bus: SharedBus<P>, id: u8, poll: PollPolicy) -> Self {
        Self { id, bus, poll }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Check the device answers; no retry
    pub fn ping(&self) -> Result<(), MotorError> {
        self.bus
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .ping(self.id)
            .map_err(|source| MotorError::PingFailure {
                id: self.id,
                source,
            })
    }

    pub fn set_torque_enable(&self, enabled: bool) -> Result<(), MotorError> {
        self.write(Register::TorqueEnable, u32::from(enabled))
    }

    pub fn set_profile_acceleration(&self, acceleration: u32) -> Result<(), MotorError> {
        self.write(Register::ProfileAcceleration, acceleration)
    }

    pub fn set_profile_velocity(&self, velocity: u32) -> Result<(), MotorError> {
        self.write(Register::ProfileVelocity, velocity)
    }

    /// Command a move to a raw position (0..4095 per turn)
    pub fn set_goal_position(&self, position: u32) -> Result<(), MotorError> {
        info!("Setting goal position of {} to {}", self.id, position);
        self.write(Register::GoalPosition, position)
    }

    /// Command a move and block until the motor reports stopped
    pub fn set_goal_position_and_wait_for_stop(&self, position: u32) -> Result<(), MotorError> {
        self.set_goal_position(position)?;
        self.wait_for_stop()
    }

    /// Poll the moving flag until it reads zero
    ///
    /// Only reads are issued. Any non-zero value means "still moving". With the
    /// default policy there is no deadline: a motor that never stops blocks
    /// the caller until the token is cancelled.
    pub fn wait_for_stop(&self) -> Result<(), MotorError> {
        info!("Waiting for {} to stop", self.id);
        let started = Instant::now();

        loop {
            let moving = self.read(Register::Moving)?;
            if moving == 0 {
                debug!("Motor {} stopped after {:?}", self.id, started.elapsed());
                return Ok(());
            }

            if self.poll.cancel.is_cancelled() {
                return Err(MotorError::Cancelled { id: self.id });
            }

            let elapsed = started.elapsed();
            if self.poll.deadline.is_some_and(|deadline| elapsed >= deadline) {
                return Err(MotorError::WaitTimeout {
                    id: self.id,
                    elapsed,
                });
            }

            sleep(self.poll.interval);
        }
    }

    fn write(&self, register: Register, value: u32) -> Result<(), MotorError> {
        debug!("Write {:?} of motor {}: {}", register, self.id, value);
        self.bus
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .write_register(self.id, register.address(), &register.encode(value))
            .map_err(|source| MotorError::Write {
                id: self.id,
                register,
                value,
                source,
            })
    }

    fn read(&self, register: Register) -> Result<u32, MotorError> {
        let bytes = self
            .bus
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .read_register(self.id, register.address(), register.width())
            .map_err(|source| MotorError::Read {
                id: self.id,
                register,
                source,
            })?;

        register.decode(&bytes).ok_or_else(|| MotorError::Read {
            id: self.id,
            register,
            source: BusError::InvalidResponse {
                id: self.id,
                reason: format!(
                    "Expected {} bytes, got {}",
                    register.width(),
                    bytes.len()
                ),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_map() {
        assert_eq!(Register::TorqueEnable.address(), 64);
        assert_eq!(Register::ProfileAcceleration.address(), 108);
        assert_eq!(Register::ProfileVelocity.address(), 112);
        assert_eq!(Register::GoalPosition.address(), 116);
        assert_eq!(Register::Moving.address(), 122);

        assert_eq!(Register::TorqueEnable.width(), 1);
        assert_eq!(Register::GoalPosition.width(), 4);
        assert_eq!(Register::Moving.width(), 1);
    }

    #[test]
    fn test_four_byte_encoding_is_little_endian() {
        assert_eq!(Register::GoalPosition.encode(2048), vec![0x00, 0x08, 0x00, 0x00]);
        assert_eq!(
            Register::ProfileVelocity.encode(0x1234_5678),
            vec![0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(Register::TorqueEnable.encode(1), vec![0x01]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for value in [0, 1, 50, 2048, 4095, 0x00FF_FF00, u32::MAX] {
            let reg = Register::GoalPosition;
            assert_eq!(reg.decode(&reg.encode(value)), Some(value));
        }
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        assert_eq!(Register::Moving.decode(&[]), None);
        assert_eq!(Register::Moving.decode(&[1, 0]), None);
        assert_eq!(Register::GoalPosition.decode(&[0, 8]), None);
    }

    #[test]
    fn test_error_display_names_motor_and_address() {
        let err = MotorError::Write {
            id: 2,
            register: Register::GoalPosition,
            value: 1536,
            source: BusError::Timeout { id: 2 },
        };
        let msg = err.to_string();
        assert!(msg.contains("motor 2"), "{msg}");
        assert!(msg.contains("addr=116"), "{msg}");
        assert!(msg.contains("Timeout"), "{msg}");
        assert!(err.is_communication());

        assert!(!MotorError::Cancelled { id: 1 }.is_communication());
    }
}
