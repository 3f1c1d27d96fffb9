// Motor control module for the gimbal
//
// Provides:
// - The register-access capability shared by all motors on one bus
// - Dynamixel Protocol 2.0 serial transport
// - Single-actuator driver with the wait-for-stop polling loop

mod driver;
pub mod dynamixel;
pub mod protocol;

pub use driver::{CancelToken, Motor, MotorError, PollPolicy, Register};
pub use dynamixel::DynamixelBus;
pub use protocol::{BusError, Protocol, SharedBus, shared};
