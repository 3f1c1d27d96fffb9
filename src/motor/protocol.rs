// Register-addressed bus capability shared by every motor on the gimbal
//
// A transport only has to move bytes in and out of device registers; the
// meaning of each register lives in the motor driver.

use std::sync::{Arc, Mutex};

/// Error types for bus transactions
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    DeviceError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Addressed register access on a shared half-duplex bus
pub trait Protocol {
    /// Check that the device at `id` answers
    fn ping(&mut self, id: u8) -> Result<()>;

    /// Read `len` bytes starting at `address`
    fn read_register(&mut self, id: u8, address: u16, len: u16) -> Result<Vec<u8>>;

    /// Write `data` starting at `address`, waiting for the device to acknowledge
    fn write_register(&mut self, id: u8, address: u16, data: &[u8]) -> Result<()>;
}

/// One bus, one gate: every motor on the bus holds a clone of this handle and
/// locks it for the duration of a single transaction.
pub type SharedBus<P> = Arc<Mutex<P>>;

/// Wrap a transport so several motors can share it
pub fn shared<P: Protocol>(bus: P) -> SharedBus<P> {
    Arc::new(Mutex::new(bus))
}
