//! Unified error types for the mesh node firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! dispatcher's error handling uniform.  All variants are `Copy` so they can
//! be passed out of interrupt context and through the sensor state machine
//! without allocation.

use core::fmt;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An I2C transfer terminated with a non-success status.
    I2c(TransferError),
    /// The persistent-storage collaborator rejected an operation.
    Storage(StorageError),
    /// A vendor-stack command returned a non-zero result code.
    Stack(StackError),
    /// Configuration is invalid.
    Config(&'static str),
    /// A transfer was requested while another one is still in flight.
    Busy,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I2c(e) => write!(f, "i2c: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Stack(e) => write!(f, "stack: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Busy => write!(f, "transfer already in flight"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// I2C transfer errors
// ---------------------------------------------------------------------------

/// Terminal non-success statuses reported by the I2C peripheral.
///
/// The numeric codes follow the vendor transfer-status numbering so a log
/// line can be matched against the reference manual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    /// No acknowledge received from the addressed device.
    Nack,
    /// Misplaced START/STOP detected on the bus.
    BusError,
    /// Another master won arbitration.
    ArbitrationLost,
    /// Peripheral used incorrectly (e.g. transfer started while busy).
    UsageFault,
    /// Driver-level fault.
    SoftwareFault,
}

impl TransferError {
    /// Vendor transfer-status code (always negative).
    pub const fn code(self) -> i8 {
        match self {
            Self::Nack => -1,
            Self::BusError => -2,
            Self::ArbitrationLost => -3,
            Self::UsageFault => -4,
            Self::SoftwareFault => -5,
        }
    }

    /// Map a raw vendor status back to an error.  Unknown negative values
    /// collapse to `SoftwareFault`; non-negative values are not errors.
    pub const fn from_code(code: i8) -> Option<Self> {
        match code {
            0.. => None,
            -1 => Some(Self::Nack),
            -2 => Some(Self::BusError),
            -3 => Some(Self::ArbitrationLost),
            -4 => Some(Self::UsageFault),
            _ => Some(Self::SoftwareFault),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack => write!(f, "NACK ({})", self.code()),
            Self::BusError => write!(f, "bus error ({})", self.code()),
            Self::ArbitrationLost => write!(f, "arbitration lost ({})", self.code()),
            Self::UsageFault => write!(f, "usage fault ({})", self.code()),
            Self::SoftwareFault => write!(f, "software fault ({})", self.code()),
        }
    }
}

impl embedded_hal::i2c::Error for TransferError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Self::BusError => ErrorKind::Bus,
            Self::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Self::UsageFault | Self::SoftwareFault => ErrorKind::Other,
        }
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Self::I2c(e)
    }
}

// ---------------------------------------------------------------------------
// Persistent storage errors
// ---------------------------------------------------------------------------

/// Errors from the persistent-store collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The flash operation failed; the record is unreadable but repairable
    /// by rewriting it.
    OperationFailed,
    /// Storage region is full.
    Full,
    /// Any other vendor result code.
    Other(u16),
}

impl StorageError {
    /// Vendor persistent-store result code.
    pub const fn code(self) -> u16 {
        match self {
            Self::OperationFailed => 0x0502,
            Self::Full => 0x0501,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperationFailed => write!(f, "operation failed"),
            Self::Full => write!(f, "storage full"),
            Self::Other(code) => write!(f, "result 0x{code:04x}"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Vendor stack command errors
// ---------------------------------------------------------------------------

/// Non-zero result code returned by a vendor-stack command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackError(pub u16);

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result 0x{:04x}", self.0)
    }
}

impl From<StackError> for Error {
    fn from(e: StackError) -> Self {
        Self::Stack(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
