//! The status taxonomy shared by every fallible operation in this crate.

use thiserror::Error;

/// The error half of every fallible operation.
///
/// Success and end-of-enumeration are expressed through `Ok(..)` and
/// iterator exhaustion; everything else maps onto one of these variants.
#[derive(Debug, Error)]
pub enum Error {
    /// The device does not record the requested field, or the operation
    /// does not apply to this model.
    #[error("not supported by this model")]
    Unsupported,

    /// An argument is out of range (bad fingerprint size, unknown model
    /// code, calibration on the wrong family).
    #[error("invalid arguments")]
    InvalidArgs,

    /// No device is present on the other end of the port.
    #[error("no device found")]
    NoDevice,

    /// The port or device refused access.
    #[error("access denied")]
    NoAccess,

    /// An unrecoverable transport error.
    #[error("input/output error")]
    Io(#[from] std::io::Error),

    /// The receive deadline expired. Transient inside a transfer's retry
    /// budget.
    #[error("timeout receiving data")]
    Timeout,

    /// A reply violated the framing rules (bad start byte, length,
    /// checksum, ACK/NAK code). Transient inside a transfer's retry budget.
    #[error("protocol violation")]
    Protocol,

    /// The dive data does not match the layout this parser expects:
    /// undersized records, backwards timestamps, broken ringbuffer
    /// pointers, out-of-range BCD digits.
    #[error("malformed dive data")]
    DataFormat,

    /// The operation observed the context's cancellation signal.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Whether a packetized transfer may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout | Error::Protocol)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
