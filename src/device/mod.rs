//! The device layer: serial transport contract and the per-family
//! download protocols.
//!
//! A device owns its port for its whole lifetime; dropping the device
//! closes the port. All blocking happens here; parsers never touch I/O.

use std::time::Duration;

use crate::error::{Error, Result};

pub mod idive;
pub mod suunto_common2;

pub use idive::IdiveDevice;
pub use suunto_common2::{Common2Device, Common2Layout, Common2Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Hardware,
    Software,
}

/// Which queue to discard in [`SerialPort::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
    Both,
}

/// The serial transport a device drives. Implemented outside this crate
/// (or by test doubles); the library never opens ports itself.
///
/// `read` and `write` return the number of bytes actually transferred;
/// a count short of the request means the receive deadline expired.
pub trait SerialPort {
    fn configure(
        &mut self,
        baudrate: u32,
        databits: u8,
        parity: Parity,
        stopbits: u8,
        flowcontrol: FlowControl,
    ) -> Result<()>;

    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buffer: &[u8]) -> Result<usize>;

    fn flush(&mut self, direction: Direction) -> Result<()>;

    /// Block the calling thread; devices use this to pace retries and to
    /// let the hardware settle after opening the port.
    fn sleep(&mut self, duration: Duration);
}

/// Fill `buffer` completely or report the shortfall as a timeout.
pub(crate) fn read_exact<P: SerialPort>(port: &mut P, buffer: &mut [u8]) -> Result<()> {
    let n = port.read(buffer)?;
    if n != buffer.len() {
        return Err(Error::Timeout);
    }
    Ok(())
}

/// Drain `buffer` completely or report the shortfall as a timeout.
pub(crate) fn write_all<P: SerialPort>(port: &mut P, buffer: &[u8]) -> Result<()> {
    let n = port.write(buffer)?;
    if n != buffer.len() {
        return Err(Error::Timeout);
    }
    Ok(())
}

/// Run `attempt` until it succeeds, a non-transient error surfaces, or the
/// retry budget is spent. `before_retry` runs between attempts (delays,
/// queue flushes). `state` is threaded through so both closures can borrow
/// the same device mutably.
pub(crate) fn retry<S, T>(
    state: &mut S,
    max_retries: u32,
    is_transient: impl Fn(&Error) -> bool,
    mut attempt: impl FnMut(&mut S) -> Result<T>,
    mut before_retry: impl FnMut(&mut S),
) -> Result<T> {
    let mut retries = 0;
    loop {
        match attempt(state) {
            Err(ref err) if is_transient(err) && retries < max_retries => {
                log::debug!("transient error ({}), retrying", err);
                retries += 1;
                before_retry(state);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_consumes_budget_on_transient_errors() {
        let mut attempts = 0u32;
        let result: Result<()> = retry(
            &mut attempts,
            2,
            Error::is_transient,
            |n| {
                *n += 1;
                Err(Error::Timeout)
            },
            |_| {},
        );
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn retry_stops_on_fatal_errors() {
        let mut attempts = 0u32;
        let result: Result<()> = retry(
            &mut attempts,
            9,
            Error::is_transient,
            |n| {
                *n += 1;
                Err(Error::DataFormat)
            },
            |_| {},
        );
        assert!(matches!(result, Err(Error::DataFormat)));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn retry_returns_the_first_success() {
        let mut attempts = 0u32;
        let result = retry(
            &mut attempts,
            5,
            Error::is_transient,
            |n| {
                *n += 1;
                if *n < 3 {
                    Err(Error::Protocol)
                } else {
                    Ok(*n)
                }
            },
            |_| {},
        );
        assert_eq!(result.unwrap(), 3);
    }
}
