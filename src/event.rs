//! Notifications a device emits to the caller while it talks to the
//! hardware.
//!
//! During an enumeration the order is: an indeterminate progress report,
//! then [`Event::DevInfo`] and [`Event::Vendor`] once the device has
//! identified itself, then progress updates interleaved with the per-dive
//! callbacks.

#[cfg(feature = "serde")]
use serde::Serialize;

/// A typed notification emitted during a device operation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Event {
    /// The device needs user interaction (e.g. it must be put in transfer
    /// mode) before the operation can continue.
    Waiting,

    /// Download progress. `maximum == 0` means the total is not yet known.
    Progress { current: u32, maximum: u32 },

    /// The device identified itself.
    DevInfo {
        model: u32,
        firmware: u32,
        serial: u32,
    },

    /// Clock sample taken at download time: the device's tick counter and
    /// the host's UNIX time, for correcting relative dive timestamps.
    Clock { devtime: u32, systime: i64 },

    /// Raw identification bytes, passed through for diagnostics.
    Vendor(Vec<u8>),
}
