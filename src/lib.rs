//! A vendor-agnostic library for downloading and decoding dive logs from
//! recreational and technical dive computers.
//!
//! Every supported vendor speaks a different serial protocol and stores
//! profile data in a different bit-packed binary layout. This crate
//! presents one uniform abstraction over them:
//!
//! - a *device* that owns a serial port, enumerates dives newest-first,
//!   and hands each dive to the caller as an opaque byte blob together
//!   with a short *fingerprint* slice (install the fingerprint of the
//!   last downloaded dive to stop the next download early);
//! - a [`Parser`] that turns one dive blob into structured header fields
//!   and an iterator of time-series [`Sample`]s.
//!
//! Returned values are SI-normalized: depths in meters, pressures in bar,
//! temperatures in °C, times in seconds, gas fractions in `[0, 1]`.
//!
//! The device layer is synchronous and blocks on the [`SerialPort`]
//! contract supplied by the caller; parsers are pure computation over a
//! borrowed byte slice. A shared [`Context`] carries the cancellation
//! signal observed at packet boundaries.
//!
//! Common abbreviations:
//!
//! - NDL: no-decompression limit;
//! - CNS: central nervous system oxygen toxicity, as a fraction;
//! - RBT: remaining bottom time, in minutes;
//! - PPO2: oxygen partial pressure, in bar;
//! - BCD: binary-coded decimal, two digits per byte.

pub mod bytes;
pub mod checksum;
pub mod clock;
mod context;
pub mod device;
mod error;
mod event;
pub mod parser;
mod sample;
mod types;

#[cfg(test)]
mod tests;

pub use crate::clock::DeviceClock;
pub use crate::context::Context;
pub use crate::device::{
    Common2Device, Common2Layout, Common2Transport, Direction, FlowControl, IdiveDevice, Parity,
    SerialPort,
};
pub use crate::error::{Error, Result};
pub use crate::event::Event;
pub use crate::parser::{Parser, Samples};
pub use crate::sample::{DecoKind, Sample, SampleEventKind, Transition, VendorKind};
pub use crate::types::{
    DiveMode, FieldKind, FieldString, FieldValue, Gasmix, Salinity, Tank, WaterKind,
};
