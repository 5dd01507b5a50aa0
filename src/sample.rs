//! The time-series sample stream a parser yields for one dive.

#[cfg(feature = "serde")]
use serde::Serialize;

/// One element of a dive's sample stream.
///
/// Streams are a flat sequence: a [`Sample::Time`] opens each instant and
/// the values recorded at that instant follow until the next `Time`.
/// Within one stream the `Time` values never decrease.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Sample {
    /// Seconds since the start of the dive.
    Time(u32),
    /// Depth in meters.
    Depth(f64),
    /// Ambient temperature in °C.
    Temperature(f64),
    /// Pressure of one tank, in bar.
    Pressure { tank: u32, value: f64 },
    /// Oxygen partial pressure in bar.
    Ppo2(f64),
    /// CNS oxygen toxicity as a fraction.
    Cns(f64),
    /// No-deco limit or decompression obligation.
    Deco {
        kind: DecoKind,
        /// Stop (or ceiling) depth in meters; 0 for NDL.
        depth: f64,
        /// Remaining NDL or time-to-surface, in seconds as recorded.
        time: u32,
    },
    /// The active gas changed. Percentages, plus the index into the gas
    /// mix table when the record links them.
    GasChange {
        oxygen: u32,
        helium: u32,
        mix: Option<u32>,
    },
    /// A discrete event (alarm, warning, bookmark).
    Event {
        kind: SampleEventKind,
        /// Raw event payload (ascent speed class, bookmark number, ...).
        value: u32,
        /// Whether the condition begins or ends, for devices that report
        /// both edges.
        transition: Option<Transition>,
    },
    /// An undecoded vendor blob riding along with the sample.
    Vendor { kind: VendorKind, data: Vec<u8> },
    /// Remaining bottom time in minutes.
    Rbt(u32),
    /// Heart rate in beats per minute.
    Heartbeat(u32),
    /// Compass bearing in degrees.
    Bearing(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum DecoKind {
    /// No-decompression limit; `time` is the remaining NDL.
    Ndl,
    SafetyStop,
    DeepStop,
    /// A mandatory stop; `depth` is the stop or ceiling depth.
    DecoStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Transition {
    Begin,
    End,
}

/// Discrete event kinds, the union over all supported families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum SampleEventKind {
    /// Ascent rate warning; `value` carries the severity class when the
    /// device records one.
    Ascent,
    /// A decompression stop became mandatory.
    DecoStop,
    /// The ceiling was violated.
    Ceiling,
    /// The diver surfaced.
    Surface,
    /// Remaining bottom time warning.
    Rbt,
    /// Workload warning.
    Workload,
    /// Tank pressure transmitter fault.
    Transmitter,
    /// A deco violation penalty.
    Violation,
    /// User bookmark; `value` is the bookmark number.
    Bookmark,
    SafetyStop,
    SafetyStopVoluntary,
    SafetyStopMandatory,
    /// Safety or deep stop ceiling broken.
    CeilingSafetyStop,
    DeepStop,
    TissueLevel,
    /// Remaining air time warning.
    AirTime,
    MaxDepth,
    DiveTime,
    /// Oxygen partial pressure out of range.
    Po2,
}

/// Which family produced a [`Sample::Vendor`] blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum VendorKind {
    OceanicAtom2,
    OceanicVtpro,
    UwatecAladin,
    UwatecSmart,
}
