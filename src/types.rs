//! Header field kinds and values shared by every parser family.

#[cfg(feature = "serde")]
use serde::Serialize;

/// A breathing gas mix. Fractions are in `[0, 1]` and `oxygen + helium`
/// never exceeds 1; the remainder is nitrogen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Gasmix {
    pub oxygen: f64,
    pub helium: f64,
}

impl Gasmix {
    /// Air, the default mix when a record stores no oxygen fraction.
    pub fn air() -> Self {
        Gasmix {
            oxygen: 0.21,
            helium: 0.0,
        }
    }

    pub fn nitrogen(&self) -> f64 {
        1.0 - self.oxygen - self.helium
    }
}

/// Begin/end pressures of one tank, in bar.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Tank {
    /// Index into the gas mix table, when the record links them.
    pub gasmix: Option<u32>,
    pub beginpressure: f64,
    pub endpressure: f64,
    /// Tank volume in liters; almost never recorded.
    pub volume: Option<f64>,
    /// Working pressure in bar; almost never recorded.
    pub workpressure: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum WaterKind {
    Fresh,
    Salt,
}

/// Water type and density (kg/m³; 0 when the record stores only the type).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Salinity {
    pub kind: WaterKind,
    pub density: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum DiveMode {
    OpenCircuit,
    Gauge,
    Freedive,
}

/// A named free-form header string (serial number, firmware version,
/// battery level). The caller owns the returned value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FieldString {
    pub desc: &'static str,
    pub value: String,
}

/// Selects a header field in [`Parser::field`](crate::Parser::field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum FieldKind {
    /// Total dive time in seconds.
    DiveTime,
    /// Maximum depth in meters.
    MaxDepth,
    /// Average depth in meters.
    AvgDepth,
    /// Number of gas mixes in the table.
    GasmixCount,
    /// A gas mix, selected by index.
    Gasmix,
    /// Number of tanks in the table.
    TankCount,
    /// A tank, selected by index.
    Tank,
    /// Water type and density.
    Salinity,
    /// Surface pressure in bar.
    Atmospheric,
    /// Coldest recorded temperature, °C.
    TemperatureMinimum,
    /// Warmest recorded temperature, °C.
    TemperatureMaximum,
    /// Temperature at the surface, °C.
    TemperatureSurface,
    /// Operating mode of the dive.
    DiveMode,
    /// A named string, selected by index.
    String,
}

/// A decoded header field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum FieldValue {
    /// Seconds, for [`FieldKind::DiveTime`].
    Time(u32),
    /// Meters, for the depth kinds.
    Depth(f64),
    /// Element counts, for [`FieldKind::GasmixCount`] and
    /// [`FieldKind::TankCount`].
    Count(u32),
    Gasmix(Gasmix),
    Tank(Tank),
    Salinity(Salinity),
    /// Bar, for [`FieldKind::Atmospheric`].
    Pressure(f64),
    /// °C, for the temperature kinds.
    Temperature(f64),
    Mode(DiveMode),
    String(FieldString),
}
