//! Uwatec Memomouse (Aladin air/nitrox/oxygen series) records.
//!
//! Depth and warning bits share a big-endian word every 20 seconds; once
//! a minute the stream carries an undecoded decompression byte (plus an
//! oxygen byte on the O2 series). The device clock ticks twice per
//! second, so the skew correction halves the delta.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use crate::bytes::{self, bcd2dec};
use crate::clock::{self, DeviceClock};
use crate::error::{Error, Result};
use crate::parser::{DecodeStep, FieldKind, FieldValue};
use crate::sample::{Sample, SampleEventKind, VendorKind};
use crate::types::Gasmix;

/// Model-dependent header size and gas flavor, from the model nibble.
#[derive(Clone, Copy)]
struct ModelInfo {
    nitrox: bool,
    oxygen: bool,
    header: usize,
}

impl ModelInfo {
    fn from_data(data: &[u8]) -> Self {
        let model = data[3];
        let nitrox = (model & 0xF0) == 0xF0;
        let oxygen = (model & 0xF0) == 0xA0;

        let mut header = 22;
        if nitrox {
            header += 2;
        }
        if oxygen {
            header += 3;
        }

        ModelInfo {
            nitrox,
            oxygen,
            header,
        }
    }
}

pub(crate) struct Memomouse {
    clock: DeviceClock,
}

impl Memomouse {
    pub(crate) fn new(clock: DeviceClock) -> Self {
        Memomouse { clock }
    }

    pub(crate) fn invalidate(&mut self) {}

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < 11 + 4 {
            return Err(Error::DataFormat);
        }

        let timestamp = bytes::u32_le(data, 11);
        clock::localtime(self.clock.resolve_half_ticks(timestamp)).ok_or(Error::DataFormat)
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, _index: u32) -> Result<FieldValue> {
        if data.len() < 18 {
            return Err(Error::DataFormat);
        }

        let info = ModelInfo::from_data(data);

        match kind {
            FieldKind::DiveTime => {
                let hundreds = if data[4] & 0x04 != 0 { 100 } else { 0 };
                Ok(FieldValue::Time((hundreds + bcd2dec(data[5])) * 60))
            }
            FieldKind::MaxDepth => Ok(FieldValue::Depth(
                ((bytes::u16_be(data, 6) & 0xFFC0) >> 6) as f64 * 10.0 / 64.0,
            )),
            FieldKind::GasmixCount => Ok(FieldValue::Count(1)),
            FieldKind::Gasmix => {
                let oxygen = if data.len() >= info.header + 18 {
                    match data.get(18 + 23).copied() {
                        Some(o2) if info.oxygen => o2 as f64 / 100.0,
                        Some(o2) if info.nitrox => {
                            if o2 & 0x0F != 0 {
                                (20.0 + 2.0 * (o2 & 0x0F) as f64) / 100.0
                            } else {
                                0.21
                            }
                        }
                        _ => 0.21,
                    }
                } else {
                    0.21
                };
                Ok(FieldValue::Gasmix(Gasmix {
                    oxygen,
                    helium: 0.0,
                }))
            }
            FieldKind::TemperatureMinimum => {
                Ok(FieldValue::Temperature(data[15] as i8 as f64 / 4.0))
            }
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        if data.len() < 18 {
            return Err(Error::DataFormat);
        }

        let info = ModelInfo::from_data(data);

        Ok(Decoder {
            data,
            oxygen: info.oxygen,
            offset: info.header + 18,
            time: 20,
        })
    }
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    oxygen: bool,
    offset: usize,
    time: u32,
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        if self.offset + 2 > data.len() {
            return Ok(false);
        }

        let value = bytes::u16_be(data, self.offset);
        let depth = (value & 0xFFC0) >> 6;
        let warnings = value & 0x3F;
        self.offset += 2;

        queue.push_back(Sample::Time(self.time));
        queue.push_back(Sample::Depth(depth as f64 * 10.0 / 64.0));

        for bit in 0..6 {
            if warnings & (1 << bit) != 0 {
                let kind = match bit {
                    0 => SampleEventKind::DecoStop,
                    // Remaining bottom time too short (Air series only).
                    1 => SampleEventKind::Rbt,
                    2 => SampleEventKind::Ascent,
                    3 => SampleEventKind::Ceiling,
                    // Work too hard (Air series only).
                    4 => SampleEventKind::Workload,
                    // Transmit error of air pressure (always set unless
                    // Air series).
                    _ => SampleEventKind::Transmitter,
                };
                queue.push_back(Sample::Event {
                    kind,
                    value: 0,
                    transition: None,
                });
            }
        }

        if self.time % 60 == 0 {
            // Decompression information byte, plus the oxygen byte on the
            // O2 series.
            let mut size = 1;
            if self.oxygen {
                size += 1;
            }
            if self.offset + size > data.len() {
                return Err(Error::DataFormat);
            }
            queue.push_back(Sample::Vendor {
                kind: VendorKind::UwatecAladin,
                data: data[self.offset..self.offset + size].to_vec(),
            });
            self.offset += size;
        }

        self.time += 20;
        Ok(true)
    }
}
