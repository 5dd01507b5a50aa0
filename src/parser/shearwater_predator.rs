//! Shearwater Predator and Petrel records: 0x80-byte opening and footer
//! blocks around fixed-width samples, with a 0xFFFD sentinel marking the
//! Petrel-style three-block layout.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use crate::bytes;
use crate::clock;
use crate::error::{Error, Result};
use crate::parser::{fahrenheit_to_celsius, DecodeStep, FieldKind, FieldValue, FEET};
use crate::sample::{DecoKind, Sample};
use crate::types::{FieldString, Gasmix, Salinity, WaterKind};

const SZ_BLOCK: usize = 0x80;
const SZ_SAMPLE_PREDATOR: usize = 0x10;
const SZ_SAMPLE_PETREL: usize = 0x20;

/// End-of-record sentinel opening the final block on newer firmware.
const SENTINEL: u16 = 0xFFFD;

const METRIC: u8 = 0;

const NGASMIXES: usize = 10;

pub(crate) struct Predator {
    serial: u32,
    petrel: bool,
    gasmixes: Option<Vec<Gasmix>>,
}

impl Predator {
    pub(crate) fn new(serial: u32, petrel: bool) -> Self {
        Predator {
            serial,
            petrel,
            gasmixes: None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.gasmixes = None;
    }

    /// Offset of the footer block holding dive time and maximum depth.
    fn footer(&self, data: &[u8]) -> Result<usize> {
        if data.len() < 2 * SZ_BLOCK {
            return Err(Error::DataFormat);
        }

        let mut footer = data.len() - SZ_BLOCK;
        if self.petrel || bytes::u16_be(data, footer) == SENTINEL {
            if data.len() < 3 * SZ_BLOCK {
                return Err(Error::DataFormat);
            }
            footer -= SZ_BLOCK;
        }
        Ok(footer)
    }

    fn cache(&mut self, data: &[u8]) -> &[Gasmix] {
        if self.gasmixes.is_none() {
            let mut gasmixes = Vec::new();
            for i in 0..NGASMIXES {
                let o2 = data[20 + i];
                let he = data[30 + i];
                if o2 == 0 && he == 0 {
                    continue;
                }
                gasmixes.push(Gasmix {
                    oxygen: o2 as f64 / 100.0,
                    helium: he as f64 / 100.0,
                });
            }
            self.gasmixes = Some(gasmixes);
        }
        self.gasmixes.as_ref().unwrap()
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < 2 * SZ_BLOCK {
            return Err(Error::DataFormat);
        }

        let ticks = bytes::u32_be(data, 12) as i64;
        clock::gmtime(ticks).ok_or(Error::DataFormat)
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, index: u32) -> Result<FieldValue> {
        let footer = self.footer(data)?;
        let units = data[8];

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(
                bytes::u16_be(data, footer + 6) as u32 * 60,
            )),
            FieldKind::MaxDepth => {
                let depth = bytes::u16_be(data, footer + 4) as f64;
                Ok(FieldValue::Depth(if units == METRIC {
                    depth
                } else {
                    depth * FEET
                }))
            }
            FieldKind::GasmixCount => Ok(FieldValue::Count(self.cache(data).len() as u32)),
            FieldKind::Gasmix => {
                let mix = self
                    .cache(data)
                    .get(index as usize)
                    .copied()
                    .ok_or(Error::InvalidArgs)?;
                Ok(FieldValue::Gasmix(mix))
            }
            FieldKind::Salinity => {
                let density = bytes::u16_be(data, 83) as f64;
                Ok(FieldValue::Salinity(Salinity {
                    kind: if density == 1000.0 {
                        WaterKind::Fresh
                    } else {
                        WaterKind::Salt
                    },
                    density,
                }))
            }
            FieldKind::Atmospheric => Ok(FieldValue::Pressure(
                bytes::u16_be(data, 47) as f64 / 1000.0,
            )),
            FieldKind::String => {
                let string = match index {
                    0 => FieldString {
                        desc: "Battery at end",
                        value: format!("{:.1}", data[9] as f64 / 10.0),
                    },
                    1 => FieldString {
                        desc: "Serial",
                        value: format!("{:08x}", self.serial),
                    },
                    2 => FieldString {
                        desc: "FW Version",
                        value: format!("{:2x}", data[19]),
                    },
                    _ => return Err(Error::Unsupported),
                };
                Ok(FieldValue::String(string))
            }
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        let footer = self.footer(data)?;

        Ok(Decoder {
            data,
            footer,
            samplesize: if self.petrel {
                SZ_SAMPLE_PETREL
            } else {
                SZ_SAMPLE_PREDATOR
            },
            petrel: self.petrel,
            imperial: data[8] != METRIC,
            offset: SZ_BLOCK,
            time: 0,
            previous_mix: (0, 0),
        })
    }
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    footer: usize,
    samplesize: usize,
    petrel: bool,
    imperial: bool,
    offset: usize,
    time: u32,
    previous_mix: (u8, u8),
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        if self.offset >= self.footer || self.offset + self.samplesize > self.footer {
            return Ok(false);
        }
        let offset = self.offset;
        self.offset += self.samplesize;

        // Erased samples are all zeros.
        if bytes::is_filled_with(&data[offset..offset + self.samplesize], 0x00) {
            return Ok(true);
        }

        self.time += 10;
        queue.push_back(Sample::Time(self.time));

        let depth = bytes::u16_be(data, offset) as f64;
        queue.push_back(Sample::Depth(if self.imperial {
            depth * FEET
        } else {
            depth / 10.0
        }));

        let temperature = data[offset + 13] as f64;
        queue.push_back(Sample::Temperature(if self.imperial {
            fahrenheit_to_celsius(temperature)
        } else {
            temperature
        }));

        queue.push_back(Sample::Ppo2(data[offset + 6] as f64 / 100.0));

        if self.petrel {
            queue.push_back(Sample::Cns(data[offset + 22] as f64 / 100.0));
        }

        let o2 = data[offset + 7];
        let he = data[offset + 8];
        if self.previous_mix != (o2, he) {
            queue.push_back(Sample::GasChange {
                oxygen: o2 as u32,
                helium: he as u32,
                mix: None,
            });
            self.previous_mix = (o2, he);
        }

        let decostop = bytes::u16_be(data, offset + 2);
        let (kind, stop_depth) = if decostop != 0 {
            let depth = decostop as f64;
            (
                DecoKind::DecoStop,
                if self.imperial { depth * FEET } else { depth },
            )
        } else {
            (DecoKind::Ndl, 0.0)
        };
        queue.push_back(Sample::Deco {
            kind,
            depth: stop_depth,
            time: data[offset + 9] as u32 * 60,
        });

        Ok(true)
    }
}
