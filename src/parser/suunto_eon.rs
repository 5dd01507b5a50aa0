//! Suunto Eon / Solution and Spyder records: delta-coded depth bytes
//! terminated by a 0x80 end marker, with tank pressure or nitrox data in
//! the header depending on the model.

use std::collections::VecDeque;

use chrono::{NaiveDate, NaiveDateTime};

use crate::bytes::bcd2dec;
use crate::error::{Error, Result};
use crate::parser::{DecodeStep, FieldKind, FieldValue, FEET};
use crate::sample::{Sample, SampleEventKind};
use crate::types::{Gasmix, Tank};

#[derive(Clone, Copy)]
struct Cache {
    divetime: u32,
    maxdepth: i32,
    /// Offset of the 0x80 end marker.
    marker: usize,
    nitrox: bool,
}

pub(crate) struct Eon {
    spyder: bool,
    cache: Option<Cache>,
}

impl Eon {
    pub(crate) fn new(spyder: bool) -> Self {
        Eon {
            spyder,
            cache: None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.cache = None;
    }

    fn cache(&mut self, data: &[u8]) -> Result<Cache> {
        if let Some(cache) = self.cache {
            return Ok(cache);
        }

        if data.len() < 13 {
            return Err(Error::DataFormat);
        }

        // The Solution Nitrox/Vario stores nitrox data, not tank pressure.
        let nitrox = !self.spyder && (data[4] & 0x80) != 0;

        let interval = data[3] as u32;
        let mut nsamples = 0u32;
        let mut depth = 0i32;
        let mut maxdepth = 0i32;
        let mut offset = 11;
        while offset < data.len() && data[offset] != 0x80 {
            let value = data[offset];
            offset += 1;
            if !(0x7d..=0x82).contains(&value) {
                depth += value as i8 as i32;
                if depth > maxdepth {
                    maxdepth = depth;
                }
                nsamples += 1;
            }
        }

        let marker = offset;
        if marker + 2 >= data.len() || data[marker] != 0x80 {
            log::error!("no valid end marker found");
            return Err(Error::DataFormat);
        }

        let cache = Cache {
            divetime: nsamples * interval,
            maxdepth,
            marker,
            nitrox,
        };
        self.cache = Some(cache);
        Ok(cache)
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < 6 + 5 {
            return Err(Error::DataFormat);
        }

        let p = &data[6..];

        let (year, month, day, hour, minute) = if self.spyder {
            let year = p[0] as i32 + if p[0] < 90 { 2000 } else { 1900 };
            (year, p[1] as u32, p[2] as u32, p[3] as u32, p[4] as u32)
        } else {
            let year = bcd2dec(p[0]) as i32 + if bcd2dec(p[0]) < 85 { 2000 } else { 1900 };
            (year, bcd2dec(p[1]), bcd2dec(p[2]), bcd2dec(p[3]), bcd2dec(p[4]))
        };

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .ok_or(Error::DataFormat)
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, _index: u32) -> Result<FieldValue> {
        let cache = self.cache(data)?;

        let mut oxygen = 21;
        let mut beginpressure = 0;
        let mut endpressure = 0;
        if cache.nitrox {
            oxygen = data[0x05] as u32;
        } else {
            beginpressure = data[5] as u32 * 2;
            endpressure = data[cache.marker + 2] as u32 * 2;
        }

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(cache.divetime)),
            FieldKind::MaxDepth => Ok(FieldValue::Depth(cache.maxdepth as f64 * FEET)),
            FieldKind::GasmixCount => Ok(FieldValue::Count(1)),
            FieldKind::Gasmix => Ok(FieldValue::Gasmix(Gasmix {
                oxygen: oxygen as f64 / 100.0,
                helium: 0.0,
            })),
            FieldKind::TankCount => Ok(FieldValue::Count(
                if beginpressure == 0 && endpressure == 0 {
                    0
                } else {
                    1
                },
            )),
            FieldKind::Tank => Ok(FieldValue::Tank(Tank {
                gasmix: Some(0),
                beginpressure: beginpressure as f64,
                endpressure: endpressure as f64,
                volume: None,
                workpressure: None,
            })),
            FieldKind::TemperatureMinimum => {
                let raw = data[cache.marker + 1];
                let temperature = if self.spyder {
                    raw as i8 as f64
                } else {
                    raw as f64 - 40.0
                };
                Ok(FieldValue::Temperature(temperature))
            }
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        // Validates the end marker up front.
        self.cache(data)?;
        let interval = data[3] as u32;
        Ok(Decoder {
            data,
            offset: 11,
            interval,
            time: 0,
            depth: 0,
            complete: true,
            state: EonState::Leadin,
        })
    }
}

enum EonState {
    /// Surface sample before the profile.
    Leadin,
    Profile,
    /// Surface sample after the profile.
    Leadout,
    Done,
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
    interval: u32,
    time: u32,
    depth: i32,
    complete: bool,
    state: EonState,
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        match self.state {
            EonState::Leadin => {
                queue.push_back(Sample::Time(0));
                queue.push_back(Sample::Depth(0.0));
                self.state = EonState::Profile;
                Ok(true)
            }
            EonState::Profile => {
                if self.offset >= data.len() || data[self.offset] == 0x80 {
                    self.state = EonState::Leadout;
                    return Ok(true);
                }

                let value = data[self.offset];
                self.offset += 1;

                if self.complete {
                    self.time += self.interval;
                    queue.push_back(Sample::Time(self.time));
                    self.complete = false;
                }

                if !(0x7d..=0x82).contains(&value) {
                    self.depth += value as i8 as i32;
                    queue.push_back(Sample::Depth(self.depth as f64 * FEET));
                    self.complete = true;
                } else {
                    let kind = match value {
                        0x7d => Some(SampleEventKind::Surface),
                        0x7e => Some(SampleEventKind::DecoStop),
                        0x7f => Some(SampleEventKind::Ceiling),
                        0x81 => Some(SampleEventKind::Ascent),
                        _ => {
                            log::warn!("unknown event");
                            None
                        }
                    };
                    if let Some(kind) = kind {
                        queue.push_back(Sample::Event {
                            kind,
                            value: 0,
                            transition: None,
                        });
                    }
                }
                Ok(true)
            }
            EonState::Leadout => {
                if self.complete {
                    self.time += self.interval;
                    queue.push_back(Sample::Time(self.time));
                }
                queue.push_back(Sample::Depth(0.0));
                self.state = EonState::Done;
                Ok(true)
            }
            EonState::Done => Ok(false),
        }
    }
}
