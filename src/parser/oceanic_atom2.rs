//! Oceanic Atom 2 family records.
//!
//! One parser covers a few dozen models sharing the same page-based
//! layout; header and footer sizes, date fields, and most sample bit
//! positions depend on the model code.

use std::collections::VecDeque;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};

use crate::bytes::{self, bcd2dec, is_filled_with};
use crate::error::{Error, Result};
use crate::parser::{fahrenheit_to_celsius, psi_to_bar, DecodeStep, FieldKind, FieldValue, FEET};
use crate::sample::{DecoKind, Sample, VendorKind};
use crate::types::{DiveMode, FieldString, Gasmix, Salinity, WaterKind};

const PAGESIZE: usize = 16;

pub const ATOM1: u32 = 0x4250;
pub const EPICA: u32 = 0x4257;
pub const VT3: u32 = 0x4258;
pub const T3A: u32 = 0x4259;
pub const ATOM2: u32 = 0x4342;
pub const GEO: u32 = 0x4344;
pub const MANTA: u32 = 0x4345;
pub const DATAMASK: u32 = 0x4347;
pub const COMPUMASK: u32 = 0x4348;
pub const OC1A: u32 = 0x434E;
pub const F10: u32 = 0x434D;
pub const WISDOM2: u32 = 0x4350;
pub const INSIGHT2: u32 = 0x4353;
pub const ELEMENT2: u32 = 0x4357;
pub const VEO20: u32 = 0x4359;
pub const VEO30: u32 = 0x435A;
pub const ZEN: u32 = 0x4441;
pub const ZENAIR: u32 = 0x4442;
pub const ATMOSAI2: u32 = 0x4443;
pub const PROPLUS21: u32 = 0x4444;
pub const GEO20: u32 = 0x4446;
pub const VT4: u32 = 0x4447;
pub const OC1B: u32 = 0x4449;
pub const VOYAGER2G: u32 = 0x444B;
pub const ATOM3: u32 = 0x444C;
pub const DG03: u32 = 0x444D;
pub const OCS: u32 = 0x4450;
pub const OC1C: u32 = 0x4451;
pub const VT41: u32 = 0x4452;
pub const EPICB: u32 = 0x4453;
pub const T3B: u32 = 0x4455;
pub const ATOM31: u32 = 0x4456;
pub const A300AI: u32 = 0x4457;
pub const WISDOM3: u32 = 0x4458;
pub const A300: u32 = 0x445A;
pub const TX1: u32 = 0x4542;
pub const AMPHOS: u32 = 0x4545;
pub const AMPHOSAIR: u32 = 0x4546;
pub const PROPLUS3: u32 = 0x4548;
pub const F11: u32 = 0x4549;
pub const OCI: u32 = 0x454B;
pub const A300CS: u32 = 0x454C;
pub const VTX: u32 = 0x4557;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Gauge,
    Freedive,
}

#[derive(Clone, Copy)]
struct Cache {
    divetime: u32,
    maxdepth: f64,
}

pub(crate) struct Atom2 {
    model: u32,
    headersize: usize,
    footersize: usize,
    serial: u32,
    cache: Option<Cache>,
}

impl Atom2 {
    pub(crate) fn new(model: u32, serial: u32) -> Self {
        let mut headersize = 9 * PAGESIZE / 2;
        let mut footersize = 2 * PAGESIZE / 2;
        match model {
            DATAMASK | COMPUMASK | GEO | GEO20 | VEO20 | VEO30 | OCS | PROPLUS3 | A300 | MANTA
            | INSIGHT2 | ZEN => headersize -= PAGESIZE,
            VT4 | VT41 => headersize += PAGESIZE,
            TX1 => headersize += 2 * PAGESIZE,
            ATOM1 => headersize -= 2 * PAGESIZE,
            F10 => {
                headersize = 3 * PAGESIZE;
                footersize = PAGESIZE / 2;
            }
            F11 => {
                headersize = 5 * PAGESIZE;
                footersize = PAGESIZE / 2;
            }
            A300CS | VTX => headersize = 5 * PAGESIZE,
            _ => {}
        }

        Atom2 {
            model,
            headersize,
            footersize,
            serial,
            cache: None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Offset of the header sample page.
    fn header(&self) -> usize {
        match self.model {
            VT4 | VT41 | A300AI => 3 * PAGESIZE,
            _ => self.headersize - PAGESIZE / 2,
        }
    }

    fn mode(&self, data: &[u8]) -> Mode {
        match self.model {
            F10 | F11 => Mode::Freedive,
            T3B | VT3 | DG03 => match (data[2] & 0xC0) >> 6 {
                0 => Mode::Normal,
                1 => Mode::Gauge,
                2 => Mode::Freedive,
                _ => Mode::Normal,
            },
            VEO20 | VEO30 => match (data[1] & 0x60) >> 5 {
                0 => Mode::Normal,
                1 => Mode::Gauge,
                2 => Mode::Freedive,
                _ => Mode::Normal,
            },
            _ => Mode::Normal,
        }
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        let header = match self.model {
            F10 | F11 => 32,
            TX1 => 16,
            A300CS | VTX => 11,
            _ => 8,
        };
        if data.len() < header {
            return Err(Error::DataFormat);
        }

        let p = data;

        // AM/PM bit of the 12-hour clock.
        let mut pm = p[1] & 0x80;

        let (mut year, month, day, hour, minute): (i32, u32, u32, u32, u32) = match self.model {
            OC1A | OC1B | OC1C | OCS | VT4 | VT41 | ATOM3 | ATOM31 | A300AI | OCI => (
                (((p[5] & 0xE0) >> 5) + ((p[7] & 0xE0) >> 2)) as i32 + 2000,
                (p[3] & 0x0F) as u32,
                (((p[0] & 0x80) >> 3) + ((p[3] & 0xF0) >> 4)) as u32,
                bcd2dec(p[1] & 0x1F),
                bcd2dec(p[0] & 0x7F),
            ),
            VT3 | VEO20 | VEO30 | DG03 => (
                (((p[3] & 0xE0) >> 1) + (p[4] & 0x0F)) as i32 + 2000,
                ((p[4] & 0xF0) >> 4) as u32,
                (p[3] & 0x1F) as u32,
                bcd2dec(p[1] & 0x1F),
                bcd2dec(p[0]),
            ),
            ZENAIR | AMPHOS | AMPHOSAIR | VOYAGER2G => (
                (p[3] & 0x0F) as i32 + 2000,
                ((p[7] & 0xF0) >> 4) as u32,
                (((p[3] & 0x80) >> 3) + ((p[5] & 0xF0) >> 4)) as u32,
                bcd2dec(p[1] & 0x1F),
                bcd2dec(p[0]),
            ),
            F10 | F11 => {
                pm = p[13] & 0x80;
                (
                    bcd2dec(p[6]) as i32 + 2000,
                    bcd2dec(p[7]),
                    bcd2dec(p[8]),
                    bcd2dec(p[13] & 0x7F),
                    bcd2dec(p[12]),
                )
            }
            TX1 => (
                bcd2dec(p[13]) as i32 + 2000,
                bcd2dec(p[14]),
                bcd2dec(p[15]),
                p[11] as u32,
                p[10] as u32,
            ),
            A300CS | VTX => (
                p[10] as i32 + 2000,
                p[8] as u32,
                p[9] as u32,
                bcd2dec(p[1] & 0x1F),
                bcd2dec(p[0]),
            ),
            _ => {
                let day = if matches!(self.model, T3A | T3B | GEO20 | PROPLUS3) {
                    (p[3] & 0x3F) as u32
                } else {
                    bcd2dec(p[3] & 0x3F)
                };
                (
                    bcd2dec(((p[3] & 0xC0) >> 2) + (p[4] & 0x0F)) as i32 + 2000,
                    ((p[4] & 0xF0) >> 4) as u32,
                    day,
                    bcd2dec(p[1] & 0x1F),
                    bcd2dec(p[0]),
                )
            }
        };

        // Convert to a 24-hour clock.
        let mut hour = hour % 12;
        if pm != 0 {
            hour += 12;
        }

        // Some models store only the last digit of the year. Guess the
        // decade from the host clock, stepping back at most one decade;
        // years stored with more bits are left alone.
        if year < 2010 {
            let now_year = Local::now().year();
            if now_year >= 2010 {
                let mut decade = (now_year / 10) * 10;
                if year % 10 > now_year % 10 {
                    decade -= 10;
                }
                year += decade - 2000;
            }
        }

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .ok_or(Error::DataFormat)
    }

    fn cache(&mut self, data: &[u8]) -> Result<Cache> {
        if let Some(cache) = self.cache {
            return Ok(cache);
        }

        let mut stats = crate::parser::SampleStatistics::default();
        let mut it = crate::parser::StepIter::new(self.build_decoder(data)?);
        while let Some(sample) = it.next_sample() {
            stats.update(&sample?);
        }

        let cache = Cache {
            divetime: stats.divetime,
            maxdepth: stats.maxdepth,
        };
        self.cache = Some(cache);
        Ok(cache)
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, index: u32) -> Result<FieldValue> {
        if data.len() < self.headersize + self.footersize {
            return Err(Error::DataFormat);
        }

        let header = self.header();
        let footer = data.len() - self.footersize;
        let mode = self.mode(data);
        let freedive = mode == Mode::Freedive;
        let cache = self.cache(data)?;

        match kind {
            FieldKind::DiveTime => {
                if self.model == F10 || self.model == F11 {
                    Ok(FieldValue::Time(
                        bcd2dec(data[2]) + bcd2dec(data[3]) * 60 + bcd2dec(data[1]) * 3600,
                    ))
                } else {
                    Ok(FieldValue::Time(cache.divetime))
                }
            }
            FieldKind::MaxDepth => {
                let raw = if self.model == F10 || self.model == F11 {
                    bytes::u16_le(data, 4)
                } else {
                    bytes::u16_le(data, footer + 4)
                };
                Ok(FieldValue::Depth(raw as f64 / 16.0 * FEET))
            }
            FieldKind::GasmixCount => {
                let count = if freedive {
                    0
                } else if self.model == DATAMASK || self.model == COMPUMASK {
                    1
                } else if matches!(self.model, VT4 | VT41 | OCI | A300AI) {
                    4
                } else if self.model == TX1 {
                    6
                } else if self.model == A300CS || self.model == VTX {
                    if data[0x39] & 0x04 != 0 {
                        1
                    } else if data[0x39] & 0x08 != 0 {
                        2
                    } else if data[0x39] & 0x10 != 0 {
                        3
                    } else {
                        4
                    }
                } else {
                    3
                };
                Ok(FieldValue::Count(count))
            }
            FieldKind::Gasmix => {
                let index = index as usize;
                let byte = |offset: usize| -> Result<u32> {
                    data.get(offset)
                        .map(|&b| b as u32)
                        .ok_or(Error::InvalidArgs)
                };
                let mut helium = 0u32;
                let oxygen = if self.model == DATAMASK || self.model == COMPUMASK {
                    byte(header + 3)?
                } else if self.model == OCI {
                    byte(0x28 + index)?
                } else if self.model == A300CS || self.model == VTX {
                    byte(0x2A + index)?
                } else if self.model == TX1 {
                    helium = byte(0x48 + index)?;
                    byte(0x3E + index)?
                } else {
                    byte(header + 4 + index)?
                };
                Ok(FieldValue::Gasmix(Gasmix {
                    oxygen: if oxygen != 0 {
                        oxygen as f64 / 100.0
                    } else {
                        0.21
                    },
                    helium: helium as f64 / 100.0,
                }))
            }
            FieldKind::Salinity => {
                if self.model == A300CS || self.model == VTX {
                    Ok(FieldValue::Salinity(Salinity {
                        kind: if data[0x18] & 0x80 != 0 {
                            WaterKind::Fresh
                        } else {
                            WaterKind::Salt
                        },
                        density: 0.0,
                    }))
                } else {
                    Err(Error::Unsupported)
                }
            }
            FieldKind::DiveMode => Ok(FieldValue::Mode(match mode {
                Mode::Normal => DiveMode::OpenCircuit,
                Mode::Gauge => DiveMode::Gauge,
                Mode::Freedive => DiveMode::Freedive,
            })),
            FieldKind::String => match index {
                0 => Ok(FieldValue::String(FieldString {
                    desc: "Serial",
                    value: format!("{:06}", self.serial),
                })),
                _ => Err(Error::Unsupported),
            },
            _ => Err(Error::Unsupported),
        }
    }

    fn build_decoder<'a>(&self, data: &'a [u8]) -> Result<Decoder<'a>> {
        if data.len() < self.headersize + self.footersize {
            return Err(Error::DataFormat);
        }

        let header = self.header();
        let mode = self.mode(data);
        let freedive = mode == Mode::Freedive;

        let mut interval = 1u32;
        if !freedive {
            let idx = if self.model == A300CS || self.model == VTX {
                0x1F
            } else {
                0x17
            };
            interval = match data[idx] & 0x03 {
                0 => 2,
                1 => 15,
                2 => 30,
                _ => 60,
            };
        }

        let samplesize = if freedive {
            if self.model == F10 || self.model == F11 {
                2
            } else {
                4
            }
        } else if matches!(self.model, OC1A | OC1B | OC1C | OCI | TX1 | A300CS | VTX) {
            PAGESIZE
        } else {
            PAGESIZE / 2
        };

        let mut have_temperature = true;
        let mut have_pressure = true;
        if freedive {
            have_temperature = false;
            have_pressure = false;
        } else if matches!(
            self.model,
            VEO30 | OCS | ELEMENT2 | VEO20 | A300 | ZEN | GEO | GEO20 | MANTA
        ) {
            have_pressure = false;
        }

        let temperature = if have_temperature {
            data[header + 7] as u32
        } else {
            0
        };

        let tank = 0u32;
        let mut pressure = 0u32;
        if have_pressure {
            let idx = if self.model == A300CS || self.model == VTX {
                16
            } else {
                2
            };
            pressure = data[header + idx] as u32 + ((data[header + idx + 1] as u32) << 8);
            if pressure == 10000 {
                have_pressure = false;
            }
        }

        Ok(Decoder {
            data,
            model: self.model,
            footersize: self.footersize,
            freedive,
            interval,
            samplesize,
            have_temperature,
            have_pressure,
            temperature,
            tank,
            pressure,
            time: 0,
            complete: true,
            offset: self.headersize,
        })
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        self.build_decoder(data)
    }
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    model: u32,
    footersize: usize,
    freedive: bool,
    interval: u32,
    samplesize: usize,
    have_temperature: bool,
    have_pressure: bool,
    temperature: u32,
    tank: u32,
    pressure: u32,
    time: u32,
    complete: bool,
    offset: usize,
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        let end = data.len() - self.footersize;

        if self.offset + self.samplesize > end {
            return Ok(false);
        }
        let offset = self.offset;

        // Ignore erased samples.
        if is_filled_with(&data[offset..offset + self.samplesize], 0x00)
            || is_filled_with(&data[offset..offset + self.samplesize], 0xFF)
        {
            self.offset += self.samplesize;
            return Ok(true);
        }

        if self.complete {
            self.time += self.interval;
            queue.push_back(Sample::Time(self.time));
            self.complete = false;
        }

        let sampletype = if self.freedive { 0 } else { data[offset] };

        // Surface interval samples span a whole page.
        let mut length = self.samplesize;
        if sampletype == 0xBB {
            length = PAGESIZE;
            if offset + length > data.len() - PAGESIZE {
                return Err(Error::DataFormat);
            }
        }

        queue.push_back(Sample::Vendor {
            kind: VendorKind::OceanicAtom2,
            data: data[offset..offset + length].to_vec(),
        });

        if sampletype == 0xAA {
            // Tank change with a fresh absolute pressure reading.
            if self.model == DATAMASK || self.model == COMPUMASK {
                // Tank pressure (1 psi) and number.
                self.tank = 0;
                self.pressure =
                    (((data[offset + 7] as u32) << 8) + data[offset + 6] as u32) & 0x0FFF;
            } else if self.model == A300CS || self.model == VTX {
                // Tank pressure (1 psi) and number (one based index).
                self.tank = ((data[offset + 1] & 0x03) as u32).wrapping_sub(1);
                self.pressure =
                    (((data[offset + 7] as u32) << 8) + data[offset + 6] as u32) & 0x0FFF;
            } else {
                // Tank pressure (2 psi) and number (one based index).
                self.tank = ((data[offset + 1] & 0x03) as u32).wrapping_sub(1);
                self.pressure = if matches!(self.model, ATOM2 | EPICA | EPICB) {
                    ((((data[offset + 3] as u32) << 8) + data[offset + 4] as u32) & 0x0FFF) * 2
                } else {
                    ((((data[offset + 4] as u32) << 8) + data[offset + 5] as u32) & 0x0FFF) * 2
                };
            }
        } else if sampletype == 0xBB {
            // A surface interval: insert the equivalent run of zero-depth
            // samples, rounding down so the timestamps stay aligned to
            // the sample rate.
            let surftime = 60 * bcd2dec(data[offset + 1]) + bcd2dec(data[offset + 2]);
            let nsamples = surftime / self.interval;

            for _ in 0..nsamples {
                if self.complete {
                    self.time += self.interval;
                    queue.push_back(Sample::Time(self.time));
                }
                queue.push_back(Sample::Depth(0.0));
                self.complete = true;
            }
        } else {
            if self.have_temperature {
                match self.model {
                    GEO | ATOM1 | ELEMENT2 => self.temperature = data[offset + 6] as u32,
                    GEO20 | VEO20 | VEO30 | OC1A | OC1B | OC1C | OCI | A300 => {
                        self.temperature = data[offset + 3] as u32
                    }
                    OCS | TX1 => self.temperature = data[offset + 1] as u32,
                    VT4 | VT41 | ATOM3 | ATOM31 | A300AI => {
                        self.temperature = (((data[offset + 7] & 0xF0) >> 4)
                            | ((data[offset + 7] & 0x0C) << 2)
                            | ((data[offset + 5] & 0x0C) << 4))
                            as u32
                    }
                    A300CS | VTX => self.temperature = data[offset + 11] as u32,
                    _ => {
                        // A delta with a model-dependent sign bit.
                        let sign = match self.model {
                            DG03 | PROPLUS3 => (!data[offset + 5] & 0x04) >> 2,
                            VOYAGER2G | AMPHOS | AMPHOSAIR => (data[offset + 5] & 0x04) >> 2,
                            ATOM2 | PROPLUS21 | EPICA | EPICB | ATMOSAI2 | WISDOM2 | WISDOM3 => {
                                (data[offset] & 0x80) >> 7
                            }
                            _ => (!data[offset] & 0x80) >> 7,
                        };
                        let delta = ((data[offset + 7] & 0x0C) >> 2) as u32;
                        if sign != 0 {
                            self.temperature = self.temperature.wrapping_sub(delta);
                        } else {
                            self.temperature += delta;
                        }
                    }
                }
                queue.push_back(Sample::Temperature(fahrenheit_to_celsius(
                    self.temperature as f64,
                )));
            }

            if self.have_pressure {
                if matches!(self.model, OC1A | OC1B | OC1C | OCI) {
                    self.pressure =
                        (data[offset + 10] as u32 + ((data[offset + 11] as u32) << 8)) & 0x0FFF;
                } else if matches!(
                    self.model,
                    VT4 | VT41 | ATOM3 | ATOM31 | ZENAIR | A300AI | DG03 | PROPLUS3 | AMPHOSAIR
                ) {
                    self.pressure =
                        ((((data[offset] & 0x03) as u32) << 8) + data[offset + 1] as u32) * 5;
                } else if matches!(self.model, TX1 | A300CS | VTX) {
                    self.pressure = bytes::u16_le(data, offset + 4) as u32;
                } else {
                    self.pressure = self.pressure.wrapping_sub(data[offset + 1] as u32);
                }
                queue.push_back(Sample::Pressure {
                    tank: self.tank,
                    value: psi_to_bar(self.pressure as f64),
                });
            }

            // Depth (1/16 ft).
            let depth = if self.freedive {
                bytes::u16_le(data, offset) as u32
            } else if matches!(
                self.model,
                GEO20 | VEO20 | VEO30 | OC1A | OC1B | OC1C | OCI | A300
            ) {
                (data[offset + 4] as u32 + ((data[offset + 5] as u32) << 8)) & 0x0FFF
            } else if self.model == ATOM1 {
                data[offset + 3] as u32 * 16
            } else {
                (data[offset + 2] as u32 + ((data[offset + 3] as u32) << 8)) & 0x0FFF
            };
            queue.push_back(Sample::Depth(depth as f64 / 16.0 * FEET));

            if self.model == A300CS || self.model == VTX {
                let deco = ((data[offset + 15] & 0x70) >> 4) as u32;
                let (kind, stop_depth) = if deco != 0 {
                    (DecoKind::DecoStop, deco as f64 * 10.0 * FEET)
                } else {
                    (DecoKind::Ndl, 0.0)
                };
                queue.push_back(Sample::Deco {
                    kind,
                    depth: stop_depth,
                    time: (bytes::u16_le(data, offset + 6) & 0x03FF) as u32,
                });
            }

            self.complete = true;
        }

        self.offset += length;
        Ok(true)
    }
}
