//! Reefnet Sensus Pro and Ultra recorders.
//!
//! Both store absolute water pressure instead of depth; converting to
//! meters needs the installable calibration (surface pressure and
//! hydrostatic pressure per meter). Timestamps are relative to the device
//! clock and resolved against the clock pair sampled at download time.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use crate::bytes;
use crate::clock::{self, DeviceClock};
use crate::error::{Error, Result};
use crate::parser::{fahrenheit_to_celsius, DecodeStep, FieldKind, FieldValue, ATM, BAR, FSW, GRAVITY};
use crate::sample::Sample;
use crate::types::DiveMode;

fn default_hydrostatic() -> f64 {
    1025.0 * GRAVITY
}

#[derive(Clone, Copy)]
struct Cache {
    divetime: u32,
    maxdepth: u32,
}

pub(crate) struct SensusPro {
    atmospheric: f64,
    hydrostatic: f64,
    clock: DeviceClock,
    cache: Option<Cache>,
}

impl SensusPro {
    pub(crate) fn new(clock: DeviceClock) -> Self {
        SensusPro {
            atmospheric: ATM,
            hydrostatic: default_hydrostatic(),
            clock,
            cache: None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.cache = None;
    }

    pub(crate) fn set_calibration(&mut self, atmospheric: f64, hydrostatic: f64) {
        self.atmospheric = atmospheric;
        self.hydrostatic = hydrostatic;
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < 6 + 4 {
            return Err(Error::DataFormat);
        }

        let timestamp = bytes::u32_le(data, 6);
        clock::localtime(self.clock.resolve(timestamp)).ok_or(Error::DataFormat)
    }

    fn cache(&mut self, data: &[u8]) -> Cache {
        if let Some(cache) = self.cache {
            return cache;
        }

        let interval = bytes::u16_le(data, 4) as u32;

        let mut maxdepth = 0u32;
        let mut nsamples = 0u32;
        let mut offset = 10;
        while offset + 2 <= data.len() && data[offset..offset + 2] != [0xFF, 0xFF] {
            let value = bytes::u16_le(data, offset);
            let depth = (value & 0x01FF) as u32;
            if depth > maxdepth {
                maxdepth = depth;
            }
            nsamples += 1;
            offset += 2;
        }

        let cache = Cache {
            divetime: nsamples * interval,
            maxdepth,
        };
        self.cache = Some(cache);
        cache
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, _index: u32) -> Result<FieldValue> {
        if data.len() < 12 {
            return Err(Error::DataFormat);
        }

        let cache = self.cache(data);

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(cache.divetime)),
            FieldKind::MaxDepth => Ok(FieldValue::Depth(
                (cache.maxdepth as f64 * FSW - self.atmospheric) / self.hydrostatic,
            )),
            FieldKind::GasmixCount => Ok(FieldValue::Count(0)),
            FieldKind::DiveMode => Ok(FieldValue::Mode(DiveMode::Gauge)),
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<ProDecoder<'a>> {
        Ok(ProDecoder {
            data,
            atmospheric: self.atmospheric,
            hydrostatic: self.hydrostatic,
            state: ProState::Scanning { offset: 0 },
        })
    }
}

enum ProState {
    /// Looking for the 4 × 0x00 dive start marker.
    Scanning { offset: usize },
    Samples {
        offset: usize,
        time: u32,
        interval: u32,
    },
    Done,
}

pub(crate) struct ProDecoder<'a> {
    data: &'a [u8],
    atmospheric: f64,
    hydrostatic: f64,
    state: ProState,
}

impl<'a> DecodeStep for ProDecoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        match self.state {
            ProState::Scanning { mut offset } => {
                while offset + 4 <= data.len() {
                    if data[offset..offset + 4] == [0x00; 4] {
                        if offset + 10 > data.len() {
                            return Err(Error::DataFormat);
                        }
                        let interval = bytes::u16_le(data, offset + 4) as u32;
                        self.state = ProState::Samples {
                            offset: offset + 10,
                            time: 0,
                            interval,
                        };
                        return Ok(true);
                    }
                    offset += 1;
                }
                self.state = ProState::Done;
                Ok(false)
            }
            ProState::Samples {
                offset,
                time,
                interval,
            } => {
                if offset + 2 > data.len() || data[offset..offset + 2] == [0xFF, 0xFF] {
                    self.state = ProState::Done;
                    return Ok(false);
                }

                let value = bytes::u16_le(data, offset);
                let depth = (value & 0x01FF) as f64;
                let temperature = ((value & 0xFE00) >> 9) as f64;

                let time = time + interval;
                queue.push_back(Sample::Time(time));
                queue.push_back(Sample::Temperature(fahrenheit_to_celsius(temperature)));
                queue.push_back(Sample::Depth(
                    (depth * FSW - self.atmospheric) / self.hydrostatic,
                ));

                self.state = ProState::Samples {
                    offset: offset + 2,
                    time,
                    interval,
                };
                Ok(true)
            }
            ProState::Done => Ok(false),
        }
    }
}

pub(crate) struct SensusUltra {
    atmospheric: f64,
    hydrostatic: f64,
    clock: DeviceClock,
    cache: Option<Cache>,
}

impl SensusUltra {
    pub(crate) fn new(clock: DeviceClock) -> Self {
        SensusUltra {
            atmospheric: ATM,
            hydrostatic: default_hydrostatic(),
            clock,
            cache: None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.cache = None;
    }

    pub(crate) fn set_calibration(&mut self, atmospheric: f64, hydrostatic: f64) {
        self.atmospheric = atmospheric;
        self.hydrostatic = hydrostatic;
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < 4 + 4 {
            return Err(Error::DataFormat);
        }

        let timestamp = bytes::u32_le(data, 4);
        clock::localtime(self.clock.resolve(timestamp)).ok_or(Error::DataFormat)
    }

    fn cache(&mut self, data: &[u8]) -> Cache {
        if let Some(cache) = self.cache {
            return cache;
        }

        let interval = bytes::u16_le(data, 8) as u32;
        let threshold = bytes::u16_le(data, 10) as u32;

        let mut maxdepth = 0u32;
        let mut nsamples = 0u32;
        let mut offset = 16;
        while offset + 4 <= data.len() && data[offset..offset + 4] != [0xFF; 4] {
            let depth = bytes::u16_le(data, offset + 2) as u32;
            // Only samples at or below the dive threshold count towards
            // the dive time.
            if depth >= threshold {
                if depth > maxdepth {
                    maxdepth = depth;
                }
                nsamples += 1;
            }
            offset += 4;
        }

        let cache = Cache {
            divetime: nsamples * interval,
            maxdepth,
        };
        self.cache = Some(cache);
        cache
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, _index: u32) -> Result<FieldValue> {
        if data.len() < 20 {
            return Err(Error::DataFormat);
        }

        let cache = self.cache(data);

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(cache.divetime)),
            FieldKind::MaxDepth => Ok(FieldValue::Depth(
                (cache.maxdepth as f64 * BAR / 1000.0 - self.atmospheric) / self.hydrostatic,
            )),
            FieldKind::GasmixCount => Ok(FieldValue::Count(0)),
            FieldKind::DiveMode => Ok(FieldValue::Mode(DiveMode::Gauge)),
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<UltraDecoder<'a>> {
        Ok(UltraDecoder {
            data,
            atmospheric: self.atmospheric,
            hydrostatic: self.hydrostatic,
            state: UltraState::Scanning { offset: 0 },
        })
    }
}

enum UltraState {
    Scanning { offset: usize },
    Samples {
        offset: usize,
        time: u32,
        interval: u32,
    },
    Done,
}

pub(crate) struct UltraDecoder<'a> {
    data: &'a [u8],
    atmospheric: f64,
    hydrostatic: f64,
    state: UltraState,
}

impl<'a> DecodeStep for UltraDecoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        match self.state {
            UltraState::Scanning { mut offset } => {
                while offset + 4 <= data.len() {
                    if data[offset..offset + 4] == [0x00; 4] {
                        if offset + 16 > data.len() {
                            return Err(Error::DataFormat);
                        }
                        let interval = bytes::u16_le(data, offset + 8) as u32;
                        self.state = UltraState::Samples {
                            offset: offset + 16,
                            time: 0,
                            interval,
                        };
                        return Ok(true);
                    }
                    offset += 1;
                }
                self.state = UltraState::Done;
                Ok(false)
            }
            UltraState::Samples {
                offset,
                time,
                interval,
            } => {
                if offset + 4 > data.len() || data[offset..offset + 4] == [0xFF; 4] {
                    self.state = UltraState::Done;
                    return Ok(false);
                }

                let time = time + interval;
                queue.push_back(Sample::Time(time));

                // Temperature in units of 0.01 K.
                let temperature = bytes::u16_le(data, offset) as f64;
                queue.push_back(Sample::Temperature(temperature / 100.0 - 273.15));

                // Absolute pressure in millibar.
                let depth = bytes::u16_le(data, offset + 2) as f64;
                queue.push_back(Sample::Depth(
                    (depth * BAR / 1000.0 - self.atmospheric) / self.hydrostatic,
                ));

                self.state = UltraState::Samples {
                    offset: offset + 4,
                    time,
                    interval,
                };
                Ok(true)
            }
            UltraState::Done => Ok(false),
        }
    }
}
