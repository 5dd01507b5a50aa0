//! DiveSystem iDive dive blobs: a 0x32-byte header followed by 0x2A-byte
//! fixed-width sample records, each carrying its own absolute timestamp.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use crate::bytes;
use crate::clock;
use crate::error::{Error, Result};
use crate::parser::{DecodeStep, FieldKind, FieldValue, StepIter};
use crate::sample::{DecoKind, Sample};
use crate::types::Gasmix;

const SZ_HEADER: usize = 0x32;
const SZ_SAMPLE: usize = 0x2A;

const NGASMIXES: usize = 8;

/// 2008-01-01 00:00:00 UTC, the device's timestamp epoch.
const EPOCH: i64 = 1199145600;

#[derive(Clone)]
struct Cache {
    divetime: u32,
    maxdepth: u32,
    gasmixes: Vec<(u32, u32)>,
}

pub(crate) struct Idive {
    cache: Option<Cache>,
}

impl Idive {
    pub(crate) fn new() -> Self {
        Idive { cache: None }
    }

    pub(crate) fn invalidate(&mut self) {
        self.cache = None;
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < SZ_HEADER {
            return Err(Error::DataFormat);
        }

        let ticks = bytes::u32_le(data, 7) as i64 + EPOCH;
        clock::localtime(ticks).ok_or(Error::DataFormat)
    }

    fn cache(&mut self, data: &[u8]) -> Result<&Cache> {
        if self.cache.is_none() {
            let mut it = StepIter::new(self.decoder_inner(data));
            let mut stats = crate::parser::SampleStatistics::default();
            let mut gasmixes: Vec<(u32, u32)> = Vec::new();
            while let Some(sample) = it.next_sample() {
                let sample = sample?;
                stats.update(&sample);
                if let Sample::GasChange { oxygen, helium, .. } = sample {
                    if !gasmixes.contains(&(oxygen, helium)) {
                        gasmixes.push((oxygen, helium));
                    }
                }
            }
            self.cache = Some(Cache {
                divetime: stats.divetime,
                maxdepth: (stats.maxdepth * 10.0).round() as u32,
                gasmixes,
            });
        }
        Ok(self.cache.as_ref().unwrap())
    }

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, index: u32) -> Result<FieldValue> {
        if data.len() < SZ_HEADER {
            return Err(Error::DataFormat);
        }

        let cache = self.cache(data)?.clone();

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(cache.divetime)),
            FieldKind::MaxDepth => Ok(FieldValue::Depth(cache.maxdepth as f64 / 10.0)),
            FieldKind::GasmixCount => Ok(FieldValue::Count(cache.gasmixes.len() as u32)),
            FieldKind::Gasmix => {
                let &(o2, he) = cache
                    .gasmixes
                    .get(index as usize)
                    .ok_or(Error::InvalidArgs)?;
                Ok(FieldValue::Gasmix(Gasmix {
                    oxygen: o2 as f64 / 100.0,
                    helium: he as f64 / 100.0,
                }))
            }
            FieldKind::Atmospheric => Ok(FieldValue::Pressure(
                bytes::u16_le(data, 11) as f64 / 1000.0,
            )),
            _ => Err(Error::Unsupported),
        }
    }

    fn decoder_inner<'a>(&self, data: &'a [u8]) -> Decoder<'a> {
        Decoder {
            data,
            offset: SZ_HEADER,
            time: 0,
            previous_mix: None,
            gasmixes: Vec::new(),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        Ok(self.decoder_inner(data))
    }
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
    time: u32,
    previous_mix: Option<(u32, u32)>,
    gasmixes: Vec<(u32, u32)>,
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        if self.offset + SZ_SAMPLE > data.len() {
            return Ok(false);
        }
        let offset = self.offset;

        // Every sample stores the full timestamp; it must keep moving
        // forward.
        let timestamp = bytes::u32_le(data, offset + 2);
        if timestamp <= self.time {
            log::error!("timestamp moved backwards");
            return Err(Error::DataFormat);
        }
        self.time = timestamp;
        queue.push_back(Sample::Time(timestamp));

        let depth = bytes::u16_le(data, offset + 6);
        queue.push_back(Sample::Depth(depth as f64 / 10.0));

        let temperature = bytes::u16_le(data, offset + 8) as i16;
        queue.push_back(Sample::Temperature(temperature as f64 / 10.0));

        let o2 = data[offset + 10] as u32;
        let he = data[offset + 11] as u32;
        if self.previous_mix != Some((o2, he)) {
            let mix = match self.gasmixes.iter().position(|&m| m == (o2, he)) {
                Some(i) => i,
                None => {
                    if self.gasmixes.len() >= NGASMIXES {
                        log::error!("maximum number of gas mixes reached");
                        return Err(Error::DataFormat);
                    }
                    self.gasmixes.push((o2, he));
                    self.gasmixes.len() - 1
                }
            };
            queue.push_back(Sample::GasChange {
                oxygen: o2,
                helium: he,
                mix: Some(mix as u32),
            });
            self.previous_mix = Some((o2, he));
        }

        let deco = bytes::u16_le(data, offset + 21);
        let tts = bytes::u16_le(data, offset + 23);
        if tts != 0xFFFF {
            let (kind, depth) = if deco != 0 {
                (DecoKind::DecoStop, deco as f64 / 10.0)
            } else {
                (DecoKind::Ndl, 0.0)
            };
            queue.push_back(Sample::Deco {
                kind,
                depth,
                time: tts as u32,
            });
        }

        let cns = bytes::u16_le(data, offset + 29);
        queue.push_back(Sample::Cns(cns as f64 / 100.0));

        self.offset += SZ_SAMPLE;
        Ok(true)
    }
}
