//! Oceanic VT Pro records.
//!
//! Sample timestamps are minute-aligned BCD values, so several samples
//! share one minute: with a depth-triggered interval the block of
//! equal-minute samples is spread uniformly across the minute, with a
//! time-triggered interval the block length is fixed at `60 / interval`.

use std::collections::VecDeque;

use chrono::{NaiveDate, NaiveDateTime};

use crate::bytes::{bcd2dec, is_filled_with};
use crate::error::{Error, Result};
use crate::parser::{fahrenheit_to_celsius, DecodeStep, FieldKind, FieldValue, FEET};
use crate::sample::{Sample, VendorKind};
use crate::types::Gasmix;

const PAGESIZE: usize = 16;

const SZ_SAMPLE: usize = PAGESIZE / 2;

#[derive(Clone, Copy)]
struct Cache {
    divetime: u32,
    maxdepth: f64,
}

pub(crate) struct Vtpro {
    cache: Option<Cache>,
}

impl Vtpro {
    pub(crate) fn new() -> Self {
        Vtpro { cache: None }
    }

    pub(crate) fn invalidate(&mut self) {
        self.cache = None;
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < 8 {
            return Err(Error::DataFormat);
        }

        // The logbook entry only stores the last digit of the year; the
        // full year lives in the dive header page when it is present.
        let year = if data.len() < 40 {
            bcd2dec(data[4] & 0x0F) as i32 + 2000
        } else {
            bcd2dec(((data[32 + 3] & 0xC0) >> 2) + ((data[32 + 2] & 0xF0) >> 4)) as i32 + 2000
        };
        let month = ((data[4] & 0xF0) >> 4) as u32;
        let day = bcd2dec(data[3]);

        // 12-hour clock with an AM/PM flag.
        let mut hour = bcd2dec(data[1] & 0x7F) % 12;
        if data[1] & 0x80 != 0 {
            hour += 12;
        }
        let minute = bcd2dec(data[0]);

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .ok_or(Error::DataFormat)
    }

    fn cache(&mut self, data: &[u8]) -> Result<Cache> {
        if let Some(cache) = self.cache {
            return Ok(cache);
        }

        let mut stats = crate::parser::SampleStatistics::default();
        let mut it = crate::parser::StepIter::new(decoder(data)?);
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

    pub(crate) fn field(&mut self, data: &[u8], kind: FieldKind, _index: u32) -> Result<FieldValue> {
        if data.len() < 7 * PAGESIZE / 2 {
            return Err(Error::DataFormat);
        }

        let cache = self.cache(data)?;
        let footer = data.len() - PAGESIZE;

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(cache.divetime)),
            FieldKind::MaxDepth => {
                let depth = data[footer] as u32 + (((data[footer + 1] & 0x0F) as u32) << 8);
                Ok(FieldValue::Depth(depth as f64 * FEET))
            }
            FieldKind::GasmixCount => Ok(FieldValue::Count(1)),
            FieldKind::Gasmix => {
                let o2 = data[footer + 3];
                Ok(FieldValue::Gasmix(if o2 != 0 {
                    Gasmix {
                        oxygen: o2 as f64 / 100.0,
                        helium: 0.0,
                    }
                } else {
                    Gasmix::air()
                }))
            }
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        decoder(data)
    }
}

fn decoder(data: &[u8]) -> Result<Decoder<'_>> {
    if data.len() < 7 * PAGESIZE / 2 {
        return Err(Error::DataFormat);
    }

    let interval = match (data[0x27] >> 4) & 0x07 {
        0 => 2,
        1 => 15,
        2 => 30,
        3 => 60,
        _ => 0,
    };

    Ok(Decoder {
        data,
        interval,
        offset: 5 * PAGESIZE / 2,
        time: 0,
        timestamp: 0,
        count: 0,
        index: 0,
    })
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    /// Sample interval in seconds; 0 means depth-triggered sampling.
    interval: u32,
    offset: usize,
    time: u32,
    timestamp: u32,
    count: u32,
    index: u32,
}

impl<'a> Decoder<'a> {
    fn minute(&self, offset: usize) -> u32 {
        bcd2dec(self.data[offset + 1] & 0x0F) * 60 + bcd2dec(self.data[offset])
    }
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        let end = data.len() - PAGESIZE;

        if self.offset + SZ_SAMPLE > end {
            return Ok(false);
        }
        let offset = self.offset;

        // Erased samples are all zeros.
        if is_filled_with(&data[offset..offset + SZ_SAMPLE], 0x00) {
            self.offset += SZ_SAMPLE;
            return Ok(true);
        }

        let current = self.minute(offset);
        if current < self.timestamp {
            log::error!("timestamp moved backwards");
            return Err(Error::DataFormat);
        }

        if current != self.timestamp || self.count == 0 {
            // A sample with a new timestamp.
            self.index = 0;
            if self.interval != 0 {
                // With a time based interval the number of samples per
                // minute is fixed.
                self.count = 60 / self.interval;
            } else {
                // With a depth based interval the block of samples
                // sharing this minute has to be counted.
                self.count = 1;
                let mut idx = offset + SZ_SAMPLE;
                while idx + SZ_SAMPLE <= end {
                    if is_filled_with(&data[idx..idx + SZ_SAMPLE], 0x00) {
                        idx += SZ_SAMPLE;
                        continue;
                    }
                    if self.minute(idx) != current {
                        break;
                    }
                    idx += SZ_SAMPLE;
                    self.count += 1;
                }
            }
        } else {
            // Another sample within the same minute.
            self.index += 1;
        }

        if self.interval != 0 {
            if current > self.timestamp + 1 {
                log::error!("unexpected timestamp jump");
                return Err(Error::DataFormat);
            }
            if self.index >= self.count {
                log::warn!("unexpected sample with the same timestamp ignored");
                self.offset += SZ_SAMPLE;
                return Ok(true);
            }
        }

        self.timestamp = current;

        if self.interval != 0 {
            self.time += self.interval;
        } else {
            self.time = (current as f64 * 60.0
                + (self.index as f64 + 1.0) * 60.0 / self.count as f64
                + 0.5) as u32;
        }
        queue.push_back(Sample::Time(self.time));

        queue.push_back(Sample::Vendor {
            kind: VendorKind::OceanicVtpro,
            data: data[offset..offset + SZ_SAMPLE].to_vec(),
        });

        let depth = data[offset + 3] as f64;
        queue.push_back(Sample::Depth(depth * FEET));

        let temperature = data[offset + 6] as f64;
        queue.push_back(Sample::Temperature(fahrenheit_to_celsius(temperature)));

        self.offset += SZ_SAMPLE;
        Ok(true)
    }
}
