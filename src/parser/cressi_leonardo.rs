//! Cressi Leonardo profile records.
//!
//! Header layout (82 bytes):
//!   0x06  u16 LE  dive time, in 20 s ticks
//!   0x08  date/time: year-2000, month, day, hour, minute
//!   0x19  oxygen percentage
//!   0x20  u16 LE  maximum depth (1/10 m)
//!   0x22  minimum temperature (°C)
//! Samples are 2-byte LE words at a fixed 20 s interval.

use std::collections::VecDeque;

use chrono::{NaiveDate, NaiveDateTime};

use crate::bytes;
use crate::error::{Error, Result};
use crate::parser::{DecodeStep, FieldKind, FieldValue};
use crate::sample::{Sample, SampleEventKind};
use crate::types::Gasmix;

const SZ_HEADER: usize = 82;

const INTERVAL: u32 = 20;

pub(crate) struct Leonardo;

impl Leonardo {
    pub(crate) fn new() -> Self {
        Leonardo
    }

    pub(crate) fn invalidate(&mut self) {}

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        if data.len() < SZ_HEADER {
            return Err(Error::DataFormat);
        }

        NaiveDate::from_ymd_opt(data[8] as i32 + 2000, data[9] as u32, data[10] as u32)
            .and_then(|date| date.and_hms_opt(data[11] as u32, data[12] as u32, 0))
            .ok_or(Error::DataFormat)
    }

    pub(crate) fn field(
        &mut self,
        data: &[u8],
        kind: FieldKind,
        _index: u32,
    ) -> Result<FieldValue> {
        if data.len() < SZ_HEADER {
            return Err(Error::DataFormat);
        }

        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(
                bytes::u16_le(data, 0x06) as u32 * INTERVAL,
            )),
            FieldKind::MaxDepth => Ok(FieldValue::Depth(bytes::u16_le(data, 0x20) as f64 / 10.0)),
            FieldKind::GasmixCount => Ok(FieldValue::Count(1)),
            FieldKind::Gasmix => Ok(FieldValue::Gasmix(Gasmix {
                oxygen: data[0x19] as f64 / 100.0,
                helium: 0.0,
            })),
            FieldKind::TemperatureMinimum => Ok(FieldValue::Temperature(data[0x22] as f64)),
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        Ok(Decoder {
            data,
            offset: SZ_HEADER,
            time: 0,
        })
    }
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
    time: u32,
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        if self.offset + 2 > self.data.len() {
            return Ok(false);
        }

        let value = bytes::u16_le(self.data, self.offset);
        let depth = value & 0x07FF;
        let ascent = (value & 0xC000) >> 14;

        self.time += INTERVAL;
        queue.push_back(Sample::Time(self.time));
        queue.push_back(Sample::Depth(depth as f64 / 10.0));

        if ascent != 0 {
            queue.push_back(Sample::Event {
                kind: SampleEventKind::Ascent,
                value: ascent as u32,
                transition: None,
            });
        }

        self.offset += 2;
        Ok(true)
    }
}
