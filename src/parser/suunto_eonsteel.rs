//! Suunto EON Steel logs.
//!
//! A dive file is a self-describing stream: each entry introduces a type
//! descriptor (a `<PTH>/<GRP>/<FRM>/<MOD>` tag text naming the field and
//! its format) followed by data items referencing earlier descriptors by
//! id. The download layer prepends the dive's UNIX timestamp, taken from
//! the file name, as four extra bytes; the SBEM magic follows it.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use crate::bytes;
use crate::clock;
use crate::error::{Error, Result};
use crate::parser::{DecodeStep, FieldKind, FieldValue};
use crate::sample::{DecoKind, Sample, SampleEventKind, Transition};
use crate::types::{FieldString, Gasmix};

const MAXTYPE: usize = 512;
const MAXGASES: usize = 16;

/// One registered type descriptor.
struct TypeDesc {
    desc: Option<String>,
    format: Option<String>,
    modifier: Option<String>,
}

fn record_type(types: &mut Vec<Option<TypeDesc>>, typ: u16, text: &[u8]) {
    let mut desc = TypeDesc {
        desc: None,
        format: None,
        modifier: None,
    };

    for part in text.split(|&b| b == b'\n') {
        if part.len() < 5 || part[0] != b'<' || part[4] != b'>' {
            log::error!(
                "unexpected type description: {}",
                String::from_utf8_lossy(part)
            );
            return;
        }
        let content = String::from_utf8_lossy(&part[5..]).into_owned();
        // PTH, GRP, FRM, MOD
        match part[1] {
            b'P' | b'G' => desc.desc = Some(content),
            b'F' => desc.format = Some(content),
            b'M' => desc.modifier = Some(content),
            _ => {
                log::error!(
                    "unknown type descriptor: {}",
                    String::from_utf8_lossy(part)
                );
                return;
            }
        }
    }

    if typ as usize > MAXTYPE {
        log::error!(
            "type out of range ({:04x}: '{}' '{}' '{}')",
            typ,
            desc.desc.as_deref().unwrap_or(""),
            desc.format.as_deref().unwrap_or(""),
            desc.modifier.as_deref().unwrap_or("")
        );
        return;
    }

    types[typ as usize] = Some(desc);
}

struct EntryHeader {
    typ: u16,
    text_start: usize,
    text_len: usize,
    data_start: usize,
}

/// An entry opens with a zero byte and the descriptor text length,
/// followed by the type id and the NUL-terminated tag text. A text
/// length of 0xFF extends to 32 bits.
fn parse_entry_header(data: &[u8], offset: usize) -> Option<EntryHeader> {
    if offset + 2 > data.len() || data[offset] != 0 {
        return None;
    }

    let mut textlen = data[offset + 1] as usize;
    let mut name = offset + 2;
    if textlen == 0xFF {
        if name + 4 > data.len() {
            return None;
        }
        textlen = bytes::u32_le(data, name) as usize;
        name += 4;
    }

    if textlen < 4 || name + textlen > data.len() {
        return None;
    }

    let typ = bytes::u16_le(data, name);
    let text_start = name + 2;
    if data[text_start] != b'<' {
        return None;
    }

    Some(EntryHeader {
        typ,
        text_start,
        // The trailing NUL is not part of the text.
        text_len: textlen - 3,
        data_start: name + textlen,
    })
}

struct Item {
    typ: usize,
    start: usize,
    len: usize,
    next: usize,
}

/// Parse one data item at `offset`: type id and length, both with 0xFF
/// escape codes extending them to 16 and 32 bits.
fn parse_item(data: &[u8], offset: usize) -> Option<Item> {
    let mut pos = offset;

    let mut typ = data[pos] as usize;
    pos += 1;
    if typ == 0xFF {
        if pos + 2 > data.len() {
            return None;
        }
        typ = bytes::u16_le(data, pos) as usize;
        pos += 2;
    }

    if pos >= data.len() {
        return None;
    }
    let mut len = data[pos] as usize;
    pos += 1;
    if len == 0xFF {
        if pos + 4 > data.len() {
            return None;
        }
        len = bytes::u32_le(data, pos) as usize;
        pos += 4;
    }

    if pos + len > data.len() {
        return None;
    }

    Some(Item {
        typ,
        start: pos,
        len,
        next: pos + len,
    })
}

/// Walk every data item of the file, registering descriptors as they
/// appear. Malformed entries end the walk; whatever was decoded before
/// them stays valid.
fn traverse_records(data: &[u8], mut callback: impl FnMut(u16, &TypeDesc, &[u8])) {
    // Dive files start with "SBEM" after the prepended timestamp.
    if data.len() < 12 || &data[4..8] != b"SBEM" {
        return;
    }

    let mut types: Vec<Option<TypeDesc>> = (0..=MAXTYPE).map(|_| None).collect();

    let mut offset = 12;
    while data.len().saturating_sub(offset) > 4 {
        let entry = match parse_entry_header(data, offset) {
            Some(entry) => entry,
            None => {
                log::debug!("bad dive entry");
                return;
            }
        };
        record_type(
            &mut types,
            entry.typ,
            &data[entry.text_start..entry.text_start + entry.text_len],
        );

        let mut pos = entry.data_start;
        while pos < data.len() && data[pos] != 0 {
            let item = match parse_item(data, pos) {
                Some(item) => item,
                None => {
                    log::debug!("truncated data item");
                    return;
                }
            };
            match types.get(item.typ).and_then(|d| d.as_ref()) {
                Some(desc) => callback(
                    item.typ as u16,
                    desc,
                    &data[item.start..item.start + item.len],
                ),
                None => log::debug!("data item with unregistered type {:04x}", item.typ),
            }
            pos = item.next;
        }
        offset = pos;
    }
}

fn f32_le(data: &[u8]) -> f64 {
    f32::from_bits(bytes::u32_le(data, 0)) as f64
}

fn nul_terminated(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

#[derive(Default)]
struct Cache {
    divetime_ms: u32,
    maxdepth: Option<f64>,
    gasmix: Vec<Gasmix>,
    have_gases: bool,
    atmospheric: Option<f64>,
    strings: Vec<FieldString>,
}

impl Cache {
    fn add_string(&mut self, desc: &'static str, value: String) {
        self.strings.push(FieldString { desc, value });
    }

    fn set_depth(&mut self, raw: u16) {
        if raw != 0xFFFF {
            let depth = raw as f64 / 100.0;
            if depth > self.maxdepth.unwrap_or(0.0) {
                self.maxdepth = Some(depth);
            }
        }
    }

    fn device_field(&mut self, name: &str, data: &[u8]) {
        match name {
            "SerialNumber" => self.add_string("Serial", nul_terminated(data)),
            "Info.HW" => self.add_string("HW Version", nul_terminated(data)),
            "Info.SW" => self.add_string("FW Version", nul_terminated(data)),
            "Info.BatteryAtStart" => self.add_string("Battery at start", nul_terminated(data)),
            "Info.BatteryAtEnd" => self.add_string("Battery at end", nul_terminated(data)),
            _ => {}
        }
    }

    fn header_field(&mut self, name: &str, data: &[u8]) {
        match name {
            "Depth.Max" if data.len() >= 4 => {
                let depth = f32_le(data);
                if depth > self.maxdepth.unwrap_or(0.0) {
                    self.maxdepth = Some(depth);
                }
            }
            "Diving.SurfacePressure" if data.len() >= 4 => {
                // Stored in pascal.
                let pressure = bytes::u32_le(data, 0);
                self.atmospheric = Some(pressure as f64 / 100000.0);
            }
            "DateTime" => self.add_string("Dive ID", nul_terminated(data)),
            "Diving.Algorithm" => self.add_string("Deco algorithm", nul_terminated(data)),
            "Diving.DiveMode" => self.add_string("Dive Mode", nul_terminated(data)),
            "Diving.Conservatism" if !data.is_empty() => {
                self.add_string("Personal Adjustment", format!("P{}", data[0] as i8))
            }
            _ => {}
        }
    }

    fn dynamic_field(&mut self, desc: &TypeDesc, data: &[u8]) {
        let name = match desc.desc.as_deref() {
            Some(name) => name,
            None => return,
        };
        if let Some(name) = name.strip_prefix("sml.DeviceLog.") {
            if let Some(name) = name.strip_prefix("Device.") {
                self.device_field(name, data);
            } else if let Some(name) = name.strip_prefix("Header.") {
                self.header_field(name, data);
            }
        }
    }

    fn field(&mut self, typ: u16, desc: &TypeDesc, data: &[u8]) {
        match typ {
            // Group: time in the first word, depth in the second.
            0x0001 if data.len() >= 4 => {
                self.divetime_ms += bytes::u16_le(data, 0) as u32;
                self.set_depth(bytes::u16_le(data, 2));
            }
            0x0002 if data.len() >= 2 => self.divetime_ms += bytes::u16_le(data, 0) as u32,
            0x0003 if data.len() >= 2 => self.set_depth(bytes::u16_le(data, 0)),
            // Gas state, oxygen and helium percentages.
            0x000d if !data.is_empty() => {
                if self.gasmix.len() < MAXGASES {
                    self.gasmix.push(Gasmix::default());
                }
                self.have_gases = true;
            }
            0x000e if !data.is_empty() => {
                if let Some(mix) = self.gasmix.last_mut() {
                    mix.oxygen = data[0] as f64 / 100.0;
                }
            }
            0x000f if !data.is_empty() => {
                if let Some(mix) = self.gasmix.last_mut() {
                    mix.helium = data[0] as f64 / 100.0;
                }
            }
            0x0011 => self.add_string("Transmitter ID", nul_terminated(data)),
            typ if typ > 255 => self.dynamic_field(desc, data),
            _ => {}
        }
    }
}

pub(crate) struct Eonsteel {
    cache: Cache,
}

impl Eonsteel {
    /// The model code is accepted for registry symmetry; the log format
    /// is identical across the family.
    pub(crate) fn new(_model: u32) -> Self {
        Eonsteel {
            cache: Cache::default(),
        }
    }

    /// Rebuild the descriptor table and field cache for a new record.
    pub(crate) fn install(&mut self, data: &[u8]) {
        let mut cache = Cache::default();
        traverse_records(data, |typ, desc, payload| cache.field(typ, desc, payload));
        self.cache = cache;
    }

    pub(crate) fn datetime(&self, data: &[u8]) -> Result<NaiveDateTime> {
        // The dive time is the prepended download timestamp.
        if data.len() < 4 {
            return Err(Error::Unsupported);
        }
        clock::gmtime(bytes::u32_le(data, 0) as i64).ok_or(Error::DataFormat)
    }

    pub(crate) fn field(&mut self, _data: &[u8], kind: FieldKind, index: u32) -> Result<FieldValue> {
        let cache = &self.cache;
        match kind {
            FieldKind::DiveTime => Ok(FieldValue::Time(cache.divetime_ms / 1000)),
            FieldKind::MaxDepth => cache
                .maxdepth
                .map(FieldValue::Depth)
                .ok_or(Error::Unsupported),
            FieldKind::GasmixCount => {
                if cache.have_gases {
                    Ok(FieldValue::Count(cache.gasmix.len() as u32))
                } else {
                    Err(Error::Unsupported)
                }
            }
            FieldKind::Gasmix => cache
                .gasmix
                .get(index as usize)
                .copied()
                .map(FieldValue::Gasmix)
                .ok_or(Error::Unsupported),
            FieldKind::Atmospheric => cache
                .atmospheric
                .map(FieldValue::Pressure)
                .ok_or(Error::Unsupported),
            FieldKind::String => cache
                .strings
                .get(index as usize)
                .cloned()
                .map(FieldValue::String)
                .ok_or(Error::Unsupported),
            _ => Err(Error::Unsupported),
        }
    }

    pub(crate) fn decoder<'a>(&mut self, data: &'a [u8]) -> Result<Decoder<'a>> {
        Ok(Decoder {
            data,
            types: (0..=MAXTYPE).map(|_| None).collect(),
            cursor: if data.len() >= 12 && &data[4..8] == b"SBEM" {
                Cursor::Entry(12)
            } else {
                Cursor::Done
            },
            gasmix: self.cache.gasmix.clone(),
            time_ms: 0,
            notify_type: 0,
            warning_type: 0,
            alarm_type: 0,
        })
    }
}

enum Cursor {
    Entry(usize),
    Items(usize),
    Done,
}

pub(crate) struct Decoder<'a> {
    data: &'a [u8],
    types: Vec<Option<TypeDesc>>,
    cursor: Cursor,
    gasmix: Vec<Gasmix>,
    time_ms: u32,
    notify_type: u8,
    warning_type: u8,
    alarm_type: u8,
}

/// Notification type byte to event kind; `None` entries have no
/// counterpart in the public taxonomy.
#[rustfmt::skip]
static NOTIFICATIONS: [Option<SampleEventKind>; 16] = [
    None,                                         // NoFly Time
    None,                                         // Depth
    None,                                         // Surface Time
    Some(SampleEventKind::TissueLevel),
    None,                                         // Deco
    None,                                         // Deco Window
    Some(SampleEventKind::SafetyStopVoluntary),   // Safety Stop Ahead
    Some(SampleEventKind::SafetyStop),
    Some(SampleEventKind::CeilingSafetyStop),     // Safety Stop Broken
    None,                                         // Deep Stop Ahead
    Some(SampleEventKind::DeepStop),
    Some(SampleEventKind::DiveTime),
    None,                                         // Gas Available
    None,                                         // SetPoint Switch
    None,                                         // Diluent Hypoxia
    None,                                         // Tank Pressure
];

#[rustfmt::skip]
static WARNINGS: [Option<SampleEventKind>; 14] = [
    None,                                         // ICD Penalty
    Some(SampleEventKind::Violation),             // Deep Stop Penalty
    Some(SampleEventKind::SafetyStopMandatory),
    None,                                         // OTU250
    None,                                         // OTU300
    None,                                         // CNS80%
    None,                                         // CNS100%
    Some(SampleEventKind::AirTime),
    Some(SampleEventKind::MaxDepth),
    Some(SampleEventKind::AirTime),               // Tank Pressure
    Some(SampleEventKind::CeilingSafetyStop),     // Safety Stop Broken
    Some(SampleEventKind::CeilingSafetyStop),     // Deep Stop Broken
    Some(SampleEventKind::Ceiling),               // Ceiling Broken
    Some(SampleEventKind::Po2),                   // PO2 High
];

#[rustfmt::skip]
static ALARMS: [Option<SampleEventKind>; 7] = [
    Some(SampleEventKind::CeilingSafetyStop),     // Mandatory Safety Stop Broken
    Some(SampleEventKind::Ascent),                // Ascent Speed
    None,                                         // Diluent Hyperoxia
    Some(SampleEventKind::Violation),             // Violated Deep Stop
    Some(SampleEventKind::Ceiling),               // Ceiling Broken
    Some(SampleEventKind::Po2),                   // PO2 High
    Some(SampleEventKind::Po2),                   // PO2 Low
];

impl<'a> Decoder<'a> {
    fn push_time(&mut self, queue: &mut VecDeque<Sample>, delta_ms: u16) {
        self.time_ms += delta_ms as u32;
        queue.push_back(Sample::Time(self.time_ms / 1000));
    }

    fn push_depth(&self, queue: &mut VecDeque<Sample>, raw: u16) {
        if raw == 0xFFFF {
            return;
        }
        queue.push_back(Sample::Depth(raw as f64 / 100.0));
    }

    fn push_temperature(&self, queue: &mut VecDeque<Sample>, raw: i16) {
        if raw < -3000 {
            return;
        }
        queue.push_back(Sample::Temperature(raw as f64 / 10.0));
    }

    fn push_deco(&self, queue: &mut VecDeque<Sample>, ndl: i16, tts: u16, ceiling: u16) {
        let sample = if ndl < 0 {
            Sample::Deco {
                kind: DecoKind::DecoStop,
                time: if tts != 0xFFFF { tts as u32 } else { 0 },
                depth: if ceiling != 0xFFFF {
                    ceiling as f64 / 100.0
                } else {
                    0.0
                },
            }
        } else {
            Sample::Deco {
                kind: DecoKind::Ndl,
                time: ndl as u32,
                depth: 0.0,
            }
        };
        queue.push_back(sample);
    }

    fn push_pressure(&self, queue: &mut VecDeque<Sample>, idx: u8, raw: u16) {
        if raw == 0xFFFF {
            return;
        }
        queue.push_back(Sample::Pressure {
            tank: (idx as u32).wrapping_sub(1),
            value: raw as f64 / 100.0,
        });
    }

    fn push_translated(
        &self,
        queue: &mut VecDeque<Sample>,
        table: &[Option<SampleEventKind>],
        typ: u8,
        value: u8,
    ) {
        let kind = match table.get(typ as usize).copied().flatten() {
            Some(kind) => kind,
            None => return,
        };
        queue.push_back(Sample::Event {
            kind,
            value: 0,
            transition: Some(if value != 0 {
                Transition::Begin
            } else {
                Transition::End
            }),
        });
    }

    fn push_gas_switch(&self, queue: &mut VecDeque<Sample>, idx: u16) {
        let idx = idx as usize;
        if idx < 1 || idx > self.gasmix.len() {
            return;
        }
        let mix = self.gasmix[idx - 1];
        queue.push_back(Sample::GasChange {
            oxygen: (100.0 * mix.oxygen) as u32,
            helium: (100.0 * mix.helium) as u32,
            mix: Some((idx - 1) as u32),
        });
    }

    fn dispatch(&mut self, queue: &mut VecDeque<Sample>, typ: usize, payload: &[u8]) {
        let u16_at = |offset: usize| -> Option<u16> {
            if offset + 2 <= payload.len() {
                Some(bytes::u16_le(payload, offset))
            } else {
                None
            }
        };

        match typ {
            // Group: time, depth, temperature and deco in one record.
            0x0001 => {
                if let Some(delta) = u16_at(0) {
                    self.push_time(queue, delta);
                }
                if let Some(depth) = u16_at(2) {
                    self.push_depth(queue, depth);
                }
                if let Some(temp) = u16_at(4) {
                    self.push_temperature(queue, temp as i16);
                }
                if let (Some(ndl), Some(tts), Some(ceiling)) = (u16_at(8), u16_at(10), u16_at(12))
                {
                    self.push_deco(queue, ndl as i16, tts, ceiling);
                }
            }
            0x0002 => {
                if let Some(delta) = u16_at(0) {
                    self.push_time(queue, delta);
                }
            }
            0x0003 => {
                if let Some(depth) = u16_at(0) {
                    self.push_depth(queue, depth);
                }
            }
            // Cylinder index byte, pressure in the next word.
            0x000a => {
                if payload.len() >= 3 {
                    self.push_pressure(queue, payload[0], bytes::u16_le(payload, 1));
                }
            }
            // The event records arrive in pairs: a type byte, then a
            // boolean value interpreted against the matching table.
            0x0013 | 0x0014 => {} // state events have no public counterpart
            0x0015 => {
                if let Some(&t) = payload.first() {
                    self.notify_type = t;
                }
            }
            0x0016 => {
                if let Some(&value) = payload.first() {
                    self.push_translated(queue, &NOTIFICATIONS, self.notify_type, value);
                }
            }
            0x0017 => {
                if let Some(&t) = payload.first() {
                    self.warning_type = t;
                }
            }
            0x0018 => {
                if let Some(&value) = payload.first() {
                    self.push_translated(queue, &WARNINGS, self.warning_type, value);
                }
            }
            0x0019 => {
                if let Some(&t) = payload.first() {
                    self.alarm_type = t;
                }
            }
            0x001a => {
                if let Some(&value) = payload.first() {
                    self.push_translated(queue, &ALARMS, self.alarm_type, value);
                }
            }
            0x001c => {
                if let Some(idx) = u16_at(0) {
                    queue.push_back(Sample::Event {
                        kind: SampleEventKind::Bookmark,
                        value: idx as u32,
                        transition: None,
                    });
                }
            }
            0x001d => {
                if let Some(idx) = u16_at(0) {
                    self.push_gas_switch(queue, idx);
                }
            }
            _ => {}
        }
    }
}

impl<'a> DecodeStep for Decoder<'a> {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool> {
        let data = self.data;
        match self.cursor {
            Cursor::Entry(offset) => {
                if data.len().saturating_sub(offset) <= 4 {
                    self.cursor = Cursor::Done;
                    return Ok(false);
                }
                match parse_entry_header(data, offset) {
                    Some(entry) => {
                        record_type(
                            &mut self.types,
                            entry.typ,
                            &data[entry.text_start..entry.text_start + entry.text_len],
                        );
                        self.cursor = Cursor::Items(entry.data_start);
                        Ok(true)
                    }
                    None => {
                        log::debug!("bad dive entry");
                        self.cursor = Cursor::Done;
                        Ok(false)
                    }
                }
            }
            Cursor::Items(offset) => {
                if offset >= data.len() || data[offset] == 0 {
                    self.cursor = Cursor::Entry(offset);
                    return Ok(true);
                }
                match parse_item(data, offset) {
                    Some(item) => {
                        if item.typ <= MAXTYPE && self.types[item.typ].is_some() {
                            self.dispatch(queue, item.typ, &data[item.start..item.start + item.len]);
                        } else {
                            log::debug!("data item with unregistered type {:04x}", item.typ);
                        }
                        self.cursor = Cursor::Items(item.next);
                        Ok(true)
                    }
                    None => {
                        log::debug!("truncated data item");
                        self.cursor = Cursor::Done;
                        Ok(false)
                    }
                }
            }
            Cursor::Done => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(typ: u16, text: &str, items: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(0x00);
        out.push((text.len() + 3) as u8);
        out.extend_from_slice(&typ.to_le_bytes());
        out.extend_from_slice(text.as_bytes());
        out.push(0x00);
        out.extend_from_slice(items);
        out
    }

    fn sbem(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0x12, 0x34, 0x56, 0x78];
        out.extend_from_slice(b"SBEM");
        out.extend_from_slice(&[0, 0, 0, 0]);
        for e in entries {
            out.extend_from_slice(e);
        }
        out
    }

    #[test]
    fn descriptor_registration_and_dispatch() {
        let data = sbem(&[
            entry(
                0x0002,
                "<PTH>sml.DiveSamples.Sample.Time\n<FRM>uint16",
                // Two time items: +1000 ms, +2000 ms.
                &[0x02, 0x02, 0xE8, 0x03, 0x02, 0x02, 0xD0, 0x07],
            ),
        ]);

        let mut parser = Eonsteel::new(0);
        parser.install(&data);

        let mut queue = VecDeque::new();
        let mut decoder = parser.decoder(&data).unwrap();
        while decoder.step(&mut queue).unwrap() {}

        let samples: Vec<_> = queue.into_iter().collect();
        assert_eq!(samples, vec![Sample::Time(1), Sample::Time(3)]);
        assert_eq!(parser.cache.divetime_ms, 3000);
    }

    #[test]
    fn header_fields_fill_the_cache() {
        // Item with extended type id 0x0103 carrying 101300 Pa.
        let data = sbem(&[entry(
            0x0103,
            "<PTH>sml.DeviceLog.Header.Diving.SurfacePressure\n<FRM>uint32",
            &[0xFF, 0x03, 0x01, 0x04, 0xB4, 0x8B, 0x01, 0x00],
        )]);

        let mut parser = Eonsteel::new(0);
        parser.install(&data);
        assert!((parser.cache.atmospheric.unwrap() - 1.013).abs() < 1e-9);
    }

    #[test]
    fn paired_notifications_translate_to_events() {
        let e1 = entry(
            0x0015,
            "<PTH>sml.DiveSamples.Sample.Events.Notify.Type\n<FRM>uint8",
            &[],
        );
        let e2 = entry(
            0x0016,
            "<PTH>sml.DiveSamples.Sample.Events.Notify.State\n<FRM>bool",
            // Notify type 7 (safety stop), then an asserted value.
            &[0x15, 0x01, 0x07, 0x16, 0x01, 0x01],
        );
        let data = sbem(&[e1, e2]);

        let mut parser = Eonsteel::new(0);
        parser.install(&data);

        let mut queue = VecDeque::new();
        let mut decoder = parser.decoder(&data).unwrap();
        while decoder.step(&mut queue).unwrap() {}

        let samples: Vec<_> = queue.into_iter().collect();
        assert_eq!(
            samples,
            vec![Sample::Event {
                kind: SampleEventKind::SafetyStop,
                value: 0,
                transition: Some(Transition::Begin),
            }]
        );
    }

    #[test]
    fn missing_magic_is_an_empty_log() {
        let mut parser = Eonsteel::new(0);
        parser.install(&[0x00; 16]);
        assert_eq!(parser.cache.divetime_ms, 0);
        assert!(parser.cache.strings.is_empty());
    }
}
