use std::collections::VecDeque;
use std::time::Duration;

use crate::checksum;
use crate::device::{Direction, FlowControl, Parity, SerialPort};
use crate::parser::oceanic_atom2;
use crate::parser::uwatec_smart;
use crate::{
    Common2Device, Common2Layout, Common2Transport, Context, DeviceClock, Error, Event, FieldKind,
    FieldValue, IdiveDevice, Parser, Sample,
};

fn assert_depth(sample: &Sample, expected: f64) {
    match sample {
        Sample::Depth(depth) => assert!((depth - expected).abs() < 1e-9, "depth {}", depth),
        other => panic!("expected a depth sample, got {:?}", other),
    }
}

// ---------------------------------------------------------------------
// Cressi Leonardo
// ---------------------------------------------------------------------

fn leonardo_header() -> Vec<u8> {
    let mut data = vec![0u8; 82];
    data[0x06] = 0x3C; // dive time, 20 s ticks
    data[0x08] = 0x18; // 2024
    data[0x09] = 0x03;
    data[0x0A] = 0x0F;
    data[0x0B] = 0x0A;
    data[0x0C] = 0x1E;
    data[0x19] = 0x28; // 40% oxygen
    data[0x20] = 0x64; // 10.0 m
    data[0x22] = 0x14; // 20 °C
    data
}

#[test]
fn leonardo_header_fields() {
    let ctx = Context::new();
    let data = leonardo_header();
    let mut parser = Parser::cressi_leonardo(&ctx);
    parser.set_data(&data);

    assert_eq!(
        parser.datetime().unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
        "2024-03-15 10:30:00"
    );

    match parser.field(FieldKind::DiveTime, 0).unwrap() {
        FieldValue::Time(time) => assert_eq!(time, 1200),
        other => panic!("{:?}", other),
    }
    match parser.field(FieldKind::MaxDepth, 0).unwrap() {
        FieldValue::Depth(depth) => assert!((depth - 10.0).abs() < 1e-9),
        other => panic!("{:?}", other),
    }
    match parser.field(FieldKind::Gasmix, 0).unwrap() {
        FieldValue::Gasmix(mix) => {
            assert!((mix.oxygen - 0.40).abs() < 1e-9);
            assert!((mix.helium - 0.0).abs() < 1e-9);
            assert!((mix.nitrogen() - 0.60).abs() < 1e-9);
        }
        other => panic!("{:?}", other),
    }
    match parser.field(FieldKind::TemperatureMinimum, 0).unwrap() {
        FieldValue::Temperature(temp) => assert!((temp - 20.0).abs() < 1e-9),
        other => panic!("{:?}", other),
    }

    assert!(matches!(
        parser.field(FieldKind::Atmospheric, 0),
        Err(Error::Unsupported)
    ));
}

#[test]
fn leonardo_undersized_header() {
    let ctx = Context::new();
    let data = vec![0u8; 40];
    let mut parser = Parser::cressi_leonardo(&ctx);
    parser.set_data(&data);

    assert!(matches!(parser.datetime(), Err(Error::DataFormat)));
    assert!(matches!(
        parser.field(FieldKind::DiveTime, 0),
        Err(Error::DataFormat)
    ));
}

#[test]
fn leonardo_samples_are_deterministic() {
    let ctx = Context::new();
    let mut data = leonardo_header();
    data.extend_from_slice(&[0x64, 0x00]); // 10.0 m
    data.extend_from_slice(&[0xC8, 0x40]); // 20.0 m, ascent rate 1

    let mut parser = Parser::cressi_leonardo(&ctx);
    parser.set_data(&data);

    let first: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();
    // Installing the same bytes again must not change anything.
    parser.set_data(&data);
    let second: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();
    assert_eq!(first, second);

    assert_eq!(first[0], Sample::Time(20));
    assert_depth(&first[1], 10.0);
    assert_eq!(first[2], Sample::Time(40));
    assert_depth(&first[3], 20.0);
    assert!(matches!(first[4], Sample::Event { value: 1, .. }));
}

// ---------------------------------------------------------------------
// DiveSystem iDive
// ---------------------------------------------------------------------

fn idive_sample(timestamp: u32) -> Vec<u8> {
    let mut sample = vec![0u8; 0x2A];
    sample[2..6].copy_from_slice(&timestamp.to_le_bytes());
    sample[6] = 0x7B; // 12.3 m
    sample[8] = 0xB4; // 18.0 °C
    sample[10] = 21;
    sample[23] = 0xFF; // no deco information
    sample[24] = 0xFF;
    sample
}

#[test]
fn idive_divetime_matches_the_last_sample() {
    let ctx = Context::new();
    let mut data = vec![0u8; 0x32];
    data.extend_from_slice(&idive_sample(10));
    data.extend_from_slice(&idive_sample(20));

    let mut parser = Parser::divesystem_idive(&ctx);
    parser.set_data(&data);

    let mut last_time = 0;
    let mut previous = 0;
    for sample in parser.samples().unwrap() {
        if let Sample::Time(time) = sample.unwrap() {
            assert!(time >= previous);
            previous = time;
            last_time = time;
        }
    }

    match parser.field(FieldKind::DiveTime, 0).unwrap() {
        FieldValue::Time(time) => assert_eq!(time, last_time),
        other => panic!("{:?}", other),
    }
    match parser.field(FieldKind::GasmixCount, 0).unwrap() {
        FieldValue::Count(count) => assert_eq!(count, 1),
        other => panic!("{:?}", other),
    }
}

#[test]
fn idive_backwards_timestamp_is_rejected() {
    let ctx = Context::new();
    let mut data = vec![0u8; 0x32];
    data.extend_from_slice(&idive_sample(10));
    data.extend_from_slice(&idive_sample(9));

    let mut parser = Parser::divesystem_idive(&ctx);
    parser.set_data(&data);

    let result: Result<Vec<Sample>, Error> = parser.samples().unwrap().collect();
    assert!(matches!(result, Err(Error::DataFormat)));

    // The lazy field cache walks the same stream and fails the same way.
    assert!(matches!(
        parser.field(FieldKind::DiveTime, 0),
        Err(Error::DataFormat)
    ));
}

// ---------------------------------------------------------------------
// Suunto Eon / Spyder
// ---------------------------------------------------------------------

#[test]
fn eon_missing_end_marker() {
    let ctx = Context::new();
    let data = vec![0x01u8; 20];
    let mut parser = Parser::suunto_eon(&ctx, true);
    parser.set_data(&data);

    assert!(matches!(
        parser.field(FieldKind::MaxDepth, 0),
        Err(Error::DataFormat)
    ));
    assert!(parser.samples().is_err());
}

#[test]
fn spyder_delta_profile() {
    let ctx = Context::new();
    let mut data = vec![0u8; 11];
    data[3] = 20; // interval
    data[6] = 24; // 2024-06-10 09:40
    data[7] = 6;
    data[8] = 10;
    data[9] = 9;
    data[10] = 40;
    // Two depth deltas of +10 ft, one of -5 ft, end marker, temperature
    // and tank pressure trailer.
    data.extend_from_slice(&[10, 10, 0xFB, 0x80, 12, 0x55]);

    let mut parser = Parser::suunto_eon(&ctx, true);
    parser.set_data(&data);

    assert_eq!(
        parser.datetime().unwrap().format("%Y-%m-%d %H:%M").to_string(),
        "2024-06-10 09:40"
    );

    match parser.field(FieldKind::DiveTime, 0).unwrap() {
        FieldValue::Time(time) => assert_eq!(time, 3 * 20),
        other => panic!("{:?}", other),
    }
    match parser.field(FieldKind::MaxDepth, 0).unwrap() {
        FieldValue::Depth(depth) => assert!((depth - 20.0 * 0.3048).abs() < 1e-9),
        other => panic!("{:?}", other),
    }
    match parser.field(FieldKind::TemperatureMinimum, 0).unwrap() {
        FieldValue::Temperature(temp) => assert!((temp - 12.0).abs() < 1e-9),
        other => panic!("{:?}", other),
    }

    let samples: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();
    // Surface lead-in, three profile ticks, surface lead-out.
    assert_eq!(samples[0], Sample::Time(0));
    assert_depth(&samples[1], 0.0);
    assert_eq!(samples[2], Sample::Time(20));
    assert_depth(&samples[3], 10.0 * 0.3048);
    assert_eq!(samples[4], Sample::Time(40));
    assert_depth(&samples[5], 20.0 * 0.3048);
    assert_eq!(samples[6], Sample::Time(60));
    assert_depth(&samples[7], 15.0 * 0.3048);
    assert_eq!(samples[8], Sample::Time(80));
    assert_depth(&samples[9], 0.0);
}

// ---------------------------------------------------------------------
// Shearwater Petrel
// ---------------------------------------------------------------------

#[test]
fn petrel_imperial_depth() {
    let ctx = Context::new();
    let mut data = vec![0u8; 4 * 0x80];
    data[8] = 1; // imperial units
    // One sample: depth 100 ft, stored big-endian.
    data[0x80] = 0x00;
    data[0x81] = 0x64;

    let mut parser = Parser::shearwater_petrel(&ctx, 0xDEADBEEF);
    parser.set_data(&data);

    let samples: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();
    assert_eq!(samples[0], Sample::Time(10));
    assert_depth(&samples[1], 100.0 * 0.3048);

    match parser.field(FieldKind::String, 1).unwrap() {
        FieldValue::String(string) => {
            assert_eq!(string.desc, "Serial");
            assert_eq!(string.value, "deadbeef");
        }
        other => panic!("{:?}", other),
    }
}

#[test]
fn predator_needs_two_blocks() {
    let ctx = Context::new();
    let data = vec![0u8; 0x80];
    let mut parser = Parser::shearwater_predator(&ctx, 1234);
    parser.set_data(&data);
    assert!(matches!(parser.datetime(), Err(Error::DataFormat)));
    assert!(parser.samples().is_err());
}

// ---------------------------------------------------------------------
// Uwatec Smart (Aladin Tec bit stream)
// ---------------------------------------------------------------------

#[test]
fn aladin_bitstream_is_fully_consumed() {
    let ctx = Context::new();
    let mut data = vec![0u8; 108];
    // Absolute depth 8.00 m (calibration sample), an alarm byte with
    // subindex 1, and a +0.02 m depth delta.
    data.extend_from_slice(&[0xFC, 0x01, 0x90]);
    data.extend_from_slice(&[0xFF, 0x7F]);
    data.extend_from_slice(&[0x01]);

    let mut parser =
        Parser::uwatec_smart(&ctx, uwatec_smart::ALADINTEC, DeviceClock::new(0, 0)).unwrap();
    parser.set_data(&data);

    let samples: Result<Vec<Sample>, Error> = parser.samples().unwrap().collect();
    let samples = samples.expect("the encoded stream ends on a sample boundary");

    assert_eq!(samples[0], Sample::Time(0));
    assert_depth(&samples[1], 0.0);
    assert_eq!(samples[2], Sample::Time(4));
    assert_eq!(
        samples[3],
        Sample::Vendor {
            kind: crate::VendorKind::UwatecSmart,
            data: vec![0x00, 0x7F],
        }
    );
    assert_depth(&samples[4], 0.02);
    assert_eq!(samples.len(), 5);
}

#[test]
fn smart_rejects_unknown_models() {
    let ctx = Context::new();
    assert!(matches!(
        Parser::uwatec_smart(&ctx, 0x42, DeviceClock::new(0, 0)),
        Err(Error::InvalidArgs)
    ));
}

// ---------------------------------------------------------------------
// Oceanic Atom 2 family
// ---------------------------------------------------------------------

#[test]
fn atom2_surface_interval_inserts_zero_depth_samples() {
    let ctx = Context::new();
    // The Geo uses a 56-byte header and 8-byte samples.
    let mut data = vec![0u8; 56];
    data[0x17] = 0x02; // 30 s interval
    data[48 + 7] = 80; // initial temperature, °F

    // Surface interval of 1 min 30 s (BCD), in a full-page sample.
    let mut surface = vec![0u8; 16];
    surface[0] = 0xBB;
    surface[1] = 0x01;
    surface[2] = 0x30;
    data.extend_from_slice(&surface);

    data.extend_from_slice(&[0u8; 16]); // footer

    let mut parser = Parser::oceanic_atom2(&ctx, oceanic_atom2::GEO, 123456);
    parser.set_data(&data);

    let samples: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();

    let times: Vec<u32> = samples
        .iter()
        .filter_map(|s| match s {
            Sample::Time(t) => Some(*t),
            _ => None,
        })
        .collect();
    let depths: Vec<f64> = samples
        .iter()
        .filter_map(|s| match s {
            Sample::Depth(d) => Some(*d),
            _ => None,
        })
        .collect();

    assert_eq!(times, vec![30, 60, 90]);
    assert_eq!(depths, vec![0.0, 0.0, 0.0]);

    match parser.field(FieldKind::String, 0).unwrap() {
        FieldValue::String(string) => assert_eq!(string.value, "123456"),
        other => panic!("{:?}", other),
    }
}

// ---------------------------------------------------------------------
// Reefnet calibration
// ---------------------------------------------------------------------

#[test]
fn sensuspro_applies_the_calibration() {
    let ctx = Context::new();
    // Header, one sample at ~2 atm absolute, footer.
    let mut data = vec![0u8; 10];
    data[4] = 30; // interval
    data[6..10].copy_from_slice(&1000u32.to_le_bytes());
    let word: u16 = (70 << 9) | 66; // 66 fsw, 70 °F
    data.extend_from_slice(&word.to_le_bytes());
    data.extend_from_slice(&[0xFF, 0xFF]);

    let mut parser = Parser::reefnet_sensuspro(&ctx, DeviceClock::new(2000, 1_700_000_000));
    parser.set_data(&data);

    let samples: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();
    let depth = match samples[2] {
        Sample::Depth(d) => d,
        ref other => panic!("{:?}", other),
    };
    // 66 fsw is two atmospheres absolute: one water column.
    let expected = (66.0 * (101325.0 / 33.0) - 101325.0) / (1025.0 * 9.80665);
    assert!((depth - expected).abs() < 1e-9);

    // A custom calibration shifts the zero point.
    parser.set_calibration(0.0, 10000.0).unwrap();
    let samples: Vec<Sample> = parser.samples().unwrap().map(|s| s.unwrap()).collect();
    match samples[2] {
        Sample::Depth(d) => assert!((d - 66.0 * (101325.0 / 33.0) / 10000.0).abs() < 1e-9),
        ref other => panic!("{:?}", other),
    }

    // Only the Reefnet families accept a calibration.
    let mut leonardo = Parser::cressi_leonardo(&ctx);
    assert!(matches!(
        leonardo.set_calibration(101325.0, 10000.0),
        Err(Error::InvalidArgs)
    ));
}

// ---------------------------------------------------------------------
// DiveSystem iDive device protocol
// ---------------------------------------------------------------------

/// A scripted serial port: canned reply bytes, recorded writes.
struct MockPort {
    rx: VecDeque<u8>,
    tx: Vec<Vec<u8>>,
}

impl MockPort {
    fn new() -> Self {
        MockPort {
            rx: VecDeque::new(),
            tx: Vec::new(),
        }
    }

    fn queue_frame(&mut self, payload: &[u8]) {
        let mut frame = vec![0x55, payload.len() as u8];
        frame.extend_from_slice(payload);
        let crc = checksum::crc_ccitt_u16(&frame);
        frame.extend_from_slice(&crc.to_be_bytes());
        self.rx.extend(frame);
    }
}

impl SerialPort for MockPort {
    fn configure(
        &mut self,
        _baudrate: u32,
        _databits: u8,
        _parity: Parity,
        _stopbits: u8,
        _flowcontrol: FlowControl,
    ) -> crate::Result<()> {
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Duration) -> crate::Result<()> {
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> crate::Result<usize> {
        let n = buffer.len().min(self.rx.len());
        for slot in buffer.iter_mut().take(n) {
            *slot = self.rx.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, buffer: &[u8]) -> crate::Result<usize> {
        self.tx.push(buffer.to_vec());
        Ok(buffer.len())
    }

    fn flush(&mut self, _direction: Direction) -> crate::Result<()> {
        Ok(())
    }

    fn sleep(&mut self, _duration: Duration) {}
}

fn idive_id_payload() -> Vec<u8> {
    let mut id = vec![0u8; 10];
    id[0] = 0x03; // model
    id[6..10].copy_from_slice(&987654u32.to_le_bytes());
    let mut payload = vec![0x10];
    payload.extend_from_slice(&id);
    payload.push(0x06);
    payload
}

fn idive_header_payload(nsamples: u16, fingerprint: [u8; 4]) -> Vec<u8> {
    let mut header = vec![0u8; 0x32];
    header[1..3].copy_from_slice(&nsamples.to_le_bytes());
    header[7..11].copy_from_slice(&fingerprint);
    let mut payload = vec![0xA0];
    payload.extend_from_slice(&header);
    payload.push(0x06);
    payload
}

#[test]
fn idive_enumerates_newest_first() {
    let ctx = Context::new();
    let mut port = MockPort::new();

    port.queue_frame(&idive_id_payload());
    port.queue_frame(&[0x98, 0x01, 0x00, 0x02, 0x00, 0x06]); // dives 1..2
    port.queue_frame(&idive_header_payload(1, [0xAA, 0xBB, 0xCC, 0xDD]));
    let mut sample = vec![0x22u8; 0x2A];
    sample.insert(0, 0xA8);
    sample.push(0x06);
    port.queue_frame(&sample);
    port.queue_frame(&idive_header_payload(0, [0x11, 0x12, 0x13, 0x14]));

    let mut device = IdiveDevice::open(&ctx, port).unwrap();

    let mut events = Vec::new();
    let mut dives: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    device
        .foreach(
            |event| events.push(event),
            |blob, fingerprint| {
                dives.push((blob.to_vec(), fingerprint.to_vec()));
                true
            },
        )
        .unwrap();

    assert_eq!(dives.len(), 2);
    assert_eq!(dives[0].0.len(), 0x32 + 0x2A);
    assert_eq!(dives[0].1, vec![0xAA, 0xBB, 0xCC, 0xDD]);
    assert_eq!(dives[1].0.len(), 0x32);
    assert_eq!(dives[1].1, vec![0x11, 0x12, 0x13, 0x14]);

    assert!(events.iter().any(|e| matches!(
        e,
        Event::DevInfo {
            model: 3,
            serial: 987654,
            ..
        }
    )));

    // Progress never moves backwards and ends at the full scale.
    let progress: Vec<(u32, u32)> = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { current, maximum } => Some((*current, *maximum)),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(progress.last(), Some(&(2000, 2000)));
}

#[test]
fn idive_fingerprint_stops_the_download() {
    let ctx = Context::new();
    let mut port = MockPort::new();

    port.queue_frame(&idive_id_payload());
    port.queue_frame(&[0x98, 0x01, 0x00, 0x01, 0x00, 0x06]);
    port.queue_frame(&idive_header_payload(5, [0xAA, 0xBB, 0xCC, 0xDD]));

    let mut device = IdiveDevice::open(&ctx, port).unwrap();
    device.set_fingerprint(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();

    let mut ndives = 0;
    device
        .foreach(
            |_| {},
            |_, _| {
                ndives += 1;
                true
            },
        )
        .unwrap();
    assert_eq!(ndives, 0);
}

#[test]
fn idive_retries_while_busy() {
    let ctx = Context::new();
    let mut port = MockPort::new();

    // Two BUSY replies before the device identifies itself.
    port.queue_frame(&[0x10, 0x60, 0x15]);
    port.queue_frame(&[0x10, 0x60, 0x15]);
    port.queue_frame(&idive_id_payload());
    port.queue_frame(&[0x98, 0x01, 0x00, 0x01, 0x00, 0x06]);
    port.queue_frame(&idive_header_payload(0, [0xAA, 0xBB, 0xCC, 0xDD]));

    let mut device = IdiveDevice::open(&ctx, port).unwrap();
    let mut ndives = 0;
    device
        .foreach(
            |_| {},
            |_, _| {
                ndives += 1;
                true
            },
        )
        .unwrap();
    assert_eq!(ndives, 1);
}

#[test]
fn idive_cancellation_interrupts_the_transfer() {
    let ctx = Context::new();
    let port = MockPort::new();
    let mut device = IdiveDevice::open(&ctx, port).unwrap();

    ctx.cancel();
    let result = device.foreach(|_| {}, |_, _| true);
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn idive_rejects_bad_fingerprint_sizes() {
    let ctx = Context::new();
    let mut device = IdiveDevice::open(&ctx, MockPort::new()).unwrap();
    assert!(matches!(
        device.set_fingerprint(&[1, 2, 3]),
        Err(Error::InvalidArgs)
    ));
    device.set_fingerprint(&[]).unwrap();
}

// ---------------------------------------------------------------------
// Suunto Common2 ringbuffer download
// ---------------------------------------------------------------------

struct MockTransport {
    memory: Vec<u8>,
    version: [u8; 4],
}

impl Common2Transport for MockTransport {
    fn packet(
        &mut self,
        command: &[u8],
        answer_size: usize,
        payload_size: usize,
    ) -> crate::Result<Vec<u8>> {
        match command[0] {
            0x0F => {
                let mut answer = vec![0u8; answer_size];
                answer[3..7].copy_from_slice(&self.version);
                Ok(answer)
            }
            0x05 => {
                assert_eq!(command[6], checksum::xor_u8(&command[..6], 0x00));
                let address = ((command[3] as usize) << 8) | command[4] as usize;
                let len = command[5] as usize;
                assert_eq!(len, payload_size);
                let mut answer = vec![0u8; answer_size];
                answer[6..6 + len].copy_from_slice(&self.memory[address..address + len]);
                Ok(answer)
            }
            _ => Err(Error::Unsupported),
        }
    }
}

fn common2_layout() -> Common2Layout {
    Common2Layout {
        memsize: 0x1000,
        fingerprint: 0,
        serial: 0x0023,
        rb_profile_begin: 0x0200,
        rb_profile_end: 0x0400,
    }
}

fn common2_memory() -> Vec<u8> {
    let mut memory = vec![0x5Au8; 0x1000];

    // Serial number.
    memory[0x0023..0x0027].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]);

    // Ringbuffer pointers: {last, count, end, begin}.
    memory[0x0190..0x0192].copy_from_slice(&0x0300u16.to_le_bytes());
    memory[0x0192..0x0194].copy_from_slice(&2u16.to_le_bytes());
    memory[0x0194..0x0196].copy_from_slice(&0x03A0u16.to_le_bytes());
    memory[0x0196..0x0198].copy_from_slice(&0x0200u16.to_le_bytes());

    // Newest dive at [0x0300, 0x03A0): pointer pair, then the payload.
    memory[0x0300..0x0302].copy_from_slice(&0x0200u16.to_le_bytes()); // prev
    memory[0x0302..0x0304].copy_from_slice(&0x03A0u16.to_le_bytes()); // next
    memory[0x0304..0x030B].copy_from_slice(b"DIVE001");

    // Older dive at [0x0200, 0x0300).
    memory[0x0200..0x0202].copy_from_slice(&0x0210u16.to_le_bytes()); // prev
    memory[0x0202..0x0204].copy_from_slice(&0x0300u16.to_le_bytes()); // next
    memory[0x0204..0x020B].copy_from_slice(b"DIVE002");

    memory
}

#[test]
fn common2_walks_the_ringbuffer_backwards() {
    let ctx = Context::new();
    let transport = MockTransport {
        memory: common2_memory(),
        version: [0x0E, 0x01, 0x02, 0x03],
    };
    let mut device = Common2Device::new(&ctx, transport, common2_layout()).unwrap();

    let mut events = Vec::new();
    let mut dives: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    device
        .foreach(
            |event| events.push(event),
            |blob, fingerprint| {
                dives.push((blob.to_vec(), fingerprint.to_vec()));
                true
            },
        )
        .unwrap();

    assert_eq!(dives.len(), 2);
    assert_eq!(dives[0].0.len(), 0xA0 - 4);
    assert_eq!(&dives[0].1, b"DIVE001");
    assert_eq!(dives[1].0.len(), 0x100 - 4);
    assert_eq!(&dives[1].1, b"DIVE002");

    // The decoded sizes (pointer pairs included) cover exactly the used
    // part of the ringbuffer.
    let used: usize = dives.iter().map(|(blob, _)| blob.len() + 4).sum();
    assert_eq!(used, 0x03A0 - 0x0200);

    assert!(events.iter().any(|e| matches!(
        e,
        Event::DevInfo {
            model: 0x0E,
            firmware: 0x010203,
            ..
        }
    )));

    let progress: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress { current, .. } => Some(*current),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn common2_fingerprint_match_stops_the_download() {
    let ctx = Context::new();
    let transport = MockTransport {
        memory: common2_memory(),
        version: [0x0E, 0x01, 0x02, 0x03],
    };
    let mut device = Common2Device::new(&ctx, transport, common2_layout()).unwrap();
    device.set_fingerprint(b"DIVE001").unwrap();

    let mut ndives = 0;
    device
        .foreach(
            |_| {},
            |_, _| {
                ndives += 1;
                true
            },
        )
        .unwrap();
    assert_eq!(ndives, 0);
}

#[test]
fn common2_skips_discontinuous_dives_with_a_delayed_error() {
    let ctx = Context::new();
    let mut memory = common2_memory();
    // Corrupt the older dive: its next pointer loops back to itself.
    memory[0x0202..0x0204].copy_from_slice(&0x0200u16.to_le_bytes());

    let transport = MockTransport {
        memory,
        version: [0x0E, 0x01, 0x02, 0x03],
    };
    let mut device = Common2Device::new(&ctx, transport, common2_layout()).unwrap();

    let mut ndives = 0;
    let result = device.foreach(
        |_| {},
        |_, _| {
            ndives += 1;
            true
        },
    );

    // The newest dive still arrived; the breakage surfaced afterwards.
    assert_eq!(ndives, 1);
    assert!(matches!(result, Err(Error::DataFormat)));
}

#[test]
fn common2_rejects_pointers_outside_the_arena() {
    let ctx = Context::new();
    let mut memory = common2_memory();
    memory[0x0190..0x0192].copy_from_slice(&0x0500u16.to_le_bytes()); // last out of range

    let transport = MockTransport {
        memory,
        version: [0x0E, 0x01, 0x02, 0x03],
    };
    let mut device = Common2Device::new(&ctx, transport, common2_layout()).unwrap();

    let result = device.foreach(|_| {}, |_, _| true);
    assert!(matches!(result, Err(Error::DataFormat)));
}

#[test]
fn common2_reads_are_chunked_at_the_mtu() {
    let ctx = Context::new();
    let transport = MockTransport {
        memory: common2_memory(),
        version: [0x0E, 0x01, 0x02, 0x03],
    };
    let mut device = Common2Device::new(&ctx, transport, common2_layout()).unwrap();

    let data = device.read(0x0200, 0x100).unwrap();
    assert_eq!(data.len(), 0x100);
    assert_eq!(&data[4..11], b"DIVE002");
}
