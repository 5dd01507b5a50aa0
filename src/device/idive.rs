//! DiveSystem iDive download protocol.
//!
//! Framed request/response over 115200 8N1. Every frame is
//! `START | LEN | PAYLOAD | CRC-CCITT (big-endian)`; the reply echoes the
//! command byte and carries a trailing ACK, or a NAK with an error code.
//! A BUSY error code is retried after a short delay.

use std::time::Duration;

use crate::bytes;
use crate::checksum;
use crate::context::Context;
use crate::device::{read_exact, retry, write_all, Direction, FlowControl, Parity, SerialPort};
use crate::error::{Error, Result};
use crate::event::Event;

const MAXRETRIES: u32 = 9;

const MAXPACKET: usize = 0xFF;
const START: u8 = 0x55;
const ACK: u8 = 0x06;
const NAK: u8 = 0x15;
const BUSY: u8 = 0x60;

const CMD_ID: u8 = 0x10;
const CMD_RANGE: u8 = 0x98;
const CMD_HEADER: u8 = 0xA0;
const CMD_SAMPLE: u8 = 0xA8;

const SZ_ID: usize = 0x0A;
const SZ_RANGE: usize = 0x04;
const SZ_HEADER: usize = 0x32;
const SZ_SAMPLE: usize = 0x2A;

/// Offset of the fingerprint slice inside a dive header.
const FP_OFFSET: usize = 7;
const FP_SIZE: usize = 4;

const NSTEPS: u32 = 1000;

/// An open iDive on the other end of a serial port.
pub struct IdiveDevice<P: SerialPort> {
    context: Context,
    port: P,
    fingerprint: [u8; FP_SIZE],
}

impl<P: SerialPort> IdiveDevice<P> {
    /// Take ownership of `port`, configure it, and let the device settle.
    /// Dropping the device closes the port.
    pub fn open(context: &Context, mut port: P) -> Result<Self> {
        port.configure(115200, 8, Parity::None, 1, FlowControl::None)?;
        port.set_timeout(Duration::from_millis(1000))?;

        // Make sure everything is in a sane state.
        port.sleep(Duration::from_millis(300));
        port.flush(Direction::Both)?;

        Ok(IdiveDevice {
            context: context.clone(),
            port,
            fingerprint: [0; FP_SIZE],
        })
    }

    /// Install (or clear, with an empty slice) the fingerprint of the most
    /// recent already-downloaded dive. Enumeration stops when a dive
    /// header matches it.
    pub fn set_fingerprint(&mut self, data: &[u8]) -> Result<()> {
        if !data.is_empty() && data.len() != FP_SIZE {
            return Err(Error::InvalidArgs);
        }

        if data.is_empty() {
            self.fingerprint = [0; FP_SIZE];
        } else {
            self.fingerprint.copy_from_slice(data);
        }

        Ok(())
    }

    fn send(&mut self, command: &[u8]) -> Result<()> {
        if self.context.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if command.is_empty() || command.len() > MAXPACKET {
            return Err(Error::InvalidArgs);
        }

        let mut packet = Vec::with_capacity(command.len() + 4);
        packet.push(START);
        packet.push(command.len() as u8);
        packet.extend_from_slice(command);
        let crc = checksum::crc_ccitt_u16(&packet);
        packet.extend_from_slice(&crc.to_be_bytes());

        write_all(&mut self.port, &packet)
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        // Scan for the packet start byte.
        loop {
            let mut byte = [0u8; 1];
            read_exact(&mut self.port, &mut byte)?;
            if byte[0] == START {
                break;
            }
        }

        let mut header = [0u8; 1];
        read_exact(&mut self.port, &mut header)?;
        let len = header[0] as usize;
        if len < 2 {
            log::error!("invalid packet length {}", len);
            return Err(Error::Protocol);
        }

        let mut packet = vec![0u8; len + 2];
        read_exact(&mut self.port, &mut packet)?;

        let crc = bytes::u16_be(&packet, len);
        let mut frame = vec![START, len as u8];
        frame.extend_from_slice(&packet[..len]);
        if crc != checksum::crc_ccitt_u16(&frame) {
            log::error!("unexpected packet checksum");
            return Err(Error::Protocol);
        }

        packet.truncate(len);
        Ok(packet)
    }

    /// One send/receive round. A BUSY reply surfaces as a transient
    /// protocol error so the caller's retry budget covers it.
    fn transfer_once(&mut self, command: &[u8], asize: usize) -> Result<Vec<u8>> {
        self.send(command)?;

        let packet = self.receive()?;

        // The reply opens with an echo of the command byte.
        if packet[0] != command[0] {
            log::error!("unexpected packet header");
            return Err(Error::Protocol);
        }

        match packet[packet.len() - 1] {
            ACK => {}
            NAK => {
                if packet.len() != 3 {
                    log::error!("unexpected packet length");
                    return Err(Error::Protocol);
                }
                let errcode = packet[1];
                if errcode != BUSY {
                    log::error!("received NAK packet with error code {:02x}", errcode);
                }
                return Err(Error::Protocol);
            }
            code => {
                log::error!("unexpected ACK/NAK byte {:02x}", code);
                return Err(Error::Protocol);
            }
        }

        if asize != packet.len() - 2 {
            log::error!("unexpected packet length");
            return Err(Error::Protocol);
        }

        Ok(packet[1..packet.len() - 1].to_vec())
    }

    fn transfer(&mut self, command: &[u8], asize: usize) -> Result<Vec<u8>> {
        retry(
            self,
            MAXRETRIES,
            Error::is_transient,
            |device| device.transfer_once(command, asize),
            |device| device.port.sleep(Duration::from_millis(100)),
        )
    }

    /// Enumerate dives newest-first, invoking `callback` with each dive
    /// blob and its fingerprint slice. The callback returns `false` to
    /// stop early (not an error). `events` receives progress and device
    /// identification notifications.
    pub fn foreach(
        &mut self,
        mut events: impl FnMut(Event),
        mut callback: impl FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<()> {
        events(Event::Progress {
            current: 0,
            maximum: 0,
        });

        let id = self.transfer(&[CMD_ID, 0xED], SZ_ID)?;

        events(Event::DevInfo {
            model: bytes::u16_le(&id, 0) as u32,
            firmware: 0,
            serial: bytes::u32_le(&id, 6),
        });
        events(Event::Vendor(id));

        let range = self.transfer(&[CMD_RANGE, 0x8D], SZ_RANGE)?;

        let first = bytes::u16_le(&range, 0) as u32;
        let last = bytes::u16_le(&range, 2) as u32;
        if first > last {
            log::error!("invalid dive numbers");
            return Err(Error::DataFormat);
        }

        let ndives = last - first + 1;
        let maximum = ndives * NSTEPS;
        events(Event::Progress {
            current: 0,
            maximum,
        });

        let mut buffer = Vec::new();

        for i in 0..ndives {
            let number = last - i;
            let header = self.transfer(
                &[CMD_HEADER, (number & 0xFF) as u8, (number >> 8) as u8],
                SZ_HEADER,
            )?;

            if header[FP_OFFSET..FP_OFFSET + FP_SIZE] == self.fingerprint {
                break;
            }

            let nsamples = bytes::u16_le(&header, 1) as u32;

            events(Event::Progress {
                current: i * NSTEPS + NSTEPS / (nsamples + 1),
                maximum,
            });

            buffer.clear();
            buffer.reserve(SZ_HEADER + SZ_SAMPLE * nsamples as usize);
            buffer.extend_from_slice(&header);

            for j in 0..nsamples {
                let idx = j + 1;
                let sample = self.transfer(
                    &[CMD_SAMPLE, (idx & 0xFF) as u8, (idx >> 8) as u8],
                    SZ_SAMPLE,
                )?;

                events(Event::Progress {
                    current: i * NSTEPS + (j + 2) * NSTEPS / (nsamples + 1),
                    maximum,
                });

                buffer.extend_from_slice(&sample);
            }

            if !callback(&buffer, &buffer[FP_OFFSET..FP_OFFSET + FP_SIZE]) {
                return Ok(());
            }
        }

        Ok(())
    }
}
