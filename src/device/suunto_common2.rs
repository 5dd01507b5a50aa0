//! Suunto packetized memory protocol and ringbuffer download, shared by
//! the serial models that speak it.
//!
//! The framing and checksumming of one packet differ per concrete model,
//! so the transport is injected as a [`Common2Transport`] capability; the
//! command set, transfer retries, memory chunking, and the backwards
//! ringbuffer traversal all live here.

use crate::bytes;
use crate::checksum;
use crate::context::Context;
use crate::device::retry;
use crate::error::{Error, Result};
use crate::event::Event;

const MAXRETRIES: u32 = 2;

const SZ_VERSION: usize = 0x04;
const SZ_PACKET: usize = 0x78;
/// Reads below this size are unreliable; shorter requests are padded
/// downwards and the extra bytes discarded.
const SZ_MINIMUM: usize = 8;

/// Address of the {last, count, end, begin} ringbuffer pointer block.
const ADDR_POINTERS: u32 = 0x0190;

/// Dive fingerprints are the 7-byte timestamp at the head of each header.
pub const FINGERPRINT_SIZE: usize = 7;

/// One framed exchange with the device. Implementations add the
/// model-specific framing around `command`, transmit it, and return
/// exactly `answer_size` reply bytes after verifying their framing;
/// `payload_size` is the number of payload bytes inside that reply.
pub trait Common2Transport {
    fn packet(
        &mut self,
        command: &[u8],
        answer_size: usize,
        payload_size: usize,
    ) -> Result<Vec<u8>>;
}

/// Memory geometry of one concrete model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Common2Layout {
    /// Total addressable memory.
    pub memsize: u32,
    /// Offset of the fingerprint inside a dive header, relative to the
    /// header's pointer pair.
    pub fingerprint: u32,
    /// Address of the serial number.
    pub serial: u32,
    /// Profile ringbuffer arena, `[begin, end)`.
    pub rb_profile_begin: u32,
    pub rb_profile_end: u32,
}

impl Common2Layout {
    fn rb_profile_size(&self) -> u32 {
        self.rb_profile_end - self.rb_profile_begin
    }

    fn contains(&self, address: u32) -> bool {
        address >= self.rb_profile_begin && address < self.rb_profile_end
    }

    /// Modular distance from `a` forwards to `b` inside the profile
    /// arena; `full` decides whether a zero distance means the whole
    /// ringbuffer or nothing.
    fn rb_profile_distance(&self, a: u32, b: u32, full: bool) -> u32 {
        if a < b {
            b - a
        } else if a > b {
            self.rb_profile_size() - (a - b)
        } else if full {
            self.rb_profile_size()
        } else {
            0
        }
    }
}

/// A device speaking the shared Suunto packet protocol.
pub struct Common2Device<T: Common2Transport> {
    context: Context,
    transport: T,
    layout: Common2Layout,
    version: [u8; SZ_VERSION],
    fingerprint: [u8; FINGERPRINT_SIZE],
}

impl<T: Common2Transport> Common2Device<T> {
    /// Attach to a device and read its version block.
    pub fn new(context: &Context, transport: T, layout: Common2Layout) -> Result<Self> {
        let mut device = Common2Device {
            context: context.clone(),
            transport,
            layout,
            version: [0; SZ_VERSION],
            fingerprint: [0; FINGERPRINT_SIZE],
        };

        let answer = device.transfer(&[0x0F, 0x00, 0x00, 0x0F], SZ_VERSION + 4, SZ_VERSION)?;
        device.version.copy_from_slice(&answer[3..3 + SZ_VERSION]);

        Ok(device)
    }

    /// The version block read when the device was attached: model byte
    /// followed by a 24-bit firmware number.
    pub fn version(&self) -> &[u8; SZ_VERSION] {
        &self.version
    }

    pub fn layout(&self) -> &Common2Layout {
        &self.layout
    }

    /// Install (or clear, with an empty slice) the fingerprint of the most
    /// recent already-downloaded dive.
    pub fn set_fingerprint(&mut self, data: &[u8]) -> Result<()> {
        if !data.is_empty() && data.len() != FINGERPRINT_SIZE {
            return Err(Error::InvalidArgs);
        }

        if data.is_empty() {
            self.fingerprint = [0; FINGERPRINT_SIZE];
        } else {
            self.fingerprint.copy_from_slice(data);
        }

        Ok(())
    }

    /// Occasionally the dive computer does not respond to a command, or
    /// the packet arrives corrupted; discard and request a new one a
    /// couple of times before giving up.
    fn transfer(
        &mut self,
        command: &[u8],
        answer_size: usize,
        payload_size: usize,
    ) -> Result<Vec<u8>> {
        debug_assert!(answer_size >= payload_size + 4);

        if self.context.is_cancelled() {
            return Err(Error::Cancelled);
        }

        retry(
            self,
            MAXRETRIES,
            Error::is_transient,
            |device| device.transport.packet(command, answer_size, payload_size),
            |_| {},
        )
    }

    /// Read `size` bytes of device memory starting at `address`, bundling
    /// requests up to the packet MTU.
    pub fn read(&mut self, mut address: u32, size: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(size);

        while data.len() < size {
            let len = (size - data.len()).min(SZ_PACKET);

            let mut command = [
                0x05,
                0x00,
                0x03,
                (address >> 8) as u8,
                (address & 0xFF) as u8,
                len as u8,
                0x00,
            ];
            command[6] = checksum::xor_u8(&command[..6], 0x00);

            let answer = self.transfer(&command, len + 7, len)?;
            data.extend_from_slice(&answer[6..6 + len]);

            address += len as u32;
        }

        Ok(data)
    }

    /// Write `data` to device memory starting at `address`.
    pub fn write(&mut self, mut address: u32, data: &[u8]) -> Result<()> {
        let mut nbytes = 0;

        while nbytes < data.len() {
            let len = (data.len() - nbytes).min(SZ_PACKET);

            let mut command = Vec::with_capacity(len + 7);
            command.extend_from_slice(&[
                0x06,
                0x00,
                (len + 3) as u8,
                (address >> 8) as u8,
                (address & 0xFF) as u8,
                len as u8,
            ]);
            command.extend_from_slice(&data[nbytes..nbytes + len]);
            command.push(checksum::xor_u8(&command, 0x00));

            self.transfer(&command, 7, 0)?;

            nbytes += len;
            address += len as u32;
        }

        Ok(())
    }

    /// Reset the logged maximum depth.
    pub fn reset_maxdepth(&mut self) -> Result<()> {
        self.transfer(&[0x20, 0x00, 0x00, 0x20], 4, 0)?;
        Ok(())
    }

    /// Download the whole memory image.
    pub fn dump(&mut self, mut events: impl FnMut(Event)) -> Result<Vec<u8>> {
        events(Event::Vendor(self.version.to_vec()));

        let memsize = self.layout.memsize;
        let mut data = Vec::with_capacity(memsize as usize);

        let mut address = 0;
        while address < memsize {
            let len = ((memsize - address) as usize).min(SZ_PACKET);
            let chunk = self.read(address, len)?;
            data.extend_from_slice(&chunk);
            address += len as u32;

            events(Event::Progress {
                current: address,
                maximum: memsize,
            });
        }

        Ok(data)
    }

    /// Enumerate dives newest-first out of the profile ringbuffer,
    /// invoking `callback` with each dive blob and its fingerprint slice.
    /// The callback returns `false` to stop early (not an error).
    ///
    /// A dive that breaks the prev/next chain is skipped (with a warning)
    /// rather than aborting the walk; the breakage is still reported as a
    /// delayed [`Error::DataFormat`] once enumeration completes.
    pub fn foreach(
        &mut self,
        mut events: impl FnMut(Event),
        mut callback: impl FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<()> {
        let layout = self.layout;
        let rb_size = layout.rb_profile_size();

        // Delayed error for dives skipped along the way.
        let mut status = Ok(());

        let mut maximum = rb_size + 8 + SZ_MINIMUM as u32;
        let mut current_progress = 0;
        events(Event::Progress {
            current: current_progress,
            maximum,
        });

        events(Event::Vendor(self.version.to_vec()));

        let serial = self.read(layout.serial, SZ_MINIMUM)?;

        current_progress += serial.len() as u32;
        events(Event::Progress {
            current: current_progress,
            maximum,
        });

        events(Event::DevInfo {
            model: self.version[0] as u32,
            firmware: bytes::u24_be(&self.version, 1),
            serial: serial[..4].iter().fold(0u32, |n, &b| n * 100 + b as u32),
        });

        let header = self.read(ADDR_POINTERS, 8)?;

        let last = bytes::u16_le(&header, 0) as u32;
        let count = bytes::u16_le(&header, 2) as u32;
        let end = bytes::u16_le(&header, 4) as u32;
        let begin = bytes::u16_le(&header, 6) as u32;
        if !layout.contains(last) || !layout.contains(end) || !layout.contains(begin) {
            log::error!("invalid ringbuffer pointer detected");
            return Err(Error::DataFormat);
        }

        // Assembly buffer for the whole used region; reads run backwards
        // through it so the minimum-size padding never clobbers dive data.
        let mut data = vec![0u8; (rb_size as usize) + SZ_MINIMUM];

        let mut remaining = layout.rb_profile_distance(begin, end, count != 0) as usize;

        maximum -= rb_size - remaining as u32;
        current_progress += header.len() as u32;
        events(Event::Progress {
            current: current_progress,
            maximum,
        });

        // The largest possible packets are read, so the last package of a
        // dive can contain bytes of the next (older) one; those stay in
        // the buffer for the next round.
        let mut available = 0usize;

        let mut current = last;
        let mut previous = end;
        let mut address = previous;
        let mut offset = remaining + SZ_MINIMUM;

        while remaining > 0 {
            let size = layout.rb_profile_distance(current, previous, true) as usize;

            if size < 4 || size > remaining {
                log::error!("unexpected profile size");
                return Err(Error::DataFormat);
            }

            let mut nbytes = available;
            while nbytes < size {
                // Ringbuffer wrap point.
                if address == layout.rb_profile_begin {
                    address = layout.rb_profile_end;
                }

                let mut len = SZ_PACKET;
                if layout.rb_profile_begin + (len as u32) > address {
                    len = (address - layout.rb_profile_begin) as usize;
                }
                if nbytes + len > remaining {
                    len = remaining - nbytes;
                }

                offset -= len;
                address -= len as u32;

                // Pad undersized requests downwards; the extra leading
                // bytes are overwritten by the next (earlier) read.
                let extra = SZ_MINIMUM.saturating_sub(len);

                let chunk = self.read(address - extra as u32, len + extra)?;
                data[offset - extra..offset + len].copy_from_slice(&chunk);

                current_progress += len as u32;
                events(Event::Progress {
                    current: current_progress,
                    maximum,
                });

                nbytes += len;
            }

            remaining -= size;
            available = nbytes - size;

            // The 4 bytes preceding each dive hold its prev/next pointers.
            let p = offset + available;
            let prev = bytes::u16_le(&data, p) as u32;
            let next = bytes::u16_le(&data, p + 2) as u32;
            if !layout.contains(prev) || !layout.contains(next) {
                log::error!("invalid ringbuffer pointer detected");
                return Err(Error::DataFormat);
            }
            if next != previous && next != current {
                log::error!("profiles are not continuous");
                return Err(Error::DataFormat);
            }

            if next != current {
                let fp = p + (layout.fingerprint as usize) + 4;
                let fingerprint = match data.get(fp..fp + FINGERPRINT_SIZE) {
                    Some(fingerprint) => fingerprint,
                    None => {
                        log::error!("dive too small for its fingerprint");
                        return Err(Error::DataFormat);
                    }
                };
                if fingerprint == self.fingerprint {
                    return Ok(());
                }

                if !callback(&data[p + 4..p + size], fingerprint) {
                    return Ok(());
                }
            } else {
                log::warn!("skipping incomplete dive");
                status = Err(Error::DataFormat);
            }

            previous = current;
            current = prev;
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rb_distance_covers_wrap_and_full() {
        let layout = Common2Layout {
            memsize: 0x8000,
            fingerprint: 0x15,
            serial: 0x0023,
            rb_profile_begin: 0x019A,
            rb_profile_end: 0x2000,
        };
        let size = layout.rb_profile_size();
        assert_eq!(layout.rb_profile_distance(0x019A, 0x019A, false), 0);
        assert_eq!(layout.rb_profile_distance(0x019A, 0x019A, true), size);
        assert_eq!(layout.rb_profile_distance(0x0200, 0x0300, true), 0x100);
        assert_eq!(
            layout.rb_profile_distance(0x0300, 0x0200, true),
            size - 0x100
        );
    }
}
