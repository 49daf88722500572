//! # Device Transports
//!
//! The crate does not perform socket or serial I/O itself. Pollers talk to a
//! device through [`RegisterTransport`] and to a bus through [`FrameSource`];
//! both are blocking, and timeouts surface as [`std::io::Error`]s.
//!
//! [`RegisterImage`] and [`FrameReplay`] are in-memory implementations used
//! for simulation, replaying captures, and tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::codec::encode_ascii;
use crate::device_limits::DeviceLimits;
use crate::frame::FrameRecord;

/// Modbus slave/unit identifier (1-247).
pub type SlaveId = u8;

/// Register table a read addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFunction {
    /// Read Holding Registers (0x03).
    #[default]
    Holding,
    /// Read Input Registers (0x04).
    Input,
}

impl ReadFunction {
    /// Modbus function code.
    pub fn code(&self) -> u8 {
        match self {
            ReadFunction::Holding => 0x03,
            ReadFunction::Input => 0x04,
        }
    }
}

/// Blocking register reads against one physical device.
///
/// A read either returns exactly `count` words or fails.
pub trait RegisterTransport: Send {
    fn read_registers(
        &mut self,
        unit: SlaveId,
        function: ReadFunction,
        address: u16,
        count: u16,
    ) -> io::Result<Vec<u16>>;
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    fn read_registers(
        &mut self,
        unit: SlaveId,
        function: ReadFunction,
        address: u16,
        count: u16,
    ) -> io::Result<Vec<u16>> {
        (**self).read_registers(unit, function, address, count)
    }
}

/// Read `count` registers as a series of requests sized by `limits`,
/// pausing `inter_request_delay_ms` between requests.
///
/// Fails on the first failed request or on a response of the wrong length.
pub fn read_chunked<T: RegisterTransport + ?Sized>(
    device: &mut T,
    unit: SlaveId,
    function: ReadFunction,
    address: u16,
    count: u32,
    limits: &DeviceLimits,
) -> io::Result<Vec<u16>> {
    let mut words = Vec::with_capacity(count as usize);
    for (i, (addr, len)) in limits.chunks(address, count).into_iter().enumerate() {
        if i > 0 && limits.inter_request_delay_ms > 0 {
            thread::sleep(Duration::from_millis(limits.inter_request_delay_ms));
        }
        let chunk = device.read_registers(unit, function, addr, len)?;
        if chunk.len() != usize::from(len) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("asked for {} registers at {}, got {}", len, addr, chunk.len()),
            ));
        }
        words.extend(chunk);
    }
    Ok(words)
}

/// Source of received CAN frames. `Ok(None)` means nothing is pending.
pub trait FrameSource: Send {
    fn receive(&mut self) -> io::Result<Option<FrameRecord>>;
}

// ============================================================================
// Register Image
// ============================================================================

/// In-memory register map answering reads like a device would.
///
/// Reads touching an unmapped address fail with `InvalidInput` (the Modbus
/// "illegal data address" exception). Failures can be injected for the next
/// N reads or for any read covering a given address.
///
/// # Example
///
/// ```rust
/// use voltage_sample::{ReadFunction, RegisterImage, RegisterTransport};
///
/// let mut device = RegisterImage::new().with_holding(40000, &[0x5375, 0x6E53]);
/// let words = device.read_registers(1, ReadFunction::Holding, 40000, 2).unwrap();
/// assert_eq!(words, vec![0x5375, 0x6E53]);
/// assert!(device.read_registers(1, ReadFunction::Holding, 40002, 1).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RegisterImage {
    words: HashMap<(ReadFunction, u16), u16>,
    unit: Option<SlaveId>,
    fail_next: usize,
    fail_addresses: HashSet<u16>,
    read_count: usize,
}

impl RegisterImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only answer requests addressed to `unit`.
    pub fn with_unit(mut self, unit: SlaveId) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_holding(mut self, address: u16, words: &[u16]) -> Self {
        self.insert(ReadFunction::Holding, address, words);
        self
    }

    pub fn with_input(mut self, address: u16, words: &[u16]) -> Self {
        self.insert(ReadFunction::Input, address, words);
        self
    }

    /// Map consecutive words starting at `address`. Words past 0xFFFF are dropped.
    pub fn insert(&mut self, function: ReadFunction, address: u16, words: &[u16]) {
        for (addr, word) in (address..=u16::MAX).zip(words) {
            self.words.insert((function, addr), *word);
        }
    }

    /// Map ASCII text into `register_count` NUL-padded holding registers.
    pub fn insert_ascii(&mut self, address: u16, text: &str, register_count: usize) {
        self.insert(ReadFunction::Holding, address, &encode_ascii(text, register_count));
    }

    /// Unmap a holding register.
    pub fn remove(&mut self, address: u16) {
        self.words.remove(&(ReadFunction::Holding, address));
    }

    /// Make the next `count` reads fail with a timeout.
    pub fn fail_next(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// Make every read covering `address` fail.
    pub fn fail_at(&mut self, address: u16) {
        self.fail_addresses.insert(address);
    }

    pub fn clear_failures(&mut self) {
        self.fail_next = 0;
        self.fail_addresses.clear();
    }

    /// Number of read requests served or refused so far.
    pub fn read_count(&self) -> usize {
        self.read_count
    }
}

impl RegisterTransport for RegisterImage {
    fn read_registers(
        &mut self,
        unit: SlaveId,
        function: ReadFunction,
        address: u16,
        count: u16,
    ) -> io::Result<Vec<u16>> {
        self.read_count += 1;
        trace!(
            "Image read: unit={} fc={:02X} addr={} count={}",
            unit,
            function.code(),
            address,
            count
        );

        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "injected timeout"));
        }
        if self.unit.is_some_and(|u| u != unit) {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no response from unit {}", unit),
            ));
        }

        let end = u32::from(address) + u32::from(count);
        if end > u32::from(u16::MAX) + 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("range {}+{} exceeds address space", address, count),
            ));
        }

        (u32::from(address)..end)
            .map(|addr| {
                let addr = addr as u16;
                if self.fail_addresses.contains(&addr) {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        format!("injected failure at {}", addr),
                    ));
                }
                self.words.get(&(function, addr)).copied().ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("illegal data address {}", addr),
                    )
                })
            })
            .collect()
    }
}

// ============================================================================
// Frame Replay
// ============================================================================

/// Replays a queue of captured frames.
#[derive(Debug, Clone, Default)]
pub struct FrameReplay {
    frames: VecDeque<FrameRecord>,
}

impl FrameReplay {
    pub fn new(frames: impl IntoIterator<Item = FrameRecord>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: FrameRecord) {
        self.frames.push_back(frame);
    }

    pub fn pending(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for FrameReplay {
    fn receive(&mut self) -> io::Result<Option<FrameRecord>> {
        Ok(self.frames.pop_front())
    }
}
