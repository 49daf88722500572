//! Signal references: where a numeric field lives and how to decode it.

use serde::{Deserialize, Serialize};

use crate::bitfield::{decode_bits, BitOrigin};
use crate::bytes::ByteOrder;
use crate::constants::{MAX_SIGNAL_BITS, REGISTER_BITS};
use crate::error::{SampleError, SampleResult};
use crate::frame::CanId;
use crate::value::SampleValue;

/// Store key a signal is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// First register of the field.
    Register(u16),
    Frame(CanId),
}

/// Decode descriptor for one field, shared across any number of decodes.
///
/// For register locators the decode buffer is the run of
/// [`register_span`](Self::register_span) registers starting at the locator
/// address, each register contributing its two bytes high byte first. The
/// bit offset counts from the most significant bit of the locator register,
/// so offset 16 is the first bit of the next register. Frame payloads count
/// from the least significant bit unless `bit_origin` says otherwise.
///
/// # Example
///
/// ```rust
/// use voltage_sample::{ByteOrder, SignalReference};
///
/// // 32-bit signed power reading, low word first, in 0.1 W
/// let power = SignalReference::register(40083, 32)
///     .unwrap()
///     .with_byte_order(ByteOrder::BigEndianSwap)
///     .signed()
///     .with_scale(0.1);
/// assert_eq!(power.register_span(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReference {
    pub locator: Locator,
    #[serde(default)]
    pub bit_offset: u16,
    pub bit_length: u8,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub scale: Option<f64>,
    /// Unset means the locator's numbering, see [`origin`](Self::origin).
    #[serde(default)]
    pub bit_origin: Option<BitOrigin>,
}

impl SignalReference {
    fn build(locator: Locator, bit_offset: u16, bit_length: u8) -> SampleResult<Self> {
        let signal = Self {
            locator,
            bit_offset,
            bit_length,
            byte_order: ByteOrder::BigEndian,
            signed: false,
            scale: None,
            bit_origin: None,
        };
        signal.validate()?;
        Ok(signal)
    }

    /// Field of `bit_length` bits starting at register `address`, offset 0.
    pub fn register(address: u16, bit_length: u8) -> SampleResult<Self> {
        Self::build(Locator::Register(address), 0, bit_length)
    }

    /// Field inside the payload of frame `id`.
    pub fn frame(id: CanId, bit_offset: u16, bit_length: u8) -> SampleResult<Self> {
        id.validate()?;
        Self::build(Locator::Frame(id), bit_offset, bit_length)
    }

    pub fn with_bit_offset(mut self, bit_offset: u16) -> Self {
        self.bit_offset = bit_offset;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_bit_origin(mut self, origin: BitOrigin) -> Self {
        self.bit_origin = Some(origin);
        self
    }

    /// Bit numbering used for decoding.
    #[inline]
    pub fn origin(&self) -> BitOrigin {
        match (self.bit_origin, self.locator) {
            (Some(origin), _) => origin,
            (None, Locator::Register(_)) => BitOrigin::MostSignificant,
            (None, Locator::Frame(_)) => BitOrigin::LeastSignificant,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Reject descriptors that can never decode. Deserialized references
    /// are checked here on every store decode.
    pub fn validate(&self) -> SampleResult<()> {
        if self.bit_length == 0 || self.bit_length > MAX_SIGNAL_BITS {
            return Err(SampleError::invalid_signal(format!(
                "bit length {} outside 1..={}",
                self.bit_length, MAX_SIGNAL_BITS
            )));
        }
        if let Locator::Register(address) = self.locator {
            // the span grows with the offset, so LSB numbering would move
            // offset 0 into the last register
            if self.origin() == BitOrigin::LeastSignificant {
                return Err(SampleError::invalid_signal(format!(
                    "register {} field must count bits from the most significant bit",
                    address
                )));
            }
            let last = u32::from(address) + self.register_span() as u32 - 1;
            if last > u32::from(u16::MAX) {
                return Err(SampleError::invalid_signal(format!(
                    "field at register {} runs past the address space",
                    address
                )));
            }
        }
        Ok(())
    }

    /// Registers covered by a register-located field.
    #[inline]
    pub fn register_span(&self) -> usize {
        (usize::from(self.bit_offset) + usize::from(self.bit_length)).div_ceil(REGISTER_BITS)
    }

    /// Decode this field from a raw buffer.
    pub fn decode(&self, buf: &[u8]) -> Option<SampleValue> {
        decode_bits(
            buf,
            self.bit_offset,
            self.bit_length,
            self.byte_order,
            self.signed,
            self.origin(),
        )
    }

    /// Multiply by the configured scale; unscaled fields pass through.
    #[inline]
    pub fn apply_scale(&self, value: SampleValue) -> f64 {
        match self.scale {
            Some(scale) => value.as_f64() * scale,
            None => value.as_f64(),
        }
    }
}
