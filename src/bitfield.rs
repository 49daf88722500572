//! # Bit Field Decoding
//!
//! Pure functions extracting and inserting N-bit numeric fields (1..=64 bits)
//! at arbitrary bit offsets in a byte buffer. Fields may straddle byte and
//! register boundaries.
//!
//! The buffer is first brought into big-endian value order according to its
//! [`ByteOrder`] (see [`crate::bytes::reorder`]); bits inside a byte are never
//! reversed. The offset is then counted according to [`BitOrigin`]:
//!
//! - [`BitOrigin::LeastSignificant`] (default): offset 0 is the least
//!   significant bit of the whole buffer read as one big-endian integer, the
//!   numbering used by DBC-style CAN signal definitions.
//! - [`BitOrigin::MostSignificant`]: offset 0 is the most significant bit of
//!   the first byte.
//!
//! ```rust
//! use voltage_sample::bitfield::{decode_bits, BitOrigin};
//! use voltage_sample::{ByteOrder, SampleValue};
//!
//! let payload = [0x32, 0x15, 0xDC, 0x1A, 0x3D, 0x07, 0x65, 0x38];
//! let value = decode_bits(&payload, 4, 12, ByteOrder::BigEndian, false, BitOrigin::default());
//! assert_eq!(value, Some(SampleValue::U64(0x653)));
//! ```

use serde::{Deserialize, Serialize};

use crate::bytes::{reorder, ByteOrder};
use crate::constants::MAX_SIGNAL_BITS;
use crate::value::SampleValue;

/// Where bit offset 0 sits in the canonical buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrigin {
    #[default]
    LeastSignificant,
    MostSignificant,
}

/// Index of the field's first bit counted from the MSB of byte 0, or `None`
/// when the field does not fit in `byte_len` bytes.
#[inline]
fn msb_start(byte_len: usize, bit_offset: u16, bit_length: u8, origin: BitOrigin) -> Option<usize> {
    if bit_length == 0 || bit_length > MAX_SIGNAL_BITS {
        return None;
    }
    let total = byte_len * 8;
    let end = usize::from(bit_offset) + usize::from(bit_length);
    if end > total {
        return None;
    }
    Some(match origin {
        BitOrigin::MostSignificant => usize::from(bit_offset),
        BitOrigin::LeastSignificant => total - end,
    })
}

#[inline]
fn mask(bit_length: u8) -> u64 {
    if bit_length >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_length) - 1
    }
}

/// Sign-extend the low `bit_length` bits of `raw`.
#[inline]
pub fn sign_extend(raw: u64, bit_length: u8) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return raw as i64;
    }
    let shift = 64 - u32::from(bit_length);
    ((raw << shift) as i64) >> shift
}

/// Extract the raw bits of a field, or `None` if the buffer is too short.
pub fn extract_bits(
    buf: &[u8],
    bit_offset: u16,
    bit_length: u8,
    byte_order: ByteOrder,
    origin: BitOrigin,
) -> Option<u64> {
    let start = msb_start(buf.len(), bit_offset, bit_length, origin)?;
    let len = usize::from(bit_length);
    let first = start / 8;
    let last = (start + len - 1) / 8;

    let mut canonical = buf.to_vec();
    reorder(&mut canonical, byte_order);

    // at most 9 bytes for an unaligned 64-bit field
    let acc = canonical[first..=last]
        .iter()
        .fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
    let trailing = (last + 1) * 8 - (start + len);
    Some((acc >> trailing) as u64 & mask(bit_length))
}

/// Decode a numeric field.
///
/// Unsigned fields yield [`SampleValue::U64`], signed fields a sign-extended
/// [`SampleValue::I64`]. Returns `None` when any bit of the field lies
/// outside the buffer or the length is outside 1..=64.
pub fn decode_bits(
    buf: &[u8],
    bit_offset: u16,
    bit_length: u8,
    byte_order: ByteOrder,
    signed: bool,
    origin: BitOrigin,
) -> Option<SampleValue> {
    let raw = extract_bits(buf, bit_offset, bit_length, byte_order, origin)?;
    Some(if signed {
        SampleValue::I64(sign_extend(raw, bit_length))
    } else {
        SampleValue::U64(raw)
    })
}

/// Insert the low `bit_length` bits of `value` into `buf`, leaving all other
/// bits untouched. Returns `false` (and leaves `buf` unchanged) when the
/// field does not fit.
pub fn encode_bits(
    buf: &mut [u8],
    bit_offset: u16,
    bit_length: u8,
    byte_order: ByteOrder,
    origin: BitOrigin,
    value: u64,
) -> bool {
    let Some(start) = msb_start(buf.len(), bit_offset, bit_length, origin) else {
        return false;
    };
    let len = usize::from(bit_length);
    let value = value & mask(bit_length);

    reorder(buf, byte_order);
    for i in 0..len {
        let pos = start + len - 1 - i;
        let bit = 0x80u8 >> (pos % 8);
        if (value >> i) & 1 == 1 {
            buf[pos / 8] |= bit;
        } else {
            buf[pos / 8] &= !bit;
        }
    }
    reorder(buf, byte_order);
    true
}

// ============================================================================
// Tests
// ============================================================================
