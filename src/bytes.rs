//! # Byte Order Handling
//!
//! Unified byte/word order representation for register maps and frame payloads.
//! Supports ABCD, DCBA, CDAB, BADC patterns commonly used in PLCs, meters and
//! inverters.
//!
//! ## Terminology
//!
//! - **Byte order**: Order of bytes within multi-byte values (endianness)
//! - **Word order**: Order of 16-bit words when combining to form 32/64-bit values
//!
//! ## Naming Convention
//!
//! Uses ABCD notation where:
//! - A = Most significant byte (MSB)
//! - B = Second byte
//! - C = Third byte
//! - D = Least significant byte (LSB)
//!
//! For 32-bit value `0x12345678` stored in two registers:
//! - `BigEndian (ABCD)`: \[0x1234, 0x5678\]
//! - `LittleEndian (DCBA)`: \[0x7856, 0x3412\]
//! - `BigEndianSwap (CDAB)`: \[0x5678, 0x1234\] (the "little-endian" word order of most devices)
//! - `LittleEndianSwap (BADC)`: \[0x3412, 0x7856\]
//!
//! Every order is an involution on the wire bytes: applying [`reorder`] twice
//! restores the original buffer, so the same routine serves both decoding and
//! encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified byte/word order representation for register and payload data.
///
/// # Example
///
/// ```rust
/// use voltage_sample::ByteOrder;
///
/// let order = ByteOrder::from_str("CDAB").unwrap();
/// assert_eq!(order, ByteOrder::BigEndianSwap);
/// assert!(order.has_word_swap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Big-endian: ABCD (most significant byte first)
    BigEndian,

    /// Little-endian: DCBA (least significant byte first)
    LittleEndian,

    /// Big-endian words in reversed order: CDAB
    ///
    /// Devices documented as "little-endian" at the register-pair level use
    /// this order: each register is big-endian, the low register comes first.
    BigEndianSwap,

    /// Little-endian words in big-endian order: BADC
    LittleEndianSwap,

    /// 16-bit big-endian: AB
    BigEndian16,

    /// 16-bit little-endian: BA
    LittleEndian16,
}

impl ByteOrder {
    /// Convert from configuration string formats.
    ///
    /// - "ABCD", "BE", "BIG_ENDIAN" → BigEndian
    /// - "DCBA", "LE", "LITTLE_ENDIAN" → LittleEndian
    /// - "CDAB", "WORD_SWAP" → BigEndianSwap
    /// - "BADC", "BYTE_SWAP" → LittleEndianSwap
    /// - "AB" / "BA" → 16-bit variants
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" | "ABCDEFGH" => Some(Self::BigEndian),
            "DCBA" | "LE" | "LITTLEENDIAN" | "HGFEDCBA" => Some(Self::LittleEndian),
            "CDAB" | "BIGENDIANSWAP" | "WORDSWAP" => Some(Self::BigEndianSwap),
            "BADC" | "LITTLEENDIANSWAP" | "BYTESWAP" => Some(Self::LittleEndianSwap),
            "AB" => Some(Self::BigEndian16),
            "BA" => Some(Self::LittleEndian16),
            _ => None,
        }
    }

    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::LittleEndian => "DCBA (Little-Endian)",
            Self::BigEndianSwap => "CDAB (Big-Endian Swap)",
            Self::LittleEndianSwap => "BADC (Little-Endian Swap)",
            Self::BigEndian16 => "AB (Big-Endian 16)",
            Self::LittleEndian16 => "BA (Little-Endian 16)",
        }
    }

    /// Check if words are swapped (for 32/64-bit values).
    #[inline]
    pub fn has_word_swap(&self) -> bool {
        matches!(self, Self::BigEndianSwap | Self::LittleEndianSwap)
    }

    /// Check if the wire bytes are already in value order.
    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::BigEndian | Self::BigEndian16)
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for ByteOrder {
    /// Default to big-endian (network byte order).
    fn default() -> Self {
        Self::BigEndian
    }
}

// ============================================================================
// Buffer Reordering
// ============================================================================

/// Reorder wire bytes into big-endian value order, in place.
///
/// Word-based orders treat the buffer as consecutive 16-bit words; an odd
/// trailing byte stays in place. Bit order within a byte is never changed.
///
/// # Example
///
/// ```rust
/// use voltage_sample::bytes::reorder;
/// use voltage_sample::ByteOrder;
///
/// let mut buf = [0x56, 0x78, 0x12, 0x34];
/// reorder(&mut buf, ByteOrder::BigEndianSwap);
/// assert_eq!(buf, [0x12, 0x34, 0x56, 0x78]);
/// ```
pub fn reorder(buf: &mut [u8], order: ByteOrder) {
    match order {
        ByteOrder::BigEndian | ByteOrder::BigEndian16 => {}
        ByteOrder::LittleEndian | ByteOrder::LittleEndian16 => buf.reverse(),
        ByteOrder::LittleEndianSwap => {
            for word in buf.chunks_exact_mut(2) {
                word.swap(0, 1);
            }
        }
        ByteOrder::BigEndianSwap => {
            let even = buf.len() & !1;
            let words = &mut buf[..even];
            words.reverse();
            for word in words.chunks_exact_mut(2) {
                word.swap(0, 1);
            }
        }
    }
}

/// Flatten registers to wire bytes (each register big-endian, as transmitted).
#[inline]
pub fn registers_to_wire(regs: &[u16]) -> Vec<u8> {
    regs.iter().flat_map(|r| r.to_be_bytes()).collect()
}

/// Convert registers to big-endian value bytes using the given order.
///
/// # Example
///
/// ```rust
/// use voltage_sample::{ByteOrder, registers_to_bytes};
///
/// let regs = [0x1234, 0x5678];
/// assert_eq!(registers_to_bytes(&regs, ByteOrder::BigEndian), [0x12, 0x34, 0x56, 0x78]);
/// assert_eq!(registers_to_bytes(&regs, ByteOrder::BigEndianSwap), [0x56, 0x78, 0x12, 0x34]);
/// ```
pub fn registers_to_bytes(regs: &[u16], order: ByteOrder) -> Vec<u8> {
    let mut bytes = registers_to_wire(regs);
    reorder(&mut bytes, order);
    bytes
}

/// Convert big-endian value bytes to registers using the given order.
///
/// An odd trailing byte lands in the high half of the final register.
pub fn bytes_to_registers(bytes: &[u8], order: ByteOrder) -> Vec<u16> {
    let mut wire = bytes.to_vec();
    reorder(&mut wire, order);
    wire.chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect()
}

#[inline]
fn value_bytes<const N: usize>(regs: &[u16], order: ByteOrder) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&registers_to_bytes(&regs[..N / 2], order));
    out
}

// ============================================================================
// Register to Numeric Type Conversions
// ============================================================================

/// Convert single u16 register to u16 (with byte swapping if needed).
#[inline]
pub fn reg_to_u16(reg: u16, order: ByteOrder) -> u16 {
    match order {
        ByteOrder::LittleEndian16 | ByteOrder::LittleEndian | ByteOrder::LittleEndianSwap => {
            reg.swap_bytes()
        }
        _ => reg,
    }
}

/// Convert 2 u16 registers to u32.
#[inline]
pub fn regs_to_u32(regs: &[u16; 2], order: ByteOrder) -> u32 {
    u32::from_be_bytes(value_bytes(regs, order))
}

/// Convert 2 u16 registers to i32.
#[inline]
pub fn regs_to_i32(regs: &[u16; 2], order: ByteOrder) -> i32 {
    i32::from_be_bytes(value_bytes(regs, order))
}

/// Convert 2 u16 registers to f32.
#[inline]
pub fn regs_to_f32(regs: &[u16; 2], order: ByteOrder) -> f32 {
    f32::from_be_bytes(value_bytes(regs, order))
}

/// Convert 4 u16 registers to u64.
#[inline]
pub fn regs_to_u64(regs: &[u16; 4], order: ByteOrder) -> u64 {
    u64::from_be_bytes(value_bytes(regs, order))
}

/// Convert 4 u16 registers to i64.
#[inline]
pub fn regs_to_i64(regs: &[u16; 4], order: ByteOrder) -> i64 {
    i64::from_be_bytes(value_bytes(regs, order))
}

/// Convert 4 u16 registers to f64.
#[inline]
pub fn regs_to_f64(regs: &[u16; 4], order: ByteOrder) -> f64 {
    f64::from_be_bytes(value_bytes(regs, order))
}

// ============================================================================
// Tests
// ============================================================================
