//! # Register Codec
//!
//! Conversion between raw register words and typed [`SampleValue`]s, honoring
//! the device's [`ByteOrder`]. Used by the register snapshot accessors, the
//! SunSpec model views and the register image builder.
//!
//! | Type | Registers | Aliases |
//! |------|-----------|---------|
//! | bool | 1 | boolean, bit |
//! | u16 / i16 | 1 | uint16, int16 |
//! | u32 / i32 / f32 | 2 | uint32, int32, float32 |
//! | u64 / i64 / f64 | 4 | uint64, int64, float64 |

use crate::bytes::{bytes_to_registers, registers_to_bytes, ByteOrder};
use crate::error::{SampleError, SampleResult};
use crate::value::{DataType, SampleValue};

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode register words as the given data type.
///
/// `bit_position` selects the bit (0-15, LSB = 0) for [`DataType::Bool`] and
/// is ignored otherwise.
///
/// # Example
///
/// ```rust
/// use voltage_sample::{decode_registers, ByteOrder, DataType, SampleValue};
///
/// let registers = [0x1234, 0x5678];
/// let value = decode_registers(&registers, DataType::U32, 0, ByteOrder::BigEndian).unwrap();
/// assert_eq!(value, SampleValue::U32(0x12345678));
/// ```
pub fn decode_registers(
    registers: &[u16],
    data_type: DataType,
    bit_position: u8,
    byte_order: ByteOrder,
) -> SampleResult<SampleValue> {
    let needed = data_type.register_count();
    if registers.len() < needed {
        return Err(SampleError::InvalidData {
            message: format!(
                "Not enough registers for {}: need {}, got {}",
                data_type,
                needed,
                registers.len()
            ),
        });
    }

    if data_type == DataType::Bool {
        if bit_position > 15 {
            return Err(SampleError::InvalidData {
                message: format!("Invalid bit position: {} (must be 0-15)", bit_position),
            });
        }
        return Ok(SampleValue::Bool((registers[0] >> bit_position) & 0x01 != 0));
    }

    let bytes = registers_to_bytes(&registers[..needed], byte_order);
    let value = match data_type {
        DataType::U16 => SampleValue::U16(u16::from_be_bytes([bytes[0], bytes[1]])),
        DataType::I16 => SampleValue::I16(i16::from_be_bytes([bytes[0], bytes[1]])),
        DataType::U32 => SampleValue::U32(u32::from_be_bytes(array4(&bytes))),
        DataType::I32 => SampleValue::I32(i32::from_be_bytes(array4(&bytes))),
        DataType::F32 => SampleValue::F32(f32::from_be_bytes(array4(&bytes))),
        DataType::U64 => SampleValue::U64(u64::from_be_bytes(array8(&bytes))),
        DataType::I64 => SampleValue::I64(i64::from_be_bytes(array8(&bytes))),
        DataType::F64 => SampleValue::F64(f64::from_be_bytes(array8(&bytes))),
        DataType::Bool => unreachable!("bool handled above"),
    };
    Ok(value)
}

#[inline]
fn array4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

#[inline]
fn array8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}

/// Decode registers holding packed ASCII (two characters per register, high
/// byte first). Trailing padding is removed: NUL bytes are dropped and
/// surrounding whitespace trimmed.
pub fn decode_ascii(registers: &[u16]) -> String {
    let bytes: Vec<u8> = registers
        .iter()
        .flat_map(|r| r.to_be_bytes())
        .filter(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Clamp a value to the range a data type can hold.
///
/// Prevents overflow when encoding e.g. 70000 as a `u16`.
pub fn clamp_to_data_type(value: f64, data_type: DataType) -> f64 {
    let (min, max): (f64, f64) = match data_type {
        DataType::Bool => return value,
        DataType::U16 => (0.0, f64::from(u16::MAX)),
        DataType::I16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
        DataType::U32 => (0.0, f64::from(u32::MAX)),
        DataType::I32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
        DataType::U64 => (0.0, u64::MAX as f64),
        DataType::I64 => (i64::MIN as f64, i64::MAX as f64),
        DataType::F32 => (f64::from(f32::MIN), f64::from(f32::MAX)),
        DataType::F64 => (f64::MIN, f64::MAX),
    };
    value.clamp(min, max)
}

/// Encode a value as register words.
///
/// # Example
///
/// ```rust
/// use voltage_sample::{encode_value, ByteOrder, SampleValue};
///
/// let registers = encode_value(&SampleValue::U32(0x12345678), ByteOrder::BigEndianSwap);
/// assert_eq!(registers, vec![0x5678, 0x1234]);
/// ```
pub fn encode_value(value: &SampleValue, byte_order: ByteOrder) -> Vec<u16> {
    match *value {
        SampleValue::Bool(b) => vec![u16::from(b)],
        SampleValue::U16(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::I16(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::U32(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::I32(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::F32(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::U64(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::I64(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
        SampleValue::F64(v) => bytes_to_registers(&v.to_be_bytes(), byte_order),
    }
}

/// Encode a generic numeric value as the given data type, clamping first.
pub fn encode_f64_as(value: f64, data_type: DataType, byte_order: ByteOrder) -> Vec<u16> {
    let clamped = clamp_to_data_type(value, data_type);
    let typed = match data_type {
        DataType::Bool => SampleValue::Bool(clamped != 0.0),
        DataType::U16 => SampleValue::U16(clamped as u16),
        DataType::I16 => SampleValue::I16(clamped as i16),
        DataType::U32 => SampleValue::U32(clamped as u32),
        DataType::I32 => SampleValue::I32(clamped as i32),
        DataType::F32 => SampleValue::F32(clamped as f32),
        DataType::U64 => SampleValue::U64(clamped as u64),
        DataType::I64 => SampleValue::I64(clamped as i64),
        DataType::F64 => SampleValue::F64(clamped),
    };
    encode_value(&typed, byte_order)
}

/// Pack ASCII text into `register_count` registers, NUL padded.
/// Text longer than the field is truncated.
pub fn encode_ascii(text: &str, register_count: usize) -> Vec<u16> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(register_count * 2, 0);
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uint16_and_int16() {
        let regs = [0xFFFE];
        assert_eq!(
            decode_registers(&regs, DataType::U16, 0, ByteOrder::BigEndian).unwrap(),
            SampleValue::U16(0xFFFE)
        );
        assert_eq!(
            decode_registers(&regs, DataType::I16, 0, ByteOrder::BigEndian).unwrap(),
            SampleValue::I16(-2)
        );
    }

    #[test]
    fn test_decode_uint32_word_swapped() {
        let regs = [0x5678, 0x1234];
        assert_eq!(
            decode_registers(&regs, DataType::U32, 0, ByteOrder::BigEndianSwap).unwrap(),
            SampleValue::U32(0x12345678)
        );
    }

    #[test]
    fn test_decode_float32() {
        let regs = [0x41C8, 0x0000];
        match decode_registers(&regs, DataType::F32, 0, ByteOrder::BigEndian).unwrap() {
            SampleValue::F32(v) => assert!((v - 25.0).abs() < f32::EPSILON),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_bool_bit_extraction() {
        let regs = [0b0000_0000_0010_0100];
        let bit = |pos| decode_registers(&regs, DataType::Bool, pos, ByteOrder::BigEndian);
        assert_eq!(bit(2).unwrap(), SampleValue::Bool(true));
        assert_eq!(bit(3).unwrap(), SampleValue::Bool(false));
        assert!(bit(16).is_err());
    }

    #[test]
    fn test_decode_short_input_is_error() {
        assert!(decode_registers(&[0x1234], DataType::U32, 0, ByteOrder::BigEndian).is_err());
    }

    #[test]
    fn test_encode_roundtrip_each_type() {
        let values = [
            SampleValue::I16(-1234),
            SampleValue::U32(0xDEADBEEF),
            SampleValue::I64(-5_000_000_000),
            SampleValue::F64(1.5),
        ];
        for order in [ByteOrder::BigEndian, ByteOrder::BigEndianSwap, ByteOrder::LittleEndian] {
            for value in values {
                let regs = encode_value(&value, order);
                let back = decode_registers(&regs, value.data_type(), 0, order).unwrap();
                assert_eq!(back, value, "{:?}", order);
            }
        }
    }

    #[test]
    fn test_encode_f64_clamps() {
        assert_eq!(encode_f64_as(70000.0, DataType::U16, ByteOrder::BigEndian), vec![0xFFFF]);
        assert_eq!(encode_f64_as(-1.0, DataType::U32, ByteOrder::BigEndian), vec![0, 0]);
        assert_eq!(clamp_to_data_type(-40000.0, DataType::I16), -32768.0);
    }

    #[test]
    fn test_ascii_roundtrip_trims_padding() {
        let regs = encode_ascii("Fronius ", 4);
        assert_eq!(regs.len(), 4);
        assert_eq!(decode_ascii(&regs), "Fronius");
        assert_eq!(decode_ascii(&[0x5375, 0x6E53]), "SunS");
    }
}
