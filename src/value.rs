//! # Sample Values
//!
//! Decoded values produced by the bit decoder and the typed register
//! accessors, plus the [`DataType`] tag used in field configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SampleError, SampleResult};

/// A decoded field value.
///
/// The bit decoder only ever yields [`SampleValue::U64`] or
/// [`SampleValue::I64`]; typed register accessors yield the width named by
/// their [`DataType`].
///
/// # Example
///
/// ```rust
/// use voltage_sample::SampleValue;
///
/// let temp = SampleValue::F32(25.5);
/// assert!((temp.as_f64() - 25.5).abs() < 0.001);
/// assert_eq!(SampleValue::I64(-3).as_i64(), -3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SampleValue {
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    U64(u64),
    I64(i64),
    F64(f64),
}

impl SampleValue {
    /// Widen to f64 for scaling and comparisons.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match *self {
            SampleValue::Bool(b) => f64::from(u8::from(b)),
            SampleValue::U16(v) => f64::from(v),
            SampleValue::I16(v) => f64::from(v),
            SampleValue::U32(v) => f64::from(v),
            SampleValue::I32(v) => f64::from(v),
            SampleValue::F32(v) => f64::from(v),
            SampleValue::U64(v) => v as f64,
            SampleValue::I64(v) => v as f64,
            SampleValue::F64(v) => v,
        }
    }

    /// Convert to i64. Floats round to nearest; `U64` above `i64::MAX` wraps.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        match *self {
            SampleValue::Bool(b) => i64::from(b),
            SampleValue::U16(v) => i64::from(v),
            SampleValue::I16(v) => i64::from(v),
            SampleValue::U32(v) => i64::from(v),
            SampleValue::I32(v) => i64::from(v),
            SampleValue::F32(v) => v.round() as i64,
            SampleValue::U64(v) => v as i64,
            SampleValue::I64(v) => v,
            SampleValue::F64(v) => v.round() as i64,
        }
    }

    /// Raw two's-complement bits, as the bit encoder consumes them.
    #[inline]
    pub fn to_bits(&self) -> u64 {
        match *self {
            SampleValue::F32(v) => u64::from(v.to_bits()),
            SampleValue::F64(v) => v.to_bits(),
            SampleValue::U64(v) => v,
            other => other.as_i64() as u64,
        }
    }

    /// Type name for logging.
    pub fn type_name(&self) -> &'static str {
        self.data_type().as_str()
    }

    /// The [`DataType`] this value was decoded as.
    pub fn data_type(&self) -> DataType {
        match self {
            SampleValue::Bool(_) => DataType::Bool,
            SampleValue::U16(_) => DataType::U16,
            SampleValue::I16(_) => DataType::I16,
            SampleValue::U32(_) => DataType::U32,
            SampleValue::I32(_) => DataType::I32,
            SampleValue::F32(_) => DataType::F32,
            SampleValue::U64(_) => DataType::U64,
            SampleValue::I64(_) => DataType::I64,
            SampleValue::F64(_) => DataType::F64,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Bool(v) => write!(f, "{}", v),
            SampleValue::U16(v) => write!(f, "{}", v),
            SampleValue::I16(v) => write!(f, "{}", v),
            SampleValue::U32(v) => write!(f, "{}", v),
            SampleValue::I32(v) => write!(f, "{}", v),
            SampleValue::F32(v) => write!(f, "{}", v),
            SampleValue::U64(v) => write!(f, "{}", v),
            SampleValue::I64(v) => write!(f, "{}", v),
            SampleValue::F64(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SampleValue {
                fn from(v: $ty) -> Self {
                    SampleValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool => Bool,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    u64 => U64,
    i64 => I64,
    f64 => F64,
);

// ============================================================================
// Data Type
// ============================================================================

/// Register data type named in field configuration.
///
/// | Type | Registers |
/// |------|-----------|
/// | Bool | 1 (bit within a register) |
/// | U16/I16 | 1 |
/// | U32/I32/F32 | 2 |
/// | U64/I64/F64 | 4 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    U16,
    I16,
    U32,
    I32,
    F32,
    U64,
    I64,
    F64,
}

impl DataType {
    /// Parse a configuration name, accepting the common aliases
    /// (`uint16`, `int32`, `float32`, `double`, ...).
    pub fn parse(name: &str) -> SampleResult<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let ty = match lower.as_str() {
            "bool" | "boolean" | "bit" => DataType::Bool,
            "u16" | "uint16" | "word" => DataType::U16,
            "i16" | "int16" => DataType::I16,
            "u32" | "uint32" | "dword" => DataType::U32,
            "i32" | "int32" => DataType::I32,
            "f32" | "float32" | "float" | "real" => DataType::F32,
            "u64" | "uint64" => DataType::U64,
            "i64" | "int64" => DataType::I64,
            "f64" | "float64" | "double" => DataType::F64,
            _ => {
                return Err(SampleError::InvalidData {
                    message: format!("Unsupported data type: {}", name),
                })
            }
        };
        Ok(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::U16 => "u16",
            DataType::I16 => "i16",
            DataType::U32 => "u32",
            DataType::I32 => "i32",
            DataType::F32 => "f32",
            DataType::U64 => "u64",
            DataType::I64 => "i64",
            DataType::F64 => "f64",
        }
    }

    /// Number of 16-bit registers backing a value of this type.
    #[inline]
    pub fn register_count(&self) -> usize {
        match self {
            DataType::Bool | DataType::U16 | DataType::I16 => 1,
            DataType::U32 | DataType::I32 | DataType::F32 => 2,
            DataType::U64 | DataType::I64 | DataType::F64 => 4,
        }
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            DataType::I16 | DataType::I32 | DataType::I64 | DataType::F32 | DataType::F64
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
