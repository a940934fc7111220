//! Runtime values, as seen by the interpreter and by constant folding of
//! lane data.

use crate::types::ValueType;
use std::fmt;

/// Raw 128-bit vector payload, lane 0 in the lowest-addressed bytes.
pub type V128 = [u8; 16];

/// A concrete value of one of the IR's value types.
#[derive(Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    F32(f32),
    V128(V128),
}

impl Value {
    /// The IR type of this value.
    pub const fn ty(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::Int32,
            Value::F32(_) => ValueType::Float32,
            Value::V128(_) => ValueType::Simd128,
        }
    }

    pub const fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_v128(&self) -> Option<V128> {
        match self {
            Value::V128(v) => Some(*v),
            _ => None,
        }
    }

    /// Bit pattern of a 32-bit scalar.
    pub fn bits32(&self) -> Option<u32> {
        match self {
            Value::I32(v) => Some(*v as u32),
            Value::F32(v) => Some(v.to_bits()),
            Value::V128(_) => None,
        }
    }

    /// Bitwise equality; unlike `==`, NaN payloads compare by pattern.
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::V128(a), Value::V128(b)) => a == b,
            (Value::V128(_), _) | (_, Value::V128(_)) => false,
            _ => self.ty() == other.ty() && self.bits32() == other.bits32(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{}", v),
            Value::F32(v) => write!(f, "f32:{:?}", v),
            Value::V128(bytes) => {
                write!(f, "v128:")?;
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<V128> for Value {
    fn from(v: V128) -> Self {
        Value::V128(v)
    }
}
