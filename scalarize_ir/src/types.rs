//! Value types of the IR.
//!
//! The scalar types a lowered graph may carry, the 128-bit vector type it
//! must no longer carry, and the token types used for ordering. `Top` marks
//! a type not yet known; `Bottom` an id outside the graph.

use std::fmt;

/// Type of a node's output.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Not yet known.
    #[default]
    Top = 0,

    /// 32-bit integer (sign-agnostic, as in wasm).
    Int32 = 1,

    /// IEEE-754 single precision.
    Float32 = 2,

    /// 128-bit vector; shape is carried by the operators, not the type.
    Simd128 = 3,

    /// Multi-value result of a call; read through projections.
    Tuple = 4,

    /// Control token (start, return, end).
    Control = 250,

    /// Effect token produced by stores.
    Effect = 252,

    /// Unreachable.
    Bottom = 255,
}

impl ValueType {
    /// Whether the type is a 32-bit scalar.
    #[inline]
    pub const fn is_scalar(self) -> bool {
        matches!(self, ValueType::Int32 | ValueType::Float32)
    }

    #[inline]
    pub const fn is_vector(self) -> bool {
        matches!(self, ValueType::Simd128)
    }

    /// Whether the type is a token rather than a value.
    #[inline]
    pub const fn is_side_effect(self) -> bool {
        matches!(self, ValueType::Control | ValueType::Effect)
    }

    /// Storage size in bytes of a value of this type.
    #[inline]
    pub const fn size_bytes(self) -> Option<usize> {
        match self {
            ValueType::Int32 | ValueType::Float32 => Some(4),
            ValueType::Simd128 => Some(16),
            _ => None,
        }
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Top => "top",
            ValueType::Int32 => "i32",
            ValueType::Float32 => "f32",
            ValueType::Simd128 => "s128",
            ValueType::Tuple => "tuple",
            ValueType::Control => "control",
            ValueType::Effect => "effect",
            ValueType::Bottom => "bottom",
        };
        f.write_str(name)
    }
}
