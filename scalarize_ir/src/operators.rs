//! Operator definitions.
//!
//! Operators are grouped by family:
//! - **Control**: start, return, end
//! - **Scalar**: 32-bit integer and float arithmetic, comparisons, conversions
//! - **Calls**: direct calls and their result projections
//! - **Globals**: byte-addressed loads and stores into module globals
//! - **SIMD**: 128-bit vector operations, each carrying the [`Shape`] it
//!   operates on
//!
//! # Input layout
//!
//! | Operator | Inputs |
//! | --- | --- |
//! | `Parameter` | `[start]` |
//! | `Call` | `[effect, args...]` |
//! | `Projection` | `[call]` |
//! | `GlobalGet` | `[effect]` |
//! | `GlobalSet` | `[effect, value]` |
//! | `Return` | `[effect, values...]` |
//! | `End` | `[return]` |
//! | `Select` | `[if_true, if_false, condition]` |
//! | `Simd(ReplaceLane)` | `[vector, scalar]` |
//! | `Simd(Shift)` | `[vector, count]` |
//! | `Simd(BitSelect)` | `[if_set, if_clear, mask]` |
//!
//! Every other operator takes its value operands in order.

use crate::module::FuncIndex;
use crate::shape::{Extension, Shape};
use crate::types::ValueType;
use crate::value::V128;

// =============================================================================
// Control
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlOp {
    /// Graph entry; the first link of the effect chain.
    Start = 0,
    /// Function exit carrying the returned values.
    Return = 1,
    /// Graph sink.
    End = 2,
}

// =============================================================================
// Scalar Operators
// =============================================================================

/// Binary `i32` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IntBinOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    And = 3,
    Or = 4,
    Xor = 5,
    /// Shift left; count taken modulo 32.
    Shl = 6,
    /// Arithmetic shift right; count taken modulo 32.
    ShrS = 7,
    /// Logical shift right; count taken modulo 32.
    ShrU = 8,
}

impl IntBinOp {
    #[inline]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            IntBinOp::Add | IntBinOp::Mul | IntBinOp::And | IntBinOp::Or | IntBinOp::Xor
        )
    }

    /// Apply with wasm `i32` semantics.
    #[inline]
    pub const fn eval(self, a: i32, b: i32) -> i32 {
        match self {
            IntBinOp::Add => a.wrapping_add(b),
            IntBinOp::Sub => a.wrapping_sub(b),
            IntBinOp::Mul => a.wrapping_mul(b),
            IntBinOp::And => a & b,
            IntBinOp::Or => a | b,
            IntBinOp::Xor => a ^ b,
            IntBinOp::Shl => a.wrapping_shl(b as u32),
            IntBinOp::ShrS => a.wrapping_shr(b as u32),
            IntBinOp::ShrU => (a as u32).wrapping_shr(b as u32) as i32,
        }
    }
}

/// `i32` comparison producing 1 or 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IntCmpOp {
    Eq = 0,
    Ne = 1,
    LtS = 2,
    LtU = 3,
    LeS = 4,
    LeU = 5,
    GtS = 6,
    GtU = 7,
    GeS = 8,
    GeU = 9,
}

impl IntCmpOp {
    /// Whether the comparison reads its operands as unsigned.
    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntCmpOp::LtU | IntCmpOp::LeU | IntCmpOp::GtU | IntCmpOp::GeU
        )
    }

    #[inline]
    pub const fn eval(self, a: i32, b: i32) -> bool {
        let (ua, ub) = (a as u32, b as u32);
        match self {
            IntCmpOp::Eq => a == b,
            IntCmpOp::Ne => a != b,
            IntCmpOp::LtS => a < b,
            IntCmpOp::LtU => ua < ub,
            IntCmpOp::LeS => a <= b,
            IntCmpOp::LeU => ua <= ub,
            IntCmpOp::GtS => a > b,
            IntCmpOp::GtU => ua > ub,
            IntCmpOp::GeS => a >= b,
            IntCmpOp::GeU => ua >= ub,
        }
    }
}

/// Unary `f32` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FloatUnOp {
    /// Flips the sign bit, NaN included.
    Neg = 0,
    /// Clears the sign bit, NaN included.
    Abs = 1,
    /// Correctly rounded square root.
    Sqrt = 2,
}

impl FloatUnOp {
    #[inline]
    pub fn eval(self, a: f32) -> f32 {
        match self {
            FloatUnOp::Neg => f32::from_bits(a.to_bits() ^ 0x8000_0000),
            FloatUnOp::Abs => f32::from_bits(a.to_bits() & 0x7fff_ffff),
            FloatUnOp::Sqrt => a.sqrt(),
        }
    }
}

/// Binary `f32` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FloatBinOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    /// wasm `f32.min`: NaN-propagating, `-0 < +0`.
    Min = 4,
    /// wasm `f32.max`: NaN-propagating, `-0 < +0`.
    Max = 5,
}

impl FloatBinOp {
    pub fn eval(self, a: f32, b: f32) -> f32 {
        match self {
            FloatBinOp::Add => a + b,
            FloatBinOp::Sub => a - b,
            FloatBinOp::Mul => a * b,
            FloatBinOp::Div => a / b,
            FloatBinOp::Min => {
                if a.is_nan() || b.is_nan() {
                    f32::NAN
                } else if a == b {
                    // Only differs for signed zeros: prefer the negative one.
                    f32::from_bits(a.to_bits() | b.to_bits())
                } else {
                    a.min(b)
                }
            }
            FloatBinOp::Max => {
                if a.is_nan() || b.is_nan() {
                    f32::NAN
                } else if a == b {
                    f32::from_bits(a.to_bits() & b.to_bits())
                } else {
                    a.max(b)
                }
            }
        }
    }
}

/// `f32` comparison producing 1 or 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FloatCmpOp {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
}

impl FloatCmpOp {
    #[inline]
    pub fn eval(self, a: f32, b: f32) -> bool {
        match self {
            FloatCmpOp::Eq => a == b,
            FloatCmpOp::Ne => a != b,
            FloatCmpOp::Lt => a < b,
            FloatCmpOp::Le => a <= b,
            FloatCmpOp::Gt => a > b,
            FloatCmpOp::Ge => a >= b,
        }
    }
}

/// Scalar conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConvertOp {
    /// Reinterpret `f32` bits as `i32`.
    BitcastF32ToI32 = 0,
    /// Reinterpret `i32` bits as `f32`.
    BitcastI32ToF32 = 1,
    /// Signed integer to nearest float.
    I32ToF32S = 2,
    /// Unsigned integer to nearest float.
    I32ToF32U = 3,
}

impl ConvertOp {
    pub const fn input_type(self) -> ValueType {
        match self {
            ConvertOp::BitcastF32ToI32 => ValueType::Float32,
            _ => ValueType::Int32,
        }
    }

    pub const fn result_type(self) -> ValueType {
        match self {
            ConvertOp::BitcastF32ToI32 => ValueType::Int32,
            _ => ValueType::Float32,
        }
    }
}

// =============================================================================
// Globals
// =============================================================================

/// A byte-addressed access into a module global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalAccess {
    /// Index into the module's global list.
    pub global: u32,
    /// Byte offset inside the global's storage.
    pub offset: u8,
}

impl GlobalAccess {
    #[inline]
    pub const fn new(global: u32, offset: u8) -> Self {
        Self { global, offset }
    }
}

// =============================================================================
// SIMD Operators
// =============================================================================

/// Lane-wise unary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdUnOp {
    Neg = 0,
    Abs = 1,
    Sqrt = 2,
}

/// Lane-wise binary arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdBinOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    MinS = 4,
    MinU = 5,
    MaxS = 6,
    MaxU = 7,
    /// Float minimum.
    Min = 8,
    /// Float maximum.
    Max = 9,
}

/// Lane-wise comparison producing an all-ones / all-zeros mask per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdCmpOp {
    Eq = 0,
    Ne = 1,
    LtS = 2,
    LtU = 3,
    LeS = 4,
    LeU = 5,
    GtS = 6,
    GtU = 7,
    GeS = 8,
    GeU = 9,
    /// Float orderings.
    Lt = 10,
    Le = 11,
    Gt = 12,
    Ge = 13,
}

impl SimdCmpOp {
    /// Scalar comparison used for integer lanes, if this is an integer compare.
    pub const fn int_cmp(self) -> Option<IntCmpOp> {
        Some(match self {
            SimdCmpOp::Eq => IntCmpOp::Eq,
            SimdCmpOp::Ne => IntCmpOp::Ne,
            SimdCmpOp::LtS => IntCmpOp::LtS,
            SimdCmpOp::LtU => IntCmpOp::LtU,
            SimdCmpOp::LeS => IntCmpOp::LeS,
            SimdCmpOp::LeU => IntCmpOp::LeU,
            SimdCmpOp::GtS => IntCmpOp::GtS,
            SimdCmpOp::GtU => IntCmpOp::GtU,
            SimdCmpOp::GeS => IntCmpOp::GeS,
            SimdCmpOp::GeU => IntCmpOp::GeU,
            _ => return None,
        })
    }

    /// Scalar comparison used for float lanes, if this is a float compare.
    pub const fn float_cmp(self) -> Option<FloatCmpOp> {
        Some(match self {
            SimdCmpOp::Eq => FloatCmpOp::Eq,
            SimdCmpOp::Ne => FloatCmpOp::Ne,
            SimdCmpOp::Lt => FloatCmpOp::Lt,
            SimdCmpOp::Le => FloatCmpOp::Le,
            SimdCmpOp::Gt => FloatCmpOp::Gt,
            SimdCmpOp::Ge => FloatCmpOp::Ge,
            _ => return None,
        })
    }
}

/// Lane-wise shift by a scalar count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdShiftOp {
    Shl = 0,
    ShrS = 1,
    ShrU = 2,
}

/// Whole-vector bitwise operation; shape-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdBitOp {
    And = 0,
    Or = 1,
    Xor = 2,
    /// `a & !b`.
    AndNot = 3,
}

/// Integer-to-float lane conversion (`f32x4.convert_i32x4_{s,u}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdConvertOp {
    I32x4ToF32x4S = 0,
    I32x4ToF32x4U = 1,
}

/// Lowering family of a SIMD operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdFamily {
    Constant = 0,
    Splat = 1,
    Unary = 2,
    Binary = 3,
    Compare = 4,
    Shift = 5,
    Bitwise = 6,
    Select = 7,
    Extract = 8,
    Replace = 9,
    Convert = 10,
    Reduction = 11,
}

/// A 128-bit vector operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimdOp {
    /// `v128.const`.
    Const(V128),
    /// Broadcast a scalar into every lane.
    Splat(Shape),
    Unary(Shape, SimdUnOp),
    Binary(Shape, SimdBinOp),
    Compare(Shape, SimdCmpOp),
    Shift(Shape, SimdShiftOp),
    /// `v128.not`.
    Not,
    Bitwise(SimdBitOp),
    /// `v128.bitselect`.
    BitSelect,
    /// Read one lane as a scalar.
    ExtractLane(Shape, u8, Extension),
    /// Copy of the vector with one lane replaced.
    ReplaceLane(Shape, u8),
    Convert(SimdConvertOp),
    /// 1 if every lane is nonzero.
    AllTrue(Shape),
    /// 1 if any lane is nonzero.
    AnyTrue(Shape),
}

impl SimdOp {
    pub const fn family(&self) -> SimdFamily {
        match self {
            SimdOp::Const(_) => SimdFamily::Constant,
            SimdOp::Splat(_) => SimdFamily::Splat,
            SimdOp::Unary(..) => SimdFamily::Unary,
            SimdOp::Binary(..) => SimdFamily::Binary,
            SimdOp::Compare(..) => SimdFamily::Compare,
            SimdOp::Shift(..) => SimdFamily::Shift,
            SimdOp::Not | SimdOp::Bitwise(_) => SimdFamily::Bitwise,
            SimdOp::BitSelect => SimdFamily::Select,
            SimdOp::ExtractLane(..) => SimdFamily::Extract,
            SimdOp::ReplaceLane(..) => SimdFamily::Replace,
            SimdOp::Convert(_) => SimdFamily::Convert,
            SimdOp::AllTrue(_) | SimdOp::AnyTrue(_) => SimdFamily::Reduction,
        }
    }

    /// Shape this operator is declared with, if any.
    pub const fn shape(&self) -> Option<Shape> {
        match self {
            SimdOp::Splat(s)
            | SimdOp::Unary(s, _)
            | SimdOp::Binary(s, _)
            | SimdOp::Compare(s, _)
            | SimdOp::Shift(s, _)
            | SimdOp::ExtractLane(s, ..)
            | SimdOp::ReplaceLane(s, _)
            | SimdOp::AllTrue(s)
            | SimdOp::AnyTrue(s) => Some(*s),
            SimdOp::Convert(_) => Some(Shape::I32X4),
            SimdOp::Const(_) | SimdOp::Not | SimdOp::Bitwise(_) | SimdOp::BitSelect => None,
        }
    }

    /// Whether the instruction set defines this operator for its shape.
    pub const fn is_defined(&self) -> bool {
        match self {
            SimdOp::Unary(s, op) => match op {
                SimdUnOp::Neg | SimdUnOp::Abs => true,
                SimdUnOp::Sqrt => s.is_float(),
            },
            SimdOp::Binary(s, op) => match op {
                SimdBinOp::Add | SimdBinOp::Sub => true,
                SimdBinOp::Mul => s.lane_bits() > 8,
                SimdBinOp::Div | SimdBinOp::Min | SimdBinOp::Max => s.is_float(),
                SimdBinOp::MinS | SimdBinOp::MinU | SimdBinOp::MaxS | SimdBinOp::MaxU => {
                    s.is_integer()
                }
            },
            SimdOp::Compare(s, op) => match op {
                SimdCmpOp::Eq | SimdCmpOp::Ne => true,
                SimdCmpOp::Lt | SimdCmpOp::Le | SimdCmpOp::Gt | SimdCmpOp::Ge => s.is_float(),
                _ => s.is_integer(),
            },
            SimdOp::Shift(s, _) | SimdOp::AllTrue(s) | SimdOp::AnyTrue(s) => s.is_integer(),
            _ => true,
        }
    }

    /// Shape of the vector this operator produces, if it produces one.
    pub const fn result_shape(&self) -> Option<Shape> {
        match self {
            SimdOp::Splat(s)
            | SimdOp::Unary(s, _)
            | SimdOp::Binary(s, _)
            | SimdOp::Shift(s, _)
            | SimdOp::ReplaceLane(s, _) => Some(*s),
            SimdOp::Compare(s, _) => Some(s.integer()),
            SimdOp::Convert(_) => Some(Shape::F32X4),
            _ => None,
        }
    }

    /// Result type of the node.
    pub const fn result_type(&self) -> ValueType {
        match self {
            SimdOp::ExtractLane(s, ..) => s.slot_type(),
            SimdOp::AllTrue(_) | SimdOp::AnyTrue(_) => ValueType::Int32,
            _ => ValueType::Simd128,
        }
    }
}

// =============================================================================
// Operator (Unified)
// =============================================================================

/// Every operation a node can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Control(ControlOp),
    /// Function parameter by signature position.
    Parameter(u16),

    ConstI32(i32),
    /// `f32` constant stored as bits for `Eq`/`Hash`.
    ConstF32(u32),

    IntBinary(IntBinOp),
    IntCompare(IntCmpOp),
    FloatUnary(FloatUnOp),
    FloatBinary(FloatBinOp),
    FloatCompare(FloatCmpOp),
    Convert(ConvertOp),
    /// `condition != 0 ? if_true : if_false`.
    Select,

    /// Direct call; produces a tuple read through projections.
    Call(FuncIndex),
    /// Element of a call's result tuple.
    Projection(u16),

    GlobalGet(GlobalAccess),
    GlobalSet(GlobalAccess),

    Simd(SimdOp),
}

impl Operator {
    /// Whether the node sits on the effect chain.
    pub const fn is_effectful(&self) -> bool {
        matches!(
            self,
            Operator::Control(ControlOp::Start | ControlOp::Return)
                | Operator::Call(_)
                | Operator::GlobalGet(_)
                | Operator::GlobalSet(_)
        )
    }

    /// Whether the node may serve as the effect input of another node.
    pub const fn produces_effect(&self) -> bool {
        matches!(
            self,
            Operator::Control(ControlOp::Start)
                | Operator::Call(_)
                | Operator::GlobalGet(_)
                | Operator::GlobalSet(_)
        )
    }

    pub const fn is_pure(&self) -> bool {
        !self.is_effectful() && !matches!(self, Operator::Control(_))
    }

    pub const fn is_simd(&self) -> bool {
        matches!(self, Operator::Simd(_))
    }

    /// Result type given the input types, for operators whose type is
    /// determined by the operator alone or by its operands. Parameters,
    /// projections and global loads are typed explicitly by their creator.
    pub fn result_type(&self, inputs: &[ValueType]) -> ValueType {
        match self {
            Operator::Control(ControlOp::Start | ControlOp::Return | ControlOp::End) => {
                ValueType::Control
            }
            Operator::Parameter(_) | Operator::Projection(_) | Operator::GlobalGet(_) => {
                ValueType::Top
            }
            Operator::ConstI32(_) | Operator::IntBinary(_) | Operator::IntCompare(_) => {
                ValueType::Int32
            }
            Operator::ConstF32(_) | Operator::FloatUnary(_) | Operator::FloatBinary(_) => {
                ValueType::Float32
            }
            Operator::FloatCompare(_) => ValueType::Int32,
            Operator::Convert(op) => op.result_type(),
            Operator::Select => inputs.first().copied().unwrap_or(ValueType::Top),
            Operator::Call(_) => ValueType::Tuple,
            Operator::GlobalSet(_) => ValueType::Effect,
            Operator::Simd(op) => op.result_type(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_bin_op_eval_wraps() {
        assert_eq!(IntBinOp::Add.eval(i32::MAX, 1), i32::MIN);
        assert_eq!(IntBinOp::Shl.eval(1, 33), 2);
        assert_eq!(IntBinOp::ShrS.eval(-8, 1), -4);
        assert_eq!(IntBinOp::ShrU.eval(-8, 28), 0xf);
        assert!(IntBinOp::Xor.is_commutative());
        assert!(!IntBinOp::Sub.is_commutative());
    }

    #[test]
    fn test_int_cmp_signedness() {
        assert!(IntCmpOp::LtS.eval(-1, 0));
        assert!(!IntCmpOp::LtU.eval(-1, 0));
        assert!(IntCmpOp::GeU.eval(-1, 0));
        assert!(IntCmpOp::LtU.is_unsigned());
    }

    #[test]
    fn test_float_min_max_wasm_semantics() {
        let min = FloatBinOp::Min.eval(0.0, -0.0);
        assert_eq!(min.to_bits(), (-0.0f32).to_bits());
        let max = FloatBinOp::Max.eval(-0.0, 0.0);
        assert_eq!(max.to_bits(), 0.0f32.to_bits());
        assert!(FloatBinOp::Min.eval(f32::NAN, 1.0).is_nan());
        assert_eq!(FloatBinOp::Min.eval(1.0, 5.0), 1.0);
    }

    #[test]
    fn test_float_neg_is_bitwise() {
        assert_eq!(FloatUnOp::Neg.eval(1.0), -1.0);
        let nan = f32::from_bits(0x7fc0_0001);
        assert_eq!(FloatUnOp::Neg.eval(nan).to_bits(), 0xffc0_0001);
        assert_eq!(FloatUnOp::Abs.eval(-2.5), 2.5);
    }

    #[test]
    fn test_simd_defined_combinations() {
        assert!(SimdOp::Binary(Shape::I16X8, SimdBinOp::Mul).is_defined());
        assert!(!SimdOp::Binary(Shape::I8X16, SimdBinOp::Mul).is_defined());
        assert!(!SimdOp::Unary(Shape::I32X4, SimdUnOp::Sqrt).is_defined());
        assert!(!SimdOp::Compare(Shape::I32X4, SimdCmpOp::Lt).is_defined());
        assert!(!SimdOp::Compare(Shape::F32X4, SimdCmpOp::LtS).is_defined());
        assert!(!SimdOp::AllTrue(Shape::F32X4).is_defined());
        assert!(SimdOp::AnyTrue(Shape::I8X16).is_defined());
    }

    #[test]
    fn test_simd_result_types() {
        let extract = SimdOp::ExtractLane(Shape::F32X4, 0, Extension::Signed);
        assert_eq!(extract.result_type(), ValueType::Float32);
        assert_eq!(SimdOp::AllTrue(Shape::I8X16).result_type(), ValueType::Int32);
        assert_eq!(SimdOp::Splat(Shape::I8X16).result_type(), ValueType::Simd128);
        assert_eq!(
            SimdOp::Compare(Shape::F32X4, SimdCmpOp::Eq).result_shape(),
            Some(Shape::I32X4)
        );
        assert_eq!(SimdOp::BitSelect.family(), SimdFamily::Select);
    }

    #[test]
    fn test_operator_effects() {
        assert!(Operator::Call(FuncIndex(0)).is_effectful());
        assert!(Operator::GlobalSet(GlobalAccess::new(0, 0)).produces_effect());
        assert!(!Operator::Control(ControlOp::Return).produces_effect());
        assert!(Operator::Simd(SimdOp::Not).is_pure());
        assert_eq!(
            Operator::Select.result_type(&[ValueType::Float32, ValueType::Float32]),
            ValueType::Float32
        );
    }
}
