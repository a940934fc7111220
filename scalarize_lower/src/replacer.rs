//! Per-family SIMD replacement rules.
//!
//! Every rule reads its vector operands as [`LaneSlots`] in the shape the
//! operator fixes, emits scalar nodes lane by lane, and hands back a
//! replacement. Integer results are re-canonicalised only where the scalar
//! operation can leave bits above the lane width.

use crate::constant::{materialize, preferred_shape};
use crate::driver::{FunctionLowering, Replacement};
use crate::error::{LowerError, LowerResult};
use crate::lanes::{LaneSlots, Slots};
use crate::reduction::{Reduction, reduce};
use scalarize_ir::{
    ConvertOp, Extension, FloatBinOp, FloatUnOp, IntBinOp, IntCmpOp, Node, NodeId, Shape,
    SimdBinOp, SimdBitOp, SimdCmpOp, SimdConvertOp, SimdOp, SimdShiftOp, SimdUnOp,
};
use tracing::warn;

impl FunctionLowering<'_> {
    pub(crate) fn lower_simd(
        &mut self,
        id: NodeId,
        node: &Node,
        op: SimdOp,
    ) -> LowerResult<Replacement> {
        if !op.is_defined() {
            warn!(function = %self.index, node = ?id, op = ?op, "no scalar lowering for operator");
            return Err(self.unsupported(id, node));
        }
        if let SimdOp::ExtractLane(shape, lane, _) | SimdOp::ReplaceLane(shape, lane) = op {
            if lane as usize >= shape.lanes() {
                return Err(LowerError::LaneOutOfRange {
                    function: self.index,
                    node: id,
                    lane,
                    shape,
                });
            }
        }

        let lowered = match op {
            SimdOp::Const(bytes) => {
                let shape = preferred_shape(self.source, id);
                Replacement::Lanes(materialize(&mut self.emit, &bytes, shape))
            }
            SimdOp::Splat(shape) => {
                let [value] = self.operands::<1>(id, node)?;
                let scalar = self.scalar(value)?;
                let lane = if shape.is_integer() {
                    self.emit.wrap(shape, scalar)
                } else {
                    scalar
                };
                Replacement::Lanes(LaneSlots::splat(shape, lane))
            }
            SimdOp::Unary(shape, op) => {
                let [a] = self.operands::<1>(id, node)?;
                let a = self.slots_in(a, shape)?;
                Replacement::Lanes(self.unary(shape, op, &a))
            }
            SimdOp::Binary(shape, op) => {
                let [a, b] = self.operands::<2>(id, node)?;
                let a = self.slots_in(a, shape)?;
                let b = self.slots_in(b, shape)?;
                match self.binary(shape, op, &a, &b) {
                    Some(lanes) => Replacement::Lanes(lanes),
                    None => return Err(self.unsupported(id, node)),
                }
            }
            SimdOp::Compare(shape, op) => {
                let [a, b] = self.operands::<2>(id, node)?;
                let a = self.slots_in(a, shape)?;
                let b = self.slots_in(b, shape)?;
                match self.compare(shape, op, &a, &b) {
                    Some(lanes) => Replacement::Lanes(lanes),
                    None => return Err(self.unsupported(id, node)),
                }
            }
            SimdOp::Shift(shape, op) => {
                let [a, count] = self.operands::<2>(id, node)?;
                let a = self.slots_in(a, shape)?;
                let count = self.scalar(count)?;
                Replacement::Lanes(self.shift(shape, op, &a, count))
            }
            SimdOp::Not => {
                let [a] = self.operands::<1>(id, node)?;
                let a = self.integer_view(a)?;
                let slots = a
                    .iter()
                    .map(|x| self.emit.int_imm(IntBinOp::Xor, x, -1))
                    .collect();
                Replacement::Lanes(LaneSlots::new(a.shape, slots))
            }
            SimdOp::Bitwise(op) => {
                let [a, b] = self.operands::<2>(id, node)?;
                let a = self.integer_view(a)?;
                let b = self.slots_in(b, a.shape)?;
                Replacement::Lanes(self.bitwise(op, &a, &b))
            }
            SimdOp::BitSelect => {
                let [v1, v2, mask] = self.operands::<3>(id, node)?;
                let v1 = self.integer_view(v1)?;
                let v2 = self.slots_in(v2, v1.shape)?;
                let mask = self.slots_in(mask, v1.shape)?;
                let slots = (0..v1.slots.len())
                    .map(|i| {
                        let (x, y, c) = (v1.slots[i], v2.slots[i], mask.slots[i]);
                        let taken = self.emit.int(IntBinOp::And, x, c);
                        let inverse = self.emit.int_imm(IntBinOp::Xor, c, -1);
                        let kept = self.emit.int(IntBinOp::And, y, inverse);
                        self.emit.int(IntBinOp::Or, taken, kept)
                    })
                    .collect();
                Replacement::Lanes(LaneSlots::new(v1.shape, slots))
            }
            SimdOp::ExtractLane(shape, lane, ext) => {
                let [a] = self.operands::<1>(id, node)?;
                let a = self.slots_in(a, shape)?;
                let slot = a.slots[lane as usize];
                Replacement::Scalar(match ext {
                    Extension::Unsigned => self.emit.zero_extend(shape, slot),
                    Extension::Signed => slot,
                })
            }
            SimdOp::ReplaceLane(shape, lane) => {
                let [a, value] = self.operands::<2>(id, node)?;
                let a = self.slots_in(a, shape)?;
                let scalar = self.scalar(value)?;
                let scalar = if shape.is_integer() {
                    self.emit.wrap(shape, scalar)
                } else {
                    scalar
                };
                let mut slots = a.slots.clone();
                slots[lane as usize] = scalar;
                Replacement::Lanes(LaneSlots::new(shape, slots))
            }
            SimdOp::Convert(op) => {
                let [a] = self.operands::<1>(id, node)?;
                let a = self.slots_in(a, Shape::I32X4)?;
                let convert = match op {
                    SimdConvertOp::I32x4ToF32x4S => ConvertOp::I32ToF32S,
                    SimdConvertOp::I32x4ToF32x4U => ConvertOp::I32ToF32U,
                };
                let graph = self.emit.graph_mut();
                let slots = a.iter().map(|x| graph.convert(convert, x)).collect();
                Replacement::Lanes(LaneSlots::new(Shape::F32X4, slots))
            }
            SimdOp::AllTrue(shape) | SimdOp::AnyTrue(shape) => {
                let kind = match op {
                    SimdOp::AllTrue(_) => Reduction::AllTrue,
                    _ => Reduction::AnyTrue,
                };
                let [a] = self.operands::<1>(id, node)?;
                let a = self.slots_in(a, shape)?;
                Replacement::Scalar(reduce(&mut self.emit, kind, &a))
            }
        };
        Ok(lowered)
    }

    fn unsupported(&self, id: NodeId, node: &Node) -> LowerError {
        LowerError::UnsupportedOpcode {
            function: self.index,
            node: id,
            op: node.op,
        }
    }

    /// A shape-agnostic operand, viewed as integers of its natural width.
    fn integer_view(&mut self, old: NodeId) -> LowerResult<LaneSlots> {
        let shape = self.lanes(old)?.shape.integer();
        self.slots_in(old, shape)
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    fn unary(&mut self, shape: Shape, op: SimdUnOp, a: &LaneSlots) -> LaneSlots {
        let slots = if shape.is_float() {
            let op = match op {
                SimdUnOp::Neg => FloatUnOp::Neg,
                SimdUnOp::Abs => FloatUnOp::Abs,
                SimdUnOp::Sqrt => FloatUnOp::Sqrt,
            };
            let graph = self.emit.graph_mut();
            a.iter().map(|x| graph.float_unary(op, x)).collect()
        } else {
            let zero = self.emit.imm(0);
            a.iter()
                .map(|x| {
                    let neg = self.emit.int(IntBinOp::Sub, zero, x);
                    let value = match op {
                        SimdUnOp::Abs => {
                            let negative = self.emit.graph_mut().int_compare(IntCmpOp::LtS, x, zero);
                            self.emit.graph_mut().select(neg, x, negative)
                        }
                        _ => neg,
                    };
                    self.emit.wrap(shape, value)
                })
                .collect()
        };
        LaneSlots::new(shape, slots)
    }

    fn binary(
        &mut self,
        shape: Shape,
        op: SimdBinOp,
        a: &LaneSlots,
        b: &LaneSlots,
    ) -> Option<LaneSlots> {
        let pairs = a.iter().zip(b.iter());
        let slots: Slots = if shape.is_float() {
            let op = match op {
                SimdBinOp::Add => FloatBinOp::Add,
                SimdBinOp::Sub => FloatBinOp::Sub,
                SimdBinOp::Mul => FloatBinOp::Mul,
                SimdBinOp::Div => FloatBinOp::Div,
                SimdBinOp::Min => FloatBinOp::Min,
                SimdBinOp::Max => FloatBinOp::Max,
                _ => return None,
            };
            let graph = self.emit.graph_mut();
            pairs.map(|(x, y)| graph.float_binary(op, x, y)).collect()
        } else {
            match op {
                SimdBinOp::Add | SimdBinOp::Sub | SimdBinOp::Mul => {
                    let op = match op {
                        SimdBinOp::Add => IntBinOp::Add,
                        SimdBinOp::Sub => IntBinOp::Sub,
                        _ => IntBinOp::Mul,
                    };
                    pairs
                        .map(|(x, y)| {
                            let raw = self.emit.int(op, x, y);
                            self.emit.wrap(shape, raw)
                        })
                        .collect()
                }
                SimdBinOp::MinS | SimdBinOp::MaxS | SimdBinOp::MinU | SimdBinOp::MaxU => {
                    let (cmp, unsigned) = match op {
                        SimdBinOp::MinS => (IntCmpOp::LtS, false),
                        SimdBinOp::MaxS => (IntCmpOp::GtS, false),
                        SimdBinOp::MinU => (IntCmpOp::LtU, true),
                        _ => (IntCmpOp::GtU, true),
                    };
                    pairs
                        .map(|(x, y)| {
                            let (lx, ly) = if unsigned {
                                (
                                    self.emit.zero_extend(shape, x),
                                    self.emit.zero_extend(shape, y),
                                )
                            } else {
                                (x, y)
                            };
                            let pick = self.emit.graph_mut().int_compare(cmp, lx, ly);
                            self.emit.graph_mut().select(x, y, pick)
                        })
                        .collect()
                }
                _ => return None,
            }
        };
        Some(LaneSlots::new(shape, slots))
    }

    fn compare(
        &mut self,
        shape: Shape,
        op: SimdCmpOp,
        a: &LaneSlots,
        b: &LaneSlots,
    ) -> Option<LaneSlots> {
        let pairs = a.iter().zip(b.iter());
        let slots: Slots = if shape.is_float() {
            let op = op.float_cmp()?;
            pairs
                .map(|(x, y)| {
                    let hit = self.emit.graph_mut().float_compare(op, x, y);
                    self.emit.mask_from_bool(hit)
                })
                .collect()
        } else {
            let op = op.int_cmp()?;
            pairs
                .map(|(x, y)| {
                    let (x, y) = if op.is_unsigned() {
                        (
                            self.emit.zero_extend(shape, x),
                            self.emit.zero_extend(shape, y),
                        )
                    } else {
                        (x, y)
                    };
                    let hit = self.emit.graph_mut().int_compare(op, x, y);
                    self.emit.mask_from_bool(hit)
                })
                .collect()
        };
        Some(LaneSlots::new(shape.integer(), slots))
    }

    fn shift(&mut self, shape: Shape, op: SimdShiftOp, a: &LaneSlots, count: NodeId) -> LaneSlots {
        let count = self
            .emit
            .int_imm(IntBinOp::And, count, shape.lane_bits() as i32 - 1);
        let slots = a
            .iter()
            .map(|x| match op {
                SimdShiftOp::Shl => {
                    let raw = self.emit.int(IntBinOp::Shl, x, count);
                    self.emit.wrap(shape, raw)
                }
                // Canonical slots are already sign-extended.
                SimdShiftOp::ShrS => self.emit.int(IntBinOp::ShrS, x, count),
                SimdShiftOp::ShrU => {
                    let bits = self.emit.zero_extend(shape, x);
                    let raw = self.emit.int(IntBinOp::ShrU, bits, count);
                    self.emit.wrap(shape, raw)
                }
            })
            .collect();
        LaneSlots::new(shape, slots)
    }

    fn bitwise(&mut self, op: SimdBitOp, a: &LaneSlots, b: &LaneSlots) -> LaneSlots {
        let slots = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| match op {
                SimdBitOp::And => self.emit.int(IntBinOp::And, x, y),
                SimdBitOp::Or => self.emit.int(IntBinOp::Or, x, y),
                SimdBitOp::Xor => self.emit.int(IntBinOp::Xor, x, y),
                SimdBitOp::AndNot => {
                    let inverse = self.emit.int_imm(IntBinOp::Xor, y, -1);
                    self.emit.int(IntBinOp::And, x, inverse)
                }
            })
            .collect();
        LaneSlots::new(a.shape, slots)
    }
}
