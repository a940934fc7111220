//! Lane slots and shape repartitioning.
//!
//! A lowered vector is a [`LaneSlots`]: one scalar node per lane, lane 0
//! first. Integer slots hold the lane in canonical form (truncated to the
//! lane width, then sign-extended to 32 bits); float slots hold the `f32`.
//!
//! The same 128 bits can be viewed in another shape. Same-width views differ
//! only in lane kind and are bitcasts. Every other view goes through the four
//! little-endian 32-bit words of the vector:
//!
//! ```text
//! i16x8 pack:   word k = (lane[2k] & 0xffff) | (lane[2k+1] << 16)
//! i8x16 pack:   word k = OR_j (lane[4k+j] & 0xff) << 8j
//! i16x8 unpack: lane 2k = (w << 16) >>s 16, lane 2k+1 = w >>s 16
//! i8x16 unpack: lane 4k+j = (w << (24 - 8j)) >>s 24
//! ```

use rustc_hash::FxHashMap;
use scalarize_ir::{ConvertOp, Graph, IntBinOp, NodeId, Shape};
use smallvec::SmallVec;

/// Scalar nodes of one vector, by lane.
pub type Slots = SmallVec<[NodeId; 16]>;

/// A vector value after lowering. Always holds exactly `shape.lanes()` slots;
/// only the lowering builds one from a slot list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneSlots {
    pub(crate) shape: Shape,
    pub(crate) slots: Slots,
}

impl LaneSlots {
    pub(crate) fn new(shape: Shape, slots: Slots) -> Self {
        debug_assert_eq!(slots.len(), shape.lanes());
        LaneSlots { shape, slots }
    }

    /// Every lane holds the same node.
    pub fn splat(shape: Shape, node: NodeId) -> Self {
        LaneSlots {
            shape,
            slots: SmallVec::from_elem(node, shape.lanes()),
        }
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn slots(&self) -> &[NodeId] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().copied()
    }
}

// =============================================================================
// Emitter
// =============================================================================

/// Output graph plus helpers for the scalar idioms lowering relies on.
pub struct Emitter {
    graph: Graph,
    /// Shift amounts and masks, shared across the graph.
    ints: FxHashMap<i32, NodeId>,
}

impl Emitter {
    pub fn new(capacity: usize) -> Self {
        Emitter {
            graph: Graph::with_capacity(capacity),
            ints: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn finish(self) -> Graph {
        self.graph
    }

    /// Shared `i32` constant.
    pub fn imm(&mut self, value: i32) -> NodeId {
        if let Some(&id) = self.ints.get(&value) {
            return id;
        }
        let id = self.graph.const_i32(value);
        self.ints.insert(value, id);
        id
    }

    #[inline]
    pub fn int(&mut self, op: IntBinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.int_binary(op, lhs, rhs)
    }

    pub fn int_imm(&mut self, op: IntBinOp, lhs: NodeId, imm: i32) -> NodeId {
        let rhs = self.imm(imm);
        self.graph.int_binary(op, lhs, rhs)
    }

    /// Canonicalise a 32-bit result to the lane width of `shape`.
    pub fn wrap(&mut self, shape: Shape, value: NodeId) -> NodeId {
        if !shape.is_narrow() {
            return value;
        }
        let shift = (32 - shape.lane_bits()) as i32;
        let high = self.int_imm(IntBinOp::Shl, value, shift);
        self.int_imm(IntBinOp::ShrS, high, shift)
    }

    /// Zero-extend a canonical lane of `shape`.
    pub fn zero_extend(&mut self, shape: Shape, value: NodeId) -> NodeId {
        if !shape.is_narrow() {
            return value;
        }
        self.int_imm(IntBinOp::And, value, shape.lane_mask() as i32)
    }

    /// Turn a 0/1 comparison into a 0/-1 lane mask.
    pub fn mask_from_bool(&mut self, cmp: NodeId) -> NodeId {
        let zero = self.imm(0);
        self.int(IntBinOp::Sub, zero, cmp)
    }
}

// =============================================================================
// Repartitioning
// =============================================================================

/// View `from` in shape `to`.
pub fn repartition(emit: &mut Emitter, from: &LaneSlots, to: Shape) -> LaneSlots {
    if from.shape == to {
        return from.clone();
    }
    if from.shape.lane_bits() == to.lane_bits() {
        let op = if to.is_float() {
            ConvertOp::BitcastI32ToF32
        } else {
            ConvertOp::BitcastF32ToI32
        };
        let slots = from
            .iter()
            .map(|s| emit.graph_mut().convert(op, s))
            .collect();
        return LaneSlots::new(to, slots);
    }
    let words = to_words(emit, from);
    from_words(emit, &words, to)
}

/// Pack a vector into its four 32-bit words.
fn to_words(emit: &mut Emitter, from: &LaneSlots) -> [NodeId; 4] {
    let shape = from.shape;
    if !shape.is_narrow() {
        let mut words = [NodeId::INVALID; 4];
        for (word, slot) in words.iter_mut().zip(from.iter()) {
            *word = if shape.is_float() {
                emit.graph_mut().convert(ConvertOp::BitcastF32ToI32, slot)
            } else {
                slot
            };
        }
        return words;
    }

    let bits = shape.lane_bits() as i32;
    let per_word = shape.lanes_per_word();
    let mask = shape.lane_mask() as i32;
    let mut words = [NodeId::INVALID; 4];
    for (k, word) in words.iter_mut().enumerate() {
        let mut acc: Option<NodeId> = None;
        for j in 0..per_word {
            let lane = from.slots[k * per_word + j];
            let part = if j == per_word - 1 {
                // The top lane's high bits fall off the shift.
                emit.int_imm(IntBinOp::Shl, lane, bits * j as i32)
            } else {
                let low = emit.int_imm(IntBinOp::And, lane, mask);
                if j == 0 {
                    low
                } else {
                    emit.int_imm(IntBinOp::Shl, low, bits * j as i32)
                }
            };
            acc = Some(match acc {
                Some(prev) => emit.int(IntBinOp::Or, prev, part),
                None => part,
            });
        }
        *word = acc.unwrap_or(NodeId::INVALID);
    }
    words
}

/// Split four 32-bit words into lanes of `to`.
fn from_words(emit: &mut Emitter, words: &[NodeId; 4], to: Shape) -> LaneSlots {
    if !to.is_narrow() {
        let slots = words
            .iter()
            .map(|&w| {
                if to.is_float() {
                    emit.graph_mut().convert(ConvertOp::BitcastI32ToF32, w)
                } else {
                    w
                }
            })
            .collect();
        return LaneSlots::new(to, slots);
    }

    let bits = to.lane_bits() as i32;
    let per_word = to.lanes_per_word();
    let mut slots = Slots::with_capacity(to.lanes());
    for &word in words {
        for j in 0..per_word {
            let left = 32 - bits * (j as i32 + 1);
            let high = if left == 0 {
                word
            } else {
                emit.int_imm(IntBinOp::Shl, word, left)
            };
            slots.push(emit.int_imm(IntBinOp::ShrS, high, 32 - bits));
        }
    }
    LaneSlots::new(to, slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalarize_ir::{Operator, ValueType};

    fn params(emit: &mut Emitter, shape: Shape) -> LaneSlots {
        let slots = (0..shape.lanes())
            .map(|i| emit.graph_mut().parameter(i as u16, shape.slot_type()))
            .collect();
        LaneSlots::new(shape, slots)
    }

    #[test]
    fn test_same_shape_is_free() {
        let mut emit = Emitter::new(16);
        let v = params(&mut emit, Shape::I16X8);
        let before = emit.graph().len();
        assert_eq!(repartition(&mut emit, &v, Shape::I16X8), v);
        assert_eq!(emit.graph().len(), before);
    }

    #[test]
    fn test_float_int_bitcast() {
        let mut emit = Emitter::new(16);
        let v = params(&mut emit, Shape::F32X4);
        let ints = repartition(&mut emit, &v, Shape::I32X4);
        assert_eq!(ints.slots.len(), 4);
        for slot in ints.iter() {
            let node = emit.graph().node(slot);
            assert_eq!(node.op, Operator::Convert(ConvertOp::BitcastF32ToI32));
            assert_eq!(node.ty, ValueType::Int32);
        }
    }

    #[test]
    fn test_narrow_views_have_lane_counts() {
        let mut emit = Emitter::new(64);
        let v = params(&mut emit, Shape::I8X16);
        let halves = repartition(&mut emit, &v, Shape::I16X8);
        assert_eq!(halves.slots.len(), 8);
        let floats = repartition(&mut emit, &halves, Shape::F32X4);
        assert_eq!(floats.slots.len(), 4);
        assert_eq!(emit.graph().ty(floats.slots[0]), ValueType::Float32);
    }

    #[test]
    fn test_every_view_covers_every_lane() {
        let mut emit = Emitter::new(256);
        for from in Shape::ALL {
            let v = params(&mut emit, from);
            for to in Shape::ALL {
                let view = repartition(&mut emit, &v, to);
                assert_eq!(view.shape(), to);
                assert_eq!(view.slots().len(), to.lanes(), "{from} -> {to}");
                assert!(view.iter().all(|slot| emit.graph().ty(slot) == to.slot_type()));
            }
            let splat = LaneSlots::splat(from, v.slots()[0]);
            assert_eq!(splat.slots().len(), from.lanes());
        }
    }

    #[test]
    fn test_wrap_is_identity_for_words() {
        let mut emit = Emitter::new(8);
        let p = emit.graph_mut().parameter(0, ValueType::Int32);
        assert_eq!(emit.wrap(Shape::I32X4, p), p);
        assert_ne!(emit.wrap(Shape::I8X16, p), p);
        assert_eq!(emit.zero_extend(Shape::F32X4, p), p);
    }

    #[test]
    fn test_immediates_are_shared() {
        let mut emit = Emitter::new(8);
        assert_eq!(emit.imm(24), emit.imm(24));
        assert_ne!(emit.imm(24), emit.imm(16));
    }
}
