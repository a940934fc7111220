//! IR node definitions.
//!
//! Each node has:
//! - **Operator**: what the node computes
//! - **Inputs**: effect and value dependencies (use-def edges)
//! - **Type**: declared or inferred result type
//! - **Flags**: bookkeeping bits set by passes
//!
//! Effectful nodes take the previous effect node as input 0; see
//! [`crate::operators`] for the per-operator input layout.

use crate::arena::Id;
use crate::operators::{ControlOp, Operator, SimdOp};
use crate::types::ValueType;
use smallvec::SmallVec;

// =============================================================================
// Node ID Type Alias
// =============================================================================

/// Unique identifier for a node in the graph.
pub type NodeId = Id<Node>;

/// Input list; most nodes have at most four inputs and stay inline.
pub type InputList = SmallVec<[NodeId; 4]>;

// =============================================================================
// Node
// =============================================================================

/// A node in the IR graph.
#[derive(Clone)]
pub struct Node {
    /// The operation this node performs.
    pub op: Operator,

    /// Input nodes (dependencies).
    pub inputs: InputList,

    /// Result type.
    pub ty: ValueType,

    pub flags: NodeFlags,
}

impl Node {
    /// Create a node with an explicit type.
    pub fn with_type(op: Operator, inputs: &[NodeId], ty: ValueType) -> Self {
        Node {
            op,
            inputs: InputList::from_slice(inputs),
            ty,
            flags: NodeFlags::empty(),
        }
    }

    /// Input at `index`, if present.
    #[inline]
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied()
    }

    /// The effect input of an effectful node.
    #[inline]
    pub fn effect_input(&self) -> Option<NodeId> {
        if self.op.is_effectful() && !matches!(self.op, Operator::Control(ControlOp::Start)) {
            self.input(0)
        } else {
            None
        }
    }

    /// Value operands, skipping the effect input of effectful nodes and the
    /// structural input of parameters and projections.
    pub fn value_inputs(&self) -> &[NodeId] {
        match self.op {
            Operator::Call(_)
            | Operator::GlobalGet(_)
            | Operator::GlobalSet(_)
            | Operator::Control(ControlOp::Return) => self.inputs.get(1..).unwrap_or(&[]),
            Operator::Parameter(_)
            | Operator::Projection(_)
            | Operator::Control(ControlOp::Start | ControlOp::End) => &[],
            _ => self.inputs.as_slice(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.op,
            Operator::ConstI32(_) | Operator::ConstF32(_) | Operator::Simd(SimdOp::Const(_))
        )
    }

    /// Whether the node belongs to the vector world: a SIMD operator or any
    /// node carrying an `s128` value.
    pub fn is_vector(&self) -> bool {
        self.op.is_simd() || self.ty.is_vector()
    }

    pub fn is_dead(&self) -> bool {
        self.flags.contains(NodeFlags::DEAD)
    }

    pub fn mark_dead(&mut self) {
        self.flags.insert(NodeFlags::DEAD);
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.op {
            Operator::ConstI32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.op {
            Operator::ConstF32(bits) => Some(f32::from_bits(bits)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.op)?;
        if !self.inputs.is_empty() {
            write!(f, " {:?}", self.inputs.as_slice())?;
        }
        write!(f, " : {:?}", self.ty)?;
        if !self.flags.is_empty() {
            write!(f, " {:?}", self.flags)?;
        }
        Ok(())
    }
}

// =============================================================================
// Node Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for node properties.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Node has been unlinked from the graph.
        const DEAD = 0b0000_0001;
        /// Node was emitted while lowering a vector node.
        const FROM_VECTOR = 0b0000_0010;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::{GlobalAccess, IntBinOp};

    #[test]
    fn test_value_inputs_skip_effect() {
        let effect = NodeId::new(0);
        let value = NodeId::new(3);
        let store = Node::with_type(
            Operator::GlobalSet(GlobalAccess::new(0, 0)),
            &[effect, value],
            ValueType::Effect,
        );
        assert_eq!(store.effect_input(), Some(effect));
        assert_eq!(store.value_inputs(), &[value]);

        let add = Node::with_type(
            Operator::IntBinary(IntBinOp::Add),
            &[NodeId::new(1), NodeId::new(2)],
            ValueType::Int32,
        );
        assert_eq!(add.effect_input(), None);
        assert_eq!(add.value_inputs().len(), 2);
    }

    #[test]
    fn test_constants() {
        let c = Node::with_type(Operator::ConstF32(1.5f32.to_bits()), &[], ValueType::Float32);
        assert!(c.is_constant());
        assert_eq!(c.as_f32(), Some(1.5));
        assert_eq!(c.as_i32(), None);
    }

    #[test]
    fn test_node_flags() {
        let mut node = Node::with_type(Operator::ConstI32(0), &[], ValueType::Int32);
        assert!(!node.is_dead());
        node.flags.insert(NodeFlags::FROM_VECTOR);
        node.mark_dead();
        assert!(node.is_dead());
        assert!(node.flags.contains(NodeFlags::FROM_VECTOR));
    }
}
