//! Sea-of-nodes graph.
//!
//! The graph provides:
//! - **Arena-based storage**: nodes addressed by [`NodeId`], never freed
//! - **Use-def chains**: every input edge is mirrored in the def's use list
//! - **Effect chain**: calls, global accesses and the return are threaded
//!   from [`Graph::start`]; [`Graph::end`] takes the return as its only input
//!
//! Passes that rewrite a graph build a new one rather than editing in place,
//! so ids stay stable for the lifetime of a graph.

use crate::arena::{Arena, SecondaryMap};
use crate::module::FuncIndex;
use crate::node::{Node, NodeFlags, NodeId};
use crate::operators::{
    ControlOp, ConvertOp, FloatBinOp, FloatCmpOp, FloatUnOp, GlobalAccess, IntBinOp, IntCmpOp,
    Operator, SimdOp,
};
use crate::types::ValueType;

// =============================================================================
// Graph Structure
// =============================================================================

/// An IR graph for one function body.
#[derive(Clone)]
pub struct Graph {
    /// Arena for node storage.
    nodes: Arena<Node>,

    /// Use chains: for each node, which nodes use its output.
    uses: SecondaryMap<Node, Vec<NodeId>>,

    /// Entry of the effect chain.
    pub start: NodeId,

    /// Graph sink.
    pub end: NodeId,
}

impl Graph {
    /// Create a graph holding only start and end. End points at start until
    /// a return is attached with [`Graph::set_return`].
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a graph with room for `node_capacity` nodes.
    pub fn with_capacity(node_capacity: usize) -> Self {
        let mut nodes = Arena::with_capacity(node_capacity.max(2));
        let start = nodes.alloc(Node::with_type(
            Operator::Control(ControlOp::Start),
            &[],
            ValueType::Control,
        ));
        let end = nodes.alloc(Node::with_type(
            Operator::Control(ControlOp::End),
            &[start],
            ValueType::Control,
        ));

        let mut graph = Graph {
            nodes,
            uses: SecondaryMap::with_capacity(node_capacity.max(2)),
            start,
            end,
        };
        graph.add_use(start, end);
        graph
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Result type of a node; `Bottom` for ids outside the graph.
    #[inline]
    pub fn ty(&self, id: NodeId) -> ValueType {
        self.nodes.get(id).map_or(ValueType::Bottom, |n| n.ty)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph holds nothing but start and end.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        id.as_usize() < self.nodes.len()
    }

    /// The return node feeding end, if one is attached.
    pub fn return_node(&self) -> Option<NodeId> {
        self.node(self.end)
            .input(0)
            .filter(|&id| matches!(self.node(id).op, Operator::Control(ControlOp::Return)))
    }

    // =========================================================================
    // Node Creation
    // =========================================================================

    /// Add a node whose type follows from its operator and inputs.
    pub fn add_node(&mut self, op: Operator, inputs: &[NodeId]) -> NodeId {
        let input_types: smallvec::SmallVec<[ValueType; 4]> =
            inputs.iter().map(|&id| self.ty(id)).collect();
        let ty = op.result_type(&input_types);
        self.add_node_with_type(op, inputs, ty)
    }

    /// Add a node with an explicit type.
    pub fn add_node_with_type(&mut self, op: Operator, inputs: &[NodeId], ty: ValueType) -> NodeId {
        let id = self.nodes.alloc(Node::with_type(op, inputs, ty));
        for &input in inputs {
            self.add_use(input, id);
        }
        id
    }

    /// Set flags on an existing node.
    #[inline]
    pub fn add_flags(&mut self, id: NodeId, flags: NodeFlags) {
        self.nodes[id].flags.insert(flags);
    }

    // =========================================================================
    // Use-Def Chains
    // =========================================================================

    /// Nodes that have `id` as an input; a user appears once per edge.
    pub fn uses(&self, id: NodeId) -> &[NodeId] {
        self.uses.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn use_count(&self, id: NodeId) -> usize {
        self.uses.get(id).map_or(0, |v| v.len())
    }

    fn add_use(&mut self, def: NodeId, user: NodeId) {
        self.uses.resize(def.as_usize() + 1);
        if let Some(uses) = self.uses.get_mut(def) {
            uses.push(user);
        }
    }

    fn remove_use(&mut self, def: NodeId, user: NodeId) {
        if let Some(uses) = self.uses.get_mut(def) {
            if let Some(pos) = uses.iter().position(|&u| u == user) {
                uses.swap_remove(pos);
            }
        }
    }

    // =========================================================================
    // Node Modification
    // =========================================================================

    /// Replace a node's input at the given index.
    pub fn replace_input(&mut self, node: NodeId, index: usize, new_input: NodeId) {
        let Some(old) = self.nodes[node].input(index) else {
            return;
        };
        self.remove_use(old, node);
        self.nodes[node].inputs[index] = new_input;
        self.add_use(new_input, node);
    }

    /// Replace every input of a node.
    pub fn set_inputs(&mut self, node: NodeId, inputs: &[NodeId]) {
        let old = std::mem::take(&mut self.nodes[node].inputs);
        for input in old {
            self.remove_use(input, node);
        }
        self.nodes[node].inputs = inputs.iter().copied().collect();
        for &input in inputs {
            self.add_use(input, node);
        }
    }

    /// Replace all uses of `old` with `new`.
    pub fn replace_all_uses(&mut self, old: NodeId, new: NodeId) {
        let users: Vec<NodeId> = self.uses(old).to_vec();
        for user in users {
            for slot in self.nodes[user].inputs.iter_mut() {
                if *slot == old {
                    *slot = new;
                }
            }
        }
        // Each edge was recorded once per input slot, so moving the whole
        // list keeps the multiplicities.
        let moved = self
            .uses
            .get_mut(old)
            .map(std::mem::take)
            .unwrap_or_default();
        for user in moved {
            self.add_use(new, user);
        }
    }

    /// Unlink a node from its inputs and mark it dead.
    pub fn kill(&mut self, id: NodeId) {
        self.nodes[id].mark_dead();
        let inputs = std::mem::take(&mut self.nodes[id].inputs);
        for input in inputs {
            self.remove_use(input, id);
        }
    }

    /// Attach the return node as end's input.
    pub fn set_return(&mut self, ret: NodeId) {
        let end = self.end;
        self.set_inputs(end, &[ret]);
    }

    // =========================================================================
    // Scalar Constructors
    // =========================================================================

    pub fn const_i32(&mut self, value: i32) -> NodeId {
        self.add_node(Operator::ConstI32(value), &[])
    }

    /// `f32` constant; the bit pattern is kept exactly, NaN payloads included.
    pub fn const_f32(&mut self, value: f32) -> NodeId {
        self.add_node(Operator::ConstF32(value.to_bits()), &[])
    }

    pub fn int_binary(&mut self, op: IntBinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(Operator::IntBinary(op), &[lhs, rhs])
    }

    pub fn int_compare(&mut self, op: IntCmpOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(Operator::IntCompare(op), &[lhs, rhs])
    }

    pub fn float_unary(&mut self, op: FloatUnOp, value: NodeId) -> NodeId {
        self.add_node(Operator::FloatUnary(op), &[value])
    }

    pub fn float_binary(&mut self, op: FloatBinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(Operator::FloatBinary(op), &[lhs, rhs])
    }

    pub fn float_compare(&mut self, op: FloatCmpOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(Operator::FloatCompare(op), &[lhs, rhs])
    }

    pub fn convert(&mut self, op: ConvertOp, value: NodeId) -> NodeId {
        self.add_node(Operator::Convert(op), &[value])
    }

    /// `condition != 0 ? if_true : if_false`.
    pub fn select(&mut self, if_true: NodeId, if_false: NodeId, condition: NodeId) -> NodeId {
        self.add_node(Operator::Select, &[if_true, if_false, condition])
    }

    // =========================================================================
    // Structural Constructors
    // =========================================================================

    pub fn parameter(&mut self, index: u16, ty: ValueType) -> NodeId {
        let start = self.start;
        self.add_node_with_type(Operator::Parameter(index), &[start], ty)
    }

    /// Call node; `effect` is the previous link of the effect chain.
    pub fn call(&mut self, callee: FuncIndex, effect: NodeId, args: &[NodeId]) -> NodeId {
        let mut inputs = Vec::with_capacity(args.len() + 1);
        inputs.push(effect);
        inputs.extend_from_slice(args);
        self.add_node(Operator::Call(callee), &inputs)
    }

    pub fn projection(&mut self, call: NodeId, index: u16, ty: ValueType) -> NodeId {
        self.add_node_with_type(Operator::Projection(index), &[call], ty)
    }

    pub fn global_get(&mut self, access: GlobalAccess, effect: NodeId, ty: ValueType) -> NodeId {
        self.add_node_with_type(Operator::GlobalGet(access), &[effect], ty)
    }

    pub fn global_set(&mut self, access: GlobalAccess, effect: NodeId, value: NodeId) -> NodeId {
        self.add_node(Operator::GlobalSet(access), &[effect, value])
    }

    /// Return node; does not attach it to end.
    pub fn ret(&mut self, effect: NodeId, values: &[NodeId]) -> NodeId {
        let mut inputs = Vec::with_capacity(values.len() + 1);
        inputs.push(effect);
        inputs.extend_from_slice(values);
        self.add_node(Operator::Control(ControlOp::Return), &inputs)
    }

    pub fn simd(&mut self, op: SimdOp, inputs: &[NodeId]) -> NodeId {
        self.add_node(Operator::Simd(op), inputs)
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Iterate over all nodes with their IDs.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Iterate over all node IDs.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.ids()
    }

    /// Live nodes only.
    pub fn live(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().filter(|(_, n)| !n.is_dead())
    }

    /// Whether any live node is a vector operation or carries a vector.
    pub fn contains_vectors(&self) -> bool {
        self.live().any(|(_, n)| n.is_vector())
    }

    /// Number of live nodes carrying `flags`.
    pub fn count_flagged(&self, flags: NodeFlags) -> usize {
        self.live().filter(|(_, n)| n.flags.contains(flags)).count()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph ({} nodes):", self.nodes.len())?;
        for (id, node) in self.live() {
            writeln!(f, "  {:?}: {:?}", id, node)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
