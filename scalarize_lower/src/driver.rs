//! Lowering driver.
//!
//! Lowers one function graph into a fresh scalar graph. The source graph is
//! walked once, iteratively, in post-order from its end node, so every input
//! is lowered before its users. Each source node carries a visit state:
//!
//! | State | Reached again |
//! | --- | --- |
//! | `Unvisited` | pushed, marked `InProgress` |
//! | `InProgress` | cycle: internal failure |
//! | `Lowered` | replacement cache hit |
//!
//! Value replacements and effect replacements are tracked separately: a
//! vector global load is four lane values but one effect (its last load).

use crate::config::LoweringConfig;
use crate::error::{InternalFailure, LowerError, LowerResult};
use crate::lanes::{Emitter, LaneSlots, Slots, repartition};
use crate::signature::{ExpandedSignature, SignatureTable};
use rustc_hash::FxHashMap;
use scalarize_ir::{
    ControlOp, FuncIndex, GlobalAccess, Graph, LoweringRecord, Node, NodeFlags, NodeId, Operator,
    SecondaryMap, Shape, Signature, ValueType, VectorOrigin, VerifyError,
};
use tracing::trace;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum VisitState {
    #[default]
    Unvisited,
    InProgress,
    Lowered,
}

/// What a source node became in the output graph.
#[derive(Debug, Clone, Default)]
pub(crate) enum Replacement {
    #[default]
    Missing,
    /// Control or effect-only node; no value.
    Token,
    Scalar(NodeId),
    Lanes(LaneSlots),
}

/// Counters for one lowering run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweringStats {
    /// Source nodes reached from end.
    pub nodes_visited: usize,
    /// Source nodes that were vector operations or vector-typed.
    pub vector_nodes_lowered: usize,
    /// Edges that reached an already lowered node or view.
    pub cache_hits: usize,
    /// Shape views emitted.
    pub conversions: usize,
    /// Nodes in the output graph.
    pub nodes_emitted: usize,
}

impl LoweringStats {
    pub fn merge(&mut self, other: &LoweringStats) {
        self.nodes_visited += other.nodes_visited;
        self.vector_nodes_lowered += other.vector_nodes_lowered;
        self.cache_hits += other.cache_hits;
        self.conversions += other.conversions;
        self.nodes_emitted += other.nodes_emitted;
    }
}

/// A lowered function body, ready to be installed.
#[derive(Debug, Clone)]
pub struct LoweredGraph {
    pub signature: Signature,
    pub graph: Graph,
    pub record: LoweringRecord,
    pub stats: LoweringStats,
}

// =============================================================================
// Function Lowering
// =============================================================================

/// State of one lowering run. Owned by a single call; never shared.
pub struct FunctionLowering<'a> {
    pub(crate) index: FuncIndex,
    pub(crate) source: &'a Graph,
    expanded: &'a ExpandedSignature,
    table: &'a SignatureTable,
    config: &'a LoweringConfig,
    pub(crate) emit: Emitter,
    state: SecondaryMap<Node, VisitState>,
    replacements: SecondaryMap<Node, Replacement>,
    effects: SecondaryMap<Node, NodeId>,
    /// Repartitioned views keyed by source node and shape.
    views: FxHashMap<(NodeId, Shape), LaneSlots>,
    pub(crate) stats: LoweringStats,
}

impl<'a> FunctionLowering<'a> {
    pub fn new(
        index: FuncIndex,
        source: &'a Graph,
        expanded: &'a ExpandedSignature,
        table: &'a SignatureTable,
        config: &'a LoweringConfig,
    ) -> Self {
        let len = source.len();
        FunctionLowering {
            index,
            source,
            expanded,
            table,
            config,
            emit: Emitter::new(len * 4),
            state: SecondaryMap::with_capacity(len),
            replacements: SecondaryMap::with_capacity(len),
            effects: SecondaryMap::with_capacity(len),
            views: FxHashMap::default(),
            stats: LoweringStats::default(),
        }
    }

    /// Lower the whole graph.
    pub fn run(mut self) -> LowerResult<LoweredGraph> {
        self.walk()?;
        self.check_settled()?;

        let record = self.record();
        let mut stats = self.stats.clone();
        stats.nodes_emitted = self.emit.graph().len();
        Ok(LoweredGraph {
            signature: self.expanded.lowered.clone(),
            graph: self.emit.finish(),
            record,
            stats,
        })
    }

    fn walk(&mut self) -> LowerResult<()> {
        let source = self.source;
        let end = source.end;
        let mut stack: Vec<(NodeId, usize)> = vec![(end, 0)];
        self.state.set(end, VisitState::InProgress);

        while let Some(top) = stack.last_mut() {
            let (id, next) = *top;
            top.1 += 1;
            match source.node(id).input(next) {
                Some(input) => {
                    if !source.contains(input) {
                        return Err(self.invalid(VerifyError::DanglingInput { node: id, input }));
                    }
                    match self.state[input] {
                        VisitState::Unvisited => {
                            self.state.set(input, VisitState::InProgress);
                            stack.push((input, 0));
                        }
                        VisitState::InProgress => {
                            return Err(self.internal(InternalFailure::Cycle(input)));
                        }
                        VisitState::Lowered => self.stats.cache_hits += 1,
                    }
                }
                None => {
                    stack.pop();
                    self.lower_node(id)?;
                    self.state.set(id, VisitState::Lowered);
                    self.stats.nodes_visited += 1;
                }
            }
        }
        Ok(())
    }

    fn check_settled(&self) -> LowerResult<()> {
        match self
            .state
            .iter()
            .find(|(_, state)| **state == VisitState::InProgress)
        {
            Some((id, _)) => Err(self.internal(InternalFailure::LeftInProgress(id))),
            None => Ok(()),
        }
    }

    fn record(&self) -> LoweringRecord {
        let mut record = LoweringRecord {
            original_signature: self.expanded.original.clone(),
            ..Default::default()
        };
        if self.config.record_origins {
            for (id, replacement) in self.replacements.iter() {
                if let Replacement::Lanes(lanes) = replacement {
                    record.origins.insert(
                        id,
                        VectorOrigin {
                            shape: lanes.shape(),
                            slots: lanes.slots().into(),
                        },
                    );
                }
            }
        }
        record
    }

    // =========================================================================
    // Per-Node Dispatch
    // =========================================================================

    fn lower_node(&mut self, id: NodeId) -> LowerResult<()> {
        let source = self.source;
        let node = source.node(id);
        let mark = self.emit.graph().len();

        let replacement = match node.op {
            Operator::Control(ControlOp::Start) => {
                let start = self.emit.graph().start;
                self.effects.set(id, start);
                Replacement::Token
            }
            Operator::Control(ControlOp::End) => Replacement::Token,
            Operator::Control(ControlOp::Return) => self.lower_return(id, node)?,
            Operator::Parameter(index) => self.lower_parameter(id, node, index)?,
            Operator::Call(callee) => self.lower_call(id, node, callee)?,
            Operator::Projection(index) => self.lower_projection(id, node, index)?,
            Operator::GlobalGet(access) => self.lower_global_get(id, node, access)?,
            Operator::GlobalSet(access) => self.lower_global_set(id, node, access)?,
            Operator::Select if node.ty.is_vector() => self.lower_vector_select(id, node)?,
            Operator::Simd(op) => self.lower_simd(id, node, op)?,
            _ => self.copy_scalar(node)?,
        };

        if node.is_vector() {
            self.stats.vector_nodes_lowered += 1;
            let emitted = self.flag_since(mark);
            trace!(node = ?id, op = ?node.op, emitted, "lowered vector node");
        }
        self.replacements.set(id, replacement);
        Ok(())
    }

    /// Mark nodes emitted since `mark` as vector-derived; returns how many.
    fn flag_since(&mut self, mark: usize) -> usize {
        let end = self.emit.graph().len();
        for raw in mark..end {
            self.emit
                .graph_mut()
                .add_flags(NodeId::new(raw as u32), NodeFlags::FROM_VECTOR);
        }
        end - mark
    }

    fn copy_scalar(&mut self, node: &Node) -> LowerResult<Replacement> {
        let inputs = node
            .inputs
            .iter()
            .map(|&input| self.scalar(input))
            .collect::<LowerResult<Slots>>()?;
        let new = self
            .emit
            .graph_mut()
            .add_node_with_type(node.op, &inputs, node.ty);
        Ok(Replacement::Scalar(new))
    }

    // =========================================================================
    // Signatures, Calls and Returns
    // =========================================================================

    fn lower_parameter(&mut self, id: NodeId, node: &Node, index: u16) -> LowerResult<Replacement> {
        let range = self
            .expanded
            .params
            .get(index as usize)
            .copied()
            .ok_or_else(|| self.invalid(VerifyError::ParameterIndex { node: id, index }))?;
        let graph = self.emit.graph_mut();
        if node.ty.is_vector() {
            let abi = self.table.abi();
            let slots = range
                .range()
                .map(|slot| graph.parameter(slot as u16, abi.slot_type()))
                .collect();
            Ok(Replacement::Lanes(LaneSlots::new(abi, slots)))
        } else {
            Ok(Replacement::Scalar(
                graph.parameter(range.start as u16, node.ty),
            ))
        }
    }

    /// Scalar values for a list of source operands, vectors spliced in ABI
    /// lane order.
    fn abi_values(&mut self, operands: &[NodeId]) -> LowerResult<Vec<NodeId>> {
        let abi = self.table.abi();
        let mut values = Vec::with_capacity(operands.len() * abi.lanes());
        for &operand in operands {
            if self.source.ty(operand).is_vector() {
                values.extend(self.slots_in(operand, abi)?.iter());
            } else {
                values.push(self.scalar(operand)?);
            }
        }
        Ok(values)
    }

    fn lower_call(
        &mut self,
        id: NodeId,
        node: &Node,
        callee: FuncIndex,
    ) -> LowerResult<Replacement> {
        let table = self.table;
        let expected = table
            .get(callee)
            .ok_or_else(|| self.invalid(VerifyError::UnknownCallee { node: id, callee }))?
            .original
            .params
            .len();
        let args = node.value_inputs();
        if args.len() != expected {
            return Err(self.internal(InternalFailure::StaleCallArity {
                node: id,
                expected,
                found: args.len(),
            }));
        }

        let values = self.abi_values(args)?;
        let effect = self.effect(id, node.input(0))?;
        let call = self.emit.graph_mut().call(callee, effect, &values);
        self.effects.set(id, call);
        Ok(Replacement::Scalar(call))
    }

    fn lower_projection(&mut self, id: NodeId, node: &Node, index: u16) -> LowerResult<Replacement> {
        let source = self.source;
        let bad = || VerifyError::Projection { node: id, index };
        let call = node.input(0).ok_or_else(|| self.invalid(bad()))?;
        let Operator::Call(callee) = source.node(call).op else {
            return Err(self.invalid(bad()));
        };
        let range = self
            .table
            .get(callee)
            .and_then(|sig| sig.returns.get(index as usize).copied())
            .ok_or_else(|| self.invalid(bad()))?;

        let new_call = self.scalar(call)?;
        let graph = self.emit.graph_mut();
        if node.ty.is_vector() {
            let abi = self.table.abi();
            let slots = range
                .range()
                .map(|slot| graph.projection(new_call, slot as u16, abi.slot_type()))
                .collect();
            Ok(Replacement::Lanes(LaneSlots::new(abi, slots)))
        } else {
            Ok(Replacement::Scalar(graph.projection(
                new_call,
                range.start as u16,
                node.ty,
            )))
        }
    }

    fn lower_return(&mut self, id: NodeId, node: &Node) -> LowerResult<Replacement> {
        let values = self.abi_values(node.value_inputs())?;
        let effect = self.effect(id, node.input(0))?;
        let graph = self.emit.graph_mut();
        let ret = graph.ret(effect, &values);
        graph.set_return(ret);
        Ok(Replacement::Token)
    }

    // =========================================================================
    // Globals
    // =========================================================================

    /// The four word-sized accesses covering a vector at `access`.
    fn word_accesses(&self, id: NodeId, access: GlobalAccess) -> LowerResult<[GlobalAccess; 4]> {
        let mut words = [access; 4];
        for (k, word) in words.iter_mut().enumerate() {
            word.offset = access.offset.checked_add(4 * k as u8).ok_or_else(|| {
                self.invalid(VerifyError::GlobalOutOfBounds {
                    node: id,
                    global: access.global,
                    offset: access.offset,
                })
            })?;
        }
        Ok(words)
    }

    fn lower_global_get(
        &mut self,
        id: NodeId,
        node: &Node,
        access: GlobalAccess,
    ) -> LowerResult<Replacement> {
        let mut effect = self.effect(id, node.input(0))?;
        if !node.ty.is_vector() {
            let load = self.emit.graph_mut().global_get(access, effect, node.ty);
            self.effects.set(id, load);
            return Ok(Replacement::Scalar(load));
        }

        let words = self.word_accesses(id, access)?;
        let graph = self.emit.graph_mut();
        let mut slots = Slots::new();
        for word in words {
            effect = graph.global_get(word, effect, ValueType::Int32);
            slots.push(effect);
        }
        self.effects.set(id, effect);
        Ok(Replacement::Lanes(LaneSlots::new(Shape::I32X4, slots)))
    }

    fn lower_global_set(
        &mut self,
        id: NodeId,
        node: &Node,
        access: GlobalAccess,
    ) -> LowerResult<Replacement> {
        let value = node
            .input(1)
            .ok_or_else(|| self.invalid(VerifyError::Arity {
                node: id,
                expected: 2,
                found: node.inputs.len(),
            }))?;
        let mut effect = self.effect(id, node.input(0))?;

        if !self.source.ty(value).is_vector() {
            let scalar = self.scalar(value)?;
            let store = self.emit.graph_mut().global_set(access, effect, scalar);
            self.effects.set(id, store);
            return Ok(Replacement::Token);
        }

        // Float lanes are stored as they are; everything else as words.
        let shape = match self.lanes(value)?.shape() {
            Shape::F32X4 => Shape::F32X4,
            _ => Shape::I32X4,
        };
        let lanes = self.slots_in(value, shape)?;
        let words = self.word_accesses(id, access)?;
        let graph = self.emit.graph_mut();
        for (word, slot) in words.into_iter().zip(lanes.iter()) {
            effect = graph.global_set(word, effect, slot);
        }
        self.effects.set(id, effect);
        Ok(Replacement::Token)
    }

    // =========================================================================
    // Vector Select
    // =========================================================================

    fn lower_vector_select(&mut self, id: NodeId, node: &Node) -> LowerResult<Replacement> {
        let [if_true, if_false, condition] = self.operands::<3>(id, node)?;
        let a = self.lanes(if_true)?;
        let b = self.slots_in(if_false, a.shape)?;
        let cond = self.scalar(condition)?;
        let graph = self.emit.graph_mut();
        let slots = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| graph.select(x, y, cond))
            .collect();
        Ok(Replacement::Lanes(LaneSlots::new(a.shape, slots)))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Exactly `N` inputs of a source node.
    pub(crate) fn operands<const N: usize>(
        &self,
        id: NodeId,
        node: &Node,
    ) -> LowerResult<[NodeId; N]> {
        <[NodeId; N]>::try_from(node.inputs.as_slice()).map_err(|_| {
            self.invalid(VerifyError::Arity {
                node: id,
                expected: N,
                found: node.inputs.len(),
            })
        })
    }

    /// Replacement of a scalar-valued source node.
    pub(crate) fn scalar(&self, old: NodeId) -> LowerResult<NodeId> {
        match self.replacements.get(old) {
            Some(Replacement::Scalar(new)) => Ok(*new),
            _ => Err(self.internal(InternalFailure::CacheMiss(old))),
        }
    }

    /// Replacement of a vector-valued source node, in the shape it was
    /// lowered in.
    pub(crate) fn lanes(&self, old: NodeId) -> LowerResult<LaneSlots> {
        match self.replacements.get(old) {
            Some(Replacement::Lanes(lanes)) => Ok(lanes.clone()),
            _ => Err(self.internal(InternalFailure::CacheMiss(old))),
        }
    }

    /// Replacement of a vector-valued source node viewed in `shape`. Each
    /// view is emitted at most once per source node.
    pub(crate) fn slots_in(&mut self, old: NodeId, shape: Shape) -> LowerResult<LaneSlots> {
        let natural = self.lanes(old)?;
        if natural.shape() == shape {
            return Ok(natural);
        }
        if let Some(view) = self.views.get(&(old, shape)) {
            self.stats.cache_hits += 1;
            return Ok(view.clone());
        }

        let mark = self.emit.graph().len();
        let view = repartition(&mut self.emit, &natural, shape);
        self.flag_since(mark);
        self.stats.conversions += 1;
        trace!(node = ?old, from = %natural.shape(), to = %shape, "repartitioned vector");
        self.views.insert((old, shape), view.clone());
        Ok(view)
    }

    fn effect(&self, id: NodeId, old: Option<NodeId>) -> LowerResult<NodeId> {
        let old = old.ok_or_else(|| self.invalid(VerifyError::EffectInput { node: id }))?;
        match self.effects.get(old) {
            Some(&new) if new.is_valid() => Ok(new),
            _ => Err(self.internal(InternalFailure::CacheMiss(old))),
        }
    }

    pub(crate) fn internal(&self, failure: InternalFailure) -> LowerError {
        LowerError::Internal {
            function: self.index,
            failure,
        }
    }

    pub(crate) fn invalid(&self, source: VerifyError) -> LowerError {
        LowerError::InvalidInput {
            function: self.index,
            source,
        }
    }
}
