//! Function builder.
//!
//! Front ends build a function body through [`FunctionBuilder`], which keeps
//! the current link of the effect chain so calls and global accesses come out
//! in program order without the caller threading effects by hand.

use crate::graph::Graph;
use crate::module::{FuncIndex, Function};
use crate::node::NodeId;
use crate::operators::{
    ConvertOp, FloatBinOp, FloatCmpOp, FloatUnOp, GlobalAccess, IntBinOp, IntCmpOp, SimdBinOp,
    SimdBitOp, SimdCmpOp, SimdConvertOp, SimdOp, SimdShiftOp, SimdUnOp,
};
use crate::shape::{Extension, Shape};
use crate::signature::Signature;
use crate::types::ValueType;
use crate::value::V128;

/// Builds one function graph.
pub struct FunctionBuilder {
    graph: Graph,
    signature: Signature,
    /// Most recent effectful node.
    effect: NodeId,
    /// Parameter nodes, created on first use.
    params: Vec<Option<NodeId>>,
}

impl FunctionBuilder {
    pub fn new(signature: Signature) -> Self {
        let graph = Graph::new();
        let effect = graph.start;
        let params = vec![None; signature.params.len()];
        FunctionBuilder {
            graph,
            signature,
            effect,
            params,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The current effect node.
    pub fn effect(&self) -> NodeId {
        self.effect
    }

    // =========================================================================
    // Parameters and Constants
    // =========================================================================

    /// Parameter node for position `index`; repeated calls return the same
    /// node. Positions beyond the signature are typed `Top` and rejected by
    /// the verifier.
    pub fn param(&mut self, index: usize) -> NodeId {
        if let Some(Some(id)) = self.params.get(index) {
            return *id;
        }
        let ty = self
            .signature
            .params
            .get(index)
            .copied()
            .unwrap_or(ValueType::Top);
        let id = self.graph.parameter(index as u16, ty);
        if let Some(slot) = self.params.get_mut(index) {
            *slot = Some(id);
        }
        id
    }

    pub fn i32_const(&mut self, value: i32) -> NodeId {
        self.graph.const_i32(value)
    }

    pub fn f32_const(&mut self, value: f32) -> NodeId {
        self.graph.const_f32(value)
    }

    pub fn v128_const(&mut self, bytes: V128) -> NodeId {
        self.graph.simd(SimdOp::Const(bytes), &[])
    }

    // =========================================================================
    // Scalar Operations
    // =========================================================================

    pub fn int_binary(&mut self, op: IntBinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.int_binary(op, lhs, rhs)
    }

    pub fn int_compare(&mut self, op: IntCmpOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.int_compare(op, lhs, rhs)
    }

    pub fn float_unary(&mut self, op: FloatUnOp, value: NodeId) -> NodeId {
        self.graph.float_unary(op, value)
    }

    pub fn float_binary(&mut self, op: FloatBinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.float_binary(op, lhs, rhs)
    }

    pub fn float_compare(&mut self, op: FloatCmpOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.float_compare(op, lhs, rhs)
    }

    pub fn convert(&mut self, op: ConvertOp, value: NodeId) -> NodeId {
        self.graph.convert(op, value)
    }

    pub fn select(&mut self, if_true: NodeId, if_false: NodeId, condition: NodeId) -> NodeId {
        self.graph.select(if_true, if_false, condition)
    }

    // =========================================================================
    // Vector Operations
    // =========================================================================

    pub fn splat(&mut self, shape: Shape, scalar: NodeId) -> NodeId {
        self.graph.simd(SimdOp::Splat(shape), &[scalar])
    }

    pub fn simd_unary(&mut self, shape: Shape, op: SimdUnOp, value: NodeId) -> NodeId {
        self.graph.simd(SimdOp::Unary(shape, op), &[value])
    }

    pub fn simd_binary(&mut self, shape: Shape, op: SimdBinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.simd(SimdOp::Binary(shape, op), &[lhs, rhs])
    }

    pub fn simd_compare(
        &mut self,
        shape: Shape,
        op: SimdCmpOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> NodeId {
        self.graph.simd(SimdOp::Compare(shape, op), &[lhs, rhs])
    }

    pub fn simd_shift(
        &mut self,
        shape: Shape,
        op: SimdShiftOp,
        value: NodeId,
        count: NodeId,
    ) -> NodeId {
        self.graph.simd(SimdOp::Shift(shape, op), &[value, count])
    }

    pub fn v128_not(&mut self, value: NodeId) -> NodeId {
        self.graph.simd(SimdOp::Not, &[value])
    }

    pub fn v128_bitwise(&mut self, op: SimdBitOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph.simd(SimdOp::Bitwise(op), &[lhs, rhs])
    }

    /// `(if_set & mask) | (if_clear & !mask)`.
    pub fn bitselect(&mut self, if_set: NodeId, if_clear: NodeId, mask: NodeId) -> NodeId {
        self.graph.simd(SimdOp::BitSelect, &[if_set, if_clear, mask])
    }

    /// Signed lane extraction (plain extraction for 32-bit lanes).
    pub fn extract_lane(&mut self, shape: Shape, lane: u8, vector: NodeId) -> NodeId {
        self.graph
            .simd(SimdOp::ExtractLane(shape, lane, Extension::Signed), &[vector])
    }

    pub fn extract_lane_u(&mut self, shape: Shape, lane: u8, vector: NodeId) -> NodeId {
        self.graph
            .simd(SimdOp::ExtractLane(shape, lane, Extension::Unsigned), &[vector])
    }

    pub fn replace_lane(&mut self, shape: Shape, lane: u8, vector: NodeId, scalar: NodeId) -> NodeId {
        self.graph
            .simd(SimdOp::ReplaceLane(shape, lane), &[vector, scalar])
    }

    pub fn simd_convert(&mut self, op: SimdConvertOp, value: NodeId) -> NodeId {
        self.graph.simd(SimdOp::Convert(op), &[value])
    }

    pub fn all_true(&mut self, shape: Shape, value: NodeId) -> NodeId {
        self.graph.simd(SimdOp::AllTrue(shape), &[value])
    }

    pub fn any_true(&mut self, shape: Shape, value: NodeId) -> NodeId {
        self.graph.simd(SimdOp::AnyTrue(shape), &[value])
    }

    // =========================================================================
    // Effects
    // =========================================================================

    /// Call `callee` and return one projection per result.
    pub fn call(&mut self, callee: FuncIndex, callee_sig: &Signature, args: &[NodeId]) -> Vec<NodeId> {
        let call = self.graph.call(callee, self.effect, args);
        self.effect = call;
        callee_sig
            .returns
            .iter()
            .enumerate()
            .map(|(i, &ty)| self.graph.projection(call, i as u16, ty))
            .collect()
    }

    pub fn global_get(&mut self, access: GlobalAccess, ty: ValueType) -> NodeId {
        let load = self.graph.global_get(access, self.effect, ty);
        self.effect = load;
        load
    }

    pub fn global_set(&mut self, access: GlobalAccess, value: NodeId) -> NodeId {
        let store = self.graph.global_set(access, self.effect, value);
        self.effect = store;
        store
    }

    /// Emit the return and hand back the finished graph.
    pub fn finish(mut self, values: &[NodeId]) -> Graph {
        let ret = self.graph.ret(self.effect, values);
        self.graph.set_return(ret);
        self.graph
    }

    /// Like [`FunctionBuilder::finish`], wrapped as a named function.
    pub fn finish_function(self, name: impl Into<String>, values: &[NodeId]) -> Function {
        let signature = self.signature.clone();
        Function::new(name, signature, self.finish(values))
    }
}
