//! Graph verifier.
//!
//! Checks the invariants every pass may rely on and must preserve:
//! - inputs exist and are live, and use lists mirror input edges
//! - operand and result types agree with the operator
//! - the effect chain is a single path from start to the return
//! - calls match their callee's signature, globals are accessed in bounds
//! - the graph is acyclic
//!
//! [`Verifier::scalar_only`] additionally rejects anything vector-typed, for
//! checking the output of vector lowering.

use crate::arena::SecondaryMap;
use crate::graph::Graph;
use crate::module::{FuncIndex, Global};
use crate::node::{Node, NodeId};
use crate::operators::{ControlOp, Operator, SimdOp};
use crate::signature::Signature;
use crate::types::ValueType;
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};

/// An invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("node {node:?} reads missing or dead input {input:?}")]
    DanglingInput { node: NodeId, input: NodeId },

    #[error("use list of {def:?} disagrees with the inputs of its users")]
    UseDefMismatch { def: NodeId },

    #[error("node {node:?} expects {expected} inputs, found {found}")]
    Arity {
        node: NodeId,
        expected: usize,
        found: usize,
    },

    #[error("input {index} of node {node:?} is {found}, expected {expected}")]
    OperandType {
        node: NodeId,
        index: usize,
        expected: ValueType,
        found: ValueType,
    },

    #[error("node {node:?} is typed {found}, expected {expected}")]
    ResultType {
        node: NodeId,
        expected: ValueType,
        found: ValueType,
    },

    #[error("input 0 of node {node:?} is not an effect")]
    EffectInput { node: NodeId },

    #[error("effect {node:?} feeds more than one effectful node")]
    EffectFork { node: NodeId },

    #[error("end must take a single return node")]
    MalformedEnd,

    #[error("parameter {index} at {node:?} is outside the signature")]
    ParameterIndex { node: NodeId, index: u16 },

    #[error("node {node:?} calls unknown function {callee}")]
    UnknownCallee { node: NodeId, callee: FuncIndex },

    #[error("projection {node:?} does not read result {index} of a call")]
    Projection { node: NodeId, index: u16 },

    #[error("node {node:?} accesses global {global} at offset {offset} out of bounds")]
    GlobalOutOfBounds { node: NodeId, global: u32, offset: u8 },

    #[error("cycle through node {node:?}")]
    Cycle { node: NodeId },

    #[error("vector node {node:?} remains")]
    VectorRemains { node: NodeId },

    #[error("signature {0} still carries vectors")]
    VectorSignature(Signature),

    #[error("in {function}: {source}")]
    InFunction {
        function: FuncIndex,
        source: Box<VerifyError>,
    },
}

impl VerifyError {
    /// Attach the function the error was found in.
    pub fn in_function(self, function: FuncIndex) -> VerifyError {
        VerifyError::InFunction {
            function,
            source: Box::new(self),
        }
    }
}

type Types = SmallVec<[ValueType; 4]>;

/// Checks graphs against one module's globals and callee signatures.
pub struct Verifier<'a> {
    globals: &'a [Global],
    callees: &'a [Signature],
    scalar_only: bool,
}

impl<'a> Verifier<'a> {
    /// `callees[i]` is the signature call sites must use for function `i`.
    pub fn new(globals: &'a [Global], callees: &'a [Signature]) -> Self {
        Verifier {
            globals,
            callees,
            scalar_only: false,
        }
    }

    /// Also reject vector-typed nodes and signatures.
    pub fn scalar_only(mut self) -> Self {
        self.scalar_only = true;
        self
    }

    pub fn verify(&self, signature: &Signature, graph: &Graph) -> Result<(), VerifyError> {
        if self.scalar_only && signature.has_vectors() {
            return Err(VerifyError::VectorSignature(signature.clone()));
        }
        self.check_edges(graph)?;
        self.check_end(graph)?;
        for (id, node) in graph.live() {
            if self.scalar_only && node.is_vector() {
                return Err(VerifyError::VectorRemains { node: id });
            }
            self.check_node(signature, graph, id, node)?;
        }
        self.check_effect_forks(graph)?;
        check_acyclic(graph)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    fn check_edges(&self, graph: &Graph) -> Result<(), VerifyError> {
        let mut edges: FxHashMap<(NodeId, NodeId), i32> = FxHashMap::default();
        for (id, node) in graph.live() {
            for &input in &node.inputs {
                let live = graph.get(input).is_some_and(|n| !n.is_dead());
                if !live {
                    return Err(VerifyError::DanglingInput { node: id, input });
                }
                *edges.entry((input, id)).or_default() += 1;
            }
        }
        for (def, _) in graph.live() {
            for &user in graph.uses(def) {
                *edges.entry((def, user)).or_default() -= 1;
            }
        }
        match edges.into_iter().find(|&(_, count)| count != 0) {
            Some(((def, _), _)) => Err(VerifyError::UseDefMismatch { def }),
            None => Ok(()),
        }
    }

    fn check_end(&self, graph: &Graph) -> Result<(), VerifyError> {
        let end = graph.node(graph.end);
        if end.inputs.len() != 1 || graph.return_node().is_none() {
            return Err(VerifyError::MalformedEnd);
        }
        Ok(())
    }

    fn check_effect_forks(&self, graph: &Graph) -> Result<(), VerifyError> {
        let mut seen: SecondaryMap<Node, bool> = SecondaryMap::with_capacity(graph.len());
        for (_, node) in graph.live() {
            if let Some(effect) = node.effect_input() {
                if seen[effect] {
                    return Err(VerifyError::EffectFork { node: effect });
                }
                seen.set(effect, true);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Per-Node Checks
    // =========================================================================

    fn check_node(
        &self,
        signature: &Signature,
        graph: &Graph,
        id: NodeId,
        node: &Node,
    ) -> Result<(), VerifyError> {
        let effect_ok = |index: usize| -> Result<(), VerifyError> {
            match node.input(index) {
                Some(e) if graph.node(e).op.produces_effect() => Ok(()),
                _ => Err(VerifyError::EffectInput { node: id }),
            }
        };

        match node.op {
            Operator::Control(ControlOp::Start) => {
                if id != graph.start || !node.inputs.is_empty() {
                    return Err(VerifyError::Arity {
                        node: id,
                        expected: 0,
                        found: node.inputs.len(),
                    });
                }
                Ok(())
            }
            Operator::Control(ControlOp::End) => Ok(()),
            Operator::Control(ControlOp::Return) => {
                effect_ok(0)?;
                check_operands(graph, id, node.value_inputs(), &signature.returns)
            }
            Operator::Parameter(index) => {
                if node.inputs.as_slice() != [graph.start] {
                    return Err(VerifyError::Arity {
                        node: id,
                        expected: 1,
                        found: node.inputs.len(),
                    });
                }
                let expected = signature
                    .params
                    .get(index as usize)
                    .copied()
                    .ok_or(VerifyError::ParameterIndex { node: id, index })?;
                check_result(id, node, expected)
            }
            Operator::Call(callee) => {
                effect_ok(0)?;
                let sig = self.callee(id, callee)?;
                check_operands(graph, id, node.value_inputs(), &sig.params)?;
                check_result(id, node, ValueType::Tuple)
            }
            Operator::Projection(index) => {
                let call = node
                    .input(0)
                    .filter(|_| node.inputs.len() == 1)
                    .ok_or(VerifyError::Projection { node: id, index })?;
                let Operator::Call(callee) = graph.node(call).op else {
                    return Err(VerifyError::Projection { node: id, index });
                };
                let expected = self
                    .callee(call, callee)?
                    .returns
                    .get(index as usize)
                    .copied()
                    .ok_or(VerifyError::Projection { node: id, index })?;
                check_result(id, node, expected)
            }
            Operator::GlobalGet(access) => {
                effect_ok(0)?;
                if node.inputs.len() != 1 {
                    return Err(VerifyError::Arity {
                        node: id,
                        expected: 1,
                        found: node.inputs.len(),
                    });
                }
                self.check_global(id, access.global, access.offset, node.ty)
            }
            Operator::GlobalSet(access) => {
                effect_ok(0)?;
                if node.inputs.len() != 2 {
                    return Err(VerifyError::Arity {
                        node: id,
                        expected: 2,
                        found: node.inputs.len(),
                    });
                }
                let value_ty = graph.ty(node.inputs[1]);
                self.check_global(id, access.global, access.offset, value_ty)?;
                check_result(id, node, ValueType::Effect)
            }
            Operator::Select => {
                let ty = node.input(0).map_or(ValueType::Top, |i| graph.ty(i));
                if !(ty.is_scalar() || ty.is_vector()) {
                    return Err(VerifyError::OperandType {
                        node: id,
                        index: 0,
                        expected: ValueType::Int32,
                        found: ty,
                    });
                }
                check_operands(graph, id, &node.inputs, &[ty, ty, ValueType::Int32])?;
                check_result(id, node, ty)
            }
            ref op => {
                let expected = pure_operand_types(op);
                check_operands(graph, id, &node.inputs, &expected)?;
                let input_types: Types = node.inputs.iter().map(|&i| graph.ty(i)).collect();
                check_result(id, node, op.result_type(&input_types))
            }
        }
    }

    fn callee(&self, node: NodeId, callee: FuncIndex) -> Result<&'a Signature, VerifyError> {
        self.callees
            .get(callee.as_usize())
            .ok_or(VerifyError::UnknownCallee { node, callee })
    }

    fn check_global(
        &self,
        node: NodeId,
        global: u32,
        offset: u8,
        ty: ValueType,
    ) -> Result<(), VerifyError> {
        let in_bounds = match (self.globals.get(global as usize), ty.size_bytes()) {
            (Some(g), Some(size)) => offset as usize + size <= g.size(),
            _ => false,
        };
        if in_bounds {
            Ok(())
        } else {
            Err(VerifyError::GlobalOutOfBounds {
                node,
                global,
                offset,
            })
        }
    }
}

/// Operand types of operators whose inputs are all values.
fn pure_operand_types(op: &Operator) -> Types {
    use ValueType::{Float32 as F, Int32 as I, Simd128 as S};
    match op {
        Operator::ConstI32(_) | Operator::ConstF32(_) => Types::new(),
        Operator::IntBinary(_) | Operator::IntCompare(_) => smallvec![I, I],
        Operator::FloatUnary(_) => smallvec![F],
        Operator::FloatBinary(_) | Operator::FloatCompare(_) => smallvec![F, F],
        Operator::Convert(c) => smallvec![c.input_type()],
        Operator::Simd(simd) => match simd {
            SimdOp::Const(_) => Types::new(),
            SimdOp::Splat(shape) => smallvec![shape.slot_type()],
            SimdOp::Unary(..)
            | SimdOp::Not
            | SimdOp::ExtractLane(..)
            | SimdOp::Convert(_)
            | SimdOp::AllTrue(_)
            | SimdOp::AnyTrue(_) => smallvec![S],
            SimdOp::Binary(..) | SimdOp::Compare(..) | SimdOp::Bitwise(_) => smallvec![S, S],
            SimdOp::Shift(..) => smallvec![S, I],
            SimdOp::BitSelect => smallvec![S, S, S],
            SimdOp::ReplaceLane(shape, _) => smallvec![S, shape.slot_type()],
        },
        // Structural operators are checked by the caller.
        _ => Types::new(),
    }
}

fn check_operands(
    graph: &Graph,
    node: NodeId,
    inputs: &[NodeId],
    expected: &[ValueType],
) -> Result<(), VerifyError> {
    if inputs.len() != expected.len() {
        return Err(VerifyError::Arity {
            node,
            expected: expected.len(),
            found: inputs.len(),
        });
    }
    for (index, (&input, &want)) in inputs.iter().zip(expected).enumerate() {
        let found = graph.ty(input);
        if found != want {
            return Err(VerifyError::OperandType {
                node,
                index,
                expected: want,
                found,
            });
        }
    }
    Ok(())
}

fn check_result(id: NodeId, node: &Node, expected: ValueType) -> Result<(), VerifyError> {
    if node.ty == expected {
        Ok(())
    } else {
        Err(VerifyError::ResultType {
            node: id,
            expected,
            found: node.ty,
        })
    }
}

/// Iterative DFS over inputs from end.
fn check_acyclic(graph: &Graph) -> Result<(), VerifyError> {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    enum Mark {
        #[default]
        White,
        Grey,
        Black,
    }

    let mut marks: SecondaryMap<Node, Mark> = SecondaryMap::with_capacity(graph.len());
    let mut stack: Vec<(NodeId, usize)> = vec![(graph.end, 0)];
    marks.set(graph.end, Mark::Grey);

    while let Some(top) = stack.last_mut() {
        let (id, next) = *top;
        top.1 += 1;
        match graph.node(id).input(next) {
            Some(input) => {
                match marks[input] {
                    Mark::White => {
                        marks.set(input, Mark::Grey);
                        stack.push((input, 0));
                    }
                    Mark::Grey => return Err(VerifyError::Cycle { node: input }),
                    Mark::Black => {}
                }
            }
            None => {
                marks.set(id, Mark::Black);
                stack.pop();
            }
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
