//! Reference interpreter.
//!
//! Executes a [`Module`] directly on the IR, vector operations included, so
//! the same entry point can be run before and after a pass and the results
//! compared. Globals are byte arrays; vectors are 16 little-endian bytes.
//!
//! Evaluation walks a function's graph once in post-order from end. Input 0
//! of every effectful node is its effect predecessor, so post-order visits
//! the effect chain in program order.

use crate::arena::SecondaryMap;
use crate::graph::Graph;
use crate::module::{FuncIndex, Module};
use crate::node::{Node, NodeId};
use crate::operators::{
    ControlOp, ConvertOp, FloatBinOp, FloatUnOp, Operator, SimdBinOp, SimdBitOp, SimdConvertOp,
    SimdOp, SimdShiftOp, SimdUnOp,
};
use crate::shape::{Extension, LaneValues, Shape};
use crate::types::ValueType;
use crate::value::{V128, Value};
use smallvec::SmallVec;

/// Nested calls deeper than this are reported instead of overflowing.
const MAX_CALL_DEPTH: usize = 256;

/// Failure to execute a function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("no function {0}")]
    UnknownFunction(FuncIndex),

    #[error("{function} takes {expected} arguments, got {found}")]
    Arity {
        function: FuncIndex,
        expected: usize,
        found: usize,
    },

    #[error("argument {index} of {function} is {found}, expected {expected}")]
    ArgumentType {
        function: FuncIndex,
        index: usize,
        expected: ValueType,
        found: ValueType,
    },

    #[error("{function}: node {node:?} {reason}")]
    Malformed {
        function: FuncIndex,
        node: NodeId,
        reason: &'static str,
    },

    #[error("call depth exceeded in {0}")]
    CallDepth(FuncIndex),
}

/// Result of evaluating one node.
#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Token,
    Value(Value),
    Tuple(SmallVec<[Value; 4]>),
}

/// Executes functions of one module against its own global storage.
pub struct Interpreter<'m> {
    module: &'m Module,
    globals: Vec<Vec<u8>>,
    depth: usize,
}

impl<'m> Interpreter<'m> {
    /// Create an interpreter with zeroed globals.
    pub fn new(module: &'m Module) -> Self {
        let globals = module.globals().iter().map(|g| vec![0u8; g.size()]).collect();
        Interpreter {
            module,
            globals,
            depth: 0,
        }
    }

    /// Raw storage of a global.
    pub fn global_bytes(&self, index: u32) -> Option<&[u8]> {
        self.globals.get(index as usize).map(Vec::as_slice)
    }

    /// Read `ty` from a global at a byte offset.
    pub fn read_global(&self, index: u32, offset: usize, ty: ValueType) -> Option<Value> {
        let bytes = self.global_bytes(index)?;
        read_value(bytes, offset, ty)
    }

    /// Run a function to completion.
    pub fn call(&mut self, function: FuncIndex, args: &[Value]) -> Result<Vec<Value>, InterpError> {
        let module = self.module;
        let func = module
            .function(function)
            .ok_or(InterpError::UnknownFunction(function))?;
        let params = &func.signature.params;
        if params.len() != args.len() {
            return Err(InterpError::Arity {
                function,
                expected: params.len(),
                found: args.len(),
            });
        }
        for (index, (arg, &expected)) in args.iter().zip(params.iter()).enumerate() {
            if arg.ty() != expected {
                return Err(InterpError::ArgumentType {
                    function,
                    index,
                    expected,
                    found: arg.ty(),
                });
            }
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(InterpError::CallDepth(function));
        }

        self.depth += 1;
        let result = self.run(function, &func.graph, args);
        self.depth -= 1;
        result
    }

    fn run(
        &mut self,
        function: FuncIndex,
        graph: &Graph,
        args: &[Value],
    ) -> Result<Vec<Value>, InterpError> {
        let order = schedule(graph).map_err(|node| InterpError::Malformed {
            function,
            node,
            reason: "is part of a cycle",
        })?;

        let mut slots: SecondaryMap<Node, Slot> = SecondaryMap::with_capacity(graph.len());
        let mut returned = None;

        for id in order {
            let node = graph.node(id);
            let malformed = |reason: &'static str| InterpError::Malformed {
                function,
                node: id,
                reason,
            };
            let slot = match node.op {
                Operator::Control(ControlOp::Start | ControlOp::End) => Slot::Token,
                Operator::Control(ControlOp::Return) => {
                    let values = node
                        .value_inputs()
                        .iter()
                        .map(|&i| value_of(&slots, i).ok_or(malformed("returns a non-value")))
                        .collect::<Result<Vec<_>, _>>()?;
                    returned = Some(values);
                    Slot::Token
                }
                Operator::Call(callee) => {
                    let call_args = node
                        .value_inputs()
                        .iter()
                        .map(|&i| value_of(&slots, i).ok_or(malformed("passes a non-value")))
                        .collect::<Result<Vec<_>, _>>()?;
                    let results = self.call(callee, &call_args)?;
                    Slot::Tuple(results.into_iter().collect())
                }
                Operator::GlobalGet(access) => {
                    let value = self
                        .read_global(access.global, access.offset as usize, node.ty)
                        .ok_or(malformed("loads out of bounds"))?;
                    Slot::Value(value)
                }
                Operator::GlobalSet(access) => {
                    let value = node
                        .input(1)
                        .and_then(|i| value_of(&slots, i))
                        .ok_or(malformed("stores a non-value"))?;
                    let stored = self
                        .globals
                        .get_mut(access.global as usize)
                        .is_some_and(|bytes| write_value(bytes, access.offset as usize, value));
                    if !stored {
                        return Err(malformed("stores out of bounds"));
                    }
                    Slot::Token
                }
                Operator::Projection(index) => {
                    let value = match node.input(0).map(|call| &slots[call]) {
                        Some(Slot::Tuple(values)) => values.get(index as usize).copied(),
                        _ => None,
                    };
                    Slot::Value(value.ok_or(malformed("projects a missing result"))?)
                }
                Operator::Parameter(index) => Slot::Value(
                    args.get(index as usize)
                        .copied()
                        .ok_or(malformed("reads a missing argument"))?,
                ),
                ref op => {
                    let operands = node
                        .inputs
                        .iter()
                        .map(|&i| value_of(&slots, i))
                        .collect::<Option<SmallVec<[Value; 4]>>>()
                        .ok_or(malformed("reads a non-value"))?;
                    Slot::Value(eval_pure(op, &operands).map_err(malformed)?)
                }
            };
            slots.set(id, slot);
        }

        returned.ok_or(InterpError::Malformed {
            function,
            node: graph.end,
            reason: "is not reached from a return",
        })
    }
}

fn value_of(slots: &SecondaryMap<Node, Slot>, id: NodeId) -> Option<Value> {
    match slots.get(id) {
        Some(Slot::Value(v)) => Some(*v),
        _ => None,
    }
}

/// Post-order from end; `Err` names a node on a cycle.
fn schedule(graph: &Graph) -> Result<Vec<NodeId>, NodeId> {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    enum Mark {
        #[default]
        New,
        Open,
        Done,
    }

    let mut marks: SecondaryMap<Node, Mark> = SecondaryMap::with_capacity(graph.len());
    let mut order = Vec::with_capacity(graph.len());
    let mut stack: Vec<(NodeId, usize)> = vec![(graph.end, 0)];
    marks.set(graph.end, Mark::Open);

    while let Some(top) = stack.last_mut() {
        let (id, next) = *top;
        top.1 += 1;
        match graph.node(id).input(next) {
            Some(input) => match marks.get(input).copied().unwrap_or_default() {
                Mark::New => {
                    marks.set(input, Mark::Open);
                    stack.push((input, 0));
                }
                Mark::Open => return Err(input),
                Mark::Done => {}
            },
            None => {
                marks.set(id, Mark::Done);
                order.push(id);
                stack.pop();
            }
        }
    }
    Ok(order)
}

// =============================================================================
// Global Storage
// =============================================================================

fn read_value(bytes: &[u8], offset: usize, ty: ValueType) -> Option<Value> {
    let size = ty.size_bytes()?;
    let chunk = bytes.get(offset..offset.checked_add(size)?)?;
    match ty {
        ValueType::Int32 => Some(Value::I32(i32::from_le_bytes(chunk.try_into().ok()?))),
        ValueType::Float32 => Some(Value::F32(f32::from_le_bytes(chunk.try_into().ok()?))),
        ValueType::Simd128 => Some(Value::V128(chunk.try_into().ok()?)),
        _ => None,
    }
}

fn write_value(bytes: &mut [u8], offset: usize, value: Value) -> bool {
    let encoded: SmallVec<[u8; 16]> = match value {
        Value::I32(v) => SmallVec::from_slice(&v.to_le_bytes()),
        Value::F32(v) => SmallVec::from_slice(&v.to_bits().to_le_bytes()),
        Value::V128(v) => SmallVec::from_slice(&v),
    };
    match offset
        .checked_add(encoded.len())
        .and_then(|end| bytes.get_mut(offset..end))
    {
        Some(dst) => {
            dst.copy_from_slice(&encoded);
            true
        }
        None => false,
    }
}

// =============================================================================
// Pure Operators
// =============================================================================

type EvalResult = Result<Value, &'static str>;

fn i32_at(operands: &[Value], index: usize) -> Result<i32, &'static str> {
    operands
        .get(index)
        .and_then(Value::as_i32)
        .ok_or("expects an i32 operand")
}

fn f32_at(operands: &[Value], index: usize) -> Result<f32, &'static str> {
    operands
        .get(index)
        .and_then(Value::as_f32)
        .ok_or("expects an f32 operand")
}

fn v128_at(operands: &[Value], index: usize) -> Result<V128, &'static str> {
    operands
        .get(index)
        .and_then(Value::as_v128)
        .ok_or("expects a v128 operand")
}

fn eval_pure(op: &Operator, operands: &[Value]) -> EvalResult {
    let value = match *op {
        Operator::ConstI32(v) => Value::I32(v),
        Operator::ConstF32(bits) => Value::F32(f32::from_bits(bits)),
        Operator::IntBinary(op) => Value::I32(op.eval(i32_at(operands, 0)?, i32_at(operands, 1)?)),
        Operator::IntCompare(op) => {
            Value::I32(op.eval(i32_at(operands, 0)?, i32_at(operands, 1)?) as i32)
        }
        Operator::FloatUnary(op) => Value::F32(op.eval(f32_at(operands, 0)?)),
        Operator::FloatBinary(op) => {
            Value::F32(op.eval(f32_at(operands, 0)?, f32_at(operands, 1)?))
        }
        Operator::FloatCompare(op) => {
            Value::I32(op.eval(f32_at(operands, 0)?, f32_at(operands, 1)?) as i32)
        }
        Operator::Convert(op) => match op {
            ConvertOp::BitcastF32ToI32 => Value::I32(f32_at(operands, 0)?.to_bits() as i32),
            ConvertOp::BitcastI32ToF32 => Value::F32(f32::from_bits(i32_at(operands, 0)? as u32)),
            ConvertOp::I32ToF32S => Value::F32(i32_at(operands, 0)? as f32),
            ConvertOp::I32ToF32U => Value::F32(i32_at(operands, 0)? as u32 as f32),
        },
        Operator::Select => {
            let condition = i32_at(operands, 2)?;
            let pick = if condition != 0 { 0 } else { 1 };
            *operands.get(pick).ok_or("selects a missing operand")?
        }
        Operator::Simd(simd) => eval_simd(simd, operands)?,
        _ => return Err("is not a pure operator"),
    };
    Ok(value)
}

// =============================================================================
// Vector Semantics
// =============================================================================

fn lanes(
    shape: Shape,
    operands: &[Value],
    index: usize,
    ext: Extension,
) -> Result<LaneValues, &'static str> {
    Ok(shape.decode(&v128_at(operands, index)?, ext))
}

fn lane_i32(lane: &Value) -> i32 {
    lane.as_i32().unwrap_or(0)
}

fn lane_f32(lane: &Value) -> f32 {
    lane.as_f32().unwrap_or(0.0)
}

/// Apply `f` lane-wise to two vectors decoded with `ext`.
fn zip_lanes(
    shape: Shape,
    operands: &[Value],
    ext: Extension,
    mut f: impl FnMut(&Value, &Value) -> Value,
) -> Result<V128, &'static str> {
    let a = lanes(shape, operands, 0, ext)?;
    let b = lanes(shape, operands, 1, ext)?;
    let out: LaneValues = a.iter().zip(b.iter()).map(|(x, y)| f(x, y)).collect();
    Ok(shape.encode(&out))
}

fn bytewise(a: &V128, b: &V128, f: impl Fn(u8, u8) -> u8) -> V128 {
    core::array::from_fn(|i| f(a[i], b[i]))
}

fn eval_simd(op: SimdOp, operands: &[Value]) -> EvalResult {
    if !op.is_defined() {
        return Err("is not defined for its shape");
    }
    let bytes = match op {
        SimdOp::Const(bytes) => bytes,

        SimdOp::Splat(shape) => {
            let scalar = *operands.first().ok_or("splats nothing")?;
            if scalar.ty() != shape.slot_type() {
                return Err("splats a scalar of the wrong type");
            }
            let out: LaneValues = (0..shape.lanes()).map(|_| scalar).collect();
            shape.encode(&out)
        }

        SimdOp::Unary(shape, op) => {
            let a = lanes(shape, operands, 0, Extension::Signed)?;
            let out: LaneValues = a
                .iter()
                .map(|lane| {
                    if shape.is_float() {
                        let f = match op {
                            SimdUnOp::Neg => FloatUnOp::Neg,
                            SimdUnOp::Abs => FloatUnOp::Abs,
                            SimdUnOp::Sqrt => FloatUnOp::Sqrt,
                        };
                        Value::F32(f.eval(lane_f32(lane)))
                    } else {
                        let x = lane_i32(lane);
                        Value::I32(match op {
                            SimdUnOp::Abs => x.wrapping_abs(),
                            _ => x.wrapping_neg(),
                        })
                    }
                })
                .collect();
            shape.encode(&out)
        }

        SimdOp::Binary(shape, op) if shape.is_float() => {
            let f = match op {
                SimdBinOp::Add => FloatBinOp::Add,
                SimdBinOp::Sub => FloatBinOp::Sub,
                SimdBinOp::Mul => FloatBinOp::Mul,
                SimdBinOp::Div => FloatBinOp::Div,
                SimdBinOp::Max => FloatBinOp::Max,
                _ => FloatBinOp::Min,
            };
            zip_lanes(shape, operands, Extension::Signed, |a, b| {
                Value::F32(f.eval(lane_f32(a), lane_f32(b)))
            })?
        }

        SimdOp::Binary(shape, op) => {
            let ext = match op {
                SimdBinOp::MinU | SimdBinOp::MaxU => Extension::Unsigned,
                _ => Extension::Signed,
            };
            zip_lanes(shape, operands, ext, |a, b| {
                let (x, y) = (lane_i32(a), lane_i32(b));
                Value::I32(match op {
                    SimdBinOp::Add => x.wrapping_add(y),
                    SimdBinOp::Sub => x.wrapping_sub(y),
                    SimdBinOp::Mul => x.wrapping_mul(y),
                    SimdBinOp::MinU => (x as u32).min(y as u32) as i32,
                    SimdBinOp::MaxU => (x as u32).max(y as u32) as i32,
                    SimdBinOp::MaxS => x.max(y),
                    _ => x.min(y),
                })
            })?
        }

        SimdOp::Compare(shape, op) => {
            let mask = |hit: bool| Value::I32(if hit { -1 } else { 0 });
            if let Some(f) = op.float_cmp().filter(|_| shape.is_float()) {
                zip_lanes(shape, operands, Extension::Signed, |a, b| {
                    mask(f.eval(lane_f32(a), lane_f32(b)))
                })?
            } else {
                let cmp = op.int_cmp().ok_or("compares with a float ordering")?;
                let ext = if cmp.is_unsigned() {
                    Extension::Unsigned
                } else {
                    Extension::Signed
                };
                zip_lanes(shape, operands, ext, |a, b| {
                    mask(cmp.eval(lane_i32(a), lane_i32(b)))
                })?
            }
        }

        SimdOp::Shift(shape, op) => {
            let count = (i32_at(operands, 1)? as u32) & (shape.lane_bits() - 1);
            let ext = match op {
                SimdShiftOp::ShrU => Extension::Unsigned,
                _ => Extension::Signed,
            };
            let a = lanes(shape, operands, 0, ext)?;
            let out: LaneValues = a
                .iter()
                .map(|lane| {
                    let x = lane_i32(lane);
                    Value::I32(match op {
                        SimdShiftOp::Shl => x.wrapping_shl(count),
                        SimdShiftOp::ShrS => x >> count,
                        SimdShiftOp::ShrU => ((x as u32) >> count) as i32,
                    })
                })
                .collect();
            shape.encode(&out)
        }

        SimdOp::Not => v128_at(operands, 0)?.map(|b| !b),

        SimdOp::Bitwise(op) => {
            let (a, b) = (v128_at(operands, 0)?, v128_at(operands, 1)?);
            match op {
                SimdBitOp::And => bytewise(&a, &b, |x, y| x & y),
                SimdBitOp::Or => bytewise(&a, &b, |x, y| x | y),
                SimdBitOp::Xor => bytewise(&a, &b, |x, y| x ^ y),
                SimdBitOp::AndNot => bytewise(&a, &b, |x, y| x & !y),
            }
        }

        SimdOp::BitSelect => {
            let (a, b, c) = (
                v128_at(operands, 0)?,
                v128_at(operands, 1)?,
                v128_at(operands, 2)?,
            );
            core::array::from_fn(|i| (a[i] & c[i]) | (b[i] & !c[i]))
        }

        SimdOp::ExtractLane(shape, lane, ext) => {
            let a = lanes(shape, operands, 0, ext)?;
            return a.get(lane as usize).copied().ok_or("extracts a lane out of range");
        }

        SimdOp::ReplaceLane(shape, lane) => {
            let mut a = lanes(shape, operands, 0, Extension::Signed)?;
            let scalar = *operands.get(1).ok_or("replaces with nothing")?;
            if scalar.ty() != shape.slot_type() {
                return Err("replaces with a scalar of the wrong type");
            }
            *a.get_mut(lane as usize).ok_or("replaces a lane out of range")? = scalar;
            shape.encode(&a)
        }

        SimdOp::Convert(op) => {
            let a = lanes(Shape::I32X4, operands, 0, Extension::Signed)?;
            let out: LaneValues = a
                .iter()
                .map(|lane| {
                    let x = lane_i32(lane);
                    Value::F32(match op {
                        SimdConvertOp::I32x4ToF32x4S => x as f32,
                        SimdConvertOp::I32x4ToF32x4U => x as u32 as f32,
                    })
                })
                .collect();
            Shape::F32X4.encode(&out)
        }

        SimdOp::AllTrue(shape) => {
            let a = lanes(shape, operands, 0, Extension::Signed)?;
            return Ok(Value::I32(a.iter().all(|l| lane_i32(l) != 0) as i32));
        }

        SimdOp::AnyTrue(shape) => {
            let a = lanes(shape, operands, 0, Extension::Signed)?;
            return Ok(Value::I32(a.iter().any(|l| lane_i32(l) != 0) as i32));
        }
    };
    Ok(Value::V128(bytes))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::module::Function;
    use crate::operators::{GlobalAccess, SimdCmpOp};
    use crate::signature::Signature;

    fn single(sig: Signature, body: impl FnOnce(&mut FunctionBuilder) -> Vec<NodeId>) -> Module {
        let mut module = Module::new();
        let mut b = FunctionBuilder::new(sig);
        let values = body(&mut b);
        module.add_function(b.finish_function("main", &values));
        module
    }

    #[test]
    fn test_scalar_arithmetic() {
        let sig = Signature::new(&[ValueType::Int32], &[ValueType::Int32]);
        let module = single(sig, |b| {
            let p = b.param(0);
            let two = b.i32_const(2);
            vec![b.int_binary(crate::operators::IntBinOp::Mul, p, two)]
        });
        let mut interp = Interpreter::new(&module);
        assert_eq!(interp.call(FuncIndex(0), &[Value::I32(21)]), Ok(vec![Value::I32(42)]));
    }

    #[test]
    fn test_argument_checks() {
        let sig = Signature::new(&[ValueType::Int32], &[]);
        let module = single(sig, |_| vec![]);
        let mut interp = Interpreter::new(&module);
        assert!(matches!(
            interp.call(FuncIndex(0), &[]),
            Err(InterpError::Arity { expected: 1, found: 0, .. })
        ));
        assert!(matches!(
            interp.call(FuncIndex(0), &[Value::F32(1.0)]),
            Err(InterpError::ArgumentType { index: 0, .. })
        ));
        assert_eq!(
            interp.call(FuncIndex(9), &[]),
            Err(InterpError::UnknownFunction(FuncIndex(9)))
        );
    }

    #[test]
    fn test_i16x8_eq_mask() {
        let sig = Signature::new(&[], &[ValueType::Simd128]);
        let module = single(sig, |b| {
            let x = b.i32_const(7);
            let v = b.splat(Shape::I16X8, x);
            vec![b.simd_compare(Shape::I16X8, SimdCmpOp::Eq, v, v)]
        });
        let mut interp = Interpreter::new(&module);
        assert_eq!(interp.call(FuncIndex(0), &[]), Ok(vec![Value::V128([0xff; 16])]));
    }

    #[test]
    fn test_narrow_lane_wrapping() {
        let sig = Signature::new(&[], &[ValueType::Int32, ValueType::Int32]);
        let module = single(sig, |b| {
            let x = b.i32_const(0x7f);
            let v = b.splat(Shape::I8X16, x);
            let sum = b.simd_binary(Shape::I8X16, SimdBinOp::Add, v, v);
            vec![
                b.extract_lane(Shape::I8X16, 3, sum),
                b.extract_lane_u(Shape::I8X16, 3, sum),
            ]
        });
        let mut interp = Interpreter::new(&module);
        assert_eq!(
            interp.call(FuncIndex(0), &[]),
            Ok(vec![Value::I32(-2), Value::I32(0xfe)])
        );
    }

    #[test]
    fn test_vector_global_round_trip() {
        let mut module = Module::new();
        let g = module.add_global(ValueType::Simd128);
        let mut b = FunctionBuilder::new(Signature::new(&[], &[ValueType::Float32]));
        let x = b.f32_const(-1.5);
        let v = b.splat(Shape::F32X4, x);
        b.global_set(GlobalAccess::new(g, 0), v);
        let lane = b.global_get(GlobalAccess::new(g, 8), ValueType::Float32);
        module.add_function(b.finish_function("main", &[lane]));

        let mut interp = Interpreter::new(&module);
        assert_eq!(interp.call(FuncIndex(0), &[]), Ok(vec![Value::F32(-1.5)]));
        assert_eq!(
            interp.read_global(g, 12, ValueType::Float32),
            Some(Value::F32(-1.5))
        );
        assert_eq!(interp.global_bytes(g).map(<[u8]>::len), Some(16));
    }

    #[test]
    fn test_shift_count_is_masked() {
        let sig = Signature::new(&[], &[ValueType::Int32]);
        let module = single(sig, |b| {
            let x = b.i32_const(-128);
            let v = b.splat(Shape::I16X8, x);
            let count = b.i32_const(17);
            let shifted = b.simd_shift(Shape::I16X8, SimdShiftOp::ShrU, v, count);
            vec![b.extract_lane(Shape::I16X8, 0, shifted)]
        });
        let mut interp = Interpreter::new(&module);
        // 0xff80 >> 1 = 0x7fc0
        assert_eq!(interp.call(FuncIndex(0), &[]), Ok(vec![Value::I32(0x7fc0)]));
    }

    #[test]
    fn test_calls_pass_vectors() {
        let mut module = Module::new();
        let callee_sig = Signature::new(&[ValueType::Simd128], &[ValueType::Simd128]);
        let mut b = FunctionBuilder::new(callee_sig.clone());
        let p = b.param(0);
        let neg = b.simd_unary(Shape::F32X4, SimdUnOp::Neg, p);
        let callee = module.add_function(b.finish_function("neg", &[neg]));

        let mut b = FunctionBuilder::new(Signature::new(&[], &[ValueType::Float32]));
        let one = b.f32_const(1.0);
        let v = b.splat(Shape::F32X4, one);
        let results = b.call(callee, &callee_sig, &[v]);
        let lane = b.extract_lane(Shape::F32X4, 0, results[0]);
        let main = module.add_function(b.finish_function("main", &[lane]));

        let mut interp = Interpreter::new(&module);
        assert_eq!(interp.call(main, &[]), Ok(vec![Value::F32(-1.0)]));
    }

    #[test]
    fn test_rejects_undefined_combination() {
        let mut b = FunctionBuilder::new(Signature::new(&[], &[ValueType::Simd128]));
        let x = b.i32_const(1);
        let v = b.splat(Shape::I8X16, x);
        let bad = b.simd_binary(Shape::I8X16, SimdBinOp::Mul, v, v);
        let sig = Signature::new(&[], &[ValueType::Simd128]);
        let mut module = Module::new();
        module.add_function(Function::new("main", sig, b.finish(&[bad])));

        let mut interp = Interpreter::new(&module);
        assert!(matches!(
            interp.call(FuncIndex(0), &[]),
            Err(InterpError::Malformed { .. })
        ));
    }
}
