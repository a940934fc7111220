//! Vector constant materialization.

use crate::lanes::{Emitter, LaneSlots};
use scalarize_ir::{Graph, NodeId, Operator, Shape, SimdOp, V128};

/// One scalar constant per lane of `shape`: integer lanes in canonical form,
/// float lanes carrying the exact bit pattern.
pub fn materialize(emit: &mut Emitter, bytes: &V128, shape: Shape) -> LaneSlots {
    let slots = shape
        .raw_lanes(bytes)
        .map(|raw| {
            if shape.is_float() {
                emit.graph_mut().const_f32(f32::from_bits(raw))
            } else {
                emit.graph_mut().const_i32(shape.wrap(raw as i32))
            }
        })
        .collect();
    LaneSlots::new(shape, slots)
}

/// Shape a vector operand at input `index` of `op` is read in, when the
/// operator fixes one.
pub fn operand_shape(op: &Operator, index: usize) -> Option<Shape> {
    let Operator::Simd(simd) = op else {
        return None;
    };
    match simd {
        SimdOp::Unary(shape, _)
        | SimdOp::Binary(shape, _)
        | SimdOp::Compare(shape, _)
        | SimdOp::AllTrue(shape)
        | SimdOp::AnyTrue(shape) => Some(*shape),
        SimdOp::Shift(shape, _) | SimdOp::ExtractLane(shape, ..) | SimdOp::ReplaceLane(shape, _)
            if index == 0 =>
        {
            Some(*shape)
        }
        SimdOp::Convert(_) => Some(Shape::I32X4),
        _ => None,
    }
}

/// Shape to materialize a constant in: the one all of its shape-fixing
/// consumers agree on, else `i32x4`.
pub fn preferred_shape(graph: &Graph, node: NodeId) -> Shape {
    let mut preferred = None;
    for &user in graph.uses(node) {
        let user_node = graph.node(user);
        if user_node.is_dead() {
            continue;
        }
        for (index, _) in user_node
            .inputs
            .iter()
            .enumerate()
            .filter(|&(_, &input)| input == node)
        {
            let Some(shape) = operand_shape(&user_node.op, index) else {
                continue;
            };
            match preferred {
                None => preferred = Some(shape),
                Some(p) if p == shape => {}
                Some(_) => return Shape::I32X4,
            }
        }
    }
    preferred.unwrap_or(Shape::I32X4)
}
