//! All-lanes-true / any-lane-true.
//!
//! Each lane is tested for being nonzero, not for being all ones, and the
//! tests are folded left to right. The result is an `i32` 0 or 1.

use crate::lanes::{Emitter, LaneSlots};
use scalarize_ir::{IntBinOp, IntCmpOp, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    AllTrue,
    AnyTrue,
}

impl Reduction {
    fn fold_op(self) -> IntBinOp {
        match self {
            Reduction::AllTrue => IntBinOp::And,
            Reduction::AnyTrue => IntBinOp::Or,
        }
    }
}

/// Reduce `lanes`, already viewed in the reduction's shape.
pub fn reduce(emit: &mut Emitter, kind: Reduction, lanes: &LaneSlots) -> NodeId {
    let zero = emit.imm(0);
    let mut acc: Option<NodeId> = None;
    for slot in lanes.iter() {
        let nonzero = emit.graph_mut().int_compare(IntCmpOp::Ne, slot, zero);
        acc = Some(match acc {
            Some(prev) => emit.int(kind.fold_op(), prev, nonzero),
            None => nonzero,
        });
    }
    acc.unwrap_or(zero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalarize_ir::{Operator, Shape, ValueType};

    #[test]
    fn test_fold_shape() {
        let mut emit = Emitter::new(32);
        let slots = (0..8)
            .map(|i| emit.graph_mut().parameter(i, ValueType::Int32))
            .collect();
        let lanes = LaneSlots::new(Shape::I16X8, slots);

        let all = reduce(&mut emit, Reduction::AllTrue, &lanes);
        let graph = emit.graph();
        assert_eq!(graph.node(all).op, Operator::IntBinary(IntBinOp::And));
        let compares = graph
            .iter()
            .filter(|(_, n)| n.op == Operator::IntCompare(IntCmpOp::Ne))
            .count();
        assert_eq!(compares, 8);

        let any = reduce(&mut emit, Reduction::AnyTrue, &lanes);
        assert_eq!(emit.graph().node(any).op, Operator::IntBinary(IntBinOp::Or));
    }
}
