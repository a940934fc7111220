//! Lowering errors.
//!
//! Every error is fatal for the module being lowered: nothing is installed
//! unless all functions lower, and no error is retried.

use scalarize_ir::{FuncIndex, NodeId, Operator, Shape, ShapeError, VerifyError};

/// Result type of the lowering pass.
pub type LowerResult<T> = Result<T, LowerError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// A shape in the configuration does not describe 128 bits.
    #[error("malformed shape: {0}")]
    MalformedShape(#[from] ShapeError),

    /// The configuration is well-formed but unusable.
    #[error("invalid lowering configuration: {0}")]
    Config(String),

    /// No scalar lowering exists for this operator and shape.
    #[error("{function}: no scalar lowering for {op:?} at {node:?}")]
    UnsupportedOpcode {
        function: FuncIndex,
        node: NodeId,
        op: Operator,
    },

    #[error("{function}: lane {lane} is out of range for {shape} at {node:?}")]
    LaneOutOfRange {
        function: FuncIndex,
        node: NodeId,
        lane: u8,
        shape: Shape,
    },

    #[error("no function {0} in module")]
    UnknownFunction(FuncIndex),

    /// The input graph breaks an IR invariant.
    #[error("{function}: invalid input graph: {source}")]
    InvalidInput {
        function: FuncIndex,
        source: VerifyError,
    },

    /// The pass broke its own invariants.
    #[error("{function}: internal lowering failure: {failure}")]
    Internal {
        function: FuncIndex,
        failure: InternalFailure,
    },
}

/// Internal-consistency failures of the lowering driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalFailure {
    #[error("cycle through {0:?}")]
    Cycle(NodeId),

    #[error("{0:?} was left in progress")]
    LeftInProgress(NodeId),

    #[error("no replacement recorded for {0:?}")]
    CacheMiss(NodeId),

    #[error("call at {node:?} passes {found} arguments but the callee takes {expected}")]
    StaleCallArity {
        node: NodeId,
        expected: usize,
        found: usize,
    },

    #[error("lowered graph fails verification: {0}")]
    OutputInvalid(VerifyError),
}

impl LowerError {
    /// The function the error was raised in, if it is function-specific.
    pub fn function(&self) -> Option<FuncIndex> {
        match self {
            LowerError::UnsupportedOpcode { function, .. }
            | LowerError::LaneOutOfRange { function, .. }
            | LowerError::InvalidInput { function, .. }
            | LowerError::Internal { function, .. } => Some(*function),
            LowerError::UnknownFunction(function) => Some(*function),
            LowerError::MalformedShape(_) | LowerError::Config(_) => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, LowerError::Internal { .. })
    }
}
