//! Sea-of-nodes IR for WebAssembly-style function bodies with 128-bit SIMD.
//!
//! # Core Components
//!
//! - **Arena** (`arena.rs`): typed ids and index-keyed side tables
//! - **Types** (`types.rs`): value types
//! - **Shape** (`shape.rs`): lane model for 128-bit vectors
//! - **Operators** (`operators.rs`): scalar and SIMD operator families
//! - **Node** / **Graph** (`node.rs`, `graph.rs`): graph with use-def chains
//! - **Module** (`module.rs`): functions, globals, lowering metadata
//! - **Builder** (`builder.rs`): effect-chain aware construction
//! - **Verifier** (`verify.rs`): structural and type invariants
//! - **Interpreter** (`interp.rs`): reference semantics for vectors and scalars

pub mod arena;
pub mod builder;
pub mod graph;
pub mod interp;
pub mod module;
pub mod node;
pub mod operators;
pub mod shape;
pub mod signature;
pub mod types;
pub mod value;
pub mod verify;

// Re-export commonly used types
pub use arena::{Arena, Id, SecondaryMap};
pub use builder::FunctionBuilder;
pub use graph::Graph;
pub use interp::{InterpError, Interpreter};
pub use module::{FuncIndex, Function, Global, LoweringRecord, Module, VectorOrigin};
pub use node::{InputList, Node, NodeFlags, NodeId};
pub use operators::{
    ControlOp, ConvertOp, FloatBinOp, FloatCmpOp, FloatUnOp, GlobalAccess, IntBinOp, IntCmpOp,
    Operator, SimdBinOp, SimdBitOp, SimdCmpOp, SimdConvertOp, SimdFamily, SimdOp, SimdShiftOp,
    SimdUnOp,
};
pub use shape::{Extension, LaneKind, LaneValues, Shape, ShapeError};
pub use signature::Signature;
pub use types::ValueType;
pub use value::{V128, Value};
pub use verify::{VerifyError, Verifier};
