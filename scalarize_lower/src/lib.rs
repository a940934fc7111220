//! Scalar lowering of 128-bit SIMD.
//!
//! Rewrites every vector value and operation of a [`scalarize_ir::Module`]
//! into `i32`/`f32` scalar nodes, and every vector in a signature into four
//! 32-bit slots.
//!
//! # Core Components
//!
//! - **Pass** (`pass.rs`): module-level entry point, verification, install
//! - **Driver** (`driver.rs`): post-order walk and replacement cache
//! - **Replacer** (`replacer.rs`): per-family SIMD rules
//! - **Lanes** (`lanes.rs`): lane slots, canonical form, repartitioning
//! - **Signature** (`signature.rs`): signature expansion and slot maps
//!
//! # Example
//!
//! ```
//! use scalarize_ir::{FunctionBuilder, Module, Shape, SimdBinOp, Signature, ValueType};
//! use scalarize_lower::{LoweringConfig, ScalarLowering};
//!
//! let sig = Signature::new(&[ValueType::Simd128], &[ValueType::Simd128]);
//! let mut b = FunctionBuilder::new(sig);
//! let x = b.param(0);
//! let doubled = b.simd_binary(Shape::I8X16, SimdBinOp::Add, x, x);
//! let mut module = Module::new();
//! module.add_function(b.finish_function("double", &[doubled]));
//!
//! let pass = ScalarLowering::new(LoweringConfig::default()).unwrap();
//! pass.lower_module(&mut module).unwrap();
//! assert!(module.functions()[0].signature.is_scalar());
//! ```

pub mod config;
pub mod constant;
pub mod driver;
pub mod error;
pub mod lanes;
pub mod pass;
pub mod reduction;
mod replacer;
pub mod signature;

pub use config::LoweringConfig;
pub use driver::{FunctionLowering, LoweredGraph, LoweringStats};
pub use error::{InternalFailure, LowerError, LowerResult};
pub use lanes::{Emitter, LaneSlots};
pub use pass::{ModuleLoweringStats, ScalarLowering};
pub use signature::{ExpandedSignature, SignatureTable, SlotRange};
