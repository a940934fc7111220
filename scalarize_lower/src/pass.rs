//! The scalar lowering pass.
//!
//! Lowering is all-or-nothing per module: every function is lowered into a
//! fresh graph first, and signatures and bodies are only swapped in once all
//! of them succeeded.

use crate::config::LoweringConfig;
use crate::driver::{FunctionLowering, LoweredGraph, LoweringStats};
use crate::error::{InternalFailure, LowerError, LowerResult};
use crate::signature::SignatureTable;
use rayon::prelude::*;
use scalarize_ir::{FuncIndex, Module, Verifier};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

// =============================================================================
// Statistics
// =============================================================================

/// Statistics for one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoweringStats {
    /// Functions that were rewritten.
    pub functions_lowered: usize,
    /// Functions with no vector in signature or body.
    pub functions_unchanged: usize,
    /// Sum over all lowered functions.
    pub totals: LoweringStats,
    /// Wall time of the whole pass.
    pub time: Duration,
}

// =============================================================================
// Scalar Lowering
// =============================================================================

/// Rewrites vector code into 32-bit scalar code.
#[derive(Debug, Clone)]
pub struct ScalarLowering {
    config: LoweringConfig,
}

impl ScalarLowering {
    /// Create a pass, rejecting unusable configurations.
    pub fn new(config: LoweringConfig) -> LowerResult<Self> {
        config.validate()?;
        Ok(ScalarLowering { config })
    }

    pub fn config(&self) -> &LoweringConfig {
        &self.config
    }

    /// Lower every function of `module` in place.
    ///
    /// On error the module is left exactly as it was.
    #[instrument(skip_all, name = "scalar_lowering", fields(functions = module.functions().len()))]
    pub fn lower_module(&self, module: &mut Module) -> LowerResult<ModuleLoweringStats> {
        let start = Instant::now();
        let table = SignatureTable::build(module, self.config.abi_shape);

        let shared: &Module = module;
        let count = shared.functions().len();
        let lower = |i: usize| self.lower_function(shared, &table, FuncIndex(i as u32));
        let results: Vec<Option<LoweredGraph>> = if self.config.parallel {
            (0..count).into_par_iter().map(lower).collect::<LowerResult<_>>()?
        } else {
            (0..count).map(lower).collect::<LowerResult<_>>()?
        };

        let mut stats = ModuleLoweringStats::default();
        for (function, lowered) in module.functions_mut().iter_mut().zip(results) {
            let Some(lowered) = lowered else {
                stats.functions_unchanged += 1;
                continue;
            };
            stats.functions_lowered += 1;
            stats.totals.merge(&lowered.stats);
            function.signature = lowered.signature;
            function.graph = lowered.graph;
            function.lowering = Some(lowered.record);
        }
        stats.time = start.elapsed();

        debug!(
            lowered = stats.functions_lowered,
            unchanged = stats.functions_unchanged,
            vector_nodes = stats.totals.vector_nodes_lowered,
            conversions = stats.totals.conversions,
            "module lowered"
        );
        Ok(stats)
    }

    /// Lower one function of `module` without modifying it.
    ///
    /// Returns `None` when the function has nothing to lower. `table` must
    /// have been built from `module` with this pass's ABI shape.
    #[instrument(skip_all, fields(function = %index))]
    pub fn lower_function(
        &self,
        module: &Module,
        table: &SignatureTable,
        index: FuncIndex,
    ) -> LowerResult<Option<LoweredGraph>> {
        let function = module
            .function(index)
            .ok_or(LowerError::UnknownFunction(index))?;
        if !function.has_vectors() {
            return Ok(None);
        }
        let expanded = table.get(index).ok_or(LowerError::UnknownFunction(index))?;

        if self.config.verify_input {
            Verifier::new(module.globals(), table.original_signatures())
                .verify(&function.signature, &function.graph)
                .map_err(|source| LowerError::InvalidInput {
                    function: index,
                    source,
                })?;
        }

        let lowered =
            FunctionLowering::new(index, &function.graph, expanded, table, &self.config).run()?;

        if self.config.verify_output {
            Verifier::new(module.globals(), table.lowered_signatures())
                .scalar_only()
                .verify(&lowered.signature, &lowered.graph)
                .map_err(|err| LowerError::Internal {
                    function: index,
                    failure: InternalFailure::OutputInvalid(err),
                })?;
        }

        debug!(
            name = %function.name,
            visited = lowered.stats.nodes_visited,
            vector_nodes = lowered.stats.vector_nodes_lowered,
            cache_hits = lowered.stats.cache_hits,
            emitted = lowered.stats.nodes_emitted,
            "function lowered"
        );
        Ok(Some(lowered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalarize_ir::{
        FunctionBuilder, IntBinOp, LaneKind, NodeFlags, Shape, SimdBinOp, Signature, ValueType,
    };

    fn add_module() -> Module {
        let sig = Signature::new(&[ValueType::Simd128, ValueType::Simd128], &[ValueType::Simd128]);
        let mut b = FunctionBuilder::new(sig);
        let (x, y) = (b.param(0), b.param(1));
        let sum = b.simd_binary(Shape::I16X8, SimdBinOp::Add, x, y);
        let mut module = Module::new();
        module.add_function(b.finish_function("add", &[sum]));
        module
    }

    #[test]
    fn test_rejects_narrow_abi() {
        let config = LoweringConfig::default()
            .with_abi(8, 16, LaneKind::Int)
            .unwrap();
        assert!(matches!(
            ScalarLowering::new(config),
            Err(LowerError::Config(_))
        ));
    }

    #[test]
    fn test_lower_module_installs_everything() {
        let mut module = add_module();
        let pass = ScalarLowering::new(LoweringConfig::default()).unwrap();
        let stats = pass.lower_module(&mut module).unwrap();

        assert_eq!(stats.functions_lowered, 1);
        assert_eq!(stats.totals.conversions, 3);
        let function = &module.functions()[0];
        assert!(function.signature.is_scalar());
        assert_eq!(function.signature.params.len(), 8);
        assert!(!function.graph.contains_vectors());
        assert!(function.graph.count_flagged(NodeFlags::FROM_VECTOR) > 0);

        let record = function.lowering.as_ref().unwrap();
        assert_eq!(record.original_signature.params.len(), 2);
        assert!(record.origins.values().any(|o| o.shape == Shape::I16X8));
    }

    #[test]
    fn test_scalar_function_untouched() {
        let mut b = FunctionBuilder::new(Signature::new(&[ValueType::Int32], &[ValueType::Int32]));
        let p = b.param(0);
        let one = b.i32_const(1);
        let sum = b.int_binary(IntBinOp::Add, p, one);
        let mut module = Module::new();
        module.add_function(b.finish_function("inc", &[sum]));
        let before = module.functions()[0].graph.len();

        let pass = ScalarLowering::new(LoweringConfig::default()).unwrap();
        let stats = pass.lower_module(&mut module).unwrap();
        assert_eq!(stats.functions_unchanged, 1);
        assert_eq!(module.functions()[0].graph.len(), before);
        assert!(module.functions()[0].lowering.is_none());
    }

    #[test]
    fn test_unknown_function() {
        let module = add_module();
        let pass = ScalarLowering::new(LoweringConfig::default()).unwrap();
        let table = SignatureTable::build(&module, Shape::I32X4);
        assert_eq!(
            pass.lower_function(&module, &table, FuncIndex(3)).unwrap_err(),
            LowerError::UnknownFunction(FuncIndex(3))
        );
    }
}
