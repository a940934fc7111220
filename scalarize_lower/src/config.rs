//! Lowering configuration.

use crate::error::{LowerError, LowerResult};
use scalarize_ir::{LaneKind, Shape};

/// Configuration for [`crate::ScalarLowering`].
#[derive(Debug, Clone)]
pub struct LoweringConfig {
    /// Shape vector parameters and returns are passed in. Every `s128`
    /// position of a signature becomes `abi_shape.lanes()` slots of
    /// `abi_shape.slot_type()`.
    pub abi_shape: Shape,

    /// Verify each input graph before lowering it.
    pub verify_input: bool,

    /// Verify each lowered graph, including that no vector remains.
    pub verify_output: bool,

    /// Record the slot nodes of every original vector node.
    pub record_origins: bool,

    /// Lower functions on the rayon thread pool.
    pub parallel: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            abi_shape: Shape::I32X4,
            verify_input: true,
            verify_output: true,
            record_origins: true,
            parallel: false,
        }
    }
}

impl LoweringConfig {
    /// Verify everything, lower sequentially.
    pub fn checked() -> Self {
        Self {
            verify_input: true,
            verify_output: true,
            record_origins: true,
            parallel: false,
            ..Default::default()
        }
    }

    /// Skip verification and bookkeeping, lower in parallel.
    pub fn fast() -> Self {
        Self {
            verify_input: false,
            verify_output: false,
            record_origins: false,
            parallel: true,
            ..Default::default()
        }
    }

    /// Use an ABI shape given by its raw partition.
    pub fn with_abi(mut self, lanes: u8, lane_bits: u8, kind: LaneKind) -> LowerResult<Self> {
        self.abi_shape = Shape::new(lanes, lane_bits, kind)?;
        Ok(self)
    }

    /// Reject configurations the pass cannot honour.
    pub fn validate(&self) -> LowerResult<()> {
        if self.abi_shape.lane_bits() != 32 {
            return Err(LowerError::Config(format!(
                "ABI shape {} must have 32-bit slots",
                self.abi_shape
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(LoweringConfig::default().validate().is_ok());
        assert!(LoweringConfig::checked().verify_output);
        let fast = LoweringConfig::fast();
        assert!(fast.parallel);
        assert!(!fast.verify_input);
        assert_eq!(fast.abi_shape, Shape::I32X4);
    }

    #[test]
    fn test_abi_shape_validation() {
        let narrow = LoweringConfig::default().with_abi(8, 16, LaneKind::Int);
        assert!(matches!(
            narrow.map(|c| c.validate()),
            Ok(Err(LowerError::Config(_)))
        ));

        let malformed = LoweringConfig::default().with_abi(4, 16, LaneKind::Int);
        assert!(matches!(malformed, Err(LowerError::MalformedShape(_))));

        let float = LoweringConfig::default().with_abi(4, 32, LaneKind::Float);
        assert!(matches!(float.map(|c| c.validate()), Ok(Ok(()))));
    }
}
