//! Modules: functions, globals and the metadata passes attach to them.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::shape::Shape;
use crate::signature::Signature;
use crate::types::ValueType;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;

// =============================================================================
// Indices
// =============================================================================

/// Index of a function within its module.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncIndex(pub u32);

impl FuncIndex {
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for FuncIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

impl fmt::Display for FuncIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

// =============================================================================
// Globals
// =============================================================================

/// A mutable global, stored as zero-initialised bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Global {
    pub ty: ValueType,
}

impl Global {
    /// Storage size in bytes.
    pub fn size(&self) -> usize {
        self.ty.size_bytes().unwrap_or(0)
    }
}

// =============================================================================
// Lowering Metadata
// =============================================================================

/// Where one original vector value went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorOrigin {
    /// Shape the value was lowered in.
    pub shape: Shape,
    /// Scalar nodes holding lanes `0..shape.lanes()`, in the lowered graph.
    pub slots: SmallVec<[NodeId; 16]>,
}

/// Bookkeeping left on a function by vector lowering.
#[derive(Debug, Clone, Default)]
pub struct LoweringRecord {
    /// Signature before expansion.
    pub original_signature: Signature,
    /// Original vector node to its scalar slots.
    pub origins: FxHashMap<NodeId, VectorOrigin>,
}

// =============================================================================
// Functions
// =============================================================================

#[derive(Clone)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub graph: Graph,
    /// Present once the function has been lowered to scalars.
    pub lowering: Option<LoweringRecord>,
}

impl Function {
    pub fn new(name: impl Into<String>, signature: Signature, graph: Graph) -> Self {
        Function {
            name: name.into(),
            signature,
            graph,
            lowering: None,
        }
    }

    /// Whether the signature or the body mentions a vector.
    pub fn has_vectors(&self) -> bool {
        self.signature.has_vectors() || self.graph.contains_vectors()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {}{}", self.name, self.signature)?;
        write!(f, "{:?}", self.graph)
    }
}

// =============================================================================
// Module
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Module {
    functions: Vec<Function>,
    globals: Vec<Global>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a global; returns its index.
    pub fn add_global(&mut self, ty: ValueType) -> u32 {
        self.globals.push(Global { ty });
        (self.globals.len() - 1) as u32
    }

    pub fn add_function(&mut self, function: Function) -> FuncIndex {
        self.functions.push(function);
        FuncIndex((self.functions.len() - 1) as u32)
    }

    pub fn function(&self, index: FuncIndex) -> Option<&Function> {
        self.functions.get(index.as_usize())
    }

    pub fn function_mut(&mut self, index: FuncIndex) -> Option<&mut Function> {
        self.functions.get_mut(index.as_usize())
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Look a function up by name.
    pub fn find(&self, name: &str) -> Option<FuncIndex> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(|i| FuncIndex(i as u32))
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    pub fn global(&self, index: u32) -> Option<&Global> {
        self.globals.get(index as usize)
    }

    /// Current signatures of every function, by index.
    pub fn signatures(&self) -> Vec<Signature> {
        self.functions.iter().map(|f| f.signature.clone()).collect()
    }

    /// Check every function against the IR invariants.
    pub fn verify(&self) -> Result<(), crate::verify::VerifyError> {
        let signatures = self.signatures();
        let verifier = crate::verify::Verifier::new(&self.globals, &signatures);
        for (index, function) in self.functions.iter().enumerate() {
            verifier
                .verify(&function.signature, &function.graph)
                .map_err(|e| e.in_function(FuncIndex(index as u32)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_indices() {
        let mut module = Module::new();
        let g = module.add_global(ValueType::Simd128);
        assert_eq!(g, 0);
        assert_eq!(module.global(g).map(Global::size), Some(16));

        let f = module.add_function(Function::new("f", Signature::default(), Graph::new()));
        let h = module.add_function(Function::new("h", Signature::default(), Graph::new()));
        assert_eq!(f, FuncIndex(0));
        assert_eq!(module.find("h"), Some(h));
        assert_eq!(module.find("missing"), None);
        assert_eq!(h.to_string(), "fn1");
    }
}
