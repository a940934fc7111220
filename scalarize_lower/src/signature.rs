//! Signature expansion.
//!
//! Every `s128` parameter or return becomes `abi.lanes()` consecutive slots
//! of the ABI shape's slot type; scalar positions keep one slot. The table
//! for a whole module is built before any body is lowered, so callers and
//! callees always agree on the expanded arity.

use scalarize_ir::{FuncIndex, Module, Shape, Signature, ValueType};
use smallvec::SmallVec;
use std::ops::Range;

/// The slots one original signature position occupies after expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: usize,
    pub len: usize,
}

impl SlotRange {
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// A signature before and after expansion, with the position map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedSignature {
    pub original: Signature,
    pub lowered: Signature,
    /// Slot range of each original parameter.
    pub params: SmallVec<[SlotRange; 8]>,
    /// Slot range of each original return.
    pub returns: SmallVec<[SlotRange; 4]>,
}

impl ExpandedSignature {
    pub fn expand(signature: &Signature, abi: Shape) -> Self {
        let mut lowered = Signature::default();
        let params = expand_list(&signature.params, abi, |ty| lowered.params.push(ty));
        let returns = expand_list(&signature.returns, abi, |ty| lowered.returns.push(ty));
        ExpandedSignature {
            original: signature.clone(),
            lowered,
            params: params.into_iter().collect(),
            returns: returns.into_iter().collect(),
        }
    }

    /// Whether expansion changed anything.
    pub fn is_changed(&self) -> bool {
        self.original != self.lowered
    }
}

fn expand_list(
    types: &[ValueType],
    abi: Shape,
    mut push: impl FnMut(ValueType),
) -> SmallVec<[SlotRange; 8]> {
    let mut next = 0;
    types
        .iter()
        .map(|&ty| {
            let len = if ty.is_vector() {
                for _ in 0..abi.lanes() {
                    push(abi.slot_type());
                }
                abi.lanes()
            } else {
                push(ty);
                1
            };
            let range = SlotRange { start: next, len };
            next += len;
            range
        })
        .collect()
}

/// Expanded signatures of every function in a module.
#[derive(Debug, Clone)]
pub struct SignatureTable {
    abi: Shape,
    entries: Vec<ExpandedSignature>,
    original: Vec<Signature>,
    lowered: Vec<Signature>,
}

impl SignatureTable {
    pub fn build(module: &Module, abi: Shape) -> Self {
        let entries: Vec<ExpandedSignature> = module
            .functions()
            .iter()
            .map(|f| ExpandedSignature::expand(&f.signature, abi))
            .collect();
        let original = entries.iter().map(|e| e.original.clone()).collect();
        let lowered = entries.iter().map(|e| e.lowered.clone()).collect();
        SignatureTable {
            abi,
            entries,
            original,
            lowered,
        }
    }

    pub fn abi(&self) -> Shape {
        self.abi
    }

    pub fn get(&self, function: FuncIndex) -> Option<&ExpandedSignature> {
        self.entries.get(function.as_usize())
    }

    /// Signatures before expansion, indexed by function.
    pub fn original_signatures(&self) -> &[Signature] {
        &self.original
    }

    /// Signatures after expansion, indexed by function.
    pub fn lowered_signatures(&self) -> &[Signature] {
        &self.lowered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ValueType::{Float32 as F, Int32 as I, Simd128 as S};

    #[test]
    fn test_expand_maps_positions() {
        let sig = Signature::new(&[I, S, F], &[S]);
        let expanded = ExpandedSignature::expand(&sig, Shape::I32X4);

        assert!(expanded.is_changed());
        assert_eq!(expanded.lowered.params.as_slice(), &[I, I, I, I, I, F]);
        assert_eq!(expanded.lowered.returns.as_slice(), &[I, I, I, I]);
        assert_eq!(expanded.params[1], SlotRange { start: 1, len: 4 });
        assert_eq!(expanded.params[2].range(), 5..6);
        assert_eq!(expanded.returns[0].range(), 0..4);
    }

    #[test]
    fn test_float_abi() {
        let sig = Signature::new(&[S], &[]);
        let expanded = ExpandedSignature::expand(&sig, Shape::F32X4);
        assert_eq!(expanded.lowered.params.as_slice(), &[F, F, F, F]);
    }

    #[test]
    fn test_scalar_signature_unchanged() {
        let sig = Signature::new(&[I, F], &[I]);
        let expanded = ExpandedSignature::expand(&sig, Shape::I32X4);
        assert!(!expanded.is_changed());
        assert_eq!(expanded.lowered, sig);
    }
}
