//! Function signatures.

use crate::types::ValueType;
use smallvec::SmallVec;
use std::fmt;

/// Parameter and return types of a function.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: SmallVec<[ValueType; 8]>,
    pub returns: SmallVec<[ValueType; 4]>,
}

impl Signature {
    pub fn new(params: &[ValueType], returns: &[ValueType]) -> Self {
        Signature {
            params: SmallVec::from_slice(params),
            returns: SmallVec::from_slice(returns),
        }
    }

    /// Whether any parameter or return is a vector.
    pub fn has_vectors(&self) -> bool {
        self.params
            .iter()
            .chain(self.returns.iter())
            .any(|ty| ty.is_vector())
    }

    /// Whether every parameter and return is a 32-bit scalar.
    pub fn is_scalar(&self) -> bool {
        self.params
            .iter()
            .chain(self.returns.iter())
            .all(|ty| ty.is_scalar())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ") -> (")?;
        for (i, ty) in self.returns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_vectors() {
        let scalar = Signature::new(&[ValueType::Int32], &[ValueType::Float32]);
        assert!(!scalar.has_vectors());
        assert!(scalar.is_scalar());

        let vector = Signature::new(&[ValueType::Simd128, ValueType::Int32], &[]);
        assert!(vector.has_vectors());
        assert_eq!(vector.to_string(), "(s128, i32) -> ()");
    }
}
