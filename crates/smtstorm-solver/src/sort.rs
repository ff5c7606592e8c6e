//! Sort kinds and sort construction parameters.

use crate::solver::SortHandle;
use crate::theory::TheoryId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse classification of sorts.
///
/// The kind is what the tester samples on: "give me a term of BV sort at
/// this scope level" never needs the concrete width, only the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SortKind {
    Array,
    Bool,
    Bv,
    Fp,
    Int,
    Real,
    Reglan,
    Rm,
    String,
}

impl SortKind {
    /// All sort kinds, in stable order.
    pub const ALL: [SortKind; 9] = [
        SortKind::Array,
        SortKind::Bool,
        SortKind::Bv,
        SortKind::Fp,
        SortKind::Int,
        SortKind::Real,
        SortKind::Reglan,
        SortKind::Rm,
        SortKind::String,
    ];

    /// The theory owning sorts of this kind.
    pub fn theory(&self) -> TheoryId {
        match self {
            SortKind::Array => TheoryId::Array,
            SortKind::Bool => TheoryId::Bool,
            SortKind::Bv => TheoryId::Bv,
            SortKind::Fp | SortKind::Rm => TheoryId::Fp,
            SortKind::Int => TheoryId::Int,
            SortKind::Real => TheoryId::Real,
            SortKind::Reglan | SortKind::String => TheoryId::String,
        }
    }

    /// True if sorts of this kind take construction parameters.
    pub fn is_parameterized(&self) -> bool {
        matches!(self, SortKind::Bv | SortKind::Fp | SortKind::Array)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKind::Array => "ARRAY",
            SortKind::Bool => "BOOL",
            SortKind::Bv => "BV",
            SortKind::Fp => "FP",
            SortKind::Int => "INT",
            SortKind::Real => "REAL",
            SortKind::Reglan => "REGLAN",
            SortKind::Rm => "RM",
            SortKind::String => "STRING",
        }
    }
}

impl fmt::Display for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARRAY" => Ok(SortKind::Array),
            "BOOL" => Ok(SortKind::Bool),
            "BV" => Ok(SortKind::Bv),
            "FP" => Ok(SortKind::Fp),
            "INT" => Ok(SortKind::Int),
            "REAL" => Ok(SortKind::Real),
            "REGLAN" => Ok(SortKind::Reglan),
            "RM" => Ok(SortKind::Rm),
            "STRING" => Ok(SortKind::String),
            other => Err(format!("unknown sort kind: {}", other)),
        }
    }
}

/// Construction parameters for parameterized sorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortParams {
    /// Sorts without parameters (Bool, Int, Real, String, RegLan, RM).
    None,
    /// Bit-vector width in bits.
    Bv { width: u32 },
    /// Floating-point exponent and significand widths.
    Fp { eb: u32, sb: u32 },
    /// Array index and element sorts, by adapter handle.
    Array {
        index: SortHandle,
        element: SortHandle,
    },
}

impl SortParams {
    /// The bit-vector width, if this is a BV parameter set.
    pub fn bv_width(&self) -> Option<u32> {
        match self {
            SortParams::Bv { width } => Some(*width),
            _ => None,
        }
    }

    /// The FP (eb, sb) pair, if this is an FP parameter set.
    pub fn fp_format(&self) -> Option<(u32, u32)> {
        match self {
            SortParams::Fp { eb, sb } => Some((*eb, *sb)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_via_str() {
        for kind in SortKind::ALL {
            assert_eq!(kind.as_str().parse::<SortKind>().unwrap(), kind);
        }
    }

    #[test]
    fn theory_assignment() {
        assert_eq!(SortKind::Rm.theory(), TheoryId::Fp);
        assert_eq!(SortKind::Reglan.theory(), TheoryId::String);
        assert_eq!(SortKind::Array.theory(), TheoryId::Array);
    }

    #[test]
    fn parameterized_kinds() {
        assert!(SortKind::Bv.is_parameterized());
        assert!(SortKind::Fp.is_parameterized());
        assert!(SortKind::Array.is_parameterized());
        assert!(!SortKind::Bool.is_parameterized());
        assert!(!SortKind::Rm.is_parameterized());
    }
}
