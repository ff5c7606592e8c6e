//! Theory identifiers.
//!
//! A theory groups the sort kinds and operators that participate in random
//! selection.  The set of enabled theories is fixed when a run starts, from
//! the CLI toggles intersected with what the backend declares via
//! [`Solver::supported_theories`](crate::Solver::supported_theories).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The theories the tester knows how to exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TheoryId {
    Array,
    Bool,
    Bv,
    Fp,
    Int,
    Quant,
    Real,
    String,
}

impl TheoryId {
    /// All theories, in stable order.
    pub const ALL: [TheoryId; 8] = [
        TheoryId::Array,
        TheoryId::Bool,
        TheoryId::Bv,
        TheoryId::Fp,
        TheoryId::Int,
        TheoryId::Quant,
        TheoryId::Real,
        TheoryId::String,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TheoryId::Array => "ARRAY",
            TheoryId::Bool => "BOOL",
            TheoryId::Bv => "BV",
            TheoryId::Fp => "FP",
            TheoryId::Int => "INT",
            TheoryId::Quant => "QUANT",
            TheoryId::Real => "REAL",
            TheoryId::String => "STRING",
        }
    }
}

impl fmt::Display for TheoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TheoryId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ARRAY" => Ok(TheoryId::Array),
            "BOOL" => Ok(TheoryId::Bool),
            "BV" => Ok(TheoryId::Bv),
            "FP" => Ok(TheoryId::Fp),
            "INT" => Ok(TheoryId::Int),
            "QUANT" => Ok(TheoryId::Quant),
            "REAL" => Ok(TheoryId::Real),
            "STRING" => Ok(TheoryId::String),
            other => Err(format!("unknown theory: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_via_str() {
        for theory in TheoryId::ALL {
            assert_eq!(theory.as_str().parse::<TheoryId>().unwrap(), theory);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("bv".parse::<TheoryId>().unwrap(), TheoryId::Bv);
        assert_eq!("Quant".parse::<TheoryId>().unwrap(), TheoryId::Quant);
        assert!("BITVEC".parse::<TheoryId>().is_err());
    }
}
