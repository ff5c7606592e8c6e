//! Operator kinds and their static metadata.
//!
//! [`OpKind`] is the closed enumeration of abstract operators the tester can
//! generate, spanning the theories Bool, Array, BV, FP, Int, Real,
//! quantifiers, and Strings/RegLan.  Metadata lives in a pure function
//! ([`OpKind::op`]) instead of a runtime table: the match compiles to a
//! jump table and there is nothing to initialize or keep in sync.
//!
//! The string form of each kind (see [`OpKind::as_str`]) is the token used
//! in trace files and must stay stable.

use crate::sort::SortKind;
use crate::theory::TheoryId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares the `OpKind` enum together with its stable string form.
macro_rules! op_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Abstract operator kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
                 Serialize, Deserialize)]
        pub enum OpKind {
            $($variant),+
        }

        impl OpKind {
            /// All operator kinds, in stable order.
            pub const ALL: &'static [OpKind] = &[$(OpKind::$variant),+];

            /// The stable token used in trace files.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(OpKind::$variant => $name),+
                }
            }
        }

        impl FromStr for OpKind {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(OpKind::$variant),)+
                    other => Err(format!("unknown op kind: {}", other)),
                }
            }
        }
    };
}

op_kinds! {
    // Special cases
    Distinct => "DISTINCT",
    Equal => "EQUAL",
    Ite => "ITE",

    // Arrays
    ArraySelect => "ARRAY_SELECT",
    ArrayStore => "ARRAY_STORE",

    // Boolean
    And => "AND",
    Iff => "IFF",
    Implies => "IMPLIES",
    Not => "NOT",
    Or => "OR",
    Xor => "XOR",

    // BV, parameterized
    BvExtract => "BV_EXTRACT",
    BvRepeat => "BV_REPEAT",
    BvRotateLeft => "BV_ROTATE_LEFT",
    BvRotateRight => "BV_ROTATE_RIGHT",
    BvSignExtend => "BV_SIGN_EXTEND",
    BvZeroExtend => "BV_ZERO_EXTEND",

    // BV
    BvAdd => "BV_ADD",
    BvAnd => "BV_AND",
    BvAshr => "BV_ASHR",
    BvComp => "BV_COMP",
    BvConcat => "BV_CONCAT",
    BvDec => "BV_DEC",
    BvInc => "BV_INC",
    BvLshr => "BV_LSHR",
    BvMult => "BV_MULT",
    BvNand => "BV_NAND",
    BvNeg => "BV_NEG",
    BvNor => "BV_NOR",
    BvNot => "BV_NOT",
    BvOr => "BV_OR",
    BvRedAnd => "BV_REDAND",
    BvRedOr => "BV_REDOR",
    BvRedXor => "BV_REDXOR",
    BvSaddo => "BV_SADDO",
    BvSdiv => "BV_SDIV",
    BvSdivo => "BV_SDIVO",
    BvSge => "BV_SGE",
    BvSgt => "BV_SGT",
    BvShl => "BV_SHL",
    BvSle => "BV_SLE",
    BvSlt => "BV_SLT",
    BvSmod => "BV_SMOD",
    BvSmulo => "BV_SMULO",
    BvSrem => "BV_SREM",
    BvSsubo => "BV_SSUBO",
    BvSub => "BV_SUB",
    BvUaddo => "BV_UADDO",
    BvUdiv => "BV_UDIV",
    BvUge => "BV_UGE",
    BvUgt => "BV_UGT",
    BvUle => "BV_ULE",
    BvUlt => "BV_ULT",
    BvUmulo => "BV_UMULO",
    BvUrem => "BV_UREM",
    BvUsubo => "BV_USUBO",
    BvXnor => "BV_XNOR",
    BvXor => "BV_XOR",

    // FP conversions
    FpToFpFromBv => "FP_TO_FP_FROM_BV",
    FpToFpFromFp => "FP_TO_FP_FROM_FP",
    FpToFpFromIntBv => "FP_TO_FP_FROM_INT_BV",
    FpToFpFromReal => "FP_TO_FP_FROM_REAL",
    FpToFpFromUintBv => "FP_TO_FP_FROM_UINT_BV",
    FpToSbv => "FP_TO_SBV",
    FpToUbv => "FP_TO_UBV",

    // FP
    FpAbs => "FP_ABS",
    FpAdd => "FP_ADD",
    FpDiv => "FP_DIV",
    FpEq => "FP_EQ",
    FpFma => "FP_FMA",
    FpFp => "FP_FP",
    FpGt => "FP_GT",
    FpGte => "FP_GTE",
    FpIsInf => "FP_IS_INF",
    FpIsNan => "FP_IS_NAN",
    FpIsNeg => "FP_IS_NEG",
    FpIsNormal => "FP_IS_NORMAL",
    FpIsPos => "FP_IS_POS",
    FpIsSubnormal => "FP_IS_SUBNORMAL",
    FpIsZero => "FP_IS_ZERO",
    FpLt => "FP_LT",
    FpLte => "FP_LTE",
    FpMax => "FP_MAX",
    FpMin => "FP_MIN",
    FpMul => "FP_MUL",
    FpNeg => "FP_NEG",
    FpRem => "FP_REM",
    FpRti => "FP_RTI",
    FpSqrt => "FP_SQRT",
    FpSub => "FP_SUB",
    FpToReal => "FP_TO_REAL",

    // Ints
    IntAbs => "INT_ABS",
    IntAdd => "INT_ADD",
    IntDiv => "INT_DIV",
    IntGt => "INT_GT",
    IntGte => "INT_GTE",
    IntIsDiv => "INT_IS_DIV",
    IntLt => "INT_LT",
    IntLte => "INT_LTE",
    IntMod => "INT_MOD",
    IntMul => "INT_MUL",
    IntNeg => "INT_NEG",
    IntSub => "INT_SUB",

    // Reals
    RealAdd => "REAL_ADD",
    RealDiv => "REAL_DIV",
    RealGt => "REAL_GT",
    RealGte => "REAL_GTE",
    RealLt => "REAL_LT",
    RealLte => "REAL_LTE",
    RealMul => "REAL_MUL",
    RealNeg => "REAL_NEG",
    RealSub => "REAL_SUB",

    // Quantifiers
    Exists => "EXISTS",
    Forall => "FORALL",

    // Strings and regular languages
    ReComp => "RE_COMP",
    ReConcat => "RE_CONCAT",
    ReDiff => "RE_DIFF",
    ReInter => "RE_INTER",
    ReLoop => "RE_LOOP",
    ReOpt => "RE_OPT",
    RePlus => "RE_PLUS",
    RePow => "RE_POW",
    ReRange => "RE_RANGE",
    ReStar => "RE_STAR",
    ReUnion => "RE_UNION",
    StrAt => "STR_AT",
    StrConcat => "STR_CONCAT",
    StrContains => "STR_CONTAINS",
    StrFromCode => "STR_FROM_CODE",
    StrFromInt => "STR_FROM_INT",
    StrIndexof => "STR_INDEXOF",
    StrInRe => "STR_IN_RE",
    StrIsDigit => "STR_IS_DIGIT",
    StrLe => "STR_LE",
    StrLen => "STR_LEN",
    StrLt => "STR_LT",
    StrPrefixof => "STR_PREFIXOF",
    StrReplace => "STR_REPLACE",
    StrReplaceAll => "STR_REPLACE_ALL",
    StrReplaceRe => "STR_REPLACE_RE",
    StrReplaceReAll => "STR_REPLACE_RE_ALL",
    StrSubstr => "STR_SUBSTR",
    StrSuffixof => "STR_SUFFIXOF",
    StrToCode => "STR_TO_CODE",
    StrToInt => "STR_TO_INT",
    StrToRe => "STR_TO_RE",
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly `n` arguments.
    Exact(u32),
    /// Variadic with at least `n` arguments.
    AtLeast(u32),
}

impl Arity {
    /// The minimum number of arguments.
    pub fn min(&self) -> u32 {
        match self {
            Arity::Exact(n) | Arity::AtLeast(n) => *n,
        }
    }

    /// True if `n` arguments are acceptable.
    pub fn admits(&self, n: u32) -> bool {
        match self {
            Arity::Exact(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
        }
    }
}

/// How argument sorts are chosen for an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgsPattern {
    /// Ordered sort kinds; if shorter than the arity the last entry repeats.
    Kinds(&'static [SortKind]),
    /// All arguments share one arbitrary sort (EQUAL, DISTINCT).
    SameAny,
    /// Bool condition followed by two arguments of one shared sort.
    Ite,
    /// Arguments tied to a picked array sort (select/store).
    Array,
    /// Bound variables followed by a Bool body.
    Quant,
}

/// Static metadata for one operator kind.
#[derive(Debug, Clone, Copy)]
pub struct Op {
    pub kind: OpKind,
    pub arity: Arity,
    /// Number of integer parameters (e.g. 2 for BV_EXTRACT).
    pub nparams: u32,
    /// Result sort kind; `None` when the result sort is determined by the
    /// arguments (ITE, array select/store).
    pub result: Option<SortKind>,
    pub args: ArgsPattern,
    pub theory: TheoryId,
}

impl OpKind {
    /// Static metadata for this kind.
    pub fn op(self) -> Op {
        use ArgsPattern as P;
        use Arity::{AtLeast, Exact};
        use SortKind::*;

        let (arity, nparams, result, args, theory) = match self {
            // Special cases
            OpKind::Distinct => (AtLeast(2), 0, Some(Bool), P::SameAny, TheoryId::Bool),
            OpKind::Equal => (AtLeast(2), 0, Some(Bool), P::SameAny, TheoryId::Bool),
            OpKind::Ite => (Exact(3), 0, None, P::Ite, TheoryId::Bool),

            // Arrays
            OpKind::ArraySelect => (Exact(2), 0, None, P::Array, TheoryId::Array),
            OpKind::ArrayStore => (Exact(3), 0, None, P::Array, TheoryId::Array),

            // Boolean
            OpKind::And | OpKind::Or => {
                (AtLeast(2), 0, Some(Bool), P::Kinds(&[Bool]), TheoryId::Bool)
            }
            OpKind::Iff | OpKind::Implies | OpKind::Xor => {
                (Exact(2), 0, Some(Bool), P::Kinds(&[Bool]), TheoryId::Bool)
            }
            OpKind::Not => (Exact(1), 0, Some(Bool), P::Kinds(&[Bool]), TheoryId::Bool),

            // BV, parameterized
            OpKind::BvExtract => (Exact(1), 2, Some(Bv), P::Kinds(&[Bv]), TheoryId::Bv),
            OpKind::BvRepeat
            | OpKind::BvRotateLeft
            | OpKind::BvRotateRight
            | OpKind::BvSignExtend
            | OpKind::BvZeroExtend => (Exact(1), 1, Some(Bv), P::Kinds(&[Bv]), TheoryId::Bv),

            // BV unary
            OpKind::BvDec | OpKind::BvInc | OpKind::BvNeg | OpKind::BvNot => {
                (Exact(1), 0, Some(Bv), P::Kinds(&[Bv]), TheoryId::Bv)
            }
            OpKind::BvRedAnd | OpKind::BvRedOr | OpKind::BvRedXor => {
                (Exact(1), 0, Some(Bv), P::Kinds(&[Bv]), TheoryId::Bv)
            }

            // BV binary, BV-sorted result
            OpKind::BvAdd
            | OpKind::BvAnd
            | OpKind::BvAshr
            | OpKind::BvComp
            | OpKind::BvLshr
            | OpKind::BvMult
            | OpKind::BvNand
            | OpKind::BvNor
            | OpKind::BvOr
            | OpKind::BvSdiv
            | OpKind::BvShl
            | OpKind::BvSmod
            | OpKind::BvSrem
            | OpKind::BvSub
            | OpKind::BvUdiv
            | OpKind::BvUrem
            | OpKind::BvXnor
            | OpKind::BvXor => (Exact(2), 0, Some(Bv), P::Kinds(&[Bv]), TheoryId::Bv),
            OpKind::BvConcat => (AtLeast(2), 0, Some(Bv), P::Kinds(&[Bv]), TheoryId::Bv),

            // BV binary predicates
            OpKind::BvSaddo
            | OpKind::BvSdivo
            | OpKind::BvSge
            | OpKind::BvSgt
            | OpKind::BvSle
            | OpKind::BvSlt
            | OpKind::BvSmulo
            | OpKind::BvSsubo
            | OpKind::BvUaddo
            | OpKind::BvUge
            | OpKind::BvUgt
            | OpKind::BvUle
            | OpKind::BvUlt
            | OpKind::BvUmulo
            | OpKind::BvUsubo => (Exact(2), 0, Some(Bool), P::Kinds(&[Bv]), TheoryId::Bv),

            // FP conversions
            OpKind::FpToFpFromBv => (Exact(1), 2, Some(Fp), P::Kinds(&[Bv]), TheoryId::Fp),
            OpKind::FpToFpFromIntBv | OpKind::FpToFpFromUintBv => {
                (Exact(2), 2, Some(Fp), P::Kinds(&[Rm, Bv]), TheoryId::Fp)
            }
            OpKind::FpToFpFromFp => (Exact(2), 2, Some(Fp), P::Kinds(&[Rm, Fp]), TheoryId::Fp),
            OpKind::FpToFpFromReal => (Exact(2), 2, Some(Fp), P::Kinds(&[Rm, Real]), TheoryId::Fp),
            OpKind::FpToSbv | OpKind::FpToUbv => {
                (Exact(2), 1, Some(Bv), P::Kinds(&[Rm, Fp]), TheoryId::Fp)
            }

            // FP
            OpKind::FpAbs | OpKind::FpNeg => (Exact(1), 0, Some(Fp), P::Kinds(&[Fp]), TheoryId::Fp),
            OpKind::FpAdd | OpKind::FpDiv | OpKind::FpMul | OpKind::FpSub => {
                (Exact(3), 0, Some(Fp), P::Kinds(&[Rm, Fp]), TheoryId::Fp)
            }
            OpKind::FpFma => (Exact(4), 0, Some(Fp), P::Kinds(&[Rm, Fp]), TheoryId::Fp),
            OpKind::FpSqrt | OpKind::FpRti => {
                (Exact(2), 0, Some(Fp), P::Kinds(&[Rm, Fp]), TheoryId::Fp)
            }
            OpKind::FpRem | OpKind::FpMax | OpKind::FpMin => {
                (Exact(2), 0, Some(Fp), P::Kinds(&[Fp]), TheoryId::Fp)
            }
            OpKind::FpEq
            | OpKind::FpGt
            | OpKind::FpGte
            | OpKind::FpLt
            | OpKind::FpLte => (Exact(2), 0, Some(Bool), P::Kinds(&[Fp]), TheoryId::Fp),
            OpKind::FpIsInf
            | OpKind::FpIsNan
            | OpKind::FpIsNeg
            | OpKind::FpIsNormal
            | OpKind::FpIsPos
            | OpKind::FpIsSubnormal
            | OpKind::FpIsZero => (Exact(1), 0, Some(Bool), P::Kinds(&[Fp]), TheoryId::Fp),
            // (fp sign exponent significand), three BV slices
            OpKind::FpFp => (Exact(3), 0, Some(Fp), P::Kinds(&[Bv]), TheoryId::Fp),
            OpKind::FpToReal => (Exact(1), 0, Some(Real), P::Kinds(&[Fp]), TheoryId::Fp),

            // Ints
            OpKind::IntAbs | OpKind::IntNeg => {
                (Exact(1), 0, Some(Int), P::Kinds(&[Int]), TheoryId::Int)
            }
            OpKind::IntAdd | OpKind::IntMul | OpKind::IntSub => {
                (AtLeast(2), 0, Some(Int), P::Kinds(&[Int]), TheoryId::Int)
            }
            OpKind::IntDiv | OpKind::IntMod => {
                (Exact(2), 0, Some(Int), P::Kinds(&[Int]), TheoryId::Int)
            }
            OpKind::IntGt | OpKind::IntGte | OpKind::IntLt | OpKind::IntLte => {
                (Exact(2), 0, Some(Bool), P::Kinds(&[Int]), TheoryId::Int)
            }
            OpKind::IntIsDiv => (Exact(1), 1, Some(Bool), P::Kinds(&[Int]), TheoryId::Int),

            // Reals
            OpKind::RealNeg => (Exact(1), 0, Some(Real), P::Kinds(&[Real]), TheoryId::Real),
            OpKind::RealAdd | OpKind::RealMul | OpKind::RealSub => {
                (AtLeast(2), 0, Some(Real), P::Kinds(&[Real]), TheoryId::Real)
            }
            OpKind::RealDiv => (Exact(2), 0, Some(Real), P::Kinds(&[Real]), TheoryId::Real),
            OpKind::RealGt | OpKind::RealGte | OpKind::RealLt | OpKind::RealLte => {
                (Exact(2), 0, Some(Bool), P::Kinds(&[Real]), TheoryId::Real)
            }

            // Quantifiers
            OpKind::Exists | OpKind::Forall => {
                (AtLeast(2), 0, Some(Bool), P::Quant, TheoryId::Quant)
            }

            // Strings / RegLan
            OpKind::StrConcat => {
                (AtLeast(2), 0, Some(String), P::Kinds(&[String]), TheoryId::String)
            }
            OpKind::StrLen => (Exact(1), 0, Some(Int), P::Kinds(&[String]), TheoryId::String),
            OpKind::StrLt | OpKind::StrLe => {
                (Exact(2), 0, Some(Bool), P::Kinds(&[String]), TheoryId::String)
            }
            OpKind::StrToRe => (Exact(1), 0, Some(Reglan), P::Kinds(&[String]), TheoryId::String),
            OpKind::StrInRe => {
                (Exact(2), 0, Some(Bool), P::Kinds(&[String, Reglan]), TheoryId::String)
            }
            OpKind::ReConcat | OpKind::ReInter | OpKind::ReUnion => {
                (AtLeast(2), 0, Some(Reglan), P::Kinds(&[Reglan]), TheoryId::String)
            }
            OpKind::ReDiff => (Exact(2), 0, Some(Reglan), P::Kinds(&[Reglan]), TheoryId::String),
            OpKind::ReComp | OpKind::ReOpt | OpKind::RePlus | OpKind::ReStar => {
                (Exact(1), 0, Some(Reglan), P::Kinds(&[Reglan]), TheoryId::String)
            }
            // Both ends are length-1 string values.
            OpKind::ReRange => {
                (Exact(2), 0, Some(Reglan), P::Kinds(&[String]), TheoryId::String)
            }
            OpKind::RePow => (Exact(1), 1, Some(Reglan), P::Kinds(&[Reglan]), TheoryId::String),
            OpKind::ReLoop => (Exact(1), 2, Some(Reglan), P::Kinds(&[Reglan]), TheoryId::String),
            OpKind::StrAt => {
                (Exact(2), 0, Some(String), P::Kinds(&[String, Int]), TheoryId::String)
            }
            OpKind::StrSubstr => {
                (Exact(3), 0, Some(String), P::Kinds(&[String, Int]), TheoryId::String)
            }
            OpKind::StrContains | OpKind::StrPrefixof | OpKind::StrSuffixof => {
                (Exact(2), 0, Some(Bool), P::Kinds(&[String]), TheoryId::String)
            }
            OpKind::StrIndexof => {
                (Exact(3), 0, Some(Int), P::Kinds(&[String, String, Int]), TheoryId::String)
            }
            OpKind::StrReplace | OpKind::StrReplaceAll => {
                (Exact(3), 0, Some(String), P::Kinds(&[String]), TheoryId::String)
            }
            OpKind::StrReplaceRe | OpKind::StrReplaceReAll => (
                Exact(3),
                0,
                Some(String),
                P::Kinds(&[String, Reglan, String]),
                TheoryId::String,
            ),
            OpKind::StrIsDigit => (Exact(1), 0, Some(Bool), P::Kinds(&[String]), TheoryId::String),
            OpKind::StrToCode | OpKind::StrToInt => {
                (Exact(1), 0, Some(Int), P::Kinds(&[String]), TheoryId::String)
            }
            OpKind::StrFromCode | OpKind::StrFromInt => {
                (Exact(1), 0, Some(String), P::Kinds(&[Int]), TheoryId::String)
            }
        };

        Op {
            kind: self,
            arity,
            nparams,
            result,
            args,
            theory,
        }
    }
}

impl Op {
    /// The sort kind expected at argument position `i`.
    ///
    /// Only meaningful for the `Kinds` pattern; the last entry repeats for
    /// variadic tails.
    pub fn arg_kind(&self, i: usize) -> Option<SortKind> {
        match self.args {
            ArgsPattern::Kinds(kinds) => {
                Some(*kinds.get(i).unwrap_or(kinds.last().expect("non-empty pattern")))
            }
            _ => None,
        }
    }

    /// The distinct sort kinds appearing in a `Kinds` pattern.
    pub fn arg_kind_set(&self) -> &'static [SortKind] {
        match self.args {
            ArgsPattern::Kinds(kinds) => kinds,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_metadata() {
        for kind in OpKind::ALL {
            let op = kind.op();
            assert_eq!(op.kind, *kind);
            assert!(op.arity.min() >= 1, "{} has zero arity", kind);
        }
    }

    #[test]
    fn roundtrip_via_str() {
        for kind in OpKind::ALL {
            assert_eq!(kind.as_str().parse::<OpKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn catalogue_is_large_and_duplicate_free() {
        let mut names: Vec<&str> = OpKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OpKind::ALL.len());
        assert!(OpKind::ALL.len() > 140);
    }

    #[test]
    fn parameterized_bv_ops() {
        assert_eq!(OpKind::BvExtract.op().nparams, 2);
        assert_eq!(OpKind::BvRepeat.op().nparams, 1);
        assert_eq!(OpKind::BvZeroExtend.op().nparams, 1);
        assert_eq!(OpKind::ReLoop.op().nparams, 2);
    }

    #[test]
    fn arg_kind_repeats_last_entry() {
        let op = OpKind::FpFma.op();
        assert_eq!(op.arg_kind(0), Some(SortKind::Rm));
        assert_eq!(op.arg_kind(1), Some(SortKind::Fp));
        assert_eq!(op.arg_kind(3), Some(SortKind::Fp));
    }

    #[test]
    fn arity_admits() {
        assert!(Arity::Exact(2).admits(2));
        assert!(!Arity::Exact(2).admits(3));
        assert!(Arity::AtLeast(2).admits(5));
        assert!(!Arity::AtLeast(2).admits(1));
    }
}
