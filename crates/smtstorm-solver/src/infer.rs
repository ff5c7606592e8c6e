//! Result sort inference shared by the bookkeeping backends.
//!
//! Backends that track sorts themselves (smt2, stub) all need the same
//! computation: given an operator, its integer parameters and the sorts of
//! its arguments, what is the sort of the result?  The width formulas for
//! the parameterized BV operators live here so the backends cannot drift
//! apart.

use crate::op::OpKind;
use crate::solver::{SolverError, SolverResult, SortHandle};
use crate::sort::{SortKind, SortParams};

/// A backend-internal view of a sort: kind plus construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortInfo {
    pub kind: SortKind,
    pub params: SortParams,
}

impl SortInfo {
    pub fn plain(kind: SortKind) -> Self {
        Self {
            kind,
            params: SortParams::None,
        }
    }

    pub fn bv(width: u32) -> Self {
        Self {
            kind: SortKind::Bv,
            params: SortParams::Bv { width },
        }
    }

    pub fn fp(eb: u32, sb: u32) -> Self {
        Self {
            kind: SortKind::Fp,
            params: SortParams::Fp { eb, sb },
        }
    }
}

fn bv_width(info: &SortInfo) -> SolverResult<u32> {
    info.params
        .bv_width()
        .ok_or_else(|| SolverError::failure("expected a bit-vector argument"))
}

fn arg(args: &[SortInfo], i: usize) -> SolverResult<SortInfo> {
    args.get(i)
        .copied()
        .ok_or_else(|| SolverError::failure(format!("missing argument {}", i)))
}

/// Compute the result sort of `kind` applied to `args` with `params`.
///
/// `resolve` maps a sort handle embedded in array parameters back to its
/// info (backends keep that table).
pub fn result_sort(
    kind: OpKind,
    params: &[u32],
    args: &[SortInfo],
    resolve: &dyn Fn(SortHandle) -> Option<SortInfo>,
) -> SolverResult<SortInfo> {
    let param = |i: usize| -> SolverResult<u32> {
        params
            .get(i)
            .copied()
            .ok_or_else(|| SolverError::failure(format!("missing parameter {}", i)))
    };

    let info = match kind {
        OpKind::Ite => arg(args, 1)?,
        OpKind::ArraySelect => {
            let array = arg(args, 0)?;
            match array.params {
                SortParams::Array { element, .. } => resolve(element)
                    .ok_or_else(|| SolverError::failure("unknown array element sort"))?,
                _ => return Err(SolverError::failure("select on a non-array sort")),
            }
        }
        OpKind::ArrayStore => arg(args, 0)?,

        OpKind::BvExtract => {
            let (hi, lo) = (param(0)?, param(1)?);
            if hi < lo {
                return Err(SolverError::failure("extract with hi < lo"));
            }
            SortInfo::bv(hi - lo + 1)
        }
        OpKind::BvRepeat => SortInfo::bv(bv_width(&arg(args, 0)?)? * param(0)?.max(1)),
        OpKind::BvRotateLeft | OpKind::BvRotateRight => SortInfo::bv(bv_width(&arg(args, 0)?)?),
        OpKind::BvSignExtend | OpKind::BvZeroExtend => {
            SortInfo::bv(bv_width(&arg(args, 0)?)? + param(0)?)
        }
        OpKind::BvComp => SortInfo::bv(1),
        OpKind::BvConcat => {
            let mut width = 0;
            for a in args {
                width += bv_width(a)?;
            }
            SortInfo::bv(width)
        }

        OpKind::FpToFpFromBv
        | OpKind::FpToFpFromFp
        | OpKind::FpToFpFromIntBv
        | OpKind::FpToFpFromReal
        | OpKind::FpToFpFromUintBv => SortInfo::fp(param(0)?, param(1)?),
        OpKind::FpToSbv | OpKind::FpToUbv => SortInfo::bv(param(0)?),
        // (fp sign exp sig): eb is the exponent slice width, sb counts the
        // hidden bit on top of the significand slice.
        OpKind::FpFp => {
            let eb = bv_width(&arg(args, 1)?)?;
            let sb = bv_width(&arg(args, 2)?)? + 1;
            SortInfo::fp(eb, sb)
        }
        OpKind::FpAbs | OpKind::FpNeg => arg(args, 0)?,
        OpKind::FpAdd
        | OpKind::FpDiv
        | OpKind::FpFma
        | OpKind::FpMul
        | OpKind::FpRti
        | OpKind::FpSqrt
        | OpKind::FpSub => arg(args, 1)?,
        OpKind::FpMax | OpKind::FpMin | OpKind::FpRem => arg(args, 0)?,

        other => {
            let result = other
                .op()
                .result
                .ok_or_else(|| SolverError::failure("operator without static result kind"))?;
            SortInfo::plain(result)
        }
    };
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_resolve(_: SortHandle) -> Option<SortInfo> {
        None
    }

    #[test]
    fn extract_width() {
        let r = result_sort(OpKind::BvExtract, &[7, 4], &[SortInfo::bv(32)], &no_resolve).unwrap();
        assert_eq!(r, SortInfo::bv(4));
    }

    #[test]
    fn extract_rejects_inverted_range() {
        assert!(result_sort(OpKind::BvExtract, &[2, 5], &[SortInfo::bv(32)], &no_resolve).is_err());
    }

    #[test]
    fn concat_sums_widths() {
        let r = result_sort(
            OpKind::BvConcat,
            &[],
            &[SortInfo::bv(3), SortInfo::bv(5), SortInfo::bv(8)],
            &no_resolve,
        )
        .unwrap();
        assert_eq!(r, SortInfo::bv(16));
    }

    #[test]
    fn zero_extend_adds() {
        let r =
            result_sort(OpKind::BvZeroExtend, &[4], &[SortInfo::bv(8)], &no_resolve).unwrap();
        assert_eq!(r, SortInfo::bv(12));
    }

    #[test]
    fn fp_fp_counts_hidden_bit() {
        let args = [SortInfo::bv(1), SortInfo::bv(8), SortInfo::bv(23)];
        let r = result_sort(OpKind::FpFp, &[], &args, &no_resolve).unwrap();
        assert_eq!(r, SortInfo::fp(8, 24));
    }

    #[test]
    fn ite_takes_branch_sort() {
        let args = [
            SortInfo::plain(SortKind::Bool),
            SortInfo::bv(7),
            SortInfo::bv(7),
        ];
        let r = result_sort(OpKind::Ite, &[], &args, &no_resolve).unwrap();
        assert_eq!(r, SortInfo::bv(7));
    }

    #[test]
    fn select_resolves_element() {
        let element = SortHandle(9);
        let array = SortInfo {
            kind: SortKind::Array,
            params: SortParams::Array {
                index: SortHandle(8),
                element,
            },
        };
        let resolve = move |h: SortHandle| {
            (h == element).then(|| SortInfo::plain(SortKind::Int))
        };
        let r = result_sort(
            OpKind::ArraySelect,
            &[],
            &[array, SortInfo::plain(SortKind::Bool)],
            &resolve,
        )
        .unwrap();
        assert_eq!(r.kind, SortKind::Int);
    }

    #[test]
    fn predicates_are_bool() {
        let r = result_sort(
            OpKind::BvUlt,
            &[],
            &[SortInfo::bv(8), SortInfo::bv(8)],
            &no_resolve,
        )
        .unwrap();
        assert_eq!(r.kind, SortKind::Bool);
    }
}
