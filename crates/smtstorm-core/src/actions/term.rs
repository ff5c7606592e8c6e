//! The mk-term action: materialise one operator application.
//!
//! Operand selection is where all the typing rules live: same-sort operand
//! groups, width-correct integer parameters for the parameterized BV
//! operators, total-width agreement for FP-from-BV conversions, the linear
//! arithmetic fragment, and quantifier binding.  When the picked operator
//! cannot be materialised from the current pool the action is skipped and
//! the run continues.

use super::{need, need_u32, need_usize, resolve_term, Action, Outcome, ReplayError};
use crate::manager::{SolverManager, FP_FORMATS, MAX_BV_WIDTH};
use crate::term_db::Term;
use crate::trace::{EntityRef, Token};
use smtstorm_solver::{Arity, ArgsPattern, OpKind, SolverResult, SortKind};
use std::collections::HashMap;

pub struct ActionMkTerm;

struct Generated {
    params: Vec<u32>,
    args: Vec<Term>,
}

impl ActionMkTerm {
    fn bv_width_of(mgr: &SolverManager, term: &Term) -> Option<u32> {
        mgr.sort(term.sort_id).and_then(|s| s.bv_width())
    }

    /// Instantiate the argument count for the op's arity.
    fn pick_arity(mgr: &mut SolverManager, arity: Arity) -> u32 {
        match arity {
            Arity::Exact(n) => n,
            Arity::AtLeast(n) => n + mgr.rng.range_u32(0, 2),
        }
    }

    fn pick_fp_format_with_bv_terms(mgr: &mut SolverManager) -> Option<(u32, u32)> {
        let candidates: Vec<(u32, u32)> = FP_FORMATS
            .iter()
            .copied()
            .filter(|(eb, sb)| mgr.has_sort_bv(eb + sb, true))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(*mgr.rng.pick(&candidates))
    }

    fn pick_bv_term_of_width(mgr: &mut SolverManager, width: u32) -> Option<Term> {
        if !mgr.has_sort_bv(width, true) {
            return None;
        }
        let sort = mgr.pick_sort_bv(width, true);
        Some(mgr.pick_term_of_sort(sort.id))
    }

    /// Array sorts usable for select/store: the component sorts must be
    /// registered and populated.
    fn array_candidates(mgr: &SolverManager, need_element: bool) -> Vec<(u64, u64, u64)> {
        let mut out = Vec::new();
        for sort in mgr.sorts_of_kind(SortKind::Array) {
            if !mgr.has_term_of_sort(sort.id) {
                continue;
            }
            let (index, element) = match sort.params {
                smtstorm_solver::SortParams::Array { index, element } => (index, element),
                _ => continue,
            };
            let Some(index_id) = mgr.find_sort(index) else {
                continue;
            };
            let Some(element_id) = mgr.find_sort(element) else {
                continue;
            };
            if !mgr.has_term_of_sort(index_id) {
                continue;
            }
            if need_element && !mgr.has_term_of_sort(element_id) {
                continue;
            }
            out.push((sort.id, index_id, element_id));
        }
        out
    }

    /// Pick parameters and arguments for `kind`, or `None` to skip.
    fn generate(mgr: &mut SolverManager, kind: OpKind) -> Option<Generated> {
        let op = kind.op();
        let n = Self::pick_arity(mgr, op.arity);

        let generated = match kind {
            OpKind::BvExtract => {
                let t = mgr.pick_term_of_kind(SortKind::Bv);
                let w = Self::bv_width_of(mgr, &t)?;
                let hi = mgr.rng.range_u32(0, w - 1);
                let lo = mgr.rng.range_u32(0, hi);
                Generated {
                    params: vec![hi, lo],
                    args: vec![t],
                }
            }
            OpKind::BvRepeat => {
                let t = mgr.pick_term_of_kind(SortKind::Bv);
                let w = Self::bv_width_of(mgr, &t)?;
                let reps = mgr.rng.range_u32(1, (MAX_BV_WIDTH / w).max(1));
                Generated {
                    params: vec![reps],
                    args: vec![t],
                }
            }
            OpKind::BvRotateLeft | OpKind::BvRotateRight => {
                let t = mgr.pick_term_of_kind(SortKind::Bv);
                let w = Self::bv_width_of(mgr, &t)?;
                Generated {
                    params: vec![mgr.rng.range_u32(0, w)],
                    args: vec![t],
                }
            }
            OpKind::BvSignExtend | OpKind::BvZeroExtend => {
                let t = mgr.pick_term_of_kind(SortKind::Bv);
                let w = Self::bv_width_of(mgr, &t)?;
                Generated {
                    params: vec![mgr.rng.range_u32(0, MAX_BV_WIDTH - w)],
                    args: vec![t],
                }
            }
            OpKind::BvConcat => {
                let first = mgr.pick_term_of_kind(SortKind::Bv);
                let mut total = Self::bv_width_of(mgr, &first)?;
                let mut args = vec![first];
                let wanted = n.max(2);
                while (args.len() as u32) < wanted && total < MAX_BV_WIDTH {
                    if !mgr.has_sort_bv_max(MAX_BV_WIDTH - total, true) {
                        break;
                    }
                    let sort = mgr.pick_sort_bv_max(MAX_BV_WIDTH - total, true);
                    let t = mgr.pick_term_of_sort(sort.id);
                    total += Self::bv_width_of(mgr, &t)?;
                    args.push(t);
                }
                if args.len() < 2 {
                    return None;
                }
                Generated {
                    params: vec![],
                    args,
                }
            }
            OpKind::FpToFpFromBv => {
                let (eb, sb) = Self::pick_fp_format_with_bv_terms(mgr)?;
                let t = Self::pick_bv_term_of_width(mgr, eb + sb)?;
                Generated {
                    params: vec![eb, sb],
                    args: vec![t],
                }
            }
            OpKind::FpToFpFromIntBv | OpKind::FpToFpFromUintBv => {
                let (eb, sb) = *mgr.rng.pick(&FP_FORMATS);
                let rm = mgr.pick_term_of_kind(SortKind::Rm);
                let bv = mgr.pick_term_of_kind(SortKind::Bv);
                Generated {
                    params: vec![eb, sb],
                    args: vec![rm, bv],
                }
            }
            OpKind::FpToFpFromFp => {
                let (eb, sb) = *mgr.rng.pick(&FP_FORMATS);
                let rm = mgr.pick_term_of_kind(SortKind::Rm);
                let fp = mgr.pick_term_of_kind(SortKind::Fp);
                Generated {
                    params: vec![eb, sb],
                    args: vec![rm, fp],
                }
            }
            OpKind::FpToFpFromReal => {
                let (eb, sb) = *mgr.rng.pick(&FP_FORMATS);
                let rm = mgr.pick_term_of_kind(SortKind::Rm);
                let real = mgr.pick_term_of_kind(SortKind::Real);
                Generated {
                    params: vec![eb, sb],
                    args: vec![rm, real],
                }
            }
            OpKind::FpToSbv | OpKind::FpToUbv => {
                let rm = mgr.pick_term_of_kind(SortKind::Rm);
                let fp = mgr.pick_term_of_kind(SortKind::Fp);
                Generated {
                    params: vec![mgr.rng.range_u32(1, 64)],
                    args: vec![rm, fp],
                }
            }
            OpKind::FpFp => {
                // Slices: sign (1 bit), exponent (eb bits), significand
                // without the hidden bit (sb - 1 bits).
                let format = FP_FORMATS.iter().copied().find(|(eb, sb)| {
                    mgr.has_sort_bv(1, true)
                        && mgr.has_sort_bv(*eb, true)
                        && mgr.has_sort_bv(sb - 1, true)
                })?;
                let sign = Self::pick_bv_term_of_width(mgr, 1)?;
                let exp = Self::pick_bv_term_of_width(mgr, format.0)?;
                let sig = Self::pick_bv_term_of_width(mgr, format.1 - 1)?;
                Generated {
                    params: vec![],
                    args: vec![sign, exp, sig],
                }
            }
            OpKind::IntIsDiv => Generated {
                params: vec![mgr.rng.range_u32(1, 10)],
                args: vec![mgr.pick_term_of_kind(SortKind::Int)],
            },
            OpKind::RePow => Generated {
                params: vec![mgr.rng.range_u32(0, 4)],
                args: vec![mgr.pick_term_of_kind(SortKind::Reglan)],
            },
            OpKind::ReLoop => {
                let lo = mgr.rng.range_u32(0, 3);
                let hi = lo + mgr.rng.range_u32(0, 3);
                Generated {
                    params: vec![lo, hi],
                    args: vec![mgr.pick_term_of_kind(SortKind::Reglan)],
                }
            }
            OpKind::ReRange => {
                if !mgr.has_string_char_value() {
                    return None;
                }
                let a = mgr.pick_string_char_value();
                let b = mgr.pick_string_char_value();
                Generated {
                    params: vec![],
                    args: vec![a, b],
                }
            }
            OpKind::IntDiv | OpKind::IntMod | OpKind::RealDiv if mgr.arith_linear => {
                let kind_of = if kind == OpKind::RealDiv {
                    SortKind::Real
                } else {
                    SortKind::Int
                };
                let numerator = mgr.pick_term_of_kind(kind_of);
                if !mgr.has_value_of_sort(numerator.sort_id) {
                    return None;
                }
                let divisor = mgr.pick_value_of_sort(numerator.sort_id);
                Generated {
                    params: vec![],
                    args: vec![numerator, divisor],
                }
            }
            OpKind::IntMul | OpKind::RealMul if mgr.arith_linear => {
                let kind_of = if kind == OpKind::RealMul {
                    SortKind::Real
                } else {
                    SortKind::Int
                };
                let free = mgr.pick_term_of_kind(kind_of);
                if !mgr.has_value_of_sort(free.sort_id) {
                    return None;
                }
                let mut args = vec![free];
                for _ in 1..n {
                    let sort_id = args[0].sort_id;
                    args.push(mgr.pick_value_of_sort(sort_id));
                }
                Generated {
                    params: vec![],
                    args,
                }
            }
            OpKind::Forall | OpKind::Exists => {
                let var = mgr.pick_var();
                let body = mgr.pick_quant_body();
                Generated {
                    params: vec![],
                    args: vec![var, body],
                }
            }
            OpKind::Ite => {
                let cond = mgr.pick_term_of_kind(SortKind::Bool);
                let then = mgr.pick_term();
                let otherwise = mgr.pick_term_of_sort(then.sort_id);
                Generated {
                    params: vec![],
                    args: vec![cond, then, otherwise],
                }
            }
            OpKind::Equal | OpKind::Distinct => {
                let first = mgr.pick_term();
                let mut args = vec![first];
                for _ in 1..n {
                    let sort_id = args[0].sort_id;
                    args.push(mgr.pick_term_of_sort(sort_id));
                }
                Generated {
                    params: vec![],
                    args,
                }
            }
            OpKind::ArraySelect => {
                let candidates = Self::array_candidates(mgr, false);
                if candidates.is_empty() {
                    return None;
                }
                let (array_id, index_id, _) = *mgr.rng.pick(&candidates);
                Generated {
                    params: vec![],
                    args: vec![
                        mgr.pick_term_of_sort(array_id),
                        mgr.pick_term_of_sort(index_id),
                    ],
                }
            }
            OpKind::ArrayStore => {
                let candidates = Self::array_candidates(mgr, true);
                if candidates.is_empty() {
                    return None;
                }
                let (array_id, index_id, element_id) = *mgr.rng.pick(&candidates);
                Generated {
                    params: vec![],
                    args: vec![
                        mgr.pick_term_of_sort(array_id),
                        mgr.pick_term_of_sort(index_id),
                        mgr.pick_term_of_sort(element_id),
                    ],
                }
            }
            _ => {
                // Generic path: positions take their pattern kind; BV and
                // FP operands of one op share one sort.
                debug_assert!(matches!(op.args, ArgsPattern::Kinds(_)));
                let mut shared: HashMap<SortKind, u64> = HashMap::new();
                let mut args = Vec::with_capacity(n as usize);
                for i in 0..n {
                    let k = op.arg_kind(i as usize).expect("kinds pattern");
                    let term = match k {
                        SortKind::Bv | SortKind::Fp => {
                            let sort_id = match shared.get(&k) {
                                Some(id) => *id,
                                None => {
                                    if !mgr.has_sort_with_terms(k) {
                                        return None;
                                    }
                                    let id = mgr.pick_sort_of_kind(k, true).id;
                                    shared.insert(k, id);
                                    id
                                }
                            };
                            mgr.pick_term_of_sort(sort_id)
                        }
                        _ => {
                            if !mgr.has_term_of_kind(k) {
                                return None;
                            }
                            mgr.pick_term_of_kind(k)
                        }
                    };
                    args.push(term);
                }
                Generated {
                    params: vec![],
                    args,
                }
            }
        };
        Some(generated)
    }

    fn trace_line(kind: OpKind, params: &[u32], args: &[Term]) -> String {
        let mut line = format!("mk-term {} {}", kind, params.len());
        for p in params {
            line.push_str(&format!(" {}", p));
        }
        line.push_str(&format!(" {}", args.len()));
        for a in args {
            line.push_str(&format!(" t{}", a.id));
        }
        line
    }
}

impl Action for ActionMkTerm {
    fn name(&self) -> &'static str {
        "mk-term"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.has_op_kind(true)
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let Some(kind) = mgr.pick_op_kind(true) else {
            return Ok(Outcome::Skipped);
        };
        let Some(Generated { params, args }) = Self::generate(mgr, kind) else {
            return Ok(Outcome::Skipped);
        };
        let handles: Vec<_> = args.iter().map(|t| t.handle).collect();
        let result = mgr.solver_mut().mk_term(kind, &params, &handles)?;
        if matches!(kind, OpKind::Forall | OpKind::Exists) {
            mgr.close_binders();
        }
        let term_id = mgr.add_result_term(result, false)?;
        Outcome::played(
            Self::trace_line(kind, &params, &args),
            vec![EntityRef::Term(term_id)],
        )
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let kind: OpKind = need(args, 0, "op kind")?
            .word()
            .and_then(|w| w.parse().ok())
            .ok_or_else(|| ReplayError::Malformed("bad op kind".to_string()))?;
        let nparams = need_usize(args, 1, "parameter count")?;
        let mut params = Vec::with_capacity(nparams);
        for i in 0..nparams {
            params.push(need_u32(args, 2 + i, "parameter")?);
        }
        let nargs = need_usize(args, 2 + nparams, "argument count")?;
        let mut terms = Vec::with_capacity(nargs);
        for i in 0..nargs {
            terms.push(resolve_term(mgr, need(args, 3 + nparams + i, "argument")?)?);
        }
        let handles: Vec<_> = terms.iter().map(|t| t.handle).collect();
        let result = mgr.solver_mut().mk_term(kind, &params, &handles)?;
        if matches!(kind, OpKind::Forall | OpKind::Exists) {
            mgr.close_binders();
        }
        let term_id = mgr.add_result_term(result, false)?;
        Ok(vec![EntityRef::Term(term_id)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use smtstorm_solver::stub::StubSolver;
    use smtstorm_solver::{Solver as _, SortParams};

    fn manager() -> SolverManager {
        let mut solver = Box::new(StubSolver::new());
        solver.init().unwrap();
        SolverManager::new(solver, 5, &ManagerConfig::default())
    }

    fn add_bv_const(mgr: &mut SolverManager, width: u32, name: &str) -> Term {
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::Bv, &SortParams::Bv { width })
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::Bv, handle, SortParams::Bv { width });
        let term = mgr.solver_mut().mk_const(handle, name).unwrap();
        let id = mgr.add_input(term, sort_id, false);
        mgr.term(id).unwrap().clone()
    }

    #[test]
    fn extract_params_stay_in_range() {
        let mut mgr = manager();
        add_bv_const(&mut mgr, 8, "x");
        for _ in 0..64 {
            let g = ActionMkTerm::generate(&mut mgr, OpKind::BvExtract).unwrap();
            let (hi, lo) = (g.params[0], g.params[1]);
            assert!(hi <= 7 && lo <= hi);
        }
    }

    #[test]
    fn extend_never_exceeds_max_width() {
        let mut mgr = manager();
        add_bv_const(&mut mgr, 100, "x");
        for _ in 0..64 {
            let g = ActionMkTerm::generate(&mut mgr, OpKind::BvZeroExtend).unwrap();
            assert!(g.params[0] <= 28);
        }
    }

    #[test]
    fn binary_bv_ops_share_a_sort() {
        let mut mgr = manager();
        add_bv_const(&mut mgr, 8, "x");
        add_bv_const(&mut mgr, 16, "y");
        for _ in 0..32 {
            let g = ActionMkTerm::generate(&mut mgr, OpKind::BvAdd).unwrap();
            assert_eq!(g.args[0].sort_id, g.args[1].sort_id);
        }
    }

    #[test]
    fn concat_bounds_total_width() {
        let mut mgr = manager();
        add_bv_const(&mut mgr, 100, "x");
        add_bv_const(&mut mgr, 60, "y");
        add_bv_const(&mut mgr, 20, "z");
        for _ in 0..64 {
            if let Some(g) = ActionMkTerm::generate(&mut mgr, OpKind::BvConcat) {
                let total: u32 = g
                    .args
                    .iter()
                    .map(|t| ActionMkTerm::bv_width_of(&mgr, t).unwrap())
                    .sum();
                assert!(total <= MAX_BV_WIDTH);
                assert!(g.args.len() >= 2);
            }
        }
    }

    #[test]
    fn linear_division_needs_a_value_divisor() {
        let mut solver = Box::new(StubSolver::new());
        solver.init().unwrap();
        let config = ManagerConfig {
            arith_linear: true,
            ..Default::default()
        };
        let mut mgr = SolverManager::new(solver, 6, &config);
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::Int, &SortParams::None)
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::Int, handle, SortParams::None);
        let c = mgr.solver_mut().mk_const(handle, "n").unwrap();
        mgr.add_input(c, sort_id, false);
        // No Int value yet: refused.
        assert!(ActionMkTerm::generate(&mut mgr, OpKind::IntDiv).is_none());
        let v = mgr.solver_mut().mk_value(handle, "3").unwrap();
        mgr.add_input(v, sort_id, true);
        let g = ActionMkTerm::generate(&mut mgr, OpKind::IntDiv).unwrap();
        assert!(g.args[1].is_value);
    }

    #[test]
    fn mk_term_run_produces_and_registers() {
        let mut mgr = manager();
        add_bv_const(&mut mgr, 8, "x");
        let mut made = 0;
        for _ in 0..64 {
            match ActionMkTerm.run(&mut mgr) {
                Ok(Outcome::Played { line, created }) => {
                    assert!(line.starts_with("mk-term "));
                    assert_eq!(created.len(), 1);
                    made += 1;
                }
                Ok(_) => {}
                Err(e) => assert!(e.is_unsupported(), "unexpected failure: {}", e),
            }
        }
        assert!(made > 0);
    }

    #[test]
    fn quantifier_closes_binder_and_lands_outside() {
        let mut mgr = manager();
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::Bool, &SortParams::None)
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::Bool, handle, SortParams::None);
        let c = mgr.solver_mut().mk_const(handle, "b").unwrap();
        mgr.add_input(c, sort_id, false);
        let v = mgr.solver_mut().mk_var(handle, "v").unwrap();
        mgr.add_var(v, sort_id);
        assert!(mgr.has_open_binder());
        let g = ActionMkTerm::generate(&mut mgr, OpKind::Forall).unwrap();
        let handles: Vec<_> = g.args.iter().map(|t| t.handle).collect();
        let result = mgr
            .solver_mut()
            .mk_term(OpKind::Forall, &[], &handles)
            .unwrap();
        mgr.close_binders();
        let id = mgr.add_result_term(result, false).unwrap();
        assert!(!mgr.has_open_binder());
        assert_eq!(mgr.term(id).unwrap().level, 0);
    }

    #[test]
    fn replay_roundtrips_the_line() {
        let mut mgr = manager();
        let t = add_bv_const(&mut mgr, 8, "x");
        mgr.register_term(7, t.id);
        let tokens = vec![
            Token::Word("BV_EXTRACT".to_string()),
            Token::Word("2".to_string()),
            Token::Word("5".to_string()),
            Token::Word("2".to_string()),
            Token::Word("1".to_string()),
            Token::TermRef(7),
        ];
        let created = ActionMkTerm.replay(&mut mgr, &tokens).unwrap();
        let id = match created[0] {
            EntityRef::Term(id) => id,
            _ => unreachable!(),
        };
        // Width 4 slice; its sort was unseen and got registered.
        let sort = mgr.sort(mgr.term(id).unwrap().sort_id).unwrap();
        assert_eq!(sort.bv_width(), Some(4));
    }
}
