//! A self-contained bookkeeping backend.
//!
//! `StubSolver` implements the full adapter contract without any native
//! solver: it interns sorts, tracks the sort of every term, and answers
//! `check-sat` from a trivial rule (unsat iff a literal `false` is asserted
//! or assumed, sat otherwise).  That is enough to drive every action the
//! state machine can take, which makes it the backend of choice for
//! harness self-tests and for fuzzing the harness itself (`--solver stub`).

use crate::infer::{result_sort, SortInfo};
use crate::op::OpKind;
use crate::solver::{
    SatResult, Solver, SolverError, SolverOption, SolverResult, SortHandle, TermHandle,
};
use crate::sort::{SortKind, SortParams};
use crate::theory::TheoryId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct StubTerm {
    sort: SortHandle,
    /// The literal, for value terms.
    value: Option<String>,
}

/// In-memory backend answering from bookkeeping alone.
#[derive(Debug, Default)]
pub struct StubSolver {
    sorts: Vec<SortInfo>,
    interned: HashMap<SortInfo, SortHandle>,
    terms: Vec<StubTerm>,
    /// Asserted terms per scope frame; index 0 is the base level.
    frames: Vec<Vec<TermHandle>>,
    assumed: Vec<TermHandle>,
    failed_assumptions: Vec<TermHandle>,
    used_options: Vec<(String, String)>,
    initialized: bool,
}

impl StubSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn sort_info(&self, sort: SortHandle) -> SolverResult<SortInfo> {
        self.sorts
            .get(sort.0 as usize)
            .copied()
            .ok_or_else(|| SolverError::failure(format!("unknown sort handle {}", sort.0)))
    }

    fn term(&self, term: TermHandle) -> SolverResult<&StubTerm> {
        self.terms
            .get(term.0 as usize)
            .ok_or_else(|| SolverError::failure(format!("unknown term handle {}", term.0)))
    }

    fn intern(&mut self, info: SortInfo) -> SortHandle {
        if let Some(handle) = self.interned.get(&info) {
            return *handle;
        }
        let handle = SortHandle(self.sorts.len() as u64);
        self.sorts.push(info);
        self.interned.insert(info, handle);
        handle
    }

    fn new_term(&mut self, sort: SortHandle, value: Option<String>) -> TermHandle {
        let handle = TermHandle(self.terms.len() as u64);
        self.terms.push(StubTerm { sort, value });
        handle
    }

    fn is_false_literal(&self, term: TermHandle) -> bool {
        self.terms
            .get(term.0 as usize)
            .and_then(|t| t.value.as_deref())
            .map(|v| v == "false")
            .unwrap_or(false)
    }

    fn asserted_false(&self) -> bool {
        self.frames
            .iter()
            .flatten()
            .any(|t| self.is_false_literal(*t))
    }

    /// A canonical value literal for a sort, for `get-value` answers.
    fn default_value(info: &SortInfo) -> SolverResult<String> {
        let text = match info.kind {
            SortKind::Bool => "true".to_string(),
            SortKind::Int => "0".to_string(),
            SortKind::Real => "0.0".to_string(),
            SortKind::Rm => "RNE".to_string(),
            SortKind::String => "\"\"".to_string(),
            SortKind::Bv => {
                let width = info
                    .params
                    .bv_width()
                    .ok_or_else(|| SolverError::failure("BV sort without width"))?;
                format!("#b{}", "0".repeat(width as usize))
            }
            SortKind::Array | SortKind::Fp | SortKind::Reglan => {
                return Err(SolverError::unsupported(format!(
                    "stub cannot produce {} values",
                    info.kind
                )))
            }
        };
        Ok(text)
    }
}

impl Solver for StubSolver {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supported_theories(&self) -> Vec<TheoryId> {
        TheoryId::ALL.to_vec()
    }

    fn init(&mut self) -> SolverResult<()> {
        *self = Self::default();
        self.frames.push(Vec::new());
        self.initialized = true;
        Ok(())
    }

    fn teardown(&mut self) -> SolverResult<()> {
        *self = Self::default();
        Ok(())
    }

    fn mk_sort(&mut self, kind: SortKind, params: &SortParams) -> SolverResult<SortHandle> {
        match (kind, params) {
            (SortKind::Bv, SortParams::Bv { width }) if *width == 0 => {
                Err(SolverError::failure("zero-width bit-vector"))
            }
            (SortKind::Array, SortParams::Array { index, element }) => {
                // Validate the component handles before interning.
                self.sort_info(*index)?;
                self.sort_info(*element)?;
                Ok(self.intern(SortInfo { kind, params: *params }))
            }
            _ => Ok(self.intern(SortInfo { kind, params: *params })),
        }
    }

    fn mk_const(&mut self, sort: SortHandle, _symbol: &str) -> SolverResult<TermHandle> {
        self.sort_info(sort)?;
        Ok(self.new_term(sort, None))
    }

    fn mk_var(&mut self, sort: SortHandle, _symbol: &str) -> SolverResult<TermHandle> {
        self.sort_info(sort)?;
        Ok(self.new_term(sort, None))
    }

    fn mk_value(&mut self, sort: SortHandle, value: &str) -> SolverResult<TermHandle> {
        self.sort_info(sort)?;
        Ok(self.new_term(sort, Some(value.to_string())))
    }

    fn mk_term(
        &mut self,
        kind: OpKind,
        params: &[u32],
        args: &[TermHandle],
    ) -> SolverResult<TermHandle> {
        let mut infos = Vec::with_capacity(args.len());
        for a in args {
            infos.push(self.sort_info(self.term(*a)?.sort)?);
        }
        let result = match kind {
            // Quantifier result is always Bool; args are vars plus body.
            OpKind::Exists | OpKind::Forall => SortInfo::plain(SortKind::Bool),
            _ => {
                let sorts = self.sorts.clone();
                let resolve =
                    move |h: SortHandle| -> Option<SortInfo> { sorts.get(h.0 as usize).copied() };
                result_sort(kind, params, &infos, &resolve)?
            }
        };
        let sort = self.intern(result);
        Ok(self.new_term(sort, None))
    }

    fn get_sort(&mut self, term: TermHandle) -> SolverResult<SortHandle> {
        Ok(self.term(term)?.sort)
    }

    fn sort_kind(&self, sort: SortHandle) -> SolverResult<SortKind> {
        Ok(self.sort_info(sort)?.kind)
    }

    fn sort_params(&self, sort: SortHandle) -> SolverResult<SortParams> {
        Ok(self.sort_info(sort)?.params)
    }

    fn options(&self) -> Vec<SolverOption> {
        vec![
            SolverOption::new("incremental", &["true", "false"]),
            SolverOption::new("produce-models", &["true", "false"]),
            SolverOption::new("produce-unsat-assumptions", &["true", "false"]),
            SolverOption::new("produce-unsat-cores", &["true", "false"]),
            SolverOption::new("produce-proofs", &["true", "false"]),
            SolverOption::new("random-seed", &["0", "1", "4294967295"]),
            SolverOption::new("nonlinear-arith", &["true", "false"]),
        ]
    }

    fn set_opt(&mut self, name: &str, value: &str) -> SolverResult<()> {
        if !self.options().iter().any(|o| o.name == name) {
            return Err(SolverError::unsupported(format!("option {}", name)));
        }
        self.used_options.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn assert_formula(&mut self, term: TermHandle) -> SolverResult<()> {
        if self.sort_info(self.term(term)?.sort)?.kind != SortKind::Bool {
            return Err(SolverError::failure("asserting a non-Bool term"));
        }
        self.frames
            .last_mut()
            .ok_or_else(|| SolverError::failure("no assertion frame"))?
            .push(term);
        Ok(())
    }

    fn check_sat(&mut self) -> SolverResult<SatResult> {
        self.assumed.clear();
        self.failed_assumptions.clear();
        Ok(if self.asserted_false() {
            SatResult::Unsat
        } else {
            SatResult::Sat
        })
    }

    fn check_sat_assuming(&mut self, assumptions: &[TermHandle]) -> SolverResult<SatResult> {
        self.assumed = assumptions.to_vec();
        self.failed_assumptions = assumptions
            .iter()
            .copied()
            .filter(|t| self.is_false_literal(*t))
            .collect();
        if self.asserted_false() || !self.failed_assumptions.is_empty() {
            Ok(SatResult::Unsat)
        } else {
            Ok(SatResult::Sat)
        }
    }

    fn get_value(&mut self, term: TermHandle) -> SolverResult<TermHandle> {
        let entry = self.term(term)?.clone();
        if entry.value.is_some() {
            return Ok(term);
        }
        let info = self.sort_info(entry.sort)?;
        let literal = Self::default_value(&info)?;
        Ok(self.new_term(entry.sort, Some(literal)))
    }

    fn get_unsat_assumptions(&mut self) -> SolverResult<Vec<TermHandle>> {
        Ok(self.failed_assumptions.clone())
    }

    fn get_unsat_core(&mut self) -> SolverResult<Vec<TermHandle>> {
        Ok(self
            .frames
            .iter()
            .flatten()
            .copied()
            .filter(|t| self.is_false_literal(*t))
            .collect())
    }

    fn get_model(&mut self) -> SolverResult<String> {
        Ok(format!("(model ; {} terms\n)", self.terms.len()))
    }

    fn get_proof(&mut self) -> SolverResult<String> {
        Err(SolverError::unsupported("proofs"))
    }

    fn is_unsat_assumption(&self, term: TermHandle) -> bool {
        self.failed_assumptions.contains(&term)
    }

    fn push(&mut self, n: u32) -> SolverResult<()> {
        for _ in 0..n {
            self.frames.push(Vec::new());
        }
        Ok(())
    }

    fn pop(&mut self, n: u32) -> SolverResult<()> {
        if (n as usize) >= self.frames.len() {
            return Err(SolverError::failure("pop below the base level"));
        }
        for _ in 0..n {
            self.frames.pop();
        }
        Ok(())
    }

    fn reset(&mut self) -> SolverResult<()> {
        self.init()
    }

    fn reset_assertions(&mut self) -> SolverResult<()> {
        self.frames.clear();
        self.frames.push(Vec::new());
        self.assumed.clear();
        self.failed_assumptions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> StubSolver {
        let mut solver = StubSolver::new();
        solver.init().unwrap();
        solver
    }

    #[test]
    fn sorts_are_interned() {
        let mut solver = ready();
        let a = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 8 })
            .unwrap();
        let b = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 8 })
            .unwrap();
        let c = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 9 })
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn check_sat_empty_is_sat() {
        let mut solver = ready();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
    }

    #[test]
    fn asserted_false_is_unsat() {
        let mut solver = ready();
        let bool_sort = solver.mk_sort(SortKind::Bool, &SortParams::None).unwrap();
        let f = solver.mk_value(bool_sort, "false").unwrap();
        solver.assert_formula(f).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn popped_false_no_longer_counts() {
        let mut solver = ready();
        let bool_sort = solver.mk_sort(SortKind::Bool, &SortParams::None).unwrap();
        let f = solver.mk_value(bool_sort, "false").unwrap();
        solver.push(1).unwrap();
        solver.assert_formula(f).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
        solver.pop(1).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
    }

    #[test]
    fn failed_assumptions_are_a_subset() {
        let mut solver = ready();
        let bool_sort = solver.mk_sort(SortKind::Bool, &SortParams::None).unwrap();
        let t = solver.mk_value(bool_sort, "true").unwrap();
        let f = solver.mk_value(bool_sort, "false").unwrap();
        let result = solver.check_sat_assuming(&[t, f]).unwrap();
        assert_eq!(result, SatResult::Unsat);
        let failed = solver.get_unsat_assumptions().unwrap();
        assert_eq!(failed, vec![f]);
        assert!(solver.is_unsat_assumption(f));
        assert!(!solver.is_unsat_assumption(t));
    }

    #[test]
    fn term_sorts_flow_through_ops() {
        let mut solver = ready();
        let bv8 = solver
            .mk_sort(SortKind::Bv, &SortParams::Bv { width: 8 })
            .unwrap();
        let x = solver.mk_const(bv8, "x").unwrap();
        let extracted = solver.mk_term(OpKind::BvExtract, &[3, 0], &[x]).unwrap();
        let sort = solver.get_sort(extracted).unwrap();
        assert_eq!(solver.sort_kind(sort).unwrap(), SortKind::Bv);
        assert_eq!(
            solver.sort_params(sort).unwrap(),
            SortParams::Bv { width: 4 }
        );
    }

    #[test]
    fn get_value_mints_value_terms() {
        let mut solver = ready();
        let int_sort = solver.mk_sort(SortKind::Int, &SortParams::None).unwrap();
        let x = solver.mk_const(int_sort, "x").unwrap();
        let v = solver.get_value(x).unwrap();
        assert_ne!(v, x);
        assert_eq!(solver.get_sort(v).unwrap(), int_sort);
    }

    #[test]
    fn reset_assertions_keeps_declarations() {
        let mut solver = ready();
        let bool_sort = solver.mk_sort(SortKind::Bool, &SortParams::None).unwrap();
        let f = solver.mk_value(bool_sort, "false").unwrap();
        solver.assert_formula(f).unwrap();
        solver.reset_assertions().unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        // The handle still resolves.
        assert_eq!(solver.get_sort(f).unwrap(), bool_sort);
    }

    #[test]
    fn pop_below_base_fails() {
        let mut solver = ready();
        assert!(solver.pop(1).is_err());
    }

    #[test]
    fn unknown_option_is_unsupported() {
        let mut solver = ready();
        let err = solver.set_opt("no-such-option", "1").unwrap_err();
        assert!(err.is_unsupported());
    }
}
