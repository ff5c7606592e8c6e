//! Cross-checking adapter combinator.
//!
//! Wraps two backends and mirrors every call into both.  The primary's
//! handles are the ones the tester sees; a correspondence map translates
//! them for the secondary.  The only divergence that is an error is a
//! definite disagreement on `check-sat` (sat vs unsat) — everything the
//! secondary cannot do degrades to `Unsupported`, which the tester treats
//! as "skip this action".

use crate::op::OpKind;
use crate::solver::{
    SatResult, Solver, SolverError, SolverOption, SolverResult, SortHandle, TermHandle,
};
use crate::sort::{SortKind, SortParams};
use crate::theory::TheoryId;
use log::debug;
use std::collections::HashMap;

/// Two backends in lockstep.
pub struct CrossCheck {
    primary: Box<dyn Solver>,
    secondary: Box<dyn Solver>,
    sort_map: HashMap<SortHandle, SortHandle>,
    term_map: HashMap<TermHandle, TermHandle>,
}

impl CrossCheck {
    pub fn new(primary: Box<dyn Solver>, secondary: Box<dyn Solver>) -> Self {
        Self {
            primary,
            secondary,
            sort_map: HashMap::new(),
            term_map: HashMap::new(),
        }
    }

    fn xlat_sort(&self, sort: SortHandle) -> SolverResult<SortHandle> {
        self.sort_map.get(&sort).copied().ok_or_else(|| {
            SolverError::unsupported("cross-check: sort unknown to the secondary solver")
        })
    }

    fn xlat_term(&self, term: TermHandle) -> SolverResult<TermHandle> {
        self.term_map.get(&term).copied().ok_or_else(|| {
            SolverError::unsupported("cross-check: term unknown to the secondary solver")
        })
    }

    fn xlat_terms(&self, terms: &[TermHandle]) -> SolverResult<Vec<TermHandle>> {
        terms.iter().map(|t| self.xlat_term(*t)).collect()
    }

    fn compare(&self, ours: SatResult, theirs: SatResult) -> SolverResult<SatResult> {
        match (ours, theirs) {
            (SatResult::Sat, SatResult::Unsat) | (SatResult::Unsat, SatResult::Sat) => {
                Err(SolverError::failure(format!(
                    "cross-check disagreement: {} answered {}, {} answered {}",
                    self.primary.name(),
                    ours,
                    self.secondary.name(),
                    theirs
                )))
            }
            (SatResult::Unknown, known) => Ok(known),
            (known, _) => Ok(known),
        }
    }
}

impl Solver for CrossCheck {
    fn name(&self) -> &'static str {
        "cross"
    }

    fn supported_theories(&self) -> Vec<TheoryId> {
        let secondary = self.secondary.supported_theories();
        self.primary
            .supported_theories()
            .into_iter()
            .filter(|t| secondary.contains(t))
            .collect()
    }

    fn init(&mut self) -> SolverResult<()> {
        self.sort_map.clear();
        self.term_map.clear();
        self.primary.init()?;
        self.secondary.init()
    }

    fn teardown(&mut self) -> SolverResult<()> {
        self.primary.teardown()?;
        self.secondary.teardown()
    }

    fn mk_sort(&mut self, kind: SortKind, params: &SortParams) -> SolverResult<SortHandle> {
        let secondary_params = match params {
            SortParams::Array { index, element } => SortParams::Array {
                index: self.xlat_sort(*index)?,
                element: self.xlat_sort(*element)?,
            },
            other => *other,
        };
        let ours = self.primary.mk_sort(kind, params)?;
        let theirs = self.secondary.mk_sort(kind, &secondary_params)?;
        self.sort_map.insert(ours, theirs);
        Ok(ours)
    }

    fn mk_const(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle> {
        let theirs_sort = self.xlat_sort(sort)?;
        let ours = self.primary.mk_const(sort, symbol)?;
        let theirs = self.secondary.mk_const(theirs_sort, symbol)?;
        self.term_map.insert(ours, theirs);
        Ok(ours)
    }

    fn mk_var(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle> {
        let theirs_sort = self.xlat_sort(sort)?;
        let ours = self.primary.mk_var(sort, symbol)?;
        let theirs = self.secondary.mk_var(theirs_sort, symbol)?;
        self.term_map.insert(ours, theirs);
        Ok(ours)
    }

    fn mk_value(&mut self, sort: SortHandle, value: &str) -> SolverResult<TermHandle> {
        let theirs_sort = self.xlat_sort(sort)?;
        let ours = self.primary.mk_value(sort, value)?;
        let theirs = self.secondary.mk_value(theirs_sort, value)?;
        self.term_map.insert(ours, theirs);
        Ok(ours)
    }

    fn mk_term(
        &mut self,
        kind: OpKind,
        params: &[u32],
        args: &[TermHandle],
    ) -> SolverResult<TermHandle> {
        let theirs_args = self.xlat_terms(args)?;
        let ours = self.primary.mk_term(kind, params, args)?;
        let theirs = self.secondary.mk_term(kind, params, &theirs_args)?;
        self.term_map.insert(ours, theirs);
        Ok(ours)
    }

    fn get_sort(&mut self, term: TermHandle) -> SolverResult<SortHandle> {
        let ours = self.primary.get_sort(term)?;
        // Best-effort: keep the sort correspondence fresh for sorts that
        // first appear as a term's sort (extracts, selects, ...).
        if !self.sort_map.contains_key(&ours) {
            if let Ok(theirs_term) = self.xlat_term(term) {
                if let Ok(theirs) = self.secondary.get_sort(theirs_term) {
                    self.sort_map.insert(ours, theirs);
                }
            }
        }
        Ok(ours)
    }

    fn sort_kind(&self, sort: SortHandle) -> SolverResult<SortKind> {
        self.primary.sort_kind(sort)
    }

    fn sort_params(&self, sort: SortHandle) -> SolverResult<SortParams> {
        self.primary.sort_params(sort)
    }

    fn options(&self) -> Vec<SolverOption> {
        self.primary.options()
    }

    fn set_opt(&mut self, name: &str, value: &str) -> SolverResult<()> {
        self.primary.set_opt(name, value)?;
        if let Err(e) = self.secondary.set_opt(name, value) {
            if !e.is_unsupported() {
                return Err(e);
            }
            debug!("secondary solver ignores option {}", name);
        }
        Ok(())
    }

    fn assert_formula(&mut self, term: TermHandle) -> SolverResult<()> {
        let theirs = self.xlat_term(term)?;
        self.primary.assert_formula(term)?;
        self.secondary.assert_formula(theirs)
    }

    fn check_sat(&mut self) -> SolverResult<SatResult> {
        let ours = self.primary.check_sat()?;
        let theirs = self.secondary.check_sat()?;
        self.compare(ours, theirs)
    }

    fn check_sat_assuming(&mut self, assumptions: &[TermHandle]) -> SolverResult<SatResult> {
        let theirs_assumptions = self.xlat_terms(assumptions)?;
        let ours = self.primary.check_sat_assuming(assumptions)?;
        let theirs = self.secondary.check_sat_assuming(&theirs_assumptions)?;
        self.compare(ours, theirs)
    }

    fn get_value(&mut self, term: TermHandle) -> SolverResult<TermHandle> {
        // Model queries stay on the primary; values are not comparable
        // across backends without normalisation.
        self.primary.get_value(term)
    }

    fn get_unsat_assumptions(&mut self) -> SolverResult<Vec<TermHandle>> {
        self.primary.get_unsat_assumptions()
    }

    fn get_unsat_core(&mut self) -> SolverResult<Vec<TermHandle>> {
        self.primary.get_unsat_core()
    }

    fn get_model(&mut self) -> SolverResult<String> {
        self.primary.get_model()
    }

    fn get_proof(&mut self) -> SolverResult<String> {
        self.primary.get_proof()
    }

    fn is_unsat_assumption(&self, term: TermHandle) -> bool {
        self.primary.is_unsat_assumption(term)
    }

    fn push(&mut self, n: u32) -> SolverResult<()> {
        self.primary.push(n)?;
        self.secondary.push(n)
    }

    fn pop(&mut self, n: u32) -> SolverResult<()> {
        self.primary.pop(n)?;
        self.secondary.pop(n)
    }

    fn reset(&mut self) -> SolverResult<()> {
        self.sort_map.clear();
        self.term_map.clear();
        self.primary.reset()?;
        self.secondary.reset()
    }

    fn reset_assertions(&mut self) -> SolverResult<()> {
        self.primary.reset_assertions()?;
        self.secondary.reset_assertions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubSolver;

    /// A stub whose check-sat answer is forced, for disagreement tests.
    struct Forced {
        inner: StubSolver,
        answer: SatResult,
    }

    impl Forced {
        fn boxed(answer: SatResult) -> Box<dyn Solver> {
            Box::new(Self {
                inner: StubSolver::new(),
                answer,
            })
        }
    }

    impl Solver for Forced {
        fn name(&self) -> &'static str {
            "forced"
        }
        fn supported_theories(&self) -> Vec<TheoryId> {
            self.inner.supported_theories()
        }
        fn init(&mut self) -> SolverResult<()> {
            self.inner.init()
        }
        fn teardown(&mut self) -> SolverResult<()> {
            self.inner.teardown()
        }
        fn mk_sort(&mut self, kind: SortKind, params: &SortParams) -> SolverResult<SortHandle> {
            self.inner.mk_sort(kind, params)
        }
        fn mk_const(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle> {
            self.inner.mk_const(sort, symbol)
        }
        fn mk_var(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle> {
            self.inner.mk_var(sort, symbol)
        }
        fn mk_value(&mut self, sort: SortHandle, value: &str) -> SolverResult<TermHandle> {
            self.inner.mk_value(sort, value)
        }
        fn mk_term(
            &mut self,
            kind: OpKind,
            params: &[u32],
            args: &[TermHandle],
        ) -> SolverResult<TermHandle> {
            self.inner.mk_term(kind, params, args)
        }
        fn get_sort(&mut self, term: TermHandle) -> SolverResult<SortHandle> {
            self.inner.get_sort(term)
        }
        fn sort_kind(&self, sort: SortHandle) -> SolverResult<SortKind> {
            self.inner.sort_kind(sort)
        }
        fn sort_params(&self, sort: SortHandle) -> SolverResult<SortParams> {
            self.inner.sort_params(sort)
        }
        fn options(&self) -> Vec<SolverOption> {
            self.inner.options()
        }
        fn set_opt(&mut self, name: &str, value: &str) -> SolverResult<()> {
            self.inner.set_opt(name, value)
        }
        fn assert_formula(&mut self, term: TermHandle) -> SolverResult<()> {
            self.inner.assert_formula(term)
        }
        fn check_sat(&mut self) -> SolverResult<SatResult> {
            Ok(self.answer)
        }
        fn check_sat_assuming(&mut self, _: &[TermHandle]) -> SolverResult<SatResult> {
            Ok(self.answer)
        }
        fn get_value(&mut self, term: TermHandle) -> SolverResult<TermHandle> {
            self.inner.get_value(term)
        }
        fn get_unsat_assumptions(&mut self) -> SolverResult<Vec<TermHandle>> {
            self.inner.get_unsat_assumptions()
        }
        fn get_unsat_core(&mut self) -> SolverResult<Vec<TermHandle>> {
            self.inner.get_unsat_core()
        }
        fn get_model(&mut self) -> SolverResult<String> {
            self.inner.get_model()
        }
        fn get_proof(&mut self) -> SolverResult<String> {
            self.inner.get_proof()
        }
        fn is_unsat_assumption(&self, term: TermHandle) -> bool {
            self.inner.is_unsat_assumption(term)
        }
        fn push(&mut self, n: u32) -> SolverResult<()> {
            self.inner.push(n)
        }
        fn pop(&mut self, n: u32) -> SolverResult<()> {
            self.inner.pop(n)
        }
        fn reset(&mut self) -> SolverResult<()> {
            self.inner.reset()
        }
        fn reset_assertions(&mut self) -> SolverResult<()> {
            self.inner.reset_assertions()
        }
    }

    #[test]
    fn agreement_passes_through() {
        let mut cross = CrossCheck::new(
            Forced::boxed(SatResult::Sat),
            Forced::boxed(SatResult::Sat),
        );
        cross.init().unwrap();
        assert_eq!(cross.check_sat().unwrap(), SatResult::Sat);
    }

    #[test]
    fn disagreement_is_a_failure() {
        let mut cross = CrossCheck::new(
            Forced::boxed(SatResult::Sat),
            Forced::boxed(SatResult::Unsat),
        );
        cross.init().unwrap();
        let err = cross.check_sat().unwrap_err();
        assert!(matches!(err, SolverError::Failure(ref m) if m.contains("disagreement")));
    }

    #[test]
    fn unknown_defers_to_the_other_side() {
        let mut cross = CrossCheck::new(
            Forced::boxed(SatResult::Unknown),
            Forced::boxed(SatResult::Unsat),
        );
        cross.init().unwrap();
        assert_eq!(cross.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn entities_are_mirrored() {
        let mut cross = CrossCheck::new(
            Box::new(StubSolver::new()),
            Box::new(StubSolver::new()),
        );
        cross.init().unwrap();
        let bool_sort = cross.mk_sort(SortKind::Bool, &SortParams::None).unwrap();
        let t = cross.mk_value(bool_sort, "false").unwrap();
        cross.assert_formula(t).unwrap();
        assert_eq!(cross.check_sat().unwrap(), SatResult::Unsat);
    }
}
