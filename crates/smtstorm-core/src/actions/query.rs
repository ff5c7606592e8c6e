//! Satisfiability and model queries.

use super::{need, need_usize, resolve_term, Action, Outcome, ReplayError};
use crate::manager::SolverManager;
use crate::term_db::Term;
use crate::trace::{EntityRef, Token};
use smtstorm_solver::{SatResult, SolverError, SolverResult, SortKind, TermHandle};

fn may_check_sat(mgr: &SolverManager) -> bool {
    !mgr.has_open_binder() && (mgr.incremental || mgr.n_sat_calls == 0)
}

/// Plain check-sat.
pub struct ActionCheckSat;

impl Action for ActionCheckSat {
    fn name(&self) -> &'static str {
        "check-sat"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        may_check_sat(mgr)
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let result = mgr.solver_mut().check_sat()?;
        mgr.reset_sat();
        mgr.note_sat_result(result);
        Outcome::played("check-sat".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let result = mgr.solver_mut().check_sat()?;
        mgr.reset_sat();
        mgr.note_sat_result(result);
        Ok(Vec::new())
    }
}

/// check-sat under a freshly drawn set of Bool assumptions.
pub struct ActionCheckSatAssuming;

impl ActionCheckSatAssuming {
    fn execute(mgr: &mut SolverManager, terms: &[Term]) -> SolverResult<SatResult> {
        let handles: Vec<TermHandle> = terms.iter().map(|t| t.handle).collect();
        let result = mgr.solver_mut().check_sat_assuming(&handles)?;
        mgr.reset_sat();
        for t in terms {
            mgr.note_assumption(t.id);
        }
        mgr.note_sat_result(result);
        Ok(result)
    }
}

impl Action for ActionCheckSatAssuming {
    fn name(&self) -> &'static str {
        "check-sat-assuming"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        may_check_sat(mgr) && mgr.has_term_of_kind(SortKind::Bool)
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let wanted = mgr.rng.range_usize(1, 5);
        let terms = mgr.pick_terms_of_kind(SortKind::Bool, wanted);
        if terms.is_empty() {
            return Ok(Outcome::Skipped);
        }
        Self::execute(mgr, &terms)?;
        let refs: Vec<String> = terms.iter().map(|t| format!("t{}", t.id)).collect();
        Outcome::played(
            format!("check-sat-assuming {} {}", terms.len(), refs.join(" ")),
            Vec::new(),
        )
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let n = need_usize(args, 0, "assumption count")?;
        let mut terms = Vec::with_capacity(n);
        for i in 0..n {
            terms.push(resolve_term(mgr, need(args, 1 + i, "assumption")?)?);
        }
        Self::execute(mgr, &terms)?;
        Ok(Vec::new())
    }
}

/// Query model values for a handful of terms.
pub struct ActionGetValue;

impl ActionGetValue {
    fn model_window(mgr: &SolverManager) -> bool {
        mgr.model_gen && mgr.sat_called && mgr.sat_result == SatResult::Sat
    }

    /// Fetch values and record the returned terms, reusing ids where the
    /// adapter hands back a known term.
    fn execute(mgr: &mut SolverManager, terms: &[Term]) -> SolverResult<Vec<EntityRef>> {
        let mut created = Vec::with_capacity(terms.len());
        for t in terms {
            let value = mgr.solver_mut().get_value(t.handle)?;
            let id = match mgr.find_term(value, t.sort_id) {
                Some(existing) => existing,
                None => mgr.add_result_term(value, true)?,
            };
            created.push(EntityRef::Term(id));
        }
        Ok(created)
    }
}

impl Action for ActionGetValue {
    fn name(&self) -> &'static str {
        "get-value"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        Self::model_window(mgr) && mgr.has_term() && !mgr.has_open_binder()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let n = mgr.rng.range_usize(1, 3);
        let terms: Vec<Term> = (0..n).map(|_| mgr.pick_term()).collect();
        let created = Self::execute(mgr, &terms)?;
        let refs: Vec<String> = terms.iter().map(|t| format!("t{}", t.id)).collect();
        Outcome::played(format!("get-value {} {}", n, refs.join(" ")), created)
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let n = need_usize(args, 0, "term count")?;
        let mut terms = Vec::with_capacity(n);
        for i in 0..n {
            terms.push(resolve_term(mgr, need(args, 1 + i, "term")?)?);
        }
        Ok(Self::execute(mgr, &terms)?)
    }
}

/// Fetch the failed assumptions after an unsat check-sat-assuming.
pub struct ActionGetUnsatAssumptions;

impl ActionGetUnsatAssumptions {
    /// Post-condition: everything returned was actually assumed.
    fn verify(mgr: &SolverManager, returned: &[TermHandle]) -> SolverResult<()> {
        let assumed_handles: Vec<TermHandle> = mgr
            .assumptions()
            .iter()
            .filter_map(|id| mgr.term(*id))
            .map(|t| t.handle)
            .collect();
        for h in returned {
            let known = assumed_handles
                .iter()
                .any(|a| mgr.solver().terms_equal(*a, *h));
            if !known {
                return Err(SolverError::failure(
                    "solver returned an unsat assumption that was never assumed",
                ));
            }
        }
        Ok(())
    }
}

impl Action for ActionGetUnsatAssumptions {
    fn name(&self) -> &'static str {
        "get-unsat-assumptions"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.unsat_assumptions
            && mgr.sat_called
            && mgr.sat_result == SatResult::Unsat
            && mgr.has_assumed()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let returned = mgr.solver_mut().get_unsat_assumptions()?;
        Self::verify(mgr, &returned)?;
        Outcome::played("get-unsat-assumptions".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let returned = mgr.solver_mut().get_unsat_assumptions()?;
        Self::verify(mgr, &returned)?;
        Ok(Vec::new())
    }
}

/// Fetch an unsat core.
pub struct ActionGetUnsatCore;

impl Action for ActionGetUnsatCore {
    fn name(&self) -> &'static str {
        "get-unsat-core"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.unsat_cores && mgr.sat_called && mgr.sat_result == SatResult::Unsat
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().get_unsat_core()?;
        Outcome::played("get-unsat-core".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().get_unsat_core()?;
        Ok(Vec::new())
    }
}

/// Fetch the whole model.
pub struct ActionGetModel;

impl Action for ActionGetModel {
    fn name(&self) -> &'static str {
        "get-model"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.model_gen && mgr.sat_called && mgr.sat_result == SatResult::Sat
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().get_model()?;
        Outcome::played("get-model".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().get_model()?;
        Ok(Vec::new())
    }
}

/// Fetch a proof of the latest unsat answer.
pub struct ActionGetProof;

impl Action for ActionGetProof {
    fn name(&self) -> &'static str {
        "get-proof"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.proofs && mgr.sat_called && mgr.sat_result == SatResult::Unsat
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().get_proof()?;
        Outcome::played("get-proof".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().get_proof()?;
        Ok(Vec::new())
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
        SolverManager::new(solver, 31, &ManagerConfig::default())
    }

    fn add_bool_value(mgr: &mut SolverManager, literal: &str) -> u64 {
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::Bool, &SortParams::None)
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::Bool, handle, SortParams::None);
        let v = mgr.solver_mut().mk_value(handle, literal).unwrap();
        mgr.add_input(v, sort_id, true)
    }

    #[test]
    fn check_sat_gate_without_incremental() {
        let mut mgr = manager();
        assert!(ActionCheckSat.enabled(&mgr));
        ActionCheckSat.run(&mut mgr).unwrap();
        assert!(!ActionCheckSat.enabled(&mgr));
        mgr.incremental = true;
        assert!(ActionCheckSat.enabled(&mgr));
    }

    #[test]
    fn check_sat_empty_is_sat() {
        let mut mgr = manager();
        ActionCheckSat.run(&mut mgr).unwrap();
        assert_eq!(mgr.sat_result, SatResult::Sat);
        assert!(mgr.sat_called);
        assert_eq!(mgr.n_sat_calls, 1);
    }

    #[test]
    fn assuming_records_the_assumption_set() {
        let mut mgr = manager();
        let t = add_bool_value(&mut mgr, "true");
        let f = add_bool_value(&mut mgr, "false");
        let tokens = vec![
            Token::Word("2".to_string()),
            Token::TermRef(0),
            Token::TermRef(1),
        ];
        mgr.register_term(0, t);
        mgr.register_term(1, f);
        ActionCheckSatAssuming.replay(&mut mgr, &tokens).unwrap();
        assert!(mgr.is_assumed(t));
        assert!(mgr.is_assumed(f));
        assert_eq!(mgr.sat_result, SatResult::Unsat);
    }

    #[test]
    fn unsat_assumptions_are_verified_subset() {
        let mut mgr = manager();
        let t = add_bool_value(&mut mgr, "true");
        let f = add_bool_value(&mut mgr, "false");
        mgr.unsat_assumptions = true;
        mgr.register_term(0, t);
        mgr.register_term(1, f);
        let tokens = vec![
            Token::Word("2".to_string()),
            Token::TermRef(0),
            Token::TermRef(1),
        ];
        ActionCheckSatAssuming.replay(&mut mgr, &tokens).unwrap();
        assert!(ActionGetUnsatAssumptions.enabled(&mgr));
        ActionGetUnsatAssumptions.run(&mut mgr).unwrap();
    }

    #[test]
    fn get_value_registers_fresh_value_terms() {
        let mut mgr = manager();
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::Int, &SortParams::None)
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::Int, handle, SortParams::None);
        let c = mgr.solver_mut().mk_const(handle, "x").unwrap();
        let x = mgr.add_input(c, sort_id, false);
        mgr.model_gen = true;
        ActionCheckSat.run(&mut mgr).unwrap();
        assert!(ActionGetValue.enabled(&mgr));
        let term = mgr.term(x).unwrap().clone();
        let created = ActionGetValue::execute(&mut mgr, &[term]).unwrap();
        assert_eq!(created.len(), 1);
        match created[0] {
            EntityRef::Term(id) => assert!(mgr.term(id).unwrap().is_value),
            _ => panic!("expected a term"),
        }
    }

    #[test]
    fn get_proof_gated_on_flag_and_unsat() {
        let mut mgr = manager();
        let f = add_bool_value(&mut mgr, "false");
        mgr.register_term(0, f);
        assert!(!ActionGetProof.enabled(&mgr));
        mgr.proofs = true;
        let tokens = vec![Token::Word("1".to_string()), Token::TermRef(0)];
        ActionCheckSatAssuming.replay(&mut mgr, &tokens).unwrap();
        assert_eq!(mgr.sat_result, SatResult::Unsat);
        assert!(ActionGetProof.enabled(&mgr));
        // The stub has no proof machinery: the action is discarded, not
        // treated as a failure.
        let err = ActionGetProof.run(&mut mgr).unwrap_err();
        assert!(err.is_unsupported());
        mgr.reset_sat();
        assert!(!ActionGetProof.enabled(&mgr));
    }

    #[test]
    fn model_queries_closed_after_state_change() {
        let mut mgr = manager();
        add_bool_value(&mut mgr, "true");
        mgr.model_gen = true;
        mgr.incremental = true;
        ActionCheckSat.run(&mut mgr).unwrap();
        assert!(ActionGetModel.enabled(&mgr));
        mgr.push_levels(1);
        assert!(!ActionGetModel.enabled(&mgr));
        assert!(!ActionGetValue.enabled(&mgr));
    }
}
