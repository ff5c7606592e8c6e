//! Session-state actions: options, assertions, scopes, resets.

use super::{need, need_u32, resolve_term, Action, Outcome, ReplayError};
use crate::manager::SolverManager;
use crate::trace::{EntityRef, Token};
use smtstorm_solver::{SolverResult, SortKind};

/// Deepest push stack the generator builds.
const MAX_PUSH_LEVELS: u32 = 8;

fn apply_option_flags(mgr: &mut SolverManager, name: &str, value: &str) {
    let on = value == "true";
    match name {
        "incremental" => mgr.incremental = on,
        "produce-models" => mgr.model_gen = on,
        "produce-unsat-assumptions" => mgr.unsat_assumptions = on,
        "produce-unsat-cores" => mgr.unsat_cores = on,
        "produce-proofs" => mgr.proofs = on,
        _ => {}
    }
}

/// Set a solver option; each option at most once per session.
pub struct ActionSetOption;

impl Action for ActionSetOption {
    fn name(&self) -> &'static str {
        "set-option"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.has_unused_option()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let Some((name, value)) = mgr.pick_option() else {
            return Ok(Outcome::Skipped);
        };
        mgr.solver_mut().set_opt(&name, &value)?;
        mgr.note_option_used(&name);
        apply_option_flags(mgr, &name, &value);
        mgr.reset_sat();
        Outcome::played(format!("set-option {} {}", name, value), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let name = need(args, 0, "option name")?
            .word()
            .ok_or_else(|| ReplayError::Malformed("option name must be a word".to_string()))?
            .to_string();
        let value = need(args, 1, "option value")?
            .word()
            .ok_or_else(|| ReplayError::Malformed("option value must be a word".to_string()))?
            .to_string();
        mgr.solver_mut().set_opt(&name, &value)?;
        mgr.note_option_used(&name);
        apply_option_flags(mgr, &name, &value);
        mgr.reset_sat();
        Ok(Vec::new())
    }
}

/// Assert a Bool term.
pub struct ActionAssertFormula;

impl Action for ActionAssertFormula {
    fn name(&self) -> &'static str {
        "assert-formula"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.has_term_of_kind(SortKind::Bool) && !mgr.has_open_binder()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let term = mgr.pick_term_of_kind(SortKind::Bool);
        mgr.solver_mut().assert_formula(term.handle)?;
        mgr.reset_sat();
        Outcome::played(format!("assert-formula t{}", term.id), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let term = resolve_term(mgr, need(args, 0, "formula")?)?;
        mgr.solver_mut().assert_formula(term.handle)?;
        mgr.reset_sat();
        Ok(Vec::new())
    }
}

/// Open `n` scope levels.
pub struct ActionPush;

impl Action for ActionPush {
    fn name(&self) -> &'static str {
        "push"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        !mgr.has_open_binder() && mgr.n_push_levels < MAX_PUSH_LEVELS
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let n = mgr
            .rng
            .range_u32(1, 2)
            .min(MAX_PUSH_LEVELS - mgr.n_push_levels);
        mgr.solver_mut().push(n)?;
        mgr.push_levels(n);
        Outcome::played(format!("push {}", n), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let n = need_u32(args, 0, "level count")?;
        mgr.solver_mut().push(n)?;
        mgr.push_levels(n);
        Ok(Vec::new())
    }
}

/// Close `n` scope levels, dropping the terms created inside them.
pub struct ActionPop;

impl Action for ActionPop {
    fn name(&self) -> &'static str {
        "pop"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        !mgr.has_open_binder() && mgr.n_push_levels > 0
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let n = mgr.rng.range_u32(1, mgr.n_push_levels.min(2));
        mgr.solver_mut().pop(n)?;
        mgr.pop_levels(n);
        Outcome::played(format!("pop {}", n), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let n = need_u32(args, 0, "level count")?;
        if n > mgr.n_push_levels {
            return Err(ReplayError::Malformed(format!(
                "pop {} with only {} levels pushed",
                n, mgr.n_push_levels
            )));
        }
        mgr.solver_mut().pop(n)?;
        mgr.pop_levels(n);
        Ok(Vec::new())
    }
}

/// Full reset: back to the fresh-instance state.
pub struct ActionReset;

impl Action for ActionReset {
    fn name(&self) -> &'static str {
        "reset"
    }

    fn enabled(&self, _mgr: &SolverManager) -> bool {
        true
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().reset()?;
        mgr.clear();
        Outcome::played("reset".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().reset()?;
        mgr.clear();
        Ok(Vec::new())
    }
}

/// Remove all assertions, keeping level-0 declarations.
pub struct ActionResetAssertions;

impl Action for ActionResetAssertions {
    fn name(&self) -> &'static str {
        "reset-assertions"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        !mgr.has_open_binder()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().reset_assertions()?;
        mgr.clear_assertion_state();
        Outcome::played("reset-assertions".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().reset_assertions()?;
        mgr.clear_assertion_state();
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use smtstorm_solver::stub::StubSolver;
    use smtstorm_solver::{SatResult, Solver as _, SortParams};

    fn manager() -> SolverManager {
        let mut solver = Box::new(StubSolver::new());
        solver.init().unwrap();
        SolverManager::new(solver, 23, &ManagerConfig::default())
    }

    fn add_bool_const(mgr: &mut SolverManager) -> u64 {
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::Bool, &SortParams::None)
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::Bool, handle, SortParams::None);
        let c = mgr.solver_mut().mk_const(handle, "b").unwrap();
        mgr.add_input(c, sort_id, false)
    }

    #[test]
    fn set_option_updates_session_flags() {
        let mut mgr = manager();
        let tokens = vec![
            Token::Word("incremental".to_string()),
            Token::Word("true".to_string()),
        ];
        ActionSetOption.replay(&mut mgr, &tokens).unwrap();
        assert!(mgr.incremental);
        let tokens = vec![
            Token::Word("produce-models".to_string()),
            Token::Word("true".to_string()),
        ];
        ActionSetOption.replay(&mut mgr, &tokens).unwrap();
        assert!(mgr.model_gen);
    }

    #[test]
    fn set_option_invalidates_sat_window() {
        let mut mgr = manager();
        mgr.note_sat_result(SatResult::Sat);
        let tokens = vec![
            Token::Word("produce-unsat-cores".to_string()),
            Token::Word("true".to_string()),
        ];
        ActionSetOption.replay(&mut mgr, &tokens).unwrap();
        assert!(!mgr.sat_called);
    }

    #[test]
    fn assert_requires_bool_terms() {
        let mut mgr = manager();
        assert!(!ActionAssertFormula.enabled(&mgr));
        add_bool_const(&mut mgr);
        assert!(ActionAssertFormula.enabled(&mgr));
        match ActionAssertFormula.run(&mut mgr).unwrap() {
            Outcome::Played { line, .. } => assert!(line.starts_with("assert-formula t")),
            other => panic!("expected Played, got {:?}", other),
        }
    }

    #[test]
    fn push_pop_track_levels() {
        let mut mgr = manager();
        assert!(!ActionPop.enabled(&mgr));
        ActionPush.run(&mut mgr).unwrap();
        assert!(mgr.n_push_levels > 0);
        assert!(ActionPop.enabled(&mgr));
        while mgr.n_push_levels > 0 {
            ActionPop.run(&mut mgr).unwrap();
        }
        assert!(!ActionPop.enabled(&mgr));
    }

    #[test]
    fn push_guard_caps_depth() {
        let mut mgr = manager();
        while ActionPush.enabled(&mgr) {
            ActionPush.run(&mut mgr).unwrap();
        }
        assert_eq!(mgr.n_push_levels, MAX_PUSH_LEVELS);
    }

    #[test]
    fn replayed_pop_below_stack_is_malformed() {
        let mut mgr = manager();
        let err = ActionPop
            .replay(&mut mgr, &[Token::Word("1".to_string())])
            .unwrap_err();
        assert!(matches!(err, ReplayError::Malformed(_)));
    }

    #[test]
    fn reset_clears_everything() {
        let mut mgr = manager();
        add_bool_const(&mut mgr);
        mgr.note_sat_result(SatResult::Sat);
        ActionReset.run(&mut mgr).unwrap();
        assert!(!mgr.has_sort());
        assert!(!mgr.has_term());
        assert!(!mgr.sat_called);
        assert_eq!(mgr.n_sat_calls, 0);
    }

    #[test]
    fn reset_assertions_keeps_base_declarations() {
        let mut mgr = manager();
        let id = add_bool_const(&mut mgr);
        ActionPush.run(&mut mgr).unwrap();
        let scoped = add_bool_const(&mut mgr);
        ActionResetAssertions.run(&mut mgr).unwrap();
        assert!(mgr.term(id).is_some());
        assert!(mgr.term(scoped).is_none());
        assert_eq!(mgr.n_push_levels, 0);
    }
}
