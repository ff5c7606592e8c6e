//! Lifecycle and entity-creating actions: new, delete, mk-sort, mk-const,
//! mk-var, mk-value, and the phantom term-get-sort.

use super::{need, need_str, need_u32, resolve_sort, resolve_term, Action, Outcome, ReplayError};
use crate::manager::{SolverManager, FP_FORMATS, MAX_BV_WIDTH};
use crate::trace::{quote, EntityRef, Token};
use smtstorm_solver::{SolverResult, SortKind, SortParams, TheoryId};

/// Sort kinds whose values can be written as literals.
const VALUE_KINDS: [SortKind; 6] = [
    SortKind::Bool,
    SortKind::Bv,
    SortKind::Int,
    SortKind::Real,
    SortKind::Rm,
    SortKind::String,
];

fn kind_params_tokens(kind: SortKind, params: &SortParams, mgr: &SolverManager) -> String {
    match params {
        SortParams::None => kind.to_string(),
        SortParams::Bv { width } => format!("{} {}", kind, width),
        SortParams::Fp { eb, sb } => format!("{} {} {}", kind, eb, sb),
        SortParams::Array { index, element } => {
            let index_id = mgr.find_sort(*index).expect("component sort registered");
            let element_id = mgr.find_sort(*element).expect("component sort registered");
            format!("{} s{} s{}", kind, index_id, element_id)
        }
    }
}

/// Bring up the solver instance.
pub struct ActionNew;

impl Action for ActionNew {
    fn name(&self) -> &'static str {
        "new"
    }

    fn enabled(&self, _mgr: &SolverManager) -> bool {
        true
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().init()?;
        Outcome::played("new".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().init()?;
        Ok(Vec::new())
    }
}

/// Tear the solver instance down.
pub struct ActionDelete;

impl Action for ActionDelete {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn enabled(&self, _mgr: &SolverManager) -> bool {
        true
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        mgr.solver_mut().teardown()?;
        Outcome::played("delete".to_string(), Vec::new())
    }

    fn replay(&self, mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        mgr.solver_mut().teardown()?;
        Ok(Vec::new())
    }
}

/// Create a sort of a random enabled kind.
pub struct ActionMkSort;

impl ActionMkSort {
    fn candidate_kinds(mgr: &SolverManager) -> Vec<SortKind> {
        SortKind::ALL
            .iter()
            .copied()
            .filter(|k| mgr.theory_enabled(k.theory()))
            .filter(|k| {
                // Arrays need component sorts to exist already.
                *k != SortKind::Array
                    || SortKind::ALL
                        .iter()
                        .any(|c| *c != SortKind::Reglan && mgr.has_sort_of_kind(*c))
            })
            .collect()
    }
}

impl Action for ActionMkSort {
    fn name(&self) -> &'static str {
        "mk-sort"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        !Self::candidate_kinds(mgr).is_empty()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let kinds = Self::candidate_kinds(mgr);
        let kind = *mgr.rng.pick(&kinds);
        let params = match kind {
            SortKind::Bv => SortParams::Bv {
                width: mgr.rng.bv_width(MAX_BV_WIDTH),
            },
            SortKind::Fp => {
                let (eb, sb) = *mgr.rng.pick(&FP_FORMATS);
                SortParams::Fp { eb, sb }
            }
            SortKind::Array => {
                let components: Vec<SortKind> = SortKind::ALL
                    .iter()
                    .copied()
                    .filter(|c| *c != SortKind::Reglan && mgr.has_sort_of_kind(*c))
                    .collect();
                let index_kind = *mgr.rng.pick(&components);
                let element_kind = *mgr.rng.pick(&components);
                let index = mgr.pick_sort_of_kind(index_kind, false).handle;
                let element = mgr.pick_sort_of_kind(element_kind, false).handle;
                SortParams::Array { index, element }
            }
            _ => SortParams::None,
        };
        let line_tail = kind_params_tokens(kind, &params, mgr);
        let handle = mgr.solver_mut().mk_sort(kind, &params)?;
        let sort_id = mgr.add_sort(kind, handle, params);
        Outcome::played(
            format!("mk-sort {}", line_tail),
            vec![EntityRef::Sort(sort_id)],
        )
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let kind: SortKind = need(args, 0, "sort kind")?
            .word()
            .and_then(|w| w.parse().ok())
            .ok_or_else(|| ReplayError::Malformed("bad sort kind".to_string()))?;
        let params = match kind {
            SortKind::Bv => SortParams::Bv {
                width: need_u32(args, 1, "width")?,
            },
            SortKind::Fp => SortParams::Fp {
                eb: need_u32(args, 1, "eb")?,
                sb: need_u32(args, 2, "sb")?,
            },
            SortKind::Array => SortParams::Array {
                index: resolve_sort(mgr, need(args, 1, "index sort")?)?.handle,
                element: resolve_sort(mgr, need(args, 2, "element sort")?)?.handle,
            },
            _ => SortParams::None,
        };
        let handle = mgr.solver_mut().mk_sort(kind, &params)?;
        let sort_id = mgr.add_sort(kind, handle, params);
        Ok(vec![EntityRef::Sort(sort_id)])
    }
}

/// Declare a constant of an existing sort.
pub struct ActionMkConst;

impl ActionMkConst {
    fn candidate_kinds(mgr: &SolverManager) -> Vec<SortKind> {
        SortKind::ALL
            .iter()
            .copied()
            .filter(|k| *k != SortKind::Reglan && mgr.has_sort_of_kind(*k))
            .collect()
    }
}

impl Action for ActionMkConst {
    fn name(&self) -> &'static str {
        "mk-const"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        !Self::candidate_kinds(mgr).is_empty()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let kinds = Self::candidate_kinds(mgr);
        let kind = *mgr.rng.pick(&kinds);
        let sort = mgr.pick_sort_of_kind(kind, false);
        let symbol = mgr.pick_symbol();
        let handle = mgr.solver_mut().mk_const(sort.handle, &symbol)?;
        let term_id = mgr.add_input(handle, sort.id, false);
        Outcome::played(
            format!("mk-const s{} {}", sort.id, quote(&symbol)),
            vec![EntityRef::Term(term_id)],
        )
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let sort = resolve_sort(mgr, need(args, 0, "sort")?)?;
        let symbol = need_str(args, 1, "symbol")?.to_string();
        let handle = mgr.solver_mut().mk_const(sort.handle, &symbol)?;
        let term_id = mgr.add_input(handle, sort.id, false);
        Ok(vec![EntityRef::Term(term_id)])
    }
}

/// Create a bound variable, opening a binder level.
pub struct ActionMkVar;

impl ActionMkVar {
    fn candidate_kinds(mgr: &SolverManager) -> Vec<SortKind> {
        SortKind::ALL
            .iter()
            .copied()
            .filter(|k| *k != SortKind::Reglan && mgr.has_sort_of_kind(*k))
            .collect()
    }
}

impl Action for ActionMkVar {
    fn name(&self) -> &'static str {
        "mk-var"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        mgr.theory_enabled(TheoryId::Quant)
            && !mgr.has_open_binder()
            && !Self::candidate_kinds(mgr).is_empty()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let kinds = Self::candidate_kinds(mgr);
        let kind = *mgr.rng.pick(&kinds);
        let sort = mgr.pick_sort_of_kind(kind, false);
        let symbol = mgr.pick_symbol();
        let handle = mgr.solver_mut().mk_var(sort.handle, &symbol)?;
        let term_id = mgr.add_var(handle, sort.id);
        Outcome::played(
            format!("mk-var s{} {}", sort.id, quote(&symbol)),
            vec![EntityRef::Term(term_id)],
        )
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let sort = resolve_sort(mgr, need(args, 0, "sort")?)?;
        let symbol = need_str(args, 1, "symbol")?.to_string();
        let handle = mgr.solver_mut().mk_var(sort.handle, &symbol)?;
        let term_id = mgr.add_var(handle, sort.id);
        Ok(vec![EntityRef::Term(term_id)])
    }
}

/// Create a value term from a random literal.
pub struct ActionMkValue;

impl ActionMkValue {
    fn candidate_kinds(mgr: &SolverManager) -> Vec<SortKind> {
        VALUE_KINDS
            .iter()
            .copied()
            .filter(|k| mgr.has_sort_of_kind(*k))
            .collect()
    }

    fn literal(mgr: &mut SolverManager, kind: SortKind, width: Option<u32>) -> String {
        match kind {
            SortKind::Bool => if mgr.rng.flip() { "true" } else { "false" }.to_string(),
            SortKind::Int => mgr.rng.int_literal(),
            SortKind::Real => mgr.rng.real_literal(),
            SortKind::Rm => mgr.rng.rm_literal().to_string(),
            SortKind::String => mgr.rng.string_literal(8),
            SortKind::Bv => mgr.rng.bv_literal(width.expect("BV sort has a width")),
            _ => unreachable!("non-value sort kind"),
        }
    }

    fn record(mgr: &mut SolverManager, handle: smtstorm_solver::TermHandle, sort_id: u64, kind: SortKind, literal: &str) -> u64 {
        let term_id = mgr.add_input(handle, sort_id, true);
        if kind == SortKind::String && literal.chars().count() == 1 {
            mgr.note_string_char_value(term_id);
        }
        term_id
    }
}

impl Action for ActionMkValue {
    fn name(&self) -> &'static str {
        "mk-value"
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        !Self::candidate_kinds(mgr).is_empty()
    }

    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome> {
        let kinds = Self::candidate_kinds(mgr);
        let kind = *mgr.rng.pick(&kinds);
        let sort = mgr.pick_sort_of_kind(kind, false);
        let literal = Self::literal(mgr, kind, sort.bv_width());
        let handle = mgr.solver_mut().mk_value(sort.handle, &literal)?;
        let term_id = Self::record(mgr, handle, sort.id, kind, &literal);
        Outcome::played(
            format!("mk-value s{} {}", sort.id, quote(&literal)),
            vec![EntityRef::Term(term_id)],
        )
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let sort = resolve_sort(mgr, need(args, 0, "sort")?)?;
        let literal = need_str(args, 1, "literal")?.to_string();
        let handle = mgr.solver_mut().mk_value(sort.handle, &literal)?;
        let term_id = Self::record(mgr, handle, sort.id, sort.kind, &literal);
        Ok(vec![EntityRef::Term(term_id)])
    }
}

/// Phantom action announcing the sort of a term created with a
/// previously-unseen sort.  Never selected by the state machine; the run
/// loop emits it, and replay uses it to register the sort id.
pub struct ActionTermGetSort;

impl Action for ActionTermGetSort {
    fn name(&self) -> &'static str {
        "term-get-sort"
    }

    fn enabled(&self, _mgr: &SolverManager) -> bool {
        false
    }

    fn run(&self, _mgr: &mut SolverManager) -> SolverResult<Outcome> {
        Ok(Outcome::Skipped)
    }

    fn replay(&self, mgr: &mut SolverManager, args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        let term = resolve_term(mgr, need(args, 0, "term")?)?;
        Ok(vec![EntityRef::Sort(term.sort_id)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use smtstorm_solver::stub::StubSolver;
    use smtstorm_solver::Solver as _;

    fn manager() -> SolverManager {
        let mut solver = Box::new(StubSolver::new());
        solver.init().unwrap();
        SolverManager::new(solver, 17, &ManagerConfig::default())
    }

    fn run_played(action: &dyn Action, mgr: &mut SolverManager) -> (String, Vec<EntityRef>) {
        match action.run(mgr).unwrap() {
            Outcome::Played { line, created } => (line, created),
            other => panic!("expected Played, got {:?}", other),
        }
    }

    #[test]
    fn mk_sort_traces_and_registers() {
        let mut mgr = manager();
        let (line, created) = run_played(&ActionMkSort, &mut mgr);
        assert!(line.starts_with("mk-sort "));
        assert_eq!(created.len(), 1);
        assert!(mgr.has_sort());
    }

    #[test]
    fn mk_const_needs_a_sort() {
        let mut mgr = manager();
        assert!(!ActionMkConst.enabled(&mgr));
        run_played(&ActionMkSort, &mut mgr);
        // Keep creating sorts until a const-capable one exists.
        while !ActionMkConst.enabled(&mgr) {
            run_played(&ActionMkSort, &mut mgr);
        }
        let (line, created) = run_played(&ActionMkConst, &mut mgr);
        assert!(line.starts_with("mk-const s"));
        assert_eq!(created.len(), 1);
        assert!(mgr.has_term());
    }

    #[test]
    fn mk_value_records_string_chars() {
        let mut mgr = manager();
        let handle = mgr
            .solver_mut()
            .mk_sort(SortKind::String, &SortParams::None)
            .unwrap();
        let sort_id = mgr.add_sort(SortKind::String, handle, SortParams::None);
        let th = mgr.solver_mut().mk_value(handle, "x").unwrap();
        let term_id = ActionMkValue::record(&mut mgr, th, sort_id, SortKind::String, "x");
        assert!(mgr.has_string_char_value());
        assert_eq!(mgr.pick_string_char_value().id, term_id);
    }

    #[test]
    fn mk_var_opens_binder() {
        let mut mgr = manager();
        while !ActionMkVar.enabled(&mgr) {
            run_played(&ActionMkSort, &mut mgr);
        }
        run_played(&ActionMkVar, &mut mgr);
        assert!(mgr.has_open_binder());
        assert!(mgr.has_var());
        // Only one binder at a time.
        assert!(!ActionMkVar.enabled(&mgr));
    }

    #[test]
    fn replay_mk_sort_maps_ids() {
        let mut mgr = manager();
        let tokens = vec![Token::Word("BV".to_string()), Token::Word("8".to_string())];
        let created = ActionMkSort.replay(&mut mgr, &tokens).unwrap();
        match created[0] {
            EntityRef::Sort(id) => assert!(mgr.sort(id).is_some()),
            _ => panic!("expected a sort"),
        }
    }

    #[test]
    fn term_get_sort_reports_the_terms_sort() {
        let mut mgr = manager();
        let tokens = vec![Token::Word("BOOL".to_string())];
        let created = ActionMkSort.replay(&mut mgr, &tokens).unwrap();
        let sort_id = match created[0] {
            EntityRef::Sort(id) => id,
            _ => unreachable!(),
        };
        mgr.register_sort(0, sort_id);
        let const_tokens = vec![Token::SortRef(0), Token::Str("c".to_string())];
        let created = ActionMkConst.replay(&mut mgr, &const_tokens).unwrap();
        let term_id = match created[0] {
            EntityRef::Term(id) => id,
            _ => unreachable!(),
        };
        mgr.register_term(0, term_id);
        let got = ActionTermGetSort
            .replay(&mut mgr, &[Token::TermRef(0)])
            .unwrap();
        assert_eq!(got, vec![EntityRef::Sort(sort_id)]);
    }
}
