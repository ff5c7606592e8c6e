//! The solver manager.
//!
//! Owns the adapter, both databases, the RNG and the session flags, and
//! exposes the picker API used by action generators plus the guard API used
//! by the state machine.  Pickers require that the matching guard held —
//! calling one against an empty selection is a bug in the action catalogue
//! and panics (the run aborts, which is the intended disposition for guard
//! violations).

use crate::rng::RngSource;
use crate::sort_db::{Sort, SortDb};
use crate::term_db::{Term, TermDb};
use log::{debug, info};
use smtstorm_solver::{
    SatResult, Solver, SolverResult, SortHandle, SortKind, SortParams, TermHandle, TheoryId,
    ArgsPattern, Op, OpKind,
};
use std::collections::{HashMap, HashSet};

/// Widest bit-vector sort the tester creates.
pub const MAX_BV_WIDTH: u32 = 128;

/// Floating-point formats worth generating: (eb, sb).
pub const FP_FORMATS: [(u32, u32); 4] = [(3, 5), (5, 11), (8, 24), (11, 53)];

/// Creation counters, reported at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManagerStats {
    /// Constants and values.
    pub inputs: u64,
    pub vars: u64,
    /// All terms, including inputs.
    pub terms: u64,
    pub sorts: u64,
}

/// Tunables fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Restrict Int/Real generation to the linear fragment.
    pub arith_linear: bool,
    /// Precede every traced action with a `set-seed` line.
    pub trace_seeds: bool,
    /// Generate `_sN` symbols instead of random strings.
    pub simple_symbols: bool,
    /// Theories requested on; empty means "all the backend supports".
    pub enable_theories: Vec<TheoryId>,
    /// Theories forced off.
    pub disable_theories: Vec<TheoryId>,
}

pub struct SolverManager {
    solver: Box<dyn Solver>,
    pub rng: RngSource,
    sorts: SortDb,
    terms: TermDb,
    enabled_theories: Vec<TheoryId>,
    /// Metadata of the operator kinds eligible for generation.
    ops: Vec<Op>,

    // Session flags.
    pub incremental: bool,
    pub model_gen: bool,
    pub unsat_assumptions: bool,
    pub unsat_cores: bool,
    pub proofs: bool,
    /// Solver scope depth (binder levels not included).
    pub n_push_levels: u32,
    /// True while the latest check-sat result is still valid (nothing
    /// asserted, assumed, pushed, popped or reconfigured since).
    pub sat_called: bool,
    pub sat_result: SatResult,
    pub n_sat_calls: u32,

    pub arith_linear: bool,
    pub trace_seeds: bool,
    pub simple_symbols: bool,

    /// Term ids assumed by the latest check-sat-assuming.
    assumptions: Vec<u64>,
    used_options: HashSet<String>,
    n_symbols: u64,
    /// Terms whose sort must be announced via a phantom `term-get-sort`.
    pending_get_sorts: Vec<u64>,
    /// Replay maps: traced id → actual id.
    untraced_terms: HashMap<u64, u64>,
    untraced_sorts: HashMap<u64, u64>,

    pub stats: ManagerStats,
}

impl SolverManager {
    pub fn new(solver: Box<dyn Solver>, seed: u32, config: &ManagerConfig) -> Self {
        let supported = solver.supported_theories();
        let requested: Vec<TheoryId> = if config.enable_theories.is_empty() {
            supported.clone()
        } else {
            config.enable_theories.clone()
        };
        let mut enabled: Vec<TheoryId> = requested
            .into_iter()
            .filter(|t| supported.contains(t) && !config.disable_theories.contains(t))
            .collect();
        // Bool is the glue theory; a run without it cannot assert anything.
        if !enabled.contains(&TheoryId::Bool) {
            enabled.push(TheoryId::Bool);
        }
        enabled.sort_unstable();
        enabled.dedup();
        info!("enabled theories: {:?}", enabled);

        let ops: Vec<Op> = OpKind::ALL
            .iter()
            .map(|k| k.op())
            .filter(|op| enabled.contains(&op.theory))
            .collect();

        Self {
            solver,
            rng: RngSource::new(seed),
            sorts: SortDb::new(),
            terms: TermDb::new(),
            enabled_theories: enabled,
            ops,
            incremental: false,
            model_gen: false,
            unsat_assumptions: false,
            unsat_cores: false,
            proofs: false,
            n_push_levels: 0,
            sat_called: false,
            sat_result: SatResult::Unknown,
            n_sat_calls: 0,
            arith_linear: config.arith_linear,
            trace_seeds: config.trace_seeds,
            simple_symbols: config.simple_symbols,
            assumptions: Vec::new(),
            used_options: HashSet::new(),
            n_symbols: 0,
            pending_get_sorts: Vec::new(),
            untraced_terms: HashMap::new(),
            untraced_sorts: HashMap::new(),
            stats: ManagerStats::default(),
        }
    }

    pub fn solver_mut(&mut self) -> &mut dyn Solver {
        self.solver.as_mut()
    }

    pub fn solver(&self) -> &dyn Solver {
        self.solver.as_ref()
    }

    pub fn enabled_theories(&self) -> &[TheoryId] {
        &self.enabled_theories
    }

    pub fn theory_enabled(&self, theory: TheoryId) -> bool {
        self.enabled_theories.contains(&theory)
    }

    /// Current scope level, binder levels included.
    pub fn level(&self) -> u32 {
        self.terms.level()
    }

    /// True while a quantifier binder is open.
    pub fn has_open_binder(&self) -> bool {
        self.terms.open_var_levels() > 0
    }

    // ------------------------------------------------------------------
    // Registration.
    // ------------------------------------------------------------------

    /// Insert a sort, deduplicating through the adapter's equality.
    pub fn add_sort(&mut self, kind: SortKind, handle: SortHandle, params: SortParams) -> u64 {
        if let Some(existing) = self.sorts.find_by_handle(handle, self.solver.as_ref()) {
            return existing.id;
        }
        self.stats.sorts += 1;
        self.sorts.add(kind, handle, params)
    }

    /// Insert a constant or value term of a known sort.
    pub fn add_input(&mut self, handle: TermHandle, sort_id: u64, is_value: bool) -> u64 {
        let kind = self.sort_of(sort_id).kind;
        self.stats.inputs += 1;
        self.stats.terms += 1;
        self.terms.add_term(handle, sort_id, kind, is_value)
    }

    /// Insert a bound variable; opens a binder level.
    pub fn add_var(&mut self, handle: TermHandle, sort_id: u64) -> u64 {
        let kind = self.sort_of(sort_id).kind;
        self.stats.vars += 1;
        self.stats.terms += 1;
        self.terms.add_var(handle, sort_id, kind)
    }

    /// Record a length-1 string value.
    pub fn note_string_char_value(&mut self, term_id: u64) {
        self.terms.add_string_char_value(term_id);
    }

    /// Insert a term whose sort is whatever the adapter says it is.
    ///
    /// When the sort was not seen before it is added to the sort database
    /// and the term is queued for a phantom `term-get-sort` trace line so
    /// replay reconstructs the same sort id.
    pub fn add_result_term(&mut self, handle: TermHandle, is_value: bool) -> SolverResult<u64> {
        let sort_handle = self.solver.get_sort(handle)?;
        let (sort_id, fresh_sort) =
            match self.sorts.find_by_handle(sort_handle, self.solver.as_ref()) {
                Some(sort) => (sort.id, false),
                None => {
                    let kind = self.solver.sort_kind(sort_handle)?;
                    let params = self.solver.sort_params(sort_handle)?;
                    self.stats.sorts += 1;
                    (self.sorts.add(kind, sort_handle, params), true)
                }
            };
        let kind = self.sort_of(sort_id).kind;
        self.stats.terms += 1;
        if is_value {
            self.stats.inputs += 1;
        }
        let term_id = self.terms.add_term(handle, sort_id, kind, is_value);
        if fresh_sort {
            debug!("term t{} has a previously-unseen sort s{}", term_id, sort_id);
            self.pending_get_sorts.push(term_id);
        }
        Ok(term_id)
    }

    /// The term already wrapping `handle` at the given sort, if any.
    pub fn find_term(&self, handle: TermHandle, sort_id: u64) -> Option<u64> {
        self.terms
            .find_by_handle(handle, sort_id, self.solver.as_ref())
            .map(|t| t.id)
    }

    /// The sort already wrapping `handle`, if any.
    pub fn find_sort(&self, handle: SortHandle) -> Option<u64> {
        self.sorts
            .find_by_handle(handle, self.solver.as_ref())
            .map(|s| s.id)
    }

    /// Drain the terms queued for phantom `term-get-sort` lines.
    pub fn take_pending_get_sorts(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.pending_get_sorts)
    }

    pub fn term(&self, id: u64) -> Option<&Term> {
        self.terms.get(id)
    }

    pub fn sort(&self, id: u64) -> Option<&Sort> {
        self.sorts.get(id)
    }

    fn term_of(&self, id: u64) -> &Term {
        self.terms.get(id).expect("guard violated: unknown term id")
    }

    fn sort_of(&self, id: u64) -> &Sort {
        self.sorts.get(id).expect("guard violated: unknown sort id")
    }

    // ------------------------------------------------------------------
    // Sort pickers and guards.
    // ------------------------------------------------------------------

    pub fn has_sort(&self) -> bool {
        !self.sorts.is_empty()
    }

    pub fn has_sort_of_kind(&self, kind: SortKind) -> bool {
        self.sorts.has_kind(kind)
    }

    /// True if a sort of `kind` with at least one visible term exists.
    pub fn has_sort_with_terms(&self, kind: SortKind) -> bool {
        self.sorts
            .ids_of_kind(kind)
            .iter()
            .any(|id| !self.terms.ids_of_sort(*id).is_empty())
    }

    pub fn pick_sort(&mut self) -> Sort {
        debug_assert!(self.has_sort(), "guard violated: no sorts");
        let id = *self.rng.pick(self.sorts.ids());
        self.sort_of(id).clone()
    }

    pub fn pick_sort_of_kind(&mut self, kind: SortKind, with_terms: bool) -> Sort {
        let ids: Vec<u64> = self
            .sorts
            .ids_of_kind(kind)
            .iter()
            .copied()
            .filter(|id| !with_terms || !self.terms.ids_of_sort(*id).is_empty())
            .collect();
        debug_assert!(!ids.is_empty(), "guard violated: no {} sorts", kind);
        let id = *self.rng.pick(&ids);
        self.sort_of(id).clone()
    }

    pub fn has_sort_bv(&self, width: u32, with_terms: bool) -> bool {
        self.sorts
            .bv_ids_of_width(width)
            .iter()
            .any(|id| !with_terms || !self.terms.ids_of_sort(*id).is_empty())
    }

    pub fn has_sort_bv_max(&self, max: u32, with_terms: bool) -> bool {
        self.sorts
            .bv_ids_up_to(max)
            .iter()
            .any(|id| !with_terms || !self.terms.ids_of_sort(*id).is_empty())
    }

    pub fn pick_sort_bv(&mut self, width: u32, with_terms: bool) -> Sort {
        let ids: Vec<u64> = self
            .sorts
            .bv_ids_of_width(width)
            .iter()
            .copied()
            .filter(|id| !with_terms || !self.terms.ids_of_sort(*id).is_empty())
            .collect();
        debug_assert!(!ids.is_empty(), "guard violated: no BV-{} sorts", width);
        let id = *self.rng.pick(&ids);
        self.sort_of(id).clone()
    }

    pub fn pick_sort_bv_max(&mut self, max: u32, with_terms: bool) -> Sort {
        let ids: Vec<u64> = self
            .sorts
            .bv_ids_up_to(max)
            .into_iter()
            .filter(|id| !with_terms || !self.terms.ids_of_sort(*id).is_empty())
            .collect();
        debug_assert!(!ids.is_empty(), "guard violated: no BV<={} sorts", max);
        let id = *self.rng.pick(&ids);
        self.sort_of(id).clone()
    }

    /// Terms ever created per sort kind, including popped ones.
    pub fn term_counts(&self) -> Vec<(SortKind, u64)> {
        SortKind::ALL
            .iter()
            .map(|k| (*k, self.terms.created_of_kind(*k)))
            .filter(|(_, n)| *n > 0)
            .collect()
    }

    /// All sorts of `kind`, in insertion order.
    pub fn sorts_of_kind(&self, kind: SortKind) -> Vec<Sort> {
        self.sorts
            .ids_of_kind(kind)
            .iter()
            .filter_map(|id| self.sorts.get(*id))
            .cloned()
            .collect()
    }

    /// Sort kinds of enabled theories, optionally restricted to kinds with
    /// visible terms.
    pub fn sort_kinds(&self, with_terms: bool) -> Vec<SortKind> {
        SortKind::ALL
            .iter()
            .copied()
            .filter(|k| self.theory_enabled(k.theory()))
            .filter(|k| {
                if with_terms {
                    self.terms.visible_of_kind(*k) > 0
                } else {
                    true
                }
            })
            .collect()
    }

    pub fn has_sort_kind(&self, with_terms: bool) -> bool {
        !self.sort_kinds(with_terms).is_empty()
    }

    pub fn pick_sort_kind(&mut self, with_terms: bool) -> SortKind {
        let kinds = self.sort_kinds(with_terms);
        debug_assert!(!kinds.is_empty(), "guard violated: no sort kinds");
        *self.rng.pick(&kinds)
    }

    // ------------------------------------------------------------------
    // Term pickers and guards.
    // ------------------------------------------------------------------

    pub fn has_term(&self) -> bool {
        SortKind::ALL
            .iter()
            .any(|k| self.terms.visible_of_kind(*k) > 0)
    }

    pub fn has_term_of_kind(&self, kind: SortKind) -> bool {
        self.terms.visible_of_kind(kind) > 0
    }

    pub fn has_term_of_sort(&self, sort_id: u64) -> bool {
        !self.terms.ids_of_sort(sort_id).is_empty()
    }

    pub fn pick_term_of_kind(&mut self, kind: SortKind) -> Term {
        let n = self.terms.visible_of_kind(kind);
        debug_assert!(n > 0, "guard violated: no {} terms", kind);
        let idx = self.rng.range_usize(0, n - 1);
        self.terms
            .nth_visible_of_kind(kind, idx)
            .expect("index in range")
            .clone()
    }

    pub fn pick_term_of_kind_at(&mut self, kind: SortKind, level: u32) -> Term {
        let ids = self.terms.ids_of_kind_at(kind, level);
        debug_assert!(!ids.is_empty(), "guard violated: no {} terms at {}", kind, level);
        let id = *self.rng.pick(ids);
        self.term_of(id).clone()
    }

    pub fn pick_term_of_sort(&mut self, sort_id: u64) -> Term {
        let ids = self.terms.ids_of_sort(sort_id);
        debug_assert!(!ids.is_empty(), "guard violated: no terms of sort");
        let id = *self.rng.pick(ids);
        self.term_of(id).clone()
    }

    /// Up to `k` distinct visible terms of `kind`, sampled without
    /// replacement.
    pub fn pick_terms_of_kind(&mut self, kind: SortKind, k: usize) -> Vec<Term> {
        let n = self.terms.visible_of_kind(kind);
        let indices = self.rng.sample(n, k.min(n));
        indices
            .into_iter()
            .map(|i| {
                self.terms
                    .nth_visible_of_kind(kind, i)
                    .expect("index in range")
                    .clone()
            })
            .collect()
    }

    pub fn pick_term(&mut self) -> Term {
        let kinds = self.terms.kinds_with_terms();
        debug_assert!(!kinds.is_empty(), "guard violated: no terms");
        let kind = *self.rng.pick(&kinds);
        self.pick_term_of_kind(kind)
    }

    pub fn has_value_of_sort(&self, sort_id: u64) -> bool {
        !self.terms.value_ids_of_sort(sort_id).is_empty()
    }

    pub fn pick_value_of_sort(&mut self, sort_id: u64) -> Term {
        let ids = self.terms.value_ids_of_sort(sort_id);
        debug_assert!(!ids.is_empty(), "guard violated: no values of sort");
        let id = *self.rng.pick(ids);
        self.term_of(id).clone()
    }

    pub fn has_string_char_value(&self) -> bool {
        !self.terms.string_char_value_ids().is_empty()
    }

    pub fn pick_string_char_value(&mut self) -> Term {
        let ids = self.terms.string_char_value_ids();
        debug_assert!(!ids.is_empty(), "guard violated: no char values");
        let id = *self.rng.pick(ids);
        self.term_of(id).clone()
    }

    pub fn has_var(&self) -> bool {
        !self.terms.var_ids_at_current().is_empty()
    }

    pub fn pick_var(&mut self) -> Term {
        let ids = self.terms.var_ids_at_current();
        debug_assert!(!ids.is_empty(), "guard violated: no variables");
        let id = *self.rng.pick(ids);
        self.term_of(id).clone()
    }

    pub fn has_quant_body(&self) -> bool {
        self.has_term_of_kind(SortKind::Bool)
    }

    /// A Bool term reachable at the current scope level.
    pub fn pick_quant_body(&mut self) -> Term {
        self.pick_term_of_kind(SortKind::Bool)
    }

    /// Close the open binder levels after a quantifier was built.
    pub fn close_binders(&mut self) {
        self.terms.close_var_levels();
    }

    // ------------------------------------------------------------------
    // Theory and op pickers.
    // ------------------------------------------------------------------

    pub fn has_theory(&self, with_terms: bool) -> bool {
        if !with_terms {
            return !self.enabled_theories.is_empty();
        }
        self.ops.iter().any(|op| self.op_applicable(op))
    }

    pub fn pick_theory(&mut self, with_terms: bool) -> TheoryId {
        if !with_terms {
            let theories = self.enabled_theories.clone();
            return *self.rng.pick(&theories);
        }
        let theories: Vec<TheoryId> = {
            let mut set: Vec<TheoryId> = self
                .ops
                .iter()
                .filter(|op| self.op_applicable(op))
                .map(|op| op.theory)
                .collect();
            set.sort_unstable();
            set.dedup();
            set
        };
        debug_assert!(!theories.is_empty(), "guard violated: no applicable theory");
        *self.rng.pick(&theories)
    }

    /// True if the op's operand requirements can currently be met.
    ///
    /// For patterns with cross-argument constraints (arrays, parameterized
    /// widths) this is a cheap necessary check; the generator may still
    /// fail and the action is then skipped.
    pub fn op_applicable(&self, op: &Op) -> bool {
        match op.args {
            ArgsPattern::Kinds(kinds) => kinds.iter().all(|k| self.has_term_of_kind(*k)),
            ArgsPattern::SameAny => self.has_term(),
            ArgsPattern::Ite => {
                self.has_term_of_kind(SortKind::Bool)
                    && self
                        .sorts
                        .ids()
                        .iter()
                        .any(|id| !self.terms.ids_of_sort(*id).is_empty())
            }
            ArgsPattern::Array => self.has_term_of_kind(SortKind::Array),
            ArgsPattern::Quant => self.has_var() && self.has_quant_body(),
        }
    }

    pub fn has_op_kind(&self, with_terms: bool) -> bool {
        if with_terms {
            self.ops.iter().any(|op| self.op_applicable(op))
        } else {
            !self.ops.is_empty()
        }
    }

    pub fn pick_op_kind(&mut self, with_terms: bool) -> Option<OpKind> {
        let candidates: Vec<OpKind> = self
            .ops
            .iter()
            .filter(|op| !with_terms || self.op_applicable(op))
            .map(|op| op.kind)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(*self.rng.pick(&candidates))
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    // ------------------------------------------------------------------
    // Assumptions.
    // ------------------------------------------------------------------

    pub fn note_assumption(&mut self, term_id: u64) {
        self.assumptions.push(term_id);
    }

    pub fn has_assumed(&self) -> bool {
        !self.assumptions.is_empty()
    }

    pub fn is_assumed(&self, term_id: u64) -> bool {
        self.assumptions.contains(&term_id)
    }

    pub fn assumptions(&self) -> &[u64] {
        &self.assumptions
    }

    pub fn pick_assumed(&mut self) -> u64 {
        debug_assert!(self.has_assumed(), "guard violated: nothing assumed");
        *self.rng.pick(&self.assumptions.clone())
    }

    // ------------------------------------------------------------------
    // Options and symbols.
    // ------------------------------------------------------------------

    /// An `(option, value)` pair not yet used this session.
    pub fn pick_option(&mut self) -> Option<(String, String)> {
        let available: Vec<_> = self
            .solver
            .options()
            .into_iter()
            .filter(|o| !self.used_options.contains(&o.name) && !o.values.is_empty())
            .collect();
        if available.is_empty() {
            return None;
        }
        let option = &available[self.rng.range_usize(0, available.len() - 1)];
        let value = if self.arith_linear
            && option.name.contains("nonlinear")
            && option.values.iter().any(|v| v == "false")
        {
            "false".to_string()
        } else {
            self.rng.pick(&option.values).clone()
        };
        Some((option.name.clone(), value))
    }

    pub fn note_option_used(&mut self, name: &str) {
        self.used_options.insert(name.to_string());
    }

    pub fn has_unused_option(&self) -> bool {
        self.solver
            .options()
            .iter()
            .any(|o| !self.used_options.contains(&o.name) && !o.values.is_empty())
    }

    /// A fresh symbol: `_sN` when simple symbols are on, otherwise a random
    /// string, half the time piped.
    pub fn pick_symbol(&mut self) -> String {
        if self.simple_symbols {
            let symbol = format!("_s{}", self.n_symbols);
            self.n_symbols += 1;
            return symbol;
        }
        let len = self.rng.range_usize(1, 16);
        let body: String = (0..len).map(|_| self.rng.string_char()).collect();
        if self.rng.flip() {
            format!("|{}|", body)
        } else {
            // Unpiped symbols must be plain identifiers.
            let cleaned: String = body
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { 'x' })
                .collect();
            format!("x{}", cleaned)
        }
    }

    // ------------------------------------------------------------------
    // Scope and session state.
    // ------------------------------------------------------------------

    pub fn push_levels(&mut self, n: u32) {
        self.terms.push(n);
        self.n_push_levels += n;
        self.reset_sat();
    }

    pub fn pop_levels(&mut self, n: u32) {
        debug_assert!(n <= self.n_push_levels, "guard violated: pop too deep");
        self.terms.pop(n);
        self.n_push_levels -= n;
        self.reset_sat();
    }

    /// Leave the model-query window: the latest check-sat result is stale.
    pub fn reset_sat(&mut self) {
        self.sat_called = false;
        self.assumptions.clear();
    }

    /// Record a check-sat answer.
    pub fn note_sat_result(&mut self, result: SatResult) {
        self.sat_called = true;
        self.sat_result = result;
        self.n_sat_calls += 1;
    }

    /// Full reset: drop both databases and all session state.
    pub fn clear(&mut self) {
        self.sorts.clear();
        self.terms.clear();
        self.assumptions.clear();
        self.used_options.clear();
        self.pending_get_sorts.clear();
        self.untraced_terms.clear();
        self.untraced_sorts.clear();
        self.incremental = false;
        self.model_gen = false;
        self.unsat_assumptions = false;
        self.unsat_cores = false;
        self.proofs = false;
        self.n_push_levels = 0;
        self.sat_called = false;
        self.sat_result = SatResult::Unknown;
        self.n_sat_calls = 0;
    }

    /// Partial reset for `reset-assertions`: scoped entries vanish, level-0
    /// declarations stay.
    pub fn clear_assertion_state(&mut self) {
        let n = self.n_push_levels;
        if n > 0 {
            self.terms.pop(n);
            self.n_push_levels = 0;
        }
        self.reset_sat();
    }

    // ------------------------------------------------------------------
    // Replay maps.
    // ------------------------------------------------------------------

    pub fn register_term(&mut self, untraced_id: u64, term_id: u64) {
        self.untraced_terms.insert(untraced_id, term_id);
    }

    pub fn register_sort(&mut self, untraced_id: u64, sort_id: u64) {
        self.untraced_sorts.insert(untraced_id, sort_id);
    }

    pub fn lookup_untraced_term(&self, untraced_id: u64) -> Option<u64> {
        self.untraced_terms.get(&untraced_id).copied()
    }

    pub fn lookup_untraced_sort(&self, untraced_id: u64) -> Option<u64> {
        self.untraced_sorts.get(&untraced_id).copied()
    }
}
