//! The action catalogue.
//!
//! An action is one atomic step of the state machine: a guard over the
//! manager, a random generator for operands, one adapter call, the
//! bookkeeping that records results back into the databases, and the trace
//! line that makes the step replayable.  `replay` is the inverse of the
//! trace line: parse the recorded tokens, resolve ids through the replay
//! map, and execute the identical adapter call.

mod create;
mod query;
mod state;
mod term;

pub use create::{
    ActionDelete, ActionMkConst, ActionMkSort, ActionMkValue, ActionMkVar, ActionNew,
    ActionTermGetSort,
};
pub use query::{
    ActionCheckSat, ActionCheckSatAssuming, ActionGetModel, ActionGetProof,
    ActionGetUnsatAssumptions, ActionGetUnsatCore, ActionGetValue,
};
pub use state::{
    ActionAssertFormula, ActionPop, ActionPush, ActionReset, ActionResetAssertions,
    ActionSetOption,
};
pub use term::ActionMkTerm;

use crate::manager::SolverManager;
use crate::sort_db::Sort;
use crate::term_db::Term;
use crate::trace::{EntityRef, Token};
use smtstorm_solver::{SolverError, SolverResult};

/// What a randomly-generated action step did.
#[derive(Debug)]
pub enum Outcome {
    /// Executed; `line` goes to the trace, `created` to the return line.
    Played {
        line: String,
        created: Vec<EntityRef>,
    },
    /// Untraced state-machine transition.
    Silent,
    /// Guard held but operands could not be materialised; nothing happened.
    Skipped,
}

impl Outcome {
    pub fn played(line: String, created: Vec<EntityRef>) -> SolverResult<Outcome> {
        Ok(Outcome::Played { line, created })
    }
}

/// Errors from replaying one trace line.
#[derive(Debug)]
pub enum ReplayError {
    /// The line does not match the action's grammar.
    Malformed(String),
    /// An id reference is not in the replay map.
    Unresolved(String),
    /// The adapter failed during re-execution.
    Solver(SolverError),
    /// The adapter does not support this in the replay configuration.
    Skip,
}

impl From<SolverError> for ReplayError {
    fn from(e: SolverError) -> Self {
        ReplayError::Solver(e)
    }
}

pub trait Action {
    /// Stable name, used as the first token of the trace line.
    fn name(&self) -> &'static str;

    /// Precondition over the current state.
    fn enabled(&self, mgr: &SolverManager) -> bool;

    /// Generate operands, execute, and describe the trace line.
    fn run(&self, mgr: &mut SolverManager) -> SolverResult<Outcome>;

    /// Re-execute from traced tokens; returns the produced entity ids in
    /// the order the original `return` line declared them.
    fn replay(
        &self,
        mgr: &mut SolverManager,
        args: &[Token],
    ) -> Result<Vec<EntityRef>, ReplayError>;
}

/// Every traced action, for the untracer's dispatch table.
pub fn all_actions() -> Vec<Box<dyn Action>> {
    vec![
        Box::new(ActionNew),
        Box::new(ActionDelete),
        Box::new(ActionSetOption),
        Box::new(ActionMkSort),
        Box::new(ActionMkConst),
        Box::new(ActionMkVar),
        Box::new(ActionMkValue),
        Box::new(ActionMkTerm),
        Box::new(ActionTermGetSort),
        Box::new(ActionAssertFormula),
        Box::new(ActionCheckSat),
        Box::new(ActionCheckSatAssuming),
        Box::new(ActionGetValue),
        Box::new(ActionGetUnsatAssumptions),
        Box::new(ActionGetUnsatCore),
        Box::new(ActionGetModel),
        Box::new(ActionGetProof),
        Box::new(ActionPush),
        Box::new(ActionPop),
        Box::new(ActionReset),
        Box::new(ActionResetAssertions),
    ]
}

/// An untraced transition: moves the state machine, touches nothing else.
pub struct Epsilon {
    name: &'static str,
    guard: fn(&SolverManager) -> bool,
}

impl Epsilon {
    pub fn new(name: &'static str, guard: fn(&SolverManager) -> bool) -> Self {
        Self { name, guard }
    }
}

impl Action for Epsilon {
    fn name(&self) -> &'static str {
        self.name
    }

    fn enabled(&self, mgr: &SolverManager) -> bool {
        (self.guard)(mgr)
    }

    fn run(&self, _mgr: &mut SolverManager) -> SolverResult<Outcome> {
        Ok(Outcome::Silent)
    }

    fn replay(&self, _mgr: &mut SolverManager, _args: &[Token]) -> Result<Vec<EntityRef>, ReplayError> {
        Err(ReplayError::Malformed(
            "transitions are never traced".to_string(),
        ))
    }
}

// ----------------------------------------------------------------------
// Shared replay helpers.
// ----------------------------------------------------------------------

pub(crate) fn need<'a>(args: &'a [Token], i: usize, what: &str) -> Result<&'a Token, ReplayError> {
    args.get(i)
        .ok_or_else(|| ReplayError::Malformed(format!("missing {} at position {}", what, i)))
}

pub(crate) fn need_u32(args: &[Token], i: usize, what: &str) -> Result<u32, ReplayError> {
    need(args, i, what)?
        .u32()
        .ok_or_else(|| ReplayError::Malformed(format!("{} must be an integer", what)))
}

pub(crate) fn need_usize(args: &[Token], i: usize, what: &str) -> Result<usize, ReplayError> {
    need(args, i, what)?
        .usize()
        .ok_or_else(|| ReplayError::Malformed(format!("{} must be an integer", what)))
}

pub(crate) fn need_str<'a>(args: &'a [Token], i: usize, what: &str) -> Result<&'a str, ReplayError> {
    need(args, i, what)?
        .string()
        .ok_or_else(|| ReplayError::Malformed(format!("{} must be a quoted string", what)))
}

/// Resolve a traced term reference to the live term.
pub(crate) fn resolve_term(
    mgr: &SolverManager,
    token: &Token,
) -> Result<Term, ReplayError> {
    let traced = token
        .term_ref()
        .ok_or_else(|| ReplayError::Malformed("expected a term reference".to_string()))?;
    let actual = mgr
        .lookup_untraced_term(traced)
        .ok_or_else(|| ReplayError::Unresolved(format!("t{}", traced)))?;
    mgr.term(actual)
        .cloned()
        .ok_or_else(|| ReplayError::Unresolved(format!("t{} (evicted)", traced)))
}

/// Resolve a traced sort reference to the live sort.
pub(crate) fn resolve_sort(
    mgr: &SolverManager,
    token: &Token,
) -> Result<Sort, ReplayError> {
    let traced = token
        .sort_ref()
        .ok_or_else(|| ReplayError::Malformed("expected a sort reference".to_string()))?;
    let actual = mgr
        .lookup_untraced_sort(traced)
        .ok_or_else(|| ReplayError::Unresolved(format!("s{}", traced)))?;
    mgr.sort(actual)
        .cloned()
        .ok_or_else(|| ReplayError::Unresolved(format!("s{} (gone)", traced)))
}
