//! The backend adapter contract.
//!
//! A backend implements [`Solver`] by minting opaque handles for the sorts
//! and terms it creates.  The tester owns the handles, the backend owns the
//! native objects.  Every fallible call returns a [`SolverResult`]; backends
//! signal "I don't do that" with [`SolverError::Unsupported`] (the action is
//! discarded and the run continues) and real failures with
//! [`SolverError::Failure`] (the run ends and the trace is kept).

use crate::op::OpKind;
use crate::sort::{SortKind, SortParams};
use crate::theory::TheoryId;
use thiserror::Error;

/// Opaque handle to a backend-owned sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortHandle(pub u64);

/// Opaque handle to a backend-owned term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermHandle(pub u64);

/// Answer of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown,
}

impl SatResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            SatResult::Sat => "sat",
            SatResult::Unsat => "unsat",
            SatResult::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by adapter calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolverError {
    /// The backend does not support the requested operation or operand
    /// combination.  Recoverable: the tester discards the action.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The backend failed.  Ends the run; the message feeds the error map.
    #[error("{0}")]
    Failure(String),
}

impl SolverError {
    pub fn unsupported(what: impl Into<String>) -> Self {
        SolverError::Unsupported(what.into())
    }

    pub fn failure(what: impl Into<String>) -> Self {
        SolverError::Failure(what.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, SolverError::Unsupported(_))
    }
}

pub type SolverResult<T> = Result<T, SolverError>;

/// An option a backend accepts, with the values worth fuzzing.
#[derive(Debug, Clone)]
pub struct SolverOption {
    pub name: String,
    pub values: Vec<String>,
}

impl SolverOption {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// The capability set a concrete backend implements.
///
/// Calls arrive in the exact order the state machine executed them, and
/// replay reproduces that order; adapters may therefore keep cursor-style
/// internal state.
pub trait Solver {
    fn name(&self) -> &'static str;

    /// Theories this backend can exercise.
    fn supported_theories(&self) -> Vec<TheoryId>;

    /// Bring up a fresh solver instance.  Paired with [`Solver::teardown`].
    fn init(&mut self) -> SolverResult<()>;

    /// Release the instance and everything it owns.
    fn teardown(&mut self) -> SolverResult<()>;

    fn mk_sort(&mut self, kind: SortKind, params: &SortParams) -> SolverResult<SortHandle>;

    fn mk_const(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle>;

    /// A bound variable for use under a quantifier.
    fn mk_var(&mut self, sort: SortHandle, symbol: &str) -> SolverResult<TermHandle>;

    /// A value term from a textual literal (decimal/hex/binary integers,
    /// rationals, string literals, rounding modes, `true`/`false`).
    fn mk_value(&mut self, sort: SortHandle, value: &str) -> SolverResult<TermHandle>;

    fn mk_term(
        &mut self,
        kind: OpKind,
        params: &[u32],
        args: &[TermHandle],
    ) -> SolverResult<TermHandle>;

    /// The sort of a term, as a handle valid for further construction.
    fn get_sort(&mut self, term: TermHandle) -> SolverResult<SortHandle>;

    /// The kind of an existing sort.
    fn sort_kind(&self, sort: SortHandle) -> SolverResult<SortKind>;

    /// The construction parameters of an existing sort.
    fn sort_params(&self, sort: SortHandle) -> SolverResult<SortParams>;

    /// Sort equality as the backend sees it.  Backends that intern sorts
    /// canonically can rely on handle identity.
    fn sorts_equal(&self, a: SortHandle, b: SortHandle) -> bool {
        a == b
    }

    /// Term equality as the backend sees it.
    fn terms_equal(&self, a: TermHandle, b: TermHandle) -> bool {
        a == b
    }

    /// Options this backend accepts, with candidate values.
    fn options(&self) -> Vec<SolverOption>;

    fn set_opt(&mut self, name: &str, value: &str) -> SolverResult<()>;

    fn assert_formula(&mut self, term: TermHandle) -> SolverResult<()>;

    fn check_sat(&mut self) -> SolverResult<SatResult>;

    fn check_sat_assuming(&mut self, assumptions: &[TermHandle]) -> SolverResult<SatResult>;

    fn get_value(&mut self, term: TermHandle) -> SolverResult<TermHandle>;

    fn get_unsat_assumptions(&mut self) -> SolverResult<Vec<TermHandle>>;

    fn get_unsat_core(&mut self) -> SolverResult<Vec<TermHandle>>;

    fn get_model(&mut self) -> SolverResult<String>;

    fn get_proof(&mut self) -> SolverResult<String>;

    /// True if `term` was part of the failed assumptions of the most recent
    /// `check-sat-assuming`.
    fn is_unsat_assumption(&self, term: TermHandle) -> bool;

    fn push(&mut self, n: u32) -> SolverResult<()>;

    fn pop(&mut self, n: u32) -> SolverResult<()>;

    /// Full reset: back to the freshly-initialized state.
    fn reset(&mut self) -> SolverResult<()>;

    /// Remove all assertions and pushed scopes, keeping declarations.
    fn reset_assertions(&mut self) -> SolverResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(SolverError::unsupported("x").is_unsupported());
        assert!(!SolverError::failure("x").is_unsupported());
    }

    #[test]
    fn sat_result_display() {
        assert_eq!(SatResult::Sat.to_string(), "sat");
        assert_eq!(SatResult::Unsat.to_string(), "unsat");
        assert_eq!(SatResult::Unknown.to_string(), "unknown");
    }
}
