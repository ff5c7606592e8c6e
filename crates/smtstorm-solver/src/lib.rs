//! Solver vocabulary and backend adapter contract for smtstorm.
//!
//! This crate defines everything the random tester and a concrete solver
//! backend have to agree on:
//!
//! 1. **Vocabulary** — the closed enumerations [`TheoryId`], [`SortKind`]
//!    and [`OpKind`], with static per-operator metadata ([`Op`]).
//! 2. **The adapter contract** — the [`Solver`] trait, a result-typed
//!    capability set mirroring the SMT-LIB command surface.  Adapters mint
//!    opaque [`SortHandle`]/[`TermHandle`] tokens; the tester never touches
//!    native solver objects.
//! 3. **Backends** — an SMT-LIB2 printing backend ([`smt2::Smt2Solver`],
//!    online against a child process or offline into a script buffer), a
//!    self-contained bookkeeping backend ([`stub::StubSolver`]) used for
//!    harness self-tests, and a cross-checking combinator
//!    ([`cross::CrossCheck`]) that mirrors every call into two backends and
//!    fails when their `check-sat` answers diverge.
//!
//! Adapter failures are values, never panics: every fallible call returns
//! [`SolverResult`], and the tester classifies `Unsupported` (skip the
//! action) separately from `Failure` (end the run, keep the trace).

pub mod cross;
pub mod infer;
pub mod op;
pub mod smt2;
pub mod solver;
pub mod sort;
pub mod stub;
pub mod theory;

pub use op::{Arity, ArgsPattern, Op, OpKind};
pub use solver::{
    SatResult, Solver, SolverError, SolverOption, SolverResult, SortHandle, TermHandle,
};
pub use sort::{SortKind, SortParams};
pub use theory::TheoryId;
