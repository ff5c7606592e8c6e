//! Core of the smtstorm model-based solver tester.
//!
//! The pieces, bottom up:
//!
//! - [`rng`] — seeded randomness; the single source of non-determinism.
//! - [`sort_db`] / [`term_db`] — the typed object pools actions sample
//!   from, indexed by sort kind, sort, scope level, and value-ness.
//! - [`manager`] — owns the adapter, the pools and the session flags;
//!   exposes the picker/guard API.
//! - [`actions`] — the catalogue: guard + generator + executor + trace +
//!   untrace per solver-API action.
//! - [`fsm`] — weighted state machine wiring actions into runs.
//! - [`trace`] — the replayable text format and its replayer.
//! - [`dd`] — delta debugging over dependency-closed trace blocks.
//!
//! Everything here is deterministic given a seed; process isolation,
//! timeouts and error bucketing live in the harness crate.

pub mod actions;
pub mod dd;
pub mod fsm;
pub mod manager;
pub mod rng;
pub mod sort_db;
pub mod term_db;
pub mod trace;

pub use dd::DeltaDebugger;
pub use fsm::{Fsm, RunOutcome, State};
pub use manager::{ManagerConfig, SolverManager};
pub use rng::RngSource;
pub use trace::{Tracer, UntraceError, Untracer};
