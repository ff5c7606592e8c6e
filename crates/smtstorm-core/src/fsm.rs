//! The action state machine.
//!
//! A directed multigraph over the session states; transitions carry an
//! action, a selection weight and a successor state.  One step: filter the
//! current state's transitions by their action guards, weight-sample one,
//! execute it, follow the edge.  Untraced ε-transitions (see
//! [`Epsilon`](crate::actions::Epsilon)) move between states without
//! touching the solver.
//!
//! A run ends at `Final`, when the step budget is exhausted, when no
//! transition is enabled, or on the first solver failure (the trace is
//! preserved by the caller in that case).

use crate::actions::{self, Action, Epsilon, Outcome};
use crate::manager::SolverManager;
use crate::trace::{EntityRef, Tracer};
use log::{debug, warn};
use smtstorm_solver::SatResult;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    New,
    Config,
    Assert,
    Sat,
    Model,
    Delete,
    Final,
}

struct Transition {
    action: usize,
    weight: u32,
    next: State,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Reached the final state.
    Complete,
    /// Step budget exhausted.
    StepsExhausted,
    /// No enabled transition; ended gracefully.
    Stuck,
    /// The adapter reported a non-recoverable failure.
    SolverFailure { action: String, message: String },
}

pub struct Fsm {
    actions: Vec<Box<dyn Action>>,
    transitions: Vec<(State, Vec<Transition>)>,
}

impl Fsm {
    /// Build the full transition graph.  This is the one place every
    /// action is listed with its states and weights.
    pub fn configure() -> Self {
        let mut fsm = Self {
            actions: Vec::new(),
            transitions: vec![
                (State::New, Vec::new()),
                (State::Config, Vec::new()),
                (State::Assert, Vec::new()),
                (State::Sat, Vec::new()),
                (State::Model, Vec::new()),
                (State::Delete, Vec::new()),
                (State::Final, Vec::new()),
            ],
        };

        fsm.add(State::New, Box::new(actions::ActionNew), 1, State::Config);

        fsm.add(
            State::Config,
            Box::new(actions::ActionSetOption),
            5,
            State::Config,
        );
        fsm.add(
            State::Config,
            Box::new(Epsilon::new("t-inputs", |_| true)),
            3,
            State::Assert,
        );

        fsm.add(State::Assert, Box::new(actions::ActionMkSort), 4, State::Assert);
        fsm.add(State::Assert, Box::new(actions::ActionMkConst), 10, State::Assert);
        fsm.add(State::Assert, Box::new(actions::ActionMkValue), 8, State::Assert);
        fsm.add(State::Assert, Box::new(actions::ActionMkVar), 1, State::Assert);
        fsm.add(State::Assert, Box::new(actions::ActionMkTerm), 20, State::Assert);
        fsm.add(
            State::Assert,
            Box::new(actions::ActionAssertFormula),
            6,
            State::Assert,
        );
        fsm.add(State::Assert, Box::new(actions::ActionPush), 2, State::Assert);
        fsm.add(State::Assert, Box::new(actions::ActionPop), 2, State::Assert);
        fsm.add(State::Assert, Box::new(actions::ActionCheckSat), 3, State::Sat);
        fsm.add(
            State::Assert,
            Box::new(actions::ActionCheckSatAssuming),
            2,
            State::Sat,
        );
        fsm.add(
            State::Assert,
            Box::new(actions::ActionResetAssertions),
            1,
            State::Config,
        );
        fsm.add(State::Assert, Box::new(actions::ActionReset), 1, State::New);
        fsm.add(
            State::Assert,
            Box::new(Epsilon::new("t-delete", |_| true)),
            1,
            State::Delete,
        );

        fsm.add(
            State::Sat,
            Box::new(actions::ActionGetUnsatAssumptions),
            5,
            State::Sat,
        );
        fsm.add(
            State::Sat,
            Box::new(actions::ActionGetUnsatCore),
            3,
            State::Sat,
        );
        fsm.add(State::Sat, Box::new(actions::ActionGetProof), 2, State::Sat);
        fsm.add(State::Sat, Box::new(actions::ActionCheckSat), 2, State::Sat);
        fsm.add(
            State::Sat,
            Box::new(Epsilon::new("t-model", |mgr| {
                mgr.model_gen && mgr.sat_called && mgr.sat_result == SatResult::Sat
            })),
            10,
            State::Model,
        );
        fsm.add(
            State::Sat,
            Box::new(Epsilon::new("t-assert", |_| true)),
            5,
            State::Assert,
        );

        fsm.add(State::Model, Box::new(actions::ActionGetValue), 10, State::Model);
        fsm.add(State::Model, Box::new(actions::ActionGetModel), 4, State::Model);
        fsm.add(
            State::Model,
            Box::new(Epsilon::new("t-assert", |_| true)),
            5,
            State::Assert,
        );

        fsm.add(State::Delete, Box::new(actions::ActionDelete), 1, State::Final);

        fsm
    }

    fn add(&mut self, from: State, action: Box<dyn Action>, weight: u32, next: State) {
        let idx = self.actions.len();
        self.actions.push(action);
        self.transitions
            .iter_mut()
            .find(|(s, _)| *s == from)
            .expect("state registered")
            .1
            .push(Transition {
                action: idx,
                weight,
                next,
            });
    }

    fn edges(&self, state: State) -> &[Transition] {
        self.transitions
            .iter()
            .find(|(s, _)| *s == state)
            .map(|(_, t)| t.as_slice())
            .unwrap_or(&[])
    }

    /// Drive one run to its end.
    pub fn run(
        &self,
        mgr: &mut SolverManager,
        tracer: &mut Tracer,
        max_steps: u64,
    ) -> io::Result<RunOutcome> {
        let mut state = State::New;
        let mut steps = 0u64;

        while state != State::Final {
            if steps >= max_steps {
                tracer.flush()?;
                return Ok(RunOutcome::StepsExhausted);
            }
            steps += 1;

            let enabled: Vec<&Transition> = self
                .edges(state)
                .iter()
                .filter(|t| self.actions[t.action].enabled(mgr))
                .collect();
            if enabled.is_empty() {
                warn!("no enabled transition in {:?}", state);
                tracer.flush()?;
                return Ok(RunOutcome::Stuck);
            }
            let weights: Vec<u32> = enabled.iter().map(|t| t.weight).collect();
            let transition = enabled[mgr.rng.pick_weighted(&weights)];
            let action = self.actions[transition.action].as_ref();

            let seed = if mgr.trace_seeds {
                let seed = mgr.rng.derive_seed();
                mgr.rng.reseed(seed);
                Some(seed)
            } else {
                None
            };

            match action.run(mgr) {
                Ok(Outcome::Played { line, created }) => {
                    debug!("[{:?}] {}", state, line);
                    if let Some(seed) = seed {
                        tracer.seed(seed)?;
                    }
                    tracer.line(&line)?;
                    tracer.returns(&created)?;
                    self.trace_pending_sorts(mgr, tracer)?;
                    state = transition.next;
                }
                Ok(Outcome::Silent) => {
                    state = transition.next;
                }
                Ok(Outcome::Skipped) => {
                    debug!("[{:?}] {} skipped", state, action.name());
                }
                Err(e) if e.is_unsupported() => {
                    debug!("[{:?}] {} unsupported: {}", state, action.name(), e);
                }
                Err(e) => {
                    tracer.flush()?;
                    return Ok(RunOutcome::SolverFailure {
                        action: action.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        tracer.flush()?;
        Ok(RunOutcome::Complete)
    }

    /// Emit phantom `term-get-sort` lines for terms that introduced a
    /// previously-unseen sort, so replay can rebuild the sort ids.
    fn trace_pending_sorts(&self, mgr: &mut SolverManager, tracer: &mut Tracer) -> io::Result<()> {
        for term_id in mgr.take_pending_get_sorts() {
            let Some(sort_id) = mgr.term(term_id).map(|t| t.sort_id) else {
                continue;
            };
            tracer.line(&format!("term-get-sort t{}", term_id))?;
            tracer.returns(&[EntityRef::Sort(sort_id)])?;
        }
        Ok(())
    }
}
