//! End-to-end record/replay tests against the stub backend.

use smtstorm_core::actions::all_actions;
use smtstorm_core::{Fsm, ManagerConfig, SolverManager, Tracer, Untracer};
use smtstorm_solver::stub::StubSolver;
use smtstorm_solver::{Solver as _, SortKind};

fn manager(seed: u32) -> SolverManager {
    let mut solver = Box::new(StubSolver::new());
    solver.init().unwrap();
    SolverManager::new(solver, seed, &ManagerConfig::default())
}

fn record(seed: u32, steps: u64) -> (SolverManager, String) {
    let fsm = Fsm::configure();
    let mut mgr = manager(seed);
    let mut buffer: Vec<u8> = Vec::new();
    {
        let cursor = Box::new(std::io::Cursor::new(&mut buffer));
        let mut tracer = Tracer::new(cursor);
        fsm.run(&mut mgr, &mut tracer, steps).unwrap();
    }
    (mgr, String::from_utf8(buffer).unwrap())
}

#[test]
fn recorded_runs_replay_cleanly() {
    for seed in [1u32, 7, 42, 1234] {
        let (recorded, trace) = record(seed, 300);
        let untracer = Untracer::new(all_actions());
        let mut replayed = manager(0);
        untracer
            .untrace(&mut replayed, &trace)
            .unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
        // Same adapter, same call order: the databases end up identical.
        assert_eq!(replayed.stats.terms, recorded.stats.terms, "seed {}", seed);
        assert_eq!(replayed.stats.sorts, recorded.stats.sorts, "seed {}", seed);
        assert_eq!(replayed.stats.vars, recorded.stats.vars, "seed {}", seed);
        assert_eq!(replayed.n_sat_calls, recorded.n_sat_calls, "seed {}", seed);
    }
}

#[test]
fn replay_maps_are_the_identity_for_same_backend() {
    let (_, trace) = record(42, 200);
    let untracer = Untracer::new(all_actions());
    let mut replayed = manager(0);
    untracer.untrace(&mut replayed, &trace).unwrap();
    // Ids in the trace were assigned by the identical deterministic
    // sequence, so the replay map must be the identity on every id that
    // appears in a return line.
    for line in trace.lines().filter(|l| l.starts_with("return ")) {
        for token in line.split_whitespace().skip(1) {
            let (kind, id) = token.split_at(1);
            let id: u64 = id.parse().unwrap();
            match kind {
                "t" => assert_eq!(replayed.lookup_untraced_term(id), Some(id)),
                "s" => assert_eq!(replayed.lookup_untraced_sort(id), Some(id)),
                other => panic!("unexpected id kind {}", other),
            }
        }
    }
}

#[test]
fn pop_hides_scoped_terms_from_pickers() {
    let trace = "\
new
mk-sort BV 8
return s0
mk-const s0 \"base\"
return t0
push 2
mk-const s0 \"scoped\"
return t1
pop 2
";
    let untracer = Untracer::new(all_actions());
    let mut mgr = manager(0);
    untracer.untrace(&mut mgr, trace).unwrap();
    // Only the level-0 constant survives the pop.
    let base = mgr.lookup_untraced_term(0).unwrap();
    let scoped = mgr.lookup_untraced_term(1).unwrap();
    assert!(mgr.term(base).is_some());
    assert!(mgr.term(scoped).is_none());
    assert_eq!(
        (0..100)
            .map(|_| mgr.pick_term_of_kind(SortKind::Bv).id)
            .collect::<std::collections::HashSet<_>>(),
        std::iter::once(base).collect()
    );
}

#[test]
fn phantom_get_sort_registers_unseen_sorts() {
    let trace = "\
new
mk-sort BV 8
return s0
mk-const s0 \"x\"
return t0
mk-term BV_EXTRACT 2 3 0 1 t0
return t1
term-get-sort t1
return s1
mk-const s1 \"y\"
return t2
";
    let untracer = Untracer::new(all_actions());
    let mut mgr = manager(0);
    untracer.untrace(&mut mgr, trace).unwrap();
    let y = mgr.lookup_untraced_term(2).unwrap();
    let sort_id = mgr.term(y).unwrap().sort_id;
    assert_eq!(mgr.sort(sort_id).unwrap().bv_width(), Some(4));
}

#[test]
fn comments_and_blank_lines_are_tolerated() {
    let trace = "\
# recorded by smtstorm

new
# create a sort
mk-sort BOOL
return s0
";
    let untracer = Untracer::new(all_actions());
    let mut mgr = manager(0);
    let executed = untracer.untrace(&mut mgr, trace).unwrap();
    assert_eq!(executed, 2);
}

#[test]
fn unresolved_references_are_reported() {
    let trace = "new\nassert-formula t7\n";
    let untracer = Untracer::new(all_actions());
    let mut mgr = manager(0);
    let err = untracer.untrace(&mut mgr, trace).unwrap_err();
    assert!(err.to_string().contains("t7"));
}

#[test]
fn unsat_assumption_scenario() {
    // Set up produce-unsat-assumptions, assert, assume two Bools, check:
    // the failed assumptions must be a subset of the assumed ones.
    let trace = "\
new
set-option produce-unsat-assumptions true
set-option incremental true
mk-sort BOOL
return s0
mk-value s0 \"true\"
return t0
mk-value s0 \"false\"
return t1
mk-const s0 \"p\"
return t2
assert-formula t2
check-sat-assuming 2 t0 t1
get-unsat-assumptions
";
    let untracer = Untracer::new(all_actions());
    let mut mgr = manager(0);
    untracer.untrace(&mut mgr, trace).unwrap();
    assert_eq!(mgr.sat_result, smtstorm_solver::SatResult::Unsat);
    let f = mgr.lookup_untraced_term(1).unwrap();
    let handle = mgr.term(f).unwrap().handle;
    assert!(mgr.solver().is_unsat_assumption(handle));
}
