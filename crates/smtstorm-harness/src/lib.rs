//! Driver for smtstorm: per-run process isolation, error bucketing, delta
//! debugging, and the statistics the CLI reports.
//!
//! The flow per fuzzing run: draw a seed from the master RNG, re-invoke
//! this binary as a child with `--in-child --seed <s>`, capture its output
//! into the scoped scratch directory, enforce the wall-clock timeout, and
//! classify the exit.  Failing runs with a previously-unseen error
//! signature get their trace copied next to the working directory; known
//! signatures are counted and discarded.

pub mod errmap;
pub mod runner;
pub mod stats;

use errmap::{normalize, ErrorMap};
use log::{info, warn};
use runner::{run_forked, RunStatus};
use smtstorm_core::actions::all_actions;
use smtstorm_core::{DeltaDebugger, Fsm, ManagerConfig, RngSource, RunOutcome, SolverManager,
    Tracer, Untracer};
use smtstorm_solver::cross::CrossCheck;
use smtstorm_solver::smt2::Smt2Solver;
use smtstorm_solver::stub::StubSolver;
use smtstorm_solver::{Solver, TheoryId};
use stats::HarnessStats;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;

/// Default trace file name inside the scratch directory.
pub const API_TRACE: &str = "tmp-api.trace";
/// Prefix of minimised traces emitted by delta debugging.
pub const DD_PREFIX: &str = "smtstorm-dd-";

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

/// Backends selectable from the command line.
///
/// Native-library adapters (btor, bzla, cvc5, yices) plug in through the
/// same [`Solver`] trait but are not linked into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverChoice {
    /// SMT-LIB2 printer, online when `--solver-cmd` names a binary.
    Smt2,
    /// Self-contained bookkeeping backend, for harness self-tests.
    Stub,
}

impl FromStr for SolverChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smt2" => Ok(SolverChoice::Smt2),
            "stub" => Ok(SolverChoice::Stub),
            other => Err(format!(
                "unknown solver `{}` (this build has: smt2, stub)",
                other
            )),
        }
    }
}

impl fmt::Display for SolverChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolverChoice::Smt2 => "smt2",
            SolverChoice::Stub => "stub",
        })
    }
}

/// Everything the CLI collects.
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub seed: Option<u32>,
    /// Per-run wall-clock limit, seconds.
    pub time_limit: Option<u64>,
    pub max_runs: Option<u64>,
    pub max_steps: u64,
    pub solver: SolverChoice,
    /// Command line of a solver binary for the online smt2 backend.
    pub solver_cmd: Option<Vec<String>>,
    pub cross_check: Option<SolverChoice>,
    pub dd: bool,
    pub untrace_file: Option<PathBuf>,
    pub trace_file: Option<PathBuf>,
    pub arith_linear: bool,
    pub trace_seeds: bool,
    pub simple_symbols: bool,
    pub enable_theories: Vec<TheoryId>,
    pub disable_theories: Vec<TheoryId>,
    /// Hidden: this invocation is a forked child executing one run.
    pub in_child: bool,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct Harness {
    options: HarnessOptions,
    pub errors: ErrorMap,
    pub stats: HarnessStats,
    /// Scratch space; removed on drop, on every exit path.
    tmp: TempDir,
    master: RngSource,
}

impl Harness {
    pub fn new(options: HarnessOptions) -> Result<Self, HarnessError> {
        if options.dd && options.untrace_file.is_none() {
            return Err(HarnessError::Config(
                "--dd requires --untrace FILE".to_string(),
            ));
        }
        if options.cross_check == Some(options.solver) {
            return Err(HarnessError::Config(
                "--cross-check must name a different solver".to_string(),
            ));
        }
        if let Some(file) = &options.untrace_file {
            if !file.exists() {
                return Err(HarnessError::Config(format!(
                    "trace file not found: {}",
                    file.display()
                )));
            }
        }
        let tmp = tempfile::Builder::new()
            .prefix("smtstorm-")
            .tempdir()
            .map_err(HarnessError::Io)?;
        let master_seed = options.seed.unwrap_or_else(rand::random);
        Ok(Self {
            options,
            errors: ErrorMap::new(),
            stats: HarnessStats::default(),
            tmp,
            master: RngSource::new(master_seed),
        })
    }

    /// Dispatch on mode; returns the process exit code.
    pub fn execute(&mut self) -> Result<i32, HarnessError> {
        if self.options.in_child {
            return if let Some(file) = self.options.untrace_file.clone() {
                self.replay_in_process(&file)
            } else {
                self.generate_in_process()
            };
        }
        if self.options.dd {
            return self.delta_debug();
        }
        if let Some(file) = self.options.untrace_file.clone() {
            return self.replay_in_process(&file);
        }
        self.fuzz_forked()
    }

    fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            arith_linear: self.options.arith_linear,
            trace_seeds: self.options.trace_seeds,
            simple_symbols: self.options.simple_symbols,
            enable_theories: self.options.enable_theories.clone(),
            disable_theories: self.options.disable_theories.clone(),
        }
    }

    fn base_solver(&self, choice: SolverChoice, with_cmd: bool) -> Box<dyn Solver> {
        match choice {
            SolverChoice::Stub => Box::new(StubSolver::new()),
            SolverChoice::Smt2 => match (&self.options.solver_cmd, with_cmd) {
                (Some(cmd), true) => Box::new(Smt2Solver::online(cmd.clone())),
                _ => Box::new(Smt2Solver::offline()),
            },
        }
    }

    fn make_solver(&self) -> Box<dyn Solver> {
        let primary = self.base_solver(self.options.solver, true);
        match self.options.cross_check {
            Some(secondary) => Box::new(CrossCheck::new(
                primary,
                self.base_solver(secondary, false),
            )),
            None => primary,
        }
    }

    fn make_manager(&self, seed: u32) -> SolverManager {
        SolverManager::new(self.make_solver(), seed, &self.manager_config())
    }

    /// One generated run, in this process.  Child mode only.
    fn generate_in_process(&mut self) -> Result<i32, HarnessError> {
        let seed = self.options.seed.unwrap_or(0);
        let trace_path = self
            .options
            .trace_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(API_TRACE));
        let mut mgr = self.make_manager(seed);
        let mut tracer = Tracer::new(Box::new(File::create(&trace_path)?));
        let fsm = Fsm::configure();
        let outcome = fsm.run(&mut mgr, &mut tracer, self.options.max_steps)?;
        info!(
            "seed {}: {:?}; {} sorts, {} terms, {} sat calls",
            seed, outcome, mgr.stats.sorts, mgr.stats.terms, mgr.n_sat_calls
        );
        for (kind, count) in mgr.term_counts() {
            log::debug!("  {} terms: {}", kind, count);
        }
        match outcome {
            RunOutcome::SolverFailure { action, message } => {
                eprintln!("smtstorm: [{}] {}", action, message);
                Ok(EXIT_ERROR)
            }
            _ => Ok(EXIT_OK),
        }
    }

    /// Replay a trace file in this process.
    fn replay_in_process(&mut self, file: &Path) -> Result<i32, HarnessError> {
        let content = fs::read_to_string(file)?;
        let mut mgr = self.make_manager(self.options.seed.unwrap_or(0));
        let untracer = Untracer::new(all_actions());
        match untracer.untrace(&mut mgr, &content) {
            Ok(executed) => {
                info!("replayed {} actions from {}", executed, file.display());
                Ok(EXIT_OK)
            }
            Err(e) => {
                eprintln!("smtstorm: {}", e);
                Ok(EXIT_ERROR)
            }
        }
    }

    /// The argument vector for a forked child.
    fn child_args(&self, seed: Option<u32>, trace: &Path, untrace: Option<&Path>) -> Vec<String> {
        let mut args = vec!["--in-child".to_string()];
        args.push("--solver".to_string());
        args.push(self.options.solver.to_string());
        if let Some(cmd) = &self.options.solver_cmd {
            args.push("--solver-cmd".to_string());
            args.push(cmd.join(" "));
        }
        if let Some(cross) = self.options.cross_check {
            args.push("--cross-check".to_string());
            args.push(cross.to_string());
        }
        if let Some(seed) = seed {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        args.push("--max-steps".to_string());
        args.push(self.options.max_steps.to_string());
        if self.options.arith_linear {
            args.push("--arith-linear".to_string());
        }
        if self.options.trace_seeds {
            args.push("--trace-seeds".to_string());
        }
        if self.options.simple_symbols {
            args.push("--simple-symbols".to_string());
        }
        for theory in &self.options.enable_theories {
            args.push("--enable-theory".to_string());
            args.push(theory.to_string());
        }
        for theory in &self.options.disable_theories {
            args.push("--disable-theory".to_string());
            args.push(theory.to_string());
        }
        match untrace {
            Some(file) => {
                args.push("--untrace".to_string());
                args.push(file.display().to_string());
            }
            None => {
                args.push("--trace".to_string());
                args.push(trace.display().to_string());
            }
        }
        args
    }

    fn timeout(&self) -> Option<Duration> {
        self.options.time_limit.map(Duration::from_secs)
    }

    /// The fuzzing loop: forked children until `--max-runs` (or forever).
    fn fuzz_forked(&mut self) -> Result<i32, HarnessError> {
        let trace_path = self.tmp.path().join(API_TRACE);
        let stdout_path = self.tmp.path().join("child.out");
        let stderr_path = self.tmp.path().join("child.err");
        let mut run_idx: u64 = 0;

        loop {
            if let Some(max) = self.options.max_runs {
                if run_idx >= max {
                    break;
                }
            }
            let seed = match self.options.seed {
                Some(seed) => seed,
                None => self.master.derive_seed(),
            };
            let args = self.child_args(Some(seed), &trace_path, None);
            let status = run_forked(&args, self.timeout(), &stdout_path, &stderr_path)?;

            let mut duplicate = false;
            match &status {
                RunStatus::Ok => {}
                RunStatus::Timeout => {
                    info!("seed {}: timeout", seed);
                }
                RunStatus::Error { message } | RunStatus::Crash { message } => {
                    let fresh = self.errors.add(message, seed);
                    duplicate = !fresh;
                    if fresh {
                        let kept = PathBuf::from(format!("smtstorm-{}.trace", seed));
                        match fs::copy(&trace_path, &kept) {
                            Ok(_) => eprintln!(
                                "smtstorm: seed {}: {} ({}), trace saved to {}",
                                seed,
                                status.kind(),
                                normalize(message),
                                kept.display()
                            ),
                            Err(e) => warn!("could not keep trace for seed {}: {}", seed, e),
                        }
                    }
                }
            }
            self.stats.record(status.kind(), duplicate);
            run_idx += 1;

            if self.options.seed.is_some() {
                // A fixed seed is a single reproducible run.
                eprintln!("{}", self.stats);
                return Ok(status.exit_code());
            }
        }
        eprintln!("{}", self.stats);
        for (signature, entry) in self.errors.iter() {
            eprintln!("{} seeds: {}", entry.seeds.len(), signature);
        }
        if !self.errors.is_empty() {
            let path = PathBuf::from("smtstorm-errors.json");
            let report = serde_json::json!({
                "stats": &self.stats,
                "errors": &self.errors,
            });
            match serde_json::to_string_pretty(&report) {
                Ok(json) => {
                    fs::write(&path, json)?;
                    eprintln!("smtstorm: error report written to {}", path.display());
                }
                Err(e) => warn!("could not serialise the error report: {}", e),
            }
        }
        Ok(EXIT_OK)
    }

    /// Replay a candidate in a fork and classify it.
    fn replay_forked(&self, content: &str) -> io::Result<RunStatus> {
        let candidate = self.tmp.path().join("dd-candidate.trace");
        fs::write(&candidate, content)?;
        let stdout_path = self.tmp.path().join("dd.out");
        let stderr_path = self.tmp.path().join("dd.err");
        let args = self.child_args(None, &candidate, Some(&candidate));
        run_forked(&args, self.timeout(), &stdout_path, &stderr_path)
    }

    /// Minimise the `--untrace` file, preserving its failure signature.
    fn delta_debug(&mut self) -> Result<i32, HarnessError> {
        let input = self
            .options
            .untrace_file
            .clone()
            .expect("validated in new()");
        let content = fs::read_to_string(&input)?;

        let baseline = self.replay_forked(&content)?;
        if baseline == RunStatus::Ok {
            eprintln!("smtstorm: input trace does not fail; nothing to reduce");
            return Ok(EXIT_ERROR);
        }
        let kind = baseline.kind();
        let signature = baseline.message().map(normalize).unwrap_or_default();
        info!("reducing {} ({} `{}`)", input.display(), kind, signature);

        let fails = |candidate: &str| -> bool {
            match self.replay_forked(candidate) {
                Ok(status) => {
                    status.kind() == kind
                        && status.message().map(normalize).unwrap_or_default() == signature
                }
                Err(e) => {
                    warn!("candidate replay failed to launch: {}", e);
                    false
                }
            }
        };
        let mut dd = DeltaDebugger::new(fails);
        let minimized = dd.minimize(&content);
        let tests = dd.tests;
        drop(dd);

        let out = std::env::temp_dir().join(format!(
            "{}{:016x}.trace",
            DD_PREFIX,
            fnv1a(&format!("{}:{}", kind, signature))
        ));
        fs::write(&out, &minimized)?;
        eprintln!(
            "smtstorm: reduced {} -> {} lines in {} replays",
            content.lines().count(),
            minimized.lines().count(),
            tests
        );
        println!("{}", out.display());
        Ok(EXIT_OK)
    }
}

fn fnv1a(data: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in data.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> HarnessOptions {
        HarnessOptions {
            seed: None,
            time_limit: None,
            max_runs: Some(1),
            max_steps: 100,
            solver: SolverChoice::Stub,
            solver_cmd: None,
            cross_check: None,
            dd: false,
            untrace_file: None,
            trace_file: None,
            arith_linear: false,
            trace_seeds: false,
            simple_symbols: false,
            enable_theories: Vec::new(),
            disable_theories: Vec::new(),
            in_child: false,
        }
    }

    #[test]
    fn dd_requires_untrace() {
        let mut opts = options();
        opts.dd = true;
        assert!(matches!(Harness::new(opts), Err(HarnessError::Config(_))));
    }

    #[test]
    fn cross_check_must_differ() {
        let mut opts = options();
        opts.cross_check = Some(SolverChoice::Stub);
        assert!(matches!(Harness::new(opts), Err(HarnessError::Config(_))));
    }

    #[test]
    fn missing_untrace_file_is_a_config_error() {
        let mut opts = options();
        opts.untrace_file = Some(PathBuf::from("/no/such/file.trace"));
        assert!(matches!(Harness::new(opts), Err(HarnessError::Config(_))));
    }

    #[test]
    fn in_child_generation_writes_a_trace() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("out.trace");
        let mut opts = options();
        opts.in_child = true;
        opts.seed = Some(42);
        opts.trace_file = Some(trace.clone());
        let mut harness = Harness::new(opts).unwrap();
        let code = harness.execute().unwrap();
        assert_eq!(code, EXIT_OK);
        let content = fs::read_to_string(&trace).unwrap();
        assert!(content.starts_with("new\n"));
    }

    #[test]
    fn replay_of_recorded_trace_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("out.trace");
        let mut opts = options();
        opts.in_child = true;
        opts.seed = Some(7);
        opts.trace_file = Some(trace.clone());
        Harness::new(opts.clone()).unwrap().execute().unwrap();

        let mut replay_opts = options();
        replay_opts.in_child = true;
        replay_opts.untrace_file = Some(trace);
        let mut harness = Harness::new(replay_opts).unwrap();
        assert_eq!(harness.execute().unwrap(), EXIT_OK);
    }

    #[test]
    fn child_args_roundtrip_the_options() {
        let mut opts = options();
        opts.arith_linear = true;
        opts.enable_theories = vec![TheoryId::Bv];
        let harness = Harness::new(opts).unwrap();
        let args = harness.child_args(Some(9), Path::new("x.trace"), None);
        assert!(args.contains(&"--in-child".to_string()));
        assert!(args.contains(&"--arith-linear".to_string()));
        assert!(args.contains(&"--enable-theory".to_string()));
        assert!(args.contains(&"BV".to_string()));
        assert!(args.contains(&"9".to_string()));
    }

    #[test]
    fn fnv_is_stable() {
        assert_eq!(fnv1a("abc"), fnv1a("abc"));
        assert_ne!(fnv1a("abc"), fnv1a("abd"));
    }
}
