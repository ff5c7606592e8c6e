//! smtstorm — model-based random tester for SMT solver APIs.
//!
//! # Usage
//!
//! ```bash
//! # Fuzz the offline smt2 printer, 20 runs
//! smtstorm --max-runs 20
//!
//! # One reproducible run against the stub backend
//! smtstorm --seed 42 --solver stub --max-steps 200
//!
//! # Drive a real solver binary through SMT-LIB2 pipes
//! smtstorm --solver smt2 --solver-cmd "cvc5 --incremental" --time 5
//!
//! # Replay a trace
//! smtstorm --solver stub --untrace smtstorm-42.trace
//!
//! # Reduce a failing trace
//! smtstorm --solver stub --dd --untrace smtstorm-42.trace
//! ```

use clap::Parser;
use smtstorm_harness::{Harness, HarnessError, HarnessOptions, SolverChoice, EXIT_CONFIG, EXIT_ERROR};
use smtstorm_solver::TheoryId;
use std::path::PathBuf;
use std::process::exit;

#[derive(Parser)]
#[command(name = "smtstorm")]
#[command(about = "Model-based API fuzzer for SMT solvers")]
#[command(version)]
struct Cli {
    /// 32-bit seed; fixes a single reproducible run.
    #[arg(short, long)]
    seed: Option<u32>,

    /// Per-run wall-clock timeout in seconds.
    #[arg(short, long)]
    time: Option<u64>,

    /// Stop after N runs (default: run until interrupted).
    #[arg(short, long)]
    max_runs: Option<u64>,

    /// Step budget per run.
    #[arg(short = 'k', long, default_value = "300")]
    max_steps: u64,

    /// Backend to exercise.
    #[arg(short = 'S', long, default_value = "smt2")]
    solver: SolverChoice,

    /// Solver binary (plus arguments) for the online smt2 backend.
    #[arg(long)]
    solver_cmd: Option<String>,

    /// Second backend; check-sat answers must agree.
    #[arg(short, long)]
    cross_check: Option<SolverChoice>,

    /// Delta-debug the --untrace file instead of fuzzing.
    #[arg(short, long)]
    dd: bool,

    /// Replay this trace instead of generating.
    #[arg(short, long)]
    untrace: Option<PathBuf>,

    /// Trace output path (default: tmp-api.trace in the scratch dir).
    #[arg(short = 'o', long)]
    trace: Option<PathBuf>,

    /// Restrict Int/Real generation to the linear fragment.
    #[arg(short = 'l', long)]
    arith_linear: bool,

    /// Precede every traced action with a set-seed line.
    #[arg(short = 'T', long)]
    trace_seeds: bool,

    /// Generate _sN symbols instead of random strings.
    #[arg(short = 'y', long)]
    simple_symbols: bool,

    /// Enable only these theories (repeatable).
    #[arg(short = 'e', long = "enable-theory")]
    enable_theory: Vec<TheoryId>,

    /// Disable these theories (repeatable).
    #[arg(short = 'D', long = "disable-theory")]
    disable_theory: Vec<TheoryId>,

    /// Internal: this invocation is a forked child executing one run.
    #[arg(long, hide = true)]
    in_child: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let options = HarnessOptions {
        seed: cli.seed,
        time_limit: cli.time,
        max_runs: cli.max_runs,
        max_steps: cli.max_steps,
        solver: cli.solver,
        solver_cmd: cli
            .solver_cmd
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect()),
        cross_check: cli.cross_check,
        dd: cli.dd,
        untrace_file: cli.untrace,
        trace_file: cli.trace,
        arith_linear: cli.arith_linear,
        trace_seeds: cli.trace_seeds,
        simple_symbols: cli.simple_symbols,
        enable_theories: cli.enable_theory,
        disable_theories: cli.disable_theory,
        in_child: cli.in_child,
    };

    let mut harness = match Harness::new(options) {
        Ok(harness) => harness,
        Err(e) => {
            eprintln!("smtstorm: {}", e);
            exit(EXIT_CONFIG);
        }
    };
    match harness.execute() {
        Ok(code) => exit(code),
        Err(HarnessError::Config(message)) => {
            eprintln!("smtstorm: configuration error: {}", message);
            exit(EXIT_CONFIG);
        }
        Err(e) => {
            eprintln!("smtstorm: {}", e);
            exit(EXIT_ERROR);
        }
    }
}
