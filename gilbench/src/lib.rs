#![warn(missing_docs)]
//! # gilbench
//!
//! Measures what an interpreter-style global execution lock does to parallel
//! speedup, by running the same work three ways:
//! - **Sequential**: one thread, one item after another (the baseline)
//! - **Thread-Parallel**: several threads in one process, all sharing one simulated lock
//! - **Process-Parallel**: several worker processes, each with its own lock, fed over
//!   rkyv-framed pipes
//!
//! CPU-bound units call [`Gil::tick`] and therefore serialize under the lock;
//! blocking units release it with [`Gil::allow_threads`]. Turning the simulation off
//! shows what native Rust threads do with the same work.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gilbench::{Comparator, Payload, PrimeSum, Runner, RunnerConfig, Strategy};
//!
//! let comparator = Comparator::new(Runner::new(RunnerConfig::default()));
//! let batch: Vec<Payload> = [100_000, 200_000, 300_000, 400_000]
//!     .into_iter()
//!     .map(Payload::Integer)
//!     .collect();
//! let report = comparator.compare("cpu", &PrimeSum, &batch, 4)?;
//! println!("{:.2}x", report.speedup(Strategy::ProcessParallel).unwrap_or(1.0));
//! ```
//!
//! Process-Parallel re-executes the current binary in worker mode, so a
//! program using it must route the hidden worker flag to [`run`] (the
//! `gilbench` binary does), or point [`RunnerConfig::worker_binary`] at a
//! `gilbench` executable.

// Re-export core types
pub use gilbench_core::{
    BUILTIN_UNITS, CompareError, ExecutionResult, Gil, GuardedIncrement, Interpreter, PrimeSum,
    Probe, RunError, SharedCounter, Strategy, TimedWait, UnitDef, WorkError, WorkUnit, cpu_bound,
    find_unit, io_bound, run_sequential, run_threaded,
};

// Re-export wire types that appear in the public API
pub use gilbench_ipc::{FailureKind, GilSettings, Payload};

// Re-export report types
pub use gilbench_report::{
    ComparisonReport, ContentionReport, OutputFormat, ReportMeta, SuiteReport, SystemInfo,
    generate_json_report, parse_json_report,
};

// Re-export the orchestration layer
pub use gilbench_cli::{
    Comparator, GilbenchConfig, ProcessPool, Runner, RunnerConfig, SupervisorError, run_contention,
    speedup_ratio,
};

/// Run the gilbench CLI.
///
/// Call this from a binary's `main()`; it also serves worker processes:
/// ```ignore
/// fn main() {
///     gilbench::run().unwrap();
/// }
/// ```
pub use gilbench_cli::run;
