#![warn(missing_docs)]
//! gilbench Core - Work Units and In-Process Runtime
//!
//! This crate provides everything that runs inside a single process:
//! - `WorkUnit` trait, built-in workloads and the unit registry
//! - Simulated interpreter lock (`Interpreter` / `Gil`)
//! - Sequential and thread-parallel strategy runners
//! - Shared work queue and in-order result assembly used by every parallel runner
//! - `WorkerMain`, the worker-process side of the process-parallel strategy

mod counter;
mod error;
mod gil;
mod local;
mod measure;
mod queue;
mod strategy;
mod unit;
mod worker;
pub mod workloads;

pub use counter::SharedCounter;
pub use error::{CompareError, RunError};
pub use gil::{Gil, Interpreter};
pub use local::{check_worker_count, run_sequential, run_threaded, validate_batch};
pub use measure::Timer;
pub use queue::{ItemFailure, ShardOutcome, WorkQueue, assemble};
pub use strategy::{ExecutionResult, Strategy};
pub use unit::{BUILTIN_UNITS, UnitDef, UnitFailure, WorkError, WorkUnit, find_unit, invoke_caught};
pub use worker::{WorkerMain, shutdown_requested};
pub use workloads::{GuardedIncrement, PrimeSum, Probe, TimedWait, cpu_bound, io_bound};

pub use gilbench_ipc::{GilSettings, Payload};
