//! Strategy Executor
//!
//! Runs work units under each strategy and turns the timings into reports.
//! In-process strategies run on this process's own threads; the
//! process-parallel strategy goes through the supervisor-worker IPC.
//!
//! ## Pipeline Overview
//!
//! ```text
//! WorkUnit + argument batch
//!       │
//!       ▼
//! ┌─────────────┐
//! │   runner    │  One strategy, one batch -> ExecutionResult
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ comparator  │  All three strategies, speedups vs Sequential
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  metadata   │  System info + lock settings for the report
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`runner`] - Single-strategy execution
//! - [`comparator`] - Three-way comparison and worker-count sweeps
//! - [`contention`] - Shared-counter lock contention demo
//! - [`metadata`] - System metadata collection
//! - [`formatting`] - Human-readable output formatting

mod comparator;
mod contention;
mod formatting;
mod metadata;
mod runner;

// Re-export public API
pub use comparator::{Comparator, speedup_ratio};
pub use contention::run_contention;
pub use formatting::{format_comparison, format_contention, format_human_output, workload_title};
pub use metadata::{build_report_meta, system_info};
pub use runner::{Runner, RunnerConfig};
