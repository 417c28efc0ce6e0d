//! Report Data Structures

use chrono::{DateTime, Utc};
use gilbench_core::{ExecutionResult, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete record of one gilbench invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub meta: ReportMeta,
    /// Present unless the contention demo was disabled
    pub contention: Option<ContentionReport>,
    /// One entry per (workload, worker count), in run order
    pub comparisons: Vec<ComparisonReport>,
}

/// All three strategies run on one workload and one argument batch.
///
/// Speedups are only meaningful inside a single report: they are relative to
/// this report's own Sequential run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Workload label (e.g. `cpu`, `io`)
    pub workload: String,
    /// Worker count handed to the parallel strategies
    pub worker_count: usize,
    /// Execution result per strategy
    pub results: BTreeMap<Strategy, ExecutionResult>,
    /// `sequential.duration / strategy.duration` per strategy
    pub speedups: BTreeMap<Strategy, f64>,
}

impl ComparisonReport {
    /// Result of one strategy
    pub fn result(&self, strategy: Strategy) -> Option<&ExecutionResult> {
        self.results.get(&strategy)
    }

    /// Speedup of one strategy relative to Sequential
    pub fn speedup(&self, strategy: Strategy) -> Option<f64> {
        self.speedups.get(&strategy).copied()
    }

    /// Strategy with the shortest duration; ties go to the earlier strategy
    pub fn fastest(&self) -> Option<Strategy> {
        Strategy::ALL
            .into_iter()
            .filter_map(|s| self.result(s).map(|r| (s, r.duration())))
            .min_by_key(|(_, duration)| *duration)
            .map(|(s, _)| s)
    }

    /// Number of arguments in the batch
    pub fn batch_len(&self) -> usize {
        self.result(Strategy::Sequential).map_or(0, |r| r.len())
    }
}

/// Outcome of the shared-counter contention demo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentionReport {
    pub threads: usize,
    pub iterations: u64,
    pub single_thread_secs: f64,
    pub multi_thread_secs: f64,
    /// `single_thread_secs / multi_thread_secs`
    pub speedup: f64,
    /// What the speedup would be without the lock (the thread count)
    pub ideal_speedup: f64,
    /// Counter value after the multi-threaded phase
    pub final_count: u64,
}

impl ContentionReport {
    /// Increments submitted in the multi-threaded phase
    pub fn expected_count(&self) -> u64 {
        match self.threads as u64 {
            0 => 0,
            threads => threads * (self.iterations / threads),
        }
    }

    /// Whether every submitted increment landed
    pub fn no_lost_updates(&self) -> bool {
        self.final_count == self.expected_count()
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Whether the interpreter lock was simulated for this run
    pub gil_simulated: bool,
    pub switch_interval_ms: f64,
    pub system: SystemInfo,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
}
