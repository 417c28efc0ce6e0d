//! Strategy Comparison
//!
//! Runs one workload through Sequential, Thread-Parallel and Process-Parallel
//! (always in that order, always all three) and derives speedups relative to
//! the Sequential run of the same batch.

use super::runner::Runner;
use gilbench_core::{
    CompareError, ExecutionResult, Payload, RunError, Strategy, WorkUnit, check_worker_count,
    validate_batch,
};
use gilbench_report::ComparisonReport;
use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::time::Duration;

/// `sequential / other`, with every ratio defined as 1.0 when the
/// sequential run took no time (empty batch).
pub fn speedup_ratio(sequential: Duration, other: Duration) -> f64 {
    if sequential.is_zero() || other.is_zero() {
        return 1.0;
    }
    sequential.as_secs_f64() / other.as_secs_f64()
}

fn invalid_argument(e: RunError) -> CompareError {
    match e {
        RunError::InvalidArgument(message) => CompareError::InvalidArgument(message),
        other => CompareError::InvalidArgument(other.to_string()),
    }
}

/// Orchestrates a three-way strategy comparison
pub struct Comparator {
    runner: Runner,
    progress: ProgressBar,
}

impl Comparator {
    /// Comparator without progress output
    pub fn new(runner: Runner) -> Self {
        Self {
            runner,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report the running strategy on `progress`
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// The runner every strategy goes through
    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    /// Compare all strategies on one workload and batch.
    ///
    /// Either every strategy succeeds and a complete report is returned, or
    /// the first failing strategy is named in the error.
    pub fn compare(
        &self,
        label: &str,
        unit: &dyn WorkUnit,
        batch: &[Payload],
        worker_count: usize,
    ) -> Result<ComparisonReport, CompareError> {
        validate_batch(unit, batch).map_err(invalid_argument)?;
        check_worker_count(worker_count, batch.len()).map_err(invalid_argument)?;

        let mut results: BTreeMap<Strategy, ExecutionResult> = BTreeMap::new();
        for strategy in Strategy::ALL {
            self.progress.set_message(format!(
                "{} x{}: {}",
                label,
                worker_count,
                strategy.label()
            ));
            let result = self
                .runner
                .run(strategy, unit, batch, worker_count)
                .map_err(|source| CompareError::ComparisonFailure {
                    workload: label.to_string(),
                    strategy,
                    source,
                })?;
            results.insert(strategy, result);
        }

        let sequential = results
            .get(&Strategy::Sequential)
            .map_or(Duration::ZERO, |r| r.duration());
        let speedups = results
            .iter()
            .map(|(&strategy, result)| (strategy, speedup_ratio(sequential, result.duration())))
            .collect();

        Ok(ComparisonReport {
            workload: label.to_string(),
            worker_count,
            results,
            speedups,
        })
    }

    /// Compare once per worker count, stopping at the first failure
    pub fn sweep(
        &self,
        label: &str,
        unit: &dyn WorkUnit,
        batch: &[Payload],
        worker_counts: &[usize],
    ) -> Result<Vec<ComparisonReport>, CompareError> {
        worker_counts
            .iter()
            .map(|&workers| self.compare(label, unit, batch, workers))
            .collect()
    }
}
