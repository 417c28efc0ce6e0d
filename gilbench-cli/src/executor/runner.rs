//! Strategy Runner
//!
//! One entry point, `Runner::run`, for all three strategies. In-process
//! strategies get a fresh interpreter lock per invocation; process-parallel
//! hands the unit's registry name to a [`ProcessPool`].

use crate::supervisor::ProcessPool;
use gilbench_core::{
    ExecutionResult, GilSettings, Interpreter, Payload, RunError, Strategy, WorkUnit,
    check_worker_count, find_unit, run_sequential, run_threaded, validate_batch,
};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration shared by every strategy invocation
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interpreter lock settings (per process)
    pub gil: GilSettings,
    /// Binary to start as worker process; `None` means the current executable
    pub worker_binary: Option<PathBuf>,
    /// Per-item timeout for worker processes; `None` disables it
    pub worker_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            gil: GilSettings::default(),
            worker_binary: None,
            worker_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Runs a work unit under any [`Strategy`]
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    /// Runner with the given settings
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Settings shared by every run
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `unit` over `batch` with `strategy`.
    ///
    /// Arguments are validated before anything is dispatched. On success the
    /// result holds exactly one output per argument, in argument order.
    pub fn run(
        &self,
        strategy: Strategy,
        unit: &dyn WorkUnit,
        batch: &[Payload],
        worker_count: usize,
    ) -> Result<ExecutionResult, RunError> {
        tracing::debug!(
            %strategy,
            unit = unit.name(),
            items = batch.len(),
            worker_count,
            "dispatching"
        );

        let result = match strategy {
            Strategy::Sequential => {
                let interpreter = Interpreter::new(self.config.gil);
                run_sequential(unit, batch, &interpreter)
            }
            Strategy::ThreadParallel => {
                let interpreter = Interpreter::new(self.config.gil);
                let result = run_threaded(unit, batch, worker_count, &interpreter);
                tracing::debug!(
                    forced_switches = interpreter.forced_switches(),
                    "threads joined"
                );
                result
            }
            Strategy::ProcessParallel => self.run_processes(unit, batch, worker_count),
        }?;

        tracing::info!(
            %strategy,
            unit = unit.name(),
            worker_count,
            secs = result.duration_secs(),
            "strategy finished"
        );
        Ok(result)
    }

    fn run_processes(
        &self,
        unit: &dyn WorkUnit,
        batch: &[Payload],
        worker_count: usize,
    ) -> Result<ExecutionResult, RunError> {
        validate_batch(unit, batch)?;
        check_worker_count(worker_count, batch.len())?;
        if find_unit(unit.name()).is_none() {
            return Err(RunError::InvalidArgument(format!(
                "work unit `{}` is not registered, worker processes cannot build it",
                unit.name()
            )));
        }
        if batch.is_empty() {
            return Ok(ExecutionResult::empty());
        }

        let pool = ProcessPool::new(
            self.worker_binary()?,
            self.config.gil,
            self.config.worker_timeout,
        );
        pool.run(unit.name(), batch, worker_count)
    }

    fn worker_binary(&self) -> Result<PathBuf, RunError> {
        match &self.config.worker_binary {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(|e| RunError::Infrastructure {
                strategy: Strategy::ProcessParallel,
                message: format!("cannot locate current executable: {}", e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gilbench_core::{GuardedIncrement, PrimeSum, SharedCounter};
    use std::sync::Arc;

    fn unusable_workers() -> Runner {
        Runner::new(RunnerConfig {
            worker_binary: Some(PathBuf::from("/nonexistent/gilbench")),
            ..RunnerConfig::default()
        })
    }

    #[test]
    fn test_in_process_strategies() {
        let runner = Runner::default();
        let batch = vec![Payload::Integer(10), Payload::Integer(12)];
        for strategy in [Strategy::Sequential, Strategy::ThreadParallel] {
            let result = runner.run(strategy, &PrimeSum, &batch, 2).unwrap();
            assert_eq!(
                result.outputs(),
                &[Payload::Integer(17), Payload::Integer(28)]
            );
        }
    }

    #[test]
    fn test_unregistered_unit_rejected_for_processes() {
        let unit = GuardedIncrement::new(Arc::new(SharedCounter::new()));
        let err = unusable_workers()
            .run(Strategy::ProcessParallel, &unit, &[Payload::Integer(1)], 2)
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[test]
    fn test_validation_precedes_spawning() {
        let err = unusable_workers()
            .run(Strategy::ProcessParallel, &PrimeSum, &[Payload::Real(1.0)], 2)
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));

        let err = unusable_workers()
            .run(Strategy::ProcessParallel, &PrimeSum, &[Payload::Integer(1)], 0)
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[test]
    fn test_process_empty_batch_needs_no_workers() {
        let result = unusable_workers()
            .run(Strategy::ProcessParallel, &PrimeSum, &[], 4)
            .unwrap();
        assert!(result.is_empty());
    }
}
