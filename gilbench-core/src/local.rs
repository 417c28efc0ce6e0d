//! In-process strategies: sequential and thread-parallel
//!
//! Both share one [`Interpreter`] with the caller. The sequential runner holds
//! the lock for the whole batch; the threaded runner starts one OS thread per
//! worker, each of which takes the lock before touching a work item, so
//! CPU-bound units serialize exactly as they would under a real interpreter
//! lock while I/O-bound units overlap inside [`Gil::allow_threads`].
//!
//! [`Gil::allow_threads`]: crate::gil::Gil::allow_threads

use crate::error::RunError;
use crate::gil::Interpreter;
use crate::measure::Timer;
use crate::queue::{ItemFailure, ShardOutcome, WorkQueue, assemble};
use crate::strategy::{ExecutionResult, Strategy};
use crate::unit::{WorkUnit, invoke_caught};
use gilbench_ipc::Payload;
use std::thread;

/// Check every argument against the unit before anything is dispatched.
pub fn validate_batch(unit: &dyn WorkUnit, batch: &[Payload]) -> Result<(), RunError> {
    for (index, argument) in batch.iter().enumerate() {
        unit.validate(argument).map_err(|message| {
            RunError::InvalidArgument(format!(
                "{}: argument #{} ({}): {}",
                unit.name(),
                index,
                argument,
                message
            ))
        })?;
    }
    Ok(())
}

/// Reject a zero worker count for a non-empty batch.
pub fn check_worker_count(worker_count: usize, len: usize) -> Result<(), RunError> {
    if worker_count == 0 && len > 0 {
        return Err(RunError::InvalidArgument(
            "worker_count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Run every argument in order on the calling thread.
///
/// Stops at the first failing argument; later arguments are never invoked.
pub fn run_sequential(
    unit: &dyn WorkUnit,
    batch: &[Payload],
    interpreter: &Interpreter,
) -> Result<ExecutionResult, RunError> {
    validate_batch(unit, batch)?;
    if batch.is_empty() {
        return Ok(ExecutionResult::empty());
    }

    let timer = Timer::start();
    let mut gil = interpreter.acquire();
    let mut outputs = Vec::with_capacity(batch.len());
    for (index, argument) in batch.iter().enumerate() {
        let value = invoke_caught(unit, argument, &mut gil).map_err(|failure| {
            RunError::WorkerFailure {
                strategy: Strategy::Sequential,
                index,
                message: failure.message,
            }
        })?;
        outputs.push(value);
    }
    drop(gil);

    Ok(ExecutionResult::new(outputs, timer.stop()))
}

/// Run the batch on up to `worker_count` threads sharing one interpreter lock.
///
/// Never starts more threads than there are arguments. All threads are joined
/// before this returns, on success and on failure alike.
pub fn run_threaded(
    unit: &dyn WorkUnit,
    batch: &[Payload],
    worker_count: usize,
    interpreter: &Interpreter,
) -> Result<ExecutionResult, RunError> {
    validate_batch(unit, batch)?;
    check_worker_count(worker_count, batch.len())?;
    if batch.is_empty() {
        return Ok(ExecutionResult::empty());
    }

    let threads = worker_count.min(batch.len());
    let queue = WorkQueue::new(batch);
    let timer = Timer::start();

    let shards = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        let mut spawn_error = None;
        for id in 0..threads {
            let queue = &queue;
            let spawned = thread::Builder::new()
                .name(format!("gilbench-worker-{}", id))
                .spawn_scoped(scope, move || drain(unit, queue, interpreter));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    queue.abort();
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        let mut shards = Vec::with_capacity(handles.len());
        let mut panicked = false;
        for handle in handles {
            match handle.join() {
                Ok(shard) => shards.push(shard),
                Err(_) => panicked = true,
            }
        }

        if let Some(e) = spawn_error {
            return Err(RunError::Infrastructure {
                strategy: Strategy::ThreadParallel,
                message: format!("failed to spawn worker thread: {}", e),
            });
        }
        if panicked {
            return Err(RunError::Infrastructure {
                strategy: Strategy::ThreadParallel,
                message: "worker thread panicked outside a work item".to_string(),
            });
        }
        Ok(shards)
    })?;

    let outputs = assemble(Strategy::ThreadParallel, batch.len(), shards)?;
    Ok(ExecutionResult::new(outputs, timer.stop()))
}

fn drain(unit: &dyn WorkUnit, queue: &WorkQueue<'_>, interpreter: &Interpreter) -> ShardOutcome {
    let mut outcome = ShardOutcome::default();
    let mut gil = interpreter.acquire();
    while let Some((index, argument)) = queue.claim() {
        match invoke_caught(unit, argument, &mut gil) {
            Ok(value) => outcome.completed.push((index, value)),
            Err(failure) => {
                queue.abort();
                outcome.failure = Some(ItemFailure {
                    index,
                    message: failure.message,
                });
                break;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::SharedCounter;
    use crate::workloads::{GuardedIncrement, PrimeSum, Probe, TimedWait, cpu_bound};
    use std::sync::Arc;
    use std::time::Duration;

    fn ints(values: &[i64]) -> Vec<Payload> {
        values.iter().copied().map(Payload::Integer).collect()
    }

    #[test]
    fn test_sequential_preserves_order() {
        let interp = Interpreter::default();
        let result = run_sequential(&PrimeSum, &ints(&[10, 2, 12]), &interp).unwrap();
        assert_eq!(result.outputs(), ints(&[17, 0, 28]).as_slice());
        assert!(result.duration() > Duration::ZERO);
    }

    #[test]
    fn test_threaded_matches_sequential() {
        let interp = Interpreter::default();
        let batch = ints(&[5_000, 100, 20_000, 3, 7_500]);
        let expected: Vec<Payload> = [5_000, 100, 20_000, 3, 7_500]
            .iter()
            .map(|&n| Payload::Integer(cpu_bound(n)))
            .collect();

        for workers in [1, 2, 3, 8] {
            let result = run_threaded(&PrimeSum, &batch, workers, &interp).unwrap();
            assert_eq!(result.outputs(), expected.as_slice(), "workers={}", workers);
        }
    }

    #[test]
    fn test_empty_batch_is_empty_result() {
        let interp = Interpreter::default();
        let seq = run_sequential(&PrimeSum, &[], &interp).unwrap();
        let thr = run_threaded(&PrimeSum, &[], 0, &interp).unwrap();
        for result in [seq, thr] {
            assert!(result.is_empty());
            assert_eq!(result.duration(), Duration::ZERO);
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let interp = Interpreter::default();
        let err = run_threaded(&PrimeSum, &ints(&[10]), 0, &interp).unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[test]
    fn test_bad_argument_rejected_before_dispatch() {
        let interp = Interpreter::default();
        let counter = Arc::new(SharedCounter::new());
        let unit = GuardedIncrement::new(Arc::clone(&counter));
        let batch = vec![Payload::Integer(5), Payload::Text("x".into())];

        assert!(matches!(
            run_sequential(&unit, &batch, &interp),
            Err(RunError::InvalidArgument(_))
        ));
        assert!(matches!(
            run_threaded(&unit, &batch, 2, &interp),
            Err(RunError::InvalidArgument(_))
        ));
        // Nothing ran
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn test_sequential_failure_stops_at_first_error() {
        let interp = Interpreter::default();
        let err = run_sequential(&Probe, &ints(&[1, -2, 3, -4]), &interp).unwrap_err();
        assert_eq!(err.failed_index(), Some(1));
        assert_eq!(err.strategy(), Some(Strategy::Sequential));
    }

    #[test]
    fn test_threaded_failure_propagates() {
        let interp = Interpreter::default();
        let err = run_threaded(&Probe, &ints(&[1, 2, -3, 4]), 4, &interp).unwrap_err();
        match err {
            RunError::WorkerFailure {
                strategy, index, ..
            } => {
                assert_eq!(strategy, Strategy::ThreadParallel);
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_threaded_io_overlaps() {
        let interp = Interpreter::default();
        let batch = vec![Payload::Real(0.2); 4];

        let seq = run_sequential(&TimedWait, &batch, &interp).unwrap();
        let thr = run_threaded(&TimedWait, &batch, 4, &interp).unwrap();

        assert!(seq.duration() >= Duration::from_millis(800));
        assert!(thr.duration() < Duration::from_millis(600));
        assert_eq!(seq.outputs(), thr.outputs());
    }

    #[test]
    fn test_threaded_counter_is_exact() {
        let interp = Interpreter::default();
        let counter = Arc::new(SharedCounter::new());
        let unit = GuardedIncrement::new(Arc::clone(&counter));

        run_threaded(&unit, &ints(&[10_000; 4]), 4, &interp).unwrap();
        assert_eq!(counter.get(), 40_000);
    }
}
