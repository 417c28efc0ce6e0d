//! Lock Contention Demo
//!
//! Increments one guarded counter `iterations` times on a single thread, then
//! splits the same work over several threads. Under the simulated lock the
//! threaded phase is no faster (often slower); the counter still ends exact.

use gilbench_core::{
    GilSettings, GuardedIncrement, Interpreter, Payload, RunError, SharedCounter, run_sequential,
    run_threaded,
};
use gilbench_report::ContentionReport;
use std::sync::Arc;

/// Run the two-phase contention experiment.
pub fn run_contention(
    threads: usize,
    iterations: u64,
    gil: GilSettings,
) -> Result<ContentionReport, RunError> {
    if threads == 0 {
        return Err(RunError::InvalidArgument(
            "contention demo needs at least one thread".to_string(),
        ));
    }
    let total = i64::try_from(iterations).map_err(|_| {
        RunError::InvalidArgument(format!("too many iterations: {}", iterations))
    })?;
    let per_thread = total / threads as i64;

    let counter = Arc::new(SharedCounter::new());
    let unit = GuardedIncrement::new(Arc::clone(&counter));

    let single = run_sequential(&unit, &[Payload::Integer(total)], &Interpreter::new(gil))?;
    tracing::debug!(count = counter.get(), "single-thread phase done");

    counter.reset();
    let batch = vec![Payload::Integer(per_thread); threads];
    let multi = run_threaded(&unit, &batch, threads, &Interpreter::new(gil))?;

    let single_thread_secs = single.duration_secs();
    let multi_thread_secs = multi.duration_secs();
    let speedup = if multi_thread_secs > 0.0 {
        single_thread_secs / multi_thread_secs
    } else {
        1.0
    };

    let report = ContentionReport {
        threads,
        iterations,
        single_thread_secs,
        multi_thread_secs,
        speedup,
        ideal_speedup: threads as f64,
        final_count: counter.get(),
    };
    tracing::info!(
        threads,
        iterations,
        speedup = report.speedup,
        final_count = report.final_count,
        "contention demo finished"
    );
    Ok(report)
}
