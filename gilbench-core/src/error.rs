//! Run and comparison errors
//!
//! Nothing in the harness swallows a failure: a bad argument aborts before
//! dispatch, a failing work item aborts its strategy, and a failing strategy
//! aborts the whole comparison.

use crate::strategy::Strategy;
use thiserror::Error;

/// Failure of a single strategy invocation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    /// Rejected before anything was dispatched
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A work item raised an error (or panicked, or its worker died)
    #[error("{strategy} run failed on argument #{index}: {message}")]
    WorkerFailure {
        /// Strategy that was running
        strategy: Strategy,
        /// Position of the failing argument in the batch
        index: usize,
        /// What went wrong
        message: String,
    },

    /// The strategy's own machinery failed (spawn, IPC, protocol)
    #[error("{strategy} infrastructure failure: {message}")]
    Infrastructure {
        /// Strategy that was running
        strategy: Strategy,
        /// What went wrong
        message: String,
    },
}

impl RunError {
    /// Strategy the error originated in, if any work was dispatched
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            RunError::InvalidArgument(_) => None,
            RunError::WorkerFailure { strategy, .. } | RunError::Infrastructure { strategy, .. } => {
                Some(*strategy)
            }
        }
    }

    /// Index of the failing argument, for worker failures
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            RunError::WorkerFailure { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Failure of a whole comparison
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompareError {
    /// Arguments or worker count rejected before any strategy ran
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// One strategy failed, so no report was produced
    #[error("comparison `{workload}` aborted: {strategy} strategy failed")]
    ComparisonFailure {
        /// Workload label of the comparison
        workload: String,
        /// The strategy that failed
        strategy: Strategy,
        /// The strategy's error
        #[source]
        source: RunError,
    },
}

impl CompareError {
    /// The failing strategy, for comparison failures
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            CompareError::ComparisonFailure { strategy, .. } => Some(*strategy),
            CompareError::InvalidArgument(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_failure_message_names_strategy_and_index() {
        let err = RunError::WorkerFailure {
            strategy: Strategy::ProcessParallel,
            index: 2,
            message: "probe rejected negative value -1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "multiprocessing run failed on argument #2: probe rejected negative value -1"
        );
        assert_eq!(err.strategy(), Some(Strategy::ProcessParallel));
        assert_eq!(err.failed_index(), Some(2));
    }

    #[test]
    fn test_comparison_failure_keeps_source() {
        let source = RunError::WorkerFailure {
            strategy: Strategy::Sequential,
            index: 0,
            message: "boom".to_string(),
        };
        let err = CompareError::ComparisonFailure {
            workload: "probe".to_string(),
            strategy: Strategy::Sequential,
            source: source.clone(),
        };
        assert_eq!(err.strategy(), Some(Strategy::Sequential));
        assert_eq!(
            err.to_string(),
            "comparison `probe` aborted: sequential strategy failed"
        );
        let inner = std::error::Error::source(&err).unwrap();
        assert_eq!(inner.to_string(), source.to_string());
    }
}
