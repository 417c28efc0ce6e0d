//! Shared work queue and in-order assembly
//!
//! Both parallel strategies hand out work the same way: every worker (thread
//! or process driver) claims the next unclaimed index from one cursor, so the
//! subsets are disjoint and faster workers simply take more items. Outputs
//! carry their index and are put back into argument order at the end;
//! completion order never leaks into the result.

use crate::error::RunError;
use crate::strategy::Strategy;
use gilbench_ipc::Payload;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Cursor over an argument batch shared by all workers of one run
#[derive(Debug)]
pub struct WorkQueue<'a> {
    batch: &'a [Payload],
    cursor: AtomicUsize,
    aborted: AtomicBool,
}

impl<'a> WorkQueue<'a> {
    /// Queue over `batch`
    pub fn new(batch: &'a [Payload]) -> Self {
        Self {
            batch,
            cursor: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    /// Claim the next item, or `None` once the batch is drained or aborted
    pub fn claim(&self) -> Option<(usize, &'a Payload)> {
        if self.aborted.load(Ordering::Acquire) {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        self.batch.get(index).map(|argument| (index, argument))
    }

    /// Stop handing out items; already claimed items still finish
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// Whether `abort` has been called
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Batch length
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}

/// A work item that failed inside one worker
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// Position in the batch
    pub index: usize,
    /// What went wrong
    pub message: String,
}

/// What one worker produced before it stopped
#[derive(Debug, Default)]
pub struct ShardOutcome {
    /// `(index, output)` pairs in completion order
    pub completed: Vec<(usize, Payload)>,
    /// The item that made this worker stop, if any
    pub failure: Option<ItemFailure>,
}

/// Re-assemble per-worker outcomes into argument order.
///
/// If any worker failed, the failure with the lowest argument index is
/// reported and every output is discarded. Missing or duplicated items are
/// infrastructure errors: a result must hold exactly one output per argument.
pub fn assemble(
    strategy: Strategy,
    len: usize,
    shards: Vec<ShardOutcome>,
) -> Result<Vec<Payload>, RunError> {
    let first_failure = shards
        .iter()
        .filter_map(|shard| shard.failure.as_ref())
        .min_by_key(|failure| failure.index);
    if let Some(failure) = first_failure {
        return Err(RunError::WorkerFailure {
            strategy,
            index: failure.index,
            message: failure.message.clone(),
        });
    }

    let mut slots: Vec<Option<Payload>> = vec![None; len];
    for (index, value) in shards.into_iter().flat_map(|shard| shard.completed) {
        let slot = slots.get_mut(index).ok_or_else(|| RunError::Infrastructure {
            strategy,
            message: format!("output for argument #{} is out of range ({} arguments)", index, len),
        })?;
        if slot.replace(value).is_some() {
            return Err(RunError::Infrastructure {
                strategy,
                message: format!("argument #{} was executed twice", index),
            });
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| RunError::Infrastructure {
                strategy,
                message: format!("argument #{} produced no output", index),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Payload> {
        values.iter().copied().map(Payload::Integer).collect()
    }

    #[test]
    fn test_claims_are_disjoint_and_exhaustive() {
        let batch = ints(&[10, 20, 30]);
        let queue = WorkQueue::new(&batch);
        assert_eq!(queue.claim(), Some((0, &batch[0])));
        assert_eq!(queue.claim(), Some((1, &batch[1])));
        assert_eq!(queue.claim(), Some((2, &batch[2])));
        assert_eq!(queue.claim(), None);
        assert_eq!(queue.claim(), None);
    }

    #[test]
    fn test_abort_stops_claims() {
        let batch = ints(&[1, 2]);
        let queue = WorkQueue::new(&batch);
        assert!(queue.claim().is_some());
        queue.abort();
        assert!(queue.is_aborted());
        assert_eq!(queue.claim(), None);
    }

    #[test]
    fn test_assemble_restores_input_order() {
        let shards = vec![
            ShardOutcome {
                completed: vec![(2, Payload::Integer(41)), (0, Payload::Integer(10))],
                failure: None,
            },
            ShardOutcome {
                completed: vec![(1, Payload::Integer(17))],
                failure: None,
            },
        ];
        let outputs = assemble(Strategy::ThreadParallel, 3, shards).unwrap();
        assert_eq!(outputs, ints(&[10, 17, 41]));
    }

    #[test]
    fn test_assemble_reports_lowest_failing_index() {
        let shards = vec![
            ShardOutcome {
                completed: vec![(0, Payload::Integer(1))],
                failure: Some(ItemFailure {
                    index: 4,
                    message: "late".to_string(),
                }),
            },
            ShardOutcome {
                completed: Vec::new(),
                failure: Some(ItemFailure {
                    index: 2,
                    message: "early".to_string(),
                }),
            },
        ];
        let err = assemble(Strategy::ProcessParallel, 5, shards).unwrap_err();
        assert_eq!(
            err,
            RunError::WorkerFailure {
                strategy: Strategy::ProcessParallel,
                index: 2,
                message: "early".to_string(),
            }
        );
    }

    #[test]
    fn test_assemble_rejects_missing_and_duplicate_items() {
        let missing = vec![ShardOutcome {
            completed: vec![(0, Payload::Integer(1))],
            failure: None,
        }];
        assert!(matches!(
            assemble(Strategy::ThreadParallel, 2, missing),
            Err(RunError::Infrastructure { .. })
        ));

        let duplicated = vec![
            ShardOutcome {
                completed: vec![(0, Payload::Integer(1))],
                failure: None,
            },
            ShardOutcome {
                completed: vec![(0, Payload::Integer(1))],
                failure: None,
            },
        ];
        assert!(matches!(
            assemble(Strategy::ThreadParallel, 1, duplicated),
            Err(RunError::Infrastructure { .. })
        ));
    }
}
