//! Guarded shared counter
//!
//! The only genuinely shared mutable state in the harness. It is owned (usually
//! behind an `Arc`) by whoever runs the contention scenario and is only ever
//! touched through its lock-scoped operations.

use std::sync::{Mutex, PoisonError};

/// A `u64` behind a mutex. Every update happens under the guard, so no
/// increment is ever lost, no matter how many threads contend.
#[derive(Debug, Default)]
pub struct SharedCounter {
    value: Mutex<u64>,
}

impl SharedCounter {
    /// New counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one and return the new value
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Add `amount` and return the new value
    pub fn add(&self, amount: u64) -> u64 {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *value += amount;
        *value
    }

    /// Current value
    pub fn get(&self) -> u64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset to zero, returning the previous value
    pub fn reset(&self) -> u64 {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *value)
    }
}
