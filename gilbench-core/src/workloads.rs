//! Built-in workloads
//!
//! Two interchangeable stand-ins (a CPU-bound prime sum and an I/O-bound
//! timed wait), a diagnostic probe for exercising failure paths, and the
//! counter unit used by the contention scenario.

use crate::counter::SharedCounter;
use crate::gil::Gil;
use crate::unit::{WorkError, WorkUnit};
use gilbench_ipc::Payload;
use std::sync::Arc;
use std::time::Duration;

/// Trial division over 6k±1 candidates.
pub fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5;
    while i * i <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

fn prime_sum_below(n: i64, mut on_candidate: impl FnMut()) -> i64 {
    if n <= 2 {
        return 0;
    }
    let mut sum = 0i64;
    for candidate in 2..n as u64 {
        on_candidate();
        if is_prime(candidate) {
            sum += candidate as i64;
        }
    }
    sum
}

/// Sum of all primes strictly below `n`; 0 for `n <= 2`.
pub fn cpu_bound(n: i64) -> i64 {
    prime_sum_below(n, || {})
}

/// Completion message returned by [`io_bound`].
pub fn completion_message(seconds: f64) -> String {
    format!("Completed I/O operation that took {} seconds", seconds)
}

/// Block the calling thread for `seconds`, then report completion.
pub fn io_bound(seconds: f64) -> Result<String, WorkError> {
    let duration = wait_duration(seconds).map_err(WorkError::Raised)?;
    std::thread::sleep(duration);
    Ok(completion_message(seconds))
}

fn wait_duration(seconds: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| format!("wait must be a finite, non-negative number of seconds, got {seconds}"))
}

/// CPU-bound unit: `Integer(n) -> Integer(sum of primes below n)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimeSum;

impl PrimeSum {
    /// Registry name
    pub const NAME: &'static str = "prime-sum";
}

impl WorkUnit for PrimeSum {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, argument: &Payload) -> Result<(), String> {
        match argument {
            Payload::Integer(_) => Ok(()),
            other => Err(format!("prime-sum expects an integer bound, got {}", other.kind())),
        }
    }

    fn invoke(&self, argument: &Payload, gil: &mut Gil<'_>) -> Result<Payload, WorkError> {
        let n = argument.as_integer().ok_or(WorkError::ArgumentType {
            expected: "integer",
            got: argument.kind(),
        })?;
        Ok(Payload::Integer(prime_sum_below(n, || gil.tick())))
    }
}

/// I/O-bound unit: `Real(seconds) -> Text(completion message)`. Integers are
/// accepted as whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimedWait;

impl TimedWait {
    /// Registry name
    pub const NAME: &'static str = "timed-wait";
}

impl WorkUnit for TimedWait {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, argument: &Payload) -> Result<(), String> {
        let seconds = argument
            .as_real()
            .ok_or_else(|| format!("timed-wait expects seconds, got {}", argument.kind()))?;
        wait_duration(seconds).map(|_| ())
    }

    fn invoke(&self, argument: &Payload, gil: &mut Gil<'_>) -> Result<Payload, WorkError> {
        let seconds = argument.as_real().ok_or(WorkError::ArgumentType {
            expected: "real",
            got: argument.kind(),
        })?;
        gil.allow_threads(|| io_bound(seconds)).map(Payload::Text)
    }
}

/// Diagnostic unit: echoes a non-negative integer and raises on negative input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Probe;

impl Probe {
    /// Registry name
    pub const NAME: &'static str = "probe";
}

impl WorkUnit for Probe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, argument: &Payload) -> Result<(), String> {
        match argument {
            Payload::Integer(_) => Ok(()),
            other => Err(format!("probe expects an integer, got {}", other.kind())),
        }
    }

    fn invoke(&self, argument: &Payload, gil: &mut Gil<'_>) -> Result<Payload, WorkError> {
        gil.tick();
        match argument.as_integer() {
            Some(v) if v < 0 => Err(WorkError::raised(format!(
                "probe rejected negative value {}",
                v
            ))),
            Some(v) => Ok(Payload::Integer(v)),
            None => Err(WorkError::ArgumentType {
                expected: "integer",
                got: argument.kind(),
            }),
        }
    }
}

/// Counter unit: `Integer(k)` increments the shared counter `k` times, one
/// guarded increment per tick, and returns `Integer(k)`.
///
/// The counter lives in the caller's address space, so this unit is
/// in-process only and deliberately absent from the registry.
#[derive(Debug, Clone)]
pub struct GuardedIncrement {
    counter: Arc<SharedCounter>,
}

impl GuardedIncrement {
    /// Unit name
    pub const NAME: &'static str = "guarded-increment";

    /// Wrap a shared counter
    pub fn new(counter: Arc<SharedCounter>) -> Self {
        Self { counter }
    }

    /// The counter this unit increments
    pub fn counter(&self) -> &Arc<SharedCounter> {
        &self.counter
    }
}

impl WorkUnit for GuardedIncrement {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, argument: &Payload) -> Result<(), String> {
        match argument {
            Payload::Integer(k) if *k >= 0 => Ok(()),
            Payload::Integer(k) => Err(format!("increment count must be >= 0, got {}", k)),
            other => Err(format!("increment count must be an integer, got {}", other.kind())),
        }
    }

    fn invoke(&self, argument: &Payload, gil: &mut Gil<'_>) -> Result<Payload, WorkError> {
        let count = argument.as_integer().ok_or(WorkError::ArgumentType {
            expected: "integer",
            got: argument.kind(),
        })?;
        for _ in 0..count {
            self.counter.increment();
            gil.tick();
        }
        Ok(Payload::Integer(count))
    }
}
