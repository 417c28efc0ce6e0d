//! Work-unit contract and registry
//!
//! A work unit is a stateless `argument -> output` function. The strategy
//! runners know nothing else about it: they validate every argument up front,
//! then call [`WorkUnit::invoke`] once per argument under the interpreter lock.
//!
//! Units that must also run inside worker processes are listed in
//! [`BUILTIN_UNITS`]; a worker re-creates its unit by name from this table.

use crate::gil::Gil;
use crate::workloads::{PrimeSum, Probe, TimedWait};
use gilbench_ipc::{FailureKind, Payload};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Error raised by a work unit for one argument
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkError {
    /// The argument has the wrong shape for this unit
    #[error("expected {expected} argument, got {got}")]
    ArgumentType {
        /// Shape the unit accepts
        expected: &'static str,
        /// Shape it was given
        got: &'static str,
    },

    /// The unit rejected the argument or failed while processing it
    #[error("{0}")]
    Raised(String),
}

impl WorkError {
    /// Shorthand for [`WorkError::Raised`]
    pub fn raised(message: impl Into<String>) -> Self {
        WorkError::Raised(message.into())
    }
}

/// A pluggable unit of work.
pub trait WorkUnit: Send + Sync {
    /// Stable name; for registered units this is the registry key
    fn name(&self) -> &str;

    /// Reject malformed arguments before anything is dispatched
    fn validate(&self, argument: &Payload) -> Result<(), String> {
        let _ = argument;
        Ok(())
    }

    /// Process one argument. CPU work should call [`Gil::tick`] regularly;
    /// blocking waits should run inside [`Gil::allow_threads`].
    fn invoke(&self, argument: &Payload, gil: &mut Gil<'_>) -> Result<Payload, WorkError>;
}

/// A failed invocation, with panics already caught
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    /// Whether the unit returned an error or panicked
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
}

/// Invoke a unit, converting both returned errors and panics into a [`UnitFailure`].
pub fn invoke_caught(
    unit: &dyn WorkUnit,
    argument: &Payload,
    gil: &mut Gil<'_>,
) -> Result<Payload, UnitFailure> {
    match catch_unwind(AssertUnwindSafe(|| unit.invoke(argument, gil))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(UnitFailure {
            kind: FailureKind::Raised,
            message: e.to_string(),
        }),
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(UnitFailure {
                kind: FailureKind::Panic,
                message: format!("panicked: {}", message),
            })
        }
    }
}

/// Registry entry for a unit that worker processes can build by name
#[derive(Debug, Clone, Copy)]
pub struct UnitDef {
    /// Registry key, equal to the built unit's `name()`
    pub name: &'static str,
    /// One-line description for `gilbench units`
    pub description: &'static str,
    /// Constructor
    pub build: fn() -> Box<dyn WorkUnit>,
}

fn build_prime_sum() -> Box<dyn WorkUnit> {
    Box::new(PrimeSum)
}

fn build_timed_wait() -> Box<dyn WorkUnit> {
    Box::new(TimedWait)
}

fn build_probe() -> Box<dyn WorkUnit> {
    Box::new(Probe)
}

/// Units available in every gilbench binary, and therefore in worker processes
pub static BUILTIN_UNITS: &[UnitDef] = &[
    UnitDef {
        name: PrimeSum::NAME,
        description: "CPU-bound: sum of all primes below n",
        build: build_prime_sum,
    },
    UnitDef {
        name: TimedWait::NAME,
        description: "I/O-bound: wait for the given seconds with the lock released",
        build: build_timed_wait,
    },
    UnitDef {
        name: Probe::NAME,
        description: "Diagnostic: echoes an integer, fails on negative input",
        build: build_probe,
    },
];

/// Look up a registered unit by name
pub fn find_unit(name: &str) -> Option<&'static UnitDef> {
    BUILTIN_UNITS.iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gil::Interpreter;

    struct Panicky;

    impl WorkUnit for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        fn invoke(&self, _argument: &Payload, _gil: &mut Gil<'_>) -> Result<Payload, WorkError> {
            panic!("boom")
        }
    }

    struct PanicsWhileBlocked;

    impl WorkUnit for PanicsWhileBlocked {
        fn name(&self) -> &str {
            "panics-while-blocked"
        }

        fn invoke(&self, _argument: &Payload, gil: &mut Gil<'_>) -> Result<Payload, WorkError> {
            gil.allow_threads(|| panic!("io failed"))
        }
    }

    #[test]
    fn test_registry_names_match_units() {
        for def in BUILTIN_UNITS {
            assert_eq!((def.build)().name(), def.name);
            assert!(find_unit(def.name).is_some());
        }
        assert!(find_unit("guarded-increment").is_none());
        assert!(find_unit("nope").is_none());
    }

    #[test]
    fn test_invoke_caught_returns_raised_errors() {
        let interp = Interpreter::disabled();
        let mut gil = interp.acquire();
        let failure = invoke_caught(&Probe, &Payload::Integer(-1), &mut gil).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Raised);
        assert!(failure.message.contains("-1"));
    }

    #[test]
    fn test_invoke_caught_catches_panics() {
        let interp = Interpreter::default();
        let mut gil = interp.acquire();
        let failure = invoke_caught(&Panicky, &Payload::Integer(0), &mut gil).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "panicked: boom");
        // The guard survives the unwind
        assert!(gil.is_held());
    }

    #[test]
    fn test_panic_with_lock_released_restores_it() {
        let interp = Interpreter::default();
        let mut gil = interp.acquire();
        let failure =
            invoke_caught(&PanicsWhileBlocked, &Payload::Integer(0), &mut gil).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "panicked: io failed");
        assert!(gil.is_held());
    }
}
