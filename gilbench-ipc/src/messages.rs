//! IPC Message Types
//!
//! All messages are serialized with rkyv. `Payload` additionally derives serde
//! because work-unit outputs end up in JSON reports.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A work-unit argument or output.
///
/// Work units are plain `input -> output` functions; this is the closed set of
/// value shapes they exchange, in-process and across the process boundary.
#[derive(
    Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize, Serialize, Deserialize,
)]
#[archive(check_bytes)]
#[serde(untagged)]
pub enum Payload {
    /// Signed integer (prime-sum bounds and results, probe values, counts)
    Integer(i64),
    /// Real number (wait durations in seconds)
    Real(f64),
    /// Free text (completion messages)
    Text(String),
}

impl Payload {
    /// The integer value, if this is an `Integer`
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Payload::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a real number. Integers widen losslessly for the ranges used here.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Payload::Real(v) => Some(*v),
            Payload::Integer(v) => Some(*v as f64),
            Payload::Text(_) => None,
        }
    }

    /// The text value, if this is `Text`
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the value's shape, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Integer(_) => "integer",
            Payload::Real(_) => "real",
            Payload::Text(_) => "text",
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Integer(v) => write!(f, "{}", v),
            Payload::Real(v) => write!(f, "{}", v),
            Payload::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Integer(v)
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Real(v)
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::Text(v)
    }
}

/// Settings for the simulated interpreter lock, shipped to every worker process
/// so that each one builds its own lock with the supervisor's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct GilSettings {
    /// Whether CPU work is serialized behind the lock at all
    pub enabled: bool,
    /// Forced-switch interval in nanoseconds
    pub switch_interval_ns: u64,
}

impl Default for GilSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            switch_interval_ns: 5_000_000, // 5ms, CPython's default
        }
    }
}

impl GilSettings {
    /// Settings with the lock simulation turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// OS process id of the worker
    pub pid: u32,
    /// Number of logical CPUs visible to the worker
    pub cpu_count: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            cpu_count: num_cpus(),
        }
    }
}

/// Categories of work-item failures reported by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// The work unit returned an error
    Raised,
    /// The work unit panicked (caught)
    Panic,
    /// The requested work unit is not registered in the worker binary
    UnknownUnit,
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake with worker capabilities
    Hello(WorkerCapabilities),

    /// The requested unit was found and the worker is ready for `Execute`
    Loaded {
        /// Registered name of the loaded unit
        unit: String,
    },

    /// One work item finished
    Output {
        /// Position of the item in the argument batch
        index: u64,
        /// Value returned by the unit
        value: Payload,
    },

    /// A work item (or unit loading) failed
    Failure {
        /// Position of the failing item, `None` for load failures
        index: Option<u64>,
        /// Error category
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Build the named unit and the worker's own interpreter lock
    Load {
        /// Registered unit name
        unit: String,
        /// Lock settings for this worker
        gil: GilSettings,
    },

    /// Run the loaded unit on one argument
    Execute {
        /// Position of the item in the argument batch
        index: u64,
        /// Argument value
        argument: Payload,
    },

    /// Request graceful shutdown
    Shutdown,
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|p| p.get() as u32)
        .unwrap_or(1)
}
