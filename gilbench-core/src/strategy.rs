//! Execution strategies and their results

use gilbench_ipc::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a batch of work items is executed.
///
/// The variants differ only in dispatch and teardown; all of them honour the
/// same contract: one output per argument, in argument order, or an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One item after another on the calling thread; the speedup baseline
    Sequential,
    /// Up to `worker_count` threads in this process, sharing one interpreter lock
    ThreadParallel,
    /// Up to `worker_count` worker processes, each with its own interpreter lock
    ProcessParallel,
}

impl Strategy {
    /// All strategies, in the order the comparator runs them
    pub const ALL: [Strategy; 3] = [
        Strategy::Sequential,
        Strategy::ThreadParallel,
        Strategy::ProcessParallel,
    ];

    /// Machine-readable name
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::ThreadParallel => "threading",
            Strategy::ProcessParallel => "multiprocessing",
        }
    }

    /// Display name used in text reports
    pub fn label(self) -> &'static str {
        match self {
            Strategy::Sequential => "Sequential",
            Strategy::ThreadParallel => "Threading",
            Strategy::ProcessParallel => "Multiprocessing",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Ok(Strategy::Sequential),
            "threading" | "thread" | "threads" | "thread-parallel" => Ok(Strategy::ThreadParallel),
            "multiprocessing" | "process" | "processes" | "process-parallel" => {
                Ok(Strategy::ProcessParallel)
            }
            other => Err(format!("Unknown strategy: {}", other)),
        }
    }
}

/// Outputs of one strategy invocation plus its wall-clock duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    outputs: Vec<Payload>,
    #[serde(rename = "duration_secs", with = "duration_secs")]
    duration: Duration,
}

impl ExecutionResult {
    /// Result of a run. Empty runs always report a zero duration.
    pub fn new(outputs: Vec<Payload>, duration: Duration) -> Self {
        let duration = if outputs.is_empty() {
            Duration::ZERO
        } else {
            duration
        };
        Self { outputs, duration }
    }

    /// Result of running an empty batch
    pub fn empty() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    /// Outputs, `outputs()[i]` belonging to argument `i`
    pub fn outputs(&self) -> &[Payload] {
        &self.outputs
    }

    /// Consume the result, keeping the outputs
    pub fn into_outputs(self) -> Vec<Payload> {
        self.outputs
    }

    /// Wall-clock duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Wall-clock duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Number of outputs
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// Whether the run had no work items
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_order_and_names() {
        assert_eq!(
            Strategy::ALL,
            [
                Strategy::Sequential,
                Strategy::ThreadParallel,
                Strategy::ProcessParallel
            ]
        );
        for strategy in Strategy::ALL {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
        assert_eq!("thread".parse::<Strategy>().unwrap(), Strategy::ThreadParallel);
        assert_eq!("PROCESS".parse::<Strategy>().unwrap(), Strategy::ProcessParallel);
        assert!("fibers".parse::<Strategy>().is_err());
        assert_eq!(Strategy::ProcessParallel.label(), "Multiprocessing");
    }

    #[test]
    fn test_empty_result_has_zero_duration() {
        let result = ExecutionResult::new(Vec::new(), Duration::from_millis(3));
        assert!(result.is_empty());
        assert_eq!(result.duration(), Duration::ZERO);
        assert_eq!(ExecutionResult::empty(), result);
    }

    #[test]
    fn test_result_json_shape() {
        let result = ExecutionResult::new(
            vec![Payload::Integer(17), Payload::Integer(0)],
            Duration::from_millis(1500),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration_secs"], 1.5);
        assert_eq!(json["outputs"], serde_json::json!([17, 0]));

        let back: ExecutionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_strategy_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Strategy::ThreadParallel).unwrap(),
            r#""thread-parallel""#
        );
    }
}
