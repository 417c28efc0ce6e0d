//! Configuration loading from gilbench.toml
//!
//! gilbench configuration can be specified in a `gilbench.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.
//! Every field has a default, so an empty file (or no file) is a valid configuration.

use gilbench_ipc::GilSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up during discovery
pub const CONFIG_FILE: &str = "gilbench.toml";

/// gilbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GilbenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerSection,
    /// Workload arguments
    #[serde(default)]
    pub workloads: WorkloadsSection,
    /// Contention demo configuration
    #[serde(default)]
    pub contention: ContentionSection,
    /// Output configuration
    #[serde(default)]
    pub output: OutputSection,
}

/// Runner configuration for strategy execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerSection {
    /// Simulate the interpreter lock (false = native Rust threads)
    #[serde(default = "default_gil")]
    pub gil: bool,
    /// Forced-switch interval of the simulated lock (e.g., "5ms")
    #[serde(default = "default_switch_interval")]
    pub switch_interval: String,
    /// Per-item timeout for worker processes (e.g., "60s"); "0s" disables it
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout: String,
    /// Worker counts to compare; empty means `[min(4, cpus)]`
    #[serde(default)]
    pub workers: Vec<usize>,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            gil: default_gil(),
            switch_interval: default_switch_interval(),
            worker_timeout: default_worker_timeout(),
            workers: Vec::new(),
        }
    }
}

fn default_gil() -> bool {
    true
}
fn default_switch_interval() -> String {
    "5ms".to_string()
}
fn default_worker_timeout() -> String {
    "60s".to_string()
}

/// Argument batches for the built-in workloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadsSection {
    /// Upper bounds for the CPU-bound prime sum
    #[serde(default = "default_cpu_args")]
    pub cpu_args: Vec<i64>,
    /// Wait times in seconds for the I/O-bound workload
    #[serde(default = "default_io_args")]
    pub io_args: Vec<f64>,
}

impl Default for WorkloadsSection {
    fn default() -> Self {
        Self {
            cpu_args: default_cpu_args(),
            io_args: default_io_args(),
        }
    }
}

fn default_cpu_args() -> Vec<i64> {
    vec![100_000, 200_000, 300_000, 400_000]
}
fn default_io_args() -> Vec<f64> {
    vec![0.5; 4]
}

/// Contention demo configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentionSection {
    /// Run the demo as part of `gilbench run`
    #[serde(default = "default_contention_enabled")]
    pub enabled: bool,
    /// Threads in the multi-threaded phase
    #[serde(default = "default_contention_threads")]
    pub threads: usize,
    /// Total increments per phase
    #[serde(default = "default_contention_iterations")]
    pub iterations: u64,
}

impl Default for ContentionSection {
    fn default() -> Self {
        Self {
            enabled: default_contention_enabled(),
            threads: default_contention_threads(),
            iterations: default_contention_iterations(),
        }
    }
}

fn default_contention_enabled() -> bool {
    true
}
fn default_contention_threads() -> usize {
    4
}
fn default_contention_iterations() -> u64 {
    10_000_000
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl GilbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find the nearest `gilbench.toml` walking up from `start`
    pub fn find_from(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Try to discover and load configuration by walking up from current directory.
    ///
    /// A config file that exists but does not parse is an error, not a silent default.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let cwd = std::env::current_dir()?;
        match Self::find_from(&cwd) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Lock settings for this configuration
    pub fn gil_settings(&self) -> anyhow::Result<GilSettings> {
        let interval = Self::parse_duration(&self.runner.switch_interval)?;
        if self.runner.gil && interval == 0 {
            anyhow::bail!("switch_interval must be greater than zero");
        }
        Ok(GilSettings {
            enabled: self.runner.gil,
            switch_interval_ns: interval,
        })
    }

    /// Per-item worker timeout; `None` when disabled with a zero duration
    pub fn worker_timeout(&self) -> anyhow::Result<Option<Duration>> {
        let nanos = Self::parse_duration(&self.runner.worker_timeout)?;
        Ok((nanos > 0).then(|| Duration::from_nanos(nanos)))
    }

    /// Worker counts to compare, falling back to `min(4, cpus)`
    pub fn worker_counts(&self) -> Vec<usize> {
        if self.runner.workers.is_empty() {
            vec![default_worker_count()]
        } else {
            self.runner.workers.clone()
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# gilbench Configuration

[runner]
# Simulate the interpreter lock (false = native Rust threads)
gil = true
# How long a thread may hold the lock while others wait
switch_interval = "5ms"
# Per-item timeout for worker processes ("0s" disables it)
worker_timeout = "60s"
# Worker counts to compare (empty = min(4, cpus))
workers = []

[workloads]
# Upper bounds for the CPU-bound prime sum
cpu_args = [100000, 200000, 300000, 400000]
# Wait times in seconds for the I/O-bound workload
io_args = [0.5, 0.5, 0.5, 0.5]

[contention]
enabled = true
threads = 4
iterations = 10000000

[output]
# Default output format: human, json
format = "human"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Duration must be non-negative: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}

/// `min(4, available cores)`
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GilbenchConfig::default();
        assert!(config.runner.gil);
        assert_eq!(config.runner.switch_interval, "5ms");
        assert_eq!(config.workloads.cpu_args, vec![100_000, 200_000, 300_000, 400_000]);
        assert_eq!(config.workloads.io_args, vec![0.5; 4]);
        assert_eq!(config.contention.threads, 4);
        assert_eq!(config.output.format, "human");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(GilbenchConfig::parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(GilbenchConfig::parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(GilbenchConfig::parse_duration("100us").unwrap(), 100_000);
        assert_eq!(GilbenchConfig::parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(GilbenchConfig::parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(GilbenchConfig::parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(GilbenchConfig::parse_duration("10").unwrap(), 10_000_000_000);
        assert!(GilbenchConfig::parse_duration("").is_err());
        assert!(GilbenchConfig::parse_duration("-1s").is_err());
        assert!(GilbenchConfig::parse_duration("5 parsecs").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            gil = false
            workers = [1, 2, 8]

            [workloads]
            cpu_args = [10, 20]
        "#;

        let config: GilbenchConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.runner.gil);
        assert_eq!(config.worker_counts(), vec![1, 2, 8]);
        assert_eq!(config.workloads.cpu_args, vec![10, 20]);
        // Defaults should still apply
        assert_eq!(config.workloads.io_args, vec![0.5; 4]);
        assert_eq!(config.output.format, "human");
        assert!(!config.gil_settings().unwrap().enabled);
    }

    #[test]
    fn test_default_toml_matches_default() {
        let config: GilbenchConfig = toml::from_str(&GilbenchConfig::default_toml()).unwrap();
        assert_eq!(config, GilbenchConfig::default());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = GilbenchConfig::default();
        let gil = config.gil_settings().unwrap();
        assert!(gil.enabled);
        assert_eq!(gil.switch_interval_ns, 5_000_000);
        assert_eq!(config.worker_timeout().unwrap(), Some(Duration::from_secs(60)));

        config.runner.worker_timeout = "0s".to_string();
        assert_eq!(config.worker_timeout().unwrap(), None);

        config.runner.switch_interval = "0ms".to_string();
        assert!(config.gil_settings().is_err());

        let counts = config.worker_counts();
        assert_eq!(counts.len(), 1);
        assert!((1..=4).contains(&counts[0]));
    }

    #[test]
    fn test_discovery_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(GilbenchConfig::find_from(&nested), None);

        let config_path = root.path().join(CONFIG_FILE);
        std::fs::write(&config_path, "[runner]\ngil = false\n").unwrap();
        assert_eq!(GilbenchConfig::find_from(&nested), Some(config_path.clone()));

        let config = GilbenchConfig::load(&config_path).unwrap();
        assert!(!config.runner.gil);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[runner]\ngil = \"sometimes\"\n").unwrap();
        assert!(GilbenchConfig::load(&path).is_err());
    }
}
