//! System Metadata Collection
//!
//! Collects system information for report metadata: OS, architecture, CPU
//! model and core count, plus the lock settings the run used.
//!
//! Linux-specific data (CPU model) gracefully degrades on other platforms,
//! returning "Unknown".

use chrono::Utc;
use gilbench_core::GilSettings;
use gilbench_report::{ReportMeta, SystemInfo};

/// Build report metadata for a run with the given lock settings
pub fn build_report_meta(gil: GilSettings) -> ReportMeta {
    ReportMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        gil_simulated: gil.enabled,
        switch_interval_ms: gil.switch_interval_ns as f64 / 1_000_000.0,
        system: system_info(),
    }
}

/// Describe the machine we are running on
pub fn system_info() -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu: get_cpu_model().unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: num_cpus(),
    }
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn get_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
