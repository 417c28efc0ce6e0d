//! Output Formatting
//!
//! Human-readable output formatting for suite reports.
//!
//! Generates terminal-friendly output with:
//! - System header (core count, lock mode)
//! - Contention demo block
//! - One block per comparison with durations and speedups
//! - Closing conclusions

use gilbench_core::Strategy;
use gilbench_report::{ComparisonReport, ContentionReport, SuiteReport};
use std::fmt::Write as _;

const CONCLUSIONS: [&str; 4] = [
    "For CPU-bound tasks, the interpreter lock limits threading performance",
    "For I/O-bound tasks, threading often performs well despite the lock",
    "Multiprocessing bypasses the lock but has higher overhead",
    "Choose threading for I/O-bound tasks and multiprocessing for CPU-bound tasks",
];

/// Heading used for a workload label
pub fn workload_title(label: &str) -> &str {
    match label {
        "cpu" => "CPU-bound",
        "io" => "I/O-bound",
        other => other,
    }
}

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &SuiteReport) -> String {
    let mut output = String::new();

    let title = "gilbench: interpreter lock analysis";
    let _ = writeln!(output, "{}", title);
    let _ = writeln!(output, "{}", "=".repeat(title.len()));
    let _ = writeln!(
        output,
        "System has {} CPU cores",
        report.meta.system.cpu_cores
    );
    if report.meta.gil_simulated {
        let _ = writeln!(
            output,
            "Interpreter lock: simulated (switch interval {:.2}ms)",
            report.meta.switch_interval_ms
        );
    } else {
        output.push_str("Interpreter lock: disabled (native threads)\n");
    }

    if let Some(contention) = &report.contention {
        output.push_str(&format_contention(contention));
    }

    for comparison in &report.comparisons {
        output.push_str(&format_comparison(comparison));
    }

    if !report.comparisons.is_empty() {
        output.push_str("\nConclusions:\n");
        for (i, line) in CONCLUSIONS.iter().enumerate() {
            let _ = writeln!(output, "{}. {}", i + 1, line);
        }
    }

    output
}

/// One contention block
pub fn format_contention(report: &ContentionReport) -> String {
    let mut output = String::new();
    output.push_str("\nLock Contention Demonstration:\n");
    let _ = writeln!(
        output,
        "- Single thread time: {:.2}s",
        report.single_thread_secs
    );
    let _ = writeln!(
        output,
        "- Multi-thread time ({} threads): {:.2}s",
        report.threads, report.multi_thread_secs
    );
    let _ = writeln!(output, "- Speedup: {:.2}x", report.speedup);
    let _ = writeln!(
        output,
        "- Note: Ideal speedup would be {:.2}x",
        report.ideal_speedup
    );
    let verdict = if report.no_lost_updates() {
        "no lost updates"
    } else {
        "LOST UPDATES"
    };
    let _ = writeln!(output, "- Final count: {} ({})", report.final_count, verdict);
    output.push_str("- This demonstrates lock contention in CPU-bound tasks.\n");
    output
}

/// One comparison block
pub fn format_comparison(report: &ComparisonReport) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "\n{} task ({} workers):",
        workload_title(&report.workload),
        report.worker_count
    );

    for strategy in Strategy::ALL {
        let Some(result) = report.result(strategy) else {
            continue;
        };
        let _ = write!(
            output,
            "- {}: {:.2}s",
            strategy.label(),
            result.duration_secs()
        );
        if strategy != Strategy::Sequential {
            let speedup = report.speedup(strategy).unwrap_or(1.0);
            let _ = write!(output, " ({:.2}x speedup)", speedup);
        }
        output.push('\n');
    }
    output
}
