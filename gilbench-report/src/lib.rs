#![warn(missing_docs)]
//! gilbench Report - Run Data Model
//!
//! Output formats:
//! - JSON (machine-readable, the full [`SuiteReport`])
//! - Human (terminal text, rendered by the CLI)

mod json;
#[allow(missing_docs)]
mod report;

pub use json::{generate_json_report, parse_json_report};
pub use report::{ComparisonReport, ContentionReport, ReportMeta, SuiteReport, SystemInfo};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// Pretty-printed JSON of the full report
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
