//! JSON Output

use crate::report::SuiteReport;

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &SuiteReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Parse a report previously written by [`generate_json_report`].
pub fn parse_json_report(json: &str) -> Result<SuiteReport, serde_json::Error> {
    serde_json::from_str(json)
}
