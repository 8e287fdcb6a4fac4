//! Outcome reporting
//!
//! Console lines for people, one JSON document for machines.

use colored::Colorize;
use serde::Serialize;

use super::verdict::{CaseOutcome, CaseVerdict, RunSummary};
use crate::common::Result;

/// Print the heading for a scenario run
pub fn print_header(name: &str, cases: usize) {
    println!(
        "\n{} {} {}",
        "Running Scenario:".blue().bold(),
        name.white().bold(),
        format!("({} cases)", cases).dimmed()
    );
}

/// Print one case as soon as its verdict is known
pub fn print_case(outcome: &CaseOutcome) {
    let label = format!("Case {} [{}]", outcome.index, outcome.action);
    match &outcome.verdict {
        CaseVerdict::Pass => println!(
            "  {} {} {}",
            "✓".green(),
            label,
            attempts_note(outcome.attempts).dimmed()
        ),
        CaseVerdict::Fail(failure) => println!("  {} {}: {}", "✗".red(), label, failure),
        CaseVerdict::Fatal(fatal) => println!("  {} {}: {}", "!".yellow().bold(), label, fatal),
    }
}

fn attempts_note(attempts: u32) -> String {
    if attempts == 1 {
        "(1 attempt)".to_string()
    } else {
        format!("({} attempts)", attempts)
    }
}

/// Print the closing summary line
pub fn print_summary(summary: &RunSummary) {
    let counts = format!(
        "{} passed, {} failed, {} could not run",
        summary.passed, summary.failed, summary.fatal
    );

    if summary.is_success() {
        println!(
            "\n{} {} {}\n",
            "✓".green().bold(),
            "Scenario Passed".green().bold(),
            counts.dimmed()
        );
    } else {
        println!(
            "\n{} {} {}\n",
            "✗".red().bold(),
            "Scenario Failed".red().bold(),
            counts
        );
    }
}

/// One case in the JSON report
#[derive(Debug, Serialize, PartialEq)]
pub struct CaseRecord {
    pub index: usize,
    pub action: String,
    pub verdict: &'static str,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&CaseOutcome> for CaseRecord {
    fn from(outcome: &CaseOutcome) -> Self {
        Self {
            index: outcome.index,
            action: outcome.action.clone(),
            verdict: outcome.verdict.label(),
            attempts: outcome.attempts,
            reason: outcome.verdict.reason(),
        }
    }
}

/// A whole run in the JSON report
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub passed: usize,
    pub failed: usize,
    pub fatal: usize,
    /// False when the run was cut short and later cases never ran
    pub complete: bool,
    pub cases: Vec<CaseRecord>,
}

impl RunReport {
    pub fn new(scenario: &str, outcomes: &[CaseOutcome]) -> Self {
        let summary = RunSummary::from_outcomes(outcomes);
        Self {
            scenario: scenario.to_string(),
            passed: summary.passed,
            failed: summary.failed,
            fatal: summary.fatal,
            complete: true,
            cases: outcomes.iter().map(CaseRecord::from).collect(),
        }
    }

    /// Report of a run stopped by its deadline
    pub fn partial(scenario: &str, outcomes: &[CaseOutcome]) -> Self {
        Self {
            complete: false,
            ..Self::new(scenario, outcomes)
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::status::Code;
    use crate::testing::verdict::{CaseFailure, CaseFatal};

    fn outcomes() -> Vec<CaseOutcome> {
        vec![
            CaseOutcome {
                index: 0,
                action: "Hello".to_string(),
                verdict: CaseVerdict::Pass,
                attempts: 1,
            },
            CaseOutcome {
                index: 1,
                action: "Bye".to_string(),
                verdict: CaseVerdict::Fail(CaseFailure::ErrorCodeMismatch {
                    expected: Code::InvalidArgument,
                    actual: Code::Ok,
                }),
                attempts: 1,
            },
            CaseOutcome {
                index: 2,
                action: "Nope".to_string(),
                verdict: CaseVerdict::Fatal(CaseFatal::UnknownAction("Nope".to_string())),
                attempts: 0,
            },
        ]
    }

    #[test]
    fn test_report_counts_and_records() {
        let report = RunReport::new("sample", &outcomes());
        assert_eq!((report.passed, report.failed, report.fatal), (1, 1, 1));
        assert_eq!(report.cases[0].reason, None);
        assert_eq!(report.cases[1].verdict, "fail");
        assert_eq!(
            report.cases[2].reason.as_deref(),
            Some("unknown action 'Nope'")
        );
    }

    #[test]
    fn test_report_json_shape() {
        let json = RunReport::new("sample", &outcomes()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["scenario"], "sample");
        assert_eq!(value["complete"], true);
        assert_eq!(value["cases"][0]["verdict"], "pass");
        assert!(value["cases"][0].get("reason").is_none());
        assert_eq!(value["cases"][2]["attempts"], 0);
        assert_eq!(
            value["cases"][1]["reason"],
            "expected error code 3 (invalid_argument), got 0 (ok)"
        );
    }

    #[test]
    fn test_partial_report_is_marked_incomplete() {
        let outcomes = outcomes();
        let report = RunReport::partial("sample", &outcomes[..1]);
        assert!(!report.complete);
        assert_eq!(report.passed, 1);
        assert_eq!(report.cases.len(), 1);

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["complete"], false);
    }

    #[test]
    fn test_attempts_note() {
        assert_eq!(attempts_note(1), "(1 attempt)");
        assert_eq!(attempts_note(3), "(3 attempts)");
    }
}
