//! Scenario testing
//!
//! Loads data-driven scenario documents (JSON or YAML arrays of test cases)
//! and runs them against a method registry. Every case ends in a verdict:
//! pass, fail, or fatal when the case could not be run at all.

pub mod compare;
pub mod config;
pub mod loader;
pub mod report;
pub mod runner;
pub mod verdict;

pub use compare::{Comparator, Comparison, MatchResult};
pub use config::{ScenarioDocument, SuccessRule, TestCase};
pub use loader::{load, load_path, load_with_format, ScenarioFormat};
pub use runner::{run, run_case, Runner};
pub use verdict::{CaseFailure, CaseFatal, CaseOutcome, CaseVerdict, RunSummary};
