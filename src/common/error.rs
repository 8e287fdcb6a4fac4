//! Error types for the scenario runner
//!
//! These are run-level errors: anything that stops a whole scenario run or
//! a CLI command. Problems confined to a single test case are reported as
//! verdicts (see `testing::verdict`) and never surface here.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scenario runner
#[derive(Error, Debug)]
pub enum Error {
    // === Scenario Errors ===
    #[error("Malformed scenario: {0}")]
    MalformedScenario(String),

    #[error("Failed to read scenario '{path}': {error}")]
    ScenarioRead { path: String, error: String },

    // === Service Errors ===
    #[error("Invalid service descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid proto schema: {0}")]
    ProtoSchema(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Scenario run exceeded its deadline of {0} seconds")]
    Timeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a malformed scenario error pointing at one case of the document
    pub fn malformed_case(index: usize, reason: impl std::fmt::Display) -> Self {
        Self::MalformedScenario(format!("case #{}: {}", index, reason))
    }

    /// Create a scenario read error
    pub fn scenario_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::ScenarioRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_case_names_index() {
        let err = Error::malformed_case(3, "action is required");
        assert_eq!(
            err.to_string(),
            "Malformed scenario: case #3: action is required"
        );
    }

    #[test]
    fn test_json_errors_convert() {
        fn parse(text: &str) -> Result<serde_json::Value> {
            Ok(serde_json::from_str(text)?)
        }
        assert!(matches!(parse("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_scenario_read_includes_path() {
        let err = Error::scenario_read(std::path::Path::new("scenario/sample.json"), "not found");
        assert!(err.to_string().contains("scenario/sample.json"));
        assert!(err.to_string().contains("not found"));
    }
}
