//! Scenario loading
//!
//! Turns a JSON or YAML document (an array of case objects) into a
//! `ScenarioDocument`. Only document-level problems are reported here;
//! whether an action exists, or whether a case carries everything its path
//! needs, is decided by the runner so that one bad case cannot sink the
//! rest of the document.

use serde_json::Value;
use std::path::Path;

use crate::common::{Error, Result};

use super::config::{ScenarioDocument, TestCase};

/// Name given to documents loaded from raw bytes
const DEFAULT_NAME: &str = "scenario";

/// Encoding of a scenario document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Json,
    Yaml,
}

impl ScenarioFormat {
    /// Pick the format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ScenarioFormat::Yaml
            }
            _ => ScenarioFormat::Json,
        }
    }
}

/// Load a JSON scenario document
pub fn load(source: &[u8]) -> Result<ScenarioDocument> {
    load_with_format(source, ScenarioFormat::Json)
}

/// Load a scenario document in the given format
pub fn load_with_format(source: &[u8], format: ScenarioFormat) -> Result<ScenarioDocument> {
    let root: Value = match format {
        ScenarioFormat::Json => serde_json::from_slice(source)
            .map_err(|e| Error::MalformedScenario(format!("invalid JSON: {}", e)))?,
        ScenarioFormat::Yaml => serde_yaml::from_slice(source)
            .map_err(|e| Error::MalformedScenario(format!("invalid YAML: {}", e)))?,
    };

    let entries = match root {
        Value::Array(entries) => entries,
        other => {
            return Err(Error::MalformedScenario(format!(
                "expected an array of test cases, got {}",
                kind_of(&other)
            )))
        }
    };

    let cases = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| decode_case(index, entry))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(cases = cases.len(), "Loaded scenario");

    Ok(ScenarioDocument::new(DEFAULT_NAME, cases))
}

/// Load a scenario file, choosing the format from its extension
pub fn load_path(path: &Path) -> Result<ScenarioDocument> {
    let source = std::fs::read(path).map_err(|e| Error::scenario_read(path, e))?;
    let mut document = load_with_format(&source, ScenarioFormat::from_path(path))?;

    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        document.name = stem.to_string();
    }

    Ok(document)
}

fn decode_case(index: usize, entry: Value) -> Result<TestCase> {
    let fields = match &entry {
        Value::Object(fields) => fields,
        other => {
            return Err(Error::malformed_case(
                index,
                format!("expected an object, got {}", kind_of(other)),
            ))
        }
    };

    match fields.get("action") {
        None | Some(Value::Null) => {
            return Err(Error::malformed_case(index, "action is required"));
        }
        Some(Value::String(action)) if action.trim().is_empty() => {
            return Err(Error::malformed_case(index, "action must not be empty"));
        }
        _ => {}
    }

    serde_json::from_value(entry).map_err(|e| Error::malformed_case(index, e))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
