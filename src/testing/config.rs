//! Scenario document types
//!
//! Defines the data structures a scenario file deserializes into. Field
//! names match the document format exactly; unknown fields are ignored.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// An ordered sequence of test cases, immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct ScenarioDocument {
    /// Display name, usually the scenario file stem
    pub name: String,
    /// Test cases in document order
    pub cases: Vec<TestCase>,
}

impl ScenarioDocument {
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.cases.iter()
    }
}

/// One entry of a scenario document
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TestCase {
    /// Name of the RPC method to invoke
    pub action: String,
    /// Request payload, decoded into the method's request shape
    #[serde(default)]
    pub request: Option<Value>,
    /// Expected response payload (value comparison path)
    #[serde(default)]
    pub expected_response: Option<Value>,
    /// Assert on a status code instead of a response value
    #[serde(default)]
    pub error_expectation: bool,
    /// Status code the call is expected to fail with
    #[serde(default, deserialize_with = "optional_whole")]
    pub expected_error_code: Option<i64>,
    /// Number of invocation attempts
    #[serde(rename = "loop", default = "default_loop", deserialize_with = "whole")]
    pub loop_count: u32,
    /// Delay in seconds before each attempt
    #[serde(default, deserialize_with = "whole")]
    pub sleep: u64,
    /// How per-attempt outcomes combine into a verdict
    #[serde(default)]
    pub success_rule: SuccessRule,
}

fn default_loop() -> u32 {
    1
}

/// An integer field that may be written as a float with no fractional part
///
/// JSON producers often emit `3.0` for 3.
struct WholeNumber(i64);

impl<'de> Deserialize<'de> for WholeNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        let expected = &"a whole number";
        match (number.as_i64(), number.as_f64()) {
            (Some(n), _) => Ok(WholeNumber(n)),
            (None, Some(f)) if f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&f) => {
                Ok(WholeNumber(f as i64))
            }
            (None, Some(f)) => Err(de::Error::invalid_value(de::Unexpected::Float(f), expected)),
            (None, None) => Err(de::Error::invalid_value(de::Unexpected::Other("number"), expected)),
        }
    }
}

fn whole<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let WholeNumber(n) = WholeNumber::deserialize(deserializer)?;
    T::try_from(n)
        .map_err(|_| de::Error::invalid_value(de::Unexpected::Signed(n), &"a non-negative count"))
}

fn optional_whole<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<WholeNumber>::deserialize(deserializer)?.map(|WholeNumber(n)| n))
}

impl TestCase {
    /// A value-comparison case with default policy
    pub fn expect_response(action: impl Into<String>, request: Value, expected: Value) -> Self {
        Self {
            action: action.into(),
            request: Some(request),
            expected_response: Some(expected),
            error_expectation: false,
            expected_error_code: None,
            loop_count: default_loop(),
            sleep: 0,
            success_rule: SuccessRule::All,
        }
    }

    /// An error-code case
    pub fn expect_error(action: impl Into<String>, request: Value, code: i64) -> Self {
        Self {
            error_expectation: true,
            expected_response: None,
            expected_error_code: Some(code),
            ..Self::expect_response(action, request, Value::Null)
        }
    }

    pub fn with_loop(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_sleep(mut self, sleep: u64) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn with_rule(mut self, rule: SuccessRule) -> Self {
        self.success_rule = rule;
        self
    }
}

/// Policy combining several attempts into one verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuccessRule {
    /// Every attempt must match; the first mismatch fails the case
    #[default]
    All,
    /// Retry until one attempt matches or attempts run out
    Once,
}

impl fmt::Display for SuccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessRule::All => write!(f, "all"),
            SuccessRule::Once => write!(f, "once"),
        }
    }
}

impl<'de> Deserialize<'de> for SuccessRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        match token.to_ascii_lowercase().as_str() {
            "all" => Ok(SuccessRule::All),
            "once" => Ok(SuccessRule::Once),
            _ => Err(de::Error::unknown_variant(&token, &["all", "once"])),
        }
    }
}
