//! Response comparison strategies
//!
//! Every action is judged by exactly one `Comparison`, chosen when the
//! registry is built. `Structural` is deep equality; the others replace it
//! entirely, including when they report a mismatch.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Outcome of comparing an expected response with an actual one
pub type MatchResult = std::result::Result<(), String>;

/// Pluggable equality check for one action's response shape
pub trait Comparator: Send + Sync {
    fn compare(&self, expected: &Value, actual: &Value) -> MatchResult;
}

impl<F> Comparator for F
where
    F: Fn(&Value, &Value) -> MatchResult + Send + Sync,
{
    fn compare(&self, expected: &Value, actual: &Value) -> MatchResult {
        self(expected, actual)
    }
}

/// Comparison strategy for an action
#[derive(Clone, Default)]
pub enum Comparison {
    /// Deep structural equality
    #[default]
    Structural,
    /// Structural equality restricted to the listed dotted field paths
    Fields(Vec<String>),
    /// Caller-supplied comparator
    Custom(Arc<dyn Comparator>),
}

impl Comparison {
    pub fn custom(comparator: impl Comparator + 'static) -> Self {
        Comparison::Custom(Arc::new(comparator))
    }

    /// Comparator over typed response shapes
    ///
    /// A side that does not decode into `T` counts as a mismatch.
    pub fn typed<T, F>(compare: F) -> Self
    where
        T: DeserializeOwned,
        F: Fn(&T, &T) -> MatchResult + Send + Sync + 'static,
    {
        Self::custom(move |expected: &Value, actual: &Value| -> MatchResult {
            let expected: T = serde_json::from_value(expected.clone())
                .map_err(|e| format!("expected response does not fit the shape: {}", e))?;
            let actual: T = serde_json::from_value(actual.clone())
                .map_err(|e| format!("actual response does not fit the shape: {}", e))?;
            compare(&expected, &actual)
        })
    }

    pub fn compare(&self, expected: &Value, actual: &Value) -> MatchResult {
        match self {
            Comparison::Structural => structural_eq(expected, actual),
            Comparison::Fields(paths) => fields_eq(paths, expected, actual),
            Comparison::Custom(comparator) => comparator.compare(expected, actual),
        }
    }
}

impl fmt::Debug for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Structural => write!(f, "Structural"),
            Comparison::Fields(paths) => f.debug_tuple("Fields").field(paths).finish(),
            Comparison::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Deep equality, reporting the first differing path
pub fn structural_eq(expected: &Value, actual: &Value) -> MatchResult {
    let mut path = String::from("$");
    match first_difference(&mut path, expected, actual) {
        Some(detail) => Err(detail),
        None => Ok(()),
    }
}

fn fields_eq(paths: &[String], expected: &Value, actual: &Value) -> MatchResult {
    for field in paths {
        let expected_field = lookup(expected, field).unwrap_or(&Value::Null);
        let actual_field = lookup(actual, field).unwrap_or(&Value::Null);

        let mut path = format!("$.{}", field);
        if let Some(detail) = first_difference(&mut path, expected_field, actual_field) {
            return Err(detail);
        }
    }
    Ok(())
}

fn lookup<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(value, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn first_difference(path: &mut String, expected: &Value, actual: &Value) -> Option<String> {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for (key, e_value) in e {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                let diff = match a.get(key) {
                    Some(a_value) => first_difference(path, e_value, a_value),
                    None => Some(format!("{}: expected {}, field is missing", path, e_value)),
                };
                path.truncate(len);
                if diff.is_some() {
                    return diff;
                }
            }
            a.iter()
                .find(|(key, _)| !e.contains_key(*key))
                .map(|(key, value)| format!("{}.{}: unexpected field with value {}", path, key, value))
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                return Some(format!(
                    "{}: expected {} elements, got {}",
                    path,
                    e.len(),
                    a.len()
                ));
            }
            for (i, (e_item, a_item)) in e.iter().zip(a).enumerate() {
                let len = path.len();
                path.push_str(&format!("[{}]", i));
                let diff = first_difference(path, e_item, a_item);
                path.truncate(len);
                if diff.is_some() {
                    return diff;
                }
            }
            None
        }
        (Value::Number(e), Value::Number(a)) => {
            let same = match (e.as_i64(), a.as_i64(), e.as_u64(), a.as_u64()) {
                (Some(x), Some(y), _, _) => x == y,
                (_, _, Some(x), Some(y)) => x == y,
                _ => e.as_f64() == a.as_f64(),
            };
            if same {
                None
            } else {
                Some(format!("{}: expected {}, got {}", path, e, a))
            }
        }
        _ if expected == actual => None,
        _ => Some(format!("{}: expected {}, got {}", path, expected, actual)),
    }
}
