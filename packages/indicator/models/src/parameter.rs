//! Process parameters supplied per computation run.

use serde::{Deserialize, Serialize};

/// A named parameter, e.g. `{"name": "distance", "value": 500}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessParameter {
    /// Parameter name.
    pub name: String,
    /// Parameter value.
    pub value: ParameterValue,
}

impl ProcessParameter {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A parameter value as it arrives from the caller.
///
/// Callers frequently send numbers as strings, so [`Self::as_f64`]
/// accepts both representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// `true` / `false`.
    Boolean(bool),
    /// Any JSON number.
    Number(f64),
    /// Free text.
    Text(String),
}

impl ParameterValue {
    /// Numeric view of the value.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
        }
        .filter(|v: &f64| v.is_finite())
    }

    /// Textual view of the value. Numbers and booleans are rendered.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
