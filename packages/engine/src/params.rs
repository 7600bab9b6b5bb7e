//! Lookup of named process parameters.
//!
//! Strategies resolve every parameter they need through
//! [`ProcessParameters`] before touching any feature, so a missing or
//! malformed parameter aborts the run up front.

use spatial_indicators_indicator_models::{ParameterValue, ProcessParameter};

use crate::EngineError;

/// Read-only view over the parameters of one run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessParameters<'a> {
    parameters: &'a [ProcessParameter],
}

impl<'a> ProcessParameters<'a> {
    /// Wraps the caller-supplied parameter list.
    #[must_use]
    pub const fn new(parameters: &'a [ProcessParameter]) -> Self {
        Self { parameters }
    }

    /// The value of `name`. The first occurrence wins.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'a ParameterValue> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// A required numeric parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ParameterMissing`] if absent and
    /// [`EngineError::ParameterInvalid`] if not numeric.
    pub fn require_f64(&self, name: &str) -> Result<f64, EngineError> {
        self.optional_f64(name)?
            .ok_or_else(|| EngineError::ParameterMissing {
                name: name.to_string(),
            })
    }

    /// An optional numeric parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ParameterInvalid`] if present but not
    /// numeric.
    pub fn optional_f64(&self, name: &str) -> Result<Option<f64>, EngineError> {
        self.get(name)
            .map(|value| {
                value.as_f64().ok_or_else(|| EngineError::ParameterInvalid {
                    name: name.to_string(),
                    message: format!("expected a number, found '{}'", value.as_text()),
                })
            })
            .transpose()
    }

    /// A required non-negative whole number.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ParameterMissing`] if absent and
    /// [`EngineError::ParameterInvalid`] if not a whole number in
    /// `0..=u32::MAX`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn require_u32(&self, name: &str) -> Result<u32, EngineError> {
        let value = self.require_f64(name)?;
        if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
            return Err(EngineError::ParameterInvalid {
                name: name.to_string(),
                message: format!("expected a non-negative whole number, found {value}"),
            });
        }
        Ok(value as u32)
    }

    /// An optional text parameter. Numbers and booleans are rendered.
    #[must_use]
    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.get(name).map(ParameterValue::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> Vec<ProcessParameter> {
        vec![
            ProcessParameter::new("distance", 500.0),
            ProcessParameter::new("years", "5"),
            ProcessParameter::new("travel_mode", "foot-walking"),
            ProcessParameter::new("fraction", 2.5),
            ProcessParameter::new("distance", 900.0),
        ]
    }

    #[test]
    fn resolves_numbers_and_numeric_text() {
        let raw = parameters();
        let params = ProcessParameters::new(&raw);
        assert!((params.require_f64("distance").unwrap() - 500.0).abs() < f64::EPSILON);
        assert_eq!(params.require_u32("years").unwrap(), 5);
        assert_eq!(
            params.optional_text("travel_mode").as_deref(),
            Some("foot-walking")
        );
        assert_eq!(params.optional_f64("absent").unwrap(), None);
    }

    #[test]
    fn missing_parameter_is_reported_by_name() {
        let raw = parameters();
        let params = ProcessParameters::new(&raw);
        assert!(matches!(
            params.require_f64("decay_rate"),
            Err(EngineError::ParameterMissing { name }) if name == "decay_rate"
        ));
    }

    #[test]
    fn wrong_type_is_invalid() {
        let raw = parameters();
        let params = ProcessParameters::new(&raw);
        assert!(matches!(
            params.require_f64("travel_mode"),
            Err(EngineError::ParameterInvalid { .. })
        ));
        assert!(matches!(
            params.require_u32("fraction"),
            Err(EngineError::ParameterInvalid { .. })
        ));
    }
}
