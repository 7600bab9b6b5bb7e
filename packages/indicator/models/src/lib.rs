#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial-unit feature, indicator value, and dataset types.
//!
//! These types describe the data every stage of the indicator engine
//! exchanges: spatial-unit features carrying one value column per target
//! date, the `NoData` sentinel, named datasets of base indicators and
//! georesources, and the process parameters supplied per run.

pub mod aggregation;
pub mod dataset;
pub mod feature;
pub mod parameter;

use std::fmt;

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use aggregation::{AggregationMode, BBOX_CONTAINMENT_RATIO, MatchStrategy};
pub use dataset::{Dataset, DatasetCatalog};
pub use feature::{FeatureCollection, SpatialUnitFeature};
pub use parameter::{ParameterValue, ProcessParameter};

/// Prefix of every property name carrying a date's indicator value.
pub const DATE_PREFIX: &str = "DATE_";

/// Reserved interchange token for [`IndicatorValue::NoData`].
pub const NO_DATA: &str = "NoData";

/// Property name the aggregation weight is stored under.
pub const AGGREGATION_WEIGHT_PROPERTY: &str = "aggregationWeight";

/// Errors raised when building or mutating model types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two features in one collection share an id.
    #[error("Duplicate feature id '{id}' in feature collection")]
    DuplicateFeatureId {
        /// The repeated id.
        id: FeatureId,
    },

    /// An aggregation weight was negative or not finite.
    #[error("Invalid aggregation weight {weight} for feature '{id}'")]
    InvalidAggregationWeight {
        /// Feature the weight was meant for.
        id: FeatureId,
        /// The rejected weight.
        weight: f64,
    },

    /// A dataset id or name is already registered in a catalog.
    #[error("Dataset reference '{reference}' is already registered")]
    DuplicateDataset {
        /// The clashing id or name.
        reference: String,
    },
}

/// Canonical spatial-unit feature identifier.
///
/// Source data carries ids as JSON strings or numbers. They are coerced
/// once at ingestion with [`FeatureId::coerce`] and compared as plain
/// strings everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    /// Creates an id from an already canonical string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Coerces a raw JSON id into its canonical form.
    ///
    /// Strings are trimmed, integers use their decimal representation and
    /// floats with an integral value are treated as integers (`12.0` becomes
    /// `"12"`). Empty strings, fractional numbers and every other JSON type
    /// are rejected.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn coerce(raw: &serde_json::Value) -> Option<Self> {
        match raw {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
            }
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(Self(i.to_string()));
                }
                if let Some(u) = n.as_u64() {
                    return Some(Self(u.to_string()));
                }
                let f = n.as_f64()?;
                if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                    Some(Self((f as i64).to_string()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Property name carrying the indicator value of one date
/// (`DATE_2018-01-01`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    /// Builds the key for `date`.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        Self(format!("{DATE_PREFIX}{}", date.format("%Y-%m-%d")))
    }

    /// Recognizes a property name as a date key.
    ///
    /// Returns `None` for any property that is not the prefix followed by
    /// a valid, zero-padded `YYYY-MM-DD` date. `DATE_2018-1-1` is not a
    /// date key.
    #[must_use]
    pub fn parse(property: &str) -> Option<Self> {
        let date = property.strip_prefix(DATE_PREFIX)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .map(Self::for_date)
            .filter(|key| key.0 == property)
    }

    /// Returns the date this key addresses.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.0[DATE_PREFIX.len()..], "%Y-%m-%d").ok()
    }

    /// Returns the property name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An indicator value for one feature and date.
///
/// `NoData` means "not computable" and is kept apart from a computed
/// zero. Non-finite numbers never survive construction: they are stored
/// as `NoData`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    /// A finite computed value.
    Value(f64),
    /// The value could not be computed for this feature and date.
    NoData,
}

impl IndicatorValue {
    /// Returns the numeric value, or `None` for `NoData`.
    #[must_use]
    pub const fn as_f64(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NoData => None,
        }
    }

    /// Whether this is the `NoData` sentinel.
    #[must_use]
    pub const fn is_no_data(self) -> bool {
        matches!(self, Self::NoData)
    }
}

impl From<f64> for IndicatorValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::NoData
        }
    }
}

impl fmt::Display for IndicatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::NoData => f.write_str(NO_DATA),
        }
    }
}

impl Serialize for IndicatorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) if v.is_finite() => serializer.serialize_f64(*v),
            _ => serializer.serialize_str(NO_DATA),
        }
    }
}

impl<'de> Deserialize<'de> for IndicatorValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Self::from(v)),
            Raw::Text(text) if text == NO_DATA => Ok(Self::NoData),
            // Numeric strings are common in exported survey data.
            Raw::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Self::Value)
                .ok_or_else(|| {
                    D::Error::custom(format!(
                        "expected a number or \"{NO_DATA}\", found \"{text}\""
                    ))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_string_and_numeric_ids() {
        assert_eq!(
            FeatureId::coerce(&serde_json::json!(" 0815 ")),
            Some(FeatureId::new("0815"))
        );
        assert_eq!(
            FeatureId::coerce(&serde_json::json!(42)),
            Some(FeatureId::new("42"))
        );
        assert_eq!(
            FeatureId::coerce(&serde_json::json!(12.0)),
            Some(FeatureId::new("12"))
        );
    }

    #[test]
    fn rejects_unusable_ids() {
        assert_eq!(FeatureId::coerce(&serde_json::json!(1.5)), None);
        assert_eq!(FeatureId::coerce(&serde_json::json!("   ")), None);
        assert_eq!(FeatureId::coerce(&serde_json::json!(null)), None);
        assert_eq!(FeatureId::coerce(&serde_json::json!(true)), None);
    }

    #[test]
    fn date_key_format() {
        let date = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let key = DateKey::for_date(date);
        assert_eq!(key.as_str(), "DATE_2018-01-01");
        assert_eq!(key.date(), Some(date));
        assert_eq!(DateKey::parse("DATE_2018-01-01"), Some(key));
    }

    #[test]
    fn date_key_rejects_other_properties() {
        assert_eq!(DateKey::parse("NAME"), None);
        assert_eq!(DateKey::parse("DATE_2018-13-01"), None);
        assert_eq!(DateKey::parse("date_2018-01-01"), None);
        assert_eq!(DateKey::parse("DATE_2018-1-1"), None);
        assert_eq!(DateKey::parse("DATE_2018-01-01T00:00"), None);
    }

    #[test]
    fn no_data_is_distinct_from_zero_and_null() {
        let zero: IndicatorValue = serde_json::from_value(serde_json::json!(0)).unwrap();
        assert_eq!(zero, IndicatorValue::Value(0.0));

        let no_data: IndicatorValue = serde_json::from_value(serde_json::json!("NoData")).unwrap();
        assert!(no_data.is_no_data());

        assert!(serde_json::from_value::<IndicatorValue>(serde_json::json!(null)).is_err());
        assert_eq!(
            serde_json::to_value(IndicatorValue::NoData).unwrap(),
            serde_json::json!("NoData")
        );
        assert_eq!(
            serde_json::to_value(IndicatorValue::Value(0.0)).unwrap(),
            serde_json::json!(0.0)
        );
    }

    #[test]
    fn non_finite_values_become_no_data() {
        assert!(IndicatorValue::from(f64::NAN).is_no_data());
        assert!(IndicatorValue::from(f64::INFINITY).is_no_data());
        assert_eq!(IndicatorValue::from(2.5).as_f64(), Some(2.5));
    }

    #[test]
    fn numeric_strings_are_values() {
        let value: IndicatorValue = serde_json::from_value(serde_json::json!("12.5")).unwrap();
        assert_eq!(value, IndicatorValue::Value(12.5));
        assert!(serde_json::from_value::<IndicatorValue>(serde_json::json!("n/a")).is_err());
    }
}
