//! Spatial-unit features and the collections they travel in.

use std::collections::BTreeMap;

use geo::Geometry;

use crate::{DateKey, FeatureId, IndicatorValue, ModelError};

/// One feature of a spatial-unit partition (a block, a district) or of a
/// georesource dataset.
///
/// Values are keyed by [`DateKey`]; every other source property is kept
/// verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialUnitFeature {
    id: FeatureId,
    /// Human-readable name, if the source carries one.
    pub name: Option<String>,
    /// Feature geometry. Features without geometry never match spatially.
    pub geometry: Option<Geometry<f64>>,
    /// Indicator values per date.
    pub values: BTreeMap<DateKey, IndicatorValue>,
    /// Non-date source properties (floor area, commissioning year, ...).
    pub attributes: serde_json::Map<String, serde_json::Value>,
    aggregation_weight: f64,
}

impl SpatialUnitFeature {
    /// Creates a feature with no values and an aggregation weight of 1.
    #[must_use]
    pub fn new(id: impl Into<FeatureId>, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            id: id.into(),
            name: None,
            geometry,
            values: BTreeMap::new(),
            attributes: serde_json::Map::new(),
            aggregation_weight: 1.0,
        }
    }

    /// Builder-style variant of [`Self::set_value`].
    #[must_use]
    pub fn with_value(mut self, key: DateKey, value: impl Into<IndicatorValue>) -> Self {
        self.set_value(key, value);
        self
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: serde_json::Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Builder-style variant of [`Self::set_aggregation_weight`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidAggregationWeight`] if `weight` is
    /// negative or not finite.
    pub fn with_aggregation_weight(mut self, weight: f64) -> Result<Self, ModelError> {
        self.set_aggregation_weight(weight)?;
        Ok(self)
    }

    /// The feature id.
    #[must_use]
    pub const fn id(&self) -> &FeatureId {
        &self.id
    }

    /// The value stored under `key`, if the property exists.
    #[must_use]
    pub fn value(&self, key: &DateKey) -> Option<IndicatorValue> {
        self.values.get(key).copied()
    }

    /// Stores a value under `key`, replacing any previous one.
    pub fn set_value(&mut self, key: DateKey, value: impl Into<IndicatorValue>) {
        self.values.insert(key, value.into());
    }

    /// The weight this feature contributes with in `AVERAGE` aggregation.
    #[must_use]
    pub const fn aggregation_weight(&self) -> f64 {
        self.aggregation_weight
    }

    /// Sets the aggregation weight.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidAggregationWeight`] if `weight` is
    /// negative or not finite.
    pub fn set_aggregation_weight(&mut self, weight: f64) -> Result<(), ModelError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ModelError::InvalidAggregationWeight {
                id: self.id.clone(),
                weight,
            });
        }
        self.aggregation_weight = weight;
        Ok(())
    }

    /// Reads a numeric attribute.
    ///
    /// Accepts JSON numbers and numeric strings; returns `None` for
    /// anything else, including non-finite values.
    #[must_use]
    pub fn attribute_f64(&self, name: &str) -> Option<f64> {
        match self.attributes.get(name)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }
}

/// A set of features sharing one spatial-unit level and reference time.
///
/// Ids are unique within a collection; the order is kept as given and
/// decides which target claims an indicator feature first during
/// aggregation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    level: Option<String>,
    features: Vec<SpatialUnitFeature>,
    index: BTreeMap<FeatureId, usize>,
}

impl FeatureCollection {
    /// Builds a collection, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateFeatureId`] on the first repeated id.
    pub fn new(features: Vec<SpatialUnitFeature>) -> Result<Self, ModelError> {
        let mut index = BTreeMap::new();
        for (i, feature) in features.iter().enumerate() {
            if index.insert(feature.id.clone(), i).is_some() {
                return Err(ModelError::DuplicateFeatureId {
                    id: feature.id.clone(),
                });
            }
        }
        Ok(Self {
            level: None,
            features,
            index,
        })
    }

    /// Attaches the spatial-unit level name (e.g. `"districts"`).
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// The spatial-unit level name, if known.
    #[must_use]
    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    /// Features in their given order.
    #[must_use]
    pub fn features(&self) -> &[SpatialUnitFeature] {
        &self.features
    }

    /// Mutable access to the features. Ids cannot change through it.
    pub fn features_mut(&mut self) -> impl Iterator<Item = &mut SpatialUnitFeature> {
        self.features.iter_mut()
    }

    /// Looks a feature up by id.
    #[must_use]
    pub fn get(&self, id: &FeatureId) -> Option<&SpatialUnitFeature> {
        self.index.get(id).map(|&i| &self.features[i])
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection has no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The id set, in feature order.
    #[must_use]
    pub fn ids(&self) -> Vec<&FeatureId> {
        self.features.iter().map(SpatialUnitFeature::id).collect()
    }

    /// Copies every value column of `other` onto the features with the
    /// same id. Returns how many features received values.
    pub fn merge_values(&mut self, other: &Self) -> usize {
        let mut merged = 0;
        for feature in &mut self.features {
            if let Some(source) = other.get(&feature.id) {
                feature
                    .values
                    .extend(source.values.iter().map(|(k, v)| (k.clone(), *v)));
                merged += 1;
            }
        }
        merged
    }

    /// Consumes the collection, returning its features.
    #[must_use]
    pub fn into_features(self) -> Vec<SpatialUnitFeature> {
        self.features
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn key(year: i32) -> DateKey {
        DateKey::for_date(NaiveDate::from_ymd_opt(year, 1, 1).unwrap())
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = FeatureCollection::new(vec![
            SpatialUnitFeature::new("a", None),
            SpatialUnitFeature::new("b", None),
            SpatialUnitFeature::new("a", None),
        ]);
        assert!(matches!(
            result,
            Err(ModelError::DuplicateFeatureId { id }) if id.as_str() == "a"
        ));
    }

    #[test]
    fn rejects_negative_weights() {
        let mut feature = SpatialUnitFeature::new("a", None);
        assert!(feature.set_aggregation_weight(-1.0).is_err());
        assert!(feature.set_aggregation_weight(f64::NAN).is_err());
        assert!((feature.aggregation_weight() - 1.0).abs() < f64::EPSILON);
        feature.set_aggregation_weight(0.0).unwrap();
        assert!(feature.aggregation_weight().abs() < f64::EPSILON);
    }

    #[test]
    fn lookup_by_id() {
        let collection = FeatureCollection::new(vec![
            SpatialUnitFeature::new("a", None).with_value(key(2018), 1.0),
            SpatialUnitFeature::new("b", None).with_value(key(2018), 2.0),
        ])
        .unwrap();
        let b = collection.get(&FeatureId::new("b")).unwrap();
        assert_eq!(b.value(&key(2018)), Some(IndicatorValue::Value(2.0)));
        assert!(collection.get(&FeatureId::new("c")).is_none());
    }

    #[test]
    fn merges_value_columns_by_id() {
        let mut left = FeatureCollection::new(vec![
            SpatialUnitFeature::new("a", None).with_value(key(2018), 1.0),
            SpatialUnitFeature::new("b", None),
        ])
        .unwrap();
        let right = FeatureCollection::new(vec![
            SpatialUnitFeature::new("a", None).with_value(key(2019), 3.0),
            SpatialUnitFeature::new("z", None).with_value(key(2019), 9.0),
        ])
        .unwrap();

        assert_eq!(left.merge_values(&right), 1);
        let a = left.get(&FeatureId::new("a")).unwrap();
        assert_eq!(a.values.len(), 2);
        assert!(left.get(&FeatureId::new("b")).unwrap().values.is_empty());
    }

    #[test]
    fn numeric_attributes() {
        let feature = SpatialUnitFeature::new("a", None)
            .with_attribute("floor_area", serde_json::json!(120.5))
            .with_attribute("levels", serde_json::json!("3"))
            .with_attribute("usage", serde_json::json!("residential"));
        assert_eq!(feature.attribute_f64("floor_area"), Some(120.5));
        assert_eq!(feature.attribute_f64("levels"), Some(3.0));
        assert_eq!(feature.attribute_f64("usage"), None);
        assert_eq!(feature.attribute_f64("missing"), None);
    }
}
