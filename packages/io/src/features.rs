//! Conversion between `GeoJSON` features and [`SpatialUnitFeature`].
//!
//! Property handling on ingestion:
//!
//! * the feature `id` member wins; otherwise the [`ID_PROPERTY`] property
//!   is used, and either is coerced with [`FeatureId::coerce`]
//! * [`NAME_PROPERTY`] becomes the feature name
//! * [`AGGREGATION_WEIGHT_PROPERTY`] becomes the aggregation weight
//! * zero-padded date keys (`DATE_YYYY-MM-DD`) become indicator values;
//!   `null` means the property is absent, `"NoData"` is the sentinel
//! * everything else is kept as an attribute

use geojson::feature::Id;
use spatial_indicators_indicator_models::{
    AGGREGATION_WEIGHT_PROPERTY, DateKey, FeatureId, IndicatorValue, NO_DATA, SpatialUnitFeature,
};

use crate::IoError;

/// Property carrying the feature id when the `id` member is absent.
pub const ID_PROPERTY: &str = "ID";

/// Property carrying the feature name.
pub const NAME_PROPERTY: &str = "NAME";

/// Converts one `GeoJSON` feature.
///
/// # Errors
///
/// Returns [`IoError`] if the feature has no usable id, its geometry
/// cannot be converted, a date property is malformed, or its aggregation
/// weight is invalid.
pub fn from_geojson(
    position: usize,
    feature: geojson::Feature,
) -> Result<SpatialUnitFeature, IoError> {
    let mut properties = feature.properties.unwrap_or_default();

    let id_property = properties.remove(ID_PROPERTY);
    let raw_id = match feature.id {
        Some(Id::String(s)) => Some(serde_json::Value::String(s)),
        Some(Id::Number(n)) => Some(serde_json::Value::Number(n)),
        None => id_property,
    };
    let id = raw_id
        .as_ref()
        .and_then(FeatureId::coerce)
        .ok_or(IoError::MissingId { position })?;

    let geometry = feature
        .geometry
        .map(geo::Geometry::<f64>::try_from)
        .transpose()?;

    let mut converted = SpatialUnitFeature::new(id, geometry);

    for (property, value) in properties {
        if property == NAME_PROPERTY {
            match value {
                serde_json::Value::String(name) => converted.name = Some(name),
                serde_json::Value::Null => {}
                other => converted.name = Some(other.to_string()),
            }
            continue;
        }

        if property == AGGREGATION_WEIGHT_PROPERTY {
            if let Some(weight) = value.as_f64() {
                converted.set_aggregation_weight(weight)?;
            } else if !value.is_null() {
                return Err(IoError::InvalidValue {
                    id: converted.id().to_string(),
                    property,
                    message: format!("expected a number, found {value}"),
                });
            }
            continue;
        }

        if let Some(key) = DateKey::parse(&property) {
            if value.is_null() {
                continue;
            }
            let parsed: IndicatorValue =
                serde_json::from_value(value).map_err(|e| IoError::InvalidValue {
                    id: converted.id().to_string(),
                    property: property.clone(),
                    message: e.to_string(),
                })?;
            converted.set_value(key, parsed);
            continue;
        }

        converted.attributes.insert(property, value);
    }

    Ok(converted)
}

/// Renders a feature as `GeoJSON`.
///
/// The id is written both as the `id` member and the [`ID_PROPERTY`]
/// property so consumers relying on either keep working.
#[must_use]
pub fn to_geojson(feature: &SpatialUnitFeature) -> geojson::Feature {
    let mut properties = feature.attributes.clone();

    properties.insert(
        ID_PROPERTY.to_string(),
        serde_json::Value::String(feature.id().to_string()),
    );
    if let Some(name) = &feature.name {
        properties.insert(
            NAME_PROPERTY.to_string(),
            serde_json::Value::String(name.clone()),
        );
    }
    if let Some(weight) = serde_json::Number::from_f64(feature.aggregation_weight()) {
        properties.insert(
            AGGREGATION_WEIGHT_PROPERTY.to_string(),
            serde_json::Value::Number(weight),
        );
    }
    for (key, value) in &feature.values {
        properties.insert(key.to_string(), value_to_json(*value));
    }

    geojson::Feature {
        bbox: None,
        geometry: feature
            .geometry
            .as_ref()
            .map(|geometry| geojson::Geometry::new(geojson::Value::from(geometry))),
        id: Some(Id::String(feature.id().to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn value_to_json(value: IndicatorValue) -> serde_json::Value {
    match value {
        IndicatorValue::Value(v) => serde_json::Number::from_f64(v).map_or_else(
            || serde_json::Value::String(NO_DATA.to_string()),
            serde_json::Value::Number,
        ),
        IndicatorValue::NoData => serde_json::Value::String(NO_DATA.to_string()),
    }
}
