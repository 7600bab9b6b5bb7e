#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `GeoJSON` interchange for the indicator engine.
//!
//! Reads `FeatureCollection` documents into [`FeatureCollection`] values,
//! writes annotated collections back out, and loads process parameter
//! files. Feature ids are coerced to their canonical form here and nowhere
//! else.

pub mod features;

use std::path::Path;

use geojson::GeoJson;
use spatial_indicators_indicator_models::{FeatureCollection, ModelError, ProcessParameter};
use thiserror::Error;

/// Foreign member of a `FeatureCollection` naming its spatial-unit level.
pub const LEVEL_MEMBER: &str = "spatialUnitLevel";

/// Errors from reading or writing interchange files.
#[derive(Debug, Error)]
pub enum IoError {
    /// File read/write failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing or geometry conversion failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),

    /// The document is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection, found a {kind}")]
    NotAFeatureCollection {
        /// What was found instead.
        kind: &'static str,
    },

    /// A feature carries no usable id.
    #[error("Feature at position {position} has no usable id")]
    MissingId {
        /// Zero-based position in the collection.
        position: usize,
    },

    /// A date property holds something other than a number or `NoData`.
    #[error("Feature '{id}' property '{property}': {message}")]
    InvalidValue {
        /// Feature id.
        id: String,
        /// Offending property.
        property: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The features violate a model invariant (duplicate ids, negative
    /// weights).
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl From<geojson::Error> for IoError {
    fn from(e: geojson::Error) -> Self {
        Self::GeoJson(Box::new(e))
    }
}

/// Parses a `GeoJSON` `FeatureCollection` document.
///
/// # Errors
///
/// Returns [`IoError`] if the text is not a `FeatureCollection`, a feature
/// lacks an id, a date property is malformed, or ids repeat.
pub fn parse_collection(text: &str) -> Result<FeatureCollection, IoError> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(_) => return Err(IoError::NotAFeatureCollection { kind: "Feature" }),
        GeoJson::Geometry(_) => return Err(IoError::NotAFeatureCollection { kind: "Geometry" }),
    };

    let level = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get(LEVEL_MEMBER))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let features = collection
        .features
        .into_iter()
        .enumerate()
        .map(|(position, feature)| features::from_geojson(position, feature))
        .collect::<Result<Vec<_>, _>>()?;

    let parsed = FeatureCollection::new(features)?;
    Ok(match level {
        Some(level) => parsed.with_level(level),
        None => parsed,
    })
}

/// Reads a `GeoJSON` `FeatureCollection` file.
///
/// # Errors
///
/// Returns [`IoError`] if the file cannot be read or parsed.
pub fn read_collection(path: &Path) -> Result<FeatureCollection, IoError> {
    let text = std::fs::read_to_string(path)?;
    let collection = parse_collection(&text)?;
    log::debug!(
        "Read {} features from {}",
        collection.len(),
        path.display()
    );
    Ok(collection)
}

/// Renders a collection as a `GeoJSON` document.
#[must_use]
pub fn to_geojson(collection: &FeatureCollection) -> GeoJson {
    let foreign_members = collection.level().map(|level| {
        let mut members = serde_json::Map::new();
        members.insert(
            LEVEL_MEMBER.to_string(),
            serde_json::Value::String(level.to_string()),
        );
        members
    });

    GeoJson::FeatureCollection(geojson::FeatureCollection {
        bbox: None,
        features: collection
            .features()
            .iter()
            .map(features::to_geojson)
            .collect(),
        foreign_members,
    })
}

/// Writes a collection to a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IoError::Io`] if the file cannot be written.
pub fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<(), IoError> {
    std::fs::write(path, to_geojson(collection).to_string())?;
    log::debug!("Wrote {} features to {}", collection.len(), path.display());
    Ok(())
}

/// Parses a process parameter document (`[{"name": ..., "value": ...}]`).
///
/// # Errors
///
/// Returns [`IoError::Json`] if the document is malformed.
pub fn parse_parameters(text: &str) -> Result<Vec<ProcessParameter>, IoError> {
    Ok(serde_json::from_str(text)?)
}

/// Reads a process parameter file.
///
/// # Errors
///
/// Returns [`IoError`] if the file cannot be read or parsed.
pub fn read_parameters(path: &Path) -> Result<Vec<ProcessParameter>, IoError> {
    parse_parameters(&std::fs::read_to_string(path)?)
}
