//! Fixtures shared by the engine's unit tests.

use chrono::NaiveDate;
use geo::{Geometry, Rect, coord};
use spatial_indicators_indicator_models::{
    Dataset, DatasetCatalog, DateKey, FeatureCollection, SpatialUnitFeature,
};

use crate::definition::ProcessDefinition;

/// Parses a definition from the TOML tables following `id`/`name`.
pub fn definition(id: &str, tables: &str) -> ProcessDefinition {
    toml::de::from_str(&format!("id = \"{id}\"\nname = \"{id}\"\n{tables}")).unwrap()
}

/// Axis-aligned square polygon.
pub fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
    Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size })
        .to_polygon()
        .into()
}

/// Point geometry.
pub fn point(x: f64, y: f64) -> Geometry<f64> {
    Geometry::Point(geo::Point::new(x, y))
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn key(year: i32, month: u32, day: u32) -> DateKey {
    DateKey::for_date(date(year, month, day))
}

pub fn collection(features: Vec<SpatialUnitFeature>) -> FeatureCollection {
    FeatureCollection::new(features).unwrap()
}

/// Catalog of `(id, name, features)` datasets.
pub fn catalog(datasets: Vec<(&str, &str, Vec<SpatialUnitFeature>)>) -> DatasetCatalog {
    let mut catalog = DatasetCatalog::new();
    for (id, name, features) in datasets {
        catalog
            .insert(Dataset::new(id, name, collection(features)))
            .unwrap();
    }
    catalog
}
