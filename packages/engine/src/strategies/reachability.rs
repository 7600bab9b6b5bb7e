//! Share of a population proxy within reach of facilities.
//!
//! Facilities (supermarkets, playgrounds) are turned into reachable areas,
//! either by buffering their geometry or by requesting network isochrones
//! around a representative point. Every population proxy feature
//! (residential buildings weighted by floor area) is reduced to an
//! interior point and assigned to the first target containing it. A
//! target's value is the covered weight divided by its total weight.

use async_trait::async_trait;
use geo::{Geometry, MultiPolygon, Point, Rect};
use spatial_indicators_geometry::{
    EnvelopeIndex, GeometryError, GeometryService, IsochroneRequest, RangeType,
};
use spatial_indicators_indicator_models::{FeatureCollection, SpatialUnitFeature};

use crate::EngineError;
use crate::assign::claim_points;
use crate::compute::{ComputeGap, ComputeRequest, ComputeServices, IndicatorStrategy, annotate};
use crate::definition::{ProcessDefinition, ReachMethod};
use crate::isochrones::batched_isochrones;

/// Routing profile used when no `travel_mode` parameter is given.
pub const DEFAULT_TRAVEL_MODE: &str = "foot-walking";

/// Reachability coverage of a weighted population proxy.
pub struct ReachabilityCoverage {
    definition: ProcessDefinition,
    facilities: String,
    population: String,
    weight_attribute: String,
    method: ReachMethod,
    range_type: RangeType,
}

impl ReachabilityCoverage {
    #[must_use]
    pub const fn new(
        definition: ProcessDefinition,
        facilities: String,
        population: String,
        weight_attribute: String,
        method: ReachMethod,
        range_type: RangeType,
    ) -> Self {
        Self {
            definition,
            facilities,
            population,
            weight_attribute,
            method,
            range_type,
        }
    }

    /// One reachable area per facility with usable geometry.
    async fn reach_areas(
        &self,
        facilities: &FeatureCollection,
        distance: f64,
        travel_mode: String,
        services: &ComputeServices,
    ) -> Result<Vec<MultiPolygon<f64>>, EngineError> {
        match self.method {
            ReachMethod::Buffer => {
                let geometries = facilities
                    .features()
                    .iter()
                    .filter_map(|f| f.geometry.clone())
                    .collect::<Vec<_>>();
                Ok(services.geometry.buffer(&geometries, distance)?)
            }
            ReachMethod::Isochrone => {
                let provider =
                    services
                        .isochrones
                        .as_deref()
                        .ok_or_else(|| GeometryError::Config {
                            message: format!(
                                "{} needs an isochrone provider but none is configured",
                                self.definition.id
                            ),
                        })?;
                let locations = facilities
                    .features()
                    .iter()
                    .filter_map(|f| {
                        f.geometry
                            .as_ref()
                            .and_then(|g| services.geometry.interior_point(g))
                    })
                    .collect::<Vec<_>>();
                let request = IsochroneRequest {
                    profile: travel_mode,
                    range: distance,
                    range_type: self.range_type,
                };
                batched_isochrones(provider, &locations, &request).await
            }
        }
    }

    /// Interior point and weight of a population proxy feature, if usable.
    fn proxy(
        &self,
        feature: &SpatialUnitFeature,
        geometry: &dyn GeometryService,
    ) -> Option<(Point<f64>, f64)> {
        let Some(weight) = feature
            .attribute_f64(&self.weight_attribute)
            .filter(|w| *w >= 0.0)
        else {
            log::debug!(
                "{}: skipping population feature '{}' without usable '{}'",
                self.definition.id,
                feature.id(),
                self.weight_attribute
            );
            return None;
        };
        let point = geometry.interior_point(feature.geometry.as_ref()?)?;
        Some((point, weight))
    }
}

#[async_trait]
impl IndicatorStrategy for ReachabilityCoverage {
    fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    async fn compute(
        &self,
        request: ComputeRequest<'_>,
        services: &ComputeServices,
    ) -> Result<FeatureCollection, EngineError> {
        let params = request.params();
        let distance = params.require_f64("distance")?;
        if distance <= 0.0 {
            return Err(EngineError::ParameterInvalid {
                name: "distance".to_string(),
                message: format!("must be positive, got {distance}"),
            });
        }
        let travel_mode = params
            .optional_text("travel_mode")
            .unwrap_or_else(|| DEFAULT_TRAVEL_MODE.to_string());
        let facilities = &request.georesource(&self.facilities)?.features;
        let population = &request.georesource(&self.population)?.features;

        let areas = self
            .reach_areas(facilities, distance, travel_mode, services)
            .await?
            .into_iter()
            .map(Geometry::MultiPolygon)
            .collect::<Vec<_>>();
        let geometry = services.geometry.as_ref();
        let area_index = EnvelopeIndex::build(
            areas
                .iter()
                .enumerate()
                .filter_map(|(i, a)| geometry.bounding_rect(a).map(|r| (i, r))),
        );
        log::info!(
            "{}: {} reachable areas around {} facilities",
            self.definition.id,
            areas.len(),
            facilities.len()
        );

        let proxies = population
            .features()
            .iter()
            .map(|f| self.proxy(f, geometry))
            .collect::<Vec<_>>();
        let points = proxies
            .iter()
            .map(|p| p.map(|(point, _)| point))
            .collect::<Vec<_>>();
        let claims = claim_points(&request.targets, &points, geometry);

        let mut covered = vec![0.0_f64; request.targets.len()];
        let mut total = vec![0.0_f64; request.targets.len()];
        for (proxy, claim) in proxies.iter().zip(&claims) {
            let (Some((point, weight)), Some(t)) = (proxy, claim) else {
                continue;
            };
            total[*t] += weight;
            let location = Geometry::Point(*point);
            let reached = area_index
                .candidates(&Rect::new(point.0, point.0))
                .into_iter()
                .any(|i| geometry.intersects(&location, &areas[i]));
            if reached {
                covered[*t] += weight;
            }
        }

        #[allow(clippy::float_cmp)]
        let results = covered
            .iter()
            .zip(&total)
            .map(|(covered, total)| {
                if *total == 0.0 {
                    Err(ComputeGap::NoPopulationProxy)
                } else {
                    Ok(covered / total)
                }
            })
            .collect();

        let key = request.date_key();
        annotate(&self.definition, request.targets, &key, results, geometry)
    }
}
