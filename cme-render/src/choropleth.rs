//! Choropleth Renderer: colors a region dataset into a clickable map layer.
//!
//! The color domain is the observed range of the dataset being rendered,
//! so switching regions rescales the palette.

use crate::color::{ColorScale, Rgb, NA_COLOR};
use crate::format::format_value;
use cme_census::feature::{bounds_of, Bounds, FeatureDataset, FeatureId, Geometry};
use cme_census::region::Region;
use cme_census::variables::MetricSpec;
use geo::LineString;
use log::debug;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Layer id used on the map surface; replacing the layer reuses it.
pub const LAYER_ID: &str = "choropleth";

const LEGEND_STOPS: usize = 5;

/// Paint properties applied to every feature of the layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapStyle {
    pub fill_opacity: f64,
    pub stroke_weight: f64,
    pub stroke_color: Rgb,
}

impl Default for MapStyle {
    fn default() -> Self {
        MapStyle {
            fill_opacity: 0.6,
            stroke_weight: 0.3,
            stroke_color: Rgb::new(0xff, 0xff, 0xff),
        }
    }
}

/// A feature ready to be drawn. `click_id` is what the surface reports back
/// when the feature is clicked.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledFeature {
    pub click_id: FeatureId,
    /// Hover text, e.g. "Census Tract 145; Kent County; Delaware: $64,226"
    pub label: String,
    pub fill: Rgb,
    pub value: Option<f64>,
    pub geometry: Arc<Geometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendStop {
    pub value: f64,
    pub label: String,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub title: String,
    pub stops: Vec<LegendStop>,
    /// Present when some features have no estimate.
    pub na_color: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub id: String,
    pub region: Region,
    pub features: Vec<StyledFeature>,
    /// `None` for a layer with no colored features.
    pub legend: Option<Legend>,
    pub style: MapStyle,
}

impl MapLayer {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature(&self, click_id: &FeatureId) -> Option<&StyledFeature> {
        self.features.iter().find(|f| &f.click_id == click_id)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        bounds_of(self.features.iter().map(|f| f.geometry.as_ref()))
    }

    /// GeoJSON FeatureCollection with per-feature paint and click properties.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "id": f.click_id,
                    "properties": {
                        "click_id": f.click_id,
                        "label": f.label,
                        "fill": f.fill,
                        "value": f.value,
                    },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": coordinates(&f.geometry),
                    },
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "name": self.id,
            "region": self.region.name,
            "style": self.style,
            "features": features,
        })
    }
}

/// GeoJSON MultiPolygon coordinates: per polygon, the exterior ring then
/// its holes, each as `[lon, lat]` pairs.
fn coordinates(geometry: &Geometry) -> Value {
    let ring = |ring: &LineString<f64>| -> Vec<[f64; 2]> {
        ring.coords().map(|c| [c.x, c.y]).collect()
    };
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = geometry
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(ring)
                .collect()
        })
        .collect();
    json!(polygons)
}

fn legend(scale: &ColorScale, metric: &MetricSpec, has_missing: bool) -> Legend {
    let stops = (0..LEGEND_STOPS)
        .map(|i| {
            let value = scale.min + (scale.max - scale.min) * i as f64 / (LEGEND_STOPS - 1) as f64;
            LegendStop {
                value,
                label: format_value(Some(value), metric.format),
                color: scale.color(Some(value)),
            }
        })
        .collect();
    Legend {
        title: metric.label.clone(),
        stops,
        na_color: has_missing.then_some(NA_COLOR),
    }
}

/// Render a dataset. An empty dataset gives an empty layer without legend.
pub fn render(dataset: &FeatureDataset, metric: &MetricSpec, style: &MapStyle) -> MapLayer {
    let range = dataset.metric_range();
    let scale = range.map(|(min, max)| ColorScale::new(min, max));

    let features: Vec<StyledFeature> = dataset
        .features()
        .iter()
        .map(|f| StyledFeature {
            click_id: f.id.clone(),
            label: format!("{}: {}", f.name, format_value(f.metric, metric.format)),
            fill: match &scale {
                Some(s) => s.color(f.metric),
                None => NA_COLOR,
            },
            value: f.metric,
            geometry: Arc::clone(&f.geometry),
        })
        .collect();

    let has_missing = features.iter().any(|f| f.value.is_none());
    debug!(
        "Rendered {} features for {} (domain {:?})",
        features.len(),
        dataset.region,
        range
    );
    MapLayer {
        id: LAYER_ID.to_string(),
        region: dataset.region.clone(),
        features,
        legend: scale.map(|s| legend(&s, metric, has_missing)),
        style: *style,
    }
}
