//! Decoding of TIGERweb GeoJSON query pages.

use crate::error::{RemoteFetchError, Result};
use crate::feature::{FeatureId, Geometry};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct GeoJsonFeatureCollection {
    #[serde(default)]
    features: Vec<GeoJsonFeature>,
    #[serde(default, rename = "exceededTransferLimit")]
    exceeded_transfer_limit: bool,
    #[serde(default)]
    properties: HashMap<String, Value>,
    #[serde(default)]
    error: Option<ArcGisError>,
}

#[derive(Debug, Deserialize)]
struct ArcGisError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    properties: HashMap<String, Value>,
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonGeometry {
    #[serde(rename = "type")]
    ty: String,
    coordinates: Value,
}

/// Geometries of one page plus whether the server holds more.
#[derive(Debug, Default)]
pub struct GeometryPage {
    pub geometries: Vec<(FeatureId, Geometry)>,
    pub more: bool,
}

fn to_ring(raw: Vec<Vec<f64>>) -> Result<LineString<f64>> {
    raw.into_iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] => Ok(Coord { x: *lon, y: *lat }),
            _ => Err(RemoteFetchError::ResponseParse(format!(
                "position with {} coordinates",
                p.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

/// Exterior ring first, then holes.
fn to_polygon(raw: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>> {
    let mut rings = raw.into_iter().map(to_ring);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => {
            return Err(RemoteFetchError::ResponseParse(
                "polygon without exterior ring".to_string(),
            ))
        }
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn to_geometry(geometry: GeoJsonGeometry) -> Result<Geometry> {
    match geometry.ty.as_str() {
        "Polygon" => {
            let raw: Vec<Vec<Vec<f64>>> = serde_json::from_value(geometry.coordinates)?;
            Ok(MultiPolygon::new(vec![to_polygon(raw)?]))
        }
        "MultiPolygon" => {
            let raw: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(geometry.coordinates)?;
            let polygons = raw.into_iter().map(to_polygon).collect::<Result<Vec<_>>>()?;
            Ok(MultiPolygon::new(polygons))
        }
        other => Err(RemoteFetchError::ResponseParse(format!(
            "unsupported geometry type {}",
            other
        ))),
    }
}

/// Parse one page of a TIGERweb `f=geojson` query.
///
/// Features without a GEOID or geometry are skipped. ArcGIS reports paging
/// either at the top level or under `properties`, and errors as a JSON body
/// with a 200 status.
pub fn parse_geometry_page(body: &str) -> Result<GeometryPage> {
    let collection: GeoJsonFeatureCollection = serde_json::from_str(body)?;
    if let Some(err) = collection.error {
        return Err(RemoteFetchError::Status {
            status: err.code,
            message: err.message,
        });
    }
    let more = collection.exceeded_transfer_limit
        || collection
            .properties
            .get("exceededTransferLimit")
            .and_then(Value::as_bool)
            .unwrap_or(false);

    let mut geometries = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let geoid = match feature.properties.get("GEOID") {
            Some(Value::String(s)) => FeatureId::new(s.clone()),
            _ => {
                debug!("Skipping TIGERweb feature without GEOID");
                continue;
            }
        };
        let geometry = match feature.geometry {
            Some(g) => to_geometry(g)?,
            None => {
                debug!("Skipping TIGERweb feature {} without geometry", geoid);
                continue;
            }
        };
        geometries.push((geoid, geometry));
    }
    Ok(GeometryPage { geometries, more })
}
