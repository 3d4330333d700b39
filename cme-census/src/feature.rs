//! Geographic features and the datasets built from them.

use crate::region::Region;
use geo::{BoundingRect, Coord, MultiPolygon, Rect};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable key of one map feature: the GEOID text with leading zeros kept,
/// e.g. "10003014500" for a census tract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        FeatureId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-digit state prefix.
    pub fn state_fips(&self) -> Option<&str> {
        self.0.get(..2)
    }

    /// Three-digit county code following the state prefix.
    pub fn county_fips(&self) -> Option<&str> {
        self.0.get(2..5)
    }

    /// Six-digit tract code, only for 11-character tract GEOIDs.
    pub fn tract_code(&self) -> Option<&str> {
        if self.0.len() == 11 {
            self.0.get(5..11)
        } else {
            None
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        FeatureId(value)
    }
}

/// Polygon boundary of a feature; `x` is longitude and `y` latitude (WGS84).
pub type Geometry = MultiPolygon<f64>;

/// Geographic bounding box; `min()` is the south-west corner.
pub type Bounds = Rect<f64>;

/// Smallest box covering both `a` and `b`.
pub fn union_bounds(a: Bounds, b: Bounds) -> Bounds {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Bounding box of every geometry in `geometries`, `None` if none has coordinates.
pub fn bounds_of<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Option<Bounds> {
    geometries
        .into_iter()
        .filter_map(|geometry| geometry.bounding_rect())
        .reduce(union_bounds)
}

/// One feature of a region dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    /// Display name as reported by the service, e.g. "Census Tract 145; Kent County; Delaware"
    pub name: String,
    pub geometry: Arc<Geometry>,
    /// `None` when the service has no estimate for this feature.
    pub metric: Option<f64>,
}

/// Features of one region, in service order, with unique ids.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDataset {
    pub region: Region,
    features: Vec<Feature>,
    index: HashMap<FeatureId, usize>,
}

impl FeatureDataset {
    /// Build a dataset, keeping the first feature seen for each id.
    pub fn new(region: Region, features: Vec<Feature>) -> Self {
        let mut kept = Vec::with_capacity(features.len());
        let mut index = HashMap::with_capacity(features.len());
        let mut duplicates = 0usize;
        for feature in features {
            if index.contains_key(&feature.id) {
                duplicates += 1;
                continue;
            }
            index.insert(feature.id.clone(), kept.len());
            kept.push(feature);
        }
        if duplicates > 0 {
            warn!(
                "Dropped {} duplicate feature ids in dataset for {}",
                duplicates, region
            );
        }
        FeatureDataset {
            region,
            features: kept,
            index,
        }
    }

    pub fn empty(region: Region) -> Self {
        FeatureDataset::new(region, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.index.get(id).map(|&i| &self.features[i])
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.index.contains_key(id)
    }

    /// Observed (min, max) of the finite metric values, `None` if there are none.
    pub fn metric_range(&self) -> Option<(f64, f64)> {
        self.features
            .iter()
            .filter_map(|f| f.metric)
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
                None => Some((v, v)),
            })
    }
}

/// One bar of a detail breakdown: a category code and its share in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub category: String,
    pub percentage: f64,
}

/// Breakdown of a single selected feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailDataset {
    pub region: Region,
    pub feature_id: FeatureId,
    pub rows: Vec<DetailRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64) -> Geometry {
        MultiPolygon::new(vec![Rect::new((x, y), (x + 1.0, y + 1.0)).to_polygon()])
    }

    fn feature(id: &str, metric: Option<f64>) -> Feature {
        Feature {
            id: FeatureId::from(id),
            name: format!("Tract {}", id),
            geometry: Arc::new(square(0.0, 0.0)),
            metric,
        }
    }

    #[test]
    fn feature_id_parts() {
        let id = FeatureId::from("10003014500");
        assert_eq!(id.state_fips(), Some("10"));
        assert_eq!(id.county_fips(), Some("003"));
        assert_eq!(id.tract_code(), Some("014500"));
        assert_eq!(FeatureId::from("10003").tract_code(), None);
    }

    #[test]
    fn dataset_drops_duplicate_ids() {
        let region = Region::lookup("DE").unwrap();
        let dataset = FeatureDataset::new(
            region,
            vec![
                feature("10001040100", Some(1.0)),
                feature("10001040100", Some(2.0)),
                feature("10001040200", None),
            ],
        );
        assert_eq!(dataset.len(), 2);
        assert_eq!(
            dataset.get(&FeatureId::from("10001040100")).unwrap().metric,
            Some(1.0)
        );
        assert!(dataset.contains(&FeatureId::from("10001040200")));
    }

    #[test]
    fn metric_range_ignores_missing() {
        let region = Region::lookup("DE").unwrap();
        let dataset = FeatureDataset::new(
            region.clone(),
            vec![
                feature("10001040100", Some(40_000.0)),
                feature("10001040200", None),
                feature("10001040300", Some(95_000.0)),
            ],
        );
        assert_eq!(dataset.metric_range(), Some((40_000.0, 95_000.0)));
        assert_eq!(FeatureDataset::empty(region).metric_range(), None);
    }

    #[test]
    fn geometry_bounds() {
        let shapes = [square(0.0, 0.0), square(2.0, 3.0)];
        let bounds = bounds_of(&shapes).unwrap();
        assert_eq!(bounds.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), Coord { x: 3.0, y: 4.0 });
        assert_eq!(bounds_of(&[MultiPolygon::new(Vec::new())]), None);
    }
}
