//! Row fixtures shared by the session tests.

use cme_census::feature::Geometry;
use cme_census::service::{MemoryService, Row};
use cme_census::variables::{CohortTable, MetricSpec};
use geo::Rect;
use std::sync::Arc;

/// Id of the `index`-th fixture tract of a five-digit county.
pub fn tract_id(county: &str, index: usize) -> String {
    format!("{}{:06}", county, 100100 + index)
}

/// `count` tracts in `county`, each with a metric estimate and geometry. The
/// first `with_cohorts` of them also carry the age cohort breakdown.
pub fn tract_rows(county: &str, count: usize, with_cohorts: usize) -> Vec<Row> {
    let metric = MetricSpec::default();
    let cohorts = CohortTable::age_cohorts();
    let mut rows = Vec::new();
    for i in 0..count {
        let x = -100.0 + (i % 100) as f64 * 0.01;
        let y = 30.0 + (i / 100) as f64 * 0.01;
        let square = Rect::new((x, y), (x + 0.01, y + 0.01)).to_polygon();
        let geometry = Arc::new(Geometry::new(vec![square]));
        let id = tract_id(county, i);
        let name = format!("Census Tract {}", 1001 + i);
        rows.push(Row {
            feature_id: id.as_str().into(),
            name: name.clone(),
            variable: metric.code.clone(),
            value: Some(40_000.0 + i as f64 * 10.0),
            geometry: Some(Arc::clone(&geometry)),
        });
        if i < with_cohorts {
            for (k, code) in cohorts.codes().into_iter().enumerate() {
                rows.push(Row {
                    feature_id: id.as_str().into(),
                    name: name.clone(),
                    variable: code,
                    value: Some(1.0 + k as f64 * 0.5),
                    geometry: Some(Arc::clone(&geometry)),
                });
            }
        }
    }
    rows
}

/// Delaware (Kent County, 3 tracts with cohorts) and Rhode Island
/// (Providence County, 2 tracts without cohorts).
pub fn small_service() -> MemoryService {
    let mut rows = tract_rows("10001", 3, 2);
    rows.extend(tract_rows("44007", 2, 0));
    MemoryService::new(rows)
}
