//! Region and Detail Dataset Fetchers.
//!
//! Both fetchers are stateless and side-effect free: each call issues one
//! query and assembles a fresh dataset from the rows. Deciding which result
//! may be shown is the session's job.

use crate::error::{RemoteFetchError, Result};
use crate::feature::{DetailDataset, DetailRow, Feature, FeatureDataset, FeatureId};
use crate::region::Region;
use crate::service::{GeographyLevel, Query, RegionFilter, Row, StatisticalService};
use crate::variables::{CohortTable, DatasetVersion, MetricSpec};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Fetches the tract choropleth dataset of a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFetcher {
    pub metric: MetricSpec,
    pub dataset: DatasetVersion,
}

impl RegionFetcher {
    pub fn new(metric: MetricSpec, dataset: DatasetVersion) -> Self {
        RegionFetcher { metric, dataset }
    }

    pub fn query_for(&self, region: &Region) -> Query {
        Query {
            geography: GeographyLevel::Tract,
            variables: vec![self.metric.code.clone()],
            filter: RegionFilter {
                state: region.clone(),
                within: None,
            },
            dataset: self.dataset.clone(),
            geometry: true,
        }
    }

    pub async fn fetch<S: StatisticalService>(
        &self,
        service: &S,
        region: &Region,
    ) -> Result<FeatureDataset> {
        info!("Fetching {} for {}", self.metric.label, region);
        let rows = service.query(&self.query_for(region)).await?;
        let dataset = self.assemble(region, rows);
        info!("{} features for {}", dataset.len(), region);
        Ok(dataset)
    }

    /// Turn long-format rows into one feature per id, in first-seen order.
    ///
    /// Rows of other variables or other states are ignored; features without
    /// geometry cannot be drawn and are skipped.
    pub fn assemble(&self, region: &Region, rows: Vec<Row>) -> FeatureDataset {
        let mut features: Vec<Feature> = Vec::new();
        let mut seen: HashMap<FeatureId, usize> = HashMap::new();
        let mut missing_geometry = 0usize;

        for row in rows {
            if row.variable != self.metric.code
                || row.feature_id.state_fips() != Some(region.fips.as_str())
            {
                continue;
            }
            if seen.contains_key(&row.feature_id) {
                continue;
            }
            let geometry = match row.geometry {
                Some(g) => g,
                None => {
                    missing_geometry += 1;
                    continue;
                }
            };
            seen.insert(row.feature_id.clone(), features.len());
            features.push(Feature {
                id: row.feature_id,
                name: row.name,
                geometry,
                metric: row.value,
            });
        }
        if missing_geometry > 0 {
            warn!(
                "Skipped {} features without geometry for {}",
                missing_geometry, region
            );
        }
        FeatureDataset::new(region.clone(), features)
    }
}

/// Fetches the breakdown of one selected feature.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailFetcher {
    pub cohorts: CohortTable,
    pub dataset: DatasetVersion,
}

impl DetailFetcher {
    pub fn new(cohorts: CohortTable, dataset: DatasetVersion) -> Self {
        DetailFetcher { cohorts, dataset }
    }

    pub fn query_for(&self, region: &Region, feature_id: &FeatureId) -> Query {
        Query {
            geography: GeographyLevel::Tract,
            variables: self.cohorts.codes(),
            filter: RegionFilter {
                state: region.clone(),
                within: Some(feature_id.clone()),
            },
            dataset: self.dataset.clone(),
            geometry: false,
        }
    }

    pub async fn fetch<S: StatisticalService>(
        &self,
        service: &S,
        region: &Region,
        feature_id: &FeatureId,
    ) -> Result<DetailDataset> {
        info!("Fetching {} for {} in {}", self.cohorts.title, feature_id, region);
        let rows = service.query(&self.query_for(region, feature_id)).await?;
        self.assemble(region, feature_id, rows)
    }

    /// Keep only rows of `feature_id` whose variable belongs to the table.
    pub fn assemble(
        &self,
        region: &Region,
        feature_id: &FeatureId,
        rows: Vec<Row>,
    ) -> Result<DetailDataset> {
        let total = rows.len();
        let detail_rows: Vec<DetailRow> = rows
            .into_iter()
            .filter(|r| &r.feature_id == feature_id)
            .filter(|r| self.cohorts.contains(&r.variable))
            .filter_map(|r| match r.value {
                Some(percentage) => Some(DetailRow {
                    category: r.variable,
                    percentage,
                }),
                None => {
                    debug!("No estimate for {} in {}", r.variable, feature_id);
                    None
                }
            })
            .collect();
        debug!(
            "Kept {} of {} detail rows for {}",
            detail_rows.len(),
            total,
            feature_id
        );
        if detail_rows.is_empty() {
            return Err(RemoteFetchError::FeatureNotFound {
                feature_id: feature_id.to_string(),
                region: region.to_string(),
            });
        }
        Ok(DetailDataset {
            region: region.clone(),
            feature_id: feature_id.clone(),
            rows: detail_rows,
        })
    }
}
