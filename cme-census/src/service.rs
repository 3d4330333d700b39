//! The remote statistical-data seam.
//!
//! Fetchers only talk to a [`StatisticalService`]; the HTTP client in
//! `client` and the in-memory [`MemoryService`] are the two implementations.

use crate::error::{RemoteFetchError, Result};
use crate::feature::{FeatureId, Geometry};
use crate::region::Region;
use crate::variables::DatasetVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Geography level of the rows a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeographyLevel {
    County,
    Tract,
}

impl GeographyLevel {
    /// Predicate name used by the Census API `for=` clause.
    pub fn predicate(&self) -> &'static str {
        match self {
            GeographyLevel::County => "county",
            GeographyLevel::Tract => "tract",
        }
    }
}

/// Restricts a query to one region, optionally narrowed around a feature.
///
/// `within` is a hint: a service may return more than the named feature
/// (e.g. its whole county), never less.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFilter {
    pub state: Region,
    pub within: Option<FeatureId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub geography: GeographyLevel,
    pub variables: Vec<String>,
    pub filter: RegionFilter,
    pub dataset: DatasetVersion,
    /// Attach feature geometry to every row.
    pub geometry: bool,
}

impl Query {
    pub fn describe(&self) -> String {
        format!(
            "{} {} in {} ({} {})",
            self.variables.join(","),
            self.geography.predicate(),
            self.filter.state,
            self.dataset.product,
            self.dataset.year
        )
    }
}

/// One (feature, variable, value) triple, long format.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub feature_id: FeatureId,
    pub name: String,
    pub variable: String,
    pub value: Option<f64>,
    pub geometry: Option<Arc<Geometry>>,
}

/// A source of statistical rows.
pub trait StatisticalService: Send + Sync {
    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

/// Service answering from a fixed set of rows.
///
/// Mirrors the remote failure modes: an unknown variable is a 400 status and
/// an empty match is [`RemoteFetchError::EmptyResult`]. A `within` hint
/// narrows to the feature's county only, so sibling tracts come back too.
#[derive(Debug, Default)]
pub struct MemoryService {
    rows: Vec<Row>,
    calls: AtomicUsize,
}

impl MemoryService {
    pub fn new(rows: Vec<Row>) -> Self {
        MemoryService {
            rows,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, query: &Query) -> Result<Vec<Row>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let known: HashSet<&str> = self.rows.iter().map(|r| r.variable.as_str()).collect();
        if let Some(unknown) = query.variables.iter().find(|v| !known.contains(v.as_str())) {
            return Err(RemoteFetchError::Status {
                status: 400,
                message: format!("error: unknown variable '{}'", unknown),
            });
        }
        let prefix = match &query.filter.within {
            Some(id) => id.as_str().get(..5).unwrap_or(id.as_str()).to_string(),
            None => query.filter.state.fips.clone(),
        };
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|r| r.feature_id.as_str().starts_with(&prefix))
            .filter(|r| query.variables.contains(&r.variable))
            .map(|r| Row {
                geometry: if query.geometry { r.geometry.clone() } else { None },
                ..r.clone()
            })
            .collect();
        if rows.is_empty() {
            return Err(RemoteFetchError::EmptyResult(query.describe()));
        }
        Ok(rows)
    }
}

impl StatisticalService for MemoryService {
    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>>> + Send {
        std::future::ready(self.answer(query))
    }
}
