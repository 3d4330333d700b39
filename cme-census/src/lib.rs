//! Core types and Census data access for the census map explorer.
//!
//! - `region`, `feature`, `variables`: the data model (regions, tract features,
//!   detail breakdowns) and the variable catalogs used to query them.
//! - `service`: the `StatisticalService` seam plus an in-memory implementation.
//! - `fetch`: the Region and Detail Dataset Fetchers built on that seam.
//! - `client` (feature `api`): the HTTP client for api.census.gov and TIGERweb.

pub mod census_json;
#[cfg(feature = "api")]
pub mod client;
pub mod error;
pub mod feature;
pub mod fetch;
pub mod region;
pub mod service;
pub mod tiger;
pub mod variables;

pub use error::{RemoteFetchError, Result};
