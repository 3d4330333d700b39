//! HTTP client for api.census.gov estimates and TIGERweb tract boundaries.

use crate::census_json::{parse_census_table, ValueRecord};
use crate::error::{RemoteFetchError, Result};
use crate::feature::{FeatureId, Geometry};
use crate::service::{GeographyLevel, Query, Row, StatisticalService};
use crate::tiger::parse_geometry_page;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const CENSUS_URL: &str = "https://api.census.gov/data";
pub const TIGERWEB_URL: &str = "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb";

/// Connection settings for [`CensusClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub census_url: String,
    pub tigerweb_url: String,
    /// Optional; the API serves a limited number of keyless requests per day.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_tries: u32,
    pub backoff: Duration,
    /// Records per TIGERweb page.
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            census_url: CENSUS_URL.to_string(),
            tigerweb_url: TIGERWEB_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_tries: 3,
            backoff: Duration::from_millis(1000),
            page_size: 1000,
        }
    }
}

/// TIGERweb map-service layer holding boundaries for a geography level.
fn tiger_layer(level: GeographyLevel) -> u32 {
    match level {
        GeographyLevel::Tract => 8,
        GeographyLevel::County => 82,
    }
}

pub struct CensusClient {
    client: Client,
    config: ClientConfig,
}

impl CensusClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(CensusClient { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn values_request(&self, query: &Query) -> (String, Vec<(String, String)>) {
        let url = format!(
            "{}/{}",
            self.config.census_url,
            query.dataset.endpoint_path(&query.variables)
        );
        let state = &query.filter.state.fips;
        let predicate = query.geography.predicate();
        let within = query.filter.within.as_ref();
        let (for_clause, in_clause) = match (query.geography, within) {
            (GeographyLevel::Tract, Some(id)) => match (id.county_fips(), id.tract_code()) {
                (Some(county), Some(tract)) => (
                    format!("tract:{}", tract),
                    format!("state:{} county:{}", state, county),
                ),
                _ => (format!("{}:*", predicate), format!("state:{}", state)),
            },
            (GeographyLevel::County, Some(id)) => match id.county_fips() {
                Some(county) => (format!("county:{}", county), format!("state:{}", state)),
                None => (format!("{}:*", predicate), format!("state:{}", state)),
            },
            (_, None) => (format!("{}:*", predicate), format!("state:{}", state)),
        };
        let mut params = vec![
            ("get".to_string(), format!("NAME,{}", query.variables.join(","))),
            ("for".to_string(), for_clause),
            ("in".to_string(), in_clause),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("key".to_string(), key.clone()));
        }
        (url, params)
    }

    fn geometry_request(&self, query: &Query, offset: usize) -> (String, Vec<(String, String)>) {
        let url = format!(
            "{}/tigerWMS_ACS{}/MapServer/{}/query",
            self.config.tigerweb_url,
            query.dataset.year,
            tiger_layer(query.geography)
        );
        let where_clause = match &query.filter.within {
            Some(id) => format!("GEOID='{}'", id),
            None => format!("STATE='{}'", query.filter.state.fips),
        };
        let params = vec![
            ("where".to_string(), where_clause),
            ("outFields".to_string(), "GEOID".to_string()),
            ("returnGeometry".to_string(), "true".to_string()),
            ("outSR".to_string(), "4326".to_string()),
            ("orderByFields".to_string(), "GEOID".to_string()),
            ("resultOffset".to_string(), offset.to_string()),
            ("resultRecordCount".to_string(), self.config.page_size.to_string()),
            ("f".to_string(), "geojson".to_string()),
        ];
        (url, params)
    }

    /// GET a text body, retrying transport failures and 5xx with exponential backoff.
    async fn get_text(&self, url: &str, params: &[(String, String)], what: &str) -> Result<String> {
        let max_tries = self.config.max_tries.max(1);
        let mut sleep_for = self.config.backoff;
        let mut last_error = None;

        for attempt in 1..=max_tries {
            match self.client.get(url).query(params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::NO_CONTENT {
                        return Err(RemoteFetchError::EmptyResult(what.to_string()));
                    }
                    if status.is_server_error() {
                        warn!(
                            "Attempt {}/{}: Bad response status for {}: {}",
                            attempt, max_tries, what, status
                        );
                        last_error = Some(RemoteFetchError::Status {
                            status: status.as_u16(),
                            message: status.to_string(),
                        });
                    } else if !status.is_success() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(RemoteFetchError::Status {
                            status: status.as_u16(),
                            message: message.trim().to_string(),
                        });
                    } else {
                        match response.text().await {
                            Ok(body) => return Ok(body),
                            Err(e) => {
                                warn!(
                                    "Attempt {}/{}: Failed to read response body for {}: {}",
                                    attempt, max_tries, what, e
                                );
                                last_error = Some(e.into());
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{}: Request failed for {}: {}",
                        attempt, max_tries, what, e
                    );
                    last_error = Some(e.into());
                }
            }

            if attempt < max_tries {
                info!(
                    "Sleeping for {} milliseconds before retry for {}",
                    sleep_for.as_millis(),
                    what
                );
                tokio::time::sleep(sleep_for).await;
                sleep_for *= 2;
            }
        }

        warn!("All attempts failed for {}", what);
        Err(last_error.unwrap_or_else(|| RemoteFetchError::EmptyResult(what.to_string())))
    }

    async fn fetch_values(&self, query: &Query) -> Result<Vec<ValueRecord>> {
        let (url, params) = self.values_request(query);
        let body = self.get_text(&url, &params, &query.describe()).await?;
        parse_census_table(&body, &query.variables)
    }

    async fn fetch_geometries(&self, query: &Query) -> Result<HashMap<FeatureId, Arc<Geometry>>> {
        let mut geometries = HashMap::new();
        let mut offset = 0usize;
        loop {
            let (url, params) = self.geometry_request(query, offset);
            let what = format!("boundaries of {} (offset {})", query.filter.state, offset);
            let body = self.get_text(&url, &params, &what).await?;
            let page = parse_geometry_page(&body)?;
            let received = page.geometries.len();
            for (id, geometry) in page.geometries {
                geometries.insert(id, Arc::new(geometry));
            }
            if !page.more || received == 0 {
                break;
            }
            offset += received;
        }
        info!(
            "Fetched {} boundaries for {}",
            geometries.len(),
            query.filter.state
        );
        Ok(geometries)
    }

    async fn run_query(&self, query: &Query) -> Result<Vec<Row>> {
        info!("Querying {}", query.describe());
        let values = self.fetch_values(query).await?;
        if values.is_empty() {
            return Err(RemoteFetchError::EmptyResult(query.describe()));
        }
        let geometries = if query.geometry {
            self.fetch_geometries(query).await?
        } else {
            HashMap::new()
        };
        let rows = values
            .into_iter()
            .map(|v| Row {
                geometry: geometries.get(&v.feature_id).cloned(),
                feature_id: v.feature_id,
                name: v.name,
                variable: v.variable,
                value: v.value,
            })
            .collect::<Vec<Row>>();
        info!("{} rows for {}", rows.len(), query.describe());
        Ok(rows)
    }
}

impl StatisticalService for CensusClient {
    fn query(&self, query: &Query) -> impl Future<Output = Result<Vec<Row>>> + Send {
        self.run_query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::service::RegionFilter;
    use crate::variables::{CohortTable, DatasetVersion};

    fn client() -> CensusClient {
        CensusClient::new(ClientConfig {
            api_key: Some("KEY".to_string()),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    fn param<'a>(params: &'a [(String, String)], name: &str) -> &'a str {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap()
    }

    #[test]
    fn values_request_for_whole_state() {
        let query = Query {
            geography: GeographyLevel::Tract,
            variables: vec!["B19013_001E".to_string()],
            filter: RegionFilter {
                state: Region::lookup("TX").unwrap(),
                within: None,
            },
            dataset: DatasetVersion::acs5(2022),
            geometry: true,
        };
        let (url, params) = client().values_request(&query);
        assert_eq!(url, "https://api.census.gov/data/2022/acs/acs5");
        assert_eq!(param(&params, "get"), "NAME,B19013_001E");
        assert_eq!(param(&params, "for"), "tract:*");
        assert_eq!(param(&params, "in"), "state:48");
        assert_eq!(param(&params, "key"), "KEY");
    }

    #[test]
    fn values_request_narrowed_to_tract() {
        let query = Query {
            geography: GeographyLevel::Tract,
            variables: CohortTable::age_cohorts().codes(),
            filter: RegionFilter {
                state: Region::lookup("DE").unwrap(),
                within: Some(FeatureId::from("10003014500")),
            },
            dataset: DatasetVersion::acs5(2022),
            geometry: false,
        };
        let (url, params) = client().values_request(&query);
        assert_eq!(url, "https://api.census.gov/data/2022/acs/acs5/subject");
        assert_eq!(param(&params, "for"), "tract:014500");
        assert_eq!(param(&params, "in"), "state:10 county:003");
    }

    #[test]
    fn geometry_request_pages() {
        let query = Query {
            geography: GeographyLevel::Tract,
            variables: vec!["B19013_001E".to_string()],
            filter: RegionFilter {
                state: Region::lookup("DE").unwrap(),
                within: None,
            },
            dataset: DatasetVersion::acs5(2022),
            geometry: true,
        };
        let (url, params) = client().geometry_request(&query, 2000);
        assert!(url.ends_with("/tigerWMS_ACS2022/MapServer/8/query"));
        assert_eq!(param(&params, "where"), "STATE='10'");
        assert_eq!(param(&params, "resultOffset"), "2000");
        assert_eq!(param(&params, "f"), "geojson");
    }
}
