//! Service settings shared by the commands that talk to the Census API.

use clap::{Args, ValueEnum};
use cme_census::client::{ClientConfig, CENSUS_URL, TIGERWEB_URL};
use cme_census::variables::{DatasetVersion, MetricSpec};
use cme_session::SessionConfig;
use std::time::Duration;

/// Variable colored on the map.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricChoice {
    /// Median household income
    Income,
    /// Median age
    Age,
    /// Median home value
    HomeValue,
}

impl MetricChoice {
    pub fn metric(self) -> MetricSpec {
        match self {
            MetricChoice::Income => MetricSpec::median_household_income(),
            MetricChoice::Age => MetricSpec::median_age(),
            MetricChoice::HomeValue => MetricSpec::median_home_value(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Census API key (keyless requests are rate limited)
    #[arg(long, env = "CENSUS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// ACS 5-year release, defaults to two years before the current year
    #[arg(long)]
    pub year: Option<u16>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    #[arg(long, default_value = CENSUS_URL)]
    pub census_url: String,

    #[arg(long, default_value = TIGERWEB_URL)]
    pub tigerweb_url: String,

    #[arg(short = 'm', long, value_enum, default_value_t = MetricChoice::Income)]
    pub metric: MetricChoice,
}

impl ServiceArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            census_url: self.census_url.trim_end_matches('/').to_string(),
            tigerweb_url: self.tigerweb_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone().filter(|key| !key.trim().is_empty()),
            timeout: Duration::from_secs(self.timeout_secs),
            ..ClientConfig::default()
        }
    }

    pub fn dataset(&self) -> DatasetVersion {
        self.year.map(DatasetVersion::acs5).unwrap_or_default()
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            metric: self.metric.metric(),
            dataset: self.dataset(),
            ..SessionConfig::default()
        }
    }
}
