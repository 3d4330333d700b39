//! Variable catalogs: the choropleth metric and the detail breakdown table.

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

/// How a metric value reads to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueFormat {
    Currency,
    Number,
    Years,
    Percent,
}

/// The variable shown on the choropleth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Census variable code, e.g. "B19013_001E"
    pub code: String,
    pub label: String,
    pub format: ValueFormat,
}

impl MetricSpec {
    pub fn median_household_income() -> Self {
        MetricSpec {
            code: "B19013_001E".to_string(),
            label: "Median household income".to_string(),
            format: ValueFormat::Currency,
        }
    }

    pub fn median_age() -> Self {
        MetricSpec {
            code: "B01002_001E".to_string(),
            label: "Median age".to_string(),
            format: ValueFormat::Years,
        }
    }

    pub fn median_home_value() -> Self {
        MetricSpec {
            code: "B25077_001E".to_string(),
            label: "Median home value".to_string(),
            format: ValueFormat::Currency,
        }
    }
}

impl Default for MetricSpec {
    fn default() -> Self {
        MetricSpec::median_household_income()
    }
}

/// One raw category code and the label shown for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub code: String,
    pub label: String,
}

/// Ordered categories of the detail chart. The order here is the display
/// order, independent of the order rows come back from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortTable {
    pub title: String,
    pub categories: Vec<Category>,
}

const AGE_COHORT_LABELS: [&str; 18] = [
    "Under 5", "5-9", "10-14", "15-19", "20-24", "25-29", "30-34", "35-39", "40-44", "45-49",
    "50-54", "55-59", "60-64", "65-69", "70-74", "75-79", "80-84", "85 and over",
];

impl CohortTable {
    /// Five-year age cohorts as percent of total population (ACS table S0101,
    /// variables S0101_C02_002E through S0101_C02_019E).
    pub fn age_cohorts() -> Self {
        let categories = AGE_COHORT_LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| Category {
                code: format!("S0101_C02_{:03}E", i + 2),
                label: (*label).to_string(),
            })
            .collect();
        CohortTable {
            title: "Age distribution".to_string(),
            categories,
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn codes(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.code.clone()).collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.categories.iter().any(|c| c.code == code)
    }

    pub fn label_for(&self, code: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.label.as_str())
    }
}

impl Default for CohortTable {
    fn default() -> Self {
        CohortTable::age_cohorts()
    }
}

/// Which release of the statistical product to query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub year: u16,
    /// Product path below the year, e.g. "acs/acs5"
    pub product: String,
}

impl DatasetVersion {
    pub fn acs5(year: u16) -> Self {
        DatasetVersion {
            year,
            product: "acs/acs5".to_string(),
        }
    }

    /// The most recent 5-year ACS release; estimates trail the calendar by two years.
    pub fn latest_acs5() -> Self {
        let year = Local::now().year() - 2;
        DatasetVersion::acs5(u16::try_from(year).unwrap_or(2022))
    }

    /// Endpoint path for a set of variables: subject-table codes ("S...")
    /// live under `<product>/subject`.
    pub fn endpoint_path(&self, variables: &[String]) -> String {
        if variables.iter().any(|v| v.starts_with('S')) {
            format!("{}/{}/subject", self.year, self.product)
        } else {
            format!("{}/{}", self.year, self.product)
        }
    }
}

impl Default for DatasetVersion {
    fn default() -> Self {
        DatasetVersion::latest_acs5()
    }
}
