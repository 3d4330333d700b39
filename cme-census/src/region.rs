use crate::error::{RemoteFetchError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Embedded CSV of the selectable regions (50 states, DC and Puerto Rico).
pub static STATES_CSV: &str = include_str!("../../fixtures/states.csv");

static REGIONS: OnceLock<Vec<Region>> = OnceLock::new();

/// A user-selectable top-level geography, identified by its state FIPS code.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    /// USPS postal abbreviation, e.g. "TX"
    pub abbr: String,
    /// Two-digit FIPS code with leading zero, e.g. "06"
    pub fips: String,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Region {
    /// All regions from the embedded fixture.
    pub fn get_region_vector() -> &'static [Region] {
        REGIONS.get_or_init(|| {
            if let Ok(r) = Region::parse_region_csv(STATES_CSV) {
                r
            } else {
                panic!("failed to parse embedded states csv")
            }
        })
    }

    /// Resolve a region from a name (case-insensitive), postal abbreviation
    /// or FIPS code.
    pub fn lookup(query: &str) -> Result<Region> {
        let needle = query.trim();
        let regions = Region::get_region_vector();
        let found = if !needle.is_empty() && needle.chars().all(|c| c.is_ascii_digit()) {
            let fips = format!("{:0>2}", needle);
            regions.iter().find(|r| r.fips == fips)
        } else if needle.len() == 2 {
            regions
                .iter()
                .find(|r| r.abbr.eq_ignore_ascii_case(needle))
        } else {
            regions
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(needle))
        };
        found
            .cloned()
            .ok_or_else(|| RemoteFetchError::UnknownRegion(query.to_string()))
    }

    /// Parse a CSV string of regions.
    ///
    /// Expected CSV columns: name, abbr, fips
    pub fn parse_region_csv(csv_object: &str) -> Result<Vec<Region>> {
        let mut region_list: Vec<Region> = Vec::new();
        let mut rdr = ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .from_reader(csv_object.as_bytes());
        for row in rdr.records() {
            let record = row?;
            let field = |idx: usize, what: &str| {
                record
                    .get(idx)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        RemoteFetchError::ResponseParse(format!(
                            "region row missing {}: {:?}",
                            what, record
                        ))
                    })
            };
            region_list.push(Region {
                name: field(0, "name")?,
                abbr: field(1, "abbr")?,
                fips: format!("{:0>2}", field(2, "fips")?),
            });
        }
        Ok(region_list)
    }
}
