//! Decoding of api.census.gov table responses.
//!
//! The API answers with a JSON array of arrays. The first row is the header,
//! e.g. `["NAME","B19013_001E","state","county","tract"]`; geography columns
//! come last and concatenate into the GEOID.

use crate::error::{RemoteFetchError, Result};
use crate::feature::FeatureId;
use serde_json::Value;

/// Geography columns in GEOID order.
const GEOGRAPHY_COLUMNS: [&str; 4] = ["state", "county", "tract", "block group"];

/// Census annotation values (-666666666, -999999999, ...) mark missing estimates.
const ANNOTATION_THRESHOLD: f64 = -111_111_111.0;

/// One decoded cell of the table.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRecord {
    pub feature_id: FeatureId,
    pub name: String,
    pub variable: String,
    pub value: Option<f64>,
}

/// Parse a cell into an estimate; nulls, blanks and annotation codes are `None`.
pub fn parse_estimate(cell: &Value) -> Option<f64> {
    let value = match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    if !value.is_finite() || value <= ANNOTATION_THRESHOLD {
        None
    } else {
        Some(value)
    }
}

fn cell_text(cell: Option<&Value>) -> Option<String> {
    match cell? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a table body into long-format records for the requested variables.
///
/// Columns not in `variables` are ignored; a requested variable missing from
/// the header is a parse error.
pub fn parse_census_table(body: &str, variables: &[String]) -> Result<Vec<ValueRecord>> {
    let table: Vec<Vec<Value>> = serde_json::from_str(body)?;
    let mut rows = table.into_iter();
    let header: Vec<String> = match rows.next() {
        Some(h) => h
            .iter()
            .map(|c| cell_text(Some(c)).unwrap_or_default())
            .collect(),
        None => return Ok(Vec::new()),
    };
    let column = |name: &str| header.iter().position(|h| h == name);

    let name_idx = column("NAME");
    let geo_idx: Vec<usize> = GEOGRAPHY_COLUMNS
        .iter()
        .filter_map(|g| column(g))
        .collect();
    if geo_idx.is_empty() {
        return Err(RemoteFetchError::ResponseParse(format!(
            "no geography columns in header {:?}",
            header
        )));
    }
    let var_idx = variables
        .iter()
        .map(|v| {
            column(v).map(|i| (v.clone(), i)).ok_or_else(|| {
                RemoteFetchError::ResponseParse(format!("variable {} missing from response", v))
            })
        })
        .collect::<Result<Vec<(String, usize)>>>()?;

    let mut records = Vec::new();
    for row in rows {
        let geoid: Option<String> = geo_idx
            .iter()
            .map(|&i| cell_text(row.get(i)))
            .collect();
        let geoid = match geoid {
            Some(g) => FeatureId::new(g),
            None => {
                return Err(RemoteFetchError::ResponseParse(format!(
                    "row without complete geography: {:?}",
                    row
                )))
            }
        };
        let name = name_idx
            .and_then(|i| cell_text(row.get(i)))
            .unwrap_or_else(|| geoid.to_string());
        for (variable, i) in &var_idx {
            records.push(ValueRecord {
                feature_id: geoid.clone(),
                name: name.clone(),
                variable: variable.clone(),
                value: row.get(*i).and_then(parse_estimate),
            });
        }
    }
    Ok(records)
}
