/// Error types for Census data access
use thiserror::Error;

/// Failure while fetching or decoding remote statistical data.
///
/// Every variant is recoverable from the point of view of a dashboard session:
/// the caller keeps whatever it was displaying and reports the message.
#[derive(Error, Debug)]
pub enum RemoteFetchError {
    /// HTTP request failed
    #[cfg(feature = "api")]
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The service answered with a non-success status (e.g. unknown variable)
    #[error("Census service returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Failed to parse HTTP response
    #[error("Failed to parse response: {0}")]
    ResponseParse(String),

    /// Failed to decode JSON
    #[error("Failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to parse CSV data
    #[error("Failed to parse CSV: {0}")]
    CsvParse(#[from] csv::Error),

    /// The query matched nothing
    #[error("No data returned for {0}")]
    EmptyResult(String),

    /// Region name, abbreviation or FIPS code not recognised
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// The fetch task died before producing an answer
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),

    /// The requested feature is absent from the service's answer
    #[error("Feature {feature_id} not found in {region}")]
    FeatureNotFound { feature_id: String, region: String },
}

/// Type alias for Results using RemoteFetchError
pub type Result<T> = std::result::Result<T, RemoteFetchError>;
