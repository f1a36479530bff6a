/// Error types shared across the ingest, pipeline, and endpoint layers.
///
/// Malformed or empty upstream *data* is never an error here: the report
/// generator degrades to sentinel payloads for that. These types cover the
/// cases where the pipeline itself could not run.

use thiserror::Error;

/// Failure talking to one of the remote USGS services.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, connection reset, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote call exceeded the configured timeout.
    #[error("request to {url} timed out after {seconds} s")]
    Timeout { url: String, seconds: u64 },

    /// The remote service answered with a non-success status.
    #[error("upstream service returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The results table could not be read as CSV.
    #[error("Failed to parse results CSV: {0}")]
    Csv(#[from] csv::Error),

    /// The site table could not be read as RDB.
    #[error("Failed to parse site RDB: {0}")]
    Rdb(String),
}

/// The single pipeline-level failure surfaced to API callers.
///
/// Every stage failure is reported uniformly with the original message;
/// there is no stage-specific recovery and no partial result.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("{0}")]
    Fetch(#[from] FetchError),
}

/// A request that is well-formed HTTP but not an acceptable query.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid request body: {0}")]
    Body(String),

    #[error("start_date ({start}) must be on or before end_date ({end})")]
    DateOrder { start: String, end: String },

    #[error("Invalid value '{value}' for query parameter '{name}'")]
    QueryParam { name: String, value: String },
}

/// Startup configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for environment variable {key}")]
    EnvValue { key: String, value: String },

    #[error("Unknown log level '{0}' (expected TRACE, DEBUG, INFO, WARN or ERROR)")]
    LogLevel(String),
}
