/// Remote data access for the reporting pipeline.
///
/// - `wqp`  — Water Quality Portal result search (params, URL, CSV parsing)
/// - `nwis` — NWIS site service (site-type vocabulary, URL, RDB parsing)
/// - `fixtures` (test only) — representative response payloads
///
/// `WaterDataSource` is the seam the pipeline talks to; `UsgsClient` is the
/// production implementation over blocking reqwest.

pub mod fixtures;
pub mod nwis;
pub mod wqp;

use chrono::Utc;
use log::{debug, info};
use reqwest::StatusCode;
use std::time::Duration;

use crate::config::Settings;
use crate::error::FetchError;
use crate::model::{QueryMetadata, RawResultTable, RemoteQueryParams, SiteInfo};
use nwis::SiteQuery;

/// A results table plus whatever metadata the service attached to it.
#[derive(Debug, Clone, Default)]
pub struct FetchedResults {
    pub table: RawResultTable,
    pub metadata: Option<QueryMetadata>,
}

/// Provider of observation results and site listings.
///
/// Shared read-only across request workers, hence `Send + Sync`.
pub trait WaterDataSource: Send + Sync {
    /// Runs a result search with already-built portal parameters.
    fn fetch_results(&self, params: &RemoteQueryParams) -> Result<FetchedResults, FetchError>;

    /// Lists monitoring sites. Site-type names are mapped to service codes
    /// by the implementation.
    fn fetch_site_info(&self, query: &SiteQuery) -> Result<Vec<SiteInfo>, FetchError>;
}

/// Blocking HTTP client for the WQP and NWIS services.
pub struct UsgsClient {
    http: reqwest::blocking::Client,
    wqp_base_url: String,
    nwis_site_url: String,
    timeout_secs: u64,
}

impl UsgsClient {
    /// Builds a client whose every request is bounded by
    /// `settings.request_timeout_secs`.
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .user_agent(concat!("wq_report_service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            wqp_base_url: settings.wqp_base_url.clone(),
            nwis_site_url: settings.nwis_site_url.clone(),
            timeout_secs: settings.request_timeout_secs,
        })
    }

    fn request_error(&self, err: reqwest::Error, url: &str) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                seconds: self.timeout_secs,
            }
        } else {
            FetchError::Http(err)
        }
    }
}

impl WaterDataSource for UsgsClient {
    fn fetch_results(&self, params: &RemoteQueryParams) -> Result<FetchedResults, FetchError> {
        let url = wqp::build_results_url(&self.wqp_base_url, params);
        debug!("Fetching WQP results: {}", url);

        let query_time = Utc::now();
        let response = self
            .http
            .get(&url)
            .header("Accept", "text/csv")
            .send()
            .map_err(|e| self.request_error(e, &url))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let metadata = wqp::extract_metadata(
            &url,
            query_time,
            response
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        );

        let body = response.text().map_err(|e| self.request_error(e, &url))?;
        let table = wqp::parse_results_csv(&body)?;
        info!("WQP returned {} result rows", table.len());

        Ok(FetchedResults {
            table,
            metadata: Some(metadata),
        })
    }

    fn fetch_site_info(&self, query: &SiteQuery) -> Result<Vec<SiteInfo>, FetchError> {
        let params = nwis::build_site_params(query);
        let url = nwis::build_site_url(&self.nwis_site_url, &params);
        debug!("Fetching NWIS sites: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|e| self.request_error(e, &url))?;

        // The site service answers 404 when no site matches the filters.
        if response.status() == StatusCode::NOT_FOUND {
            info!("NWIS reported no matching sites");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response.text().map_err(|e| self.request_error(e, &url))?;
        let sites = nwis::parse_site_rdb(&body)?;
        info!("NWIS returned {} sites", sites.len());
        Ok(sites)
    }
}
