/// wq_report_service: water-quality reporting API over the USGS Water
/// Quality Portal and NWIS site service.
///
/// # Module structure
///
/// ```text
/// wq_report_service
/// ├── model       — shared data types (QueryFilter, ReportConfig, ResultTable, SiteInfo, …)
/// ├── config      — service settings (defaults, wq_report.toml, environment)
/// ├── logger      — stdout `log` backend
/// ├── error       — FetchError, ProcessingError, ValidationError, ConfigError
/// ├── catalog     — parameter vocabulary and example queries
/// ├── pipeline    — query -> fetch -> clean -> limit -> report
/// ├── endpoint    — HTTP server, routing, CORS and gzip
/// ├── ingest
/// │   ├── wqp     — Water Quality Portal: query params, URL, CSV parsing
/// │   ├── nwis    — NWIS site service: site types, URL, RDB parsing
/// │   └── fixtures (test only) — representative response payloads
/// └── analysis
///     ├── cleaning — row validation, type coercion, record cap
///     └── reports  — summary, detailed, trend and comparison reports
/// ```

/// Public modules
pub mod analysis;
pub mod catalog;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod ingest;
pub mod logger;
pub mod model;
pub mod pipeline;
