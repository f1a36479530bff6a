/// HTTP endpoint for the water-quality reporting API
///
/// Endpoints:
/// - POST /water-quality/query           - Run a query and return a report
/// - GET  /water-quality/sites           - List monitoring sites
/// - GET  /water-quality/parameters      - Common parameter names by category
/// - GET  /water-quality/example-queries - Canned request bodies
/// - GET  /health                        - Service health check
///
/// The accept loop hands each request to a worker thread. Routing is a pure
/// function of (method, url, body) so it can be tested without a socket.

use chrono::{NaiveDate, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;
use threadpool::ThreadPool;

use crate::catalog;
use crate::config::Settings;
use crate::error::{ProcessingError, ValidationError};
use crate::ingest::WaterDataSource;
use crate::ingest::nwis::SiteQuery;
use crate::model::{QueryFilter, ReportConfig};
use crate::pipeline;

/// Bodies at least this large are gzip-compressed when the client accepts it.
pub const GZIP_MIN_BYTES: usize = 1000;

/// Largest request body accepted; anything bigger is answered with 413.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

pub const AVAILABLE_ENDPOINTS: [&str; 5] = [
    "POST /water-quality/query",
    "GET /water-quality/sites",
    "GET /water-quality/parameters",
    "GET /water-quality/example-queries",
    "GET /health",
];

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Read-only state shared by every request worker.
pub struct AppContext {
    pub settings: Settings,
    pub source: Box<dyn WaterDataSource>,
}

/// Outcome of routing one request. `body` is `None` for 204 responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    fn json(status: u16, body: Value) -> Self {
        Self { status, body: Some(body) }
    }

    fn detail(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "detail": message.into() }))
    }

    fn no_content() -> Self {
        Self { status: 204, body: None }
    }
}

/// Body of `POST /water-quality/query`.
#[derive(Debug, Deserialize)]
struct QueryRequest {
    query: QueryFilter,
    #[serde(default)]
    config: ReportConfig,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Routes one request to its handler.
pub fn route(ctx: &AppContext, method: &str, url: &str, body: &str) -> ApiResponse {
    if method.eq_ignore_ascii_case("OPTIONS") {
        return ApiResponse::no_content();
    }

    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match (method, path) {
        ("GET", "/health") => handle_health(),
        ("POST", "/water-quality/query") => handle_query(ctx, body),
        ("GET", "/water-quality/sites") => handle_sites(ctx, query),
        ("GET", "/water-quality/parameters") => {
            serialize_or_500(&catalog::parameters_response())
        }
        ("GET", "/water-quality/example-queries") => ApiResponse::json(200, catalog::example_queries()),
        (_, "/health")
        | (_, "/water-quality/query")
        | (_, "/water-quality/sites")
        | (_, "/water-quality/parameters")
        | (_, "/water-quality/example-queries") => {
            ApiResponse::detail(405, "Method Not Allowed")
        }
        _ => ApiResponse::json(
            404,
            json!({
                "detail": "Not found",
                "available_endpoints": AVAILABLE_ENDPOINTS,
            }),
        ),
    }
}

fn handle_health() -> ApiResponse {
    ApiResponse::json(
        200,
        json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
        }),
    )
}

fn handle_query(ctx: &AppContext, body: &str) -> ApiResponse {
    let request = match parse_query_request(body) {
        Ok(request) => request,
        Err(e) => return ApiResponse::detail(422, e.to_string()),
    };

    match pipeline::run_query(
        ctx.source.as_ref(),
        &request.query,
        &request.config,
        ctx.settings.max_records_per_request,
    ) {
        Ok(report) => serialize_or_500(&report),
        Err(e) => processing_failure("Error querying data", e),
    }
}

fn handle_sites(ctx: &AppContext, query: &str) -> ApiResponse {
    let site_query = match parse_site_query(query) {
        Ok(q) => q,
        Err(e) => return ApiResponse::detail(422, e.to_string()),
    };

    match pipeline::list_sites(ctx.source.as_ref(), &site_query) {
        Ok(response) => serialize_or_500(&response),
        Err(e) => processing_failure("Error retrieving sites", e),
    }
}

fn processing_failure(context: &str, err: ProcessingError) -> ApiResponse {
    error!("{}: {}", context, err);
    ApiResponse::detail(500, format!("{}: {}", context, err))
}

fn serialize_or_500<T: serde::Serialize>(value: &T) -> ApiResponse {
    match serde_json::to_value(value) {
        Ok(body) => ApiResponse::json(200, body),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            ApiResponse::detail(500, format!("Failed to serialize response: {}", e))
        }
    }
}

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

fn parse_query_request(body: &str) -> Result<QueryRequest, ValidationError> {
    let request: QueryRequest =
        serde_json::from_str(body).map_err(|e| ValidationError::Body(e.to_string()))?;
    request.query.validate()?;
    Ok(request)
}

/// Splits a query string into decoded `(key, value)` pairs, keeping
/// repeated keys in order. `+` is a space.
pub fn parse_query_string(query: &str) -> Result<Vec<(String, String)>, ValidationError> {
    let decode = |raw: &str| -> Result<String, ValidationError> {
        let spaced = raw.replace('+', " ");
        urlencoding::decode(&spaced)
            .map(|s| s.into_owned())
            .map_err(|_| ValidationError::QueryParam {
                name: "query".to_string(),
                value: raw.to_string(),
            })
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}

/// Builds a site query from `state_cd`, `site_type` (both repeatable) and
/// `has_data_since`. Absent lists default to `["CA"]` and `["Stream"]`.
pub fn parse_site_query(query: &str) -> Result<SiteQuery, ValidationError> {
    let pairs = parse_query_string(query)?;

    let mut state_cd = Vec::new();
    let mut site_type = Vec::new();
    let mut has_data_since = None;

    for (key, value) in pairs {
        match key.as_str() {
            "state_cd" => state_cd.push(value),
            "site_type" => site_type.push(value),
            "has_data_since" => {
                let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                    ValidationError::QueryParam {
                        name: key.clone(),
                        value: value.clone(),
                    }
                })?;
                has_data_since = Some(date);
            }
            _ => {}
        }
    }

    if state_cd.is_empty() {
        state_cd.push("CA".to_string());
    }
    if site_type.is_empty() {
        site_type.push("Stream".to_string());
    }

    Ok(SiteQuery {
        state_cd,
        site_type,
        has_data_since,
    })
}

// ---------------------------------------------------------------------------
// Response encoding
// ---------------------------------------------------------------------------

/// `Access-Control-Allow-Origin` value for a request, if any.
pub fn cors_origin(settings: &Settings, request_origin: Option<&str>) -> Option<String> {
    if settings.cors_origins.iter().any(|o| o == "*") {
        return Some("*".to_string());
    }
    request_origin
        .filter(|origin| settings.cors_origins.iter().any(|o| o == origin))
        .map(|origin| origin.to_string())
}

/// True when `Accept-Encoding` lists gzip with a non-zero q-value.
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    let Some(header) = accept_encoding else {
        return false;
    };

    header.split(',').any(|entry| {
        let mut parts = entry.split(';');
        let coding = parts.next().map(str::trim).unwrap_or_default();
        if !coding.eq_ignore_ascii_case("gzip") {
            return false;
        }
        match parts.find_map(|p| p.trim().strip_prefix("q=")) {
            Some(q) => q.trim().parse::<f32>().map(|q| q > 0.0).unwrap_or(false),
            None => true,
        }
    })
}

/// Gzips `body` when allowed and large enough. Returns the bytes and
/// whether they were compressed.
pub fn encode_body(body: Vec<u8>, gzip_allowed: bool) -> (Vec<u8>, bool) {
    if !gzip_allowed || body.len() < GZIP_MIN_BYTES {
        return (body, false);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    match encoder.write_all(&body).and_then(|_| encoder.finish()) {
        Ok(compressed) => (compressed, true),
        Err(e) => {
            warn!("gzip encoding failed, sending uncompressed: {}", e);
            (body, false)
        }
    }
}

fn header(name: &str, value: &str) -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn build_response(
    api: &ApiResponse,
    settings: &Settings,
    origin: Option<&str>,
    gzip_allowed: bool,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let mut headers = Vec::new();

    let bytes = match &api.body {
        Some(body) => {
            headers.push(header("Content-Type", "application/json"));
            let raw = serde_json::to_vec(body).unwrap_or_default();
            let (bytes, compressed) = encode_body(raw, gzip_allowed);
            if compressed {
                headers.push(header("Content-Encoding", "gzip"));
            }
            headers.push(header("Vary", "Accept-Encoding"));
            bytes
        }
        None => {
            headers.push(header("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
            headers.push(header("Access-Control-Allow-Headers", "Content-Type, Authorization"));
            Vec::new()
        }
    };

    if let Some(allowed) = cors_origin(settings, origin) {
        headers.push(header("Access-Control-Allow-Origin", &allowed));
    }

    let mut response =
        tiny_http::Response::from_data(bytes).with_status_code(tiny_http::StatusCode::from(api.status));
    for h in headers.into_iter().flatten() {
        response.add_header(h);
    }
    response
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

fn request_header(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

/// Reads at most `limit` bytes of body. Larger bodies get 413; unreadable
/// or non-UTF-8 ones get 422.
pub fn read_body<R: Read>(reader: R, limit: u64) -> Result<String, ApiResponse> {
    let mut body = String::new();
    reader
        .take(limit + 1)
        .read_to_string(&mut body)
        .map_err(|e| ApiResponse::detail(422, ValidationError::Body(e.to_string()).to_string()))?;

    if body.len() as u64 > limit {
        return Err(ApiResponse::detail(
            413,
            format!("Request body exceeds {} bytes", limit),
        ));
    }
    Ok(body)
}

fn handle_request(ctx: &AppContext, mut request: tiny_http::Request) {
    let started = Instant::now();
    let method = request.method().as_str().to_string();
    let url = request.url().to_string();
    let origin = request_header(&request, "Origin");
    let gzip_allowed = accepts_gzip(request_header(&request, "Accept-Encoding").as_deref());

    let api = match read_body(request.as_reader(), MAX_BODY_BYTES) {
        Ok(body) => route(ctx, &method, &url, &body),
        Err(rejected) => rejected,
    };

    let response = build_response(&api, &ctx.settings, origin.as_deref(), gzip_allowed);
    if let Err(e) = request.respond(response) {
        error!("Failed to send response for {} {}: {}", method, url, e);
    }

    info!(
        "{} {} {} {}ms",
        method,
        url,
        api.status,
        started.elapsed().as_millis()
    );
}

/// Binds the listener and serves requests until the process exits.
pub fn start_server(ctx: AppContext) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let address = ctx.settings.bind_address();
    let server = tiny_http::Server::http(&address)?;
    let pool = ThreadPool::new(ctx.settings.worker_threads.max(1));

    info!(
        "{} v{} listening on http://{} ({} workers)",
        ctx.settings.app_name,
        ctx.settings.version,
        address,
        ctx.settings.worker_threads.max(1)
    );
    for endpoint in AVAILABLE_ENDPOINTS {
        info!("   {}", endpoint);
    }

    let ctx = Arc::new(ctx);
    for request in server.incoming_requests() {
        let ctx = Arc::clone(&ctx);
        pool.execute(move || handle_request(&ctx, request));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
