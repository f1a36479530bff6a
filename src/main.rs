//! Water Quality Reporting Service - HTTP daemon
//!
//! Serves water-quality reports built from the USGS Water Quality Portal
//! and site listings from the NWIS site service.
//!
//! Usage:
//!   cargo run --release                              # defaults + wq_report.toml if present
//!   cargo run --release -- --port 8080               # override the listen port
//!   cargo run --release -- --config /etc/wq.toml     # explicit config file
//!
//! Environment (also read from .env):
//!   HOST, PORT, ENV, CORS_ORIGINS, WQP_BASE_URL, NWIS_SITE_URL,
//!   MAX_RECORDS_PER_REQUEST, REQUEST_TIMEOUT, WORKER_THREADS, LOG_LEVEL

use log::{error, info, warn};
use std::env;
use std::path::PathBuf;
use wq_report_service::config::Settings;
use wq_report_service::endpoint::{self, AppContext};
use wq_report_service::ingest::UsgsClient;
use wq_report_service::logger;

fn usage(program: &str) -> String {
    format!("Usage: {} [--port PORT] [--config PATH]", program)
}

fn main() {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut port: Option<u16> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => match args.get(i + 1).and_then(|p| p.parse().ok()) {
                Some(p) => {
                    port = Some(p);
                    i += 2;
                }
                None => {
                    eprintln!("Error: --port requires a port number");
                    std::process::exit(1);
                }
            },
            "--config" => match args.get(i + 1) {
                Some(path) => {
                    config_path = Some(PathBuf::from(path));
                    i += 2;
                }
                None => {
                    eprintln!("Error: --config requires a file path");
                    std::process::exit(1);
                }
            },
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("{}", usage(&args[0]));
                std::process::exit(1);
            }
        }
    }

    let mut settings = match Settings::load(config_path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(p) = port {
        settings.port = p;
    }

    if let Err(e) = logger::init(&settings.log_level) {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("{} v{} ({})", settings.app_name, settings.version, settings.environment);
    info!("   WQP:  {}", settings.wqp_base_url);
    info!("   NWIS: {}", settings.nwis_site_url);
    info!(
        "   Record cap: {}, upstream timeout: {} s",
        settings.max_records_per_request, settings.request_timeout_secs
    );
    if settings.is_production() && settings.cors_origins.iter().any(|o| o == "*") {
        warn!("CORS allows any origin in production");
    }

    let client = match UsgsClient::new(&settings) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = AppContext {
        settings,
        source: Box::new(client),
    };

    if let Err(e) = endpoint::start_server(ctx) {
        error!("Endpoint server error: {}", e);
        std::process::exit(1);
    }
}
