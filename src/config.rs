/// Service settings loader - defaults, wq_report.toml, then environment.
///
/// Settings are built once in `main` and handed to the endpoint by
/// reference; nothing in the crate reads the environment after startup.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default config file, looked up in the current working directory.
pub const DEFAULT_CONFIG_PATH: &str = "wq_report.toml";

/// Runtime settings for the reporting service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub version: String,
    pub environment: String,

    // HTTP listener
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,

    // Remote USGS services
    pub wqp_base_url: String,
    pub nwis_site_url: String,
    pub max_records_per_request: usize,
    pub request_timeout_secs: u64,

    // Request workers
    pub worker_threads: usize,

    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "USGS Water Quality Reporting API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            wqp_base_url: "https://www.waterqualitydata.us".to_string(),
            nwis_site_url: "https://waterservices.usgs.gov/nwis/site/".to_string(),
            max_records_per_request: 10_000,
            request_timeout_secs: 30,
            worker_threads: 8,
            log_level: "INFO".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings: defaults, then the TOML file (if it exists), then
    /// environment variables (after reading `.env`).
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// default `wq_report.toml` is optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Parses a TOML settings file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_toml(&contents, &display)
    }

    fn from_toml(contents: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Applies environment overrides through `lookup` (the real process
    /// environment in production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = lookup("ENV") {
            self.environment = v;
        }
        if let Some(v) = lookup("HOST") {
            self.host = v;
        }
        parse_override(&lookup, "PORT", &mut self.port)?;
        if let Some(v) = lookup("CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = lookup("WQP_BASE_URL") {
            self.wqp_base_url = v;
        }
        if let Some(v) = lookup("NWIS_SITE_URL") {
            self.nwis_site_url = v;
        }
        parse_override(&lookup, "MAX_RECORDS_PER_REQUEST", &mut self.max_records_per_request)?;
        parse_override(&lookup, "REQUEST_TIMEOUT", &mut self.request_timeout_secs)?;
        parse_override(&lookup, "WORKER_THREADS", &mut self.worker_threads)?;
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    /// `host:port` for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn parse_override<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw.trim().parse().map_err(|_| ConfigError::EnvValue {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}
