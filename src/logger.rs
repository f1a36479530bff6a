/// Minimal stdout logger behind the `log` facade.
///
/// Lines look like `[2024-05-01T12:00:00+00:00] INFO - message`.

use chrono::{DateTime, Utc};
use log::{LevelFilter, Metadata, Record};

use crate::error::ConfigError;

pub struct ServiceLogger {
    level: LevelFilter,
}

impl log::Log for ServiceLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now: DateTime<Utc> = Utc::now();
            println!("[{}] {} - {}", now.to_rfc3339(), record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Maps a configured level name onto a filter. Case-insensitive.
pub fn parse_level(name: &str) -> Result<LevelFilter, ConfigError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Ok(LevelFilter::Trace),
        "DEBUG" => Ok(LevelFilter::Debug),
        "INFO" => Ok(LevelFilter::Info),
        "WARN" | "WARNING" => Ok(LevelFilter::Warn),
        "ERROR" => Ok(LevelFilter::Error),
        "OFF" => Ok(LevelFilter::Off),
        _ => Err(ConfigError::LogLevel(name.to_string())),
    }
}

/// Installs the logger process-wide. Calling it twice is harmless; the
/// first installation wins.
pub fn init(level_name: &str) -> Result<(), ConfigError> {
    let level = parse_level(level_name)?;
    let logger: &'static ServiceLogger = Box::leak(Box::new(ServiceLogger { level }));
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
    Ok(())
}
