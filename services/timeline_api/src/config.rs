//! services/timeline_api/src/config.rs
//!
//! Defines the service's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use medical_timeline_core::{
    EnrichmentFailurePolicy, HourCycle, LoadSequencing, LoaderOptions, TimestampFormatter,
    ViewerZone,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database the service runs on an empty in-memory store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub cors_origin: String,
    pub enrichment_failure: EnrichmentFailurePolicy,
    pub enrichment_concurrency: usize,
    pub load_sequencing: LoadSequencing,
    pub viewer_zone: ViewerZone,
    pub viewer_hour_cycle: HourCycle,
    /// Mounted widgets untouched for this long are unmounted.
    pub widget_idle_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:8069".to_string());

        // --- Loader Behaviour ---
        let enrichment_failure = parse_or_default(&lookup, "ENRICHMENT_FAILURE_POLICY")?;
        let load_sequencing = parse_or_default(&lookup, "LOAD_SEQUENCING")?;

        let enrichment_concurrency = match lookup("ENRICHMENT_CONCURRENCY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "ENRICHMENT_CONCURRENCY".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    ))
                }
            },
            None => 1,
        };

        // --- Viewer Locale ---
        // A fixed offset overrides the named zone; with neither, the machine's zone is used.
        let viewer_zone = match lookup("VIEWER_UTC_OFFSET_MINUTES") {
            Some(raw) => {
                let minutes = raw.parse::<i32>().map_err(|e| {
                    ConfigError::InvalidValue("VIEWER_UTC_OFFSET_MINUTES".to_string(), e.to_string())
                })?;
                ViewerZone::from_offset_minutes(minutes).ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "VIEWER_UTC_OFFSET_MINUTES".to_string(),
                        format!("{} is outside ±24h", minutes),
                    )
                })?
            }
            None => parse_or_default(&lookup, "VIEWER_TIMEZONE")?,
        };
        let viewer_hour_cycle = parse_or_default(&lookup, "VIEWER_HOUR_CYCLE")?;

        // --- Widget Sessions ---
        let widget_idle_timeout = match lookup("WIDGET_IDLE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs >= 1 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "WIDGET_IDLE_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", raw),
                    ))
                }
            },
            None => Duration::from_secs(30 * 60),
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            enrichment_failure,
            enrichment_concurrency,
            load_sequencing,
            viewer_zone,
            viewer_hour_cycle,
            widget_idle_timeout,
        })
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            enrichment_failure: self.enrichment_failure,
            enrichment_concurrency: self.enrichment_concurrency,
        }
    }

    pub fn timestamp_formatter(&self) -> TimestampFormatter {
        TimestampFormatter::new(self.viewer_zone, self.viewer_hour_cycle)
    }
}

fn parse_or_default<T, F>(lookup: &F, name: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = String> + Default,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e)),
        None => Ok(T::default()),
    }
}
