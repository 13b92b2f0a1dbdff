//! Process configuration, read once from the environment at boot.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use nexus_auth::cache::DEFAULT_TTL;
use nexus_observability::LogFormat;

pub const BIND_ADDR: &str = "NEXUS_BIND_ADDR";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DECISION_CACHE: &str = "NEXUS_DECISION_CACHE";
pub const DECISION_CACHE_TTL_SECS: &str = "NEXUS_DECISION_CACHE_TTL_SECS";
pub const SEED_DEMO_PRINCIPALS: &str = "NEXUS_SEED_DEMO_PRINCIPALS";
pub const LOG_FORMAT: &str = "NEXUS_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string. In-memory seeded state when absent.
    pub database_url: Option<String>,
    pub decision_cache: bool,
    pub decision_cache_ttl: Duration,
    pub seed_demo_principals: bool,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            decision_cache: true,
            decision_cache_ttl: DEFAULT_TTL,
            seed_demo_principals: true,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset or blank variables keep
    /// their defaults; anything unparsable is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(value) = get(BIND_ADDR) {
            config.bind_addr = value
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(BIND_ADDR, &value, format!("{e}")))?;
        }

        config.database_url = get(DATABASE_URL);

        if let Some(value) = get(DECISION_CACHE) {
            config.decision_cache = parse_flag(DECISION_CACHE, &value)?;
        }

        if let Some(value) = get(DECISION_CACHE_TTL_SECS) {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|_| {
                    ConfigError::invalid(DECISION_CACHE_TTL_SECS, &value, "expected whole seconds")
                })?;
            if secs == 0 {
                return Err(ConfigError::invalid(
                    DECISION_CACHE_TTL_SECS,
                    &value,
                    format!("must be positive; disable the cache with {DECISION_CACHE}=off"),
                ));
            }
            config.decision_cache_ttl = Duration::from_secs(secs);
        }

        if let Some(value) = get(SEED_DEMO_PRINCIPALS) {
            config.seed_demo_principals = parse_flag(SEED_DEMO_PRINCIPALS, &value)?;
        }

        if let Some(value) = get(LOG_FORMAT) {
            config.log_format = value
                .parse()
                .map_err(|e| ConfigError::invalid(LOG_FORMAT, &value, format!("{e}")))?;
        }

        Ok(config)
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, value, "expected on/off")),
    }
}
