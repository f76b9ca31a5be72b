use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read engine settings: {0}")]
    Env(#[from] envy::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub log_format: LogFormat,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    /// Upper bound for a single storage query.
    pub query_timeout: Duration,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Read from `DISCOVERY_*` variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Concurrent per-candidate storage reads within one call.
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
    #[serde(default = "default_next_video_limit")]
    pub next_video_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring_concurrency: default_scoring_concurrency(),
            next_video_limit: default_next_video_limit(),
        }
    }
}

fn default_scoring_concurrency() -> usize {
    16
}

fn default_next_video_limit() -> usize {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let database = DatabaseConfig {
            url,
            max_connections: parse_var("DB_MAX_CONNECTIONS", 8)?,
            min_connections: parse_var("DB_MIN_CONNECTIONS", 2)?,
            acquire_timeout: Duration::from_secs(parse_var("DB_ACQUIRE_TIMEOUT_SECS", 10)?),
            query_timeout: Duration::from_millis(parse_var("DB_QUERY_TIMEOUT_MS", 5000)?),
        };

        let engine: EngineConfig = envy::prefixed("DISCOVERY_").from_env()?;
        if engine.scoring_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "DISCOVERY_SCORING_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        let log_format = parse_var("LOG_FORMAT", LogFormat::Text)?;

        Ok(Config {
            database,
            engine,
            log_format,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
