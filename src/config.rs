//! Environment-driven configuration
//!
//! Everything is read once at startup through [`Config::from_env`] and
//! handed to the components that need it.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::charts::ChartStyle;

pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost:5432/earnings";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where dashboard pages are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis,
    Disabled,
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "simple" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            "none" | "off" | "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub ttl: Duration,
    pub redis_url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            ttl: Duration::from_secs(86_400),
            redis_url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

/// Settings for the narrative summary client.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl SummaryConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub port: u16,
    pub database_url: String,
    pub db_timeout: Duration,
    pub static_root: PathBuf,
    pub chart_style: ChartStyle,
    /// TrueType font for chart labels; system fonts are tried otherwise.
    pub chart_font_path: Option<PathBuf>,
    pub cache: CacheConfig,
    /// `None` when summaries are disabled or no API key is configured.
    pub summary: Option<SummaryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            port: 8080,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_timeout: Duration::from_secs(10),
            static_root: PathBuf::from("static"),
            chart_style: ChartStyle::Line,
            chart_font_path: None,
            cache: CacheConfig::default(),
            summary: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let summary = match get("OPENAI_API_KEY") {
            Some(api_key) if parse_or("SUMMARY_ENABLED", get("SUMMARY_ENABLED"), true)? => {
                Some(SummaryConfig {
                    api_key,
                    base_url: get("OPENAI_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                    model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                    timeout: Duration::from_secs(parse_or(
                        "SUMMARY_TIMEOUT_SECONDS",
                        get("SUMMARY_TIMEOUT_SECONDS"),
                        20u64,
                    )?),
                })
            }
            _ => None,
        };

        Ok(Self {
            environment: get("APP_ENV").unwrap_or(defaults.environment),
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            db_timeout: Duration::from_secs(parse_or(
                "DB_TIMEOUT_SECONDS",
                get("DB_TIMEOUT_SECONDS"),
                defaults.db_timeout.as_secs(),
            )?),
            static_root: get("STATIC_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_root),
            chart_style: parse_or("CHART_STYLE", get("CHART_STYLE"), defaults.chart_style)?,
            chart_font_path: get("CHART_FONT_PATH").map(PathBuf::from),
            cache: CacheConfig {
                backend: parse_or("CACHE_BACKEND", get("CACHE_BACKEND"), defaults.cache.backend)?,
                ttl: Duration::from_secs(parse_or(
                    "CACHE_TTL_SECONDS",
                    get("CACHE_TTL_SECONDS"),
                    defaults.cache.ttl.as_secs(),
                )?),
                redis_url: get("REDIS_URL").unwrap_or(defaults.cache.redis_url),
            },
            summary,
        })
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

pub fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}
