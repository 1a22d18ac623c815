//! Runtime configuration
//!
//! Settings come from `MP_CHALLENGE_*` environment variables, optionally
//! seeded from a `.env` file. Every setting has a default; an empty variable
//! counts as unset.

use chrono::format::{Item, StrftimeItems};
use log::debug;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cache::DEFAULT_TTL;
use crate::data::normalize::DEFAULT_DATE_FORMAT;
use crate::data::remote::{DEFAULT_TIMEOUT, DEFAULT_UPSTREAM_URL};
use crate::table::DEFAULT_PER_PAGE;

pub const UPSTREAM_URL_VAR: &str = "MP_CHALLENGE_UPSTREAM_URL";
pub const TIMEOUT_VAR: &str = "MP_CHALLENGE_TIMEOUT_SECS";
pub const CACHE_TTL_VAR: &str = "MP_CHALLENGE_CACHE_TTL_SECS";
pub const CACHE_DIR_VAR: &str = "MP_CHALLENGE_CACHE_DIR";
pub const REQUIRE_LOGIN_VAR: &str = "MP_CHALLENGE_REQUIRE_LOGIN";
pub const DATE_FORMAT_VAR: &str = "MP_CHALLENGE_DATE_FORMAT";
pub const PER_PAGE_VAR: &str = "MP_CHALLENGE_PER_PAGE";
pub const LOG_FILE_VAR: &str = "MP_CHALLENGE_LOG_FILE";

/// A variable was set to something unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn new(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub upstream_url: String,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    /// `None` selects the platform cache directory
    pub cache_dir: Option<PathBuf>,
    pub require_login: bool,
    pub date_format: String,
    pub per_page: usize,
    /// `None` logs to stderr
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_TTL,
            cache_dir: None,
            require_login: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            per_page: DEFAULT_PER_PAGE,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(url) = get(UPSTREAM_URL_VAR) {
            config.upstream_url = parse_url(UPSTREAM_URL_VAR, &url)?;
        }
        if let Some(secs) = get(TIMEOUT_VAR) {
            let secs = parse_number(TIMEOUT_VAR, &secs)?;
            if secs == 0 {
                return Err(ConfigError::new(TIMEOUT_VAR, "0", "must be at least 1"));
            }
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = get(CACHE_TTL_VAR) {
            config.cache_ttl = Duration::from_secs(parse_number(CACHE_TTL_VAR, &secs)?);
        }
        if let Some(dir) = get(CACHE_DIR_VAR) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = get(REQUIRE_LOGIN_VAR) {
            config.require_login = parse_bool(REQUIRE_LOGIN_VAR, &flag)?;
        }
        if let Some(format) = get(DATE_FORMAT_VAR) {
            config.date_format = parse_date_format(DATE_FORMAT_VAR, &format)?;
        }
        if let Some(n) = get(PER_PAGE_VAR) {
            let n = parse_number(PER_PAGE_VAR, &n)?;
            config.per_page = usize::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::new(PER_PAGE_VAR, &n.to_string(), "must be at least 1"))?;
        }
        if let Some(path) = get(LOG_FILE_VAR) {
            config.log_file = Some(PathBuf::from(path));
        }

        debug!("configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Replaces the upstream URL, validating it the same way as the environment value
    pub fn with_upstream_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.upstream_url = parse_url(UPSTREAM_URL_VAR, url)?;
        Ok(self)
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::new(key, value, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(ConfigError::new(
            key,
            value,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|e| ConfigError::new(key, value, e.to_string()))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::new(key, value, "expected true or false")),
    }
}

fn parse_date_format(key: &'static str, value: &str) -> Result<String, ConfigError> {
    if StrftimeItems::new(value).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::new(key, value, "not a valid strftime format"));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.upstream_url, "https://cspf-dev-challenge.herokuapp.com/");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.per_page, 5);
        assert!(!config.require_login);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = load(&[
            (UPSTREAM_URL_VAR, "http://127.0.0.1:8080/data"),
            (TIMEOUT_VAR, "5"),
            (CACHE_TTL_VAR, "60"),
            (CACHE_DIR_VAR, "/tmp/mp"),
            (REQUIRE_LOGIN_VAR, "TRUE"),
            (DATE_FORMAT_VAR, "%Y-%m-%d"),
            (PER_PAGE_VAR, "20"),
            (LOG_FILE_VAR, "/tmp/mp.log"),
        ])
        .unwrap();

        assert_eq!(config.upstream_url, "http://127.0.0.1:8080/data");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/mp")));
        assert!(config.require_login);
        assert_eq!(config.date_format, "%Y-%m-%d");
        assert_eq!(config.per_page, 20);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/mp.log")));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = load(&[(TIMEOUT_VAR, "  "), (DATE_FORMAT_VAR, "")]).unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.date_format, DEFAULT_DATE_FORMAT);
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[(CACHE_TTL_VAR, "an hour")]).unwrap_err();
        assert_eq!(err.key, CACHE_TTL_VAR);
        assert_eq!(err.value, "an hour");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(load(&[(TIMEOUT_VAR, "0")]).is_err());
    }

    #[test]
    fn test_zero_per_page_rejected() {
        assert!(load(&[(PER_PAGE_VAR, "0")]).is_err());
    }

    #[test]
    fn test_invalid_bool() {
        let err = load(&[(REQUIRE_LOGIN_VAR, "maybe")]).unwrap_err();
        assert_eq!(err.key, REQUIRE_LOGIN_VAR);
    }

    #[test]
    fn test_invalid_date_format() {
        assert!(load(&[(DATE_FORMAT_VAR, "%Q")]).is_err());
    }

    #[test]
    fn test_invalid_url() {
        assert!(load(&[(UPSTREAM_URL_VAR, "not a url")]).is_err());
        assert!(load(&[(UPSTREAM_URL_VAR, "ftp://example.com/")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default()
            .with_upstream_url("http://localhost:1/")
            .unwrap()
            .with_cache_dir("/tmp/x");
        assert_eq!(config.upstream_url, "http://localhost:1/");
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/x")));
    }
}
