//! Typed configuration, loaded from the environment variables named in
//! spec.md §6 (`LOG_LEVEL`, `RATE_LIMIT_PER_MINUTE`, `RATE_LIMIT_BURST`,
//! `CORS_ALLOWED_ORIGINS`, durable-cache location/credentials).
//!
//! This crate is deliberately out of spec.md's core scope (§1 lists
//! "configuration loading" among external collaborators) but is carried
//! anyway as ambient infrastructure, the way `dashflow`'s binaries build a
//! typed config struct by hand from `std::env::var` rather than pulling in
//! a config-file crate.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub rate_limit_per_minute: usize,
    pub rate_limit_burst: usize,
    pub cors_allowed_origins: Vec<String>,
    pub cache_dir: PathBuf,
    pub durable_cache_ttl: Duration,
    pub api_key: Option<String>,
}

impl Config {
    /// Loads configuration from the environment, applying the documented
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env_or("LOG_LEVEL", "info"),
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 30)?,
            rate_limit_burst: parse_env("RATE_LIMIT_BURST", 5)?,
            cors_allowed_origins: env_or("CORS_ALLOWED_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            cache_dir: PathBuf::from(env_or("CACHE_DIR", "./.cache")),
            durable_cache_ttl: Duration::from_secs(parse_env("CACHE_TTL_SECONDS", 86_400u64)?),
            api_key: std::env::var("API_KEY").ok(),
        })
    }
}

fn env_or(var: &'static str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("RATE_LIMIT_PER_MINUTE");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.rate_limit_per_minute, 30);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn invalid_numeric_value_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RATE_LIMIT_BURST", "not-a-number");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "RATE_LIMIT_BURST", .. }));
        std::env::remove_var("RATE_LIMIT_BURST");
    }
}
