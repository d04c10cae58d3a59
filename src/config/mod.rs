//! Application configuration management

use std::env;

use anyhow::{Context, Result, bail};

use crate::graphql::connection::DEFAULT_PAGE_LIMIT;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable, colored
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("Invalid LOG_FORMAT '{}', expected 'pretty' or 'json'", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Server host to bind
    pub host: String,

    /// Server port
    pub port: u16,

    /// SQLite URL, e.g. `sqlite:relaykit.db` or `sqlite::memory:`
    pub database_url: String,

    /// Default `first` for connection fields
    pub page_limit: i64,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: "sqlite:relaykit.db".to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let page_limit = match lookup("PAGE_LIMIT") {
            Some(v) => v.parse().context("Invalid PAGE_LIMIT")?,
            None => defaults.page_limit,
        };
        if page_limit < 0 {
            bail!("PAGE_LIMIT must not be negative");
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),

            port: match lookup("PORT") {
                Some(v) => v.parse().context("Invalid PORT")?,
                None => defaults.port,
            },

            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),

            page_limit,

            log_format: match lookup("LOG_FORMAT") {
                Some(v) => v.parse()?,
                None => defaults.log_format,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 3001);
        assert_eq!(config.page_limit, 10);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("PAGE_LIMIT", "25"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.page_limit, 25);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PAGE_LIMIT", "-1")])).is_err());
        assert!(Config::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
