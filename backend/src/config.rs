//! Environment configuration.
//!
//! Values come from the process environment, after loading `.env` if one
//! exists. CLI flags override them.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::store::file::DEFAULT_STORE_DIR;

pub const STORE_DIR_VAR: &str = "RESTMIGRATOR_STORE_DIR";
pub const REST_URL_VAR: &str = "RESTMIGRATOR_REST_URL";
pub const CONCURRENCY_VAR: &str = "RESTMIGRATOR_CONCURRENCY";
pub const PAGE_SIZE_VAR: &str = "RESTMIGRATOR_PAGE_SIZE";
pub const PORT_VAR: &str = "RESTMIGRATOR_PORT";

/// Runtime settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory of the flat-file stores
    pub store_dir: PathBuf,
    /// REST backend; when set, stores are opened over HTTP
    pub rest_url: Option<String>,
    pub concurrency: usize,
    /// Page size when walking a store as a source
    pub page_size: usize,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            rest_url: None,
            concurrency: 1,
            page_size: 50,
            port: 3000,
        }
    }
}

impl Settings {
    /// Load `.env`, then read the `RESTMIGRATOR_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build settings from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let concurrency = parse_or(get(CONCURRENCY_VAR), CONCURRENCY_VAR, defaults.concurrency)?;
        if concurrency == 0 {
            return Err(invalid(CONCURRENCY_VAR, "0"));
        }
        let page_size = parse_or(get(PAGE_SIZE_VAR), PAGE_SIZE_VAR, defaults.page_size)?;
        if page_size == 0 {
            return Err(invalid(PAGE_SIZE_VAR, "0"));
        }

        Ok(Self {
            store_dir: get(STORE_DIR_VAR).map(PathBuf::from).unwrap_or(defaults.store_dir),
            rest_url: get(REST_URL_VAR),
            concurrency,
            page_size,
            port: parse_or(get(PORT_VAR), PORT_VAR, defaults.port)?,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, var: &str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(var, &raw)),
    }
}

fn invalid(var: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue { var: var.to_string(), value: value.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            (STORE_DIR_VAR, "/tmp/stores"),
            (REST_URL_VAR, "http://localhost:4000"),
            (CONCURRENCY_VAR, " 4 "),
            (PORT_VAR, "8080"),
        ])
        .unwrap();

        assert_eq!(s.store_dir, PathBuf::from("/tmp/stores"));
        assert_eq!(s.rest_url.as_deref(), Some("http://localhost:4000"));
        assert_eq!(s.concurrency, 4);
        assert_eq!(s.page_size, 50);
        assert_eq!(s.port, 8080);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        assert_eq!(settings(&[(REST_URL_VAR, "  ")]).unwrap().rest_url, None);
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(matches!(
            settings(&[(PORT_VAR, "http")]),
            Err(ConfigError::InvalidValue { ref var, .. }) if var == PORT_VAR
        ));
        assert!(settings(&[(CONCURRENCY_VAR, "0")]).is_err());
        assert!(settings(&[(PAGE_SIZE_VAR, "-1")]).is_err());
    }
}
