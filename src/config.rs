use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::services::poller::{PollerOptions, DEFAULT_INTERVAL_MS};

pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:3000/graphql";
pub const DEFAULT_REST_BASE_URL: &str = "http://localhost:3000/";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;
pub const REMEMBER_ME_EXPIRY_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    pub graphql_url: String,
    pub rest_base_url: String,
    pub request_timeout: Duration,
    pub polling: PollerOptions,
    pub data_dir: PathBuf,
}

impl Settings {
    /// Reads `.env` when present, then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let request_timeout_ms = match get("REQUEST_TIMEOUT_MS") {
            Some(raw) => parse_number::<u64>("REQUEST_TIMEOUT_MS", &raw)?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        let interval_ms = match get("POLL_INTERVAL_MS") {
            Some(raw) => parse_number::<i64>("POLL_INTERVAL_MS", &raw)?,
            None => DEFAULT_INTERVAL_MS,
        };
        let enabled = match get("POLL_ENABLED") {
            Some(raw) => parse_flag("POLL_ENABLED", &raw)?,
            None => true,
        };
        let data_dir = get("INVOICE_DASH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let request_timeout = Duration::from_millis(request_timeout_ms);
        Ok(Settings {
            graphql_url: get("GRAPHQL_URL").unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string()),
            rest_base_url: get("API_URL").unwrap_or_else(|| DEFAULT_REST_BASE_URL.to_string()),
            request_timeout,
            polling: PollerOptions {
                enabled,
                interval_ms,
                fetch_timeout: Some(request_timeout),
            },
            data_dir,
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invoice-dash")
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| anyhow!("{} must be a number, got {:?}", key, raw))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be a boolean, got {:?}", key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings(&[("INVOICE_DASH_DATA_DIR", "/tmp/dash")]).unwrap();
        assert_eq!(settings.graphql_url, DEFAULT_GRAPHQL_URL);
        assert_eq!(settings.rest_base_url, DEFAULT_REST_BASE_URL);
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.polling.interval_ms, 5_000);
        assert!(settings.polling.enabled);
        assert_eq!(settings.polling.fetch_timeout, Some(Duration::from_secs(10)));
        assert_eq!(settings.data_dir, PathBuf::from("/tmp/dash"));
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = settings(&[
            ("GRAPHQL_URL", "https://api.example.com/graphql"),
            ("POLL_INTERVAL_MS", "-1"),
            ("POLL_ENABLED", "off"),
            ("REQUEST_TIMEOUT_MS", "2500"),
        ])
        .unwrap();
        assert_eq!(settings.graphql_url, "https://api.example.com/graphql");
        assert_eq!(settings.polling.interval_ms, -1);
        assert!(!settings.polling.enabled);
        assert_eq!(settings.request_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = settings(&[("POLL_INTERVAL_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL_MS"));
        let err = settings(&[("POLL_ENABLED", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("POLL_ENABLED"));
    }
}
