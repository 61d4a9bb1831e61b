//! Environment-based configuration
//!
//! Handles:
//! - Telemetry API credentials and endpoints
//! - InfluxDB connection settings
//! - Poll pacing (interval, jitter, request timeout)
//!
//! Values are read from the process environment (optionally seeded from a
//! `.env` file by the binary). Required values that are missing prevent startup.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 14_400;
pub const DEFAULT_API_URL: &str = "https://owner-api.teslamotors.com/";
pub const DEFAULT_AUTH_URL: &str = "https://auth.tesla.com/";
pub const DEFAULT_QUERY_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_QUERY_JITTER_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub tesla: TeslaConfig,
    pub influx: InfluxConfig,
    pub polling: PollingConfig,
    pub verbose: bool,
}

#[derive(Clone)]
pub struct TeslaConfig {
    pub refresh_token: String,
    /// Allow-list of vehicle ids; empty means "track the whole fleet"
    pub vehicles: Vec<String>,
    pub token_ttl: Duration,
    pub api_url: String,
    pub auth_url: String,
}

#[derive(Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub interval: Duration,
    pub jitter: Duration,
    pub request_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_QUERY_INTERVAL_MS),
            jitter: Duration::from_millis(DEFAULT_QUERY_JITTER_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

// Secrets never reach the logs
impl fmt::Debug for TeslaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeslaConfig")
            .field("refresh_token", &"<redacted>")
            .field("vehicles", &self.vehicles)
            .field("token_ttl", &self.token_ttl)
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl CollectorConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let millis = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            parse_u64(key, get(key), default).map(Duration::from_millis)
        };

        let tesla = TeslaConfig {
            refresh_token: required("TESLA_REFRESH_TOKEN")?,
            vehicles: get("TESLA_VEHICLES")
                .map(|raw| parse_vehicle_list(&raw))
                .unwrap_or_default(),
            token_ttl: Duration::from_secs(parse_u64(
                "TESLA_TOKEN_TTL",
                get("TESLA_TOKEN_TTL"),
                DEFAULT_TOKEN_TTL_SECS,
            )?),
            api_url: with_trailing_slash(get("TESLA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into())),
            auth_url: with_trailing_slash(get("TESLA_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.into())),
        };

        let influx = InfluxConfig {
            url: required("INFLUXDB_URL")?.trim_end_matches('/').to_string(),
            token: required("INFLUXDB_TOKEN")?,
            org: required("INFLUXDB_ORG")?,
            bucket: required("INFLUXDB_BUCKET")?,
        };

        let polling = PollingConfig {
            interval: millis("QUERY_INTERVAL", DEFAULT_QUERY_INTERVAL_MS)?,
            jitter: millis("QUERY_JITTER", DEFAULT_QUERY_JITTER_MS)?,
            request_timeout: millis("REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_MS)?,
        };

        Ok(Self {
            tesla,
            influx,
            polling,
            verbose: get("VERBOSE").as_deref() == Some("true"),
        })
    }
}

fn parse_u64(key: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_vehicle_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TESLA_REFRESH_TOKEN", "refresh-abc"),
            ("INFLUXDB_URL", "http://influx:8086/"),
            ("INFLUXDB_TOKEN", "influx-token"),
            ("INFLUXDB_ORG", "home"),
            ("INFLUXDB_BUCKET", "tesla"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<CollectorConfig, ConfigError> {
        CollectorConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();

        assert!(config.tesla.vehicles.is_empty());
        assert_eq!(config.tesla.token_ttl, Duration::from_secs(14_400));
        assert_eq!(config.tesla.api_url, DEFAULT_API_URL);
        assert_eq!(config.tesla.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.influx.url, "http://influx:8086");
        assert_eq!(config.polling, PollingConfig::default());
        assert!(!config.verbose);
    }

    #[test]
    fn test_missing_required_value() {
        let mut env = base_env();
        env.remove("INFLUXDB_BUCKET");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("INFLUXDB_BUCKET"));

        let mut env = base_env();
        env.insert("TESLA_REFRESH_TOKEN", "");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("TESLA_REFRESH_TOKEN"));
    }

    #[test]
    fn test_overrides_and_vehicle_list() {
        let mut env = base_env();
        env.insert("TESLA_VEHICLES", "111, 222,,333");
        env.insert("TESLA_API_URL", "http://localhost:9000");
        env.insert("QUERY_INTERVAL", "60000");
        env.insert("QUERY_JITTER", "0");
        env.insert("VERBOSE", "true");

        let config = load(&env).unwrap();
        assert_eq!(config.tesla.vehicles, vec!["111", "222", "333"]);
        assert_eq!(config.tesla.api_url, "http://localhost:9000/");
        assert_eq!(config.polling.interval, Duration::from_secs(60));
        assert_eq!(config.polling.jitter, Duration::ZERO);
        assert!(config.verbose);
    }

    #[test]
    fn test_invalid_number() {
        let mut env = base_env();
        env.insert("TESLA_TOKEN_TTL", "four hours");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: "TESLA_TOKEN_TTL", .. }
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("refresh-abc"));
        assert!(!rendered.contains("influx-token"));
    }
}
