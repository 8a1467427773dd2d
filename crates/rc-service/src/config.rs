//! Room Controller configuration.
//!
//! Configuration is loaded from environment variables. The signing secret
//! is redacted in Debug output.

use crate::network::NetworkMode;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default recording backend base URL.
pub const DEFAULT_RECORD_SERVICE_URL: &str = "http://localhost:8882";

/// Default recording backend request timeout in seconds.
pub const DEFAULT_RECORD_TIMEOUT_SECONDS: u64 = 15;

/// Maximum recording backend request timeout in seconds.
pub const MAX_RECORD_TIMEOUT_SECONDS: u64 = 120;

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 10;

/// Minimum signing secret length for HMAC-SHA256 (32 bytes).
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// ICE servers handed to browsers when none are configured.
pub const DEFAULT_ICE_SERVER_URLS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:global.stun.twilio.com:3478?transport=udp",
];

/// Room Controller configuration.
#[derive(Clone)]
pub struct Config {
    /// HS256 signing secret for the `jwt` session cookie.
    pub jwt_secret: SecretString,

    /// Server bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Path prefix used when building redirects (default: "").
    pub base_url: String,

    /// Media topology, selected once at startup.
    pub network_mode: NetworkMode,

    /// Recording backend base URL.
    pub record_service_url: String,

    /// Recording backend request timeout.
    pub record_timeout: Duration,

    /// Leeway applied to `exp`, `nbf` and `iat`.
    pub jwt_clock_skew: Duration,

    /// ICE server URLs handed to browsers.
    pub ice_server_urls: Vec<String>,

    /// Graceful shutdown drain period.
    pub drain_period: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("jwt_secret", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("base_url", &self.base_url)
            .field("network_mode", &self.network_mode)
            .field("record_service_url", &self.record_service_url)
            .field("record_timeout", &self.record_timeout)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("ice_server_urls", &self.ice_server_urls)
            .field("drain_period", &self.drain_period)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let jwt_secret = SecretString::from(
            vars.get("RC_JWT_SECRET")
                .ok_or_else(|| ConfigError::MissingEnvVar("RC_JWT_SECRET".to_string()))?
                .clone(),
        );
        if jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "RC_JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} bytes"
            )));
        }

        let bind_address = vars
            .get("RC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let base_url = vars
            .get("RC_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let network_mode = match vars.get("RC_NETWORK_TYPE") {
            Some(value) => value.parse().map_err(ConfigError::InvalidValue)?,
            None => NetworkMode::Mesh,
        };

        let record_service_url = vars
            .get("RC_RECORD_SERVICE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_RECORD_SERVICE_URL.to_string());

        let record_timeout_secs = parse_bounded(
            vars,
            "RC_RECORD_TIMEOUT_SECONDS",
            DEFAULT_RECORD_TIMEOUT_SECONDS,
            MAX_RECORD_TIMEOUT_SECONDS,
        )?;

        let clock_skew_secs = parse_bounded(
            vars,
            "RC_JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            MAX_CLOCK_SKEW.as_secs(),
        )?;

        let ice_server_urls: Vec<String> = vars
            .get("RC_ICE_SERVER_URLS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let ice_server_urls = if ice_server_urls.is_empty() {
            DEFAULT_ICE_SERVER_URLS.iter().map(ToString::to_string).collect()
        } else {
            ice_server_urls
        };

        let drain_secs = vars
            .get("RC_DRAIN_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DRAIN_SECONDS);

        Ok(Config {
            jwt_secret,
            bind_address,
            base_url,
            network_mode,
            record_service_url,
            record_timeout: Duration::from_secs(record_timeout_secs),
            jwt_clock_skew: Duration::from_secs(clock_skew_secs),
            ice_server_urls,
            drain_period: Duration::from_secs(drain_secs),
        })
    }
}

/// Parse an optional positive integer no larger than `max`.
fn parse_bounded(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{name} must be a valid integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 || value > max {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must be between 1 and {max}, got {value}"
        )));
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-0123456789-abcdefghijklmnop";

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([("RC_JWT_SECRET".to_string(), TEST_SECRET.to_string())])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.jwt_secret.expose_secret(), TEST_SECRET);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.base_url, "");
        assert_eq!(config.network_mode, NetworkMode::Mesh);
        assert_eq!(config.record_service_url, DEFAULT_RECORD_SERVICE_URL);
        assert_eq!(config.record_timeout, Duration::from_secs(15));
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert_eq!(config.ice_server_urls.len(), 2);
        assert_eq!(config.drain_period, Duration::from_secs(DEFAULT_DRAIN_SECONDS));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("RC_BIND_ADDRESS".to_string(), "127.0.0.1:4000".to_string());
        vars.insert("RC_BASE_URL".to_string(), "/calls/".to_string());
        vars.insert("RC_NETWORK_TYPE".to_string(), "sfu".to_string());
        vars.insert(
            "RC_RECORD_SERVICE_URL".to_string(),
            "http://recorder:9000/".to_string(),
        );
        vars.insert("RC_RECORD_TIMEOUT_SECONDS".to_string(), "5".to_string());
        vars.insert("RC_JWT_CLOCK_SKEW_SECONDS".to_string(), "60".to_string());
        vars.insert(
            "RC_ICE_SERVER_URLS".to_string(),
            "stun:a.example:3478, turn:b.example:3478,".to_string(),
        );
        vars.insert("RC_DRAIN_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:4000");
        assert_eq!(config.base_url, "/calls");
        assert_eq!(config.network_mode, NetworkMode::Sfu);
        assert_eq!(config.record_service_url, "http://recorder:9000");
        assert_eq!(config.record_timeout, Duration::from_secs(5));
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(60));
        assert_eq!(
            config.ice_server_urls,
            vec!["stun:a.example:3478", "turn:b.example:3478"]
        );
        assert_eq!(config.drain_period, Duration::ZERO);
    }

    #[test]
    fn test_from_vars_missing_jwt_secret() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "RC_JWT_SECRET"));
    }

    #[test]
    fn test_from_vars_rejects_short_jwt_secret() {
        let vars = HashMap::from([("RC_JWT_SECRET".to_string(), "short".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_rejects_unknown_network_type() {
        let mut vars = base_vars();
        vars.insert("RC_NETWORK_TYPE".to_string(), "p2p".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(msg)) if msg.contains("p2p")
        ));
    }

    #[test]
    fn test_from_vars_rejects_out_of_range_values() {
        for (name, value) in [
            ("RC_RECORD_TIMEOUT_SECONDS", "0"),
            ("RC_RECORD_TIMEOUT_SECONDS", "121"),
            ("RC_JWT_CLOCK_SKEW_SECONDS", "601"),
            ("RC_JWT_CLOCK_SKEW_SECONDS", "soon"),
        ] {
            let mut vars = base_vars();
            vars.insert(name.to_string(), value.to_string());
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidValue(_))),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(TEST_SECRET));
    }
}
