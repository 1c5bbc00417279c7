//! Configuration and settings management
//!
//! Loads settings from config files and environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cooldown between lookups for one user
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 10;
/// Upper bound on tracked users in the rate limiter
pub const RATE_LIMIT_MAX_USERS: u64 = 100_000;
/// Default timeout for geolocation API calls
pub const GEO_TIMEOUT_SECS: u64 = 10;
/// Default port of the liveness endpoint
pub const LIVENESS_PORT: u16 = 8080;

/// Default ip-api endpoint (the free tier is plain HTTP only)
pub const IP_API_BASE_URL: &str = "http://ip-api.com";
/// Default API Ninjas endpoint
pub const API_NINJAS_BASE_URL: &str = "https://api.api-ninjas.com";
/// Public IP echo service used for self-lookups on providers without auto-detection
pub const IPIFY_URL: &str = "https://api.ipify.org";

/// Which geolocation API answers lookups
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GeoProviderKind {
    /// ip-api.com, keyless, detects the caller's address on an empty query
    #[default]
    IpApi,
    /// api-ninjas.com, requires `API_KEY`
    ApiNinjas,
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub bot_token: Option<String>,

    /// API key for providers that need one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Geolocation backend
    #[serde(default)]
    pub geo_provider: GeoProviderKind,

    /// Timeout for a single outbound lookup, in seconds
    #[serde(default = "default_geo_timeout_secs")]
    pub geo_timeout_secs: u64,

    /// Per-user cooldown between lookups, in seconds
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// Maximum number of users tracked by the rate limiter
    #[serde(default = "default_rate_limit_max_users")]
    pub rate_limit_max_users: u64,

    /// Liveness endpoint port (hosting platforms usually inject `PORT`)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of ip-api
    #[serde(default = "default_ip_api_base_url")]
    pub ip_api_base_url: String,

    /// Base URL of API Ninjas
    #[serde(default = "default_api_ninjas_base_url")]
    pub api_ninjas_base_url: String,

    /// Public IP echo service
    #[serde(default = "default_ipify_url")]
    pub ipify_url: String,
}

const fn default_geo_timeout_secs() -> u64 {
    GEO_TIMEOUT_SECS
}

const fn default_rate_limit_cooldown_secs() -> u64 {
    RATE_LIMIT_COOLDOWN_SECS
}

const fn default_rate_limit_max_users() -> u64 {
    RATE_LIMIT_MAX_USERS
}

const fn default_port() -> u16 {
    LIVENESS_PORT
}

fn default_ip_api_base_url() -> String {
    IP_API_BASE_URL.to_string()
}

fn default_api_ninjas_base_url() -> String {
    API_NINJAS_BASE_URL.to_string()
}

fn default_ipify_url() -> String {
    IPIFY_URL.to_string()
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP_PORT=9000 ./target/ipgeo-bot` would set the `port` key
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables map to snake_case keys; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ipgeo_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings = Self::from_config(build_config()?)?;

        // Fallback: older deployments export the token as TELEGRAM_TOKEN
        if settings.bot_token.is_none() {
            settings.bot_token = non_empty(std::env::var("TELEGRAM_TOKEN").ok());
        }

        Ok(settings)
    }

    /// Deserialize settings from an already built `Config`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a value has the wrong type.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let mut settings: Self = config.try_deserialize()?;
        settings.bot_token = non_empty(settings.bot_token.take());
        settings.api_key = non_empty(settings.api_key.take());
        Ok(settings)
    }

    /// Names of required credentials that are still missing.
    #[must_use]
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bot_token.is_none() {
            missing.push("BOT_TOKEN");
        }
        if self.geo_provider == GeoProviderKind::ApiNinjas && self.api_key.is_none() {
            missing.push("API_KEY");
        }
        missing
    }

    /// Fail fast when a required credential is absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming every missing variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.missing_credentials();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }

    /// Bot token, empty if validation was skipped.
    #[must_use]
    pub fn bot_token(&self) -> &str {
        self.bot_token.as_deref().unwrap_or_default()
    }

    /// Timeout applied to every outbound lookup.
    #[must_use]
    pub const fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo_timeout_secs)
    }

    /// Cooldown between lookups for the same user.
    #[must_use]
    pub const fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn settings_with(overrides: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        Settings::from_config(builder.build()?)
    }

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let settings = settings_with(&[])?;

        assert_eq!(settings.bot_token, None);
        assert_eq!(settings.geo_provider, GeoProviderKind::IpApi);
        assert_eq!(settings.geo_timeout(), Duration::from_secs(10));
        assert_eq!(settings.rate_limit_cooldown(), Duration::from_secs(10));
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.ip_api_base_url, IP_API_BASE_URL);
        Ok(())
    }

    #[test]
    fn test_provider_and_numbers_parse_from_strings() -> Result<(), ConfigError> {
        let settings = settings_with(&[
            ("geo_provider", "api-ninjas"),
            ("geo_timeout_secs", "30"),
            ("port", "9000"),
        ])?;

        assert_eq!(settings.geo_provider, GeoProviderKind::ApiNinjas);
        assert_eq!(settings.geo_timeout_secs, 30);
        assert_eq!(settings.port, 9000);
        Ok(())
    }

    #[test]
    fn test_missing_credentials() -> Result<(), ConfigError> {
        let settings = settings_with(&[])?;
        assert_eq!(settings.missing_credentials(), vec!["BOT_TOKEN"]);
        assert!(settings.validate().is_err());

        let settings = settings_with(&[("bot_token", "123:abc")])?;
        assert!(settings.validate().is_ok());

        let settings = settings_with(&[("bot_token", "123:abc"), ("geo_provider", "api-ninjas")])?;
        assert_eq!(settings.missing_credentials(), vec!["API_KEY"]);

        let err = settings_with(&[("geo_provider", "api-ninjas")])?
            .validate()
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("BOT_TOKEN, API_KEY"));
        Ok(())
    }

    #[test]
    fn test_blank_token_counts_as_missing() -> Result<(), ConfigError> {
        let settings = settings_with(&[("bot_token", "   ")])?;
        assert_eq!(settings.bot_token, None);
        Ok(())
    }

    // Single test touching the process environment to avoid races
    #[test]
    fn test_config_env_loading() -> Result<(), ConfigError> {
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::set_var("RATE_LIMIT_COOLDOWN_SECS", "3");

        let settings = Settings::new()?;
        assert_eq!(settings.bot_token(), "dummy_token");
        assert_eq!(settings.rate_limit_cooldown_secs, 3);

        env::remove_var("TELEGRAM_TOKEN");
        env::remove_var("RATE_LIMIT_COOLDOWN_SECS");
        Ok(())
    }
}
