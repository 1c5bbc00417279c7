//! Geolocation lookups
//!
//! A [`GeoProvider`] turns a [`LookupTarget`] into a [`GeoRecord`] with one
//! outbound call (two when a provider must resolve the public address first).

/// API Ninjas client
pub mod api_ninjas;
/// Shared HTTP plumbing for providers
pub mod http;
/// ip-api.com client
pub mod ip_api;

pub use api_ninjas::ApiNinjasClient;
pub use ip_api::IpApiClient;

use crate::config::{GeoProviderKind, Settings};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during a geolocation lookup
#[derive(Debug, Error)]
pub enum GeoError {
    /// Connection failure before any response arrived
    #[error("Network error: {0}")]
    Network(String),
    /// The request exceeded the client timeout
    #[error("Request timed out")]
    Timeout,
    /// Non-success HTTP status
    #[error("API error: {status} - {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Cleaned response body
        message: String,
    },
    /// Body was not the JSON we expected
    #[error("JSON error: {0}")]
    Json(String),
    /// The provider answered but reported a failed lookup
    #[error("Lookup rejected: {0}")]
    Rejected(String),
    /// The provider returned an empty record
    #[error("No data found for this IP")]
    NotFound,
    /// Missing provider configuration or API key
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
}

impl GeoError {
    /// Human-readable reason suitable for showing to the user, if there is one
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Rejected(reason) => Some(reason.clone()),
            Self::NotFound => Some("no data found for this IP".to_string()),
            Self::Timeout => Some("the geolocation service did not respond in time".to_string()),
            Self::Http { status, .. } => Some(format!("HTTP {status}")),
            Self::Network(_) | Self::Json(_) | Self::MissingConfig(_) => None,
        }
    }
}

/// What to look up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    /// A user-supplied address
    Address(String),
    /// The public address the request originates from
    SelfLookup,
}

impl LookupTarget {
    /// The address, or `None` for a self-lookup
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Address(addr) => Some(addr),
            Self::SelfLookup => None,
        }
    }
}

/// Parsed result of one successful lookup
///
/// Every field is optional because providers omit what they don't know.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecord {
    /// Address the record describes
    pub ip: Option<String>,
    /// Country name
    pub country: Option<String>,
    /// Region or state name
    pub region: Option<String>,
    /// City name
    pub city: Option<String>,
    /// Internet service provider
    pub isp: Option<String>,
    /// Organization owning the block
    pub org: Option<String>,
    /// Autonomous system, e.g. `AS15169 Google LLC`
    pub asn: Option<String>,
    /// IANA time zone name
    pub timezone: Option<String>,
    /// Latitude in degrees
    pub latitude: Option<f64>,
    /// Longitude in degrees
    pub longitude: Option<f64>,
}

impl GeoRecord {
    /// Both coordinates, when the provider returned them
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Interface for all geolocation providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GeoProvider: Send + Sync {
    /// Look up `target` and return the parsed record
    async fn lookup(&self, target: LookupTarget) -> Result<GeoRecord, GeoError>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}

/// Build the provider selected in `settings`.
///
/// # Errors
///
/// Returns `GeoError::MissingConfig` if the provider needs an API key that is absent.
pub fn provider_from_settings(settings: &Settings) -> Result<Arc<dyn GeoProvider>, GeoError> {
    let client = http::create_http_client(settings.geo_timeout());

    match settings.geo_provider {
        GeoProviderKind::IpApi => Ok(Arc::new(IpApiClient::new(
            client,
            settings.ip_api_base_url.clone(),
        ))),
        GeoProviderKind::ApiNinjas => {
            let api_key = settings
                .api_key
                .clone()
                .ok_or_else(|| GeoError::MissingConfig("API_KEY".to_string()))?;
            Ok(Arc::new(ApiNinjasClient::new(
                client,
                settings.api_ninjas_base_url.clone(),
                settings.ipify_url.clone(),
                api_key,
            )))
        }
    }
}
