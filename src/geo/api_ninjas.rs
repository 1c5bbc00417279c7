//! API Ninjas provider
//!
//! `GET {base}/v1/iplookup?address={ip}` with the key in `X-Api-Key`. The API
//! cannot detect the caller, so a self-lookup first asks ipify for the public
//! address and then looks that up.

use super::http::{endpoint, get_json};
use super::{GeoError, GeoProvider, GeoRecord, LookupTarget};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Raw API Ninjas payload
#[derive(Debug, Deserialize)]
struct ApiNinjasResponse {
    is_valid: Option<bool>,
    #[serde(alias = "ip")]
    address: Option<String>,
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    #[serde(alias = "organization")]
    org: Option<String>,
    #[serde(alias = "as")]
    asn: Option<String>,
    timezone: Option<String>,
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lon: Option<f64>,
}

impl ApiNinjasResponse {
    fn into_record(self) -> Result<GeoRecord, GeoError> {
        if self.is_valid == Some(false) {
            return Err(GeoError::Rejected("invalid IP address".to_string()));
        }

        Ok(GeoRecord {
            ip: self.address,
            country: self.country,
            region: self.region,
            city: self.city,
            isp: self.isp,
            org: self.org,
            asn: self.asn,
            timezone: self.timezone,
            latitude: self.lat,
            longitude: self.lon,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PublicIp {
    ip: String,
}

/// Client for api-ninjas.com
pub struct ApiNinjasClient {
    http: HttpClient,
    base_url: String,
    ipify_url: String,
    api_key: String,
}

impl ApiNinjasClient {
    /// Create a client; `ipify_url` is only used for self-lookups
    #[must_use]
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        ipify_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            ipify_url: ipify_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Resolve the public address of this host.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and JSON errors from ipify.
    pub async fn public_ip(&self) -> Result<String, GeoError> {
        let request = self.http.get(&self.ipify_url).query(&[("format", "json")]);
        let public: PublicIp = get_json(request).await?;
        debug!("Resolved public address {}", public.ip);
        Ok(public.ip)
    }

    async fn lookup_address(&self, address: &str) -> Result<GeoRecord, GeoError> {
        let url = endpoint(&self.base_url, &["v1", "iplookup"])?;
        let request = self
            .http
            .get(url)
            .query(&[("address", address)])
            .header(API_KEY_HEADER, &self.api_key);

        let raw: Value = get_json(request).await?;
        if is_empty_payload(&raw) {
            return Err(GeoError::NotFound);
        }

        serde_json::from_value::<ApiNinjasResponse>(raw)
            .map_err(|e| GeoError::Json(e.to_string()))?
            .into_record()
    }
}

fn is_empty_payload(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl GeoProvider for ApiNinjasClient {
    async fn lookup(&self, target: LookupTarget) -> Result<GeoRecord, GeoError> {
        match target {
            LookupTarget::Address(address) => self.lookup_address(&address).await,
            LookupTarget::SelfLookup => {
                let address = self.public_ip().await?;
                self.lookup_address(&address).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "api-ninjas"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_field_names_are_accepted() -> Result<(), Box<dyn std::error::Error>> {
        let raw = r#"{"ip": "1.1.1.1", "latitude": -33.49, "longitude": 143.21, "country": "Australia"}"#;

        let record = serde_json::from_str::<ApiNinjasResponse>(raw)?.into_record()?;
        assert_eq!(record.ip.as_deref(), Some("1.1.1.1"));
        assert_eq!(record.coordinates(), Some((-33.49, 143.21)));
        Ok(())
    }

    #[test]
    fn test_invalid_address_is_rejected() -> Result<(), serde_json::Error> {
        let result = serde_json::from_str::<ApiNinjasResponse>(r#"{"is_valid": false}"#)?
            .into_record();
        assert!(matches!(result, Err(GeoError::Rejected(_))));
        Ok(())
    }

    #[test]
    fn test_empty_payload_detection() {
        assert!(is_empty_payload(&Value::Null));
        assert!(is_empty_payload(&serde_json::json!({})));
        assert!(is_empty_payload(&serde_json::json!([])));
        assert!(!is_empty_payload(&serde_json::json!({"is_valid": true})));
    }
}
