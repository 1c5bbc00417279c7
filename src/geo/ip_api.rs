//! ip-api.com provider
//!
//! `GET {base}/json/{ip}`. An empty address segment makes the API describe the
//! address the request came from, so a self-lookup is a single call.

use super::http::{endpoint, get_json};
use super::{GeoError, GeoProvider, GeoRecord, LookupTarget};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tracing::debug;

/// Response fields requested from the API
const FIELDS: &str = "status,message,country,regionName,city,isp,org,as,timezone,lat,lon,query";

/// Raw ip-api payload
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    #[serde(rename = "as")]
    asn: Option<String>,
    timezone: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    query: Option<String>,
}

impl IpApiResponse {
    fn into_record(self) -> Result<GeoRecord, GeoError> {
        if self.status.as_deref() != Some("success") {
            return Err(GeoError::Rejected(
                self.message
                    .unwrap_or_else(|| "lookup failed".to_string()),
            ));
        }

        Ok(GeoRecord {
            ip: self.query,
            country: self.country,
            region: self.region_name,
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

/// Client for ip-api.com
pub struct IpApiClient {
    http: HttpClient,
    base_url: String,
}

impl IpApiClient {
    /// Create a client against `base_url` (e.g. `http://ip-api.com`)
    #[must_use]
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl GeoProvider for IpApiClient {
    async fn lookup(&self, target: LookupTarget) -> Result<GeoRecord, GeoError> {
        let address = target.address().unwrap_or_default();
        let url = endpoint(&self.base_url, &["json", address])?;
        debug!("ip-api lookup: {url}");

        let response: IpApiResponse =
            get_json(self.http.get(url).query(&[("fields", FIELDS)])).await?;
        response.into_record()
    }

    fn name(&self) -> &'static str {
        "ip-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_payload_maps_all_fields() -> Result<(), Box<dyn std::error::Error>> {
        let raw = r#"{
            "status": "success",
            "country": "United States",
            "regionName": "Virginia",
            "city": "Ashburn",
            "isp": "Google LLC",
            "org": "Google Public DNS",
            "as": "AS15169 Google LLC",
            "timezone": "America/New_York",
            "lat": 39.03,
            "lon": -77.5,
            "query": "8.8.8.8"
        }"#;

        let record = serde_json::from_str::<IpApiResponse>(raw)?.into_record()?;
        assert_eq!(record.ip.as_deref(), Some("8.8.8.8"));
        assert_eq!(record.region.as_deref(), Some("Virginia"));
        assert_eq!(record.asn.as_deref(), Some("AS15169 Google LLC"));
        assert_eq!(record.coordinates(), Some((39.03, -77.5)));
        Ok(())
    }

    #[test]
    fn test_fail_status_is_rejected_with_reason() -> Result<(), serde_json::Error> {
        let raw = r#"{"status": "fail", "message": "private range", "query": "10.0.0.1"}"#;

        let result = serde_json::from_str::<IpApiResponse>(raw)?.into_record();
        match result {
            Err(GeoError::Rejected(reason)) => assert_eq!(reason, "private range"),
            other => panic!("expected rejection, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_region_code_does_not_shadow_region_name() -> Result<(), Box<dyn std::error::Error>> {
        let raw = r#"{
            "status": "success",
            "region": "CA",
            "regionName": "California",
            "query": "8.8.8.8"
        }"#;

        let record = serde_json::from_str::<IpApiResponse>(raw)?.into_record()?;
        assert_eq!(record.region.as_deref(), Some("California"));
        Ok(())
    }

    #[test]
    fn test_missing_status_is_rejected() -> Result<(), serde_json::Error> {
        let result = serde_json::from_str::<IpApiResponse>("{}")?.into_record();
        assert!(matches!(result, Err(GeoError::Rejected(_))));
        Ok(())
    }
}
