//! HTTP utilities for geolocation providers
//!
//! Provides common request/response handling shared by the provider clients.

use super::GeoError;
use reqwest::{Client as HttpClient, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Maximum number of characters of an error body kept in `GeoError::Http`
const ERROR_BODY_LIMIT: usize = 300;

/// Creates an HTTP client with the given request timeout.
///
/// The timeout covers the whole round trip, so a stalled API surfaces as
/// `GeoError::Timeout` instead of hanging the handler.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends a prepared request and parses the JSON response body.
///
/// # Errors
///
/// Returns `GeoError::Timeout` or `GeoError::Network` on transport failures,
/// `GeoError::Http` on non-success status codes, or `GeoError::Json` if the
/// body is not valid JSON for `T`.
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GeoError> {
    let response = request.send().await.map_err(map_transport_error)?;

    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;

    if !status.is_success() {
        return Err(GeoError::Http {
            status: status.as_u16(),
            message: clean_error_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| GeoError::Json(e.to_string()))
}

/// Appends path segments to `base`, percent-encoding each one.
///
/// An empty trailing segment yields a trailing slash, which ip-api reads as
/// "the caller's own address".
///
/// # Errors
///
/// Returns `GeoError::MissingConfig` if `base` is not a valid absolute URL.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url, GeoError> {
    let mut url = Url::parse(base)
        .map_err(|e| GeoError::MissingConfig(format!("invalid base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| GeoError::MissingConfig(format!("base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn map_transport_error(e: reqwest::Error) -> GeoError {
    if e.is_timeout() {
        GeoError::Timeout
    } else {
        GeoError::Network(e.to_string())
    }
}

/// Summarises an error body: HTML pages from proxies are dropped, long text is truncated.
fn clean_error_body(body: &str) -> String {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    if is_html {
        "Server returned HTML error page".to_string()
    } else if body.chars().count() > ERROR_BODY_LIMIT {
        let truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{truncated}... (truncated)")
    } else {
        body.trim().to_string()
    }
}
