//! Bot UI components
//!
//! Contains keyboards, text messages, and the geolocation record formatter.

use crate::geo::GeoRecord;
use html_escape::encode_text;
use reqwest::Url;
use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Callback constants
// ─────────────────────────────────────────────────────────────────────────────

/// Callback data of the "My IP" button
pub const MY_IP_CALLBACK: &str = "my_ip";

/// Placeholder for fields the provider did not return
pub const NOT_AVAILABLE: &str = "N/A";

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for bot view rendering
///
/// Provides the static texts shown to users.
pub trait BotView {
    /// Reply to `/start`
    fn welcome_message() -> &'static str;

    /// Wrong number of `/ip` arguments
    fn usage_error() -> &'static str;

    /// Plain text that is not an IP address
    fn not_an_address() -> &'static str;

    /// Request rejected by the rate limiter
    fn rate_limited(retry_after: Duration) -> String;

    /// Upstream lookup failed
    fn lookup_failed(reason: Option<&str>) -> String;

    /// Label of the self-lookup button
    fn my_ip_button() -> &'static str;

    /// Label of the map link button
    fn map_button() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English implementation of `BotView`
pub struct DefaultBotView;

impl BotView for DefaultBotView {
    fn welcome_message() -> &'static str {
        "👋 <b>Welcome!</b>\n\n\
         Send me an IP address and I will return its location info.\n\n\
         • <code>/ip 8.8.8.8</code> looks up an address\n\
         • <b>📍 My IP</b> shows where this bot is connecting from"
    }

    fn usage_error() -> &'static str {
        "⚠️ Usage: <code>/ip &lt;ip-address&gt;</code>\nExample: <code>/ip 8.8.8.8</code>"
    }

    fn not_an_address() -> &'static str {
        "🤔 That doesn't look like an IP address. Try <code>/ip 8.8.8.8</code>."
    }

    fn rate_limited(retry_after: Duration) -> String {
        // Round up so we never tell the user to wait 0 seconds
        let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
        format!("⏳ Please wait {} second(s) before the next lookup.", secs.max(1))
    }

    fn lookup_failed(reason: Option<&str>) -> String {
        match reason {
            Some(reason) => format!(
                "❌ Sorry, the lookup failed: {}",
                encode_text(reason)
            ),
            None => "❌ Sorry, the lookup failed. Please try again later.".to_string(),
        }
    }

    fn my_ip_button() -> &'static str {
        "📍 My IP"
    }

    fn map_button() -> &'static str {
        "🗺 Open in Maps"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatter
// ─────────────────────────────────────────────────────────────────────────────

/// Rendered lookup result
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayText {
    /// Telegram HTML text
    pub text: String,
    /// Map link, present only when both coordinates are known
    pub map_url: Option<String>,
}

/// Google Maps link for a coordinate pair
#[must_use]
pub fn map_url(latitude: f64, longitude: f64) -> String {
    format!("https://www.google.com/maps?q={latitude},{longitude}")
}

/// Render a lookup result for `ip`.
///
/// Deterministic: the same input always yields the same text. Missing fields
/// are shown as `N/A`, all values are HTML-escaped.
///
/// # Examples
///
/// ```
/// use ipgeo_bot::bot::views::format_record;
/// use ipgeo_bot::geo::GeoRecord;
///
/// let record = GeoRecord {
///     country: Some("United States".to_string()),
///     ..GeoRecord::default()
/// };
/// let display = format_record("8.8.8.8", &record);
/// assert!(display.text.contains("United States"));
/// assert!(display.map_url.is_none());
/// ```
#[must_use]
pub fn format_record(ip: &str, record: &GeoRecord) -> DisplayText {
    let text = format!(
        "🌍 <b>IP:</b> {}\n\
         🏳 <b>Country:</b> {}\n\
         📍 <b>Region:</b> {}\n\
         🏙 <b>City:</b> {}\n\
         📡 <b>ISP:</b> {}\n\
         🏢 <b>Organization:</b> {}\n\
         🔢 <b>ASN:</b> {}\n\
         🕒 <b>Timezone:</b> {}\n\
         📌 <b>Latitude:</b> {}\n\
         📌 <b>Longitude:</b> {}",
        encode_text(ip),
        text_field(record.country.as_deref()),
        text_field(record.region.as_deref()),
        text_field(record.city.as_deref()),
        text_field(record.isp.as_deref()),
        text_field(record.org.as_deref()),
        text_field(record.asn.as_deref()),
        text_field(record.timezone.as_deref()),
        number_field(record.latitude),
        number_field(record.longitude),
    );

    DisplayText {
        text,
        map_url: record.coordinates().map(|(lat, lon)| map_url(lat, lon)),
    }
}

fn text_field(value: Option<&str>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| encode_text(v).into_owned())
}

fn number_field(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// Keyboard shown under the welcome message
#[must_use]
pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        DefaultBotView::my_ip_button(),
        MY_IP_CALLBACK,
    )]])
}

/// Keyboard shown under a lookup result
///
/// # Examples
///
/// ```
/// use ipgeo_bot::bot::views::lookup_keyboard;
///
/// let keyboard = lookup_keyboard(Some("https://www.google.com/maps?q=1,2"));
/// assert_eq!(keyboard.inline_keyboard.len(), 2);
/// ```
#[must_use]
pub fn lookup_keyboard(map_url: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = map_url.and_then(|u| Url::parse(u).ok()) {
        rows.push(vec![InlineKeyboardButton::url(
            DefaultBotView::map_button(),
            url,
        )]);
    }
    rows.push(vec![InlineKeyboardButton::callback(
        DefaultBotView::my_ip_button(),
        MY_IP_CALLBACK,
    )]);
    InlineKeyboardMarkup::new(rows)
}
