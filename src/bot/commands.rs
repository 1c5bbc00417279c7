//! Command routing
//!
//! Turns a parsed command into a [`Reply`]: argument validation, rate limit,
//! lookup and formatting. Nothing here talks to Telegram, so the whole flow can
//! be exercised with a mocked [`GeoProvider`].

use crate::bot::views::{format_record, BotView, DefaultBotView, DisplayText, NOT_AVAILABLE};
use crate::geo::{GeoError, GeoProvider, LookupTarget};
use crate::rate_limit::{RateDecision, RateLimiter};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::utils::command::BotCommands;
use thiserror::Error;
use tracing::{info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show the command list
    #[command(description = "Show this help.")]
    Help,
    /// Look up an address
    #[command(description = "Look up an IP address, e.g. /ip 8.8.8.8")]
    Ip(String),
    /// Look up the bot's own public address
    #[command(description = "Show the location of this bot's public IP.")]
    MyIp,
}

/// Why a lookup request produced no record
#[derive(Debug, Error)]
pub enum CommandError {
    /// `/ip` needs exactly one argument
    #[error("expected exactly one address, got {0} arguments")]
    Usage(usize),
    /// The user is inside the cooldown window
    #[error("rate limited for another {retry_after:?}")]
    RateLimited {
        /// Time until the next lookup is accepted
        retry_after: Duration,
    },
    /// The geolocation API failed
    #[error(transparent)]
    Upstream(#[from] GeoError),
}

/// What to send back for one event
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Telegram HTML text
    pub text: String,
    /// Map link for the URL button
    pub map_url: Option<String>,
    /// Whether to attach the lookup keyboard
    pub with_buttons: bool,
}

impl Reply {
    /// Plain text reply without buttons
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            map_url: None,
            with_buttons: false,
        }
    }

    fn from_display(display: DisplayText) -> Self {
        Self {
            text: display.text,
            map_url: display.map_url,
            with_buttons: true,
        }
    }

    fn from_error(error: &CommandError) -> Self {
        match error {
            CommandError::Usage(_) => Self::text(DefaultBotView::usage_error()),
            CommandError::RateLimited { retry_after } => {
                Self::text(DefaultBotView::rate_limited(*retry_after))
            }
            CommandError::Upstream(e) => {
                Self::text(DefaultBotView::lookup_failed(e.reason().as_deref()))
            }
        }
    }
}

/// Validate `/ip` arguments: exactly one whitespace-separated token.
///
/// # Errors
///
/// Returns `CommandError::Usage` with the number of tokens found otherwise.
///
/// # Examples
///
/// ```
/// use ipgeo_bot::bot::commands::parse_ip_args;
///
/// assert_eq!(parse_ip_args(" 8.8.8.8 ").ok().as_deref(), Some("8.8.8.8"));
/// assert!(parse_ip_args("").is_err());
/// assert!(parse_ip_args("1.1.1.1 8.8.8.8").is_err());
/// ```
pub fn parse_ip_args(args: &str) -> Result<String, CommandError> {
    let mut tokens = args.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(address), None) => Ok(address.to_string()),
        (None, _) => Err(CommandError::Usage(0)),
        (Some(_), Some(_)) => Err(CommandError::Usage(2 + tokens.count())),
    }
}

/// Dispatches lookup commands against the injected rate limiter and provider
pub struct CommandRouter {
    limiter: RateLimiter,
    geo: Arc<dyn GeoProvider>,
}

impl CommandRouter {
    /// Create a router from its collaborators
    #[must_use]
    pub fn new(limiter: RateLimiter, geo: Arc<dyn GeoProvider>) -> Self {
        Self { limiter, geo }
    }

    /// Reply to `/start`
    #[must_use]
    pub fn start(&self) -> Reply {
        Reply {
            text: DefaultBotView::welcome_message().to_string(),
            map_url: None,
            with_buttons: true,
        }
    }

    /// Handle `/ip <args>` for `user_id`
    pub async fn ip_command(&self, user_id: i64, args: &str) -> Reply {
        let result = match parse_ip_args(args) {
            Ok(address) => {
                self.limited_lookup(user_id, LookupTarget::Address(address))
                    .await
            }
            Err(usage) => Err(usage),
        };
        self.finish(user_id, result)
    }

    /// Handle `/myip` for `user_id`; rate limited like `/ip`
    pub async fn my_ip_command(&self, user_id: i64) -> Reply {
        let result = self.limited_lookup(user_id, LookupTarget::SelfLookup).await;
        self.finish(user_id, result)
    }

    /// Handle a press of the "My IP" button
    pub async fn my_ip_button(&self, user_id: i64) -> Reply {
        let result = self.lookup(LookupTarget::SelfLookup).await;
        self.finish(user_id, result)
    }

    /// Handle a non-command text message: an IP address is looked up, anything else gets a hint
    pub async fn text_message(&self, user_id: i64, text: &str) -> Reply {
        let candidate = text.trim();
        if candidate.parse::<IpAddr>().is_ok() {
            self.ip_command(user_id, candidate).await
        } else {
            Reply::text(DefaultBotView::not_an_address())
        }
    }

    async fn limited_lookup(
        &self,
        user_id: i64,
        target: LookupTarget,
    ) -> Result<DisplayText, CommandError> {
        if let RateDecision::Limited { retry_after } = self.limiter.check(user_id).await {
            return Err(CommandError::RateLimited { retry_after });
        }
        self.lookup(target).await
    }

    async fn lookup(&self, target: LookupTarget) -> Result<DisplayText, CommandError> {
        let requested = target.address().map(str::to_string);
        let record = self.geo.lookup(target).await?;

        let shown_ip = record
            .ip
            .clone()
            .or(requested)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        Ok(format_record(&shown_ip, &record))
    }

    fn finish(&self, user_id: i64, result: Result<DisplayText, CommandError>) -> Reply {
        match result {
            Ok(display) => {
                info!("Lookup for user {user_id} via {} succeeded.", self.geo.name());
                Reply::from_display(display)
            }
            Err(e) => {
                match &e {
                    CommandError::Upstream(_) => {
                        warn!(
                            "Lookup for user {user_id} via {} failed: {e}",
                            self.geo.name()
                        );
                    }
                    CommandError::Usage(_) | CommandError::RateLimited { .. } => {
                        info!("Rejected request from user {user_id}: {e}");
                    }
                }
                Reply::from_error(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{GeoRecord, MockGeoProvider};
    use mockall::predicate::eq;

    fn google_dns() -> GeoRecord {
        GeoRecord {
            ip: Some("8.8.8.8".to_string()),
            country: Some("United States".to_string()),
            region: Some("California".to_string()),
            city: Some("Mountain View".to_string()),
            isp: Some("Google LLC".to_string()),
            org: Some("Google Public DNS".to_string()),
            asn: Some("AS15169 Google LLC".to_string()),
            timezone: Some("America/Los_Angeles".to_string()),
            latitude: Some(37.4056),
            longitude: Some(-122.0775),
        }
    }

    fn router_with(mock: MockGeoProvider) -> CommandRouter {
        CommandRouter::new(RateLimiter::new(Duration::from_secs(10), 100), Arc::new(mock))
    }

    fn unreachable_provider() -> MockGeoProvider {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup().never();
        mock.expect_name().return_const("mock");
        mock
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/ip 8.8.8.8", "ipgeo_bot").ok(),
            Some(Command::Ip("8.8.8.8".to_string()))
        );
        assert_eq!(Command::parse("/myip", "ipgeo_bot").ok(), Some(Command::MyIp));
        assert_eq!(
            Command::parse("/ip", "ipgeo_bot").ok(),
            Some(Command::Ip(String::new()))
        );
    }

    #[test]
    fn test_parse_ip_args_counts_tokens() {
        assert!(matches!(parse_ip_args("   "), Err(CommandError::Usage(0))));
        assert!(matches!(
            parse_ip_args("1.1.1.1 8.8.8.8 9.9.9.9"),
            Err(CommandError::Usage(3))
        ));
    }

    #[tokio::test]
    async fn test_usage_error_never_calls_upstream() {
        let router = router_with(unreachable_provider());

        for args in ["", "  ", "1.1.1.1 8.8.8.8", "a b c"] {
            let reply = router.ip_command(1, args).await;
            assert_eq!(reply.text, DefaultBotView::usage_error());
            assert!(!reply.with_buttons);
        }
    }

    #[tokio::test]
    async fn test_successful_lookup_contains_values() {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup()
            .with(eq(LookupTarget::Address("8.8.8.8".to_string())))
            .times(1)
            .returning(|_| Ok(google_dns()));
        mock.expect_name().return_const("mock");

        let reply = router_with(mock).ip_command(1, "8.8.8.8").await;

        for expected in ["United States", "Mountain View", "37.4056", "-122.0775"] {
            assert!(reply.text.contains(expected), "missing {expected}");
        }
        assert!(reply.with_buttons);
        assert!(reply.map_url.is_some());
    }

    #[tokio::test]
    async fn test_upstream_failure_has_no_map_link() {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup()
            .times(1)
            .returning(|_| Err(GeoError::Rejected("invalid query".to_string())));
        mock.expect_name().return_const("mock");

        let reply = router_with(mock).ip_command(1, "not-an-ip").await;

        assert!(reply.text.contains("lookup failed"));
        assert!(reply.text.contains("invalid query"));
        assert!(reply.map_url.is_none());
        assert!(!reply.with_buttons);
    }

    #[tokio::test]
    async fn test_second_request_is_rate_limited() {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup().times(1).returning(|_| Ok(google_dns()));
        mock.expect_name().return_const("mock");
        let router = router_with(mock);

        let first = router.ip_command(42, "8.8.8.8").await;
        assert!(first.with_buttons);

        let second = router.ip_command(42, "8.8.8.8").await;
        assert!(second.text.contains("Please wait"));
        assert!(second.map_url.is_none());
    }

    #[tokio::test]
    async fn test_my_ip_command_shares_cooldown() {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup()
            .with(eq(LookupTarget::SelfLookup))
            .times(1)
            .returning(|_| Ok(google_dns()));
        mock.expect_name().return_const("mock");
        let router = router_with(mock);

        let first = router.my_ip_command(7).await;
        assert!(first.text.contains("8.8.8.8"));
        assert!(first.map_url.is_some());

        let second = router.my_ip_command(7).await;
        assert!(second.text.contains("Please wait"));
        assert_eq!(second.map_url, None);
        assert!(!second.with_buttons);
    }

    #[tokio::test]
    async fn test_button_self_lookup_uses_record_ip() {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup()
            .with(eq(LookupTarget::SelfLookup))
            .times(2)
            .returning(|_| {
                Ok(GeoRecord {
                    ip: Some("203.0.113.7".to_string()),
                    ..GeoRecord::default()
                })
            });
        mock.expect_name().return_const("mock");
        let router = router_with(mock);

        // Button presses bypass the cooldown
        let first = router.my_ip_button(5).await;
        let second = router.my_ip_button(5).await;
        assert!(first.text.contains("203.0.113.7"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_text_message_routes_addresses_only() {
        let mut mock = MockGeoProvider::new();
        mock.expect_lookup()
            .with(eq(LookupTarget::Address("2001:4860:4860::8888".to_string())))
            .times(1)
            .returning(|_| Ok(GeoRecord::default()));
        mock.expect_name().return_const("mock");
        let router = router_with(mock);

        let reply = router.text_message(3, "hello there").await;
        assert_eq!(reply.text, DefaultBotView::not_an_address());

        let reply = router.text_message(3, " 2001:4860:4860::8888 ").await;
        assert!(reply.text.contains("2001:4860:4860::8888"));
    }
}
