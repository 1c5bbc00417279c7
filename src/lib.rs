#![deny(missing_docs)]
//! Telegram bot that reports geolocation and ISP details for IP addresses.

/// Telegram-facing bot logic
pub mod bot;
/// Configuration and settings
pub mod config;
/// Geolocation providers
pub mod geo;
/// Keep-alive HTTP endpoint
pub mod liveness;
/// Tracing subscriber with secret redaction
pub mod logging;
/// Per-user lookup cooldown
pub mod rate_limit;
/// Bot runtime entrypoint
pub mod runner;
