/// Command parsing and lookup routing
pub mod commands;
/// Telegram update handlers
pub mod handlers;
/// View layer for UI components (keyboards, messages, formatter)
pub mod views;
