use dialoguer::{Input, Password};
use dotenvy::dotenv;
use ipgeo_bot::config::Settings;
use ipgeo_bot::logging::{init_logging, RedactionPatterns};
use ipgeo_bot::runner::run_bot;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    let settings = match load_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Secrets are known now, so the logger can mask them
    let secrets: Vec<&str> = [settings.bot_token.as_deref(), settings.api_key.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let patterns = Arc::new(RedactionPatterns::new(&secrets).map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting IP geolocation bot...");
    info!("Configuration loaded successfully.");

    if let Err(e) = run_bot(Arc::new(settings)).await {
        error!("Bot stopped: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::new()?;

    if !settings.missing_credentials().is_empty() && std::io::stdin().is_terminal() {
        prompt_missing_credentials(&mut settings)?;
    }

    settings.validate()?;
    Ok(settings)
}

/// Interactive fallback for local runs without a `.env`
fn prompt_missing_credentials(settings: &mut Settings) -> Result<(), dialoguer::Error> {
    for name in settings.missing_credentials() {
        match name {
            "BOT_TOKEN" => {
                let token: String = Input::new()
                    .with_prompt("🔑 Enter your Telegram Bot Token")
                    .interact_text()?;
                settings.bot_token = Some(token.trim().to_string()).filter(|t| !t.is_empty());
            }
            "API_KEY" => {
                let key = Password::new()
                    .with_prompt("🌍 Enter your API Ninjas API Key")
                    .interact()?;
                settings.api_key = Some(key.trim().to_string()).filter(|k| !k.is_empty());
            }
            _ => {}
        }
    }
    Ok(())
}
