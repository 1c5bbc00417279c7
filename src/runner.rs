use crate::bot;
use crate::bot::commands::{Command, CommandRouter};
use crate::bot::views::MY_IP_CALLBACK;
use crate::config::Settings;
use crate::geo;
use crate::liveness;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info};

/// Run the bot: spawn the liveness endpoint, then dispatch Telegram updates until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the geolocation provider cannot be built from `settings`.
pub async fn run_bot(settings: Arc<Settings>) -> anyhow::Result<()> {
    spawn_liveness(settings.port);

    let geo_provider = geo::provider_from_settings(&settings)?;
    info!("Geolocation provider: {}", geo_provider.name());

    let router = Arc::new(CommandRouter::new(init_rate_limiter(&settings), geo_provider));

    let bot = Bot::new(settings.bot_token());
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn spawn_liveness(port: u16) {
    tokio::spawn(async move {
        if let Err(e) = liveness::serve(port).await {
            // The bot keeps running without the endpoint
            error!("{e}");
        }
    });
}

fn init_rate_limiter(settings: &Settings) -> RateLimiter {
    let cooldown = settings.rate_limit_cooldown();
    let max_users = settings.rate_limit_max_users;

    info!(
        "Initializing RateLimiter (cooldown: {}s, max_users: {})",
        cooldown.as_secs(),
        max_users
    );

    RateLimiter::new(cooldown, max_users)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| q.data.as_deref() == Some(MY_IP_CALLBACK))
                .endpoint(handle_my_ip_callback),
        )
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    router: Arc<CommandRouter>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, router).await,
        Command::Help => bot::handlers::help(bot, msg).await,
        Command::Ip(args) => bot::handlers::ip(bot, msg, args, router).await,
        Command::MyIp => bot::handlers::my_ip(bot, msg, router).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    router: Arc<CommandRouter>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::text(bot, msg, router).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_my_ip_callback(
    bot: Bot,
    q: CallbackQuery,
    router: Arc<CommandRouter>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::my_ip_callback(bot, q, router).await {
        error!("My IP callback handler error: {}", e);
    }
    respond(())
}
