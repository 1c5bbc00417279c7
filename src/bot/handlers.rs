use crate::bot::commands::{Command, CommandRouter, Reply};
use crate::bot::views::{lookup_keyboard, start_keyboard};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{ChatAction, InlineKeyboardMarkup, MessageId, ParseMode},
    utils::command::BotCommands,
    ApiError, RequestError,
};
use tracing::{debug, info, warn};

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> Result<()> {
    let mut request = bot
        .send_message(chat_id, reply.text)
        .parse_mode(ParseMode::Html);
    if reply.with_buttons {
        request = request.reply_markup(lookup_keyboard(reply.map_url.as_deref()));
    }
    request.await?;
    Ok(())
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, router: Arc<CommandRouter>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!(
        "User {user_id} ({}) initiated /start command.",
        get_user_name(&msg)
    );

    let reply = router.start();
    bot.send_message(msg.chat.id, reply.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(start_keyboard())
        .await?;
    Ok(())
}

/// Help handler, lists the commands
///
/// # Errors
///
/// Returns an error if the message cannot be sent.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

/// `/ip <address>` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn ip(bot: Bot, msg: Message, args: String, router: Arc<CommandRouter>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let reply = router.ip_command(user_id, &args).await;
    send_reply(&bot, msg.chat.id, reply).await
}

/// `/myip` handler
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn my_ip(bot: Bot, msg: Message, router: Arc<CommandRouter>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;

    let reply = router.my_ip_command(user_id).await;
    send_reply(&bot, msg.chat.id, reply).await
}

/// Plain text handler: a bare IP address is looked up
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn text(bot: Bot, msg: Message, router: Arc<CommandRouter>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().unwrap_or_default();

    let reply = router.text_message(user_id, text).await;
    send_reply(&bot, msg.chat.id, reply).await
}

/// "My IP" button handler; the result replaces the message carrying the button
///
/// # Errors
///
/// Returns an error if the callback message is inaccessible or the edit fails.
pub async fn my_ip_callback(bot: Bot, q: CallbackQuery, router: Arc<CommandRouter>) -> Result<()> {
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let user_id = q.from.id.0.cast_signed();
    let (chat_id, msg_id) = q
        .message
        .as_ref()
        .map(|msg| (msg.chat().id, msg.id()))
        .ok_or_else(|| anyhow!("Callback message missing chat id"))?;

    info!("User {user_id} pressed the My IP button.");
    let reply = router.my_ip_button(user_id).await;
    edit_reply(&bot, chat_id, msg_id, reply).await
}

/// Keyboard for an edited message. A failed lookup keeps the "My IP" button so
/// the user can retry in place.
fn edit_keyboard(reply: &Reply) -> InlineKeyboardMarkup {
    if reply.with_buttons {
        lookup_keyboard(reply.map_url.as_deref())
    } else {
        start_keyboard()
    }
}

/// Telegram refuses edits that would leave the message unchanged
fn is_not_modified(e: &RequestError) -> bool {
    const ERROR_NOT_MODIFIED: &str = "message is not modified";

    matches!(e, RequestError::Api(ApiError::MessageNotModified))
        || e.to_string().contains(ERROR_NOT_MODIFIED)
}

async fn edit_reply(bot: &Bot, chat_id: ChatId, msg_id: MessageId, reply: Reply) -> Result<()> {
    let keyboard = edit_keyboard(&reply);
    let request = bot
        .edit_message_text(chat_id, msg_id, reply.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard);

    match request.await {
        Ok(_) => Ok(()),
        Err(e) if is_not_modified(&e) => {
            // Same result as already shown
            debug!("Message update skipped: {e}");
            Ok(())
        }
        Err(e) => {
            warn!("Failed to edit message {msg_id:?} in chat {chat_id:?}: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_modified_edit_is_recognised() {
        assert!(is_not_modified(&RequestError::Api(
            ApiError::MessageNotModified
        )));
        assert!(!is_not_modified(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_not_modified(&RequestError::Api(
            ApiError::MessageToEditNotFound
        )));
    }

    #[test]
    fn test_failed_edit_keeps_my_ip_button() {
        let failed = Reply::text("⚠️ lookup failed");
        assert_eq!(edit_keyboard(&failed), start_keyboard());
    }

    #[test]
    fn test_successful_edit_gets_lookup_keyboard() {
        let url = "https://www.google.com/maps?q=1,2";
        let reply = Reply {
            text: "ok".to_string(),
            map_url: Some(url.to_string()),
            with_buttons: true,
        };
        assert_eq!(edit_keyboard(&reply), lookup_keyboard(Some(url)));
    }
}
