//! Telegram update handlers.
//!
//! Each message is decoded once into an `Incoming`, run through `ExpenseBot`
//! under the per-chat lock, and the reply (if any) is sent to the same chat.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Message, User},
};

use tally_core::{
    domain::{ChatId, ChatKind, UserId},
    messaging::{Incoming, Outcome, Sender},
};

use crate::router::AppState;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = decode(&msg) else {
        return Ok(());
    };

    let outcome = {
        let _guard = state.chat_locks.lock_chat(msg.chat.id.0).await;
        state.bot.handle(incoming).await
    };

    if let Outcome::Reply(text) = outcome {
        if let Err(e) = bot
            .send_message(msg.chat.id, text)
            .reply_to_message_id(msg.id)
            .await
        {
            tracing::warn!(chat_id = msg.chat.id.0, error = %e, "failed to send reply");
        }
    }

    Ok(())
}

/// Text messages from a real user become `Incoming`; everything else (media,
/// service messages, channel posts) is dropped.
fn decode(msg: &Message) -> Option<Incoming> {
    let user = msg.from()?;
    let text = msg.text()?;

    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Group
    };

    let sender = Sender {
        user_id: UserId(user.id.0 as i64),
        chat_id: ChatId(msg.chat.id.0),
        chat_kind,
        username: display_name(user),
    };

    Some(Incoming::from_text(sender, text))
}

fn display_name(user: &User) -> String {
    pick_display_name(
        user.username.as_deref(),
        &user.first_name,
        user.last_name.as_deref(),
    )
}

/// `@username` when set, otherwise "first last".
fn pick_display_name(username: Option<&str>, first: &str, last: Option<&str>) -> String {
    if let Some(u) = username.filter(|u| !u.trim().is_empty()) {
        return format!("@{u}");
    }
    let full = match last.filter(|l| !l.trim().is_empty()) {
        Some(last) => format!("{first} {last}"),
        None => first.to_string(),
    };
    let full = full.trim();
    if full.is_empty() {
        return "unknown".to_string();
    }
    full.to_string()
}
