//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into a core `IncomingUpdate` and
//! hands it to `SaleBot`. Routing and replies live in the core.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, PhotoSize},
};

use salebot_core::{
    domain::{ChatId, MessageId, MessageRef, PhotoRef, UserId},
    messaging::types::{self, IncomingMessage, IncomingUpdate, RepliedMessage},
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let update = IncomingUpdate::Callback(callback_from(&q));
    state.app.handle(update).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = message_from(&msg) else {
        // Channel posts and service messages have no sender.
        return Ok(());
    };
    state.app.handle(IncomingUpdate::Message(incoming)).await;
    Ok(())
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

/// Telegram sends several sizes of one photo; keep the largest.
fn largest_photo(sizes: &[PhotoSize]) -> Option<PhotoRef> {
    sizes
        .iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        .map(|p| PhotoRef::new(p.file.id.clone()))
}

fn message_from(msg: &Message) -> Option<IncomingMessage> {
    let user = msg.from()?;
    let photos = msg
        .photo()
        .and_then(largest_photo)
        .into_iter()
        .collect::<Vec<_>>();
    let reply_to = msg.reply_to_message().map(|r| RepliedMessage {
        message: message_ref(r),
        text: r.text().or_else(|| r.caption()).map(str::to_string),
    });

    Some(IncomingMessage {
        message: message_ref(msg),
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        text: msg.text().map(str::to_string),
        photos,
        reply_to,
    })
}

fn callback_from(q: &CallbackQuery) -> types::CallbackQuery {
    types::CallbackQuery {
        user_id: UserId(q.from.id.0 as i64),
        username: q.from.username.clone(),
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message: q.message.as_ref().map(message_ref),
    }
}
