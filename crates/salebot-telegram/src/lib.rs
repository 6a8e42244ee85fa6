//! Telegram adapter (teloxide).
//!
//! Implements the `salebot-core` MessagingPort over the Telegram Bot API and
//! turns teloxide updates into core `IncomingUpdate`s.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use salebot_core::{
    domain::{ChatId, MessageId, MessageRef, PhotoRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, SendOptions},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
        let row: Vec<InlineKeyboardButton> = keyboard
            .buttons
            .iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
            .collect();
        InlineKeyboardMarkup::new(vec![row])
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram flood limit hit; retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        opts: SendOptions,
    ) -> Result<MessageRef> {
        let markup = opts.keyboard.as_ref().map(Self::markup);
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
                if opts.html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if let Some(reply_to) = opts.reply_to {
                    req = req
                        .reply_to_message_id(Self::tg_msg_id(reply_to.message_id))
                        .allow_sending_without_reply(true);
                }
                if let Some(thread) = opts.thread_id {
                    req = req.message_thread_id(thread);
                }
                if let Some(markup) = &markup {
                    req = req.reply_markup(markup.clone());
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: Option<&str>,
        opts: SendOptions,
    ) -> Result<MessageRef> {
        let markup = opts.keyboard.as_ref().map(Self::markup);
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_photo(
                    Self::tg_chat(chat_id),
                    InputFile::file_id(photo.as_str().to_string()),
                );
                if let Some(caption) = caption {
                    req = req.caption(caption.to_string());
                }
                if opts.html {
                    req = req.parse_mode(ParseMode::Html);
                }
                if let Some(reply_to) = opts.reply_to {
                    req = req
                        .reply_to_message_id(Self::tg_msg_id(reply_to.message_id))
                        .allow_sending_without_reply(true);
                }
                if let Some(thread) = opts.thread_id {
                    req = req.message_thread_id(thread);
                }
                if let Some(markup) = &markup {
                    req = req.reply_markup(markup.clone());
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            )
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
