use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef, PhotoRef},
    messaging::types::SendOptions,
    Result,
};

/// Outbound messenger port.
///
/// The Telegram adapter implements it; tests use in-memory fakes.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str, opts: SendOptions)
        -> Result<MessageRef>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: Option<&str>,
        opts: SendOptions,
    ) -> Result<MessageRef>;

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
