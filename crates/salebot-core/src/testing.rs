//! In-memory fakes shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, ConfigEntry, MessageId, MessageRef, NewPost, PhotoRef, Post, PostId, PostStatus, UserId},
    errors::Error,
    messaging::{port::MessagingPort, types::SendOptions},
    store::{PostRepository, SettingsRepository, SqliteStore},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: ChatId,
        text: String,
        opts: SendOptions,
    },
    Photo {
        chat_id: ChatId,
        photo: PhotoRef,
        caption: Option<String>,
        opts: SendOptions,
    },
    Edit {
        msg: MessageRef,
        text: String,
    },
    Delete(MessageRef),
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    failing_chat: Mutex<Option<ChatId>>,
}

impl FakeMessenger {
    /// Every send to `chat_id` fails from now on.
    pub fn fail_sends_to(&self, chat_id: ChatId) {
        *self.failing_chat.lock().unwrap() = Some(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, text, .. } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn photos_to(&self, chat_id: ChatId) -> Vec<(PhotoRef, Option<String>, SendOptions)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Photo {
                    chat_id: c,
                    photo,
                    caption,
                    opts,
                } if c == chat_id => Some((photo, caption, opts)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Delete(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn check(&self, chat_id: ChatId) -> Result<()> {
        if *self.failing_chat.lock().unwrap() == Some(chat_id) {
            return Err(Error::External(format!("chat {} unavailable", chat_id.0)));
        }
        Ok(())
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    fn record(&self, sent: Sent) {
        self.sent.lock().unwrap().push(sent);
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str, opts: SendOptions) -> Result<MessageRef> {
        self.check(chat_id)?;
        self.record(Sent::Text {
            chat_id,
            text: text.to_string(),
            opts,
        });
        Ok(self.alloc(chat_id))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: &PhotoRef,
        caption: Option<&str>,
        opts: SendOptions,
    ) -> Result<MessageRef> {
        self.check(chat_id)?;
        self.record(Sent::Photo {
            chat_id,
            photo: photo.clone(),
            caption: caption.map(str::to_string),
            opts,
        });
        Ok(self.alloc(chat_id))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.check(msg.chat_id)?;
        self.record(Sent::Edit {
            msg,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.check(msg.chat_id)?;
        self.record(Sent::Delete(msg));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.record(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

/// SQLite store whose writes can be switched off or stalled, with a read counter.
pub struct FlakyStore {
    pub inner: SqliteStore,
    fail_writes: Mutex<bool>,
    stall_creates: Mutex<bool>,
    reads: Mutex<usize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_writes: Mutex::new(false),
            stall_creates: Mutex::new(false),
            reads: Mutex::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// `create` never completes from now on.
    pub fn stall_creates(&self, stall: bool) {
        *self.stall_creates.lock().unwrap() = stall;
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }

    fn write(&self) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(Error::Persistence("disk I/O error".to_string()));
        }
        Ok(())
    }

    fn read(&self) {
        *self.reads.lock().unwrap() += 1;
    }
}

#[async_trait]
impl PostRepository for FlakyStore {
    async fn create(&self, post: NewPost) -> Result<PostId> {
        self.write()?;
        let stalled = *self.stall_creates.lock().unwrap();
        if stalled {
            std::future::pending::<()>().await;
        }
        self.inner.create(post).await
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>> {
        self.read();
        self.inner.find_by_id(id).await
    }

    async fn find_pending_by_title(&self, title: &str) -> Result<Option<Post>> {
        self.read();
        self.inner.find_pending_by_title(title).await
    }

    async fn set_status(&self, id: PostId, status: PostStatus) -> Result<()> {
        self.write()?;
        self.inner.set_status(id, status).await
    }

    async fn list_pending(&self) -> Result<Vec<Post>> {
        self.read();
        self.inner.list_pending().await
    }

    async fn list_photos(&self, id: PostId) -> Result<Vec<PhotoRef>> {
        self.read();
        self.inner.list_photos(id).await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        self.read();
        self.inner.sweep_expired(now).await
    }

    async fn register_user(&self, user_id: UserId, username: Option<&str>) -> Result<()> {
        self.write()?;
        self.inner.register_user(user_id, username).await
    }

    async fn find_username(&self, user_id: UserId) -> Result<Option<String>> {
        self.read();
        self.inner.find_username(user_id).await
    }
}

#[async_trait]
impl SettingsRepository for FlakyStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.read();
        self.inner.get_setting(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.write()?;
        self.inner.set_setting(key, value).await
    }

    async fn list_settings(&self) -> Result<Vec<ConfigEntry>> {
        self.read();
        self.inner.list_settings().await
    }
}
