use std::fmt;

use chrono::{DateTime, Utc};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl ChatId {
    /// Private chats with a user have positive ids; groups and channels are negative.
    pub fn is_private(self) -> bool {
        self.0 > 0
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Generated post id (SQLite rowid).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub i64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque photo reference (Telegram `file_id`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhotoRef(pub String);

impl PhotoRef {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self(file_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PostStatus {
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "approved" => Some(PostStatus::Approved),
            "rejected" => Some(PostStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable record of one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub status: PostStatus,
    pub title: String,
    pub description: String,
    pub price: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Fields copied from a finalized draft, plus origin identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPost {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub title: String,
    pub description: String,
    pub price: String,
    pub location: String,
    pub photos: Vec<PhotoRef>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}
