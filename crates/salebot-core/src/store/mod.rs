//! Persistence ports and their SQLite implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::{keys, parse_timeout_minutes, Config},
    domain::{ConfigEntry, NewPost, PhotoRef, Post, PostId, PostStatus, UserId},
    Result,
};

pub mod sqlite;

pub use sqlite::SqliteStore;

/// Posts, their photos, and the submitter directory.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Inserts the post and all its photos atomically; returns the new id.
    async fn create(&self, post: NewPost) -> Result<PostId>;

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>>;

    /// Most recently created pending post with exactly this title.
    async fn find_pending_by_title(&self, title: &str) -> Result<Option<Post>>;

    /// Moves a pending post to `status`.
    ///
    /// Fails with `NotFound` when the id is unknown and `InvalidTransition` when
    /// the post is no longer pending.
    async fn set_status(&self, id: PostId, status: PostStatus) -> Result<()>;

    async fn list_pending(&self) -> Result<Vec<Post>>;

    /// Photo references in insertion order.
    async fn list_photos(&self, id: PostId) -> Result<Vec<PhotoRef>>;

    /// Pending posts with `expires_at < now`. Read-only.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Post>>;

    async fn register_user(&self, user_id: UserId, username: Option<&str>) -> Result<()>;

    async fn find_username(&self, user_id: UserId) -> Result<Option<String>>;
}

/// Runtime-editable key/value settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
    async fn list_settings(&self) -> Result<Vec<ConfigEntry>>;
}

/// Submission TTL from settings, or `fallback` when unset or unreadable.
pub async fn timeout_minutes(settings: &dyn SettingsRepository, fallback: u64) -> u64 {
    match settings.get_setting(keys::TIMEOUT_MINUTES).await {
        Ok(Some(raw)) => parse_timeout_minutes(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring TIMEOUT_MINUTES setting");
            fallback
        }),
        Ok(None) => fallback,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read TIMEOUT_MINUTES setting");
            fallback
        }
    }
}

/// Publication thread from settings, or `fallback` when unset or unreadable.
pub async fn approved_topic_id(
    settings: &dyn SettingsRepository,
    fallback: Option<i32>,
) -> Option<i32> {
    match settings.get_setting(keys::APPROVED_TOPIC_ID).await {
        Ok(Some(raw)) if raw.trim().is_empty() => None,
        Ok(Some(raw)) => match raw.trim().parse::<i32>() {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, value = %raw, "ignoring APPROVED_TOPIC_ID setting");
                fallback
            }
        },
        Ok(None) => fallback,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read APPROVED_TOPIC_ID setting");
            fallback
        }
    }
}

/// Writes startup configuration into the settings table.
///
/// Group ids always follow the environment. The TTL is written when configured
/// and otherwise only filled in if missing, so `/config` edits survive restarts.
pub async fn seed_settings(settings: &dyn SettingsRepository, cfg: &Config) -> Result<()> {
    settings
        .set_setting(keys::MODERATION_GROUP_ID, &cfg.moderation_chat.0.to_string())
        .await?;
    settings
        .set_setting(keys::APPROVED_GROUP_ID, &cfg.approved_chat.0.to_string())
        .await?;

    match cfg.timeout_minutes {
        Some(ttl) => {
            settings
                .set_setting(keys::TIMEOUT_MINUTES, &ttl.to_string())
                .await?
        }
        None => {
            if settings.get_setting(keys::TIMEOUT_MINUTES).await?.is_none() {
                settings
                    .set_setting(
                        keys::TIMEOUT_MINUTES,
                        &crate::config::DEFAULT_TIMEOUT_MINUTES.to_string(),
                    )
                    .await?;
            }
        }
    }

    if let Some(topic) = cfg.approved_topic_id {
        settings
            .set_setting(keys::APPROVED_TOPIC_ID, &topic.to_string())
            .await?;
    }
    Ok(())
}
