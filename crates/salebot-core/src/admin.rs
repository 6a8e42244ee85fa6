//! Admin commands: `/pending` and `/config`.

use std::{collections::HashSet, fmt::Write as _, sync::Arc};

use crate::{
    config::{keys, parse_timeout_minutes},
    domain::UserId,
    errors::Error,
    store::{PostRepository, SettingsRepository},
    Result,
};

/// Immutable set of admin user ids.
#[derive(Clone, Debug, Default)]
pub struct AdminAllowList(HashSet<i64>);

impl AdminAllowList {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.0.contains(&user_id.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Splits `/cmd@botname args` into a lowercase command name and the trimmed rest.
pub fn parse_command(text: &str) -> Option<(String, &str)> {
    let text = text.trim();
    let body = text.strip_prefix('/')?;
    let (first, rest) = match body.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (body, ""),
    };
    let name = first.split('@').next().unwrap_or("").to_lowercase();
    Some((name, rest))
}

pub fn is_admin_command(text: &str) -> bool {
    matches!(
        parse_command(text),
        Some((name, _)) if name == "pending" || name == "config"
    )
}

pub struct AdminCommands {
    admins: AdminAllowList,
    settings: Arc<dyn SettingsRepository>,
    posts: Arc<dyn PostRepository>,
}

impl AdminCommands {
    pub fn new(
        admins: AdminAllowList,
        settings: Arc<dyn SettingsRepository>,
        posts: Arc<dyn PostRepository>,
    ) -> Self {
        Self {
            admins,
            settings,
            posts,
        }
    }

    /// Returns the reply text. Non-admins get `Error::Authorization` before any storage access.
    pub async fn handle(&self, user_id: UserId, text: &str) -> Result<String> {
        if !self.admins.is_admin(user_id) {
            tracing::warn!(user_id = user_id.0, "unauthorized admin command attempt");
            return Err(Error::Authorization(format!(
                "user {} is not an admin",
                user_id.0
            )));
        }

        let Some((name, args)) = parse_command(text) else {
            return Ok(unknown(user_id, text));
        };
        let reply = match (name.as_str(), args) {
            ("pending", "") => self.pending(user_id).await,
            ("config", "") => self.list_config(user_id).await,
            ("config", args) => self.set_config(user_id, args).await,
            _ => unknown(user_id, text),
        };
        Ok(reply)
    }

    async fn pending(&self, user_id: UserId) -> String {
        let posts = match self.posts.list_pending().await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to query pending posts");
                return format!("Failed to query pending posts: {e}");
            }
        };
        tracing::info!(user_id = user_id.0, count = posts.len(), "admin listed pending posts");
        if posts.is_empty() {
            return "No pending posts.".to_string();
        }
        let mut out = String::new();
        for p in posts {
            let _ = writeln!(
                out,
                "ID: {}, User: {}, Title: {}, Created: {}",
                p.id,
                p.user_id.0,
                p.title,
                p.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        out
    }

    async fn list_config(&self, user_id: UserId) -> String {
        let entries = match self.settings.list_settings().await {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(error = %e, "failed to read settings");
                return format!("Failed to read config: {e}");
            }
        };
        tracing::info!(user_id = user_id.0, "admin listed config");
        if entries.is_empty() {
            return "No config values set.".to_string();
        }
        let mut out = String::new();
        for e in entries {
            let _ = writeln!(out, "{} = {}", e.key, e.value);
        }
        out
    }

    async fn set_config(&self, user_id: UserId, args: &str) -> String {
        let Some((key, value)) = args
            .split_once(char::is_whitespace)
            .map(|(k, v)| (k.trim(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
        else {
            tracing::warn!(user_id = user_id.0, "invalid /config usage");
            return "Usage: /config KEY VALUE".to_string();
        };

        if let Err(reason) = validate_setting(key, value) {
            return format!("Invalid value for {key}: {reason}");
        }

        match self.settings.set_setting(key, value).await {
            Ok(()) => {
                tracing::info!(user_id = user_id.0, key, value, "config updated by admin");
                format!("Config updated: {key} = {value}")
            }
            Err(e) => {
                tracing::error!(key, error = %e, "failed to update config");
                format!("Failed to update config: {e}")
            }
        }
    }
}

fn unknown(user_id: UserId, text: &str) -> String {
    tracing::warn!(user_id = user_id.0, command = text, "unknown admin command");
    "Unknown admin command.".to_string()
}

/// Known keys must hold values the bot can use; other keys are stored as-is.
fn validate_setting(key: &str, value: &str) -> std::result::Result<(), String> {
    match key {
        keys::TIMEOUT_MINUTES => parse_timeout_minutes(value).map(|_| ()).map_err(|e| e.to_string()),
        keys::APPROVED_TOPIC_ID => value
            .parse::<i32>()
            .map(|_| ())
            .map_err(|e| e.to_string()),
        keys::MODERATION_GROUP_ID | keys::APPROVED_GROUP_ID => value
            .parse::<i64>()
            .map(|_| ())
            .map_err(|e| e.to_string()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{
        domain::{ChatId, MessageId, NewPost},
        testing::FlakyStore,
    };

    const ADMIN: UserId = UserId(123456789);

    fn commands(store: &Arc<FlakyStore>) -> AdminCommands {
        AdminCommands::new(
            AdminAllowList::new([ADMIN.0]),
            store.clone(),
            store.clone(),
        )
    }

    #[test]
    fn commands_parse_with_bot_suffix_and_args() {
        assert_eq!(parse_command("/Config@SaleBot KEY v a l"), Some(("config".to_string(), "KEY v a l")));
        assert_eq!(parse_command(" /pending "), Some(("pending".to_string(), "")));
        assert_eq!(parse_command("pending"), None);
        assert!(is_admin_command("/config"));
        assert!(is_admin_command("/pending@bot"));
        assert!(!is_admin_command("/start"));
    }

    #[tokio::test]
    async fn non_admin_is_denied_without_touching_storage() {
        let store = Arc::new(FlakyStore::new());
        let admin = commands(&store);
        for text in ["/pending", "/config", "/config TIMEOUT_MINUTES 5"] {
            let err = admin.handle(UserId(42), text).await.unwrap_err();
            assert!(matches!(err, Error::Authorization(_)));
        }
        assert_eq!(store.reads(), 0);
        assert!(store.inner.list_settings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_lists_one_line_per_post() {
        let store = Arc::new(FlakyStore::new());
        let admin = commands(&store);
        assert_eq!(admin.handle(ADMIN, "/pending").await.unwrap(), "No pending posts.");

        let now = Utc::now();
        store
            .inner
            .create(NewPost {
                user_id: UserId(555),
                chat_id: ChatId(555),
                message_id: MessageId(1),
                title: "My Item".to_string(),
                description: "d".to_string(),
                price: "p".to_string(),
                location: "l".to_string(),
                photos: vec![],
                created_at: now,
                expires_at: now + Duration::minutes(5),
            })
            .await
            .unwrap();

        let out = admin.handle(ADMIN, "/pending").await.unwrap();
        assert!(out.starts_with("ID: 1, User: 555, Title: My Item, Created: "), "{out}");
        assert_eq!(out.lines().count(), 1);
    }

    #[tokio::test]
    async fn config_set_then_get() {
        let store = Arc::new(FlakyStore::new());
        let admin = commands(&store);

        assert_eq!(
            admin.handle(ADMIN, "/config TIMEOUT_MINUTES 60").await.unwrap(),
            "Config updated: TIMEOUT_MINUTES = 60"
        );
        assert_eq!(
            admin.handle(ADMIN, "/config GREETING hello there").await.unwrap(),
            "Config updated: GREETING = hello there"
        );
        assert_eq!(
            admin.handle(ADMIN, "/config").await.unwrap(),
            "GREETING = hello there\nTIMEOUT_MINUTES = 60\n"
        );
    }

    #[tokio::test]
    async fn config_usage_and_validation_errors() {
        let store = Arc::new(FlakyStore::new());
        let admin = commands(&store);
        assert_eq!(
            admin.handle(ADMIN, "/config TIMEOUT_MINUTES").await.unwrap(),
            "Usage: /config KEY VALUE"
        );
        let out = admin.handle(ADMIN, "/config TIMEOUT_MINUTES 0").await.unwrap();
        assert!(out.starts_with("Invalid value for TIMEOUT_MINUTES"), "{out}");
        assert!(store.inner.list_settings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unrecognized_forms_are_unknown() {
        let store = Arc::new(FlakyStore::new());
        let admin = commands(&store);
        assert_eq!(
            admin.handle(ADMIN, "/pending now").await.unwrap(),
            "Unknown admin command."
        );
        assert_eq!(admin.handle(ADMIN, "/stats").await.unwrap(), "Unknown admin command.");
    }
}
