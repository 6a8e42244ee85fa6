//! SQLite implementation of the post and settings repositories.
//!
//! One connection behind a std mutex; every call runs on the blocking pool and
//! is a single statement or a single transaction.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};

use super::{PostRepository, SettingsRepository};
use crate::{
    domain::{ChatId, ConfigEntry, MessageId, NewPost, PhotoRef, Post, PostId, PostStatus, UserId},
    errors::Error,
    Result,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT
);

CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    chat_id INTEGER NOT NULL,
    message_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'rejected')),
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    price TEXT NOT NULL,
    location TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_status_title ON posts(status, title);
CREATE INDEX IF NOT EXISTS idx_posts_status_expires ON posts(status, expires_at);

CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    file_ref TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_post ON photos(post_id);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const POST_COLUMNS: &str = "id, user_id, chat_id, message_id, status, title, description, \
                            price, location, created_at, expires_at";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(journal_mode = %journal_mode, "WAL not available; using fallback journal");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::info!(path = %path.display(), "opened post database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::Persistence(format!("database task failed: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::Persistence("database connection mutex poisoned".to_string()))
}

/// RFC 3339 UTC at millisecond precision; lexical order matches time order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn status_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<PostStatus> {
    let raw: String = row.get(idx)?;
    PostStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown post status {raw:?}").into(),
        )
    })
}

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        chat_id: ChatId(row.get(2)?),
        message_id: MessageId(row.get(3)?),
        status: status_column(row, 4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        price: row.get(7)?,
        location: row.get(8)?,
        created_at: ts_column(row, 9)?,
        expires_at: ts_column(row, 10)?,
    })
}

fn query_posts(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(sql)?;
    let posts = stmt
        .query_map(args, row_to_post)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

#[async_trait]
impl PostRepository for SqliteStore {
    async fn create(&self, post: NewPost) -> Result<PostId> {
        let id = self
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO posts (user_id, chat_id, message_id, status, title, description,
                                        price, location, created_at, expires_at)
                     VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        post.user_id.0,
                        post.chat_id.0,
                        post.message_id.0,
                        post.title,
                        post.description,
                        post.price,
                        post.location,
                        format_ts(post.created_at),
                        format_ts(post.expires_at),
                    ],
                )?;
                let id = tx.last_insert_rowid();
                {
                    let mut stmt =
                        tx.prepare("INSERT INTO photos (post_id, file_ref) VALUES (?1, ?2)")?;
                    for photo in &post.photos {
                        stmt.execute(params![id, photo.as_str()])?;
                    }
                }
                tx.commit()?;
                Ok(PostId(id))
            })
            .await?;
        tracing::info!(post_id = id.0, "post stored");
        Ok(id)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>> {
        self.call(move |conn| {
            let post = conn
                .query_row(
                    &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                    params![id.0],
                    row_to_post,
                )
                .optional()?;
            Ok(post)
        })
        .await
    }

    async fn find_pending_by_title(&self, title: &str) -> Result<Option<Post>> {
        let title = title.to_string();
        self.call(move |conn| {
            let post = conn
                .query_row(
                    &format!(
                        "SELECT {POST_COLUMNS} FROM posts
                         WHERE status = 'pending' AND title = ?1
                         ORDER BY created_at DESC, id DESC
                         LIMIT 1"
                    ),
                    params![title],
                    row_to_post,
                )
                .optional()?;
            Ok(post)
        })
        .await
    }

    async fn set_status(&self, id: PostId, status: PostStatus) -> Result<()> {
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<String> = tx
                .query_row(
                    "SELECT status FROM posts WHERE id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(current) = current else {
                return Err(Error::NotFound(format!("post {id}")));
            };
            let current = PostStatus::parse(&current).ok_or_else(|| {
                Error::Persistence(format!("post {id} has unknown status {current:?}"))
            })?;
            if current != PostStatus::Pending || status == PostStatus::Pending {
                return Err(Error::InvalidTransition {
                    id: id.0,
                    status: current,
                });
            }
            tx.execute(
                "UPDATE posts SET status = ?1 WHERE id = ?2 AND status = 'pending'",
                params![status.as_str(), id.0],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;
        tracing::info!(post_id = id.0, status = %status, "post status changed");
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Post>> {
        self.call(|conn| {
            query_posts(
                conn,
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts WHERE status = 'pending'
                     ORDER BY created_at ASC, id ASC"
                ),
                [],
            )
        })
        .await
    }

    async fn list_photos(&self, id: PostId) -> Result<Vec<PhotoRef>> {
        self.call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT file_ref FROM photos WHERE post_id = ?1 ORDER BY id ASC")?;
            let refs = stmt
                .query_map(params![id.0], |row| row.get::<_, String>(0))?
                .map(|r| r.map(PhotoRef))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(refs)
        })
        .await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let now = format_ts(now);
        self.call(move |conn| {
            query_posts(
                conn,
                &format!(
                    "SELECT {POST_COLUMNS} FROM posts
                     WHERE status = 'pending' AND expires_at < ?1
                     ORDER BY expires_at ASC, id ASC"
                ),
                params![now],
            )
        })
        .await
    }

    async fn register_user(&self, user_id: UserId, username: Option<&str>) -> Result<()> {
        let username = username.map(str::to_string);
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET username = COALESCE(excluded.username, users.username)",
                params![user_id.0, username],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_username(&self, user_id: UserId) -> Result<Option<String>> {
        self.call(move |conn| {
            let name: Option<Option<String>> = conn
                .query_row(
                    "SELECT username FROM users WHERE id = ?1",
                    params![user_id.0],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(name.flatten().filter(|n| !n.is_empty()))
        })
        .await
    }
}

#[async_trait]
impl SettingsRepository for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.call(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM config WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO config (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_settings(&self) -> Result<Vec<ConfigEntry>> {
        self.call(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM config ORDER BY key ASC")?;
            let entries = stmt
                .query_map([], |row| {
                    Ok(ConfigEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }
}
