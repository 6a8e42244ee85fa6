//! Background scan for pending posts past their deadline.
//!
//! Reports only; expired posts stay pending until a moderator acts.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{domain::Post, errors::Error, store::PostRepository, Result};

pub struct ExpirationSweeper {
    posts: Arc<dyn PostRepository>,
    interval: Duration,
    budget: Duration,
}

impl ExpirationSweeper {
    pub fn new(posts: Arc<dyn PostRepository>, interval: Duration, budget: Duration) -> Self {
        Self {
            posts,
            interval,
            budget,
        }
    }

    /// One scan, bounded by the time budget.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let expired = tokio::time::timeout(self.budget, self.posts.sweep_expired(now))
            .await
            .map_err(|_| {
                Error::Persistence(format!("expiration scan exceeded {:?}", self.budget))
            })??;

        for post in &expired {
            tracing::info!(
                post_id = post.id.0,
                user_id = post.user_id.0,
                expires_at = %post.expires_at,
                "pending post expired"
            );
        }
        Ok(expired)
    }

    /// Runs `tick` every interval until `cancel` fires.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval = ?self.interval, "expiration sweeper started");
            let mut tick = tokio::time::interval(self.interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = cancel.cancelled() => break,
                  _ = tick.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        tracing::warn!(error = %e, "expiration sweep failed");
                    }
                  }
                }
            }
            tracing::info!("expiration sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration as Chrono;

    use super::*;
    use crate::{
        domain::{ChatId, MessageId, NewPost, PhotoRef, PostId, PostStatus, UserId},
        store::SqliteStore,
    };

    fn post(title: &str, expires_at: DateTime<Utc>) -> NewPost {
        NewPost {
            user_id: UserId(1),
            chat_id: ChatId(1),
            message_id: MessageId(1),
            title: title.to_string(),
            description: "d".to_string(),
            price: "p".to_string(),
            location: "l".to_string(),
            photos: vec![],
            created_at: expires_at - Chrono::minutes(10),
            expires_at,
        }
    }

    #[tokio::test]
    async fn tick_reports_expired_and_leaves_status_alone() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let now = Utc::now();
        let old = store.create(post("old", now - Chrono::minutes(1))).await.unwrap();
        store.create(post("new", now + Chrono::minutes(1))).await.unwrap();

        let sweeper = ExpirationSweeper::new(store.clone(), Duration::from_secs(60), Duration::from_secs(5));
        let expired = sweeper.tick(now).await.unwrap();
        assert_eq!(expired.iter().map(|p| p.id).collect::<Vec<_>>(), vec![old]);
        assert_eq!(
            store.find_by_id(old).await.unwrap().unwrap().status,
            PostStatus::Pending
        );
    }

    struct StuckRepo;

    #[async_trait]
    impl PostRepository for StuckRepo {
        async fn create(&self, _post: NewPost) -> Result<PostId> {
            unimplemented!()
        }
        async fn find_by_id(&self, _id: PostId) -> Result<Option<Post>> {
            unimplemented!()
        }
        async fn find_pending_by_title(&self, _title: &str) -> Result<Option<Post>> {
            unimplemented!()
        }
        async fn set_status(&self, _id: PostId, _status: PostStatus) -> Result<()> {
            unimplemented!()
        }
        async fn list_pending(&self) -> Result<Vec<Post>> {
            unimplemented!()
        }
        async fn list_photos(&self, _id: PostId) -> Result<Vec<PhotoRef>> {
            unimplemented!()
        }
        async fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<Vec<Post>> {
            std::future::pending().await
        }
        async fn register_user(&self, _user_id: UserId, _username: Option<&str>) -> Result<()> {
            unimplemented!()
        }
        async fn find_username(&self, _user_id: UserId) -> Result<Option<String>> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tick_gives_up_after_budget() {
        let sweeper = ExpirationSweeper::new(
            Arc::new(StuckRepo),
            Duration::from_secs(60),
            Duration::from_secs(2),
        );
        let err = sweeper.tick(Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn spawned_loop_stops_on_cancel() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let sweeper = Arc::new(ExpirationSweeper::new(
            store,
            Duration::from_secs(60),
            Duration::from_secs(5),
        ));
        let cancel = CancellationToken::new();
        let handle = sweeper.spawn(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
