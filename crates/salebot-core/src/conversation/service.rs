use std::sync::Arc;

use chrono::Utc;

use super::{
    state::{ConversationState, PostDraft},
    transition::{transition, Effect, Input, Step},
};
use crate::{
    domain::{MessageRef, NewPost, PostId, UserId},
    i18n::{Key, Lang, Reply},
    moderation::ModerationDispatcher,
    session::SessionStore,
    store::{timeout_minutes, PostRepository, SettingsRepository},
    Result,
};

/// Rendered response to one user event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub reply: String,
    /// The user is now collecting photos; the adapter offers a Done button.
    pub awaiting_photos: bool,
}

/// Runs transitions under the user's session lock and applies their effects.
pub struct ConversationService {
    sessions: Arc<SessionStore>,
    posts: Arc<dyn PostRepository>,
    settings: Arc<dyn SettingsRepository>,
    moderation: Arc<ModerationDispatcher>,
    lang: Lang,
    default_ttl_minutes: u64,
}

impl ConversationService {
    pub fn new(
        sessions: Arc<SessionStore>,
        posts: Arc<dyn PostRepository>,
        settings: Arc<dyn SettingsRepository>,
        moderation: Arc<ModerationDispatcher>,
        lang: Lang,
        default_ttl_minutes: u64,
    ) -> Self {
        Self {
            sessions,
            posts,
            settings,
            moderation,
            lang,
            default_ttl_minutes,
        }
    }

    /// `origin` is the user's message; a commit records it as the post's origin.
    pub async fn handle(&self, user_id: UserId, origin: MessageRef, input: Input) -> Outcome {
        // Held until the effect is applied, so one user's events never interleave.
        let mut session = self.sessions.get_or_create(user_id).await;

        // The stored state stays untouched until the effect settles, so a dropped
        // future leaves the user where they were.
        let from = session.state.name();
        let prev = session.state.clone();
        let Step {
            next,
            effect,
            reply,
        } = transition(prev, &input);

        let reply = match effect {
            None => {
                session.state = next;
                reply
            }
            Some(Effect::RegisterUser { username }) => {
                if let Err(e) = self.posts.register_user(user_id, username.as_deref()).await {
                    tracing::error!(user_id = user_id.0, error = %e, "failed to register user");
                } else {
                    tracing::info!(user_id = user_id.0, username = ?username, "user started a post");
                }
                session.state = next;
                reply
            }
            Some(Effect::Submit(draft)) => match self.commit(user_id, origin, &draft).await {
                Ok(id) => {
                    session.state = next;
                    self.forward(id, &draft).await
                }
                Err(e) => {
                    tracing::error!(user_id = user_id.0, error = %e, "failed to save post");
                    session.state = ConversationState::Preview(draft);
                    Reply::new(Key::FailedSave)
                }
            },
        };

        tracing::debug!(
            user_id = user_id.0,
            from,
            to = session.state.name(),
            "conversation step"
        );

        Outcome {
            reply: reply.render(self.lang),
            awaiting_photos: matches!(session.state, ConversationState::Photos(_)),
        }
    }

    async fn commit(&self, user_id: UserId, origin: MessageRef, draft: &PostDraft) -> Result<PostId> {
        let ttl = timeout_minutes(self.settings.as_ref(), self.default_ttl_minutes).await;
        let created_at = Utc::now();
        // parse_timeout_minutes bounds the TTL, so this cannot overflow.
        let expires_at = created_at + chrono::Duration::minutes(ttl as i64);

        self.posts
            .create(NewPost {
                user_id,
                chat_id: origin.chat_id,
                message_id: origin.message_id,
                title: draft.title.clone(),
                description: draft.description.clone(),
                price: draft.price.clone(),
                location: draft.location.clone(),
                photos: draft.photos.clone(),
                created_at,
                expires_at,
            })
            .await
    }

    async fn forward(&self, id: PostId, draft: &PostDraft) -> Reply {
        match self.moderation.submit_for_review(id, draft).await {
            Ok(_) => Reply::new(Key::PostSubmitted),
            Err(e) => {
                tracing::error!(post_id = id.0, error = %e, "failed to forward post to moderation");
                Reply::new(Key::PostSavedFailedForward)
            }
        }
    }
}
