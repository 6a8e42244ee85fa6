//! Moderation: sending submissions for review and acting on moderator decisions.

use std::sync::Arc;

use crate::{
    conversation::PostDraft,
    domain::{ChatId, MessageRef, Post, PostId, PostStatus},
    errors::Error,
    formatting::{escape_html, extract_title, parse_post_tag, post_tag, posted_by_html},
    i18n::{render, Key, Lang},
    messaging::{
        port::MessagingPort,
        types::{CallbackAction, InlineButton, InlineKeyboard, SendOptions},
    },
    store::{approved_topic_id, PostRepository, SettingsRepository},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ModerationTargets {
    pub moderation_chat: ChatId,
    pub approved_chat: ChatId,
    /// Thread used when the `APPROVED_TOPIC_ID` setting is absent.
    pub default_topic: Option<i32>,
}

/// What a moderator acted on.
#[derive(Clone, Debug)]
pub struct ModerationRef {
    /// The moderation message itself; removed once the decision is applied.
    pub message: MessageRef,
    /// Explicit id from callback data.
    pub post_id: Option<PostId>,
    /// Text of the moderation message, for tag or title correlation.
    pub text: Option<String>,
}

pub struct ModerationDispatcher {
    posts: Arc<dyn PostRepository>,
    settings: Arc<dyn SettingsRepository>,
    messenger: Arc<dyn MessagingPort>,
    targets: ModerationTargets,
    lang: Lang,
}

impl ModerationDispatcher {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        settings: Arc<dyn SettingsRepository>,
        messenger: Arc<dyn MessagingPort>,
        targets: ModerationTargets,
        lang: Lang,
    ) -> Self {
        Self {
            posts,
            settings,
            messenger,
            targets,
            lang,
        }
    }

    pub fn moderation_chat(&self) -> ChatId {
        self.targets.moderation_chat
    }

    /// Posts a freshly stored submission to the moderation chat.
    ///
    /// The summary carries the `#post<id>` tag and approve/reject buttons; each
    /// photo follows as its own message captioned with the tag.
    pub async fn submit_for_review(&self, id: PostId, draft: &PostDraft) -> Result<MessageRef> {
        let chat = self.targets.moderation_chat;
        let text = moderation_text(self.lang, id, draft);
        let opts = SendOptions::default().with_keyboard(moderation_keyboard(self.lang, id));
        let msg = self.messenger.send_text(chat, &text, opts).await?;

        let caption = render(self.lang, Key::ModerationPhoto, &[post_tag(id).as_str()]);
        for photo in &draft.photos {
            if let Err(e) = self
                .messenger
                .send_photo(chat, photo, Some(&caption), SendOptions::default())
                .await
            {
                tracing::warn!(post_id = id.0, error = %e, "failed to forward photo to moderation");
            }
        }
        tracing::info!(post_id = id.0, chat_id = chat.0, "post sent for moderation");
        Ok(msg)
    }

    /// Finds the pending post a moderation message refers to.
    pub async fn resolve(&self, target: &ModerationRef) -> Result<Post> {
        let text = target.text.as_deref();
        if let Some(id) = target.post_id.or_else(|| text.and_then(parse_post_tag)) {
            let post = self
                .posts
                .find_by_id(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("post {id}")))?;
            if post.status != PostStatus::Pending {
                return Err(Error::InvalidTransition {
                    id: id.0,
                    status: post.status,
                });
            }
            return Ok(post);
        }

        let title = text
            .and_then(extract_title)
            .ok_or_else(|| Error::NotFound("moderation message names no post".to_string()))?;
        self.posts
            .find_pending_by_title(&title)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pending post titled {title:?}")))
    }

    /// Approves and publishes. Publishing is best-effort once the status has changed.
    pub async fn approve(&self, target: &ModerationRef) -> Result<PostId> {
        let post = self.resolve(target).await?;
        self.posts.set_status(post.id, PostStatus::Approved).await?;
        tracing::info!(post_id = post.id.0, user_id = post.user_id.0, "post approved");

        self.publish(&post).await;
        self.remove(target.message, post.id).await;
        Ok(post.id)
    }

    /// Rejects and tells the submitter why. A blank reason uses the default text.
    pub async fn reject(&self, target: &ModerationRef, reason: &str) -> Result<PostId> {
        let post = self.resolve(target).await?;
        self.posts.set_status(post.id, PostStatus::Rejected).await?;
        tracing::info!(post_id = post.id.0, user_id = post.user_id.0, "post rejected");

        let reason = match reason.trim() {
            "" => render(self.lang, Key::DefaultRejectReason, &[]),
            r => r.to_string(),
        };
        let notice = render(self.lang, Key::PostRejected, &[reason.as_str()]);
        if let Err(e) = self
            .messenger
            .send_text(post.chat_id, &notice, SendOptions::default())
            .await
        {
            tracing::warn!(post_id = post.id.0, error = %e, "failed to notify submitter");
        }
        self.remove(target.message, post.id).await;
        Ok(post.id)
    }

    async fn publish(&self, post: &Post) {
        let username = match self.posts.find_username(post.user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id = post.user_id.0, error = %e, "username lookup failed");
                None
            }
        };
        let text = render(
            self.lang,
            Key::ForSale,
            &[
                escape_html(&post.title).as_str(),
                escape_html(&post.description).as_str(),
                escape_html(&post.price).as_str(),
                escape_html(&post.location).as_str(),
                posted_by_html(post.user_id, username.as_deref()).as_str(),
            ],
        );

        let chat = self.targets.approved_chat;
        let thread = approved_topic_id(self.settings.as_ref(), self.targets.default_topic).await;
        if let Err(e) = self
            .messenger
            .send_text(chat, &text, SendOptions::html().in_thread(thread))
            .await
        {
            tracing::error!(post_id = post.id.0, chat_id = chat.0, error = %e, "failed to publish approved post");
        }

        let photos = match self.posts.list_photos(post.id).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(post_id = post.id.0, error = %e, "failed to load photos for publishing");
                return;
            }
        };
        let caption = render(self.lang, Key::ApprovedPhoto, &[]);
        for photo in &photos {
            if let Err(e) = self
                .messenger
                .send_photo(chat, photo, Some(&caption), SendOptions::default().in_thread(thread))
                .await
            {
                tracing::warn!(post_id = post.id.0, error = %e, "failed to publish photo");
            }
        }
    }

    async fn remove(&self, msg: MessageRef, id: PostId) {
        if let Err(e) = self.messenger.delete_message(msg).await {
            tracing::warn!(post_id = id.0, error = %e, "failed to delete moderation message");
        }
    }
}

pub fn moderation_text(lang: Lang, id: PostId, draft: &PostDraft) -> String {
    let tag = post_tag(id);
    let photos = draft.photos.len().to_string();
    render(
        lang,
        Key::ModerationPreview,
        &[
            tag.as_str(),
            draft.title.as_str(),
            draft.description.as_str(),
            draft.price.as_str(),
            draft.location.as_str(),
            photos.as_str(),
        ],
    )
}

pub fn moderation_keyboard(lang: Lang, id: PostId) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton::new(
            render(lang, Key::ApproveButton, &[]),
            CallbackAction::Approve(id.0).data(),
        ),
        InlineButton::new(
            render(lang, Key::RejectButton, &[]),
            CallbackAction::Reject(id.0).data(),
        ),
    ])
}
