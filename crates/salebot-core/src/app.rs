//! Update routing: moderation replies, admin commands, private conversations
//! and inline-button callbacks.

use std::sync::Arc;

use crate::{
    admin::{is_admin_command, parse_command, AdminAllowList, AdminCommands},
    config::{Config, DEFAULT_TIMEOUT_MINUTES},
    conversation::{ConversationService, Input},
    domain::{ChatId, PostId},
    errors::Error,
    formatting::extract_title,
    i18n::{render, Key, Lang},
    messaging::{
        port::MessagingPort,
        types::{CallbackAction, CallbackQuery, IncomingMessage, IncomingUpdate, InlineKeyboard, SendOptions},
    },
    moderation::{ModerationDispatcher, ModerationRef, ModerationTargets},
    session::SessionStore,
    store::{PostRepository, SettingsRepository},
    Result,
};

pub struct SaleBot {
    messenger: Arc<dyn MessagingPort>,
    conversation: ConversationService,
    moderation: Arc<ModerationDispatcher>,
    admin: AdminCommands,
    lang: Lang,
}

impl SaleBot {
    pub fn new(
        cfg: &Config,
        posts: Arc<dyn PostRepository>,
        settings: Arc<dyn SettingsRepository>,
        messenger: Arc<dyn MessagingPort>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let moderation = Arc::new(ModerationDispatcher::new(
            posts.clone(),
            settings.clone(),
            messenger.clone(),
            ModerationTargets {
                moderation_chat: cfg.moderation_chat,
                approved_chat: cfg.approved_chat,
                default_topic: cfg.approved_topic_id,
            },
            cfg.lang,
        ));
        let conversation = ConversationService::new(
            sessions,
            posts.clone(),
            settings.clone(),
            moderation.clone(),
            cfg.lang,
            cfg.timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES),
        );
        let admin = AdminCommands::new(
            AdminAllowList::new(cfg.admins.iter().copied()),
            settings,
            posts,
        );
        Self {
            messenger,
            conversation,
            moderation,
            admin,
            lang: cfg.lang,
        }
    }

    pub async fn handle(&self, update: IncomingUpdate) {
        match update {
            IncomingUpdate::Message(msg) => self.on_message(msg).await,
            IncomingUpdate::Callback(q) => self.on_callback(q).await,
        }
    }

    fn moderation_chat(&self) -> ChatId {
        self.moderation.moderation_chat()
    }

    async fn on_message(&self, msg: IncomingMessage) {
        let chat = msg.chat_id();

        if chat == self.moderation_chat() {
            if let Some(replied) = &msg.reply_to {
                // Photos follow the summary with a tagged caption; only the summary takes decisions.
                if replied.text.as_deref().and_then(extract_title).is_none() {
                    tracing::debug!(
                        message_id = replied.message.message_id.0,
                        "moderator reply is not on a post summary; ignoring"
                    );
                    return;
                }
                let target = ModerationRef {
                    message: replied.message,
                    post_id: None,
                    text: replied.text.clone(),
                };
                let decision = msg.text.as_deref().unwrap_or("").trim();
                if is_approve_reply(decision) {
                    log_moderation("approve", self.moderation.approve(&target).await);
                } else {
                    log_moderation("reject", self.moderation.reject(&target, decision).await);
                }
                return;
            }
        }

        if let Some(text) = msg.text.as_deref().filter(|t| is_admin_command(t)) {
            let reply = match self.admin.handle(msg.user_id, text).await {
                Ok(reply) => reply,
                Err(Error::Authorization(_)) => render(self.lang, Key::Unauthorized, &[]),
                Err(e) => {
                    tracing::error!(user_id = msg.user_id.0, error = %e, "admin command failed");
                    e.to_string()
                }
            };
            self.reply(chat, &reply, SendOptions::default().reply_to(msg.message))
                .await;
            return;
        }

        if !chat.is_private() {
            tracing::debug!(chat_id = chat.0, user_id = msg.user_id.0, "ignoring group message");
            return;
        }

        let input = Input {
            text: msg.text.clone(),
            photos: msg.photos.clone(),
            username: msg.username.clone(),
            done_button: false,
        };
        let outcome = self.conversation.handle(msg.user_id, msg.message, input).await;

        let mut opts = SendOptions::default().reply_to(msg.message);
        if outcome.awaiting_photos {
            opts = opts.with_keyboard(self.done_keyboard());
        }
        self.reply(chat, &outcome.reply, opts).await;
    }

    async fn on_callback(&self, q: CallbackQuery) {
        match CallbackAction::parse(&q.data) {
            Some(CallbackAction::Done) => self.on_done(&q).await,
            Some(action @ (CallbackAction::Approve(_) | CallbackAction::Reject(_))) => {
                self.on_moderation_button(&q, action).await
            }
            None => {
                tracing::debug!(data = %q.data, "unknown callback data");
            }
        }

        if let Err(e) = self
            .messenger
            .answer_callback_query(&q.callback_id, None)
            .await
        {
            tracing::warn!(error = %e, "failed to answer callback query");
        }
    }

    async fn on_done(&self, q: &CallbackQuery) {
        let Some(msg) = q.message else {
            tracing::debug!(user_id = q.user_id.0, "done callback without a message");
            return;
        };
        let input = Input::done_button().with_username(q.username.clone());
        let outcome = self.conversation.handle(q.user_id, msg, input).await;

        if let Err(e) = self.messenger.edit_text(msg, &outcome.reply).await {
            tracing::warn!(error = %e, "failed to edit message; sending instead");
            self.reply(msg.chat_id, &outcome.reply, SendOptions::default())
                .await;
        }
    }

    async fn on_moderation_button(&self, q: &CallbackQuery, action: CallbackAction) {
        let Some(msg) = q.message.filter(|m| m.chat_id == self.moderation_chat()) else {
            tracing::warn!(user_id = q.user_id.0, data = %q.data, "moderation button outside the moderation chat");
            return;
        };
        match action {
            CallbackAction::Approve(id) => {
                let target = ModerationRef {
                    message: msg,
                    post_id: Some(PostId(id)),
                    text: None,
                };
                log_moderation("approve", self.moderation.approve(&target).await);
            }
            CallbackAction::Reject(id) => {
                let target = ModerationRef {
                    message: msg,
                    post_id: Some(PostId(id)),
                    text: None,
                };
                log_moderation("reject", self.moderation.reject(&target, "").await);
            }
            CallbackAction::Done => {}
        }
    }

    fn done_keyboard(&self) -> InlineKeyboard {
        InlineKeyboard::single(
            render(self.lang, Key::DoneButton, &[]),
            CallbackAction::Done.data(),
        )
    }

    async fn reply(&self, chat: ChatId, text: &str, opts: SendOptions) {
        if let Err(e) = self.messenger.send_text(chat, text, opts).await {
            tracing::error!(chat_id = chat.0, error = %e, "failed to send reply");
        }
    }
}

fn is_approve_reply(text: &str) -> bool {
    text == "✅" || matches!(parse_command(text), Some((name, "")) if name == "approve")
}

fn log_moderation(action: &str, result: Result<PostId>) {
    match result {
        Ok(id) => tracing::info!(post_id = id.0, action, "moderation decision applied"),
        Err(e) if e.is_stale_moderation() => {
            tracing::warn!(action, error = %e, "moderation target is not pending; ignoring")
        }
        Err(e) => tracing::error!(action, error = %e, "moderation decision failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::{
        conversation::ConversationState,
        domain::{MessageId, MessageRef, PhotoRef, PostStatus, UserId},
        messaging::types::RepliedMessage,
        testing::{FakeMessenger, FlakyStore, Sent},
    };

    const MODS: ChatId = ChatId(-100);
    const PUBLIC: ChatId = ChatId(-200);
    const SELLER: UserId = UserId(555);
    const ADMIN: i64 = 123456789;

    struct Fixture {
        store: Arc<FlakyStore>,
        messenger: Arc<FakeMessenger>,
        sessions: Arc<SessionStore>,
        bot: SaleBot,
    }

    fn config() -> Config {
        Config {
            telegram_bot_token: "x".to_string(),
            moderation_chat: MODS,
            approved_chat: PUBLIC,
            approved_topic_id: None,
            admins: vec![ADMIN],
            lang: Lang::En,
            timeout_minutes: None,
            database_path: PathBuf::from(":memory:"),
            sweep_interval: None,
            sweep_budget: Duration::from_secs(10),
        }
    }

    fn fixture() -> Fixture {
        let store = Arc::new(FlakyStore::new());
        let messenger = Arc::new(FakeMessenger::default());
        let sessions = Arc::new(SessionStore::new());
        let bot = SaleBot::new(
            &config(),
            store.clone(),
            store.clone(),
            messenger.clone(),
            sessions.clone(),
        );
        Fixture {
            store,
            messenger,
            sessions,
            bot,
        }
    }

    fn msg_ref(chat_id: ChatId, id: i32) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    fn private_text(id: i32, text: &str) -> IncomingUpdate {
        IncomingUpdate::Message(IncomingMessage {
            message: msg_ref(ChatId(SELLER.0), id),
            user_id: SELLER,
            username: Some("seller".to_string()),
            text: Some(text.to_string()),
            photos: vec![],
            reply_to: None,
        })
    }

    fn private_photo(id: i32, file_id: &str) -> IncomingUpdate {
        IncomingUpdate::Message(IncomingMessage {
            message: msg_ref(ChatId(SELLER.0), id),
            user_id: SELLER,
            username: Some("seller".to_string()),
            text: None,
            photos: vec![PhotoRef::new(file_id)],
            reply_to: None,
        })
    }

    fn callback(data: &str, message: MessageRef) -> IncomingUpdate {
        IncomingUpdate::Callback(CallbackQuery {
            user_id: UserId(ADMIN),
            username: None,
            callback_id: format!("cb-{data}"),
            data: data.to_string(),
            message: Some(message),
        })
    }

    fn moderator_reply(text: &str, replied: &Sent) -> IncomingUpdate {
        let Sent::Text { text: review, .. } = replied else {
            panic!("expected a review text: {replied:?}");
        };
        IncomingUpdate::Message(IncomingMessage {
            message: msg_ref(MODS, 900),
            user_id: UserId(ADMIN),
            username: None,
            text: Some(text.to_string()),
            photos: vec![],
            reply_to: Some(RepliedMessage {
                message: msg_ref(MODS, 1),
                text: Some(review.clone()),
            }),
        })
    }

    async fn submit(f: &Fixture) -> Sent {
        for (n, text) in ["/start", "My Item", "A great item", "$42", "Tel Aviv"]
            .into_iter()
            .enumerate()
        {
            f.bot.handle(private_text(n as i32 + 1, text)).await;
        }
        f.bot.handle(private_photo(6, "photo_1")).await;
        f.bot.handle(private_text(7, "done")).await;
        f.bot.handle(private_text(8, "confirm")).await;

        f.messenger
            .sent()
            .into_iter()
            .find(|s| matches!(s, Sent::Text { chat_id, .. } if *chat_id == MODS))
            .unwrap()
    }

    #[tokio::test]
    async fn replies_quote_the_user_and_offer_done_while_collecting_photos() {
        let f = fixture();
        f.bot.handle(private_text(1, "/start")).await;
        for (n, text) in ["t", "d", "p", "l"].into_iter().enumerate() {
            f.bot.handle(private_text(n as i32 + 2, text)).await;
        }

        let sent = f.messenger.sent();
        let Some(Sent::Text { opts, text, .. }) = sent.last() else {
            panic!("expected a reply");
        };
        assert_eq!(text, "Send one or more photos (type 'done' when finished):");
        assert_eq!(opts.reply_to, Some(msg_ref(ChatId(SELLER.0), 5)));
        let keyboard = opts.keyboard.as_ref().unwrap();
        assert_eq!(keyboard.buttons[0].callback_data, "done");
        assert_eq!(keyboard.buttons[0].label, "Done");

        let Sent::Text { opts, .. } = &sent[0] else {
            panic!("expected welcome");
        };
        assert!(opts.keyboard.is_none());
    }

    #[tokio::test]
    async fn done_button_previews_by_editing_the_prompt() {
        let f = fixture();
        for (n, text) in ["/start", "t", "d", "p", "l"].into_iter().enumerate() {
            f.bot.handle(private_text(n as i32 + 1, text)).await;
        }
        let prompt = msg_ref(ChatId(SELLER.0), 42);
        f.bot
            .handle(IncomingUpdate::Callback(CallbackQuery {
                user_id: SELLER,
                username: None,
                callback_id: "cb".to_string(),
                data: "done".to_string(),
                message: Some(prompt),
            }))
            .await;

        let sent = f.messenger.sent();
        assert!(sent.iter().any(
            |s| matches!(s, Sent::Edit { msg, text } if *msg == prompt && text.starts_with("Preview:"))
        ));
        assert_eq!(
            sent.last(),
            Some(&Sent::Answer {
                callback_id: "cb".to_string(),
                text: None
            })
        );
        let session = f.sessions.snapshot(SELLER).await.unwrap();
        assert!(matches!(session.state, ConversationState::Preview(_)));
    }

    #[tokio::test]
    async fn approve_button_publishes_and_answers() {
        let f = fixture();
        submit(&f).await;
        let id = f.store.list_pending().await.unwrap()[0].id;

        f.bot
            .handle(callback(&format!("approve:{id}"), msg_ref(MODS, 1)))
            .await;

        assert_eq!(
            f.store.find_by_id(id).await.unwrap().unwrap().status,
            PostStatus::Approved
        );
        assert_eq!(f.messenger.texts_to(PUBLIC).len(), 1);
        assert_eq!(f.messenger.photos_to(PUBLIC).len(), 1);
        assert_eq!(f.messenger.deleted(), vec![msg_ref(MODS, 1)]);
        assert!(matches!(f.messenger.sent().last(), Some(Sent::Answer { .. })));
    }

    #[tokio::test]
    async fn moderation_buttons_elsewhere_are_ignored_but_answered() {
        let f = fixture();
        submit(&f).await;
        let id = f.store.list_pending().await.unwrap()[0].id;
        let before = f.messenger.sent().len();

        f.bot
            .handle(callback(&format!("reject:{id}"), msg_ref(ChatId(-999), 1)))
            .await;

        assert_eq!(
            f.store.find_by_id(id).await.unwrap().unwrap().status,
            PostStatus::Pending
        );
        let sent = f.messenger.sent();
        assert_eq!(sent.len(), before + 1);
        assert!(matches!(sent.last(), Some(Sent::Answer { .. })));
    }

    #[tokio::test]
    async fn moderator_reply_rejects_with_reason() {
        let f = fixture();
        let review = submit(&f).await;
        let id = f.store.list_pending().await.unwrap()[0].id;

        f.bot.handle(moderator_reply("too vague", &review)).await;

        assert_eq!(
            f.store.find_by_id(id).await.unwrap().unwrap().status,
            PostStatus::Rejected
        );
        let notices = f.messenger.texts_to(ChatId(SELLER.0));
        assert_eq!(notices.last().map(String::as_str), Some("Your post was rejected: too vague"));
        assert_eq!(f.messenger.deleted(), vec![msg_ref(MODS, 1)]);
    }

    #[tokio::test]
    async fn moderator_checkmark_reply_approves() {
        let f = fixture();
        let review = submit(&f).await;
        let id = f.store.list_pending().await.unwrap()[0].id;

        f.bot.handle(moderator_reply("✅", &review)).await;
        assert_eq!(
            f.store.find_by_id(id).await.unwrap().unwrap().status,
            PostStatus::Approved
        );

        // Acting again on the same review is a silent no-op.
        let before = f.messenger.sent().len();
        f.bot.handle(moderator_reply("/approve", &review)).await;
        assert_eq!(f.messenger.sent().len(), before);
    }

    #[tokio::test]
    async fn non_admin_pending_is_denied_without_reads() {
        let f = fixture();
        f.bot.handle(private_text(1, "/pending")).await;

        assert_eq!(
            f.messenger.texts_to(ChatId(SELLER.0)),
            vec!["You are not authorized to use this command.".to_string()]
        );
        assert_eq!(f.store.reads(), 0);
        assert!(f.sessions.snapshot(SELLER).await.is_none());
    }

    #[tokio::test]
    async fn admin_commands_reply_to_the_command() {
        let f = fixture();
        let cmd = IncomingUpdate::Message(IncomingMessage {
            message: msg_ref(MODS, 50),
            user_id: UserId(ADMIN),
            username: None,
            text: Some("/config TIMEOUT_MINUTES 30".to_string()),
            photos: vec![],
            reply_to: None,
        });
        f.bot.handle(cmd).await;

        let Some(Sent::Text { chat_id, text, opts }) = f.messenger.sent().pop() else {
            panic!("expected a reply");
        };
        assert_eq!(chat_id, MODS);
        assert_eq!(text, "Config updated: TIMEOUT_MINUTES = 30");
        assert_eq!(opts.reply_to, Some(msg_ref(MODS, 50)));
    }

    #[tokio::test]
    async fn other_group_chats_are_ignored() {
        let f = fixture();
        f.bot
            .handle(IncomingUpdate::Message(IncomingMessage {
                message: msg_ref(ChatId(-555), 1),
                user_id: SELLER,
                username: None,
                text: Some("/start".to_string()),
                photos: vec![],
                reply_to: None,
            }))
            .await;
        assert!(f.messenger.sent().is_empty());
        assert!(f.sessions.snapshot(SELLER).await.is_none());
    }

    #[tokio::test]
    async fn leftover_done_button_does_not_fill_a_new_draft() {
        let f = fixture();
        f.bot.handle(private_text(1, "/start")).await;
        f.bot
            .handle(IncomingUpdate::Callback(CallbackQuery {
                user_id: SELLER,
                username: None,
                callback_id: "old".to_string(),
                data: "done".to_string(),
                message: Some(msg_ref(ChatId(SELLER.0), 3)),
            }))
            .await;

        let session = f.sessions.snapshot(SELLER).await.unwrap();
        assert_eq!(session.state, ConversationState::Title);
        assert!(matches!(f.messenger.sent().last(), Some(Sent::Answer { .. })));
    }

    #[tokio::test]
    async fn replies_to_moderation_photos_take_no_decision() {
        let f = fixture();
        submit(&f).await;
        let id = f.store.list_pending().await.unwrap()[0].id;
        let before = f.messenger.sent().len();

        f.bot
            .handle(IncomingUpdate::Message(IncomingMessage {
                message: msg_ref(MODS, 901),
                user_id: UserId(ADMIN),
                username: None,
                text: Some("nice bike".to_string()),
                photos: vec![],
                reply_to: Some(RepliedMessage {
                    message: msg_ref(MODS, 2),
                    text: Some(format!("Photo for post #post{id}")),
                }),
            }))
            .await;

        assert_eq!(
            f.store.find_by_id(id).await.unwrap().unwrap().status,
            PostStatus::Pending
        );
        assert_eq!(f.messenger.sent().len(), before);
        assert!(f.messenger.deleted().is_empty());
    }

    #[test]
    fn approve_reply_accepts_command_forms() {
        assert!(is_approve_reply("✅"));
        assert!(is_approve_reply("/approve"));
        assert!(is_approve_reply("/Approve@SaleBot"));
        assert!(!is_approve_reply("/approved"));
        assert!(!is_approve_reply("looks fine"));
    }
}
