use crate::domain::{ChatId, MessageRef, PhotoRef, UserId};

/// Messenger-neutral incoming update.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub message: MessageRef,
    pub user_id: UserId,
    pub username: Option<String>,
    /// Message text. Photo captions are not text.
    pub text: Option<String>,
    /// One reference per attached photo, in arrival order.
    pub photos: Vec<PhotoRef>,
    pub reply_to: Option<RepliedMessage>,
}

impl IncomingMessage {
    pub fn chat_id(&self) -> ChatId {
        self.message.chat_id
    }
}

/// The message a reply points at.
#[derive(Clone, Debug)]
pub struct RepliedMessage {
    pub message: MessageRef,
    /// Text or caption of the replied-to message.
    pub text: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub user_id: UserId,
    pub username: Option<String>,
    pub callback_id: String,
    pub data: String,
    /// The message the button was attached to, when Telegram still has it.
    pub message: Option<MessageRef>,
}

/// Inline keyboard rendered as a single row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    pub fn single(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self::new(vec![InlineButton::new(label, callback_data)])
    }
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Send with HTML parse mode.
    pub html: bool,
    pub reply_to: Option<MessageRef>,
    /// Forum topic (message thread) in the target chat.
    pub thread_id: Option<i32>,
    pub keyboard: Option<InlineKeyboard>,
}

impl SendOptions {
    pub fn html() -> Self {
        Self {
            html: true,
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, msg: MessageRef) -> Self {
        self.reply_to = Some(msg);
        self
    }

    pub fn in_thread(mut self, thread_id: Option<i32>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Callback payloads carried by inline buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Done,
    Approve(i64),
    Reject(i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        if data == "done" {
            return Some(Self::Done);
        }
        let (verb, id) = data.split_once(':')?;
        let id = id.trim().parse::<i64>().ok()?;
        match verb {
            "approve" => Some(Self::Approve(id)),
            "reject" => Some(Self::Reject(id)),
            _ => None,
        }
    }

    pub fn data(self) -> String {
        match self {
            Self::Done => "done".to_string(),
            Self::Approve(id) => format!("approve:{id}"),
            Self::Reject(id) => format!("reject:{id}"),
        }
    }
}
