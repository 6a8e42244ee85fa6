//! Pure conversation transition function.
//!
//! Given the same state and input it always produces the same step. Storage
//! and messaging happen in the service, driven by the returned effect.

use super::state::{ConversationState, PostDraft};
use crate::{
    admin::parse_command,
    domain::PhotoRef,
    i18n::{Key, Reply},
};

/// One inbound user event, stripped of transport details.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Input {
    pub text: Option<String>,
    pub photos: Vec<PhotoRef>,
    pub username: Option<String>,
    /// Inline Done button. Only meaningful while collecting photos.
    pub done_button: bool,
}

impl Input {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn photos(photos: Vec<PhotoRef>) -> Self {
        Self {
            photos,
            ..Self::default()
        }
    }

    pub fn done_button() -> Self {
        Self {
            done_button: true,
            ..Self::default()
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }
}

/// Side effect requested by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    RegisterUser { username: Option<String> },
    Submit(PostDraft),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub next: ConversationState,
    pub effect: Option<Effect>,
    pub reply: Reply,
}

impl Step {
    fn to(next: ConversationState, key: Key) -> Self {
        Self {
            next,
            effect: None,
            reply: Reply::new(key),
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    fn with_reply(mut self, reply: Reply) -> Self {
        self.reply = reply;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keyword {
    Start,
    Reset,
    Done,
    Confirm,
    Cancel,
}

enum Event<'a> {
    Text(&'a str),
    Photos(&'a [PhotoRef]),
    DoneButton,
    Unsupported,
}

impl<'a> Event<'a> {
    fn of(input: &'a Input) -> Self {
        if input.done_button {
            return Event::DoneButton;
        }
        if !input.photos.is_empty() {
            return Event::Photos(&input.photos);
        }
        match input.text.as_deref() {
            Some(t) => Event::Text(t),
            None => Event::Unsupported,
        }
    }
}

fn keyword(text: &str) -> Option<Keyword> {
    let t = text.trim();
    let command = |name: &str| matches!(parse_command(t), Some((n, "")) if n == name);
    if command("start") {
        return Some(Keyword::Start);
    }
    if command("reset") {
        return Some(Keyword::Reset);
    }
    if t.eq_ignore_ascii_case("done") {
        Some(Keyword::Done)
    } else if t.eq_ignore_ascii_case("confirm") {
        Some(Keyword::Confirm)
    } else if t.eq_ignore_ascii_case("cancel") {
        Some(Keyword::Cancel)
    } else {
        None
    }
}

pub fn preview_reply(draft: &PostDraft) -> Reply {
    Reply::new(Key::Preview)
        .arg(&draft.title)
        .arg(&draft.description)
        .arg(&draft.price)
        .arg(&draft.location)
        .arg(draft.photos.len())
}

fn reprompt(state: ConversationState) -> Step {
    let reply = match &state {
        ConversationState::Idle => Reply::new(Key::Start),
        ConversationState::Title => Reply::new(Key::Welcome),
        ConversationState::Description { .. } => Reply::new(Key::EnterDescription),
        ConversationState::Price { .. } => Reply::new(Key::EnterPrice),
        ConversationState::Location { .. } => Reply::new(Key::EnterLocation),
        ConversationState::Photos(_) => Reply::new(Key::SendPhotoOrDone),
        ConversationState::Preview(_) => Reply::new(Key::SendConfirmOrCancel),
    };
    Step {
        next: state,
        effect: None,
        reply,
    }
}

fn finish_photos(draft: PostDraft) -> Step {
    let reply = preview_reply(&draft);
    Step::to(ConversationState::Preview(draft), Key::Preview).with_reply(reply)
}

fn reset() -> Step {
    Step::to(ConversationState::Idle, Key::SessionReset)
}

pub fn transition(state: ConversationState, input: &Input) -> Step {
    use ConversationState as S;

    let event = Event::of(input);
    let kw = match event {
        Event::Text(t) => keyword(t),
        _ => None,
    };

    if kw == Some(Keyword::Reset) {
        return reset();
    }

    match (state, event) {
        (S::Idle, Event::Text(_)) if kw == Some(Keyword::Start) => {
            Step::to(S::Title, Key::Welcome).with_effect(Effect::RegisterUser {
                username: input.username.clone(),
            })
        }
        (S::Idle, _) => Step::to(S::Idle, Key::Start),

        // Text-collecting states keep the text verbatim, keywords included.
        (state @ (S::Title | S::Description { .. } | S::Price { .. } | S::Location { .. }), Event::Text(t))
            if t.trim().is_empty() =>
        {
            reprompt(state)
        }
        (S::Title, Event::Text(t)) => Step::to(
            S::Description {
                title: t.to_string(),
            },
            Key::EnterDescription,
        ),
        (S::Description { title }, Event::Text(t)) => Step::to(
            S::Price {
                title,
                description: t.to_string(),
            },
            Key::EnterPrice,
        ),
        (
            S::Price {
                title,
                description,
            },
            Event::Text(t),
        ) => Step::to(
            S::Location {
                title,
                description,
                price: t.to_string(),
            },
            Key::EnterLocation,
        ),
        (
            S::Location {
                title,
                description,
                price,
            },
            Event::Text(t),
        ) => Step::to(
            S::Photos(PostDraft {
                title,
                description,
                price,
                location: t.to_string(),
                photos: Vec::new(),
            }),
            Key::SendPhotos,
        ),

        (S::Photos(mut draft), Event::Photos(photos)) => {
            draft.photos.extend_from_slice(photos);
            Step::to(S::Photos(draft), Key::PhotoReceived)
        }
        (S::Photos(draft), Event::DoneButton) => finish_photos(draft),
        (S::Photos(draft), Event::Text(_)) if kw == Some(Keyword::Done) => finish_photos(draft),
        (S::Photos(draft), Event::Text(_)) => Step::to(S::Photos(draft), Key::SendPhotoOrDone),

        (S::Preview(draft), Event::Text(_)) if kw == Some(Keyword::Confirm) => {
            Step::to(S::Idle, Key::PostSubmitted).with_effect(Effect::Submit(draft))
        }
        (S::Preview(_), Event::Text(_)) if kw == Some(Keyword::Cancel) => {
            Step::to(S::Idle, Key::PostCancelled)
        }
        (S::Preview(draft), Event::Text(_)) => Step::to(S::Preview(draft), Key::SendConfirmOrCancel),

        // A Done button left over from an earlier photo prompt.
        (state, Event::DoneButton) => reprompt(state),

        // Content the current state cannot use.
        (_, Event::Photos(_) | Event::Unsupported) => reset(),
    }
}
