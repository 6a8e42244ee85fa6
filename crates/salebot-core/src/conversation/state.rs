use crate::domain::{PhotoRef, UserId};

/// A finished form, ready for preview and commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub description: String,
    pub price: String,
    pub location: String,
    pub photos: Vec<PhotoRef>,
}

/// Conversation progress. Each variant carries exactly the fields collected so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    Title,
    Description {
        title: String,
    },
    Price {
        title: String,
        description: String,
    },
    Location {
        title: String,
        description: String,
        price: String,
    },
    Photos(PostDraft),
    Preview(PostDraft),
}

impl ConversationState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Title => "title",
            Self::Description { .. } => "description",
            Self::Price { .. } => "price",
            Self::Location { .. } => "location",
            Self::Photos(_) => "photos",
            Self::Preview(_) => "preview",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The draft once every text field is in, if the conversation got that far.
    pub fn draft(&self) -> Option<&PostDraft> {
        match self {
            Self::Photos(d) | Self::Preview(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserSession {
    pub user_id: UserId,
    pub state: ConversationState,
}

impl UserSession {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: ConversationState::Idle,
        }
    }
}
