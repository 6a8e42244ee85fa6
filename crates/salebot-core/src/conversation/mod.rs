//! Per-user sale-post conversation: typed states, the pure transition
//! function, and the service that runs effects against storage and messaging.

pub mod service;
pub mod state;
pub mod transition;

pub use service::{ConversationService, Outcome};
pub use state::{ConversationState, PostDraft, UserSession};
pub use transition::{transition, Effect, Input, Step};
