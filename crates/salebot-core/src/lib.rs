//! Core domain + application logic for the sale-post bot.
//!
//! Framework-agnostic: Telegram lives behind `messaging::port::MessagingPort`,
//! implemented in the adapter crate.

pub mod admin;
pub mod app;
pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod i18n;
pub mod logging;
pub mod messaging;
pub mod moderation;
pub mod session;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
