//! Messenger-facing abstractions: the outbound port and the incoming update model.

pub mod port;
pub mod throttled;
pub mod types;
