//! Core conversation engine
//!
//! This module contains the session that ties the transport, the stream
//! decoder and the conversation state together.

mod chat;

pub use chat::{ChatError, ChatSession};
