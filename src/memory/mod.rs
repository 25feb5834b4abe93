//! Conversation memory
//!
//! Volatile, process-lifetime session registry with append-only message logs

pub mod store;

pub use store::{ConversationSession, ConversationStore, Message, MessageRole};
