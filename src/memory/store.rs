//! Conversation session storage
//!
//! Sessions live for the process lifetime; messages are append-only and
//! never reordered. Each session sits behind its own async mutex so that
//! appends for one conversation are serialized while unrelated
//! conversations proceed independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::AgentError;
use crate::Result;

/// Marker used when the caller supplies no user identifier
pub const ANONYMOUS_USER: &str = "anonymous";

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A conversation's ordered message log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: Uuid,
    pub user_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump `updated_at`
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// In-memory registry of conversation sessions keyed by id
pub struct ConversationStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ConversationSession>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a fresh session and return its id
    pub async fn create(&self, user_id: Option<&str>) -> Uuid {
        let session = ConversationSession::new(user_id.unwrap_or(ANONYMOUS_USER));
        let id = session.id;

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(Mutex::new(session)));

        id
    }

    /// Handle to a session's lock, for callers that need to serialize a
    /// multi-step exchange against it
    pub async fn handle(&self, id: Uuid) -> Result<Arc<Mutex<ConversationSession>>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or(AgentError::ConversationNotFound(id))
    }

    /// Point-in-time copy of a session
    pub async fn snapshot(&self, id: Uuid) -> Result<ConversationSession> {
        let handle = self.handle(id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_snapshot() {
        let store = ConversationStore::new();
        let id = store.create(None).await;

        let session = store.snapshot(id).await.unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.user_id, ANONYMOUS_USER);
        assert!(session.messages.is_empty());
        assert!(session.updated_at >= session.created_at);
    }

    #[tokio::test]
    async fn test_unknown_id_has_no_side_effect() {
        let store = ConversationStore::new();
        store.create(None).await;

        let missing = Uuid::new_v4();
        let err = store.snapshot(missing).await.unwrap_err();
        assert!(matches!(err, AgentError::ConversationNotFound(_)));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_bumps_updated_at() {
        let store = ConversationStore::new();
        let id = store.create(Some("trader-7")).await;

        let handle = store.handle(id).await.unwrap();
        {
            let mut session = handle.lock().await;
            session.append(Message::user("What is AAPL doing?"));
            session.append(Message::assistant("AAPL is trending upward."));
        }

        let session = store.snapshot(id).await.unwrap();
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
        assert!(session.updated_at >= session.created_at);
        assert_eq!(session.user_id, "trader-7");
    }

    #[tokio::test]
    async fn test_created_ids_are_unique() {
        let store = ConversationStore::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(store.create(None).await));
        }
    }
}
