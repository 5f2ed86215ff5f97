use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

/// One entry in the append-only conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Reference to a document the user brought into the conversation,
/// either something reachable over HTTP or a local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum DocumentRef {
    Url(String),
    Path(String),
}

impl DocumentRef {
    pub fn display(&self) -> &str {
        match self {
            DocumentRef::Url(s) | DocumentRef::Path(s) => s,
        }
    }
}

/// Per-connection conversation state. Created when a chat surface
/// connects, dropped when it disconnects; never written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub turns: Vec<ConversationTurn>,
    pub last_crawled_url: Option<String>,
    pub active_document: Option<DocumentRef>,
    /// Text of the most recent document review, kept as grounding for
    /// follow-up questions.
    pub last_review: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            last_crawled_url: None,
            active_document: None,
            last_review: None,
        }
    }

    pub fn push_turn(&mut self, role: TurnRole, text: impl Into<String>) {
        self.turns.push(ConversationTurn::new(role, text));
    }

    /// The most recent turns, oldest first, capped at `max`.
    pub fn recent_turns(&self, max: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(max);
        &self.turns[start..]
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory map of live sessions. One logical request is processed per
/// session at a time; callers take the session out, run the turn, and
/// put the updated session back.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<Uuid, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions.insert(id, session);
        tracing::debug!("session {} created ({} live)", id, self.sessions.len());
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn take(&mut self, id: &Uuid) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn put(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&mut self, id: &Uuid) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::debug!("session {} destroyed ({} live)", id, self.sessions.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_are_append_only_and_ordered() {
        let mut session = Session::new();
        session.push_turn(TurnRole::User, "find papers on graph attention");
        session.push_turn(TurnRole::Agent, "Here are three papers...");

        assert_eq!(session.turns.len(), 2);
        assert_eq!(session.turns[0].role, TurnRole::User);
        assert_eq!(session.turns[1].role, TurnRole::Agent);
        assert!(session.turns[0].timestamp <= session.turns[1].timestamp);
    }

    #[test]
    fn recent_turns_caps_at_max() {
        let mut session = Session::new();
        for i in 0..10 {
            session.push_turn(TurnRole::User, format!("message {}", i));
        }
        let recent = session.recent_turns(4);
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].text, "message 6");
    }

    #[test]
    fn store_lifecycle() {
        let mut store = SessionStore::new();
        let id = store.create();
        assert!(store.get(&id).is_some());

        let mut session = store.take(&id).unwrap();
        session.last_crawled_url = Some("https://example.com".to_string());
        store.put(session);

        assert_eq!(
            store.get(&id).unwrap().last_crawled_url.as_deref(),
            Some("https://example.com")
        );
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
    }
}
