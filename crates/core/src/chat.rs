//! Chat types - conversation turns, sessions and a profile's history

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Format of session ids, one per second of creation time
pub const CHAT_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format of the human-readable session timestamp
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Human/user message
    #[serde(alias = "human")]
    User,
    /// Assistant/AI response
    Assistant,
}

impl MessageRole {
    /// Label used when rendering a transcript
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// The role of who sent this message
    pub role: MessageRole,

    /// The message content
    #[serde(alias = "text")]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// One conversation: an ordered sequence of turns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSession {
    /// Session id; stored as the key of the history map, not in the body
    #[serde(skip)]
    pub id: String,

    /// Human-readable title ("Chat 3")
    pub title: String,

    /// Creation time, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,

    /// The messages in this conversation
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Create an empty session
    pub fn new(id: impl Into<String>, title: impl Into<String>, created: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            timestamp: created.format(TIMESTAMP_FORMAT).to_string(),
            messages: Vec::new(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// The last `n` messages, oldest first
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Render the last `n` messages as `Role: content` lines
    pub fn context_transcript(&self, n: usize) -> String {
        self.recent(n)
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Convert the session to a formatted markdown string
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# {}\n\n", self.title));
        md.push_str(&format!("*Created: {}*\n\n", self.timestamp));

        for msg in &self.messages {
            md.push_str(&format!("**{}**: {}\n\n", msg.role.label(), msg.content));
        }

        md
    }
}

/// Every session of one profile, keyed by session id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatHistory {
    sessions: BTreeMap<String, ChatSession>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the on-disk JSON map (`chat_id -> session`)
    pub fn from_json(json: &str) -> Result<Self> {
        let mut sessions: BTreeMap<String, ChatSession> = serde_json::from_str(json)?;
        for (id, session) in sessions.iter_mut() {
            session.id = id.clone();
        }
        Ok(Self { sessions })
    }

    /// Serialize to the on-disk JSON map, pretty-printed
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.sessions)?)
    }

    /// Start a new session created at `now`
    ///
    /// Ids are the creation second; a clash gets a numeric suffix.
    pub fn new_session_at(&mut self, now: NaiveDateTime) -> &mut ChatSession {
        let base = now.format(CHAT_ID_FORMAT).to_string();
        let mut id = base.clone();
        let mut suffix = 2;
        while self.sessions.contains_key(&id) {
            id = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        let title = format!("Chat {}", self.sessions.len() + 1);
        let session = ChatSession::new(id.clone(), title, now);
        self.sessions.entry(id).or_insert(session)
    }

    /// Start a new session created now (local time)
    pub fn new_session(&mut self) -> &mut ChatSession {
        self.new_session_at(Local::now().naive_local())
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.get_mut(id)
    }

    /// Look up a session, failing with `ChatNotFound`
    pub fn require(&self, id: &str) -> Result<&ChatSession> {
        self.get(id).ok_or_else(|| CoreError::ChatNotFound(id.to_string()))
    }

    pub fn require_mut(&mut self, id: &str) -> Result<&mut ChatSession> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| CoreError::ChatNotFound(id.to_string()))
    }

    /// Sessions ordered by timestamp, newest first
    pub fn sessions_newest_first(&self) -> Vec<&ChatSession> {
        let mut sessions: Vec<&ChatSession> = self.sessions.values().collect();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        sessions
    }

    /// The most recently created session, if any
    pub fn latest(&self) -> Option<&ChatSession> {
        self.sessions_newest_first().into_iter().next()
    }

    pub fn remove(&mut self, id: &str) -> Option<ChatSession> {
        self.sessions.remove(id)
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Drop every session except `id`
    pub fn retain_only(&mut self, id: &str) {
        self.sessions.retain(|key, _| key == id);
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
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_new_session_ids_and_titles() {
        let mut history = ChatHistory::new();
        let first = history.new_session_at(at(9, 30, 0)).id.clone();
        let second = history.new_session_at(at(9, 30, 0)).id.clone();
        let third = history.new_session_at(at(9, 31, 5)).id.clone();

        assert_eq!(first, "20250314_093000");
        assert_eq!(second, "20250314_093000_2");
        assert_eq!(third, "20250314_093105");
        assert_eq!(history.get(&first).unwrap().title, "Chat 1");
        assert_eq!(history.get(&third).unwrap().title, "Chat 3");
        assert_eq!(history.get(&third).unwrap().timestamp, "2025-03-14 09:31:05");
    }

    #[test]
    fn test_sessions_newest_first() {
        let mut history = ChatHistory::new();
        history.new_session_at(at(8, 0, 0));
        history.new_session_at(at(10, 0, 0));
        history.new_session_at(at(9, 0, 0));

        let titles: Vec<&str> = history
            .sessions_newest_first()
            .iter()
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Chat 2", "Chat 3", "Chat 1"]);
        assert_eq!(history.latest().unwrap().title, "Chat 2");
    }

    #[test]
    fn test_context_transcript_uses_last_messages() {
        let mut session = ChatSession::new("x", "Chat 1", at(1, 0, 0));
        session.push_user("What is asthma?");
        session.push_assistant("A chronic airway condition.");
        session.push_user("Is it curable?");
        session.push_assistant("It can be controlled.");
        session.push_user("What triggers it?");

        let transcript = session.context_transcript(4);
        assert!(!transcript.contains("What is asthma?"));
        assert!(transcript.starts_with("Assistant: A chronic airway condition."));
        assert!(transcript.ends_with("User: What triggers it?"));
        assert_eq!(session.recent(10).len(), 5);
    }

    #[test]
    fn test_json_round_trip_restores_ids() {
        let mut history = ChatHistory::new();
        let session = history.new_session_at(at(12, 0, 0));
        session.push_user("héllo");
        session.push_assistant("hi");

        let json = history.to_json().unwrap();
        assert!(json.contains("\"20250314_120000\""));
        assert!(json.contains("héllo"));
        assert!(json.contains("\"role\": \"user\""));

        let restored = ChatHistory::from_json(&json).unwrap();
        assert_eq!(restored, history);
        assert_eq!(restored.get("20250314_120000").unwrap().id, "20250314_120000");
    }

    #[test]
    fn test_parse_legacy_file() {
        let json = r#"{
            "20240101_101010": {
                "title": "Chat 1",
                "timestamp": "2024-01-01 10:10:10",
                "messages": [
                    {"role": "user", "content": "Hello"},
                    {"role": "assistant", "content": "Hi there!"}
                ]
            }
        }"#;

        let history = ChatHistory::from_json(json).unwrap();
        let session = history.require("20240101_101010").unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
        assert!(history.require("missing").is_err());
    }

    #[test]
    fn test_retain_only_and_clear() {
        let mut history = ChatHistory::new();
        let keep = history.new_session_at(at(1, 0, 0)).id.clone();
        history.new_session_at(at(2, 0, 0));

        history.retain_only(&keep);
        assert_eq!(history.len(), 1);
        assert!(history.get(&keep).is_some());

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_to_markdown() {
        let mut session = ChatSession::new("x", "Chat 1", at(1, 2, 3));
        session.push_user("Hello");
        let md = session.to_markdown();
        assert!(md.starts_with("# Chat 1\n\n"));
        assert!(md.contains("**User**: Hello"));
    }
}
