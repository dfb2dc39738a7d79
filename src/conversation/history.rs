//! [`Conversation`] — the per-session message log.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Who produced a message.
///
/// Serialized with the chat-completion role names the backend expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Interviewer,
    #[serde(rename = "user")]
    Candidate,
}

// ---------------------------------------------------------------------------
// ConversationMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Opening request sent on the candidate's behalf so the interviewer greets
/// first.
pub const OPENING_REQUEST: &str = "Please start the interview. Greet me first.";

/// Append-only message log for one interview session.
///
/// After [`Conversation::seeded`] the log begins with exactly one system
/// message (carrying the résumé) followed by [`OPENING_REQUEST`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    /// An empty log, used before the first session starts.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh log seeded for a new session.
    pub fn seeded(resume_text: &str) -> Self {
        let system = format!(
            "You are the interviewer. Conduct the interview based on this résumé: {resume_text}"
        );
        Self {
            messages: vec![
                ConversationMessage::new(Role::System, system),
                ConversationMessage::new(Role::Candidate, OPENING_REQUEST),
            ],
        }
    }

    pub fn push_interviewer(&mut self, text: impl Into<String>) {
        self.messages
            .push(ConversationMessage::new(Role::Interviewer, text));
    }

    pub fn push_candidate(&mut self, text: impl Into<String>) {
        self.messages
            .push(ConversationMessage::new(Role::Candidate, text));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn to_vec(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of interviewer messages so far, i.e. questions asked.
    pub fn questions_asked(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Interviewer)
            .count()
    }

    /// The question the candidate is currently expected to answer.
    pub fn last_question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Interviewer)
            .map(|m| m.content.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
