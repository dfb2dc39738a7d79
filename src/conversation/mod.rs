//! Conversation history shared by the interviewer, the candidate and every
//! backend collaborator.
//!
//! The history is an ordered, append-only list of `{role, content}` pairs.
//! It is seeded with a system prompt and an opening request when a session
//! starts, and is otherwise only ever extended.

pub mod history;

pub use history::{Conversation, ConversationMessage, Role, OPENING_REQUEST};
