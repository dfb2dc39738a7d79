//! Collaborator traits and the request/response types they exchange.
//!
//! Every trait is object-safe and `Send + Sync` so the session can hold the
//! implementations behind `Arc<dyn …>` and call them from spawned tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioPayload;
use crate::conversation::ConversationMessage;

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Errors that can occur while calling a backend collaborator.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Input for the next interviewer utterance.
#[derive(Debug, Clone)]
pub struct UtteranceRequest {
    pub history: Vec<ConversationMessage>,
    /// Job role being interviewed for.
    pub role: String,
    /// Target number of questions for the whole session.
    pub question_count: u32,
}

/// One synthesized interviewer statement.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub audio: AudioPayload,
    /// The interviewer is closing the session with this utterance.
    pub is_final: bool,
}

/// Input for answer guidance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRequest {
    /// The most recent interviewer question.
    pub question: String,
    pub resume_text: String,
    pub role: String,
}

/// Input for a simulated candidate answer.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub history: Vec<ConversationMessage>,
    pub resume_text: String,
}

/// Result of scoring a finished interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Overall score out of 100.
    pub score: u32,
    pub feedback: String,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait UtteranceGenerator: Send + Sync {
    async fn next_utterance(&self, request: UtteranceRequest) -> Result<Utterance, ServiceError>;
}

/// Speech-to-text.  An empty string means no intelligible speech.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: AudioPayload) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait HintService: Send + Sync {
    async fn hint(&self, request: HintRequest) -> Result<String, ServiceError>;
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, history: Vec<ConversationMessage>) -> Result<Evaluation, ServiceError>;
}

#[async_trait]
pub trait CandidateSimulator: Send + Sync {
    async fn simulate(&self, request: SimulationRequest) -> Result<String, ServiceError>;
}
