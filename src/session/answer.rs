//! The candidate-turn capability.
//!
//! A candidate turn is satisfied either by the microphone
//! ([`CaptureSessionManager`](super::CaptureSessionManager)) or by the
//! candidate simulator ([`TestModeDriver`](super::TestModeDriver)).  The
//! state machine only sees [`AnswerProvider`]; which one it gets is decided
//! when the session is built.

use thiserror::Error;
use tokio::sync::watch;

use crate::audio::CaptureError;
use crate::conversation::ConversationMessage;
use crate::services::ServiceError;

use super::events::{EventSender, Ticket};

/// Why an answer is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The endpointer heard the candidate finish: submit what was captured.
    Endpointed,
    /// A hint interrupted the turn: throw the capture away.
    Paused,
    /// The session is finishing or shutting down: throw the capture away.
    Forced,
}

impl StopReason {
    /// Whether captured audio must be dropped instead of transcribed.
    pub fn discards(&self) -> bool {
        !matches!(self, StopReason::Endpointed)
    }
}

/// Everything a provider needs to produce one answer.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub ticket: Ticket,
    pub history: Vec<ConversationMessage>,
    pub resume_text: String,
    /// Where to post `EndOfSpeech`, `SimulatedAnswer` and
    /// `CandidateTextReady`.
    pub events: EventSender,
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("could not open the microphone: {0}")]
    Device(CaptureError),

    #[error("could not transcribe the answer: {0}")]
    Transcription(CaptureError),

    #[error("could not simulate an answer: {0}")]
    Simulation(ServiceError),
}

impl AnswerError {
    /// Transcription problems are retried with a fresh capture; everything
    /// else stalls the turn.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnswerError::Transcription(_))
    }
}

/// Produces the candidate's answer for one turn.
///
/// `begin` and `stop` are synchronous: they start or cancel background work
/// and release devices before returning.  Results arrive later as session
/// events tagged with the request's ticket.
pub trait AnswerProvider: Send {
    /// Start answering.  Any previous answer still running is torn down
    /// first.
    fn begin(&mut self, request: AnswerRequest) -> Result<(), AnswerError>;

    /// Stop the current answer.  Safe to call when nothing is running.
    fn stop(&mut self, reason: StopReason);

    /// Whether an answer is currently being captured or simulated.
    fn is_active(&self) -> bool;

    /// Caption shown while the candidate answers.
    fn prompt_caption(&self) -> &'static str;

    /// Live input level for visual feedback, if this provider has one.
    fn volume(&self) -> Option<watch::Receiver<f32>> {
        None
    }
}
