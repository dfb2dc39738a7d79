//! Everything the session loop reacts to.
//!
//! Commands come from the front end through a
//! [`SessionHandle`](super::SessionHandle); completions are posted back by
//! the tasks the loop spawns.  Completions carry the [`Ticket`] they were
//! issued under and are dropped once that ticket is no longer current, so a
//! late playback end, silence timeout or transcript can never act on a turn
//! that has moved on.

use tokio::sync::mpsc;

use crate::services::{Evaluation, ServiceError, Utterance};

use super::answer::AnswerError;

/// Monotonic tag for one outstanding turn-level request.
pub type Ticket = u64;

/// Monotonic id of one interview session (bumped by every `start`).
pub type SessionId = u64;

/// Sending half of the session event channel.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

#[derive(Debug)]
pub enum SessionEvent {
    // ---- Commands ---------------------------------------------------------
    /// Begin a new interview.
    Start,
    /// Pause the candidate turn and show a hint.
    RequestHint,
    /// Leave the hint and answer with a fresh capture.
    ResumeAfterHint,
    /// End the interview now and evaluate it.
    ManualFinish,
    /// Tear everything down and stop the loop.
    Shutdown,

    // ---- Completions ------------------------------------------------------
    UtteranceReady {
        ticket: Ticket,
        result: Result<Utterance, ServiceError>,
    },
    PlaybackEnded {
        ticket: Ticket,
    },
    /// The endpointer heard enough silence.
    EndOfSpeech {
        ticket: Ticket,
    },
    /// A simulated answer is ready for display (before the review delay).
    SimulatedAnswer {
        ticket: Ticket,
        text: String,
    },
    CandidateTextReady {
        ticket: Ticket,
        result: Result<String, AnswerError>,
    },
    HintReady {
        session: SessionId,
        question: String,
        result: Result<String, ServiceError>,
    },
    EvaluationDone {
        session: SessionId,
        result: Result<Evaluation, ServiceError>,
    },
    TimeExpired {
        session: SessionId,
    },
}

impl SessionEvent {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Start => "Start",
            SessionEvent::RequestHint => "RequestHint",
            SessionEvent::ResumeAfterHint => "ResumeAfterHint",
            SessionEvent::ManualFinish => "ManualFinish",
            SessionEvent::Shutdown => "Shutdown",
            SessionEvent::UtteranceReady { .. } => "UtteranceReady",
            SessionEvent::PlaybackEnded { .. } => "PlaybackEnded",
            SessionEvent::EndOfSpeech { .. } => "EndOfSpeech",
            SessionEvent::SimulatedAnswer { .. } => "SimulatedAnswer",
            SessionEvent::CandidateTextReady { .. } => "CandidateTextReady",
            SessionEvent::HintReady { .. } => "HintReady",
            SessionEvent::EvaluationDone { .. } => "EvaluationDone",
            SessionEvent::TimeExpired { .. } => "TimeExpired",
        }
    }
}
