//! Backend collaborators the interview core depends on.
//!
//! This module provides:
//! * [`UtteranceGenerator`] — next interviewer line, synthesized, plus the
//!   "interview is over" flag.
//! * [`Transcriber`] — captured answer audio → text.
//! * [`HintService`] — answer guidance for the current question.
//! * [`Evaluator`] — final score, feedback and summary for a full history.
//! * [`CandidateSimulator`] — a generated candidate answer (test mode).
//! * [`BackendClient`] — one HTTP client implementing all five against the
//!   interview backend.
//! * [`ServiceError`] — error variants shared by every collaborator call.

pub mod backend;
pub mod collaborators;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::BackendClient;
pub use collaborators::{
    CandidateSimulator, Evaluation, Evaluator, HintRequest, HintService, ServiceError,
    SimulationRequest, Transcriber, Utterance, UtteranceGenerator, UtteranceRequest,
};
