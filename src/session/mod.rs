//! Interview session — turn-taking between the interviewer and the candidate.
//!
//! # Data flow
//!
//! ```text
//! SessionHandle ──commands──▶ ┌────────────────────┐ ──▶ UtteranceGenerator
//!                             │  InterviewSession  │ ──▶ PlaybackCoordinator ──▶ speaker
//!   spawned tasks ──results──▶│  (one event loop)  │ ──▶ AnswerProvider
//!                             └─────────┬──────────┘        ├─ CaptureSessionManager (mic)
//!                                       │                   └─ TestModeDriver (simulator)
//!                                       ▼
//!                              SharedState snapshot ──▶ front end
//! ```
//!
//! Hints go through [`HintCache`] and [`PauseController`]; evaluation goes
//! through [`SingleFlightGuard`].

pub mod answer;
pub mod capture;
pub mod events;
pub mod guard;
pub mod hint;
pub mod machine;
pub mod pause;
pub mod playback;
pub mod simulated;
pub mod state;

#[cfg(test)]
mod test_support;

pub use answer::{AnswerError, AnswerProvider, AnswerRequest, StopReason};
pub use capture::CaptureSessionManager;
pub use events::{EventSender, SessionEvent, SessionId, Ticket};
pub use guard::SingleFlightGuard;
pub use hint::HintCache;
pub use machine::{InterviewSession, SessionHandle, SessionServices, SessionSettings};
pub use pause::PauseController;
pub use playback::PlaybackCoordinator;
pub use simulated::TestModeDriver;
pub use state::{Caption, SessionState, SharedState, Speaker, Turn};
