//! Turn values and the session snapshot front ends render.
//!
//! [`Turn`] is owned by the state machine; [`SessionState`] is a read-only
//! mirror of everything a front end needs (turn, caption, history, hint,
//! evaluation, alert, question counter), published after every event.
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<SessionState>>`, cheap to
//! clone and safe to share across threads.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::conversation::ConversationMessage;
use crate::services::Evaluation;

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Whose move it is.
///
/// ```text
/// Idle ──start──▶ InterviewerTurn ──playback ended──▶ CandidateTurn
///                   ▲                                    │ end of speech
///                   │ utterance ready                    ▼
///                   └──────────────────────────────── Processing
///                                         (empty answer ──▶ CandidateTurn)
/// final utterance / manual finish / time up ──▶ Finishing ──evaluated──▶ Idle
/// any failure that stalls the session ──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Turn {
    /// No session running (not started, stalled, or evaluated).
    #[default]
    Idle,

    /// Waiting for, or playing, the interviewer's next utterance.
    InterviewerTurn,

    /// The candidate is answering (microphone open or simulator running).
    CandidateTurn,

    /// The answer is being transcribed, or the next question is being
    /// generated.
    Processing,

    /// The session is being evaluated.  Nothing may touch history any more.
    Finishing,
}

impl Turn {
    /// Returns `true` while an interview is in progress.
    ///
    /// ```
    /// use voice_interview::session::Turn;
    ///
    /// assert!(!Turn::Idle.is_busy());
    /// assert!(Turn::InterviewerTurn.is_busy());
    /// assert!(Turn::CandidateTurn.is_busy());
    /// assert!(Turn::Processing.is_busy());
    /// assert!(Turn::Finishing.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, Turn::Idle)
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            Turn::Idle => "Idle",
            Turn::InterviewerTurn => "Interviewer speaking",
            Turn::CandidateTurn => "Your turn",
            Turn::Processing => "Processing",
            Turn::Finishing => "Evaluating",
        }
    }
}

// ---------------------------------------------------------------------------
// Caption
// ---------------------------------------------------------------------------

/// Who a caption line is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speaker {
    #[default]
    None,
    Interviewer,
    Candidate,
}

/// The line currently shown under the interviewer avatar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Caption {
    pub speaker: Speaker,
    pub text: String,
}

impl Caption {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn interviewer(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Interviewer,
            text: text.into(),
        }
    }

    pub fn candidate(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Candidate,
            text: text.into(),
        }
    }

    /// Status text not attributed to anyone ("Listening…", "Paused").
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::None,
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Snapshot of one interview session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub turn: Turn,
    pub caption: Caption,
    /// Full history including the system seed.
    pub history: Vec<ConversationMessage>,
    /// The candidate turn is paused for a hint.
    pub paused: bool,
    /// Hint for the current question, once fetched.
    pub hint: Option<String>,
    pub hint_loading: bool,
    pub evaluation: Option<Evaluation>,
    pub evaluating: bool,
    /// Last user-visible problem.  Cleared when a new session starts.
    pub alert: Option<String>,
    pub questions_asked: usize,
    pub target_questions: u32,
    pub test_mode: bool,
}

impl SessionState {
    pub fn new(target_questions: u32, test_mode: bool) -> Self {
        Self {
            target_questions,
            test_mode,
            ..Self::default()
        }
    }
}

/// Thread-safe handle to the session snapshot.
pub type SharedState = Arc<Mutex<SessionState>>;

/// Construct a new [`SharedState`].
pub fn new_shared_state(target_questions: u32, test_mode: bool) -> SharedState {
    Arc::new(Mutex::new(SessionState::new(target_questions, test_mode)))
}

/// Lock `state`, recovering the data if a reader panicked while holding it.
pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
