//! [`InterviewSession`] — the turn-taking state machine.
//!
//! One tokio task drains the session event channel and handles events one
//! at a time; every network call, playback wait, capture and timer runs in
//! a spawned task that reports back on the same channel.
//!
//! # Turn flow
//!
//! ```text
//! Start ──▶ seed history ──▶ UtteranceGenerator            [InterviewerTurn]
//!   UtteranceReady ──▶ append interviewer line ──▶ play
//!   PlaybackEnded
//!     ├─ closing line ──▶ finalize                          [Finishing]
//!     └─ otherwise    ──▶ AnswerProvider::begin             [CandidateTurn]
//!   EndOfSpeech ──▶ stop(Endpointed) ──▶ transcribe         [Processing]
//!   CandidateTextReady
//!     ├─ text  ──▶ append candidate line ──▶ next utterance [Processing]
//!     └─ empty ──▶ fresh capture (bounded)                  [CandidateTurn]
//!
//! RequestHint (CandidateTurn) ──▶ pause + discard ──▶ cached / fetched hint
//! ResumeAfterHint             ──▶ fresh capture
//! ManualFinish / TimeExpired  ──▶ finalize (single flight) ──▶ EvaluationDone ──▶ Idle
//! ```
//!
//! Completions carry the ticket they were issued under; anything not
//! matching the current ticket is dropped before it reaches a handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::audio::PlaybackSink;
use crate::config::AppConfig;
use crate::conversation::Conversation;
use crate::services::{
    Evaluation, Evaluator, HintRequest, HintService, ServiceError, Utterance,
    UtteranceGenerator, UtteranceRequest,
};

use super::answer::{AnswerError, AnswerProvider, AnswerRequest, StopReason};
use super::events::{EventSender, SessionEvent, SessionId, Ticket};
use super::guard::SingleFlightGuard;
use super::hint::HintCache;
use super::pause::PauseController;
use super::playback::PlaybackCoordinator;
use super::state::{lock, new_shared_state, Caption, SessionState, SharedState, Turn};

// ---------------------------------------------------------------------------
// Construction inputs
// ---------------------------------------------------------------------------

/// Per-session parameters.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub role: String,
    pub target_question_count: u32,
    pub resume_text: String,
    /// Force-finalize after this long.  `None` disables the timer.
    pub session_time_limit: Option<Duration>,
    /// Consecutive transcriptions without an answer tolerated per question.
    /// Empty results and transcription failures share this one cap.
    /// `None` retries forever.
    pub max_silent_retries: Option<u32>,
    pub test_mode: bool,
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig, resume_text: impl Into<String>) -> Self {
        Self {
            role: config.interview.role.clone(),
            target_question_count: config.interview.target_question_count,
            resume_text: resume_text.into(),
            session_time_limit: config.interview.session_time_limit(),
            max_silent_retries: match config.interview.max_silent_retries {
                0 => None,
                n => Some(n),
            },
            test_mode: config.interview.test_mode,
        }
    }
}

/// Collaborators the state machine calls directly.  Transcription and
/// simulation live behind the [`AnswerProvider`].
#[derive(Clone)]
pub struct SessionServices {
    pub utterances: Arc<dyn UtteranceGenerator>,
    pub hints: Arc<dyn HintService>,
    pub evaluator: Arc<dyn Evaluator>,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Command surface and read-only view of a running session.
///
/// Cheap to clone.  Commands are queued; they return `false` only when the
/// session loop has already stopped.
#[derive(Clone)]
pub struct SessionHandle {
    events: EventSender,
    state: SharedState,
    volume: Option<watch::Receiver<f32>>,
}

impl SessionHandle {
    pub fn start(&self) -> bool {
        self.send(SessionEvent::Start)
    }

    pub fn request_hint(&self) -> bool {
        self.send(SessionEvent::RequestHint)
    }

    pub fn resume(&self) -> bool {
        self.send(SessionEvent::ResumeAfterHint)
    }

    /// Hint if answering, resume if paused.
    pub fn toggle_hint(&self) -> bool {
        if self.snapshot().paused {
            self.resume()
        } else {
            self.request_hint()
        }
    }

    pub fn finish(&self) -> bool {
        self.send(SessionEvent::ManualFinish)
    }

    pub fn shutdown(&self) -> bool {
        self.send(SessionEvent::Shutdown)
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> SessionState {
        lock(&self.state).clone()
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Live microphone level in `[0, 1]`; `None` in test mode.
    pub fn volume(&self) -> Option<watch::Receiver<f32>> {
        self.volume.clone()
    }

    fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

// ---------------------------------------------------------------------------
// InterviewSession
// ---------------------------------------------------------------------------

pub struct InterviewSession {
    settings: SessionSettings,
    services: SessionServices,
    answers: Box<dyn AnswerProvider>,
    playback: PlaybackCoordinator,
    pause: PauseController,
    guard: SingleFlightGuard,
    hints: HintCache,
    conversation: Conversation,

    turn: Turn,
    ticket: Ticket,
    session: SessionId,
    /// The utterance being played closes the interview.
    final_pending: bool,
    /// The current session already has an evaluation.
    evaluated: bool,
    silent_retries: u32,

    timer: Option<JoinHandle<()>>,
    utterance_task: Option<JoinHandle<()>>,

    state: SharedState,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl InterviewSession {
    pub fn new(
        settings: SessionSettings,
        services: SessionServices,
        answers: Box<dyn AnswerProvider>,
        sink: Arc<dyn PlaybackSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = new_shared_state(settings.target_question_count, settings.test_mode);

        Self {
            settings,
            services,
            answers,
            playback: PlaybackCoordinator::new(sink),
            pause: PauseController::new(),
            guard: SingleFlightGuard::new(),
            hints: HintCache::new(),
            conversation: Conversation::new(),
            turn: Turn::Idle,
            ticket: 0,
            session: 0,
            final_pending: false,
            evaluated: false,
            silent_retries: 0,
            timer: None,
            utterance_task: None,
            state,
            events_tx,
            events_rx,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            events: self.events_tx.clone(),
            state: Arc::clone(&self.state),
            volume: self.answers.volume(),
        }
    }

    /// Spawn the event loop and return its handle.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Handle events until `Shutdown`.
    ///
    /// The session keeps a sender for its own tasks, so the channel never
    /// closes by itself; send `Shutdown` to stop.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            if !self.dispatch(event) {
                break;
            }
        }
        log::info!("session: event loop stopped");
    }

    /// Handle one event.  Returns `false` once the loop should stop.
    fn dispatch(&mut self, event: SessionEvent) -> bool {
        log::debug!("session: {} during {}", event.name(), self.turn.label());

        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::RequestHint => self.on_hint_requested(),
            SessionEvent::ResumeAfterHint => self.on_hint_resumed(),
            SessionEvent::ManualFinish => self.on_manual_finish(),
            SessionEvent::Shutdown => {
                self.shutdown();
                self.publish();
                return false;
            }

            SessionEvent::UtteranceReady { ticket, result } => {
                if self.is_current(ticket, "UtteranceReady") {
                    self.on_utterance_ready(result);
                }
            }
            SessionEvent::PlaybackEnded { ticket } => {
                if self.is_current(ticket, "PlaybackEnded") {
                    self.on_playback_ended();
                }
            }
            SessionEvent::EndOfSpeech { ticket } => {
                if self.is_current(ticket, "EndOfSpeech") {
                    self.on_end_of_speech();
                }
            }
            SessionEvent::SimulatedAnswer { ticket, text } => {
                if self.is_current(ticket, "SimulatedAnswer") {
                    self.on_simulated_answer(text);
                }
            }
            SessionEvent::CandidateTextReady { ticket, result } => {
                if self.is_current(ticket, "CandidateTextReady") {
                    self.on_candidate_text_ready(result);
                }
            }
            SessionEvent::HintReady {
                session,
                question,
                result,
            } => {
                if session == self.session {
                    self.on_hint_ready(question, result);
                }
            }
            SessionEvent::EvaluationDone { session, result } => {
                if session == self.session {
                    self.on_evaluation_done(result);
                }
            }
            SessionEvent::TimeExpired { session } => {
                if session == self.session {
                    self.on_time_expired();
                }
            }
        }

        self.publish();
        true
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn start(&mut self) {
        if self.turn != Turn::Idle {
            log::warn!("session: start ignored during {}", self.turn.label());
            return;
        }

        self.session += 1;
        self.guard.reset();
        self.hints.invalidate();
        self.pause.reset();
        self.final_pending = false;
        self.evaluated = false;
        self.silent_retries = 0;
        self.cancel_timer();
        self.conversation = Conversation::seeded(&self.settings.resume_text);

        self.update(|st| {
            st.caption = Caption::clear();
            st.hint = None;
            st.hint_loading = false;
            st.evaluation = None;
            st.evaluating = false;
            st.alert = None;
        });

        if let Some(limit) = self.settings.session_time_limit {
            let events = self.events_tx.clone();
            let session = self.session;
            self.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                let _ = events.send(SessionEvent::TimeExpired { session });
            }));
        }

        log::info!(
            "session: interview #{} started ({}, {} questions{})",
            self.session,
            self.settings.role,
            self.settings.target_question_count,
            if self.settings.test_mode { ", test mode" } else { "" }
        );
        self.request_utterance(Turn::InterviewerTurn);
    }

    fn on_hint_requested(&mut self) {
        if self.turn != Turn::CandidateTurn {
            log::debug!("session: hint ignored during {}", self.turn.label());
            return;
        }

        if self.pause.pause(self.answers.as_mut(), &mut self.playback) {
            // Whatever the stopped answer may still post is now stale.
            self.next_ticket();
        }
        self.update(|st| st.caption = Caption::status("Paused"));

        let Some(question) = self.conversation.last_question().map(str::to_string) else {
            log::warn!("session: hint requested before any question");
            self.update(|st| st.alert = Some("There is no question to hint for yet.".into()));
            self.on_hint_resumed();
            return;
        };

        if let Some(hint) = self.hints.get(&question) {
            log::debug!("session: serving cached hint");
            let hint = hint.to_string();
            self.update(|st| {
                st.hint = Some(hint);
                st.hint_loading = false;
            });
            return;
        }

        if !self.hints.begin_fetch(&question) {
            log::debug!("session: hint already loading");
            return;
        }

        self.update(|st| st.hint_loading = true);

        let request = HintRequest {
            question: question.clone(),
            resume_text: self.settings.resume_text.clone(),
            role: self.settings.role.clone(),
        };
        let hints = Arc::clone(&self.services.hints);
        let events = self.events_tx.clone();
        let session = self.session;
        tokio::spawn(async move {
            let result = hints.hint(request).await;
            let _ = events.send(SessionEvent::HintReady {
                session,
                question,
                result,
            });
        });
    }

    fn on_hint_resumed(&mut self) {
        if !self.pause.resume() {
            return;
        }
        if self.turn != Turn::CandidateTurn {
            return;
        }
        log::info!("session: resuming candidate turn");
        self.begin_answer();
    }

    fn on_manual_finish(&mut self) {
        if self.turn == Turn::Idle
            && (self.conversation.is_empty() || self.evaluated || self.guard.is_locked())
        {
            log::debug!("session: nothing to finish");
            return;
        }
        log::info!("session: finish requested during {}", self.turn.label());
        self.finalize();
    }

    fn shutdown(&mut self) {
        log::info!("session: shutting down");
        self.next_ticket();
        self.answers.stop(StopReason::Forced);
        self.playback.stop();
        self.pause.reset();
        self.cancel_timer();
        self.cancel_utterance();
        self.turn = Turn::Idle;
        self.update(|st| st.caption = Caption::clear());
    }

    // -----------------------------------------------------------------------
    // Completions
    // -----------------------------------------------------------------------

    fn on_utterance_ready(&mut self, result: Result<Utterance, ServiceError>) {
        if !matches!(self.turn, Turn::InterviewerTurn | Turn::Processing) {
            return;
        }

        let utterance = match result {
            Ok(u) => u,
            Err(e) => {
                // No automatic retry: the session stalls until the candidate
                // starts again or finishes.
                log::error!("session: next utterance failed: {e}");
                self.turn = Turn::Idle;
                self.update(|st| {
                    st.caption = Caption::clear();
                    st.alert = Some(format!("The interviewer could not respond: {e}"));
                });
                return;
            }
        };

        log::info!(
            "session: interviewer says {:?}{}",
            utterance.text,
            if utterance.is_final { " (closing)" } else { "" }
        );

        self.conversation.push_interviewer(utterance.text.clone());
        self.hints.invalidate();
        self.final_pending = utterance.is_final;
        self.turn = Turn::InterviewerTurn;

        let text = utterance.text;
        self.update(|st| {
            st.caption = Caption::interviewer(text);
            st.hint = None;
            st.hint_loading = false;
        });

        let ticket = self.next_ticket();
        self.playback
            .play(ticket, utterance.audio, self.events_tx.clone());
    }

    fn on_playback_ended(&mut self) {
        if self.turn != Turn::InterviewerTurn {
            return;
        }
        if self.final_pending {
            log::info!("session: closing line played");
            self.finalize();
        } else {
            self.begin_answer();
        }
    }

    fn on_end_of_speech(&mut self) {
        if self.turn != Turn::CandidateTurn || self.pause.is_paused() {
            return;
        }
        self.answers.stop(StopReason::Endpointed);
        self.turn = Turn::Processing;
        self.update(|st| st.caption = Caption::status("Processing…"));
    }

    fn on_simulated_answer(&mut self, text: String) {
        if self.turn == Turn::CandidateTurn {
            self.update(|st| st.caption = Caption::candidate(text));
        }
    }

    fn on_candidate_text_ready(&mut self, result: Result<String, AnswerError>) {
        if self.pause.discard_pending() {
            log::debug!("session: discarding answer captured before a hint");
            return;
        }
        if !matches!(self.turn, Turn::CandidateTurn | Turn::Processing) {
            return;
        }

        match result {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    log::info!("session: no speech detected, listening again");
                    self.retry_answer();
                } else {
                    self.accept_answer(text.to_string());
                }
            }
            Err(e) if e.is_retryable() => {
                log::warn!("session: {e}; listening again");
                self.retry_answer();
            }
            Err(e) => {
                log::error!("session: {e}");
                self.answers.stop(StopReason::Forced);
                self.turn = Turn::Idle;
                self.update(|st| {
                    st.caption = Caption::clear();
                    st.alert = Some(e.to_string());
                });
            }
        }
    }

    fn on_hint_ready(&mut self, question: String, result: Result<String, ServiceError>) {
        let hint = result.as_ref().ok().cloned();
        if !self.hints.finish_fetch(&question, hint)
            || self.conversation.last_question() != Some(question.as_str())
        {
            log::debug!("session: dropping hint for an earlier question");
            return;
        }

        match result {
            Ok(hint) => {
                let paused = self.pause.is_paused();
                self.update(|st| {
                    st.hint_loading = false;
                    if paused {
                        st.hint = Some(hint);
                    }
                });
            }
            Err(e) => {
                log::warn!("session: hint failed: {e}");
                self.update(|st| {
                    st.hint_loading = false;
                    st.alert = Some(format!("Could not fetch a hint: {e}"));
                });
                if self.pause.is_paused() {
                    self.on_hint_resumed();
                }
            }
        }
    }

    fn on_time_expired(&mut self) {
        if self.turn == Turn::Finishing || self.guard.is_locked() || self.evaluated {
            return;
        }
        if self.turn == Turn::Idle && self.conversation.is_empty() {
            return;
        }
        log::info!("session: time limit reached during {}", self.turn.label());
        self.update(|st| st.alert = Some("Time is up.".into()));
        self.finalize();
    }

    fn on_evaluation_done(&mut self, result: Result<Evaluation, ServiceError>) {
        self.guard.release();
        self.turn = Turn::Idle;

        match result {
            Ok(evaluation) => {
                log::info!("session: evaluation complete, score {}", evaluation.score);
                self.evaluated = true;
                self.update(|st| {
                    st.caption = Caption::clear();
                    st.evaluating = false;
                    st.evaluation = Some(evaluation);
                });
            }
            Err(e) => {
                log::error!("session: evaluation failed: {e}");
                self.update(|st| {
                    st.caption = Caption::clear();
                    st.evaluating = false;
                    st.alert = Some(format!("Evaluation failed: {e}. Finish again to retry."));
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Ask the generator for the next interviewer line while in `turn`.
    fn request_utterance(&mut self, turn: Turn) {
        self.turn = turn;
        self.cancel_utterance();

        let ticket = self.next_ticket();
        let request = UtteranceRequest {
            history: self.conversation.to_vec(),
            role: self.settings.role.clone(),
            question_count: self.settings.target_question_count,
        };
        let generator = Arc::clone(&self.services.utterances);
        let events = self.events_tx.clone();

        self.utterance_task = Some(tokio::spawn(async move {
            let result = generator.next_utterance(request).await;
            let _ = events.send(SessionEvent::UtteranceReady { ticket, result });
        }));
    }

    /// Open a fresh candidate answer.
    fn begin_answer(&mut self) {
        let ticket = self.next_ticket();
        self.turn = Turn::CandidateTurn;
        self.pause.capture_opened();

        let request = AnswerRequest {
            ticket,
            history: self.conversation.to_vec(),
            resume_text: self.settings.resume_text.clone(),
            events: self.events_tx.clone(),
        };
        let prompt = self.answers.prompt_caption();

        match self.answers.begin(request) {
            Ok(()) => self.update(|st| st.caption = Caption::status(prompt)),
            Err(e) => {
                log::error!("session: {e}");
                self.turn = Turn::Idle;
                self.update(|st| {
                    st.caption = Caption::clear();
                    st.alert = Some(e.to_string());
                });
            }
        }
    }

    fn accept_answer(&mut self, text: String) {
        log::info!("session: candidate answered {text:?}");
        self.conversation.push_candidate(text.clone());
        self.silent_retries = 0;
        self.update(|st| st.caption = Caption::candidate(text));
        self.request_utterance(Turn::Processing);
    }

    /// Listen again after an empty or failed transcription, up to the cap.
    fn retry_answer(&mut self) {
        self.silent_retries += 1;

        if let Some(max) = self.settings.max_silent_retries {
            if self.silent_retries > max {
                log::warn!(
                    "session: giving up after {} attempts without an answer",
                    self.silent_retries
                );
                self.answers.stop(StopReason::Forced);
                self.turn = Turn::Idle;
                let attempts = self.silent_retries;
                self.update(|st| {
                    st.caption = Caption::clear();
                    st.alert = Some(format!(
                        "No answer was detected after {attempts} attempts."
                    ));
                });
                return;
            }
        }

        self.begin_answer();
    }

    /// Stop everything and evaluate, at most once.
    fn finalize(&mut self) {
        self.next_ticket();
        self.answers.stop(StopReason::Forced);
        self.playback.stop();
        self.pause.reset();
        self.cancel_timer();
        self.cancel_utterance();
        self.final_pending = false;
        self.turn = Turn::Finishing;

        self.update(|st| {
            st.caption = Caption::status("Evaluating…");
            st.evaluating = true;
        });

        self.guard.finalize(
            &self.services.evaluator,
            self.conversation.to_vec(),
            self.session,
            &self.events_tx,
        );
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn next_ticket(&mut self) -> Ticket {
        self.ticket += 1;
        self.ticket
    }

    fn is_current(&self, ticket: Ticket, what: &str) -> bool {
        if ticket == self.ticket {
            return true;
        }
        log::debug!(
            "session: dropping stale {what} (ticket {ticket}, current {})",
            self.ticket
        );
        false
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn cancel_utterance(&mut self) {
        if let Some(task) = self.utterance_task.take() {
            task.abort();
        }
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) {
        f(&mut lock(&self.state));
    }

    /// Mirror the machine-owned fields into the shared snapshot.
    fn publish(&self) {
        let mut st = lock(&self.state);
        st.turn = self.turn;
        st.paused = self.pause.is_paused();
        st.history = self.conversation.to_vec();
        st.questions_asked = self.conversation.questions_asked();
    }
}

impl Drop for InterviewSession {
    fn drop(&mut self) {
        self.cancel_timer();
        self.cancel_utterance();
    }
}
