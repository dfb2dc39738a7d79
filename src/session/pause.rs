//! Suspending a candidate turn for a hint.
//!
//! Holds the two flags that make a hint interruption safe:
//!
//! * **discard** — the capture being stopped must be thrown away, never
//!   transcribed.  Set immediately before the stop, cleared when a fresh
//!   capture opens or the candidate resumes.
//! * **paused** — the turn is on hold until the candidate resumes.

use super::answer::{AnswerProvider, StopReason};
use super::playback::PlaybackCoordinator;

#[derive(Debug, Default)]
pub struct PauseController {
    discard: bool,
    paused: bool,
}

impl PauseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend the turn: flag the capture for discard, silence any
    /// interviewer audio and stop the answer provider.
    ///
    /// Returns `false` if the turn was already paused (nothing was done).
    pub fn pause(
        &mut self,
        answers: &mut dyn AnswerProvider,
        playback: &mut PlaybackCoordinator,
    ) -> bool {
        if self.paused {
            return false;
        }
        self.discard = true;
        self.paused = true;

        playback.stop();
        answers.stop(StopReason::Paused);
        log::info!("session: candidate turn paused for a hint");
        true
    }

    /// Leave the pause.  The caller opens the fresh capture.
    ///
    /// Returns `false` if the turn was not paused.
    pub fn resume(&mut self) -> bool {
        let was_paused = self.paused;
        self.discard = false;
        self.paused = false;
        was_paused
    }

    /// A new capture is opening; nothing from it is to be discarded.
    pub fn capture_opened(&mut self) {
        self.discard = false;
    }

    /// Clear both flags (new session, finish, shutdown).
    pub fn reset(&mut self) {
        self.discard = false;
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a result arriving now must be dropped.
    pub fn discard_pending(&self) -> bool {
        self.discard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::answer::{AnswerError, AnswerRequest};
    use crate::session::test_support::MockSink;

    #[derive(Default)]
    struct RecordingProvider {
        stops: Vec<StopReason>,
    }

    impl AnswerProvider for RecordingProvider {
        fn begin(&mut self, _request: AnswerRequest) -> Result<(), AnswerError> {
            Ok(())
        }
        fn stop(&mut self, reason: StopReason) {
            self.stops.push(reason);
        }
        fn is_active(&self) -> bool {
            false
        }
        fn prompt_caption(&self) -> &'static str {
            ""
        }
    }

    fn playback() -> PlaybackCoordinator {
        PlaybackCoordinator::new(MockSink::lasting(std::time::Duration::ZERO))
    }

    #[test]
    fn pause_sets_discard_and_stops_with_paused_reason() {
        let mut ctl = PauseController::new();
        let mut answers = RecordingProvider::default();
        let mut playback = playback();

        assert!(ctl.pause(&mut answers, &mut playback));

        assert!(ctl.is_paused());
        assert!(ctl.discard_pending());
        assert_eq!(answers.stops, vec![StopReason::Paused]);
    }

    #[test]
    fn second_pause_is_a_no_op() {
        let mut ctl = PauseController::new();
        let mut answers = RecordingProvider::default();
        let mut playback = playback();

        ctl.pause(&mut answers, &mut playback);
        assert!(!ctl.pause(&mut answers, &mut playback));
        assert_eq!(answers.stops.len(), 1);
    }

    #[test]
    fn resume_clears_both_flags() {
        let mut ctl = PauseController::new();
        let mut answers = RecordingProvider::default();
        let mut playback = playback();

        ctl.pause(&mut answers, &mut playback);
        assert!(ctl.resume());

        assert!(!ctl.is_paused());
        assert!(!ctl.discard_pending());
        assert!(!ctl.resume());
    }

    #[test]
    fn capture_opened_clears_discard_only() {
        let mut ctl = PauseController::new();
        let mut answers = RecordingProvider::default();
        let mut playback = playback();

        ctl.pause(&mut answers, &mut playback);
        ctl.capture_opened();

        assert!(!ctl.discard_pending());
        assert!(ctl.is_paused());

        ctl.reset();
        assert!(!ctl.is_paused());
    }
}
