//! At most one evaluation request per session.
//!
//! Manual finish, the session timer and the interviewer's closing line can
//! all fire close together; only the first one to reach the guard issues an
//! evaluation.  The lock is released when the evaluation completes (success
//! or failure), so a failed evaluation can be retried by finishing again.

use std::sync::Arc;

use crate::conversation::ConversationMessage;
use crate::services::Evaluator;

use super::events::{EventSender, SessionEvent, SessionId};

#[derive(Debug, Default)]
pub struct SingleFlightGuard {
    in_flight: bool,
}

impl SingleFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock.  `false` if an evaluation is already in flight.
    pub fn try_acquire(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Called from the evaluation completion path.
    pub fn release(&mut self) {
        self.in_flight = false;
    }

    /// A new session starts with the lock open.
    pub fn reset(&mut self) {
        self.in_flight = false;
    }

    pub fn is_locked(&self) -> bool {
        self.in_flight
    }

    /// Issue the evaluation for `history` unless one is already running.
    ///
    /// The result comes back as `EvaluationDone{session}`; the caller must
    /// [`release`](Self::release) when it arrives.  Returns whether a
    /// request was issued.
    pub fn finalize(
        &mut self,
        evaluator: &Arc<dyn Evaluator>,
        history: Vec<ConversationMessage>,
        session: SessionId,
        events: &EventSender,
    ) -> bool {
        if !self.try_acquire() {
            log::debug!("session: evaluation already in flight, ignoring finalize");
            return false;
        }

        log::info!(
            "session: evaluating interview ({} messages)",
            history.len()
        );
        let evaluator = Arc::clone(evaluator);
        let events = events.clone();
        tokio::spawn(async move {
            let result = evaluator.evaluate(history).await;
            let _ = events.send(SessionEvent::EvaluationDone { session, result });
        });
        true
    }
}
