//! [`TestModeDriver`] — answers candidate turns with the candidate
//! simulator instead of the microphone.
//!
//! ```text
//! begin ──▶ sleep(thinking) ──▶ simulate(history, résumé)
//!             ├─ Ok  ──▶ SimulatedAnswer{text} ──▶ sleep(review) ──▶ CandidateTextReady(Ok)
//!             └─ Err ──▶ CandidateTextReady(Err(Simulation))
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::SimulationConfig;
use crate::services::{CandidateSimulator, SimulationRequest};

use super::answer::{AnswerError, AnswerProvider, AnswerRequest, StopReason};
use super::events::SessionEvent;

pub struct TestModeDriver {
    simulator: Arc<dyn CandidateSimulator>,
    thinking_delay: Duration,
    review_delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl TestModeDriver {
    pub fn new(simulator: Arc<dyn CandidateSimulator>, config: &SimulationConfig) -> Self {
        Self {
            simulator,
            thinking_delay: config.thinking_delay(),
            review_delay: config.review_delay(),
            task: None,
        }
    }
}

impl AnswerProvider for TestModeDriver {
    fn begin(&mut self, request: AnswerRequest) -> Result<(), AnswerError> {
        self.stop(StopReason::Forced);

        let simulator = Arc::clone(&self.simulator);
        let thinking = self.thinking_delay;
        let review = self.review_delay;
        let AnswerRequest {
            ticket,
            history,
            resume_text,
            events,
        } = request;

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(thinking).await;

            let result = simulator
                .simulate(SimulationRequest {
                    history,
                    resume_text,
                })
                .await;

            let result = match result {
                Ok(text) => {
                    let _ = events.send(SessionEvent::SimulatedAnswer {
                        ticket,
                        text: text.clone(),
                    });
                    tokio::time::sleep(review).await;
                    Ok(text)
                }
                Err(e) => Err(AnswerError::Simulation(e)),
            };

            let _ = events.send(SessionEvent::CandidateTextReady { ticket, result });
        }));

        log::info!("session: simulating candidate answer (ticket {ticket})");
        Ok(())
    }

    fn stop(&mut self, reason: StopReason) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                log::debug!("session: simulated answer cancelled ({reason:?})");
            }
            task.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn prompt_caption(&self) -> &'static str {
        "Thinking…"
    }
}

impl Drop for TestModeDriver {
    fn drop(&mut self) {
        self.stop(StopReason::Forced);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
