//! Plays one interviewer utterance at a time.
//!
//! `play` spawns the sink and posts `PlaybackEnded{ticket}` when it
//! returns.  `stop` aborts that task, so a stopped utterance never reports
//! an end.  A sink error is logged and reported as an end so the session
//! does not stall on a broken speaker.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::audio::{AudioPayload, PlaybackSink};

use super::events::{EventSender, SessionEvent, Ticket};

pub struct PlaybackCoordinator {
    sink: Arc<dyn PlaybackSink>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackCoordinator {
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self { sink, task: None }
    }

    /// Start playing `audio`, stopping whatever was playing before.
    pub fn play(&mut self, ticket: Ticket, audio: AudioPayload, events: EventSender) {
        self.stop();

        let sink = Arc::clone(&self.sink);
        self.task = Some(tokio::spawn(async move {
            if let Err(e) = sink.play(audio).await {
                log::warn!("playback: {e}; continuing as if the utterance ended");
            }
            let _ = events.send(SessionEvent::PlaybackEnded { ticket });
        }));
    }

    /// Interrupt the current utterance.  Idempotent; no `PlaybackEnded`
    /// follows.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.sink.stop();
            log::debug!("playback: stopped");
        }
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
