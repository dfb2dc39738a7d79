//! [`CaptureSessionManager`] — the live-microphone [`AnswerProvider`].
//!
//! Owns at most one capture at a time:
//!
//! ```text
//! begin ──▶ tear down previous ──▶ AudioInput::open ──▶ spawn sampler
//!                                     │                    │ silence
//!                                     ▼                    ▼
//!                               chunks buffered      EndOfSpeech{ticket}
//!
//! stop(Endpointed) ──▶ release device ──▶ encode WAV ──▶ Transcriber
//!                                                 └──▶ CandidateTextReady{ticket}
//! stop(Paused | Forced) ──▶ release device ──▶ drop chunks
//! ```
//!
//! Teardown (sampler abort, stream close) runs on every exit path and is
//! idempotent: `stop` on an idle manager and `Drop` after `stop` are no-ops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::audio::{
    encode_wav, sample_until_silence, AudioChunk, AudioInput, CaptureError, InputStream,
    OpenedInput, SharedChunks, VoiceActivityEndpointer,
};
use crate::config::EndpointerConfig;
use crate::services::Transcriber;

use super::answer::{AnswerError, AnswerProvider, AnswerRequest, StopReason};
use super::events::{EventSender, SessionEvent, Ticket};

/// One open microphone capture.
struct ActiveCapture {
    ticket: Ticket,
    stream: Box<dyn InputStream>,
    chunks: SharedChunks,
    sampler: JoinHandle<()>,
    events: EventSender,
}

pub struct CaptureSessionManager {
    input: Arc<dyn AudioInput>,
    transcriber: Arc<dyn Transcriber>,
    endpointer: EndpointerConfig,
    upload_sample_rate: u32,
    volume: Arc<watch::Sender<f32>>,
    active: Option<ActiveCapture>,
    transcription: Option<JoinHandle<()>>,
}

impl CaptureSessionManager {
    pub fn new(
        input: Arc<dyn AudioInput>,
        transcriber: Arc<dyn Transcriber>,
        endpointer: EndpointerConfig,
        upload_sample_rate: u32,
    ) -> Self {
        let (volume, _) = watch::channel(0.0);
        Self {
            input,
            transcriber,
            endpointer,
            upload_sample_rate,
            volume: Arc::new(volume),
            active: None,
            transcription: None,
        }
    }

    fn tick_interval(&self) -> Duration {
        self.endpointer.tick_interval()
    }

    /// Release the device and cancel the sampler, returning what was
    /// captured.  `None` when nothing was open.
    fn teardown(&mut self) -> Option<(Ticket, Vec<AudioChunk>, EventSender)> {
        let mut capture = self.active.take()?;

        capture.sampler.abort();
        capture.stream.close();
        self.volume.send_replace(0.0);

        let chunks = match capture.chunks.lock() {
            Ok(mut buffered) => std::mem::take(&mut *buffered),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        Some((capture.ticket, chunks, capture.events))
    }

    fn cancel_transcription(&mut self) {
        if let Some(task) = self.transcription.take() {
            task.abort();
        }
    }

    fn spawn_transcription(&mut self, ticket: Ticket, chunks: Vec<AudioChunk>, events: EventSender) {
        let transcriber = Arc::clone(&self.transcriber);
        let rate = self.upload_sample_rate;

        self.transcription = Some(tokio::spawn(async move {
            let result: Result<String, CaptureError> = async {
                match encode_wav(&chunks, rate)? {
                    None => {
                        log::debug!("capture: no samples buffered, skipping transcription");
                        Ok(String::new())
                    }
                    Some(payload) => {
                        log::debug!("capture: uploading {} bytes for transcription", payload.len());
                        Ok(transcriber.transcribe(payload).await?)
                    }
                }
            }
            .await;

            let _ = events.send(SessionEvent::CandidateTextReady {
                ticket,
                result: result.map_err(AnswerError::Transcription),
            });
        }));
    }
}

impl AnswerProvider for CaptureSessionManager {
    fn begin(&mut self, request: AnswerRequest) -> Result<(), AnswerError> {
        // Never two devices at once: the previous capture is gone before
        // the next open.
        self.stop(StopReason::Forced);

        let chunks = SharedChunks::default();
        let OpenedInput { stream, analyser } = self
            .input
            .open(Arc::clone(&chunks))
            .map_err(AnswerError::Device)?;

        let ticket = request.ticket;
        let events = request.events;
        let sampler_events = events.clone();
        let endpointer = VoiceActivityEndpointer::new(&self.endpointer);
        let volume = Arc::clone(&self.volume);
        let tick = self.tick_interval();

        let sampler = tokio::spawn(async move {
            sample_until_silence(analyser, endpointer, tick, volume).await;
            let _ = sampler_events.send(SessionEvent::EndOfSpeech { ticket });
        });

        log::info!("capture: listening (ticket {ticket})");
        self.active = Some(ActiveCapture {
            ticket,
            stream,
            chunks,
            sampler,
            events,
        });
        Ok(())
    }

    fn stop(&mut self, reason: StopReason) {
        if reason.discards() {
            self.cancel_transcription();
        }

        let Some((ticket, chunks, events)) = self.teardown() else {
            return;
        };

        if reason.discards() {
            log::info!(
                "capture: stopped ({reason:?}), discarding {} buffered chunks",
                chunks.len()
            );
            return;
        }

        log::info!("capture: stopped, transcribing {} chunks", chunks.len());
        self.spawn_transcription(ticket, chunks, events);
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }

    fn prompt_caption(&self) -> &'static str {
        "Listening…"
    }

    fn volume(&self) -> Option<watch::Receiver<f32>> {
        Some(self.volume.subscribe())
    }
}

impl Drop for CaptureSessionManager {
    fn drop(&mut self) {
        self.stop(StopReason::Forced);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
