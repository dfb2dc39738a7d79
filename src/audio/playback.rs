//! Speaker output via `rodio`.
//!
//! [`PlaybackSink`] is the device seam the playback coordinator drives.
//! [`RodioSink`] keeps the (non-`Send`) `rodio::OutputStream` alive on a
//! dedicated thread and plays each utterance through a fresh `Sink` created
//! from the stream handle.

use std::io::Cursor;
use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

use super::AudioPayload;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device available: {0}")]
    Device(#[from] rodio::StreamError),

    #[error("failed to create playback sink: {0}")]
    Sink(#[from] rodio::PlayError),

    #[error("failed to decode synthesized audio: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),

    #[error("audio output thread exited before the stream started")]
    DeviceThread,

    #[error("playback wait was interrupted: {0}")]
    Interrupted(String),
}

// ---------------------------------------------------------------------------
// PlaybackSink trait
// ---------------------------------------------------------------------------

/// Audio output device.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Play `audio` and resolve once it has finished (or been stopped).
    async fn play(&self, audio: AudioPayload) -> Result<(), PlaybackError>;

    /// Silence whatever is currently playing.  Idempotent.
    fn stop(&self);
}

// ---------------------------------------------------------------------------
// RodioSink
// ---------------------------------------------------------------------------

/// Default output device through `rodio`.
pub struct RodioSink {
    handle: OutputStreamHandle,
    current: Mutex<Option<Arc<Sink>>>,
    /// Dropping this releases the output stream thread.
    _shutdown: mpsc::Sender<()>,
}

impl RodioSink {
    /// Open the default output device.
    pub fn new() -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<OutputStreamHandle, PlaybackError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Returns Err once the RodioSink (sender) is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    log::debug!("playback: output stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.into()));
                }
            })
            .map_err(|_| PlaybackError::DeviceThread)?;

        let handle = ready_rx.recv().map_err(|_| PlaybackError::DeviceThread)??;
        log::info!("playback: output device ready");

        Ok(Self {
            handle,
            current: Mutex::new(None),
            _shutdown: shutdown_tx,
        })
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<Sink>>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PlaybackSink for RodioSink {
    async fn play(&self, audio: AudioPayload) -> Result<(), PlaybackError> {
        if audio.is_empty() {
            log::debug!("playback: empty payload, nothing to play");
            return Ok(());
        }

        let source = rodio::Decoder::new(Cursor::new(audio.into_bytes()))?;
        let sink = Arc::new(Sink::try_new(&self.handle)?);
        sink.append(source);

        if let Some(previous) = self.current().replace(Arc::clone(&sink)) {
            previous.stop();
        }

        let waiter = Arc::clone(&sink);
        tokio::task::spawn_blocking(move || waiter.sleep_until_end())
            .await
            .map_err(|e| PlaybackError::Interrupted(e.to_string()))?;

        let mut current = self.current();
        if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, &sink)) {
            *current = None;
        }
        Ok(())
    }

    fn stop(&self) {
        if let Some(sink) = self.current().take() {
            sink.stop();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
