//! Microphone input via `cpal`.
//!
//! [`AudioInput`] is the device seam the capture session talks to.  Opening
//! it starts a stream that appends [`AudioChunk`]s to a shared buffer and
//! feeds an [`FftAnalyser`]; the returned [`InputStream`] releases the
//! device when closed or dropped.
//!
//! `cpal::Stream` is not `Send`, so [`CpalInput`] builds and owns the stream
//! on a dedicated thread:
//!
//! ```text
//! open() ──spawn──▶ [device thread] build_input_stream → play → ready ─┐
//!    ◀──────────────────────────── Result<(), CaptureError> ───────────┘
//! close() ──stop──▶ [device thread] drop(stream) → exit ──▶ join
//! ```

use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::services::ServiceError;

use super::payload::downmix;
use super::{FftAnalyser, SpectrumAnalyser};

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

/// Chunks buffered by the active capture, shared with the device callback.
pub type SharedChunks = Arc<Mutex<Vec<AudioChunk>>>;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while acquiring the microphone or turning a capture into
/// text.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio device thread exited before the stream started")]
    DeviceThread,

    #[error("failed to encode captured audio: {0}")]
    Encoding(#[from] hound::Error),

    #[error("transcription failed: {0}")]
    Transcription(#[from] ServiceError),
}

// ---------------------------------------------------------------------------
// Device seam
// ---------------------------------------------------------------------------

/// A running input stream.  Closing is idempotent.
pub trait InputStream: Send {
    /// Stop the stream and release the device.
    fn close(&mut self);
}

/// What [`AudioInput::open`] hands back: the stream handle plus the
/// analyser it feeds.
pub struct OpenedInput {
    pub stream: Box<dyn InputStream>,
    pub analyser: Arc<dyn SpectrumAnalyser>,
}

/// Audio input device.
pub trait AudioInput: Send + Sync {
    /// Acquire the device and start appending chunks to `chunks`.
    fn open(&self, chunks: SharedChunks) -> Result<OpenedInput, CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalInput
// ---------------------------------------------------------------------------

/// Microphone built on `cpal`.
#[derive(Debug, Clone)]
pub struct CpalInput {
    /// Device name to open; `None` means the host default.
    device_name: Option<String>,
    /// Analyser window length.
    fft_size: usize,
}

impl CpalInput {
    pub fn new(device_name: Option<String>, fft_size: usize) -> Self {
        Self {
            device_name,
            fft_size,
        }
    }

    fn find_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice),
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.clone())),
        }
    }

    /// Runs on the device thread: build and start the stream.
    fn start_stream(
        &self,
        chunks: SharedChunks,
        analyser: Arc<FftAnalyser>,
    ) -> Result<cpal::Stream, CaptureError> {
        let device = self.find_device()?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "capture: opening {:?} @ {sample_rate} Hz, {channels} ch",
            device.name().unwrap_or_else(|_| "unknown device".into())
        );

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                analyser.push_samples(&downmix(data, channels));
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                if let Ok(mut buffered) = chunks.lock() {
                    buffered.push(chunk);
                }
            },
            |err: cpal::StreamError| {
                log::error!("capture: cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(stream)
    }
}

impl AudioInput for CpalInput {
    fn open(&self, chunks: SharedChunks) -> Result<OpenedInput, CaptureError> {
        let analyser = Arc::new(FftAnalyser::new(self.fft_size));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let this = self.clone();
        let thread_analyser = Arc::clone(&analyser);
        let thread = std::thread::Builder::new()
            .name("audio-input".into())
            .spawn(move || match this.start_stream(chunks, thread_analyser) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Blocks until close() sends or the handle is dropped.
                    let _ = stop_rx.recv();
                    drop(stream);
                    log::debug!("capture: input stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|_| CaptureError::DeviceThread)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OpenedInput {
                stream: Box::new(CpalStream {
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                }),
                analyser,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::DeviceThread),
        }
    }
}

/// Handle to the device thread owning a live `cpal::Stream`.
struct CpalStream {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl InputStream for CpalStream {
    fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        // Join so the device is free before anyone opens it again.
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
