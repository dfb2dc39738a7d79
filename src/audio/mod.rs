//! Audio layer — microphone, spectrum, endpointing, upload encoding, speaker.
//!
//! # Capture path
//!
//! ```text
//! Microphone → cpal callback ─┬─▶ AudioChunk buffer ──(stop)──▶ encode_wav → Transcriber
//!                             └─▶ FftAnalyser (RingBuffer window)
//!                                      │  frequency_bins() every tick
//!                                      ▼
//!                              VoiceActivityEndpointer ──▶ volume / end-of-speech
//! ```
//!
//! # Playback path
//!
//! ```text
//! AudioPayload (MP3) → PlaybackSink::play → rodio Sink → speaker
//! ```
//!
//! Devices sit behind [`AudioInput`] and [`PlaybackSink`], so everything
//! above this module can run against in-memory doubles.

pub mod analyser;
pub mod buffer;
pub mod capture;
pub mod endpointer;
pub mod payload;
pub mod playback;

pub use analyser::{FftAnalyser, SpectrumAnalyser};
pub use buffer::RingBuffer;
pub use capture::{
    AudioChunk, AudioInput, CaptureError, CpalInput, InputStream, OpenedInput, SharedChunks,
};
pub use endpointer::{sample_until_silence, Observation, VoiceActivityEndpointer};
pub use payload::{encode_wav, AudioFormat, AudioPayload};
pub use playback::{PlaybackError, PlaybackSink, RodioSink};
