//! Opaque audio payloads and the upload encoder.
//!
//! Two kinds of audio cross the core:
//!
//! * **Synthesized speech** — MP3 bytes from the utterance generator, handed
//!   straight to the playback sink.
//! * **Captured answers** — interleaved `f32` chunks from the microphone,
//!   encoded here into one upload-ready WAV:
//!
//! ```text
//! [AudioChunk, AudioChunk, …] → downmix → resample → i16 → WAV (hound)
//! ```

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::AudioChunk;

// ---------------------------------------------------------------------------
// AudioPayload
// ---------------------------------------------------------------------------

/// Container format of an [`AudioPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

/// Encoded audio bytes plus their container format.
///
/// The core never looks inside; it only routes payloads between the
/// collaborators and the devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    format: AudioFormat,
    bytes: Vec<u8>,
}

impl AudioPayload {
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            format: AudioFormat::Mp3,
            bytes,
        }
    }

    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            format: AudioFormat::Wav,
            bytes,
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name used for multipart uploads.
    pub fn file_name(&self) -> &'static str {
        match self.format {
            AudioFormat::Mp3 => "speech.mp3",
            AudioFormat::Wav => "recording.wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self.format {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

// ---------------------------------------------------------------------------
// Upload encoding
// ---------------------------------------------------------------------------

/// Concatenate captured chunks into one mono `f32` signal at `target_rate`.
///
/// Chunks may in principle arrive with different formats (a device that
/// renegotiates mid-stream); each one is downmixed and resampled on its own
/// before being appended.
pub fn concat_chunks(chunks: &[AudioChunk], target_rate: u32) -> Vec<f32> {
    let mut out = Vec::new();
    for chunk in chunks {
        let mono = downmix(&chunk.samples, chunk.channels);
        out.extend(resample_linear(&mono, chunk.sample_rate, target_rate));
    }
    out
}

/// Encode captured chunks as a 16-bit mono WAV at `target_rate`.
///
/// Returns `Ok(None)` when there are no samples to encode, so callers can
/// skip the transcription round-trip entirely.
pub fn encode_wav(
    chunks: &[AudioChunk],
    target_rate: u32,
) -> Result<Option<AudioPayload>, hound::Error> {
    let samples = concat_chunks(chunks, target_rate);
    if samples.is_empty() {
        return Ok(None);
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: target_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in &samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32).round() as i16)?;
        }
        writer.finalize()?;
    }

    Ok(Some(AudioPayload::wav(cursor.into_inner())))
}

/// Average interleaved frames down to one channel.
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Linear-interpolation resampler.  Identity when the rates match.
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let idx = src_pos as usize;
            let frac = (src_pos - idx as f64) as f32;

            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
                (Some(&a), None) => a,
                _ => 0.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
