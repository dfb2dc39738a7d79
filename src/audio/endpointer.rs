//! Silence-based end-of-speech detection.
//!
//! [`VoiceActivityEndpointer`] is a pure state machine fed one spectrum per
//! tick; [`sample_until_silence`] is the interval loop that drives it from a
//! live [`SpectrumAnalyser`] and publishes the UI volume.
//!
//! ## Algorithm
//!
//! Each tick the mean of the frequency bins is taken, skipping the lowest
//! few (DC offset and mains hum).  A mean below the threshold starts (or
//! continues) a silence window; anything at or above the threshold clears
//! it.  Once a silence window has lasted the configured duration,
//! end-of-speech fires exactly once and sampling stops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::EndpointerConfig;

use super::SpectrumAnalyser;

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Result of one endpointer tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Normalized level in `[0, 1]` for visual feedback only.
    pub volume: f32,
    /// `true` on the single tick at which end-of-speech is detected.
    pub end_of_speech: bool,
}

// ---------------------------------------------------------------------------
// VoiceActivityEndpointer
// ---------------------------------------------------------------------------

/// Detects the end of the candidate's answer from sustained silence.
///
/// # Example
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use voice_interview::audio::VoiceActivityEndpointer;
/// use voice_interview::config::EndpointerConfig;
///
/// let mut ep = VoiceActivityEndpointer::new(&EndpointerConfig::default());
/// let quiet = vec![0u8; 256];
/// let t0 = Instant::now();
///
/// assert!(!ep.observe(&quiet, t0).end_of_speech);
/// assert!(ep.observe(&quiet, t0 + Duration::from_millis(5_000)).end_of_speech);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceActivityEndpointer {
    threshold: u8,
    silence_duration: Duration,
    ignored_low_bins: usize,
    silence_started: Option<Instant>,
    finished: bool,
}

impl VoiceActivityEndpointer {
    pub fn new(config: &EndpointerConfig) -> Self {
        Self {
            threshold: config.silence_threshold,
            silence_duration: config.silence_duration(),
            ignored_low_bins: config.ignored_low_bins,
            silence_started: None,
            finished: false,
        }
    }

    /// Feed one spectrum sampled at `now`.
    ///
    /// After end-of-speech has fired, further calls report the volume but
    /// never fire again.
    pub fn observe(&mut self, bins: &[u8], now: Instant) -> Observation {
        let mean = self.mean_level(bins);
        let volume = (mean * 3.0 / 100.0).min(1.0);

        if self.finished {
            return Observation {
                volume,
                end_of_speech: false,
            };
        }

        if mean < self.threshold as f32 {
            match self.silence_started {
                None => self.silence_started = Some(now),
                Some(start) if now.saturating_duration_since(start) >= self.silence_duration => {
                    self.finished = true;
                }
                Some(_) => {}
            }
        } else {
            self.silence_started = None;
        }

        Observation {
            volume,
            end_of_speech: self.finished,
        }
    }

    /// Whether end-of-speech has already been signalled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn mean_level(&self, bins: &[u8]) -> f32 {
        let voiced = bins.get(self.ignored_low_bins..).unwrap_or(&[]);
        if voiced.is_empty() {
            return 0.0;
        }
        voiced.iter().map(|&b| b as f32).sum::<f32>() / voiced.len() as f32
    }
}

// ---------------------------------------------------------------------------
// Sampling loop
// ---------------------------------------------------------------------------

/// Sample `analyser` every `tick` until `endpointer` detects end-of-speech.
///
/// Publishes the per-tick volume on `volume` and resets it to `0.0` before
/// returning.  Cancel by aborting the task running this future.
pub async fn sample_until_silence(
    analyser: Arc<dyn SpectrumAnalyser>,
    mut endpointer: VoiceActivityEndpointer,
    tick: Duration,
    volume: Arc<watch::Sender<f32>>,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let bins = analyser.frequency_bins();
        let observation = endpointer.observe(&bins, tokio::time::Instant::now().into_std());
        volume.send_replace(observation.volume);

        if observation.end_of_speech {
            log::debug!("capture: end of speech detected");
            volume.send_replace(0.0);
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
