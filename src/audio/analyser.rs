//! Byte-scaled frequency spectrum of the live microphone signal.
//!
//! The endpointer does not look at raw samples; it samples a spectrum the
//! way a browser `AnalyserNode` exposes one:
//!
//! ```text
//! newest fft_size samples → Blackman window → real FFT → |X| / N
//!   → smoothing (τ = 0.8) → dB → [-100 dB, -30 dB] ↦ [0, 255]
//! ```
//!
//! The capture thread feeds samples with [`FftAnalyser::push_samples`]; the
//! endpointer loop reads [`SpectrumAnalyser::frequency_bins`] once per tick.

use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard};

use realfft::num_complex::Complex32;
use realfft::{RealFftPlanner, RealToComplex};

use super::RingBuffer;

/// Default smoothing time constant between successive reads.
pub const SMOOTHING: f32 = 0.8;
/// Level mapped to byte value 0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Level mapped to byte value 255.
pub const MAX_DECIBELS: f32 = -30.0;

const MIN_FFT_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// SpectrumAnalyser trait
// ---------------------------------------------------------------------------

/// Source of the amplitude signal the endpointer samples.
pub trait SpectrumAnalyser: Send + Sync {
    /// Current spectrum as `fft_size / 2` bins scaled onto `0..=255`.
    fn frequency_bins(&self) -> Vec<u8>;
}

// ---------------------------------------------------------------------------
// FftAnalyser
// ---------------------------------------------------------------------------

/// [`SpectrumAnalyser`] backed by `realfft`.
///
/// Shared between the capture thread (writer) and the endpointer task
/// (reader) behind one mutex; both sides hold it only for a few
/// microseconds.
pub struct FftAnalyser {
    state: Mutex<AnalyserState>,
}

struct AnalyserState {
    window: RingBuffer<f32>,
    blackman: Vec<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl FftAnalyser {
    /// Create an analyser over a window of `fft_size` samples (minimum 32).
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(MIN_FFT_SIZE);

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Self {
            state: Mutex::new(AnalyserState {
                window: RingBuffer::new(fft_size),
                blackman: blackman_window(fft_size),
                smoothed: vec![0.0; fft_size / 2],
                fft,
                input,
                spectrum,
                scratch,
            }),
        }
    }

    /// Append mono samples from the capture callback.
    pub fn push_samples(&self, mono: &[f32]) {
        self.lock().window.push_slice(mono);
    }

    fn lock(&self) -> MutexGuard<'_, AnalyserState> {
        // A panic on the other side must not take the endpointer down with it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SpectrumAnalyser for FftAnalyser {
    fn frequency_bins(&self) -> Vec<u8> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let n = state.input.len();

        for ((dst, sample), w) in state
            .input
            .iter_mut()
            .zip(state.window.window())
            .zip(&state.blackman)
        {
            *dst = sample * w;
        }

        if let Err(e) = state.fft.process_with_scratch(
            &mut state.input,
            &mut state.spectrum,
            &mut state.scratch,
        ) {
            log::warn!("capture: spectrum FFT failed: {e}");
            return vec![0; state.smoothed.len()];
        }

        for (smoothed, bin) in state.smoothed.iter_mut().zip(&state.spectrum) {
            let magnitude = bin.norm() / n as f32;
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
        }

        state.smoothed.iter().map(|&m| to_byte(m)).collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Blackman window (α = 0.16), periodic form.
fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;

    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Map a linear magnitude onto `0..=255` through the decibel range.
fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
