//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it wants to override.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Connection settings for the interview backend (question generation,
/// transcription, hints, simulation and evaluation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend, without a trailing slash.
    pub base_url: String,
    /// Maximum seconds to wait for any single backend response.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// InterviewConfig
// ---------------------------------------------------------------------------

/// What the interview is about and how a session is bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    /// Job role the interviewer hires for (sent to the question generator
    /// and the hint service).
    pub role: String,
    /// Number of questions after which the interviewer closes the session.
    pub target_question_count: u32,
    /// Plain-text résumé.  `None` means [`AppPaths::default_resume_file`].
    pub resume_path: Option<PathBuf>,
    /// Answer with the candidate simulator instead of the microphone.
    pub test_mode: bool,
    /// Force-finalize the session after this many seconds.  `None` disables
    /// the session timer.
    pub session_time_limit_secs: Option<u64>,
    /// Consecutive empty or failed transcriptions tolerated before the
    /// candidate turn gives up.  `0` retries forever.
    pub max_silent_retries: u32,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            role: "Backend developer".into(),
            target_question_count: 5,
            resume_path: None,
            test_mode: false,
            session_time_limit_secs: None,
            max_silent_retries: 5,
        }
    }
}

impl InterviewConfig {
    /// Session timer duration, if one is configured.
    pub fn session_time_limit(&self) -> Option<Duration> {
        self.session_time_limit_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// EndpointerConfig
// ---------------------------------------------------------------------------

/// Silence-based end-of-speech detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointerConfig {
    /// Mean bin level (0–255) below which a tick counts as silence.
    pub silence_threshold: u8,
    /// Continuous silence required before end-of-speech is signalled.
    pub silence_duration_ms: u64,
    /// Number of lowest frequency bins left out of the mean (DC / mains hum).
    pub ignored_low_bins: usize,
    /// Sampling cadence of the endpointer loop.
    pub tick_interval_ms: u64,
    /// FFT window length used by the spectrum analyser.  Yields
    /// `fft_size / 2` frequency bins.
    pub fft_size: usize,
}

impl Default for EndpointerConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 15,
            silence_duration_ms: 5_000,
            ignored_low_bins: 5,
            tick_interval_ms: 16,
            fft_size: 512,
        }
    }
}

impl EndpointerConfig {
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

/// Pacing of the simulated candidate in test mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Pause before the simulated answer is requested.
    pub thinking_delay_ms: u64,
    /// Pause while the simulated answer is on screen before it is submitted.
    pub review_delay_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            thinking_delay_ms: 1_500,
            review_delay_ms: 2_000,
        }
    }
}

impl SimulationConfig {
    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_delay_ms)
    }

    pub fn review_delay(&self) -> Duration {
        Duration::from_millis(self.review_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Audio device settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Sample rate of the WAV uploaded to the transcriber.
    pub upload_sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            upload_sample_rate: 16_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub interview: InterviewConfig,
    pub endpointer: EndpointerConfig,
    pub simulation: SimulationConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Résumé file this configuration points at.
    pub fn resume_path(&self) -> PathBuf {
        self.interview
            .resume_path
            .clone()
            .unwrap_or_else(|| AppPaths::new().default_resume_file)
    }

    /// Read the résumé text.  Extraction from PDF or other documents happens
    /// outside this crate; the file is expected to hold plain text.
    pub fn read_resume(&self) -> Result<String> {
        let path = self.resume_path();
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading résumé {}", path.display()))?;
        Ok(text.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.interview.target_question_count, 5);
        assert!(!config.interview.test_mode);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.endpointer.silence_threshold, 15);
        assert_eq!(cfg.endpointer.silence_duration(), Duration::from_millis(5_000));
        assert_eq!(cfg.endpointer.ignored_low_bins, 5);
        assert_eq!(cfg.endpointer.fft_size, 512);
        assert_eq!(cfg.simulation.thinking_delay(), Duration::from_millis(1_500));
        assert_eq!(cfg.simulation.review_delay(), Duration::from_millis(2_000));
        assert!(cfg.interview.session_time_limit().is_none());
        assert_eq!(cfg.interview.max_silent_retries, 5);
        assert_eq!(cfg.audio.upload_sample_rate, 16_000);
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.backend.base_url = "http://interview.internal:9000".into();
        cfg.interview.role = "Data analyst".into();
        cfg.interview.test_mode = true;
        cfg.interview.session_time_limit_secs = Some(600);
        cfg.interview.max_silent_retries = 0;
        cfg.endpointer.silence_duration_ms = 3_000;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.backend.base_url, "http://interview.internal:9000");
        assert_eq!(loaded.interview.role, "Data analyst");
        assert!(loaded.interview.test_mode);
        assert_eq!(
            loaded.interview.session_time_limit(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(loaded.interview.max_silent_retries, 0);
        assert_eq!(loaded.endpointer.silence_duration_ms, 3_000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[endpointer]\nsilence_duration_ms = 3000\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");

        assert_eq!(cfg.endpointer.silence_duration_ms, 3_000);
        assert_eq!(cfg.endpointer.silence_threshold, 15);
        assert_eq!(cfg.backend.timeout_secs, 60);
    }

    #[test]
    fn read_resume_trims_file_contents() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("resume.txt");
        std::fs::write(&path, "\n  Five years of Rust.  \n").expect("write");

        let mut cfg = AppConfig::default();
        cfg.interview.resume_path = Some(path);

        assert_eq!(cfg.read_resume().expect("read"), "Five years of Rust.");
    }
}
