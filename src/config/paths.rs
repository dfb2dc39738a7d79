//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + résumé):
//!   Windows: %APPDATA%\voice-interview\
//!   macOS:   ~/Library/Application Support/voice-interview/
//!   Linux:   ~/.config/voice-interview/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and the default résumé file.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Résumé text used when `interview.resume_path` is not set.
    pub default_resume_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-interview";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let default_resume_file = config_dir.join("resume.txt");

        Self {
            config_dir,
            settings_file,
            default_resume_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
