//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON settings files
//! - Validate field ranges and cross-field rules
//! - Produce `ObserverSettings`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("observer.toml")).unwrap();
//! println!("poll every {} ms", settings.engine.poll_interval_ms);
//! ```

mod parser;
mod validator;

pub use contracts::ObserverSettings;
pub use parser::ConfigFormat;

use contracts::ObserverError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from a file path
    ///
    /// Format is detected from the extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ObserverSettings, ObserverError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let settings = Self::load_from_str(&content, format)?;
        debug!(path = %path.display(), ?format, "Settings loaded");
        Ok(settings)
    }

    /// Load settings from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ObserverSettings, ObserverError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }

    /// Validate already-constructed settings (e.g. after CLI overrides)
    pub fn validate(settings: &ObserverSettings) -> Result<(), ObserverError> {
        validator::validate(settings)
    }

    pub fn to_toml(settings: &ObserverSettings) -> Result<String, ObserverError> {
        toml::to_string_pretty(settings)
            .map_err(|e| ObserverError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(settings: &ObserverSettings) -> Result<String, ObserverError> {
        serde_json::to_string_pretty(settings)
            .map_err(|e| ObserverError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ObserverError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ObserverError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ObserverError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}
