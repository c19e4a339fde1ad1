//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_session;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, ObserverSettings};

/// Load settings from `path`, or defaults when no path is given
pub(crate) fn load_settings(path: Option<&Path>) -> Result<ObserverSettings> {
    let Some(path) = path else {
        return Ok(ObserverSettings::default());
    };

    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
