use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::settings::Settings;

/// File name looked up in the working directory and its ancestors
pub const SETTINGS_FILE_NAME: &str = "magictask.toml";

/// Discovers settings by traversing up the directory tree
///
/// Falls back to `<user config dir>/magictask/config.toml`.
pub fn discover_settings(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(SETTINGS_FILE_NAME))
        .find(|candidate| candidate.is_file())
        .or_else(global_settings)
}

fn global_settings() -> Option<PathBuf> {
    let global = dirs::config_dir()?.join("magictask").join("config.toml");
    global.is_file().then_some(global)
}

/// Loads settings with auto-discovery support
///
/// An explicit path must exist. Without one, the nearest `magictask.toml`
/// is used, and defaults apply when nothing is found.
pub fn load_settings_with_discovery(explicit_path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit_path {
        return Settings::from_file(path);
    }

    let current_dir =
        std::env::current_dir().context("Failed to get current directory for settings discovery")?;

    match discover_settings(&current_dir) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using discovered settings");
            Settings::from_file(&path)
        }
        None => Ok(Settings::default()),
    }
}
