//! Where the config file lives, and writing the first one.

use std::path::{Path, PathBuf};

use huddle_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

const APP_DIR: &str = "huddle";
const FILE_NAME: &str = "config.toml";

/// `<config dir>/huddle/config.toml`, e.g. `~/.config/huddle/config.toml`
/// on Linux.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("no user config directory on this platform".into()))?;
    Ok(base.join(APP_DIR).join(FILE_NAME))
}

/// Write the commented template to `path`, creating parent directories.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_error = |what: &str, at: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("cannot {what} {}: {e}", at.display()))
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_error("create", dir, e))?;
    }
    std::fs::write(path, default_config_toml()).map_err(|e| io_error("write", path, e))?;

    info!(path = %path.display(), "wrote default config");
    Ok(())
}
