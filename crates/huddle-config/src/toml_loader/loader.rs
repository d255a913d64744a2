//! Reading `config.toml` into a [`HuddleConfig`].

use std::path::Path;

use huddle_common::ConfigError;
use tracing::{info, warn};

use crate::schema::HuddleConfig;
use crate::validation;

use super::paths::{create_default_config, default_config_path};

/// Read and parse the config file at `path`.
///
/// Sections or keys left out of the file keep their defaults. Validation
/// problems are logged but do not fail the load; callers that need a
/// valid config run [`validation::validate`] themselves.
pub fn load_from_path(path: &Path) -> Result<HuddleConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("cannot read {}: {e}", path.display())))?;
    let config: HuddleConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;

    if let Err(e) = validation::validate(&config) {
        warn!(path = %path.display(), error = %e, "config has invalid values");
    }
    info!(path = %path.display(), room = %config.room.default_name, "config loaded");
    Ok(config)
}

/// Load `huddle/config.toml` under the user's config directory.
///
/// A first run writes the commented template there and starts from the
/// built-in defaults.
pub fn load_default() -> Result<HuddleConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => {
            create_default_config(&path)?;
            Ok(HuddleConfig::default())
        }
        loaded => loaded,
    }
}
