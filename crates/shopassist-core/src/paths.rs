//! Path resolution utilities.

use crate::env;
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the ShopAssist base directory (`$SHOPASSIST_HOME` or `~/.shopassist`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(env::vars::SHOPASSIST_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".shopassist"))
}

/// Get the main config file path (`~/.shopassist/shopassist.json5`).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("shopassist.json5"))
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
