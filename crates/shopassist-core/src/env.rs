//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable as a u16 (e.g., for ports).
pub fn get_u16(name: &str) -> Option<u16> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Load `KEY=value` pairs from a `.env` file in the working directory.
///
/// Variables already present in the process environment win.
pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = std::path::Path::new(".env");
    if !path.exists() {
        return Ok(());
    }

    let content = std::fs::read_to_string(path)?;
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            env::set_var(key, value);
        }
    }
    Ok(())
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Environment variable names read by ShopAssist.
pub mod vars {
    /// API key for OpenAI (chat completions and embeddings).
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

    /// Bearer token granting store-owner access.
    pub const SHOPASSIST_ADMIN_TOKEN: &str = "SHOPASSIST_ADMIN_TOKEN";

    /// Database URL override.
    pub const SHOPASSIST_DATABASE_URL: &str = "SHOPASSIST_DATABASE_URL";

    /// Gateway port override.
    pub const SHOPASSIST_PORT: &str = "SHOPASSIST_PORT";

    /// ShopAssist home directory override.
    pub const SHOPASSIST_HOME: &str = "SHOPASSIST_HOME";

    /// ShopAssist config file override.
    pub const SHOPASSIST_CONFIG: &str = "SHOPASSIST_CONFIG";
}
