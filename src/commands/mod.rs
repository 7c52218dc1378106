pub mod poll;
pub mod serve;

// Re-export command functions for convenience
pub use poll::{poll, sources};
pub use serve::serve;

use anyhow::{Context, Result};
use std::path::Path;

use campwatch::config::Config;

/// Configuration from an optional TOML file, overlaid with `CAMPWATCH_*` variables
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}
