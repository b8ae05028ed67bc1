//! CLI subcommands

pub mod config;
pub mod init;
pub mod verify;

use anyhow::{Context, Result};
use challenge_runner::UserConfig;

/// Source-control token from the user config, if one is set.
pub(crate) fn load_credential() -> Result<Option<String>> {
    let path = UserConfig::default_path()?;
    let config = UserConfig::load_from(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(config.github_token().map(str::to_string))
}
