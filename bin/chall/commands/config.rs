//! Config command - persist a user setting

use crate::style::*;
use anyhow::{Context, Result};
use challenge_runner::UserConfig;

pub fn run(key: &str, value: &str) -> Result<()> {
    let path = UserConfig::default_path()?;
    let mut config = UserConfig::load_from(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    config.set(key, value)?;
    config
        .save_to(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    print_success(&format!("Saved {} to {}", key, path.display()));
    Ok(())
}
