//! Persist the merged configuration for future runs.

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use sandbridge_core::BridgeConfig;
use std::path::Path;

pub fn execute(config: &BridgeConfig, dir: &Path) -> Result<()> {
    let path = config
        .save(dir)
        .context("failed to write configuration file")?;
    println!(
        "{} {}",
        "Configuration written to".green(),
        path.display().to_string().blue().underlined()
    );
    Ok(())
}
