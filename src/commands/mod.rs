pub mod backtest;
pub mod compile;
pub mod render;

use crate::compiler::StrategyForm;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Read a saved strategy builder state from a JSON file.
pub fn load_strategy_form(path: &Path) -> Result<StrategyForm> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read strategy form from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse strategy form from {}", path.display()))
}

pub(crate) fn stage_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
