use super::load_strategy_form;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Print the request payload a strategy form compiles to.
pub fn run(form_path: &Path) -> Result<()> {
    let form = load_strategy_form(form_path)?;
    let request = form
        .compile()
        .with_context(|| format!("strategy form {} is invalid", form_path.display()))?;
    info!(
        "Compiled strategy for {} with indicators {:?}",
        request.symbol,
        request.entry_conditions.enabled_kinds()
    );
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
