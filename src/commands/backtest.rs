use super::render::print_presentation;
use super::{load_strategy_form, stage_spinner};
use crate::context::AppContext;
use crate::presentation::{present, ChartOptions};
use crate::workflow::Stage;
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub async fn run(app: &AppContext, form_path: &Path, json: bool) -> Result<()> {
    let form = load_strategy_form(form_path)?;
    let workflow = app.workflow(app.settings().simulation)?;

    let spinner = stage_spinner("Running backtest...");
    let outcome = workflow.submit(&form).await;
    spinner.finish_and_clear();
    let stage = outcome?;

    let state = workflow.snapshot();
    print_presentation(&present(&state, &ChartOptions::default()), json)?;

    if stage != Stage::Backtested {
        let message = state
            .error
            .map(|failure| failure.to_string())
            .unwrap_or_else(|| format!("backtest ended in stage {}", stage));
        return Err(anyhow!(message));
    }
    info!("Backtest complete");
    Ok(())
}
