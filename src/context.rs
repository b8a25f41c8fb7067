use crate::config::{AppSettings, SimulationParameters};
use crate::orchestrator::Workflow;
use crate::service::HttpStrategyService;
use anyhow::Result;
use log::info;

#[derive(Clone, Debug)]
pub struct AppContext {
    settings: AppSettings,
}

impl AppContext {
    pub fn initialize(settings: AppSettings) -> Self {
        Self { settings }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::initialize(AppSettings::from_env()?))
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// New workflow session against the configured strategy service.
    pub fn workflow(&self, simulation: SimulationParameters) -> Result<Workflow<HttpStrategyService>> {
        let service = HttpStrategyService::new(&self.settings.service)?;
        info!("Using strategy service at {}", service.base_url());
        Ok(Workflow::new(service, simulation, self.settings.timeouts))
    }
}
