use crate::app_url::resolve_api_base_url;
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Monte-Carlo re-simulation parameters. Constructed only through validated paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationParameters {
    lookback_years: u32,
    simulation_length_days: u32,
    num_simulations: u32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            lookback_years: 10,
            simulation_length_days: 252,
            num_simulations: 500,
        }
    }
}

impl SimulationParameters {
    pub const LOOKBACK_YEARS_RANGE: (u32, u32) = (1, 20);
    pub const SIMULATION_LENGTH_DAYS_RANGE: (u32, u32) = (21, 504);
    pub const NUM_SIMULATIONS_RANGE: (u32, u32) = (100, 1000);

    pub fn new(lookback_years: u32, simulation_length_days: u32, num_simulations: u32) -> Result<Self> {
        check_range("lookback_years", lookback_years, Self::LOOKBACK_YEARS_RANGE)?;
        check_range(
            "simulation_length_days",
            simulation_length_days,
            Self::SIMULATION_LENGTH_DAYS_RANGE,
        )?;
        check_range("num_simulations", num_simulations, Self::NUM_SIMULATIONS_RANGE)?;
        Ok(Self {
            lookback_years,
            simulation_length_days,
            num_simulations,
        })
    }

    /// Replace any of the parameters, validating the result.
    pub fn with_overrides(
        self,
        lookback_years: Option<u32>,
        simulation_length_days: Option<u32>,
        num_simulations: Option<u32>,
    ) -> Result<Self> {
        Self::new(
            lookback_years.unwrap_or(self.lookback_years),
            simulation_length_days.unwrap_or(self.simulation_length_days),
            num_simulations.unwrap_or(self.num_simulations),
        )
    }

    pub fn lookback_years(&self) -> u32 {
        self.lookback_years
    }

    pub fn simulation_length_days(&self) -> u32 {
        self.simulation_length_days
    }

    pub fn num_simulations(&self) -> u32 {
        self.num_simulations
    }
}

fn check_range(name: &str, value: u32, (min, max): (u32, u32)) -> Result<()> {
    if value < min || value > max {
        return Err(anyhow!(
            "{} must be between {} and {} (value: {})",
            name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

/// Upper bound on each remote stage. The Monte-Carlo stage is the slowest by far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub backtest: Duration,
    pub monte_carlo: Duration,
    pub analysis: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            backtest: Duration::from_secs(120),
            monte_carlo: Duration::from_secs(600),
            analysis: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub api_base_url: String,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            api_base_url: crate::app_url::DEFAULT_API_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppSettings {
    pub service: ServiceSettings,
    pub timeouts: StageTimeouts,
    pub simulation: SimulationParameters,
}

impl AppSettings {
    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = std::env::vars().collect();
        Self::from_settings_map(&settings)
    }

    /// Every setting is optional; a present but malformed value is an error naming the key.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let api_base_url = resolve_api_base_url(settings)?;
        let connect_timeout =
            Duration::from_secs(setting_u64(settings, "MONTY_CONNECT_TIMEOUT_SECS", 10, 1, None)?);
        let retry = RetryPolicy {
            max_retries: setting_u64(settings, "MONTY_MAX_RETRIES", 2, 0, Some(10))? as u32,
            base_delay: Duration::from_millis(setting_u64(
                settings,
                "MONTY_RETRY_BASE_DELAY_MS",
                500,
                0,
                None,
            )?),
        };

        let timeouts = StageTimeouts {
            backtest: Duration::from_secs(setting_u64(
                settings,
                "MONTY_BACKTEST_TIMEOUT_SECS",
                120,
                1,
                None,
            )?),
            monte_carlo: Duration::from_secs(setting_u64(
                settings,
                "MONTY_MONTE_CARLO_TIMEOUT_SECS",
                600,
                1,
                None,
            )?),
            analysis: Duration::from_secs(setting_u64(
                settings,
                "MONTY_ANALYSIS_TIMEOUT_SECS",
                120,
                1,
                None,
            )?),
        };

        let defaults = SimulationParameters::default();
        let lookback_years = setting_u64(
            settings,
            "MONTE_CARLO_LOOKBACK_YEARS",
            defaults.lookback_years.into(),
            0,
            Some(u32::MAX.into()),
        )?;
        let simulation_length_days = setting_u64(
            settings,
            "MONTE_CARLO_SIMULATION_LENGTH_DAYS",
            defaults.simulation_length_days.into(),
            0,
            Some(u32::MAX.into()),
        )?;
        let num_simulations = setting_u64(
            settings,
            "MONTE_CARLO_NUM_SIMULATIONS",
            defaults.num_simulations.into(),
            0,
            Some(u32::MAX.into()),
        )?;
        let simulation = SimulationParameters::new(
            lookback_years as u32,
            simulation_length_days as u32,
            num_simulations as u32,
        )?;

        Ok(Self {
            service: ServiceSettings {
                api_base_url,
                connect_timeout,
                retry,
            },
            timeouts,
            simulation,
        })
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn setting_u64(
    settings: &HashMap<String, String>,
    key: &str,
    default: u64,
    min: u64,
    max: Option<u64>,
) -> Result<u64> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(default);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if value.fract() != 0.0 {
        return Err(anyhow!(
            "Setting {} must be an integer (value: {})",
            key,
            raw
        ));
    }
    if value < min as f64 {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    if let Some(max_value) = max {
        if value > max_value as f64 {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_map_gives_defaults() {
        let app = AppSettings::from_settings_map(&HashMap::new()).unwrap();
        assert_eq!(app, AppSettings::default());
        assert_eq!(app.simulation.num_simulations(), 500);
        assert_eq!(app.timeouts.monte_carlo, Duration::from_secs(600));
    }

    #[test]
    fn overrides_are_applied() {
        let app = AppSettings::from_settings_map(&settings(&[
            ("MONTY_API_URL", "http://10.0.0.5:9000"),
            ("MONTY_MAX_RETRIES", "0"),
            ("MONTY_BACKTEST_TIMEOUT_SECS", "30"),
            ("MONTE_CARLO_NUM_SIMULATIONS", "250"),
        ]))
        .unwrap();
        assert_eq!(app.service.api_base_url, "http://10.0.0.5:9000");
        assert_eq!(app.service.retry.max_retries, 0);
        assert_eq!(app.timeouts.backtest, Duration::from_secs(30));
        assert_eq!(app.simulation.num_simulations(), 250);
    }

    #[test]
    fn malformed_settings_name_the_key() {
        let err = AppSettings::from_settings_map(&settings(&[("MONTY_MAX_RETRIES", "two")]))
            .unwrap_err();
        assert!(err.to_string().contains("MONTY_MAX_RETRIES"));

        let err = AppSettings::from_settings_map(&settings(&[(
            "MONTY_ANALYSIS_TIMEOUT_SECS",
            "1.5",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("MONTY_ANALYSIS_TIMEOUT_SECS"));
    }

    #[test]
    fn simulation_parameters_are_range_checked() {
        let err = AppSettings::from_settings_map(&settings(&[(
            "MONTE_CARLO_SIMULATION_LENGTH_DAYS",
            "600",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("simulation_length_days"));

        let params = SimulationParameters::default()
            .with_overrides(Some(5), None, Some(1000))
            .unwrap();
        assert_eq!(params.lookback_years(), 5);
        assert_eq!(params.simulation_length_days(), 252);
        assert!(SimulationParameters::default()
            .with_overrides(Some(0), None, None)
            .is_err());
    }
}
