use crate::indicators::{IndicatorConfig, IndicatorSet, RawInput};
use crate::models::{EntryConditions, ExitConditions, StrategyRequest, TradeDirection};
use crate::param_utils::{normalize_symbol, parse_date, parse_positive_number};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEFRAME: &str = "1d";
pub const DEFAULT_INITIAL_CAPITAL: &str = "10000";

/// Parameter that could not be turned into a well-formed request value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("{field} is required")]
    Missing { field: String },
    #[error("{field} must be a number (got {value:?})")]
    NotNumeric { field: String, value: String },
    #[error("{field} must be a finite number (got {value:?})")]
    NotFinite { field: String, value: String },
    #[error("{field} must be greater than zero (got {value:?})")]
    NotPositive { field: String, value: String },
    #[error("{field} must be a whole number of at least 1 (got {value:?})")]
    InvalidPeriod { field: String, value: String },
    #[error("{field} must be a YYYY-MM-DD date (got {value:?})")]
    InvalidDate { field: String, value: String },
    #[error("start_date {start} is after end_date {end}")]
    DateOrder { start: NaiveDate, end: NaiveDate },
}

impl CompileError {
    pub fn field(&self) -> &str {
        match self {
            CompileError::Missing { field }
            | CompileError::NotNumeric { field, .. }
            | CompileError::NotFinite { field, .. }
            | CompileError::NotPositive { field, .. }
            | CompileError::InvalidPeriod { field, .. }
            | CompileError::InvalidDate { field, .. } => field,
            CompileError::DateOrder { .. } => "start_date",
        }
    }
}

/// Everything the strategy builder collects before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyForm {
    pub symbol: String,
    pub start_date: String,
    pub end_date: String,
    pub timeframe: String,
    pub initial_capital: RawInput,
    pub trade_direction: Option<TradeDirection>,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub position_size_pct: f64,
    pub indicators: IndicatorSet,
}

impl Default for StrategyForm {
    fn default() -> Self {
        let exits = ExitConditions::default();
        Self {
            symbol: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            initial_capital: DEFAULT_INITIAL_CAPITAL.into(),
            trade_direction: None,
            stop_loss_pct: exits.stop_loss_pct,
            take_profit_pct: exits.take_profit_pct,
            position_size_pct: exits.position_size_pct,
            indicators: IndicatorSet::default(),
        }
    }
}

impl StrategyForm {
    pub fn compile(&self) -> Result<StrategyRequest, CompileError> {
        compile(self)
    }
}

fn compile_slot<C: IndicatorConfig>(config: &C) -> Result<Option<C::Condition>, CompileError> {
    if !config.is_enabled() {
        return Ok(None);
    }
    config.to_condition().map(Some)
}

/// Compile the builder state into the request sent to the backtest engine.
///
/// Only enabled indicators produce a condition; every other slot is emitted as `null`.
/// Parameter values are never range-checked here, only checked for being representable.
pub fn compile(form: &StrategyForm) -> Result<StrategyRequest, CompileError> {
    let symbol = normalize_symbol(&form.symbol).ok_or_else(|| CompileError::Missing {
        field: "symbol".to_string(),
    })?;
    let start_date = parse_date("start_date", &form.start_date)?;
    let end_date = parse_date("end_date", &form.end_date)?;
    if start_date > end_date {
        return Err(CompileError::DateOrder {
            start: start_date,
            end: end_date,
        });
    }

    let timeframe = match form.timeframe.trim() {
        "" => DEFAULT_TIMEFRAME.to_string(),
        timeframe => timeframe.to_string(),
    };
    let initial_capital = parse_positive_number("initial_capital", form.initial_capital.as_str())?;

    let indicators = &form.indicators;
    let entry_conditions = EntryConditions {
        ma_condition: compile_slot(&indicators.ma)?,
        rsi_condition: compile_slot(&indicators.rsi)?,
        macd_condition: compile_slot(&indicators.macd)?,
        bb_condition: compile_slot(&indicators.bollinger)?,
        adx_condition: compile_slot(&indicators.adx)?,
        trade_direction: form.trade_direction.unwrap_or_default(),
    };

    let exit_conditions = ExitConditions {
        stop_loss_pct: form.stop_loss_pct,
        take_profit_pct: form.take_profit_pct,
        position_size_pct: form.position_size_pct,
    };

    debug!(
        "Compiled {} strategy for {} ({} to {}) with indicators {:?}",
        entry_conditions.trade_direction,
        symbol,
        start_date,
        end_date,
        entry_conditions.enabled_kinds()
    );

    Ok(StrategyRequest {
        symbol,
        start_date,
        end_date,
        timeframe,
        initial_capital,
        entry_conditions,
        exit_conditions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndicatorKind, RsiComparison};
    use serde_json::{json, Value};

    fn base_form() -> StrategyForm {
        StrategyForm {
            symbol: "aapl".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-12-31".to_string(),
            ..StrategyForm::default()
        }
    }

    #[test]
    fn rsi_only_strategy_compiles_with_null_slots() {
        let mut form = base_form();
        form.indicators.set_enabled(IndicatorKind::Rsi, true);
        form.indicators.rsi.period = "14".into();
        form.indicators.rsi.comparison = RsiComparison::Below;
        form.indicators.rsi.value = "30".into();

        let request = compile(&form).unwrap();
        let payload = serde_json::to_value(&request).unwrap();

        assert_eq!(payload["symbol"], "AAPL");
        assert_eq!(payload["start_date"], "2024-01-01");
        assert_eq!(payload["timeframe"], "1d");
        assert_eq!(payload["initial_capital"], 10000.0);

        let entry = &payload["entry_conditions"];
        assert_eq!(
            entry["rsi_condition"],
            json!({ "type": "rsi", "period": 14, "comparison": "BELOW", "value": 30.0 })
        );
        for slot in ["ma_condition", "macd_condition", "bb_condition", "adx_condition"] {
            assert_eq!(entry[slot], Value::Null, "{} should be null", slot);
        }
        assert_eq!(entry["trade_direction"], "BUY");
        assert_eq!(
            payload["exit_conditions"],
            json!({ "stop_loss_pct": 2.0, "take_profit_pct": 4.0, "position_size_pct": 10.0 })
        );
    }

    #[test]
    fn compile_is_deterministic() {
        let mut form = base_form();
        form.indicators.set_enabled(IndicatorKind::Ma, true);
        form.indicators.set_enabled(IndicatorKind::Adx, true);

        let first = serde_json::to_string(&compile(&form).unwrap()).unwrap();
        let second = serde_json::to_string(&compile(&form).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn disabled_indicator_with_garbage_is_ignored() {
        let mut form = base_form();
        form.indicators.ma.period = "not a number".into();
        let request = compile(&form).unwrap();
        assert!(request.entry_conditions.ma_condition.is_none());
    }

    #[test]
    fn enabled_indicator_with_garbage_names_field() {
        let mut form = base_form();
        form.indicators.set_enabled(IndicatorKind::Ma, true);
        form.indicators.ma.period = "abc".into();
        let err = compile(&form).unwrap_err();
        assert_eq!(err.field(), "ma.period");
        assert!(matches!(err, CompileError::NotNumeric { .. }));
    }

    #[test]
    fn out_of_range_values_are_passed_through() {
        let mut form = base_form();
        form.indicators.set_enabled(IndicatorKind::Rsi, true);
        form.indicators.rsi.value = "150".into();
        let request = compile(&form).unwrap();
        assert_eq!(request.entry_conditions.rsi_condition.unwrap().value, 150.0);
    }

    #[test]
    fn missing_symbol_and_bad_dates_are_rejected() {
        let mut form = base_form();
        form.symbol = "   ".to_string();
        assert_eq!(compile(&form).unwrap_err().field(), "symbol");

        let mut form = base_form();
        form.start_date = "2025-01-01".to_string();
        assert!(matches!(
            compile(&form),
            Err(CompileError::DateOrder { .. })
        ));

        let mut form = base_form();
        form.initial_capital = "-5".into();
        assert_eq!(compile(&form).unwrap_err().field(), "initial_capital");
    }

    #[test]
    fn form_file_fields_default() {
        let form: StrategyForm = serde_json::from_value(json!({
            "symbol": "msft",
            "start_date": "2023-01-01",
            "end_date": "2023-06-30",
            "trade_direction": "SELL",
            "indicators": { "bollinger": { "enabled": true, "std_dev": 2.5 } }
        }))
        .unwrap();

        let request = form.compile().unwrap();
        assert_eq!(request.entry_conditions.trade_direction, TradeDirection::Sell);
        let bb = request.entry_conditions.bb_condition.unwrap();
        assert_eq!(bb.period, 20);
        assert_eq!(bb.std_dev, 2.5);
        assert_eq!(request.exit_conditions, ExitConditions::default());
    }
}
