use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeDirection {
    #[default]
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag written into every compiled condition object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Ma,
    Rsi,
    Macd,
    Bollinger,
    Adx,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 5] = [
        IndicatorKind::Ma,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Bollinger,
        IndicatorKind::Adx,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Ma => "ma",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bollinger => "bollinger",
            IndicatorKind::Adx => "adx",
        }
    }

    /// Key of this indicator's slot inside `entry_conditions`.
    pub fn slot_key(&self) -> &'static str {
        match self {
            IndicatorKind::Ma => "ma_condition",
            IndicatorKind::Rsi => "rsi_condition",
            IndicatorKind::Macd => "macd_condition",
            IndicatorKind::Bollinger => "bb_condition",
            IndicatorKind::Adx => "adx_condition",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaType {
    #[default]
    Sma,
    Ema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaComparison {
    #[default]
    Above,
    Below,
    CrossAbove,
    CrossBelow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RsiComparison {
    Above,
    #[default]
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacdCrossover {
    #[default]
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MacdComparison {
    AboveZero,
    BelowZero,
    HistogramPositive,
    HistogramNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BollingerComparison {
    AboveUpper,
    #[default]
    BelowLower,
    CrossMiddleUp,
    CrossMiddleDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdxComparison {
    #[default]
    Above,
    Below,
    DiCrossAbove,
    DiCrossBelow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaCondition {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub period: u32,
    pub ma_type: MaType,
    pub comparison: MaComparison,
    pub deviation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiCondition {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub period: u32,
    pub comparison: RsiComparison,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdCondition {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub crossover: Option<MacdCrossover>,
    pub macd_comparison: Option<MacdComparison>,
    pub histogram_positive: Option<bool>,
    pub macd_signal_deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerCondition {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub period: u32,
    pub std_dev: f64,
    pub comparison: BollingerComparison,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdxCondition {
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    pub period: u32,
    pub comparison: AdxComparison,
    pub value: f64,
}

/// Entry rules. Every indicator slot is always serialized; disabled ones as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntryConditions {
    pub ma_condition: Option<MaCondition>,
    pub rsi_condition: Option<RsiCondition>,
    pub macd_condition: Option<MacdCondition>,
    pub bb_condition: Option<BollingerCondition>,
    pub adx_condition: Option<AdxCondition>,
    pub trade_direction: TradeDirection,
}

impl EntryConditions {
    pub fn enabled_kinds(&self) -> Vec<IndicatorKind> {
        let mut kinds = Vec::new();
        if self.ma_condition.is_some() {
            kinds.push(IndicatorKind::Ma);
        }
        if self.rsi_condition.is_some() {
            kinds.push(IndicatorKind::Rsi);
        }
        if self.macd_condition.is_some() {
            kinds.push(IndicatorKind::Macd);
        }
        if self.bb_condition.is_some() {
            kinds.push(IndicatorKind::Bollinger);
        }
        if self.adx_condition.is_some() {
            kinds.push(IndicatorKind::Adx);
        }
        kinds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitConditions {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub position_size_pct: f64,
}

impl Default for ExitConditions {
    fn default() -> Self {
        Self {
            stop_loss_pct: 2.0,
            take_profit_pct: 4.0,
            position_size_pct: 10.0,
        }
    }
}

/// Canonical payload sent to the backtest engine and embedded in later stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRequest {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub timeframe: String,
    pub initial_capital: f64,
    pub entry_conditions: EntryConditions,
    pub exit_conditions: ExitConditions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeRecord {
    pub entry_date: String,
    pub exit_date: Option<String>,
    pub direction: TradeDirection,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub exit_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestStatistics {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub avg_profit: f64,
    pub avg_loss: f64,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<Vec<String>>,
}

/// Error variant of a backtest response: the engine ran but refused to produce statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestRejection {
    pub message: String,
    #[serde(default)]
    pub data_points: Option<u64>,
    #[serde(default)]
    pub date_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_trades: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_capital: Option<f64>,
}

/// Stage 1 output. A payload carrying `message` is always the rejection variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BacktestResult {
    Completed(BacktestStatistics),
    Rejected(BacktestRejection),
}

impl<'de> Deserialize<'de> for BacktestResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let has_message = value
            .get("message")
            .map(|message| !message.is_null())
            .unwrap_or(false);
        if has_message {
            BacktestRejection::deserialize(value)
                .map(BacktestResult::Rejected)
                .map_err(de::Error::custom)
        } else {
            BacktestStatistics::deserialize(value)
                .map(BacktestResult::Completed)
                .map_err(de::Error::custom)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    pub lookback_years: u32,
    pub simulation_length_days: u32,
    pub num_simulations: u32,
    pub backtest_request: StrategyRequest,
}

/// A single equity point on a simulated path. The engine sends either bare numbers
/// or `{ "value": .. }` objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathPoint {
    Value(f64),
    Point { value: f64 },
}

impl PathPoint {
    pub fn value(&self) -> f64 {
        match self {
            PathPoint::Value(value) | PathPoint::Point { value } => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationPath {
    pub equity_curve: Vec<PathPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
}

impl SimulationPath {
    pub fn values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(PathPoint::value).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_drawdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_drawdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst_drawdown: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpe_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_simulations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation_paths: Option<Vec<SimulationPath>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub results: MonteCarloResult,
    pub strategy: StrategyRequest,
}

/// Raw analysis response. The payload is resolved by `analysis::resolve_analysis`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub analysis: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverallAssessment {
    pub rating: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskManagement {
    pub current_assessment: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptimization {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizing {
    pub current_analysis: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub overall_assessment: OverallAssessment,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub risk_management: RiskManagement,
    #[serde(default)]
    pub strategy_optimization: StrategyOptimization,
    #[serde(default)]
    pub position_sizing: PositionSizing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "content", rename_all = "snake_case")]
pub enum AnalysisResult {
    Structured(StructuredAnalysis),
    Narrative(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backtest_payload_with_message_is_rejection() {
        let payload = json!({
            "message": "Insufficient data",
            "data_points": 5,
            "date_range": "2024-01-01 to 2024-01-10"
        });

        let result: BacktestResult = serde_json::from_value(payload).unwrap();
        match result {
            BacktestResult::Rejected(rejection) => {
                assert_eq!(rejection.message, "Insufficient data");
                assert_eq!(rejection.data_points, Some(5));
                assert_eq!(
                    rejection.date_range.as_deref(),
                    Some("2024-01-01 to 2024-01-10")
                );
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn no_trades_payload_is_rejection_even_with_equity_curve() {
        let payload = json!({
            "success": true,
            "message": "No trades were executed based on the given conditions",
            "total_trades": 0,
            "initial_capital": 10000.0,
            "final_capital": 10000.0,
            "equity_curve": [10000.0, 10000.0]
        });

        let result: BacktestResult = serde_json::from_value(payload).unwrap();
        assert!(matches!(result, BacktestResult::Rejected(_)));
    }

    #[test]
    fn backtest_payload_without_message_is_completed() {
        let payload = json!({
            "success": true,
            "total_trades": 4,
            "winning_trades": 3,
            "losing_trades": 1,
            "win_rate": 75.0,
            "initial_capital": 10000.0,
            "final_capital": 10450.0,
            "total_return_pct": 4.5,
            "max_drawdown_pct": 1.2,
            "avg_profit": 200.0,
            "avg_loss": -150.0,
            "trades": [{
                "entry_date": "2024-01-02T00:00:00",
                "exit_date": "2024-01-05T00:00:00",
                "direction": "BUY",
                "entry_price": 100.0,
                "exit_price": 104.0,
                "pnl": 40.0,
                "pnl_pct": 4.0,
                "exit_reason": "Take Profit"
            }],
            "equity_curve": [10000.0, 10100.0, 10450.0]
        });

        let result: BacktestResult = serde_json::from_value(payload).unwrap();
        let BacktestResult::Completed(stats) = result else {
            panic!("expected completed backtest");
        };
        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.trades.len(), 1);
        assert_eq!(stats.trades[0].direction, TradeDirection::Buy);
        assert_eq!(stats.equity_curve.len(), 3);
    }

    #[test]
    fn null_message_does_not_select_rejection() {
        let payload = json!({ "message": null, "total_trades": 1, "equity_curve": [1.0] });
        let result: BacktestResult = serde_json::from_value(payload).unwrap();
        assert!(matches!(result, BacktestResult::Completed(_)));
    }

    #[test]
    fn monte_carlo_paths_accept_bare_numbers_and_objects() {
        let payload = json!({
            "avg_return": 3.0,
            "simulation_paths": [
                { "equity_curve": [100.0, 101.0] },
                { "equity_curve": [{ "value": 100.0 }, { "value": 99.0 }], "final_value": 99.0 }
            ]
        });

        let result: MonteCarloResult = serde_json::from_value(payload).unwrap();
        let paths = result.simulation_paths.unwrap();
        assert_eq!(paths[0].values(), vec![100.0, 101.0]);
        assert_eq!(paths[1].values(), vec![100.0, 99.0]);
        assert_eq!(paths[1].final_value, Some(99.0));
    }
}
