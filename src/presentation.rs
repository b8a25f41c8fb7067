use crate::models::{
    AnalysisResult, BacktestStatistics, MonteCarloResult, SimulationPath, StructuredAnalysis,
};
use crate::series::{
    detect_decreases, max_drawdown_pct, normalize_series, DecreaseDiagnostic, SeriesOutcome,
};
use crate::workflow::{FailureKind, Stage, StageFailure, WorkflowState};
use serde::Serialize;
use statrs::statistics::{Data, OrderStatistics};

pub const DEFAULT_DISPLAY_PATHS: usize = 20;
pub const MAX_DISPLAY_PATHS: usize = 100;
pub const NO_ANALYSIS_PLACEHOLDER: &str = "No analysis available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    /// `Some(true)` for good, `Some(false)` for bad, `None` when neither.
    pub fn as_positive(&self) -> Option<bool> {
        match self {
            Polarity::Positive => Some(true),
            Polarity::Negative => Some(false),
            Polarity::Neutral => None,
        }
    }
}

/// Which threshold table a metric is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Return,
    Drawdown,
    WinRate,
    Sharpe,
    Plain,
}

#[derive(Debug, Clone, Copy)]
enum Cutoff {
    Above(f64),
    AtLeast(f64),
    Exactly(f64),
    Any,
}

impl Cutoff {
    fn admits(&self, value: f64) -> bool {
        match *self {
            Cutoff::Above(limit) => value > limit,
            Cutoff::AtLeast(limit) => value >= limit,
            Cutoff::Exactly(target) => value == target,
            Cutoff::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Band {
    cutoff: Cutoff,
    polarity: Polarity,
    subtitle: &'static str,
}

const fn band(cutoff: Cutoff, polarity: Polarity, subtitle: &'static str) -> Band {
    Band {
        cutoff,
        polarity,
        subtitle,
    }
}

// First matching band wins.
const RETURN_BANDS: &[Band] = &[
    band(Cutoff::Above(10.0), Polarity::Positive, "Strong returns"),
    band(Cutoff::Above(0.0), Polarity::Positive, "Positive returns"),
    band(Cutoff::Exactly(0.0), Polarity::Neutral, "Break-even"),
    band(Cutoff::Any, Polarity::Negative, "Negative returns"),
];

// Drawdowns are judged on magnitude.
const DRAWDOWN_BANDS: &[Band] = &[
    band(Cutoff::Above(20.0), Polarity::Negative, "High risk"),
    band(Cutoff::AtLeast(10.0), Polarity::Neutral, "Moderate risk"),
    band(Cutoff::Any, Polarity::Positive, "Low risk"),
];

const WIN_RATE_BANDS: &[Band] = &[
    band(Cutoff::Above(60.0), Polarity::Positive, "High success rate"),
    band(Cutoff::AtLeast(40.0), Polarity::Neutral, "Moderate success"),
    band(Cutoff::Any, Polarity::Negative, "Low success rate"),
];

const SHARPE_BANDS: &[Band] = &[
    band(Cutoff::AtLeast(2.0), Polarity::Positive, "Excellent risk-adjusted return"),
    band(Cutoff::AtLeast(1.0), Polarity::Positive, "Good risk-adjusted return"),
    band(Cutoff::AtLeast(0.0), Polarity::Neutral, "Weak risk-adjusted return"),
    band(Cutoff::Any, Polarity::Negative, "Poor risk-adjusted return"),
];

const THRESHOLDS: &[(Scale, &[Band])] = &[
    (Scale::Return, RETURN_BANDS),
    (Scale::Drawdown, DRAWDOWN_BANDS),
    (Scale::WinRate, WIN_RATE_BANDS),
    (Scale::Sharpe, SHARPE_BANDS),
];

/// Polarity and short verdict for `value` on `scale`. Plain metrics and non-finite values
/// are neutral without a verdict.
pub fn classify(scale: Scale, value: f64) -> (Polarity, Option<&'static str>) {
    if !value.is_finite() {
        return (Polarity::Neutral, None);
    }
    let value = if scale == Scale::Drawdown {
        value.abs()
    } else {
        value
    };
    THRESHOLDS
        .iter()
        .find(|(candidate, _)| *candidate == scale)
        .and_then(|(_, bands)| bands.iter().find(|band| band.cutoff.admits(value)))
        .map(|band| (band.polarity, Some(band.subtitle)))
        .unwrap_or((Polarity::Neutral, None))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    TotalReturn,
    InitialCapital,
    FinalCapital,
    MaxDrawdown,
    WinRate,
    TotalTrades,
    WinningTrades,
    AvgProfit,
    AvgLoss,
    AvgReturn,
    MedianReturn,
    HighestReturn,
    AvgDrawdown,
    MedianDrawdown,
    WorstDrawdown,
    SharpeRatio,
    SuccessfulSimulations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Percent,
    Currency,
    Count,
    Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub key: MetricKey,
    pub label: &'static str,
    pub unit: Unit,
    pub scale: Scale,
}

const fn metric(key: MetricKey, label: &'static str, unit: Unit, scale: Scale) -> MetricSpec {
    MetricSpec {
        key,
        label,
        unit,
        scale,
    }
}

pub const METRICS: &[MetricSpec] = &[
    metric(MetricKey::TotalReturn, "Total Return", Unit::Percent, Scale::Return),
    metric(MetricKey::InitialCapital, "Initial Capital", Unit::Currency, Scale::Plain),
    metric(MetricKey::FinalCapital, "Final Capital", Unit::Currency, Scale::Plain),
    metric(MetricKey::MaxDrawdown, "Max Drawdown", Unit::Percent, Scale::Drawdown),
    metric(MetricKey::WinRate, "Win Rate", Unit::Percent, Scale::WinRate),
    metric(MetricKey::TotalTrades, "Total Trades", Unit::Count, Scale::Plain),
    metric(MetricKey::WinningTrades, "Winning Trades", Unit::Count, Scale::Plain),
    metric(MetricKey::AvgProfit, "Avg Profit", Unit::Currency, Scale::Plain),
    metric(MetricKey::AvgLoss, "Avg Loss", Unit::Currency, Scale::Plain),
    metric(MetricKey::AvgReturn, "Average Return", Unit::Percent, Scale::Return),
    metric(MetricKey::MedianReturn, "Median Return", Unit::Percent, Scale::Return),
    metric(MetricKey::HighestReturn, "Highest Return", Unit::Percent, Scale::Return),
    metric(MetricKey::AvgDrawdown, "Average Drawdown", Unit::Percent, Scale::Drawdown),
    metric(MetricKey::MedianDrawdown, "Median Drawdown", Unit::Percent, Scale::Drawdown),
    metric(MetricKey::WorstDrawdown, "Worst Drawdown", Unit::Percent, Scale::Drawdown),
    metric(MetricKey::SharpeRatio, "Sharpe Ratio", Unit::Ratio, Scale::Sharpe),
    metric(
        MetricKey::SuccessfulSimulations,
        "Successful Simulations",
        Unit::Count,
        Scale::Plain,
    ),
];

pub fn metric_spec(key: MetricKey) -> Option<&'static MetricSpec> {
    METRICS.iter().find(|spec| spec.key == key)
}

const BACKTEST_CARDS: [MetricKey; 9] = [
    MetricKey::TotalReturn,
    MetricKey::InitialCapital,
    MetricKey::FinalCapital,
    MetricKey::MaxDrawdown,
    MetricKey::WinRate,
    MetricKey::TotalTrades,
    MetricKey::WinningTrades,
    MetricKey::AvgProfit,
    MetricKey::AvgLoss,
];

const MONTE_CARLO_CARDS: [MetricKey; 9] = [
    MetricKey::AvgReturn,
    MetricKey::MedianReturn,
    MetricKey::HighestReturn,
    MetricKey::AvgDrawdown,
    MetricKey::MedianDrawdown,
    MetricKey::WorstDrawdown,
    MetricKey::WinRate,
    MetricKey::SharpeRatio,
    MetricKey::SuccessfulSimulations,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub key: MetricKey,
    pub label: &'static str,
    pub value: f64,
    pub display: String,
    pub polarity: Polarity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<&'static str>,
}

impl MetricCard {
    pub fn positive(&self) -> Option<bool> {
        self.polarity.as_positive()
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn format_value(unit: Unit, value: f64) -> String {
    match unit {
        Unit::Percent => format!("{:.2}%", value),
        Unit::Ratio => format!("{:.2}", value),
        Unit::Count => format!("{:.0}", value),
        Unit::Currency => {
            let formatted = format!("{:.2}", value.abs());
            let (whole, fraction) = formatted
                .split_once('.')
                .unwrap_or((formatted.as_str(), "00"));
            let sign = if value < 0.0 { "-" } else { "" };
            format!("{}${}.{}", sign, group_thousands(whole), fraction)
        }
    }
}

pub fn metric_card(key: MetricKey, value: f64) -> MetricCard {
    let spec = metric_spec(key).copied().unwrap_or(MetricSpec {
        key,
        label: "",
        unit: Unit::Ratio,
        scale: Scale::Plain,
    });
    let (polarity, subtitle) = classify(spec.scale, value);
    MetricCard {
        key,
        label: spec.label,
        value,
        display: format_value(spec.unit, value),
        polarity,
        subtitle,
    }
}

fn backtest_metric(statistics: &BacktestStatistics, key: MetricKey) -> Option<f64> {
    Some(match key {
        MetricKey::TotalReturn => statistics.total_return_pct,
        MetricKey::InitialCapital => statistics.initial_capital,
        MetricKey::FinalCapital => statistics.final_capital,
        MetricKey::MaxDrawdown => statistics.max_drawdown_pct,
        MetricKey::WinRate => statistics.win_rate,
        MetricKey::TotalTrades => f64::from(statistics.total_trades),
        MetricKey::WinningTrades => f64::from(statistics.winning_trades),
        MetricKey::AvgProfit => statistics.avg_profit,
        MetricKey::AvgLoss => statistics.avg_loss.abs(),
        _ => return None,
    })
}

fn monte_carlo_metric(result: &MonteCarloResult, key: MetricKey) -> Option<f64> {
    match key {
        MetricKey::AvgReturn => result.avg_return,
        MetricKey::MedianReturn => result.median_return,
        MetricKey::HighestReturn => result.highest_return,
        MetricKey::AvgDrawdown => result.avg_drawdown,
        MetricKey::MedianDrawdown => result.median_drawdown,
        MetricKey::WorstDrawdown => result.worst_drawdown,
        MetricKey::WinRate => result.win_rate,
        MetricKey::SharpeRatio => result.sharpe_ratio,
        MetricKey::SuccessfulSimulations => result.successful_simulations.map(f64::from),
        _ => None,
    }
}

pub fn backtest_cards(statistics: &BacktestStatistics) -> Vec<MetricCard> {
    BACKTEST_CARDS
        .iter()
        .filter_map(|&key| backtest_metric(statistics, key).map(|value| metric_card(key, value)))
        .collect()
}

/// Cards for the simulation summary. Metrics the engine did not report get no card.
pub fn monte_carlo_cards(result: &MonteCarloResult) -> Vec<MetricCard> {
    MONTE_CARLO_CARDS
        .iter()
        .filter_map(|&key| monte_carlo_metric(result, key).map(|value| metric_card(key, value)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityChart {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub decreases: Vec<DecreaseDiagnostic>,
}

impl EquityChart {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Equity curve ready to plot. Dated curves are normalized; undated ones are labelled by
/// step number. A dated curve that cannot be normalized plots nothing.
pub fn equity_chart(statistics: &BacktestStatistics) -> EquityChart {
    let Some(dates) = statistics.dates.as_deref() else {
        let labels: Vec<String> = (1..=statistics.equity_curve.len())
            .map(|step| step.to_string())
            .collect();
        let decreases = detect_decreases(&labels, &statistics.equity_curve);
        return EquityChart {
            labels,
            values: statistics.equity_curve.clone(),
            decreases,
        };
    };

    match normalize_series(Some(dates), Some(statistics.equity_curve.as_slice())) {
        SeriesOutcome::Normalized(series) => EquityChart {
            labels: series.dates,
            values: series.values,
            decreases: series.decreases,
        },
        SeriesOutcome::Unnormalized { .. } => EquityChart {
            labels: Vec::new(),
            values: Vec::new(),
            decreases: Vec::new(),
        },
    }
}

/// Per-path metric plotted in the distribution summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PathMetric {
    #[default]
    FinalValue,
    TotalReturn,
    MaxDrawdown,
}

impl PathMetric {
    pub fn label(&self) -> &'static str {
        match self {
            PathMetric::FinalValue => "Final Value",
            PathMetric::TotalReturn => "Total Return",
            PathMetric::MaxDrawdown => "Max Drawdown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    pub display_paths: usize,
    pub path_metric: PathMetric,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            display_paths: DEFAULT_DISPLAY_PATHS,
            path_metric: PathMetric::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSeries {
    pub name: String,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathSummary {
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathChart {
    pub metric: PathMetric,
    pub total_paths: usize,
    pub series: Vec<PathSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PathSummary>,
}

/// Reported metric when present, otherwise derived from the path's own curve.
pub fn path_metric_value(path: &SimulationPath, metric: PathMetric) -> Option<f64> {
    let values = path.values();
    match metric {
        PathMetric::FinalValue => path.final_value.or_else(|| values.last().copied()),
        PathMetric::TotalReturn => path.total_return.or_else(|| {
            let first = *values.first()?;
            let last = *values.last()?;
            (first != 0.0).then(|| (last / first - 1.0) * 100.0)
        }),
        PathMetric::MaxDrawdown => path
            .max_drawdown
            .or_else(|| (!values.is_empty()).then(|| max_drawdown_pct(&values))),
    }
}

fn summarize(values: Vec<f64>) -> Option<PathSummary> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values);
    Some(PathSummary {
        p5: data.percentile(5),
        p50: data.percentile(50),
        p95: data.percentile(95),
    })
}

pub fn path_chart(result: &MonteCarloResult, options: &ChartOptions) -> Option<PathChart> {
    let paths = result
        .simulation_paths
        .as_ref()
        .filter(|paths| !paths.is_empty())?;
    let limit = options.display_paths.clamp(1, MAX_DISPLAY_PATHS);

    let series = paths
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, path)| PathSeries {
            name: format!("Simulation {}", index + 1),
            values: path.values(),
            metric_value: path_metric_value(path, options.path_metric),
        })
        .collect();

    let metric_values: Vec<f64> = paths
        .iter()
        .filter_map(|path| path_metric_value(path, options.path_metric))
        .filter(|value| value.is_finite())
        .collect();

    Some(PathChart {
        metric: options.path_metric,
        total_paths: paths.len(),
        series,
        summary: summarize(metric_values),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisView {
    Pending,
    Unavailable { placeholder: &'static str },
    Narrative { text: String },
    Structured { analysis: StructuredAnalysis },
}

pub fn analysis_view(stage: Stage, analysis: Option<&AnalysisResult>) -> AnalysisView {
    if matches!(stage, Stage::Simulated | Stage::Analyzing) {
        return AnalysisView::Pending;
    }
    match analysis {
        Some(AnalysisResult::Structured(analysis)) => AnalysisView::Structured {
            analysis: analysis.clone(),
        },
        Some(AnalysisResult::Narrative(text)) => AnalysisView::Narrative { text: text.clone() },
        None => AnalysisView::Unavailable {
            placeholder: NO_ANALYSIS_PLACEHOLDER,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBanner {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
}

pub fn error_banner(failure: &StageFailure) -> ErrorBanner {
    let title = match failure.kind {
        FailureKind::Rejected => format!("{} could not run", failure.stage),
        FailureKind::TimedOut => format!("{} timed out", failure.stage),
        FailureKind::Transport => format!("{} failed", failure.stage),
    };
    ErrorBanner {
        title,
        message: failure.message.clone(),
        data_points: failure.data_points,
        date_range: failure.date_range.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestView {
    pub cards: Vec<MetricCard>,
    pub equity: EquityChart,
    pub trade_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<ErrorBanner>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloView {
    pub cards: Vec<MetricCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathChart>,
    pub analysis: AnalysisView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<ErrorBanner>,
}

/// What to show for a workflow state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Presentation {
    Builder {
        #[serde(skip_serializing_if = "Option::is_none")]
        banner: Option<ErrorBanner>,
    },
    Loading {
        stage: Stage,
        message: &'static str,
    },
    Backtest(BacktestView),
    MonteCarlo(MonteCarloView),
}

fn loading_message(stage: Stage) -> &'static str {
    match stage {
        Stage::Simulating => "Running Monte Carlo simulations...",
        _ => "Running backtest...",
    }
}

pub fn backtest_view(statistics: &BacktestStatistics, banner: Option<ErrorBanner>) -> BacktestView {
    BacktestView {
        cards: backtest_cards(statistics),
        equity: equity_chart(statistics),
        trade_count: statistics.trades.len(),
        banner,
    }
}

pub fn monte_carlo_view(
    stage: Stage,
    result: &MonteCarloResult,
    analysis: Option<&AnalysisResult>,
    options: &ChartOptions,
    banner: Option<ErrorBanner>,
) -> MonteCarloView {
    MonteCarloView {
        cards: monte_carlo_cards(result),
        paths: path_chart(result, options),
        analysis: analysis_view(stage, analysis),
        banner,
    }
}

pub fn present(state: &WorkflowState, options: &ChartOptions) -> Presentation {
    let banner = state.error.as_ref().map(error_banner);
    match state.stage {
        Stage::Idle => Presentation::Builder { banner },
        Stage::Backtesting | Stage::Simulating => Presentation::Loading {
            stage: state.stage,
            message: loading_message(state.stage),
        },
        Stage::Backtested => match &state.backtest {
            Some(statistics) => Presentation::Backtest(backtest_view(statistics, banner)),
            None => Presentation::Builder { banner },
        },
        Stage::Simulated | Stage::Analyzing | Stage::Analyzed => match &state.monte_carlo {
            Some(result) => Presentation::MonteCarlo(monte_carlo_view(
                state.stage,
                result,
                state.analysis.as_ref(),
                options,
                banner,
            )),
            None => Presentation::Builder { banner },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PathPoint;

    fn card<'a>(cards: &'a [MetricCard], key: MetricKey) -> Option<&'a MetricCard> {
        cards.iter().find(|card| card.key == key)
    }

    #[test]
    fn monte_carlo_cards_follow_thresholds() {
        let result = MonteCarloResult {
            avg_return: Some(12.5),
            win_rate: Some(55.0),
            ..MonteCarloResult::default()
        };
        let cards = monte_carlo_cards(&result);
        assert_eq!(cards.len(), 2);

        let avg = card(&cards, MetricKey::AvgReturn).unwrap();
        assert_eq!(avg.positive(), Some(true));
        assert_eq!(avg.subtitle, Some("Strong returns"));
        assert_eq!(avg.display, "12.50%");

        let win_rate = card(&cards, MetricKey::WinRate).unwrap();
        assert_eq!(win_rate.positive(), None);
        assert_eq!(win_rate.subtitle, Some("Moderate success"));
    }

    #[test]
    fn boundaries_are_classified_as_documented() {
        assert_eq!(classify(Scale::Return, 0.0).1, Some("Break-even"));
        assert_eq!(classify(Scale::Return, 10.0).1, Some("Positive returns"));
        assert_eq!(classify(Scale::Return, -0.1).0, Polarity::Negative);
        assert_eq!(classify(Scale::Drawdown, -25.0).0, Polarity::Negative);
        assert_eq!(classify(Scale::Drawdown, 10.0).0, Polarity::Neutral);
        assert_eq!(classify(Scale::Drawdown, 9.99).0, Polarity::Positive);
        assert_eq!(classify(Scale::WinRate, 60.0).0, Polarity::Neutral);
        assert_eq!(classify(Scale::WinRate, 39.9).0, Polarity::Negative);
        assert_eq!(classify(Scale::Sharpe, 2.0).1, Some("Excellent risk-adjusted return"));
        assert_eq!(classify(Scale::Sharpe, -0.5).0, Polarity::Negative);
        assert_eq!(classify(Scale::Plain, 123.0), (Polarity::Neutral, None));
        assert_eq!(classify(Scale::Return, f64::NAN), (Polarity::Neutral, None));
    }

    #[test]
    fn backtest_cards_show_loss_magnitude() {
        let statistics = BacktestStatistics {
            total_trades: 10,
            winning_trades: 7,
            win_rate: 70.0,
            initial_capital: 10000.0,
            final_capital: 12345.678,
            total_return_pct: 23.46,
            max_drawdown_pct: 4.0,
            avg_profit: 500.0,
            avg_loss: -210.0,
            ..BacktestStatistics::default()
        };
        let cards = backtest_cards(&statistics);
        assert_eq!(cards.len(), 9);
        assert_eq!(card(&cards, MetricKey::AvgLoss).unwrap().value, 210.0);
        assert_eq!(card(&cards, MetricKey::FinalCapital).unwrap().display, "$12,345.68");
        assert_eq!(card(&cards, MetricKey::MaxDrawdown).unwrap().subtitle, Some("Low risk"));
        assert_eq!(card(&cards, MetricKey::TotalTrades).unwrap().display, "10");
    }

    #[test]
    fn currency_formatting_groups_thousands() {
        assert_eq!(format_value(Unit::Currency, 1234567.5), "$1,234,567.50");
        assert_eq!(format_value(Unit::Currency, -999.0), "-$999.00");
        assert_eq!(format_value(Unit::Currency, 0.0), "$0.00");
    }

    #[test]
    fn undated_equity_curve_uses_step_labels() {
        let statistics = BacktestStatistics {
            equity_curve: vec![100.0, 110.0, 105.0, 120.0],
            ..BacktestStatistics::default()
        };
        let chart = equity_chart(&statistics);
        assert_eq!(chart.labels, vec!["1", "2", "3", "4"]);
        assert_eq!(chart.decreases.len(), 1);
        assert_eq!(chart.decreases[0].index, 2);
    }

    #[test]
    fn mismatched_dates_plot_nothing() {
        let statistics = BacktestStatistics {
            equity_curve: vec![100.0, 110.0],
            dates: Some(vec!["2024-01-01".to_string()]),
            ..BacktestStatistics::default()
        };
        assert!(equity_chart(&statistics).is_empty());
    }

    fn path(values: &[f64]) -> SimulationPath {
        SimulationPath {
            equity_curve: values.iter().map(|&value| PathPoint::Point { value }).collect(),
            ..SimulationPath::default()
        }
    }

    #[test]
    fn path_chart_limits_series_and_summarizes_all_paths() {
        let result = MonteCarloResult {
            simulation_paths: Some(vec![
                path(&[100.0, 101.0]),
                path(&[100.0, 102.0]),
                path(&[100.0, 103.0]),
                path(&[100.0, 104.0]),
                path(&[100.0, 105.0]),
            ]),
            ..MonteCarloResult::default()
        };
        let options = ChartOptions {
            display_paths: 2,
            path_metric: PathMetric::FinalValue,
        };
        let chart = path_chart(&result, &options).unwrap();
        assert_eq!(chart.total_paths, 5);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[1].name, "Simulation 2");

        let summary = chart.summary.unwrap();
        assert!((summary.p50 - 103.0).abs() < 1e-9);
        assert!(summary.p5 <= summary.p50 && summary.p50 <= summary.p95);
    }

    #[test]
    fn path_metrics_are_derived_when_missing() {
        let simulated = path(&[100.0, 120.0, 90.0]);
        assert_eq!(path_metric_value(&simulated, PathMetric::FinalValue), Some(90.0));
        let total_return = path_metric_value(&simulated, PathMetric::TotalReturn).unwrap();
        assert!((total_return + 10.0).abs() < 1e-9);
        assert_eq!(path_metric_value(&simulated, PathMetric::MaxDrawdown), Some(25.0));
        assert_eq!(path_metric_value(&path(&[]), PathMetric::MaxDrawdown), None);
    }

    #[test]
    fn missing_paths_produce_no_chart() {
        assert!(path_chart(&MonteCarloResult::default(), &ChartOptions::default()).is_none());
    }

    #[test]
    fn rejected_backtest_shows_builder_with_diagnostics() {
        let state = WorkflowState {
            error: Some(StageFailure {
                stage: crate::workflow::StageKind::Backtest,
                kind: FailureKind::Rejected,
                message: "Insufficient data".to_string(),
                data_points: Some(5),
                date_range: Some("2024-01-01 to 2024-01-10".to_string()),
            }),
            ..WorkflowState::default()
        };
        let Presentation::Builder { banner: Some(banner) } = present(&state, &ChartOptions::default())
        else {
            panic!("expected builder with banner");
        };
        assert_eq!(banner.message, "Insufficient data");
        assert_eq!(banner.data_points, Some(5));
        assert_eq!(banner.title, "Backtest could not run");
    }

    #[test]
    fn analysis_is_pending_until_resolved() {
        assert_eq!(analysis_view(Stage::Analyzing, None), AnalysisView::Pending);
        assert_eq!(
            analysis_view(Stage::Analyzed, None),
            AnalysisView::Unavailable {
                placeholder: NO_ANALYSIS_PLACEHOLDER
            }
        );
    }
}
