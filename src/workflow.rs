use crate::compiler::CompileError;
use crate::config::SimulationParameters;
use crate::models::{
    AnalysisRequest, AnalysisResult, BacktestRejection, BacktestStatistics, MonteCarloRequest,
    MonteCarloResult, StrategyRequest,
};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where the backtest -> Monte-Carlo -> analysis pipeline currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Backtesting,
    Backtested,
    Simulating,
    Simulated,
    Analyzing,
    Analyzed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Backtesting => "backtesting",
            Stage::Backtested => "backtested",
            Stage::Simulating => "simulating",
            Stage::Simulated => "simulated",
            Stage::Analyzing => "analyzing",
            Stage::Analyzed => "analyzed",
        }
    }

    /// A remote call is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Stage::Backtesting | Stage::Simulating | Stage::Analyzing)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote call a failure or response belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Backtest,
    MonteCarlo,
    Analysis,
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Backtest => "Backtest",
            StageKind::MonteCarlo => "Monte Carlo simulation",
            StageKind::Analysis => "Analysis",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    Submit,
    BacktestSucceeded,
    BacktestFailed,
    StressTestRequested,
    SimulationSucceeded,
    SimulationFailed,
    AnalysisStarted,
    AnalysisSucceeded,
    AnalysisFailed,
    NavigateBack,
}

impl WorkflowEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowEvent::Submit => "submit",
            WorkflowEvent::BacktestSucceeded => "backtest succeeded",
            WorkflowEvent::BacktestFailed => "backtest failed",
            WorkflowEvent::StressTestRequested => "stress test",
            WorkflowEvent::SimulationSucceeded => "simulation succeeded",
            WorkflowEvent::SimulationFailed => "simulation failed",
            WorkflowEvent::AnalysisStarted => "start analysis",
            WorkflowEvent::AnalysisSucceeded => "analysis succeeded",
            WorkflowEvent::AnalysisFailed => "analysis failed",
            WorkflowEvent::NavigateBack => "navigate back",
        }
    }

    /// The remote call this event issues, if any.
    pub fn starts_call(&self) -> Option<StageKind> {
        match self {
            WorkflowEvent::Submit => Some(StageKind::Backtest),
            WorkflowEvent::StressTestRequested => Some(StageKind::MonteCarlo),
            WorkflowEvent::AnalysisStarted => Some(StageKind::Analysis),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every legal transition. Anything not listed is rejected.
pub const TRANSITIONS: [(Stage, WorkflowEvent, Stage); 11] = [
    (Stage::Idle, WorkflowEvent::Submit, Stage::Backtesting),
    (Stage::Backtesting, WorkflowEvent::BacktestSucceeded, Stage::Backtested),
    (Stage::Backtesting, WorkflowEvent::BacktestFailed, Stage::Idle),
    (Stage::Backtested, WorkflowEvent::StressTestRequested, Stage::Simulating),
    (Stage::Simulating, WorkflowEvent::SimulationSucceeded, Stage::Simulated),
    (Stage::Simulating, WorkflowEvent::SimulationFailed, Stage::Backtested),
    (Stage::Simulated, WorkflowEvent::AnalysisStarted, Stage::Analyzing),
    (Stage::Analyzing, WorkflowEvent::AnalysisSucceeded, Stage::Analyzed),
    (Stage::Analyzing, WorkflowEvent::AnalysisFailed, Stage::Analyzed),
    (Stage::Simulated, WorkflowEvent::NavigateBack, Stage::Backtested),
    (Stage::Analyzed, WorkflowEvent::NavigateBack, Stage::Backtested),
];

pub fn next_stage(from: Stage, event: WorkflowEvent) -> Option<Stage> {
    TRANSITIONS
        .iter()
        .find(|(stage, candidate, _)| *stage == from && *candidate == event)
        .map(|(_, _, to)| *to)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport error, non-success status, or unreadable body.
    Transport,
    TimedOut,
    /// The engine answered but refused to run (for example too little data).
    Rejected,
}

/// User-visible failure of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageFailure {
    pub stage: StageKind,
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_points: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
}

impl StageFailure {
    pub fn transport(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind: FailureKind::Transport,
            message: message.into(),
            data_points: None,
            date_range: None,
        }
    }

    pub fn timed_out(stage: StageKind, after: Duration) -> Self {
        Self {
            stage,
            kind: FailureKind::TimedOut,
            message: format!("{} timed out after {}s", stage, after.as_secs()),
            data_points: None,
            date_range: None,
        }
    }

    pub fn rejected(rejection: &BacktestRejection) -> Self {
        Self {
            stage: StageKind::Backtest,
            kind: FailureKind::Rejected,
            message: rejection.message.clone(),
            data_points: rejection.data_points,
            date_range: rejection.date_range.clone(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// An event together with the data it carries into the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Submit(StrategyRequest),
    BacktestSucceeded(BacktestStatistics),
    BacktestFailed(StageFailure),
    StressTestRequested,
    SimulationSucceeded(MonteCarloResult),
    SimulationFailed(StageFailure),
    AnalysisStarted,
    AnalysisSucceeded(Option<AnalysisResult>),
    AnalysisFailed(StageFailure),
    NavigateBack,
}

impl Transition {
    pub fn event(&self) -> WorkflowEvent {
        match self {
            Transition::Submit(_) => WorkflowEvent::Submit,
            Transition::BacktestSucceeded(_) => WorkflowEvent::BacktestSucceeded,
            Transition::BacktestFailed(_) => WorkflowEvent::BacktestFailed,
            Transition::StressTestRequested => WorkflowEvent::StressTestRequested,
            Transition::SimulationSucceeded(_) => WorkflowEvent::SimulationSucceeded,
            Transition::SimulationFailed(_) => WorkflowEvent::SimulationFailed,
            Transition::AnalysisStarted => WorkflowEvent::AnalysisStarted,
            Transition::AnalysisSucceeded(_) => WorkflowEvent::AnalysisSucceeded,
            Transition::AnalysisFailed(_) => WorkflowEvent::AnalysisFailed,
            Transition::NavigateBack => WorkflowEvent::NavigateBack,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("a request is already in flight (stage: {0})")]
    Busy(Stage),
    #[error("cannot {event} while {stage}")]
    InvalidTransition { stage: Stage, event: WorkflowEvent },
    #[error("{0} response arrived after the session was discarded")]
    Discarded(StageKind),
}

/// Snapshot of one workflow session: the stage plus everything produced so far.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WorkflowState {
    pub stage: Stage,
    pub error: Option<StageFailure>,
    pub request: Option<StrategyRequest>,
    pub backtest: Option<BacktestStatistics>,
    pub monte_carlo: Option<MonteCarloResult>,
    pub analysis: Option<AnalysisResult>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `event` would lead to, or why it is not allowed right now.
    pub fn check(&self, event: WorkflowEvent) -> Result<Stage, WorkflowError> {
        if let Some(next) = next_stage(self.stage, event) {
            return Ok(next);
        }
        if self.stage.is_in_flight() && event.starts_call().is_some() {
            return Err(WorkflowError::Busy(self.stage));
        }
        Err(WorkflowError::InvalidTransition {
            stage: self.stage,
            event,
        })
    }

    pub fn apply(&mut self, transition: Transition) -> Result<Stage, WorkflowError> {
        let next = self.check(transition.event())?;

        match transition {
            Transition::Submit(request) => {
                *self = WorkflowState {
                    request: Some(request),
                    ..WorkflowState::default()
                };
            }
            Transition::BacktestSucceeded(statistics) => {
                self.backtest = Some(statistics);
                self.error = None;
            }
            Transition::BacktestFailed(failure) => {
                self.request = None;
                self.backtest = None;
                self.error = Some(failure);
            }
            Transition::StressTestRequested => {
                self.monte_carlo = None;
                self.analysis = None;
                self.error = None;
            }
            Transition::SimulationSucceeded(result) => {
                self.monte_carlo = Some(result);
            }
            Transition::SimulationFailed(failure) => {
                self.monte_carlo = None;
                self.error = Some(failure);
            }
            Transition::AnalysisStarted => {
                self.analysis = None;
            }
            Transition::AnalysisSucceeded(analysis) => {
                self.analysis = analysis;
            }
            Transition::AnalysisFailed(failure) => {
                self.analysis = None;
                self.error = Some(failure);
            }
            Transition::NavigateBack => {
                self.monte_carlo = None;
                self.analysis = None;
                self.error = None;
            }
        }

        self.stage = next;
        Ok(next)
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn monte_carlo_request(&self, simulation: &SimulationParameters) -> Option<MonteCarloRequest> {
        let request = self.request.as_ref()?;
        Some(MonteCarloRequest {
            lookback_years: simulation.lookback_years(),
            simulation_length_days: simulation.simulation_length_days(),
            num_simulations: simulation.num_simulations(),
            backtest_request: request.clone(),
        })
    }

    pub fn analysis_request(&self) -> Option<AnalysisRequest> {
        Some(AnalysisRequest {
            results: self.monte_carlo.clone()?,
            strategy: self.request.clone()?,
        })
    }
}
