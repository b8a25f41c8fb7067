use crate::analysis::resolve_analysis;
use crate::compiler::{compile, StrategyForm};
use crate::config::{SimulationParameters, StageTimeouts};
use crate::models::{BacktestResult, StrategyRequest};
use crate::service::StrategyService;
use crate::workflow::{Stage, StageFailure, StageKind, Transition, WorkflowError, WorkflowState};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug)]
struct Session {
    id: Uuid,
    state: WorkflowState,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WorkflowState::new(),
        }
    }
}

/// Identifies the session a remote call was issued for.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    session: Uuid,
    stage: StageKind,
}

/// Drives one strategy through backtest, Monte-Carlo re-simulation and analysis.
///
/// At most one remote call is outstanding at a time. Responses that arrive after
/// [`Workflow::teardown`] are dropped instead of being applied to the new session.
pub struct Workflow<S> {
    service: S,
    simulation: SimulationParameters,
    timeouts: StageTimeouts,
    session: Mutex<Session>,
}

async fn bounded_call<T, F>(stage: StageKind, limit: Duration, call: F) -> Result<T, StageFailure>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            warn!("{} call failed: {:#}", stage, err);
            Err(StageFailure::transport(stage, format!("{:#}", err)))
        }
        Err(_) => {
            warn!("{} call timed out after {:?}", stage, limit);
            Err(StageFailure::timed_out(stage, limit))
        }
    }
}

impl<S: StrategyService> Workflow<S> {
    pub fn new(service: S, simulation: SimulationParameters, timeouts: StageTimeouts) -> Self {
        Self {
            service,
            simulation,
            timeouts,
            session: Mutex::new(Session::new()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn simulation(&self) -> SimulationParameters {
        self.simulation
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_id(&self) -> Uuid {
        self.lock().id
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.lock().state.clone()
    }

    pub fn stage(&self) -> Stage {
        self.lock().state.stage
    }

    /// Validate the transition, build the call payload from the current state, then
    /// move into the in-flight stage. Nothing changes if any step fails.
    fn begin<T>(
        &self,
        transition: Transition,
        payload: impl FnOnce(&WorkflowState) -> Option<T>,
    ) -> Result<(Ticket, T), WorkflowError> {
        let event = transition.event();
        let mut session = self.lock();
        session.state.check(event)?;
        let stage = session.state.stage;
        let payload = payload(&session.state)
            .ok_or(WorkflowError::InvalidTransition { stage, event })?;
        session.state.apply(transition)?;

        let ticket = Ticket {
            session: session.id,
            stage: event.starts_call().unwrap_or(StageKind::Backtest),
        };
        Ok((ticket, payload))
    }

    fn finish(&self, ticket: Ticket, transition: Transition) -> Result<Stage, WorkflowError> {
        let mut session = self.lock();
        if session.id != ticket.session {
            debug!(
                "Dropping {} response for discarded session {}",
                ticket.stage, ticket.session
            );
            return Err(WorkflowError::Discarded(ticket.stage));
        }
        session.state.apply(transition)
    }

    /// Compile the builder state and run the backtest. Compile errors never reach the service.
    pub async fn submit(&self, form: &StrategyForm) -> Result<Stage, WorkflowError> {
        let request = compile(form)?;
        self.run_backtest(request).await
    }

    pub async fn run_backtest(&self, request: StrategyRequest) -> Result<Stage, WorkflowError> {
        let symbol = request.symbol.clone();
        let (ticket, ()) = self.begin(Transition::Submit(request.clone()), |_| Some(()))?;
        info!(
            "Running backtest for {} ({} to {})",
            symbol, request.start_date, request.end_date
        );

        let outcome = bounded_call(
            StageKind::Backtest,
            self.timeouts.backtest,
            self.service.backtest(&request),
        )
        .await;

        let transition = match outcome {
            Ok(BacktestResult::Completed(statistics)) => {
                info!(
                    "Backtest for {} finished: {} trades, {:.2}% return",
                    symbol, statistics.total_trades, statistics.total_return_pct
                );
                Transition::BacktestSucceeded(statistics)
            }
            Ok(BacktestResult::Rejected(rejection)) => {
                warn!(
                    "Backtest for {} rejected: {} (data points: {:?}, range: {:?})",
                    symbol, rejection.message, rejection.data_points, rejection.date_range
                );
                Transition::BacktestFailed(StageFailure::rejected(&rejection))
            }
            Err(failure) => Transition::BacktestFailed(failure),
        };
        self.finish(ticket, transition)
    }

    /// Run the Monte-Carlo stage on the current backtest, then fetch the analysis once
    /// the simulation succeeds.
    pub async fn run_stress_test(&self) -> Result<Stage, WorkflowError> {
        let simulation = self.simulation;
        let (ticket, request) = self.begin(Transition::StressTestRequested, |state| {
            state.monte_carlo_request(&simulation)
        })?;
        info!(
            "Running {} Monte Carlo simulations of {} days over {} years of {}",
            request.num_simulations,
            request.simulation_length_days,
            request.lookback_years,
            request.backtest_request.symbol
        );

        let outcome = bounded_call(
            StageKind::MonteCarlo,
            self.timeouts.monte_carlo,
            self.service.monte_carlo(&request),
        )
        .await;

        let transition = match outcome {
            Ok(result) => {
                info!(
                    "Monte Carlo finished: {} successful simulations",
                    result
                        .successful_simulations
                        .map(|count| count.to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                );
                Transition::SimulationSucceeded(result)
            }
            Err(failure) => Transition::SimulationFailed(failure),
        };

        let stage = self.finish(ticket, transition)?;
        if stage == Stage::Simulated {
            return self.run_analysis().await;
        }
        Ok(stage)
    }

    async fn run_analysis(&self) -> Result<Stage, WorkflowError> {
        let (ticket, request) =
            self.begin(Transition::AnalysisStarted, WorkflowState::analysis_request)?;
        info!("Requesting analysis for {}", request.strategy.symbol);

        let outcome = bounded_call(
            StageKind::Analysis,
            self.timeouts.analysis,
            self.service.analyze(&request),
        )
        .await;

        let transition = match outcome {
            Ok(response) => {
                let analysis = resolve_analysis(response.analysis.as_ref());
                if analysis.is_none() {
                    warn!("Analysis response carried no analysis");
                }
                Transition::AnalysisSucceeded(analysis)
            }
            Err(failure) => Transition::AnalysisFailed(failure),
        };
        self.finish(ticket, transition)
    }

    /// Leave the Monte-Carlo results and return to the backtest view.
    pub fn navigate_back(&self) -> Result<Stage, WorkflowError> {
        self.lock().state.apply(Transition::NavigateBack)
    }

    pub fn dismiss_error(&self) {
        self.lock().state.dismiss_error();
    }

    /// Discard the session. Calls still in flight finish but their results are dropped.
    pub fn teardown(&self) {
        let mut session = self.lock();
        let previous = session.id;
        *session = Session::new();
        info!("Discarded workflow session {}", previous);
    }
}
