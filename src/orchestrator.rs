use parking_lot::RwLock;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::aggregator::ContextAggregator;
use crate::clock::{SystemTimeProvider, TimeProvider};
use crate::command::{Command, CommandError, CommandValidator};
use crate::decision::DecisionClient;
use crate::engine::{CycleState, CycleStateMachine, StateError};
use crate::exchange::KrakenFuturesClient;
use crate::history::{History, HistoryEntry, Outcome};
use crate::metrics;
use crate::prompt::build_prompt;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Account data was unavailable; nothing was decided or recorded.
    Aborted { reason: String },
    Recorded(HistoryEntry),
}

/// usage:
/// let mut orchestrator = CycleOrchestrator::new(client, decision, "PF_XBTUSD", interval);
/// orchestrator.run_until(shutdown).await;
pub struct CycleOrchestrator {
    client: Arc<KrakenFuturesClient>,
    aggregator: ContextAggregator,
    decision: Arc<dyn DecisionClient>,
    clock: Arc<dyn TimeProvider>,
    symbol: String,
    interval: Duration,
    history: Arc<RwLock<History>>,
    state: CycleState,
    cycle: u64,
}

impl CycleOrchestrator {
    pub fn new(
        client: Arc<KrakenFuturesClient>,
        decision: Arc<dyn DecisionClient>,
        symbol: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator: ContextAggregator::new(client.clone()),
            client,
            decision,
            clock: Arc::new(SystemTimeProvider),
            symbol: symbol.into(),
            interval,
            history: Arc::new(RwLock::new(History::new())),
            state: CycleState::Idle,
            cycle: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Shared handle for readers; only the orchestrator appends.
    pub fn history(&self) -> Arc<RwLock<History>> {
        self.history.clone()
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    fn advance(&mut self, next: CycleState) -> Result<(), StateError> {
        self.state = CycleStateMachine::transition(self.state, next)?;
        Ok(())
    }

    /// Run one aggregate -> decide -> validate -> execute -> record pass.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, StateError> {
        let started = Instant::now();
        let result = self.drive_cycle().await;
        if result.is_err() {
            self.state = CycleState::Idle;
        }
        metrics::observe_cycle_duration(started.elapsed().as_secs_f64());
        result
    }

    async fn drive_cycle(&mut self) -> Result<CycleOutcome, StateError> {
        self.cycle += 1;
        metrics::inc_cycles_started();
        let cycle = self.cycle;

        self.advance(CycleState::Aggregating)?;
        let context = match self.aggregator.aggregate(&self.symbol).await {
            Ok(context) => context,
            Err(e) => {
                warn!(cycle, error = %e, "cycle aborted: account data unavailable");
                metrics::inc_cycles_aborted();
                self.advance(CycleState::Idle)?;
                return Ok(CycleOutcome::Aborted { reason: e.to_string() });
            }
        };

        self.advance(CycleState::AwaitingDecision)?;
        let prompt = build_prompt(&context, &self.history.read());
        let proposal = self.decision.propose(&prompt).await;

        let (command, outcome) = match proposal {
            Err(e) => {
                warn!(cycle, error = %e, "no usable decision response");
                self.advance(CycleState::Recording)?;
                (Value::Null, Outcome::ParseError { error: e.to_string() })
            }
            Ok(raw) => {
                self.advance(CycleState::Validating)?;
                match CommandValidator::validate(&raw) {
                    Ok(command) => {
                        self.advance(CycleState::Executing)?;
                        let outcome = self.execute(cycle, &command).await;
                        self.advance(CycleState::Recording)?;
                        let recorded = serde_json::to_value(&command).unwrap_or(Value::Null);
                        (recorded, outcome)
                    }
                    Err(CommandError::UnknownFunction { function, decision }) => {
                        warn!(cycle, function = %function, "decision outside command grammar");
                        self.advance(CycleState::Recording)?;
                        let error = format!("unknown function '{}'", function);
                        (decision, Outcome::ExecutionError { error })
                    }
                    Err(e) => {
                        warn!(cycle, error = %e, "decision response rejected");
                        self.advance(CycleState::Recording)?;
                        (Value::String(raw), Outcome::ParseError { error: e.to_string() })
                    }
                }
            }
        };

        match &outcome {
            Outcome::ParseError { .. } => metrics::inc_parse_errors(),
            Outcome::ExecutionError { .. } => metrics::inc_execution_errors(),
            Outcome::Success { .. } => {}
        }

        let entry = HistoryEntry {
            cycle,
            recorded_at: self.clock.now(),
            command,
            outcome,
        };
        self.history.write().append(entry.clone());
        self.advance(CycleState::Idle)?;

        Ok(CycleOutcome::Recorded(entry))
    }

    async fn execute(&self, cycle: u64, command: &Command) -> Outcome {
        info!(cycle, function = command.function(), "executing command");
        let result = match command {
            Command::PlaceOrder(order) => self.client.send_order(order).await,
            Command::ModifyOrder(edit) => self.client.edit_order(edit).await,
            Command::CancelOrder(cancel) => self.client.cancel_order(cancel).await,
            Command::CancelAllForSymbol { symbol } => self.client.cancel_all_orders(Some(symbol)).await,
            Command::NoAction { reason } => Ok(json!({ "status": "success", "reason": reason })),
        };

        match result {
            Ok(result) => {
                if result.get("result").and_then(Value::as_str) == Some("error") {
                    warn!(cycle, venue_error = %result["error"], "venue rejected command");
                }
                metrics::inc_commands_executed(command.function());
                Outcome::Success { result }
            }
            Err(e) => {
                error!(cycle, error = %e, "command execution failed");
                Outcome::ExecutionError { error: e.to_string() }
            }
        }
    }

    /// Run cycles back to back with `interval` between the end of one and the
    /// start of the next, until `shutdown` resolves. A cycle in progress is
    /// always finished. Returns the number of cycles run.
    pub async fn run_until<F>(&mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut completed = 0;
        info!(symbol = %self.symbol, interval_secs = self.interval.as_secs(), "decision loop started");

        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Recorded(entry)) => {
                    info!(cycle = entry.cycle, success = entry.outcome.is_success(), "cycle recorded");
                }
                Ok(CycleOutcome::Aborted { reason }) => {
                    info!(cycle = self.cycle, reason = %reason, "cycle skipped");
                }
                Err(e) => error!(cycle = self.cycle, error = %e, "cycle state machine violated"),
            }
            completed += 1;

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(cycles = completed, "decision loop stopping");
                    break;
                }
                _ = sleep(self.interval) => {}
            }
        }

        completed
    }
}
