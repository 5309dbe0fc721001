//! Deterministic bar-by-bar replay of a strategy over historical data.
//!
//! One run owns its ledger and audit sequence and is strictly sequential.
//! Independent runs can be swept in parallel with [`run_sweep`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::audit::{Actor, AuditEntry, Decision, ReasonCode};
use super::bar::{sanitize_series, validate_series, PriceBar};
use super::error::TradepilotError;
use super::execution::{fill, ExecutionCosts, FillResult};
use super::indicator::{IndicatorKind, RsiStepper, SmaStepper};
use super::indicator_helpers::compute_indicators;
use super::metrics::Metrics;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ClosedTrade, Position, Side};
use super::prediction::PredictionScore;
use super::risk::check_order;
use super::signal::{IndicatorSnapshot, Signal};
use super::signal_policy::{accept_prediction, evaluate, snapshot_at};
use super::strategy::StrategyConfig;
use crate::ports::audit_port::AuditPort;
use crate::ports::prediction_port::PredictionPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub run_id: String,
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    /// Skip malformed or out-of-order bars instead of failing the run.
    pub tolerate_bad_bars: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            run_id: "backtest".to_string(),
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            tolerate_bad_bars: false,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), TradepilotError> {
        if self.run_id.trim().is_empty() {
            return Err(TradepilotError::configuration("run_id", "run_id must not be empty"));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(TradepilotError::configuration(
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        for (field, value) in [
            ("commission_per_trade", self.commission_per_trade),
            ("commission_pct", self.commission_pct),
            ("slippage_pct", self.slippage_pct),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TradepilotError::configuration(
                    field,
                    format!("{field} must be non-negative"),
                ));
            }
        }
        Ok(())
    }

    pub fn costs(&self) -> ExecutionCosts {
        ExecutionCosts {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub strategy: String,
    pub symbol: String,
    pub bars_processed: usize,
    pub position: Position,
    pub cash: f64,
    pub audit: Vec<AuditEntry>,
    pub equity_curve: Vec<EquityPoint>,
    pub closed_trades: Vec<ClosedTrade>,
    pub metrics: Metrics,
}

impl SimulationReport {
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.audit.iter().map(|e| &e.signal)
    }
}

/// Streaming indicator state advanced one close at a time.
struct IndicatorState {
    sma: SmaStepper,
    rsi: RsiStepper,
    prev_close: Option<f64>,
    prev_sma: Option<f64>,
}

impl IndicatorState {
    fn new(strategy: &StrategyConfig) -> Self {
        IndicatorState {
            sma: SmaStepper::new(strategy.sma_window()),
            rsi: RsiStepper::new(strategy.rsi_window()),
            prev_close: None,
            prev_sma: None,
        }
    }

    fn advance(&mut self, close: f64) -> IndicatorSnapshot {
        let sma = self.sma.next(close);
        let rsi = self.rsi.next(close);
        let snapshot = IndicatorSnapshot {
            close,
            prev_close: self.prev_close,
            sma,
            prev_sma: self.prev_sma,
            rsi,
        };
        self.prev_close = Some(close);
        self.prev_sma = sma;
        snapshot
    }
}

fn query_predictor(
    predictor: Option<&dyn PredictionPort>,
    history: &[PriceBar],
    strategy: &StrategyConfig,
) -> Option<PredictionScore> {
    let predictor = predictor?;
    let last = history.last()?;
    accept_prediction(predictor.predict(history, last.timestamp), strategy)
}

struct Applied {
    reason: ReasonCode,
    quantity: i64,
    price: Option<f64>,
}

fn apply_signal(
    portfolio: &mut Portfolio,
    signal: &Signal,
    strategy: &StrategyConfig,
    costs: &ExecutionCosts,
    bar: &PriceBar,
) -> Applied {
    let skipped = |reason| Applied {
        reason,
        quantity: 0,
        price: None,
    };
    let Some(side) = Side::from_action(signal.action) else {
        return skipped(ReasonCode::HoldSignal);
    };
    let quantity = match check_order(&portfolio.position, side, strategy) {
        Ok(q) => q,
        Err(rejection) => {
            debug!(timestamp = %bar.timestamp, %side, %rejection, "order rejected by risk check");
            return skipped(rejection.into());
        }
    };
    match fill(portfolio, side, quantity, bar.close, bar.timestamp, costs) {
        FillResult::Filled {
            quantity, price, ..
        } => Applied {
            reason: ReasonCode::Filled,
            quantity,
            price: Some(price),
        },
        FillResult::InsufficientCapital => skipped(ReasonCode::InsufficientCapital),
    }
}

/// Replay `bars` through the strategy and return the run's report.
///
/// The predictor only ever sees bars up to and including the bar being
/// evaluated. Audit sink failures are logged and do not stop the run.
/// A run id already present in the sink would collide on (run id, sequence).
fn ensure_unused_run_id(sink: &dyn AuditPort, run_id: &str) -> Result<(), TradepilotError> {
    match sink.entries_for_run(run_id) {
        Ok(existing) if !existing.is_empty() => Err(TradepilotError::configuration(
            "run_id",
            format!("run {run_id} already has {} audit entries", existing.len()),
        )),
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(run_id, error = %e, "cannot read audit sink; run id not checked");
            Ok(())
        }
    }
}

pub fn run_simulation(
    bars: &[PriceBar],
    strategy: &StrategyConfig,
    config: &SimulationConfig,
    predictor: Option<&dyn PredictionPort>,
    audit_sink: Option<&dyn AuditPort>,
) -> Result<SimulationReport, TradepilotError> {
    config.validate()?;
    let bars = sanitize_series(bars, config.tolerate_bad_bars)?;
    if let Some(sink) = audit_sink {
        ensure_unused_run_id(sink, &config.run_id)?;
    }

    if let Some(p) = predictor {
        if p.range() != strategy.prediction_range() {
            warn!(
                predictor = p.name(),
                "predictor range differs from strategy prediction_range; scores are checked against the strategy's"
            );
        }
    }

    info!(
        run_id = %config.run_id,
        strategy = strategy.name(),
        symbol = strategy.symbol(),
        bars = bars.len(),
        "starting simulation"
    );

    let costs = config.costs();
    let mut portfolio = Portfolio::new(strategy.symbol(), config.initial_capital);
    let mut indicators = IndicatorState::new(strategy);
    let mut audit = Vec::with_capacity(bars.len());

    for (index, bar) in bars.iter().enumerate() {
        let snapshot = indicators.advance(bar.close);
        let prediction = query_predictor(predictor, &bars[..=index], strategy);
        let signal = evaluate(bar.timestamp, &snapshot, strategy, prediction.as_ref());

        let applied = apply_signal(&mut portfolio, &signal, strategy, &costs, bar);
        let equity = portfolio.total_equity(bar.close);
        portfolio.record_equity(bar.timestamp, equity);

        let entry = AuditEntry {
            run_id: config.run_id.clone(),
            sequence: index as u64,
            timestamp: bar.timestamp,
            symbol: strategy.symbol().to_string(),
            signal,
            decision: Decision::Simulated,
            reason: applied.reason,
            actor: Actor::Automated,
            quantity: applied.quantity,
            price: applied.price,
            order_id: None,
            session_id: None,
            detail: None,
        };
        if let Some(sink) = audit_sink {
            if let Err(e) = sink.append(&entry) {
                warn!(run_id = %config.run_id, sequence = entry.sequence, error = %e, "audit append failed");
            }
        }
        audit.push(entry);
    }

    let metrics = Metrics::compute(&portfolio);
    info!(
        run_id = %config.run_id,
        fills = metrics.trade_count,
        closed_trades = metrics.closed_trades,
        total_return = metrics.total_return,
        "simulation finished"
    );

    Ok(SimulationReport {
        run_id: config.run_id.clone(),
        strategy: strategy.name().to_string(),
        symbol: strategy.symbol().to_string(),
        bars_processed: bars.len(),
        position: portfolio.position,
        cash: portfolio.cash,
        audit,
        equity_curve: portfolio.equity_curve,
        closed_trades: portfolio.closed_trades,
        metrics,
    })
}

/// Run each strategy independently over the same bars, in parallel.
///
/// Run ids are suffixed with the strategy's index; results keep input order.
pub fn run_sweep(
    bars: &[PriceBar],
    strategies: &[StrategyConfig],
    config: &SimulationConfig,
    predictor: Option<&dyn PredictionPort>,
) -> Vec<Result<SimulationReport, TradepilotError>> {
    strategies
        .par_iter()
        .enumerate()
        .map(|(i, strategy)| {
            let run_config = SimulationConfig {
                run_id: format!("{}-{}", config.run_id, i),
                ..config.clone()
            };
            run_simulation(bars, strategy, &run_config, predictor, None)
        })
        .collect()
}

/// Signals for every bar, computed from batch indicator series.
///
/// Produces the same signals a simulation run would, without a ledger.
pub fn generate_signals(
    bars: &[PriceBar],
    strategy: &StrategyConfig,
    predictor: Option<&dyn PredictionPort>,
) -> Result<Vec<Signal>, TradepilotError> {
    validate_series(bars)?;
    let sma_kind = IndicatorKind::Sma(strategy.sma_window());
    let rsi_kind = IndicatorKind::Rsi(strategy.rsi_window());
    let series = compute_indicators(bars, &[sma_kind, rsi_kind]);
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    Ok((0..bars.len())
        .map(|index| {
            let snapshot = snapshot_at(&closes, series.get(&sma_kind), series.get(&rsi_kind), index);
            let prediction = query_predictor(predictor, &bars[..=index], strategy);
            evaluate(bars[index].timestamp, &snapshot, strategy, prediction.as_ref())
        })
        .collect())
}

/// The recommendation for the most recent bar, or `None` for an empty series.
pub fn recommend_latest(
    bars: &[PriceBar],
    strategy: &StrategyConfig,
    predictor: Option<&dyn PredictionPort>,
) -> Result<Option<Signal>, TradepilotError> {
    validate_series(bars)?;
    let Some(last) = bars.len().checked_sub(1) else {
        return Ok(None);
    };
    let sma_kind = IndicatorKind::Sma(strategy.sma_window());
    let rsi_kind = IndicatorKind::Rsi(strategy.rsi_window());
    let series = compute_indicators(bars, &[sma_kind, rsi_kind]);
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let snapshot = snapshot_at(&closes, series.get(&sma_kind), series.get(&rsi_kind), last);
    let prediction = query_predictor(predictor, bars, strategy);
    Ok(Some(evaluate(bars[last].timestamp, &snapshot, strategy, prediction.as_ref())))
}
