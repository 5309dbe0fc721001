//! Live execution path: turns an accepted signal into an order request.
//!
//! Every call to [`ExecutionGateway::execute`] writes exactly one audit entry.
//! An execution or audit failure halts the session until
//! [`ExecutionGateway::acknowledge_halt`] is called; nothing is retried.
//!
//! An order that times out is kept pending. If the broker fills it later,
//! [`ExecutionGateway::reconcile_late_fills`] records the fill with reason
//! `late-fill`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use super::audit::{unique_run_id, Actor, AuditEntry, Decision, ReasonCode};
use super::error::TradepilotError;
use super::position::{Position, Side};
use super::risk::{check_order, RiskRejection};
use super::signal::Signal;
use super::strategy::StrategyConfig;
use crate::ports::audit_port::AuditPort;
use crate::ports::entitlement_port::EntitlementPort;
use crate::ports::order_port::{OrderPort, OrderResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Executed {
        order_id: Option<String>,
        quantity: i64,
        fill_price: Option<f64>,
    },
    SkippedAsHold,
    SkippedSessionHalted,
    RejectedByEntitlement,
    RejectedByRiskLimit(RiskRejection),
    ExecutionError { reason: String },
}

impl ExecutionOutcome {
    fn decision(&self) -> Decision {
        match self {
            ExecutionOutcome::Executed { .. } => Decision::Executed,
            _ => Decision::Skipped,
        }
    }

    fn reason(&self) -> ReasonCode {
        match self {
            ExecutionOutcome::Executed { .. } => ReasonCode::Filled,
            ExecutionOutcome::SkippedAsHold => ReasonCode::HoldSignal,
            ExecutionOutcome::SkippedSessionHalted => ReasonCode::SessionHalted,
            ExecutionOutcome::RejectedByEntitlement => ReasonCode::NotEntitled,
            ExecutionOutcome::RejectedByRiskLimit(r) => (*r).into(),
            ExecutionOutcome::ExecutionError { .. } => ReasonCode::ExecutionError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub run_id: String,
    pub order_timeout: Duration,
}

impl Default for GatewayConfig {
    /// A fresh `live-<timestamp>-<n>` run id per config.
    fn default() -> Self {
        GatewayConfig {
            run_id: unique_run_id("live"),
            order_timeout: Duration::from_secs(10),
        }
    }
}

type OrderReply = Result<OrderResult, TradepilotError>;

enum Placement {
    Replied(Result<OrderResult, String>),
    TimedOut(Receiver<OrderReply>),
}

/// An order whose worker did not answer within the timeout.
struct PendingOrder {
    reply: Receiver<OrderReply>,
    signal: Signal,
    symbol: String,
    session_id: String,
    requested: i64,
}

pub struct ExecutionGateway {
    config: GatewayConfig,
    entitlement: Arc<dyn EntitlementPort>,
    orders: Arc<dyn OrderPort>,
    audit: Arc<dyn AuditPort>,
    halted: bool,
    next_sequence: u64,
    pending: Vec<PendingOrder>,
}

impl ExecutionGateway {
    /// Create a gateway writing under `config.run_id`.
    ///
    /// The sequence continues after any entries the sink already holds for
    /// that run id, so a restarted session never reuses a (run id, sequence)
    /// key.
    pub fn new(
        config: GatewayConfig,
        entitlement: Arc<dyn EntitlementPort>,
        orders: Arc<dyn OrderPort>,
        audit: Arc<dyn AuditPort>,
    ) -> Result<Self, TradepilotError> {
        let next_sequence = next_free_sequence(audit.as_ref(), &config.run_id)?;
        if next_sequence > 0 {
            info!(run_id = %config.run_id, next_sequence, "continuing existing audit run");
        }
        Ok(ExecutionGateway {
            config,
            entitlement,
            orders,
            audit,
            halted: false,
            next_sequence,
            pending: Vec::new(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.config.run_id
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Orders that timed out and have not been resolved by the broker yet.
    pub fn pending_orders(&self) -> usize {
        self.pending.len()
    }

    /// Clear a halt after an operator has looked at the failure.
    ///
    /// Late fills that have arrived are recorded first. Fails, and stays
    /// halted, if one of them cannot be written.
    pub fn acknowledge_halt(&mut self) -> Result<(), TradepilotError> {
        self.reconcile_late_fills()?;
        if !self.pending.is_empty() {
            warn!(
                run_id = %self.config.run_id,
                pending = self.pending.len(),
                "halt acknowledged with timed-out orders still unresolved"
            );
        }
        if self.halted {
            info!(run_id = %self.config.run_id, "session halt acknowledged");
        }
        self.halted = false;
        Ok(())
    }

    /// Decide and, if allowed, place an order for `signal`.
    ///
    /// Returns `Err(AuditWrite)` when the audit sink cannot record the
    /// decision; in that case no order is placed after the failure.
    pub fn execute(
        &mut self,
        signal: &Signal,
        position: &Position,
        strategy: &StrategyConfig,
        session: &Session,
    ) -> Result<ExecutionOutcome, TradepilotError> {
        self.reconcile_late_fills()?;
        let (outcome, quantity) = match self.decide(signal, position, strategy, session) {
            Ok(decided) => decided,
            Err(e) => {
                self.halt("audit sink not ready");
                return Err(e);
            }
        };
        self.record(signal, strategy, session, &outcome, quantity)?;
        Ok(outcome)
    }

    /// Record every timed-out order the broker has since filled.
    ///
    /// Returns how many late fills were written. Orders still in flight stay
    /// pending; orders the broker refused are dropped.
    pub fn reconcile_late_fills(&mut self) -> Result<usize, TradepilotError> {
        let mut queue: VecDeque<PendingOrder> = std::mem::take(&mut self.pending).into();
        let mut waiting = Vec::new();
        let mut recorded = 0;

        while let Some(order) = queue.pop_front() {
            match order.reply.try_recv() {
                Err(TryRecvError::Empty) => waiting.push(order),
                Err(TryRecvError::Disconnected) => {
                    warn!(symbol = %order.symbol, "timed-out order worker exited without a result");
                }
                Ok(Err(e)) => {
                    info!(symbol = %order.symbol, error = %e, "timed-out order failed at the broker");
                }
                Ok(Ok(result)) if !result.success => {
                    info!(symbol = %order.symbol, "timed-out order was not filled");
                }
                Ok(Ok(result)) => {
                    error!(
                        run_id = %self.config.run_id,
                        symbol = %order.symbol,
                        order_id = ?result.order_id,
                        quantity = result.filled_quantity,
                        "order filled after timeout"
                    );
                    if let Err(e) = self.record_late_fill(&order, &result) {
                        waiting.push(order);
                        waiting.extend(queue);
                        self.pending = waiting;
                        return Err(e);
                    }
                    recorded += 1;
                }
            }
        }
        self.pending = waiting;
        Ok(recorded)
    }

    fn decide(
        &mut self,
        signal: &Signal,
        position: &Position,
        strategy: &StrategyConfig,
        session: &Session,
    ) -> Result<(ExecutionOutcome, i64), TradepilotError> {
        let Some(side) = Side::from_action(signal.action) else {
            return Ok((ExecutionOutcome::SkippedAsHold, 0));
        };
        if self.halted {
            return Ok((ExecutionOutcome::SkippedSessionHalted, 0));
        }
        if !self.entitlement.is_automated_execution_allowed(session) {
            warn!(session = %session.id, user = %session.user, "automated execution not entitled");
            return Ok((ExecutionOutcome::RejectedByEntitlement, 0));
        }
        let quantity = match check_order(position, side, strategy) {
            Ok(q) => q,
            Err(rejection) => return Ok((ExecutionOutcome::RejectedByRiskLimit(rejection), 0)),
        };

        self.prepare_sink()?;

        let outcome = match self.place(strategy.symbol(), side, quantity) {
            Placement::Replied(Ok(result)) if result.success => ExecutionOutcome::Executed {
                order_id: result.order_id,
                quantity: result.filled_quantity,
                fill_price: result.fill_price,
            },
            Placement::Replied(Ok(result)) => ExecutionOutcome::ExecutionError {
                reason: result
                    .message
                    .unwrap_or_else(|| "order rejected by broker".to_string()),
            },
            Placement::Replied(Err(reason)) => ExecutionOutcome::ExecutionError { reason },
            Placement::TimedOut(reply) => {
                self.pending.push(PendingOrder {
                    reply,
                    signal: signal.clone(),
                    symbol: strategy.symbol().to_string(),
                    session_id: session.id.clone(),
                    requested: quantity,
                });
                ExecutionOutcome::ExecutionError {
                    reason: format!(
                        "order timed out after {} ms",
                        self.config.order_timeout.as_millis()
                    ),
                }
            }
        };
        if let ExecutionOutcome::ExecutionError { reason } = &outcome {
            self.halt(reason);
        }
        Ok((outcome, quantity))
    }

    /// The sink must accept writes, and the next sequence must be free,
    /// before an order leaves. Another session sharing the run id may have
    /// written since this one last did.
    fn prepare_sink(&mut self) -> Result<(), TradepilotError> {
        self.audit.ready()?;
        let free = next_free_sequence(self.audit.as_ref(), &self.config.run_id)?;
        if free > self.next_sequence {
            warn!(
                run_id = %self.config.run_id,
                from = self.next_sequence,
                to = free,
                "audit run written by another session; advancing sequence"
            );
            self.next_sequence = free;
        }
        Ok(())
    }

    /// Place the order on a worker thread and wait at most `order_timeout`.
    fn place(&self, symbol: &str, side: Side, quantity: i64) -> Placement {
        let (tx, rx) = mpsc::channel();
        let orders = Arc::clone(&self.orders);
        let symbol = symbol.to_string();
        thread::spawn(move || {
            let _ = tx.send(orders.place_order(&symbol, side, quantity));
        });

        match rx.recv_timeout(self.config.order_timeout) {
            Ok(Ok(result)) => Placement::Replied(Ok(result)),
            Ok(Err(e)) => Placement::Replied(Err(e.to_string())),
            Err(RecvTimeoutError::Timeout) => Placement::TimedOut(rx),
            Err(RecvTimeoutError::Disconnected) => {
                Placement::Replied(Err("order worker exited without a result".to_string()))
            }
        }
    }

    fn record(
        &mut self,
        signal: &Signal,
        strategy: &StrategyConfig,
        session: &Session,
        outcome: &ExecutionOutcome,
        requested: i64,
    ) -> Result<(), TradepilotError> {
        let (quantity, price, order_id, detail) = match outcome {
            ExecutionOutcome::Executed {
                order_id,
                quantity,
                fill_price,
            } => (*quantity, *fill_price, order_id.clone(), None),
            ExecutionOutcome::ExecutionError { reason } => {
                (0, None, None, Some(format!("requested {requested}: {reason}")))
            }
            _ => (0, None, None, None),
        };
        let entry = AuditEntry {
            run_id: self.config.run_id.clone(),
            sequence: self.next_sequence,
            timestamp: Utc::now().naive_utc(),
            symbol: strategy.symbol().to_string(),
            signal: signal.clone(),
            decision: outcome.decision(),
            reason: outcome.reason(),
            actor: Actor::Automated,
            quantity,
            price,
            order_id,
            session_id: Some(session.id.clone()),
            detail,
        };
        self.write(entry)
    }

    fn record_late_fill(
        &mut self,
        order: &PendingOrder,
        result: &OrderResult,
    ) -> Result<(), TradepilotError> {
        let entry = AuditEntry {
            run_id: self.config.run_id.clone(),
            sequence: self.next_sequence,
            timestamp: Utc::now().naive_utc(),
            symbol: order.symbol.clone(),
            signal: order.signal.clone(),
            decision: Decision::Executed,
            reason: ReasonCode::LateFill,
            actor: Actor::Automated,
            quantity: result.filled_quantity,
            price: result.fill_price,
            order_id: result.order_id.clone(),
            session_id: Some(order.session_id.clone()),
            detail: Some(format!("filled after timeout; requested {}", order.requested)),
        };
        self.write(entry)
    }

    fn write(&mut self, entry: AuditEntry) -> Result<(), TradepilotError> {
        self.next_sequence += 1;
        if let Err(e) = self.audit.append(&entry) {
            self.halt("audit append failed");
            return Err(e);
        }
        info!(
            run_id = %entry.run_id,
            sequence = entry.sequence,
            action = %entry.signal.action,
            reason = %entry.reason,
            "decision recorded"
        );
        Ok(())
    }

    fn halt(&mut self, reason: &str) {
        error!(run_id = %self.config.run_id, reason, "halting automated execution");
        self.halted = true;
    }
}

/// One past the highest sequence stored for `run_id`, or 0.
fn next_free_sequence(audit: &dyn AuditPort, run_id: &str) -> Result<u64, TradepilotError> {
    let entries = audit
        .entries_for_run(run_id)
        .map_err(|e| TradepilotError::audit_write(format!("cannot read run {run_id}: {e}")))?;
    Ok(entries.iter().map(|e| e.sequence + 1).max().unwrap_or(0))
}
