//! Arbitrage engine - one evaluation cycle, execution and bookkeeping

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::report::{ReportContext, ReportSnapshot};
use super::scheduler::TriggerSink;
use crate::domain::arbitrage::{EvaluationResult, Evaluator};
use crate::domain::execution::{ExecutionCoordinator, SingleFlightGuard, TradeOutcome};
use crate::domain::ledger::{Ledger, TradeRecord};
use crate::domain::ports::BalanceSnapshot;
use crate::shared::config::Config;
use crate::shared::errors::ConfigError;
use crate::shared::types::{AssetPair, Strategy, VenuePair, VenueSlot, VenueValues};

/// Engine knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub amount_in: Decimal,
    pub min_profit_percent: Decimal,
    pub simulate_only: bool,
    pub display_enabled: bool,
    pub recent_trades: usize,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            amount_in: config.amount_in()?,
            min_profit_percent: config.min_profit_percent()?,
            simulate_only: config.trade.simulate_only,
            display_enabled: config.display.enabled,
            recent_trades: config.display.recent_trades,
        })
    }
}

/// Holdings captured on the first successful balance read of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionBaseline {
    pub balances: BalanceSnapshot,
    pub total_value: Decimal,
    pub captured_at: DateTime<Utc>,
}

/// Cross-trigger state. Written only while holding the flight permit.
#[derive(Debug, Default)]
pub struct EngineState {
    pub last_result: Option<EvaluationResult>,
    pub baseline: Option<SessionBaseline>,
    pub start_prices: VenueValues<Option<Decimal>>,
    pub ledger: Ledger,
    pub cycles: u64,
}

/// What a single trigger ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Another cycle held the guard; the trigger was dropped.
    Skipped,
    NoDecision,
    Simulated(Strategy),
    Executed(TradeOutcome),
}

pub struct ArbitrageEngine {
    evaluator: Evaluator,
    coordinator: ExecutionCoordinator,
    guard: SingleFlightGuard,
    pair: AssetPair,
    venues: VenuePair,
    settings: EngineSettings,
    state: RwLock<EngineState>,
    dropped_triggers: AtomicU64,
}

impl ArbitrageEngine {
    pub fn new(
        evaluator: Evaluator,
        coordinator: ExecutionCoordinator,
        pair: AssetPair,
        venues: VenuePair,
        settings: EngineSettings,
        ledger: Ledger,
    ) -> Self {
        Self {
            evaluator,
            coordinator,
            guard: SingleFlightGuard::new(),
            pair,
            venues,
            settings,
            state: RwLock::new(EngineState {
                ledger,
                ..EngineState::default()
            }),
            dropped_triggers: AtomicU64::new(0),
        }
    }

    /// True while a cycle (and possibly an execution) is in flight.
    pub fn is_executing(&self) -> bool {
        self.guard.is_held()
    }

    pub fn dropped_triggers(&self) -> u64 {
        self.dropped_triggers.load(Ordering::Relaxed)
    }

    /// Evaluate once and, when the best strategy clears the threshold,
    /// execute it. Triggers arriving while a cycle runs are dropped.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let permit = match self.guard.try_acquire() {
            Some(permit) => permit,
            None => {
                self.dropped_triggers.fetch_add(1, Ordering::Relaxed);
                debug!("Cycle in flight, trigger dropped");
                return CycleOutcome::Skipped;
            }
        };

        let amount_in = self.settings.amount_in;
        let result = self.evaluator.evaluate(amount_in).await;
        let decision = result.decision();
        self.remember(result).await;

        let strategy = match decision {
            Some(strategy) => strategy,
            None => return CycleOutcome::NoDecision,
        };

        if self.settings.simulate_only {
            info!("🧪 Simulate-only: would execute {}", strategy.describe(&self.venues));
            return CycleOutcome::Simulated(strategy);
        }

        let outcome = self.coordinator.execute(&permit, strategy, amount_in).await;
        let records = TradeRecord::from_outcome(&outcome, &self.venues);
        {
            let mut state = self.state.write().await;
            for record in records {
                state.ledger.append(record);
            }
        }
        if outcome.failure_kind.is_some() {
            warn!(
                "Strategy {} failed: {}",
                strategy,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }

        CycleOutcome::Executed(outcome)
    }

    /// Store the latest result and capture session baselines on first sight.
    async fn remember(&self, result: EvaluationResult) {
        let mut state = self.state.write().await;
        state.cycles += 1;

        for slot in VenueSlot::ALL {
            let start = state.start_prices.get_mut(slot);
            if start.is_none() {
                *start = *result.pair_prices.get(slot);
            }
        }

        if state.baseline.is_none() {
            if let Some(balances) = result.balances.clone() {
                let base_price = result.pair_prices.first.or(result.pair_prices.second);
                let total_value = balances.total_value(base_price);
                info!(
                    "📌 Session baseline: {} {} / {} {} / {} SOL",
                    balances.quote_amount,
                    self.pair.quote.symbol,
                    balances.base_amount,
                    self.pair.base.symbol,
                    balances.native_amount
                );
                state.baseline = Some(SessionBaseline {
                    balances,
                    total_value,
                    captured_at: Utc::now(),
                });
            }
        }

        state.last_result = Some(result);
    }

    pub async fn report(&self) -> Option<ReportSnapshot> {
        let state = self.state.read().await;
        let context = ReportContext {
            pair: &self.pair,
            venues: &self.venues,
            settings: &self.settings,
            executing: self.is_executing(),
        };
        ReportSnapshot::build(&state, &context)
    }

    pub async fn recent_trades(&self, n: usize) -> Vec<TradeRecord> {
        self.state.read().await.ledger.recent(n)
    }
}

#[async_trait]
impl TriggerSink for ArbitrageEngine {
    async fn evaluate(&self, source: Option<VenueSlot>) {
        debug!("Evaluation triggered by {:?}", source);
        self.run_cycle().await;
    }

    async fn render(&self) {
        if !self.settings.display_enabled {
            return;
        }
        if let Some(report) = self.report().await {
            print!("\x1B[2J\x1B[1;1H{}", report.render());
        }
    }
}
