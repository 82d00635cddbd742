//! Two-leg round-trip execution

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::guard::FlightPermit;
use crate::domain::ports::{BalanceProvider, BalanceSnapshot, Swapper};
use crate::shared::errors::{BalanceQueryError, SwapError};
use crate::shared::types::{AssetPair, Strategy, TokenDescriptor, VenueSlot};
use crate::shared::utils::with_timeout;

pub const NO_INTERMEDIATE_BALANCE: &str = "no intermediate balance";

/// How far a failed execution got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Leg 1 did not land; no capital moved.
    Early,
    /// Leg 1 landed but the round trip did not complete. Capital is sitting
    /// in the intermediate asset and needs manual attention.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOutcome {
    pub strategy: Strategy,
    pub amount_in: Decimal,
    pub success: bool,
    pub leg1_tx_id: Option<String>,
    pub leg2_tx_id: Option<String>,
    /// Realised intermediate balance sold in leg 2
    pub intermediate_amount: Option<Decimal>,
    /// Ending minus starting quote balance. Only ever set on success.
    pub net_profit: Option<Decimal>,
    pub error: Option<String>,
    pub failure_kind: Option<FailureKind>,
}

impl TradeOutcome {
    fn early(strategy: Strategy, amount_in: Decimal, error: String) -> Self {
        Self {
            strategy,
            amount_in,
            success: false,
            leg1_tx_id: None,
            leg2_tx_id: None,
            intermediate_amount: None,
            net_profit: None,
            error: Some(error),
            failure_kind: Some(FailureKind::Early),
        }
    }

    fn partial(
        strategy: Strategy,
        amount_in: Decimal,
        leg1_tx_id: String,
        intermediate_amount: Option<Decimal>,
        error: String,
    ) -> Self {
        Self {
            strategy,
            amount_in,
            success: false,
            leg1_tx_id: Some(leg1_tx_id),
            leg2_tx_id: None,
            intermediate_amount,
            net_profit: None,
            error: Some(error),
            failure_kind: Some(FailureKind::Partial),
        }
    }
}

/// Runs the two swaps of a strategy in order.
///
/// Leg 2 spends the intermediate balance actually observed on chain after
/// leg 1, never the quoted estimate.
pub struct ExecutionCoordinator {
    swapper: Arc<dyn Swapper>,
    balance_provider: Arc<dyn BalanceProvider>,
    pair: AssetPair,
    swap_timeout: Duration,
    balance_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(
        swapper: Arc<dyn Swapper>,
        balance_provider: Arc<dyn BalanceProvider>,
        pair: AssetPair,
        swap_timeout: Duration,
        balance_timeout: Duration,
    ) -> Self {
        Self {
            swapper,
            balance_provider,
            pair,
            swap_timeout,
            balance_timeout,
        }
    }

    /// Execute `strategy` with `amount_in` of the quote asset.
    ///
    /// Holding a [`FlightPermit`] is the caller's proof that no other
    /// execution is in flight.
    pub async fn execute(&self, _permit: &FlightPermit, strategy: Strategy, amount_in: Decimal) -> TradeOutcome {
        info!("🚨 Executing strategy {} with {} {}", strategy, amount_in, self.pair.quote.symbol);

        let start_quote = match self.snapshot().await {
            Ok(snapshot) => Some(snapshot.quote_amount),
            Err(e) => {
                warn!("⚠️ Starting balance unavailable, profit will not be measured: {}", e);
                None
            }
        };

        let leg1_tx = match self.swap(strategy.entry(), &self.pair.quote, amount_in).await {
            Ok(tx) => tx,
            Err(e) => {
                warn!("❌ Leg 1 of strategy {} failed, nothing exposed: {}", strategy, e);
                return TradeOutcome::early(strategy, amount_in, e.to_string());
            }
        };
        info!("✅ Leg 1 landed: {}", leg1_tx);

        let intermediate = match self.snapshot().await {
            Ok(snapshot) if snapshot.base_amount > Decimal::ZERO => snapshot.base_amount,
            Ok(_) => {
                error!(
                    "🛑 Leg 1 {} landed but {} balance is zero; manual intervention required",
                    leg1_tx, self.pair.base.symbol
                );
                return TradeOutcome::partial(strategy, amount_in, leg1_tx, None, NO_INTERMEDIATE_BALANCE.to_string());
            }
            Err(e) => {
                error!(
                    "🛑 Leg 1 {} landed but {} balance is unreadable ({}); manual intervention required",
                    leg1_tx, self.pair.base.symbol, e
                );
                return TradeOutcome::partial(strategy, amount_in, leg1_tx, None, NO_INTERMEDIATE_BALANCE.to_string());
            }
        };
        info!("Acquired {} {}, selling on exit venue", intermediate, self.pair.base.symbol);

        let leg2_tx = match self.swap(strategy.exit(), &self.pair.base, intermediate).await {
            Ok(tx) => tx,
            Err(e) => {
                error!(
                    "🛑 Leg 2 of strategy {} failed with {} {} stuck: {}",
                    strategy, intermediate, self.pair.base.symbol, e
                );
                return TradeOutcome::partial(strategy, amount_in, leg1_tx, Some(intermediate), e.to_string());
            }
        };
        info!("✅ Leg 2 landed: {}", leg2_tx);

        let net_profit = match (start_quote, self.snapshot().await) {
            (Some(start), Ok(end)) => Some(end.quote_amount - start),
            (_, Err(e)) => {
                warn!("⚠️ Ending balance unavailable: {}", e);
                None
            }
            (None, Ok(_)) => None,
        };
        if let Some(profit) = net_profit {
            info!("💰 Round trip complete, realised {} {}", profit, self.pair.quote.symbol);
        }

        TradeOutcome {
            strategy,
            amount_in,
            success: true,
            leg1_tx_id: Some(leg1_tx),
            leg2_tx_id: Some(leg2_tx),
            intermediate_amount: Some(intermediate),
            net_profit,
            error: None,
            failure_kind: None,
        }
    }

    async fn swap(&self, venue: VenueSlot, input: &TokenDescriptor, amount_in: Decimal) -> Result<String, SwapError> {
        let label = format!("{:?} venue", venue);
        with_timeout(
            self.swap_timeout,
            move || SwapError::Timeout(label),
            self.swapper.swap(venue, input, amount_in),
        )
        .await
    }

    async fn snapshot(&self) -> Result<BalanceSnapshot, BalanceQueryError> {
        with_timeout(
            self.balance_timeout,
            || BalanceQueryError::Timeout,
            self.balance_provider.balances(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::SingleFlightGuard;
    use crate::domain::testing::{asset_pair, snapshot, RecordingSwapper, ScriptedBalances};
    use rust_decimal_macros::dec;

    fn coordinator(swapper: Arc<RecordingSwapper>, balances: Arc<ScriptedBalances>) -> ExecutionCoordinator {
        ExecutionCoordinator::new(
            swapper,
            balances,
            asset_pair(),
            Duration::from_secs(90),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_full_round_trip_measures_balance_delta() {
        let swapper = Arc::new(RecordingSwapper::new(vec![Ok("leg1".into()), Ok("leg2".into())]));
        let balances = Arc::new(ScriptedBalances::new(vec![
            Ok(snapshot(dec!(500), dec!(0))),
            Ok(snapshot(dec!(400), dec!(97.5))),
            Ok(snapshot(dec!(503.25), dec!(0))),
        ]));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper.clone(), balances).execute(&permit, Strategy::A, dec!(100)).await;

        assert!(outcome.success);
        assert_eq!(outcome.leg1_tx_id.as_deref(), Some("leg1"));
        assert_eq!(outcome.leg2_tx_id.as_deref(), Some("leg2"));
        // Realised delta, not whatever the quotes promised.
        assert_eq!(outcome.net_profit, Some(dec!(3.25)));

        let calls = swapper.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].venue, VenueSlot::First);
        assert_eq!(calls[0].input_symbol, "USDC");
        assert_eq!(calls[0].amount_in, dec!(100));
        assert_eq!(calls[1].venue, VenueSlot::Second);
        assert_eq!(calls[1].input_symbol, "SKR");
        assert_eq!(calls[1].amount_in, dec!(97.5));
    }

    #[tokio::test]
    async fn test_leg1_failure_is_early() {
        let swapper = Arc::new(RecordingSwapper::new(vec![Err(SwapError::Failed {
            venue: "Orca".into(),
            reason: "slippage".into(),
        })]));
        let balances = Arc::new(ScriptedBalances::constant(snapshot(dec!(500), dec!(0))));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper.clone(), balances).execute(&permit, Strategy::B, dec!(100)).await;

        assert!(!outcome.success);
        assert_eq!(outcome.failure_kind, Some(FailureKind::Early));
        assert_eq!(outcome.leg1_tx_id, None);
        assert_eq!(outcome.net_profit, None);
        assert_eq!(swapper.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_intermediate_balance_never_attempts_leg2() {
        let swapper = Arc::new(RecordingSwapper::new(vec![Ok("leg1abc".into()), Ok("unused".into())]));
        let balances = Arc::new(ScriptedBalances::new(vec![
            Ok(snapshot(dec!(500), dec!(0))),
            Ok(snapshot(dec!(400), dec!(0))),
        ]));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper.clone(), balances).execute(&permit, Strategy::A, dec!(100)).await;

        assert!(!outcome.success);
        assert_eq!(outcome.leg1_tx_id.as_deref(), Some("leg1abc"));
        assert_eq!(outcome.leg2_tx_id, None);
        assert_eq!(outcome.error.as_deref(), Some(NO_INTERMEDIATE_BALANCE));
        assert_eq!(outcome.failure_kind, Some(FailureKind::Partial));
        assert_eq!(swapper.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_intermediate_balance_is_partial() {
        let swapper = Arc::new(RecordingSwapper::new(vec![Ok("leg1".into())]));
        let balances = Arc::new(ScriptedBalances::new(vec![
            Ok(snapshot(dec!(500), dec!(0))),
            Err(BalanceQueryError::Rpc("node lagging".into())),
            Err(BalanceQueryError::Rpc("node lagging".into())),
        ]));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper.clone(), balances).execute(&permit, Strategy::A, dec!(100)).await;

        assert_eq!(outcome.failure_kind, Some(FailureKind::Partial));
        assert_eq!(outcome.error.as_deref(), Some(NO_INTERMEDIATE_BALANCE));
        assert_eq!(swapper.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_leg2_failure_is_partial() {
        let swapper = Arc::new(RecordingSwapper::new(vec![
            Ok("leg1".into()),
            Err(SwapError::Failed {
                venue: "Raydium".into(),
                reason: "blockhash expired".into(),
            }),
        ]));
        let balances = Arc::new(ScriptedBalances::new(vec![
            Ok(snapshot(dec!(500), dec!(0))),
            Ok(snapshot(dec!(400), dec!(42))),
        ]));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper.clone(), balances).execute(&permit, Strategy::B, dec!(100)).await;

        assert!(!outcome.success);
        assert_eq!(outcome.failure_kind, Some(FailureKind::Partial));
        assert_eq!(outcome.leg1_tx_id.as_deref(), Some("leg1"));
        assert_eq!(outcome.intermediate_amount, Some(dec!(42)));
        assert_eq!(outcome.net_profit, None);
        assert!(outcome.error.unwrap().contains("blockhash expired"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_timeout_counts_as_failure() {
        let swapper = Arc::new(RecordingSwapper::new(vec![Ok("late".into())]).with_delay(Duration::from_secs(600)));
        let balances = Arc::new(ScriptedBalances::constant(snapshot(dec!(500), dec!(0))));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper, balances).execute(&permit, Strategy::A, dec!(100)).await;

        assert_eq!(outcome.failure_kind, Some(FailureKind::Early));
        assert!(outcome.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_start_balance_leaves_profit_unmeasured() {
        let swapper = Arc::new(RecordingSwapper::new(vec![Ok("leg1".into()), Ok("leg2".into())]));
        let balances = Arc::new(ScriptedBalances::new(vec![
            Err(BalanceQueryError::Timeout),
            Ok(snapshot(dec!(400), dec!(10))),
            Ok(snapshot(dec!(510), dec!(0))),
        ]));
        let guard = SingleFlightGuard::new();
        let permit = guard.try_acquire().unwrap();

        let outcome = coordinator(swapper, balances).execute(&permit, Strategy::A, dec!(100)).await;

        assert!(outcome.success);
        assert_eq!(outcome.net_profit, None);
    }
}
