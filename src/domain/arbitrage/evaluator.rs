//! Per-cycle evaluation of both round-trip strategies

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::profit_calculator::ProfitCalculator;
use crate::domain::ports::{BalanceProvider, BalanceSnapshot, CostBreakdown, CostEstimator, Quote, Quoter};
use crate::shared::errors::{BalanceQueryError, QuoteError};
use crate::shared::types::{Strategy, StrategyPair, VenueSlot, VenueValues};
use crate::shared::utils::with_timeout;

/// Everything learned in one evaluation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub amount_in: Decimal,
    pub strategy_net_profit: StrategyPair<Option<Decimal>>,
    pub leg_outputs: StrategyPair<Option<Decimal>>,
    /// Effective entry price on each venue, quote per base
    pub pair_prices: VenueValues<Option<Decimal>>,
    pub costs: CostBreakdown,
    pub balances: Option<BalanceSnapshot>,
    pub min_profit_threshold: Decimal,
    pub best: Option<(Strategy, Decimal)>,
    pub break_even_volume: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationResult {
    /// Strategy to execute, if the best net strictly clears the threshold.
    pub fn decision(&self) -> Option<Strategy> {
        let (strategy, net) = self.best?;
        ProfitCalculator::clears_threshold(net, self.min_profit_threshold).then_some(strategy)
    }
}

/// Result of quoting one strategy's two hops.
struct ChainQuote {
    entry_price: Option<Decimal>,
    output: Result<Decimal, QuoteError>,
}

/// Fans quote, cost and balance requests out for one trade amount.
pub struct Evaluator {
    quoters: VenueValues<Arc<dyn Quoter>>,
    cost_estimator: Arc<dyn CostEstimator>,
    balance_provider: Arc<dyn BalanceProvider>,
    calculator: ProfitCalculator,
    quote_timeout: Duration,
    balance_timeout: Duration,
}

impl Evaluator {
    pub fn new(
        quoters: VenueValues<Arc<dyn Quoter>>,
        cost_estimator: Arc<dyn CostEstimator>,
        balance_provider: Arc<dyn BalanceProvider>,
        calculator: ProfitCalculator,
        quote_timeout: Duration,
        balance_timeout: Duration,
    ) -> Self {
        Self {
            quoters,
            cost_estimator,
            balance_provider,
            calculator,
            quote_timeout,
            balance_timeout,
        }
    }

    /// Quote both strategies in parallel and price them.
    ///
    /// Never fails: a strategy whose quotes cannot be obtained is `None` for
    /// this cycle, and a cycle where both are `None` simply has no decision.
    pub async fn evaluate(&self, amount_in: Decimal) -> EvaluationResult {
        let (chain_a, chain_b, costs, balances) = tokio::join!(
            self.quote_chain(Strategy::A, amount_in),
            self.quote_chain(Strategy::B, amount_in),
            self.cost_estimator.cost_breakdown(amount_in),
            self.fetch_balances(),
        );

        let mut pair_prices = VenueValues::new(None, None);
        *pair_prices.get_mut(Strategy::A.entry()) = chain_a.entry_price;
        *pair_prices.get_mut(Strategy::B.entry()) = chain_b.entry_price;

        let leg_outputs = StrategyPair::new(
            self.settle_chain(Strategy::A, chain_a.output),
            self.settle_chain(Strategy::B, chain_b.output),
        );
        let net = |output: Option<Decimal>| {
            output.map(|out| self.calculator.net_profit(out, amount_in, costs.total_cost))
        };
        let strategy_net_profit = StrategyPair::new(net(leg_outputs.a), net(leg_outputs.b));

        let best = self.calculator.select_best(&strategy_net_profit);
        if best.is_none() {
            info!("No quotes for either strategy this cycle, no decision");
        }
        let break_even_volume =
            self.calculator
                .break_even_volume(&leg_outputs, amount_in, costs.total_cost);

        let balances = match balances {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("⚠️ Balance query failed: {}", e);
                None
            }
        };

        debug!(
            "Evaluated {}: A={:?} B={:?} cost={}",
            amount_in, strategy_net_profit.a, strategy_net_profit.b, costs.total_cost
        );

        EvaluationResult {
            amount_in,
            strategy_net_profit,
            leg_outputs,
            pair_prices,
            min_profit_threshold: self.calculator.threshold(amount_in),
            costs,
            balances,
            best,
            break_even_volume,
            timestamp: Utc::now(),
        }
    }

    fn settle_chain(&self, strategy: Strategy, output: Result<Decimal, QuoteError>) -> Option<Decimal> {
        match output {
            Ok(output) => Some(output),
            Err(e) => {
                warn!("⚠️ Strategy {} skipped this cycle: {}", strategy, e);
                None
            }
        }
    }

    /// Leg 2 is quoted on leg 1's output, so the two hops are sequential.
    async fn quote_chain(&self, strategy: Strategy, amount_in: Decimal) -> ChainQuote {
        let leg1 = match self.timed_quote(strategy.entry(), amount_in, true).await {
            Ok(quote) => quote,
            Err(e) => {
                return ChainQuote {
                    entry_price: None,
                    output: Err(e),
                }
            }
        };
        let entry_price = amount_in.checked_div(leg1.output_amount);
        let output = self
            .timed_quote(strategy.exit(), leg1.output_amount, false)
            .await
            .map(|leg2| leg2.output_amount);

        ChainQuote { entry_price, output }
    }

    async fn timed_quote(&self, slot: VenueSlot, amount: Decimal, is_buy: bool) -> Result<Quote, QuoteError> {
        let quoter = self.quoters.get(slot);
        let venue = quoter.venue_name().to_string();
        with_timeout(
            self.quote_timeout,
            move || QuoteError::Timeout(venue),
            quoter.quote(amount, is_buy),
        )
        .await
    }

    async fn fetch_balances(&self) -> Result<BalanceSnapshot, BalanceQueryError> {
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
    use crate::domain::testing::{snapshot, FixedCosts, ScriptedBalances, ScriptedQuoter};
    use rust_decimal_macros::dec;

    fn evaluator(first: ScriptedQuoter, second: ScriptedQuoter, cost: Decimal) -> Evaluator {
        Evaluator::new(
            VenueValues::new(Arc::new(first) as Arc<dyn Quoter>, Arc::new(second) as Arc<dyn Quoter>),
            Arc::new(FixedCosts::total(cost)),
            Arc::new(ScriptedBalances::constant(snapshot(dec!(500), dec!(0)))),
            ProfitCalculator::new(dec!(1)),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_profitable_strategy_a() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium").with_output(true, dec!(100), dec!(102));
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca").with_output(false, dec!(102), dec!(108));

        let result = evaluator(first, second, dec!(2)).evaluate(dec!(100)).await;

        assert_eq!(result.leg_outputs.a, Some(dec!(108)));
        assert_eq!(result.strategy_net_profit.a, Some(dec!(6)));
        assert_eq!(result.strategy_net_profit.b, None);
        assert_eq!(result.min_profit_threshold, dec!(1));
        assert_eq!(result.decision(), Some(Strategy::A));
    }

    #[tokio::test]
    async fn test_net_equal_to_threshold_does_not_fire() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium").with_output(true, dec!(100), dec!(101.5));
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca").with_output(false, dec!(101.5), dec!(103));

        let result = evaluator(first, second, dec!(2)).evaluate(dec!(100)).await;

        // 103 - 100 - 2 = 1, exactly 1% of 100
        assert_eq!(result.strategy_net_profit.a, Some(dec!(1)));
        assert_eq!(result.min_profit_threshold, dec!(1));
        assert_eq!(result.best, Some((Strategy::A, dec!(1))));
        assert_eq!(result.decision(), None);
    }

    #[tokio::test]
    async fn test_decision_never_fires_at_or_below_threshold() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium");
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca");
        let mut result = evaluator(first, second, dec!(2)).evaluate(dec!(40)).await;
        result.min_profit_threshold = dec!(1.01);

        let mut net = dec!(-0.5);
        while net <= result.min_profit_threshold {
            for strategy in [Strategy::A, Strategy::B] {
                result.best = Some((strategy, net));
                assert_eq!(result.decision(), None, "net {} fired", net);
            }
            net += dec!(0.01);
        }
        result.best = Some((Strategy::B, net));
        assert_eq!(result.decision(), Some(Strategy::B));
    }

    #[tokio::test]
    async fn test_no_quotes_means_no_decision() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium");
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca");

        let result = evaluator(first, second, dec!(2)).evaluate(dec!(100)).await;

        assert_eq!(result.strategy_net_profit.a, None);
        assert_eq!(result.strategy_net_profit.b, None);
        assert_eq!(result.best, None);
        assert_eq!(result.decision(), None);
        assert_eq!(result.break_even_volume, None);
    }

    #[tokio::test]
    async fn test_unprofitable_cycle_has_no_decision() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium")
            .with_rate(true, dec!(1))
            .with_rate(false, dec!(1));
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca")
            .with_rate(true, dec!(1))
            .with_rate(false, dec!(1.01));

        let result = evaluator(first, second, dec!(0.5)).evaluate(dec!(100)).await;

        // A: 101 - 100 - 0.5 = 0.5, B: 100 - 100 - 0.5 = -0.5
        assert_eq!(result.best, Some((Strategy::A, dec!(0.5))));
        assert_eq!(result.decision(), None);
        assert_eq!(result.break_even_volume, Some(dec!(50)));
    }

    #[tokio::test]
    async fn test_failed_exit_still_records_entry_price() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium").with_output(true, dec!(100), dec!(200));
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca");

        let result = evaluator(first, second, dec!(1)).evaluate(dec!(100)).await;

        assert_eq!(result.pair_prices.first, Some(dec!(0.5)));
        assert_eq!(result.pair_prices.second, None);
        assert_eq!(result.strategy_net_profit.a, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_quote_times_out_one_strategy() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium")
            .with_rate(true, dec!(1))
            .with_rate(false, dec!(1.05));
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca")
            .with_rate(true, dec!(1))
            .with_rate(false, dec!(1.05))
            .with_delay(Duration::from_secs(30));

        let result = evaluator(first, second, dec!(1)).evaluate(dec!(100)).await;

        // Every chain touches the slow venue once; both time out.
        assert_eq!(result.strategy_net_profit.a, None);
        assert_eq!(result.strategy_net_profit.b, None);
        assert_eq!(result.pair_prices.first, Some(dec!(1)));
    }

    #[tokio::test]
    async fn test_balance_failure_does_not_block_evaluation() {
        let first = ScriptedQuoter::new(VenueSlot::First, "Raydium").with_output(true, dec!(100), dec!(102));
        let second = ScriptedQuoter::new(VenueSlot::Second, "Orca").with_output(false, dec!(102), dec!(108));
        let evaluator = Evaluator::new(
            VenueValues::new(Arc::new(first) as Arc<dyn Quoter>, Arc::new(second) as Arc<dyn Quoter>),
            Arc::new(FixedCosts::total(dec!(2))),
            Arc::new(ScriptedBalances::new(vec![Err(BalanceQueryError::Rpc("down".into()))])),
            ProfitCalculator::new(dec!(1)),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );

        let result = evaluator.evaluate(dec!(100)).await;

        assert!(result.balances.is_none());
        assert_eq!(result.decision(), Some(Strategy::A));
    }
}
