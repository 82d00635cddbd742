//! Profit calculation and analysis for round-trip strategies

use rust_decimal::Decimal;

use crate::shared::types::{Strategy, StrategyPair};

/// Profit model for the two round-trip strategies.
///
/// All amounts are in quote units. Venue trading fees are already netted out
/// of quoted outputs, so the only explicit cost is the network/priority fee.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitCalculator {
    pub min_profit_percent: Decimal,
}

impl ProfitCalculator {
    pub fn new(min_profit_percent: Decimal) -> Self {
        Self { min_profit_percent }
    }

    /// Minimum net profit required to fire, for a given trade amount.
    pub fn threshold(&self, amount_in: Decimal) -> Decimal {
        amount_in * self.min_profit_percent / Decimal::ONE_HUNDRED
    }

    pub fn net_profit(&self, leg_output: Decimal, amount_in: Decimal, total_cost: Decimal) -> Decimal {
        leg_output - amount_in - total_cost
    }

    /// Best strategy, treating a missing result as negative infinity.
    ///
    /// The larger net wins; an exact tie goes to `A`.
    pub fn select_best(&self, nets: &StrategyPair<Option<Decimal>>) -> Option<(Strategy, Decimal)> {
        match (nets.a, nets.b) {
            (Some(a), Some(b)) if b > a => Some((Strategy::B, b)),
            (Some(a), _) => Some((Strategy::A, a)),
            (None, Some(b)) => Some((Strategy::B, b)),
            (None, None) => None,
        }
    }

    /// Strictly greater than the threshold.
    pub fn clears_threshold(net: Decimal, threshold: Decimal) -> bool {
        net > threshold
    }

    /// Trade volume at which gross spread would just pay for gas, assuming the
    /// spread scales linearly. Reporting aid only.
    pub fn break_even_volume(
        &self,
        leg_outputs: &StrategyPair<Option<Decimal>>,
        amount_in: Decimal,
        total_cost: Decimal,
    ) -> Option<Decimal> {
        leg_outputs
            .iter()
            .filter_map(|(_, output)| *output)
            .map(|output| output - amount_in)
            .filter(|gross| *gross > Decimal::ZERO)
            .map(|gross| total_cost * amount_in / gross)
            .min()
    }
}
