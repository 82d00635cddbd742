//! Network and priority fee estimation for a two-transaction round trip

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::pool_fees::{pool_fee_cost, PoolFeeReader};
use super::rpc_client::SolanaRpcClient;
use crate::domain::ports::{CostBreakdown, CostEstimator};
use crate::infrastructure::api_clients::price_feed::SettlementPriceChain;
use crate::shared::errors::CostEstimationError;
use crate::shared::utils::with_timeout;

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const ESTIMATED_CU_PER_SWAP: u64 = 350_000;
pub const TXS_PER_ROUND_TRIP: u64 = 2;
const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
const MICRO_LAMPORTS_PER_LAMPORT: u64 = 1_000_000;

/// Gas for one round trip, in SOL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasEstimate {
    pub network_sol: Decimal,
    pub priority_sol: Decimal,
    pub fallback: bool,
}

impl GasEstimate {
    pub fn total_sol(&self) -> Decimal {
        self.network_sol + self.priority_sol
    }

    /// Static estimate: signature fees plus whatever is left for priority.
    pub fn fallback(fallback_sol: Decimal) -> Self {
        let network_sol = signature_fees_sol();
        Self {
            network_sol,
            priority_sol: (fallback_sol - network_sol).max(Decimal::ZERO),
            fallback: true,
        }
    }

    /// Estimate from recent prioritization fees (micro-lamports per CU).
    ///
    /// Uses the 75th percentile fee and never goes below half the static
    /// estimate.
    pub fn from_fee_sample(fees: &[u64], fallback_sol: Decimal) -> Result<Self, CostEstimationError> {
        if fees.is_empty() {
            return Err(CostEstimationError::EmptySample);
        }
        let mut sorted = fees.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let index = ((sorted.len() * 3) / 4).min(sorted.len() - 1);
        let fee_per_cu = Decimal::from(sorted[index]);

        let priority_lamports = Decimal::from(ESTIMATED_CU_PER_SWAP) * fee_per_cu
            / Decimal::from(MICRO_LAMPORTS_PER_LAMPORT)
            * Decimal::from(TXS_PER_ROUND_TRIP);
        let network_sol = signature_fees_sol();
        let mut priority_sol = priority_lamports / Decimal::from(LAMPORTS_PER_SOL);

        let floor = fallback_sol / Decimal::TWO;
        if network_sol + priority_sol < floor {
            priority_sol = floor - network_sol;
        }

        Ok(Self {
            network_sol,
            priority_sol,
            fallback: false,
        })
    }
}

fn signature_fees_sol() -> Decimal {
    Decimal::from(LAMPORTS_PER_SIGNATURE * TXS_PER_ROUND_TRIP) / Decimal::from(LAMPORTS_PER_SOL)
}

/// Combines sampled gas, the SOL/USD rate and pool fee rates.
pub struct PriorityFeeCostEstimator {
    rpc: SolanaRpcClient,
    price: Arc<SettlementPriceChain>,
    pool_fees: Arc<PoolFeeReader>,
    fallback_sol: Decimal,
    sample_timeout: Duration,
}

impl PriorityFeeCostEstimator {
    pub fn new(
        rpc: SolanaRpcClient,
        price: Arc<SettlementPriceChain>,
        pool_fees: Arc<PoolFeeReader>,
        fallback_sol: Decimal,
        sample_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            price,
            pool_fees,
            fallback_sol,
            sample_timeout,
        }
    }

    async fn gas(&self) -> GasEstimate {
        let sample = with_timeout(
            self.sample_timeout,
            || CostEstimationError::Sampling("timed out".to_string()),
            async {
                self.rpc
                    .get_recent_prioritization_fees()
                    .await
                    .map_err(|e| CostEstimationError::Sampling(e.to_string()))
            },
        )
        .await;

        match sample.and_then(|fees| GasEstimate::from_fee_sample(&fees, self.fallback_sol)) {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!("⚠️ Using static gas estimate: {}", e);
                GasEstimate::fallback(self.fallback_sol)
            }
        }
    }
}

/// Convert a gas estimate into the common unit.
pub fn breakdown(gas: GasEstimate, native_price_usd: Decimal, pool_fee_cost: Decimal) -> CostBreakdown {
    let network_cost = gas.network_sol * native_price_usd;
    let priority_cost = gas.priority_sol * native_price_usd;
    CostBreakdown {
        network_native: gas.network_sol,
        priority_native: gas.priority_sol,
        network_cost,
        priority_cost,
        pool_fee_cost,
        total_cost: network_cost + priority_cost,
        native_price_usd,
        fallback: gas.fallback,
    }
}

#[async_trait]
impl CostEstimator for PriorityFeeCostEstimator {
    async fn cost_breakdown(&self, amount_in: Decimal) -> CostBreakdown {
        let (gas, price, rates) = tokio::join!(self.gas(), self.price.usd_price(), self.pool_fees.fee_rates());
        let costs = breakdown(gas, price, pool_fee_cost(amount_in, &rates));
        debug!(
            "Gas {} SOL @ {} = {} (pool fees {}, informational)",
            gas.total_sol(),
            price,
            costs.total_cost,
            costs.pool_fee_cost
        );
        costs
    }
}
