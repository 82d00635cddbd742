//! Collaborator interfaces consumed by the core
//!
//! Every implementation performs external I/O; the core wraps each call in a
//! timeout and treats expiry exactly like a failure of that call.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::shared::errors::{BalanceQueryError, QuoteError, SwapError};
use crate::shared::types::{TokenDescriptor, VenueSlot};

/// Executable price on one venue for one direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub venue: VenueSlot,
    /// Output per unit of input, in the requested direction
    pub price: Decimal,
    pub output_amount: Decimal,
}

impl Quote {
    /// Build a quote, rejecting non-positive prices or outputs.
    pub fn checked(
        venue: VenueSlot,
        venue_name: &str,
        price: Decimal,
        output_amount: Decimal,
    ) -> Result<Self, QuoteError> {
        if price <= Decimal::ZERO {
            return Err(QuoteError::Invalid {
                venue: venue_name.to_string(),
                reason: format!("non-positive price {}", price),
            });
        }
        if output_amount <= Decimal::ZERO {
            return Err(QuoteError::Invalid {
                venue: venue_name.to_string(),
                reason: format!("non-positive output {}", output_amount),
            });
        }
        Ok(Self {
            venue,
            price,
            output_amount,
        })
    }
}

/// Quote computation for a single venue.
#[async_trait]
pub trait Quoter: Send + Sync {
    fn venue_name(&self) -> &str;

    /// `is_buy` spends quote for base; otherwise base is sold for quote.
    async fn quote(&self, input_amount: Decimal, is_buy: bool) -> Result<Quote, QuoteError>;
}

/// Execution cost estimate, USD-equivalent unless noted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Signature fees for both legs, in native units (SOL)
    pub network_native: Decimal,
    /// Priority fees for both legs, in native units (SOL)
    pub priority_native: Decimal,
    pub network_cost: Decimal,
    pub priority_cost: Decimal,
    /// Venue trading fees for the trade amount. Informational only: quotes
    /// already net these out, so this is never part of `total_cost`.
    pub pool_fee_cost: Decimal,
    /// `network_cost + priority_cost`
    pub total_cost: Decimal,
    /// Native/USD rate used for the conversion
    pub native_price_usd: Decimal,
    /// True when the static estimate was used
    pub fallback: bool,
}

/// Fee and gas cost estimation. Never fails; degrades to a static estimate.
#[async_trait]
pub trait CostEstimator: Send + Sync {
    async fn cost_breakdown(&self, amount_in: Decimal) -> CostBreakdown;
}

/// Wallet holdings at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceSnapshot {
    pub quote_amount: Decimal,
    pub base_amount: Decimal,
    /// Native token (SOL) that pays fees
    pub native_amount: Decimal,
    /// Settlement conversion rate: USD per native token
    pub native_price_usd: Decimal,
}

impl BalanceSnapshot {
    /// Total value in quote units; base is valued at `base_price` when known.
    pub fn total_value(&self, base_price: Option<Decimal>) -> Decimal {
        let base_value = base_price.map(|p| self.base_amount * p).unwrap_or_default();
        self.quote_amount + self.native_amount * self.native_price_usd + base_value
    }
}

#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn balances(&self) -> Result<BalanceSnapshot, BalanceQueryError>;
}

/// Executes one on-chain swap leg.
#[async_trait]
pub trait Swapper: Send + Sync {
    /// Spend `amount_in` of `input` on `venue`; returns the transaction id.
    async fn swap(
        &self,
        venue: VenueSlot,
        input: &TokenDescriptor,
        amount_in: Decimal,
    ) -> Result<String, SwapError>;
}
