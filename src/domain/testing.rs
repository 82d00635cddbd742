//! Test doubles for the collaborator ports

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::ports::{
    BalanceProvider, BalanceSnapshot, CostBreakdown, CostEstimator, Quote, Quoter, Swapper,
};
use crate::shared::errors::{BalanceQueryError, QuoteError, SwapError};
use crate::shared::types::{AssetPair, TokenDescriptor, VenueDescriptor, VenuePair, VenueSlot};

pub fn asset_pair() -> AssetPair {
    AssetPair::new(
        TokenDescriptor::new("SKR", Pubkey::new_unique(), 6),
        TokenDescriptor::new("USDC", Pubkey::new_unique(), 6),
    )
}

pub fn venue_pair() -> VenuePair {
    VenuePair {
        first: VenueDescriptor {
            slot: VenueSlot::First,
            name: "Raydium".to_string(),
            pool_address: Pubkey::new_unique(),
        },
        second: VenueDescriptor {
            slot: VenueSlot::Second,
            name: "Orca".to_string(),
            pool_address: Pubkey::new_unique(),
        },
    }
}

/// Answers from an exact (direction, input) table, else from a flat rate.
pub struct ScriptedQuoter {
    slot: VenueSlot,
    name: String,
    exact: HashMap<(bool, Decimal), Decimal>,
    rates: HashMap<bool, Decimal>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedQuoter {
    pub fn new(slot: VenueSlot, name: &str) -> Self {
        Self {
            slot,
            name: name.to_string(),
            exact: HashMap::new(),
            rates: HashMap::new(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_output(mut self, is_buy: bool, input: Decimal, output: Decimal) -> Self {
        self.exact.insert((is_buy, input), output);
        self
    }

    pub fn with_rate(mut self, is_buy: bool, rate: Decimal) -> Self {
        self.rates.insert(is_buy, rate);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Quoter for ScriptedQuoter {
    fn venue_name(&self) -> &str {
        &self.name
    }

    async fn quote(&self, input_amount: Decimal, is_buy: bool) -> Result<Quote, QuoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let output = self
            .exact
            .get(&(is_buy, input_amount))
            .copied()
            .or_else(|| self.rates.get(&is_buy).map(|rate| input_amount * rate))
            .ok_or_else(|| QuoteError::Unavailable {
                venue: self.name.clone(),
                reason: "no route".to_string(),
            })?;
        Quote::checked(self.slot, &self.name, output / input_amount, output)
    }
}

pub struct FixedCosts(pub CostBreakdown);

impl FixedCosts {
    /// All of `total` attributed to network cost.
    pub fn total(total: Decimal) -> Self {
        Self(CostBreakdown {
            network_cost: total,
            total_cost: total,
            ..CostBreakdown::default()
        })
    }
}

#[async_trait]
impl CostEstimator for FixedCosts {
    async fn cost_breakdown(&self, _amount_in: Decimal) -> CostBreakdown {
        self.0.clone()
    }
}

pub fn snapshot(quote_amount: Decimal, base_amount: Decimal) -> BalanceSnapshot {
    BalanceSnapshot {
        quote_amount,
        base_amount,
        native_amount: Decimal::ONE,
        native_price_usd: Decimal::ONE_HUNDRED,
    }
}

/// Replays scripted snapshots in order; the last one repeats forever.
pub struct ScriptedBalances {
    script: Mutex<VecDeque<Result<BalanceSnapshot, BalanceQueryError>>>,
    calls: AtomicUsize,
}

impl ScriptedBalances {
    pub fn new(script: Vec<Result<BalanceSnapshot, BalanceQueryError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(snapshot: BalanceSnapshot) -> Self {
        Self::new(vec![Ok(snapshot)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceProvider for ScriptedBalances {
    async fn balances(&self) -> Result<BalanceSnapshot, BalanceQueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match script.len() {
            0 => Err(BalanceQueryError::Rpc("nothing scripted".to_string())),
            1 => script[0].clone(),
            _ => script.pop_front().unwrap(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapCall {
    pub venue: VenueSlot,
    pub input_symbol: String,
    pub amount_in: Decimal,
}

/// Returns scripted results in order and remembers every call.
pub struct RecordingSwapper {
    results: Mutex<VecDeque<Result<String, SwapError>>>,
    calls: Mutex<Vec<SwapCall>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSwapper {
    pub fn new(results: Vec<Result<String, SwapError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<SwapCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Swapper for RecordingSwapper {
    async fn swap(
        &self,
        venue: VenueSlot,
        input: &TokenDescriptor,
        amount_in: Decimal,
    ) -> Result<String, SwapError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(SwapCall {
            venue,
            input_symbol: input.symbol.clone(),
            amount_in,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.results.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(SwapError::Failed {
                venue: format!("{:?}", venue),
                reason: "nothing scripted".to_string(),
            })
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
