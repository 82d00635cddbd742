//! Settlement asset (SOL) USD price from public APIs

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::shared::errors::CostEstimationError;
use crate::shared::utils::{decimal_from_f64, with_timeout};

pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

const BINANCE_URL: &str = "https://api.binance.com/api/v3/ticker/price?symbol=SOLUSDT";
const JUPITER_PRICE_URL: &str = "https://api.jup.ag/price/v3";
const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd";

/// One USD quote provider for the settlement asset.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_usd(&self) -> Result<Decimal, CostEstimationError>;
}

fn unavailable(source: &str, reason: impl std::fmt::Display) -> CostEstimationError {
    CostEstimationError::PriceUnavailable(format!("{}: {}", source, reason))
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    source: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, CostEstimationError> {
    let response = request.send().await.map_err(|e| unavailable(source, e))?;
    if !response.status().is_success() {
        return Err(unavailable(source, format!("HTTP {}", response.status())));
    }
    response.json::<T>().await.map_err(|e| unavailable(source, e))
}

#[derive(Debug, Deserialize)]
struct BinanceTickerResponse {
    price: String,
}

pub struct BinanceTicker {
    http: Client,
}

impl BinanceTicker {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PriceSource for BinanceTicker {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_usd(&self) -> Result<Decimal, CostEstimationError> {
        let body: BinanceTickerResponse = get_json(self.name(), self.http.get(BINANCE_URL)).await?;
        Decimal::from_str(body.price.trim()).map_err(|e| unavailable(self.name(), e))
    }
}

#[derive(Debug, Deserialize)]
struct JupiterPriceEntry {
    #[serde(rename = "usdPrice")]
    usd_price: Option<f64>,
}

/// The price API has answered both bare and `data`-wrapped maps over time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JupiterPriceResponse {
    Wrapped { data: HashMap<String, JupiterPriceEntry> },
    Bare(HashMap<String, JupiterPriceEntry>),
}

impl JupiterPriceResponse {
    fn usd_price(&self, mint: &str) -> Option<f64> {
        let map = match self {
            JupiterPriceResponse::Wrapped { data } => data,
            JupiterPriceResponse::Bare(map) => map,
        };
        map.get(mint).and_then(|entry| entry.usd_price)
    }
}

pub struct JupiterPrice {
    http: Client,
    api_key: Option<String>,
}

impl JupiterPrice {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl PriceSource for JupiterPrice {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn fetch_usd(&self) -> Result<Decimal, CostEstimationError> {
        let mut request = self.http.get(JUPITER_PRICE_URL).query(&[("ids", WSOL_MINT)]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let body: JupiterPriceResponse = get_json(self.name(), request).await?;
        body.usd_price(WSOL_MINT)
            .and_then(decimal_from_f64)
            .ok_or_else(|| unavailable(self.name(), "no usdPrice for SOL"))
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoResponse {
    solana: Option<CoinGeckoUsd>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoUsd {
    usd: Option<f64>,
}

pub struct CoinGeckoSimple {
    http: Client,
}

impl CoinGeckoSimple {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSimple {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_usd(&self) -> Result<Decimal, CostEstimationError> {
        let body: CoinGeckoResponse = get_json(self.name(), self.http.get(COINGECKO_URL)).await?;
        body.solana
            .and_then(|s| s.usd)
            .and_then(decimal_from_f64)
            .ok_or_else(|| unavailable(self.name(), "no solana.usd"))
    }
}

/// Ordered price sources: the first positive answer wins, the configured
/// default is the last resort. Results are cached briefly so several
/// consumers in one cycle share a lookup.
pub struct SettlementPriceChain {
    sources: Vec<Box<dyn PriceSource>>,
    fallback: Decimal,
    source_timeout: Duration,
    ttl: Duration,
    cache: RwLock<Option<(Instant, Decimal)>>,
}

impl SettlementPriceChain {
    pub fn new(sources: Vec<Box<dyn PriceSource>>, fallback: Decimal) -> Self {
        Self {
            sources,
            fallback,
            source_timeout: Duration::from_secs(5),
            ttl: Duration::from_secs(5),
            cache: RwLock::new(None),
        }
    }

    /// Binance, then Jupiter, then CoinGecko.
    pub fn public(http: Client, jupiter_api_key: Option<String>, fallback: Decimal) -> Self {
        Self::new(
            vec![
                Box::new(BinanceTicker::new(http.clone())) as Box<dyn PriceSource>,
                Box::new(JupiterPrice::new(http.clone(), jupiter_api_key)),
                Box::new(CoinGeckoSimple::new(http)),
            ],
            fallback,
        )
    }

    /// Last resolved price whatever its age, or the default. Never waits on
    /// a price source.
    pub async fn cached_or_fallback(&self) -> Decimal {
        let cached = *self.cache.read().await;
        cached.map(|(_, price)| price).unwrap_or(self.fallback)
    }

    pub async fn usd_price(&self) -> Decimal {
        if let Some((at, price)) = *self.cache.read().await {
            if at.elapsed() < self.ttl {
                return price;
            }
        }

        let price = self.resolve().await;
        *self.cache.write().await = Some((Instant::now(), price));
        price
    }

    async fn resolve(&self) -> Decimal {
        for source in &self.sources {
            let name = source.name();
            let result = with_timeout(
                self.source_timeout,
                || unavailable(name, "timed out"),
                source.fetch_usd(),
            )
            .await;
            match result {
                Ok(price) if price > Decimal::ZERO => {
                    debug!("SOL/USD {} from {}", price, name);
                    return price;
                }
                Ok(price) => debug!("Ignoring non-positive price {} from {}", price, name),
                Err(e) => debug!("Price source failed: {}", e),
            }
        }
        warn!("⚠️ All SOL price sources failed, using default {}", self.fallback);
        self.fallback
    }
}
