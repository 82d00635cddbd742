//! Swap-routing HTTP API restricted to one DEX per venue
//!
//! Every request pins a single DEX label and direct routes only, so a
//! `RouteApiVenue` prices exactly one pool and a swap built from its quote
//! lands on that pool.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::ports::{Quote, Quoter, Swapper};
use crate::infrastructure::blockchain::rpc_client::SolanaRpcClient;
use crate::shared::errors::{QuoteError, SwapError};
use crate::shared::types::{AssetPair, TokenDescriptor, VenueSlot, VenueValues};
use crate::shared::utils::{from_atomic, to_atomic};

/// Quote as returned by the API. The raw body is echoed back on `/swap`.
#[derive(Debug, Clone)]
pub struct RouteQuote {
    pub out_amount: u64,
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
struct QuoteAmounts {
    #[serde(rename = "outAmount")]
    out_amount: String,
}

impl RouteQuote {
    pub fn from_body(raw: Value) -> Result<Self, String> {
        let amounts: QuoteAmounts = serde_json::from_value(raw.clone()).map_err(|e| format!("unexpected quote body: {}", e))?;
        let out_amount = amounts
            .out_amount
            .parse::<u64>()
            .map_err(|e| format!("bad outAmount {:?}: {}", amounts.out_amount, e))?;
        Ok(Self { out_amount, raw })
    }
}

#[derive(Debug, Serialize)]
struct SwapRequest<'a> {
    #[serde(rename = "quoteResponse")]
    quote_response: &'a Value,
    #[serde(rename = "userPublicKey")]
    user_public_key: String,
    #[serde(rename = "wrapAndUnwrapSol")]
    wrap_and_unwrap_sol: bool,
    #[serde(rename = "dynamicComputeUnitLimit")]
    dynamic_compute_unit_limit: bool,
    #[serde(rename = "prioritizationFeeLamports")]
    prioritization_fee_lamports: &'static str,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    #[serde(rename = "swapTransaction")]
    swap_transaction: String,
}

/// Decode a base64, bincode-serialized versioned transaction.
pub fn decode_transaction(encoded: &str) -> Result<VersionedTransaction, String> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| format!("invalid base64 transaction: {}", e))?;
    bincode::deserialize(&bytes).map_err(|e| format!("invalid transaction bytes: {}", e))
}

pub struct RouteApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    slippage_bps: u16,
}

impl RouteApiClient {
    pub fn new(http: Client, base_url: impl Into<String>, api_key: Option<String>, slippage_bps: u16) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            slippage_bps,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    pub async fn quote(&self, dex_label: &str, input_mint: &Pubkey, output_mint: &Pubkey, amount: u64) -> Result<RouteQuote, String> {
        let request = self.http.get(format!("{}/quote", self.base_url)).query(&[
            ("inputMint", input_mint.to_string()),
            ("outputMint", output_mint.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", self.slippage_bps.to_string()),
            ("dexes", dex_label.to_string()),
            ("onlyDirectRoutes", "true".to_string()),
        ]);
        let response = self.authorize(request).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body.trim()));
        }
        let raw: Value = response.json().await.map_err(|e| e.to_string())?;
        RouteQuote::from_body(raw)
    }

    pub async fn swap_transaction(&self, quote: &RouteQuote, user: &Pubkey) -> Result<VersionedTransaction, String> {
        let body = SwapRequest {
            quote_response: &quote.raw,
            user_public_key: user.to_string(),
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: "auto",
        };
        let request = self.http.post(format!("{}/swap", self.base_url)).json(&body);
        let response = self.authorize(request).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {}: {}", status, body.trim()));
        }
        let swap: SwapResponse = response.json().await.map_err(|e| e.to_string())?;
        decode_transaction(&swap.swap_transaction)
    }
}

/// Display name and routing label of one venue.
#[derive(Debug, Clone)]
pub struct VenueRoute {
    pub name: String,
    pub dex_label: String,
}

/// Turn an atomic `outAmount` into a UI quote for `input_amount`.
pub fn ui_quote(
    slot: VenueSlot,
    venue_name: &str,
    input_amount: Decimal,
    out_amount: u64,
    output_decimals: u8,
) -> Result<Quote, QuoteError> {
    let output = from_atomic(out_amount, output_decimals);
    let price = output.checked_div(input_amount).ok_or_else(|| QuoteError::Invalid {
        venue: venue_name.to_string(),
        reason: "zero input".to_string(),
    })?;
    Quote::checked(slot, venue_name, price, output)
}

pub struct RouteApiVenue {
    client: Arc<RouteApiClient>,
    slot: VenueSlot,
    route: VenueRoute,
    pair: AssetPair,
}

impl RouteApiVenue {
    pub fn new(client: Arc<RouteApiClient>, slot: VenueSlot, route: VenueRoute, pair: AssetPair) -> Self {
        Self {
            client,
            slot,
            route,
            pair,
        }
    }
}

#[async_trait]
impl Quoter for RouteApiVenue {
    fn venue_name(&self) -> &str {
        &self.route.name
    }

    async fn quote(&self, input_amount: Decimal, is_buy: bool) -> Result<Quote, QuoteError> {
        let (input, output) = if is_buy {
            (&self.pair.quote, &self.pair.base)
        } else {
            (&self.pair.base, &self.pair.quote)
        };
        let atomic = to_atomic(input_amount, input.decimals)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| QuoteError::Invalid {
                venue: self.route.name.clone(),
                reason: format!("input {} {} rounds to zero", input_amount, input.symbol),
            })?;

        let quote = self
            .client
            .quote(&self.route.dex_label, &input.mint, &output.mint, atomic)
            .await
            .map_err(|reason| QuoteError::Unavailable {
                venue: self.route.name.clone(),
                reason,
            })?;
        debug!(
            "{} quote: {} {} -> {} atomic {}",
            self.route.name, input_amount, input.symbol, quote.out_amount, output.symbol
        );
        ui_quote(self.slot, &self.route.name, input_amount, quote.out_amount, output.decimals)
    }
}

/// Builds, signs and submits swap transactions through the routing API.
pub struct RouteApiSwapper {
    client: Arc<RouteApiClient>,
    routes: VenueValues<VenueRoute>,
    pair: AssetPair,
    keypair: Arc<Keypair>,
    rpc: SolanaRpcClient,
}

impl RouteApiSwapper {
    pub fn new(
        client: Arc<RouteApiClient>,
        routes: VenueValues<VenueRoute>,
        pair: AssetPair,
        keypair: Arc<Keypair>,
        rpc: SolanaRpcClient,
    ) -> Self {
        Self {
            client,
            routes,
            pair,
            keypair,
            rpc,
        }
    }
}

#[async_trait]
impl Swapper for RouteApiSwapper {
    async fn swap(&self, venue: VenueSlot, input: &TokenDescriptor, amount_in: Decimal) -> Result<String, SwapError> {
        let route = self.routes.get(venue);
        let failed = |reason: String| SwapError::Failed {
            venue: route.name.clone(),
            reason,
        };
        let atomic = to_atomic(amount_in, input.decimals)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| SwapError::InvalidAmount(format!("{} {}", amount_in, input.symbol)))?;
        let output = self.pair.counterpart(input);

        let quote = self
            .client
            .quote(&route.dex_label, &input.mint, &output.mint, atomic)
            .await
            .map_err(failed)?;
        let unsigned = self
            .client
            .swap_transaction(&quote, &self.keypair.pubkey())
            .await
            .map_err(failed)?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[self.keypair.as_ref()])
            .map_err(|e| failed(format!("signing failed: {}", e)))?;

        info!(
            "📤 Swapping {} {} -> {} on {}",
            amount_in, input.symbol, output.symbol, route.name
        );
        let signature = self
            .rpc
            .send_and_confirm(&signed)
            .await
            .map_err(|e| failed(e.to_string()))?;
        info!("✅ {} swap confirmed: {}", route.name, signature);
        Ok(signature.to_string())
    }
}
