//! Configuration: TOML file, `.env` secrets and CLI overrides

use rust_decimal::Decimal;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::shared::errors::ConfigError;
use crate::shared::types::{AssetPair, TokenDescriptor, VenueDescriptor, VenuePair, VenueSlot};
use crate::shared::utils::decimal_from_f64;

const DEFAULT_BASE_MINT: &str = "SKRbvo6Gf7GondiT3BbTfuRDPqLWei4j2Qy2NPGZhW3";
const DEFAULT_QUOTE_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
const DEFAULT_RAYDIUM_POOL: &str = "fchJDDYsnkX6dhY7MMjvNRmYiR7DMSYisKqT2HAZmqP";
const DEFAULT_ORCA_POOL: &str = "VY1ZQXjqBwvuWgVfTfhqanJe96GGoQrX7xZZDrWPGiT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RpcCfg {
    pub url: String,
    /// Websocket endpoint; derived from `url` when absent
    pub ws_url: Option<String>,
}

impl Default for RpcCfg {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            ws_url: None,
        }
    }
}

impl RpcCfg {
    pub fn websocket_url(&self) -> String {
        if let Some(ws) = &self.ws_url {
            return ws.clone();
        }
        if let Some(rest) = self.url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.url.clone()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WalletCfg {
    /// Path to a keypair JSON file. `WALLET_PRIVATE_KEY` is used when unset.
    pub keypair: Option<String>,
}

/// Largest decimal count accepted for a token; SPL mints stay well below it.
pub const MAX_TOKEN_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenInfo {
    fn descriptor(&self, field: &str) -> Result<TokenDescriptor, ConfigError> {
        Ok(TokenDescriptor::new(
            self.symbol.trim(),
            parse_pubkey(&self.mint, field)?,
            self.decimals,
        ))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenCfg {
    pub base: TokenInfo,
    pub quote: TokenInfo,
}

impl Default for TokenCfg {
    fn default() -> Self {
        Self {
            base: TokenInfo {
                mint: DEFAULT_BASE_MINT.to_string(),
                symbol: "BASE".to_string(),
                decimals: 6,
            },
            quote: TokenInfo {
                mint: DEFAULT_QUOTE_MINT.to_string(),
                symbol: "USDC".to_string(),
                decimals: 6,
            },
        }
    }
}

/// On-chain pool layout, used to look up the venue fee rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    OrcaWhirlpool,
    RaydiumClmm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueCfg {
    /// Display name
    pub name: String,
    /// DEX label understood by the route API
    pub dex_label: String,
    pub pool_address: String,
    pub pool_kind: PoolKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VenuesCfg {
    pub first: VenueCfg,
    pub second: VenueCfg,
}

impl Default for VenuesCfg {
    fn default() -> Self {
        Self {
            first: VenueCfg {
                name: "Raydium".to_string(),
                dex_label: "Raydium CLMM".to_string(),
                pool_address: DEFAULT_RAYDIUM_POOL.to_string(),
                pool_kind: PoolKind::RaydiumClmm,
            },
            second: VenueCfg {
                name: "Orca".to_string(),
                dex_label: "Whirlpool".to_string(),
                pool_address: DEFAULT_ORCA_POOL.to_string(),
                pool_kind: PoolKind::OrcaWhirlpool,
            },
        }
    }
}

impl VenuesCfg {
    pub fn get(&self, slot: VenueSlot) -> &VenueCfg {
        match slot {
            VenueSlot::First => &self.first,
            VenueSlot::Second => &self.second,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradeCfg {
    /// Trade amount in quote units, kept as a string to avoid float rounding
    pub amount_in: String,
    pub min_profit_percent: f64,
    pub slippage_bps: u16,
    pub simulate_only: bool,
}

impl Default for TradeCfg {
    fn default() -> Self {
        Self {
            amount_in: "1".to_string(),
            min_profit_percent: 1.0,
            slippage_bps: 100,
            simulate_only: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerCfg {
    pub debounce_ms: u64,
    pub render_interval_ms: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            render_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsCfg {
    pub quote_ms: u64,
    pub balance_ms: u64,
    pub swap_ms: u64,
}

impl Default for TimeoutsCfg {
    fn default() -> Self {
        Self {
            quote_ms: 5_000,
            balance_ms: 5_000,
            swap_ms: 90_000,
        }
    }
}

impl TimeoutsCfg {
    pub fn quote(&self) -> Duration {
        Duration::from_millis(self.quote_ms)
    }

    pub fn balance(&self) -> Duration {
        Duration::from_millis(self.balance_ms)
    }

    pub fn swap(&self) -> Duration {
        Duration::from_millis(self.swap_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CostsCfg {
    /// Static gas estimate (SOL) for both legs when sampling fails
    pub fallback_gas_sol: f64,
    /// Last-resort SOL/USD price
    pub fallback_native_price_usd: f64,
}

impl Default for CostsCfg {
    fn default() -> Self {
        Self {
            fallback_gas_sol: 0.005,
            fallback_native_price_usd: 200.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouteApiCfg {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for RouteApiCfg {
    fn default() -> Self {
        Self {
            base_url: "https://lite-api.jup.ag/swap/v1".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
    pub enabled: bool,
    pub recent_trades: usize,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_trades: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerCfg {
    /// Append every trade record as a JSON line to this file
    pub journal_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcCfg,
    pub wallet: WalletCfg,
    pub tokens: TokenCfg,
    pub venues: VenuesCfg,
    pub trade: TradeCfg,
    pub scheduler: SchedulerCfg,
    pub timeouts: TimeoutsCfg,
    pub costs: CostsCfg,
    pub route_api: RouteApiCfg,
    pub display: DisplayCfg,
    pub ledger: LedgerCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Fill secrets from the environment (`.env` is loaded by `main`).
    pub fn apply_env(&mut self) {
        if self.route_api.api_key.is_none() {
            self.route_api.api_key = std::env::var("ROUTE_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        if let Ok(url) = std::env::var("RPC_URL") {
            if !url.trim().is_empty() {
                self.rpc.url = url.trim().to_string();
            }
        }
    }

    pub fn amount_in(&self) -> Result<Decimal, ConfigError> {
        let amount = Decimal::from_str(self.trade.amount_in.trim())
            .map_err(|e| ConfigError::invalid("trade.amount_in", e.to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(ConfigError::invalid("trade.amount_in", "must be positive"));
        }
        Ok(amount)
    }

    pub fn min_profit_percent(&self) -> Result<Decimal, ConfigError> {
        let pct = self.trade.min_profit_percent;
        if !pct.is_finite() || pct < 0.0 {
            return Err(ConfigError::invalid(
                "trade.min_profit_percent",
                "must be a finite, non-negative number",
            ));
        }
        decimal_from_f64(pct)
            .ok_or_else(|| ConfigError::invalid("trade.min_profit_percent", "not representable"))
    }

    pub fn asset_pair(&self) -> Result<AssetPair, ConfigError> {
        let tokens = [
            ("tokens.base.decimals", &self.tokens.base),
            ("tokens.quote.decimals", &self.tokens.quote),
        ];
        for (field, token) in tokens {
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(ConfigError::invalid(
                    field,
                    format!("{} exceeds the maximum of {}", token.decimals, MAX_TOKEN_DECIMALS),
                ));
            }
        }
        let base = self.tokens.base.descriptor("tokens.base.mint")?;
        let quote = self.tokens.quote.descriptor("tokens.quote.mint")?;
        if base.mint == quote.mint {
            return Err(ConfigError::invalid("tokens", "base and quote mints must differ"));
        }
        Ok(AssetPair::new(base, quote))
    }

    pub fn venue_pair(&self) -> Result<VenuePair, ConfigError> {
        let describe = |slot: VenueSlot, field: &str| -> Result<VenueDescriptor, ConfigError> {
            let cfg = self.venues.get(slot);
            Ok(VenueDescriptor {
                slot,
                name: cfg.name.clone(),
                pool_address: parse_pubkey(&cfg.pool_address, field)?,
            })
        };
        let pair = VenuePair {
            first: describe(VenueSlot::First, "venues.first.pool_address")?,
            second: describe(VenueSlot::Second, "venues.second.pool_address")?,
        };
        if pair.first.pool_address == pair.second.pool_address {
            return Err(ConfigError::invalid("venues", "the two venues must use different pools"));
        }
        Ok(pair)
    }

    /// Check everything the engine relies on before any I/O happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.amount_in()?;
        self.min_profit_percent()?;
        self.asset_pair()?;
        self.venue_pair()?;
        if self.scheduler.debounce_ms == 0 {
            return Err(ConfigError::invalid("scheduler.debounce_ms", "must be non-zero"));
        }
        if self.scheduler.render_interval_ms == 0 {
            return Err(ConfigError::invalid("scheduler.render_interval_ms", "must be non-zero"));
        }
        if self.costs.fallback_gas_sol < 0.0 || !self.costs.fallback_gas_sol.is_finite() {
            return Err(ConfigError::invalid("costs.fallback_gas_sol", "must be non-negative"));
        }
        if self.costs.fallback_native_price_usd <= 0.0 || !self.costs.fallback_native_price_usd.is_finite() {
            return Err(ConfigError::invalid("costs.fallback_native_price_usd", "must be positive"));
        }
        Ok(())
    }
}

fn parse_pubkey(value: &str, field: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value.trim()).map_err(|e| {
        ConfigError::invalid(
            field,
            format!("\"{}\" is not a base58-encoded 32 byte key ({})", value, e),
        )
    })
}
