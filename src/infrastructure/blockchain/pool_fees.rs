//! Venue trading-fee rates read from pool accounts

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::rpc_client::AccountReader;
use crate::shared::config::PoolKind;
use crate::shared::errors::AppError;
use crate::shared::types::{VenueSlot, VenueValues};
use crate::shared::utils::with_timeout;

/// Fee rates are expressed in millionths of the traded amount.
pub const FEE_RATE_DENOMINATOR: u32 = 1_000_000;

// Whirlpool: discriminator(8) config(32) bump(1) tick_spacing(2) seed(2) fee_rate(u16)
const WHIRLPOOL_FEE_RATE_OFFSET: usize = 45;
// CLMM PoolState: discriminator(8) bump(1) amm_config(32)
const CLMM_AMM_CONFIG_OFFSET: usize = 9;
// AmmConfig: discriminator(8) bump(1) index(2) owner(32) protocol_fee_rate(4) trade_fee_rate(u32)
const AMM_CONFIG_TRADE_FEE_OFFSET: usize = 47;

pub fn whirlpool_fee_rate(data: &[u8]) -> Option<u32> {
    let bytes = data.get(WHIRLPOOL_FEE_RATE_OFFSET..WHIRLPOOL_FEE_RATE_OFFSET + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]) as u32)
}

pub fn clmm_amm_config(data: &[u8]) -> Option<Pubkey> {
    let bytes = data.get(CLMM_AMM_CONFIG_OFFSET..CLMM_AMM_CONFIG_OFFSET + 32)?;
    Pubkey::try_from(bytes).ok()
}

pub fn amm_config_trade_fee_rate(data: &[u8]) -> Option<u32> {
    let bytes = data.get(AMM_CONFIG_TRADE_FEE_OFFSET..AMM_CONFIG_TRADE_FEE_OFFSET + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Trading fees paid on `amount` crossing both venues once.
pub fn pool_fee_cost(amount: Decimal, rates: &VenueValues<u32>) -> Decimal {
    let total_rate = Decimal::from(rates.first) + Decimal::from(rates.second);
    amount * total_rate / Decimal::from(FEE_RATE_DENOMINATOR)
}

#[derive(Debug, Clone)]
pub struct PoolRef {
    pub kind: PoolKind,
    pub address: Pubkey,
}

/// Reads and caches the fee rate of each venue's pool. Each venue's read,
/// one or two accounts, is bounded by `timeout`.
pub struct PoolFeeReader {
    rpc: Arc<dyn AccountReader>,
    pools: VenueValues<PoolRef>,
    timeout: Duration,
    cache: RwLock<Option<VenueValues<u32>>>,
}

impl PoolFeeReader {
    pub fn new(rpc: Arc<dyn AccountReader>, pools: VenueValues<PoolRef>, timeout: Duration) -> Self {
        Self {
            rpc,
            pools,
            timeout,
            cache: RwLock::new(None),
        }
    }

    /// Unreadable or timed-out rates count as zero and are retried on the
    /// next call.
    pub async fn fee_rates(&self) -> VenueValues<u32> {
        if let Some(rates) = *self.cache.read().await {
            return rates;
        }

        let (first, second) = tokio::join!(
            self.read_rate(VenueSlot::First),
            self.read_rate(VenueSlot::Second)
        );
        if let (Some(first), Some(second)) = (first, second) {
            let rates = VenueValues::new(first, second);
            *self.cache.write().await = Some(rates);
            debug!("Pool fee rates: {} / {} per million", first, second);
            return rates;
        }
        VenueValues::new(first.unwrap_or(0), second.unwrap_or(0))
    }

    async fn read_rate(&self, slot: VenueSlot) -> Option<u32> {
        let pool = self.pools.get(slot);
        let result = with_timeout(
            self.timeout,
            || AppError::Blockchain(format!("fee rate read for {} timed out", pool.address)),
            self.fetch_rate(pool),
        )
        .await;
        match result {
            Ok(Some(rate)) => Some(rate),
            Ok(None) => {
                warn!("⚠️ Pool {} account too short to hold a fee rate", pool.address);
                None
            }
            Err(e) => {
                warn!("⚠️ Fee rate for {} unavailable: {}", pool.address, e);
                None
            }
        }
    }

    async fn fetch_rate(&self, pool: &PoolRef) -> Result<Option<u32>, AppError> {
        let data = self.rpc.get_account_data(&pool.address).await?;
        match pool.kind {
            PoolKind::OrcaWhirlpool => Ok(whirlpool_fee_rate(&data)),
            PoolKind::RaydiumClmm => match clmm_amm_config(&data) {
                Some(config) => {
                    let config_data = self.rpc.get_account_data(&config).await?;
                    Ok(amm_config_trade_fee_rate(&config_data))
                }
                None => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::blockchain::rpc_client::testing::InMemoryAccounts;
    use rust_decimal_macros::dec;

    #[test]
    fn test_whirlpool_fee_rate_offset() {
        let mut data = vec![0u8; 653];
        data[45..47].copy_from_slice(&3000u16.to_le_bytes());
        assert_eq!(whirlpool_fee_rate(&data), Some(3000));
        assert_eq!(whirlpool_fee_rate(&data[..46]), None);
    }

    #[test]
    fn test_clmm_config_lookup() {
        let config = Pubkey::new_unique();
        let mut pool = vec![0u8; 1544];
        pool[9..41].copy_from_slice(config.as_ref());
        assert_eq!(clmm_amm_config(&pool), Some(config));

        let mut amm_config = vec![0u8; 117];
        amm_config[47..51].copy_from_slice(&2500u32.to_le_bytes());
        assert_eq!(amm_config_trade_fee_rate(&amm_config), Some(2500));
    }

    #[test]
    fn test_pool_fee_cost() {
        // 0.25% + 0.30% of 100
        let rates = VenueValues::new(2500, 3000);
        assert_eq!(pool_fee_cost(dec!(100), &rates), dec!(0.55));
        assert_eq!(pool_fee_cost(dec!(100), &VenueValues::new(0, 0)), dec!(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_rpc_reads_count_as_zero_and_are_retried() {
        let whirlpool = Pubkey::new_unique();
        let clmm = Pubkey::new_unique();
        let config = Pubkey::new_unique();

        let mut whirlpool_data = vec![0u8; 653];
        whirlpool_data[45..47].copy_from_slice(&3000u16.to_le_bytes());
        let mut clmm_data = vec![0u8; 1544];
        clmm_data[9..41].copy_from_slice(config.as_ref());
        let mut config_data = vec![0u8; 117];
        config_data[47..51].copy_from_slice(&2500u32.to_le_bytes());

        let rpc = Arc::new(
            InMemoryAccounts::new()
                .with_data(whirlpool, whirlpool_data)
                .with_data(clmm, clmm_data)
                .with_data(config, config_data),
        );
        let pools = VenueValues::new(
            PoolRef {
                kind: PoolKind::RaydiumClmm,
                address: clmm,
            },
            PoolRef {
                kind: PoolKind::OrcaWhirlpool,
                address: whirlpool,
            },
        );
        let reader = PoolFeeReader::new(rpc.clone(), pools, Duration::from_secs(2));

        rpc.set_stalled(true);
        let started = tokio::time::Instant::now();
        assert_eq!(reader.fee_rates().await, VenueValues::new(0, 0));
        assert_eq!(started.elapsed(), Duration::from_secs(2));

        rpc.set_stalled(false);
        assert_eq!(reader.fee_rates().await, VenueValues::new(2500, 3000));

        // Cached once both rates are known.
        rpc.set_stalled(true);
        let started = tokio::time::Instant::now();
        assert_eq!(reader.fee_rates().await, VenueValues::new(2500, 3000));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
