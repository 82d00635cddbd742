//! Wallet balances read straight from chain

use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address_with_program_id;
use std::sync::Arc;
use tracing::{debug, info};

use super::rpc_client::{token_account_amount, AccountReader};
use crate::domain::ports::{BalanceProvider, BalanceSnapshot};
use crate::infrastructure::api_clients::price_feed::SettlementPriceChain;
use crate::shared::errors::{AppError, BalanceQueryError};
use crate::shared::types::AssetPair;
use crate::shared::utils::from_atomic;

const NATIVE_DECIMALS: u8 = 9;

/// Addresses read on every balance query, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletAccounts {
    pub owner: Pubkey,
    pub quote_account: Pubkey,
    pub base_account: Pubkey,
}

impl WalletAccounts {
    /// Derive associated token accounts. The owning program of each mint
    /// decides between SPL Token and Token-2022 addresses.
    pub async fn resolve(rpc: &dyn AccountReader, owner: Pubkey, pair: &AssetPair) -> Result<Self, AppError> {
        let mints = [pair.quote.mint, pair.base.mint];
        let accounts = rpc.get_multiple_accounts(&mints).await?;
        let program_of = |index: usize| -> Result<Pubkey, AppError> {
            accounts
                .get(index)
                .and_then(|a| a.as_ref())
                .map(|a| a.owner)
                .ok_or_else(|| AppError::Blockchain(format!("mint {} not found", mints[index])))
        };
        let resolved = Self {
            owner,
            quote_account: get_associated_token_address_with_program_id(&owner, &pair.quote.mint, &program_of(0)?),
            base_account: get_associated_token_address_with_program_id(&owner, &pair.base.mint, &program_of(1)?),
        };
        info!(
            "👛 Wallet {} | {} account {} | {} account {}",
            owner, pair.quote.symbol, resolved.quote_account, pair.base.symbol, resolved.base_account
        );
        Ok(resolved)
    }

    fn addresses(&self) -> [Pubkey; 3] {
        [self.owner, self.quote_account, self.base_account]
    }
}

/// Build a snapshot from `[owner, quote_account, base_account]`.
/// Missing token accounts hold nothing.
pub fn snapshot_from_accounts(
    accounts: &[Option<Account>],
    pair: &AssetPair,
    native_price_usd: Decimal,
) -> Result<BalanceSnapshot, BalanceQueryError> {
    if accounts.len() != 3 {
        return Err(BalanceQueryError::Rpc(format!("expected 3 accounts, got {}", accounts.len())));
    }
    let token_amount = |account: &Option<Account>, decimals: u8| -> Result<Decimal, BalanceQueryError> {
        match account {
            Some(account) => token_account_amount(&account.data)
                .map(|raw| from_atomic(raw, decimals))
                .map_err(|e| BalanceQueryError::Rpc(e.to_string())),
            None => Ok(Decimal::ZERO),
        }
    };

    let lamports = accounts[0].as_ref().map(|a| a.lamports).unwrap_or(0);
    Ok(BalanceSnapshot {
        quote_amount: token_amount(&accounts[1], pair.quote.decimals)?,
        base_amount: token_amount(&accounts[2], pair.base.decimals)?,
        native_amount: from_atomic(lamports, NATIVE_DECIMALS),
        native_price_usd,
    })
}

/// Token amounts come from one RPC read. The native price is whatever the
/// shared price chain last resolved, so a stalled price API never delays a
/// balance query.
pub struct WalletBalanceProvider {
    rpc: Arc<dyn AccountReader>,
    accounts: WalletAccounts,
    pair: AssetPair,
    price: Arc<SettlementPriceChain>,
}

impl WalletBalanceProvider {
    pub fn new(
        rpc: Arc<dyn AccountReader>,
        accounts: WalletAccounts,
        pair: AssetPair,
        price: Arc<SettlementPriceChain>,
    ) -> Self {
        Self {
            rpc,
            accounts,
            pair,
            price,
        }
    }
}

#[async_trait]
impl BalanceProvider for WalletBalanceProvider {
    async fn balances(&self) -> Result<BalanceSnapshot, BalanceQueryError> {
        let addresses = self.accounts.addresses();
        let accounts = self
            .rpc
            .get_multiple_accounts(&addresses)
            .await
            .map_err(|e| BalanceQueryError::Rpc(e.to_string()))?;
        let price = self.price.cached_or_fallback().await;
        let snapshot = snapshot_from_accounts(&accounts, &self.pair, price)?;
        debug!(
            "Balances: {} {} | {} {} | {} SOL",
            snapshot.quote_amount, self.pair.quote.symbol, snapshot.base_amount, self.pair.base.symbol, snapshot.native_amount
        );
        Ok(snapshot)
    }
}
