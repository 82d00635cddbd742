//! Solana RPC client wrapper

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Account as TokenAccount;
use std::sync::Arc;

use crate::shared::errors::AppError;

/// Shared non-blocking RPC handle.
#[derive(Clone)]
pub struct SolanaRpcClient {
    client: Arc<RpcClient>,
}

impl SolanaRpcClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed())),
        }
    }

    /// Recent prioritization fees, micro-lamports per compute unit.
    pub async fn get_recent_prioritization_fees(&self) -> Result<Vec<u64>, AppError> {
        self.client
            .get_recent_prioritization_fees(&[])
            .await
            .map(|fees| fees.into_iter().map(|fee| fee.prioritization_fee).collect())
            .map_err(|e| AppError::Blockchain(format!("Failed to get prioritization fees: {}", e)))
    }

    /// Submit and wait for confirmation.
    pub async fn send_and_confirm(&self, transaction: &VersionedTransaction) -> Result<Signature, AppError> {
        self.client
            .send_and_confirm_transaction(transaction)
            .await
            .map_err(|e| AppError::Blockchain(format!("Transaction failed: {}", e)))
    }
}

/// Plain account reads shared by the balance and pool-fee readers.
#[async_trait]
pub trait AccountReader: Send + Sync {
    /// Get account data by address
    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, AppError>;

    /// Accounts in request order; missing accounts are `None`.
    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>, AppError>;
}

#[async_trait]
impl AccountReader for SolanaRpcClient {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Vec<u8>, AppError> {
        self.client
            .get_account_data(address)
            .await
            .map_err(|e| AppError::Blockchain(format!("Failed to get account {}: {}", address, e)))
    }

    async fn get_multiple_accounts(&self, addresses: &[Pubkey]) -> Result<Vec<Option<Account>>, AppError> {
        self.client
            .get_multiple_accounts(addresses)
            .await
            .map_err(|e| AppError::Blockchain(format!("Failed to get multiple accounts: {}", e)))
    }
}

/// Raw token amount held by an SPL token account. Token-2022 accounts carry
/// extensions after the base layout, which are ignored.
pub fn token_account_amount(data: &[u8]) -> Result<u64, AppError> {
    let base = data.get(..TokenAccount::LEN).unwrap_or(data);
    TokenAccount::unpack(base)
        .map(|account| account.amount)
        .map_err(|e| AppError::Blockchain(format!("Failed to parse token account: {}", e)))
}
