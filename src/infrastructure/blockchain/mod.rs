//! Direct blockchain access: RPC, pubsub, wallet and on-chain reads

pub mod account_watcher;
pub mod balance_reader;
pub mod gas_estimator;
pub mod pool_fees;
pub mod rpc_client;
pub mod wallet;

pub use account_watcher::AccountWatcher;
pub use balance_reader::{WalletAccounts, WalletBalanceProvider};
pub use gas_estimator::PriorityFeeCostEstimator;
pub use pool_fees::{PoolFeeReader, PoolRef};
pub use rpc_client::{AccountReader, SolanaRpcClient};
