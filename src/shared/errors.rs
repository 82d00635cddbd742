//! Error handling for the application

use thiserror::Error;

/// A venue could not produce a usable quote. Recoverable: the affected
/// strategy is skipped for the current cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("quote unavailable on {venue}: {reason}")]
    Unavailable { venue: String, reason: String },

    #[error("quote request to {0} timed out")]
    Timeout(String),

    #[error("invalid quote from {venue}: {reason}")]
    Invalid { venue: String, reason: String },
}

/// Wallet balance could not be read. Recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BalanceQueryError {
    #[error("balance RPC failed: {0}")]
    Rpc(String),

    #[error("balance query timed out")]
    Timeout,
}

/// Internal to the cost estimator; callers always receive a fallback estimate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CostEstimationError {
    #[error("fee sampling failed: {0}")]
    Sampling(String),

    #[error("no recent prioritization fees")]
    EmptySample,

    #[error("settlement price unavailable: {0}")]
    PriceUnavailable(String),
}

/// A swap leg did not land.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwapError {
    #[error("swap on {venue} failed: {reason}")]
    Failed { venue: String, reason: String },

    #[error("swap on {0} timed out")]
    Timeout(String),

    #[error("invalid swap amount: {0}")]
    InvalidAmount(String),
}

/// Configuration problems detected at startup
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),

    #[error("failed to parse config file: {0}")]
    Parse(String),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing wallet: {0}")]
    MissingWallet(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failure talking to the chain outside the ports' own error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Blockchain error: {0}")]
    Blockchain(String),
}
