//! Wallet keypair loading

use solana_sdk::signature::{read_keypair_file, Keypair};
use tracing::info;

use crate::shared::errors::ConfigError;

pub const PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";

/// Load the signing keypair.
///
/// `WALLET_PRIVATE_KEY` wins over the keypair file. The variable may hold a
/// base58 secret key or a JSON byte array as written by `solana-keygen`.
pub fn load_keypair(keypair_path: Option<&str>) -> Result<Keypair, ConfigError> {
    if let Ok(secret) = std::env::var(PRIVATE_KEY_ENV) {
        if !secret.trim().is_empty() {
            info!("🔑 Using wallet from {}", PRIVATE_KEY_ENV);
            return parse_private_key(&secret);
        }
    }

    match keypair_path {
        Some(path) => {
            let expanded = expand_home(path);
            info!("🔑 Using wallet file {}", expanded);
            read_keypair_file(&expanded)
                .map_err(|e| ConfigError::MissingWallet(format!("cannot read {}: {}", expanded, e)))
        }
        None => Err(ConfigError::MissingWallet(format!(
            "set {} or wallet.keypair",
            PRIVATE_KEY_ENV
        ))),
    }
}

pub fn parse_private_key(secret: &str) -> Result<Keypair, ConfigError> {
    let secret = secret.trim();
    let bytes = if secret.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(secret)
            .map_err(|e| ConfigError::MissingWallet(format!("invalid JSON key: {}", e)))?
    } else {
        bs58::decode(secret)
            .into_vec()
            .map_err(|e| ConfigError::MissingWallet(format!("invalid base58 key: {}", e)))?
    };
    Keypair::try_from(bytes.as_slice())
        .map_err(|e| ConfigError::MissingWallet(format!("invalid secret key: {}", e)))
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home, rest),
        _ => path.to_string(),
    }
}
