mod app;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spatial_arb::shared::config::Config;

#[derive(Parser, Debug)]
#[command(version, about = "Spatial arbitrage between two Solana DEX pools")]
struct Args {
    /// Path to config file (optional, defaults are used otherwise)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RPC endpoint URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Path to keypair file
    #[arg(long)]
    keypair: Option<String>,

    /// Trade amount in quote token units
    #[arg(long)]
    amount_in: Option<String>,

    /// Minimum net profit as a percentage of the trade amount
    #[arg(long)]
    min_profit_percent: Option<f64>,

    /// Evaluate and report without sending transactions
    #[arg(long)]
    simulate_only: bool,
}

impl Args {
    /// Priority: CLI args > config file > defaults
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        config.apply_env();

        if let Some(rpc_url) = self.rpc_url {
            config.rpc.url = rpc_url;
        }
        if let Some(keypair) = self.keypair {
            config.wallet.keypair = Some(keypair);
        }
        if let Some(amount_in) = self.amount_in {
            config.trade.amount_in = amount_in;
        }
        if let Some(pct) = self.min_profit_percent {
            config.trade.min_profit_percent = pct;
        }
        if self.simulate_only {
            config.trade.simulate_only = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        info!("Using config file {}", path.display());
    }
    let config = args.into_config()?;

    app::run(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let args = Args::parse_from([
            "spatial-arb",
            "--rpc-url",
            "http://127.0.0.1:8899",
            "--amount-in",
            "12.5",
            "--min-profit-percent",
            "0.25",
            "--simulate-only",
        ]);
        let config = args.into_config().unwrap();

        assert_eq!(config.rpc.url, "http://127.0.0.1:8899");
        assert_eq!(config.trade.amount_in, "12.5");
        assert_eq!(config.trade.min_profit_percent, 0.25);
        assert!(config.trade.simulate_only);
        assert!(config.validate().is_ok());
    }
}
