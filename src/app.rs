//! Wiring: build the collaborators, the engine and the scheduler, then run

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use solana_sdk::signature::Signer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use spatial_arb::application::{ArbitrageEngine, EngineSettings, Scheduler, SchedulerSettings};
use spatial_arb::domain::arbitrage::{Evaluator, ProfitCalculator};
use spatial_arb::domain::execution::ExecutionCoordinator;
use spatial_arb::domain::ledger::Ledger;
use spatial_arb::domain::ports::Quoter;
use spatial_arb::infrastructure::api_clients::{
    RouteApiClient, RouteApiSwapper, RouteApiVenue, SettlementPriceChain, VenueRoute,
};
use spatial_arb::infrastructure::blockchain::wallet::load_keypair;
use spatial_arb::infrastructure::blockchain::{
    AccountReader, AccountWatcher, PoolFeeReader, PoolRef, PriorityFeeCostEstimator, SolanaRpcClient,
    WalletAccounts, WalletBalanceProvider,
};
use spatial_arb::shared::config::Config;
use spatial_arb::shared::types::{VenueSlot, VenueValues};
use spatial_arb::shared::utils::decimal_from_f64;

const NOTIFICATION_QUEUE: usize = 64;

fn decimal(value: f64, field: &str) -> Result<Decimal> {
    decimal_from_f64(value).with_context(|| format!("{} is not a decimal: {}", field, value))
}

pub async fn run(config: Config) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let pair = config.asset_pair()?;
    let venues = config.venue_pair()?;
    let settings = EngineSettings::from_config(&config)?;

    info!("🚀 Starting spatial arbitrage: {}/{}", pair.base.symbol, pair.quote.symbol);
    info!(
        "Venues: {} ({}) vs {} ({})",
        venues.first.name, venues.first.pool_address, venues.second.name, venues.second.pool_address
    );
    if settings.simulate_only {
        warn!("🧪 Simulate-only mode: no transaction will be sent");
    }

    let keypair = Arc::new(load_keypair(config.wallet.keypair.as_deref())?);
    info!("Loaded keypair: {}", keypair.pubkey());

    let rpc = SolanaRpcClient::new(config.rpc.url.clone());
    let account_reader: Arc<dyn AccountReader> = Arc::new(rpc.clone());
    let http = reqwest::Client::builder()
        .user_agent(concat!("spatial-arb/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let price = Arc::new(SettlementPriceChain::public(
        http.clone(),
        config.route_api.api_key.clone(),
        decimal(config.costs.fallback_native_price_usd, "costs.fallback_native_price_usd")?,
    ));

    let pools = VenueValues::new(
        PoolRef {
            kind: config.venues.first.pool_kind,
            address: venues.first.pool_address,
        },
        PoolRef {
            kind: config.venues.second.pool_kind,
            address: venues.second.pool_address,
        },
    );
    let cost_estimator = Arc::new(PriorityFeeCostEstimator::new(
        rpc.clone(),
        Arc::clone(&price),
        Arc::new(PoolFeeReader::new(Arc::clone(&account_reader), pools, config.timeouts.quote())),
        decimal(config.costs.fallback_gas_sol, "costs.fallback_gas_sol")?,
        config.timeouts.quote(),
    ));

    let accounts = WalletAccounts::resolve(account_reader.as_ref(), keypair.pubkey(), &pair)
        .await
        .context("failed to resolve wallet token accounts")?;
    let balances = Arc::new(WalletBalanceProvider::new(
        account_reader,
        accounts,
        pair.clone(),
        Arc::clone(&price),
    ));

    let route_client = Arc::new(RouteApiClient::new(
        http,
        config.route_api.base_url.clone(),
        config.route_api.api_key.clone(),
        config.trade.slippage_bps,
    ));
    let route = |slot: VenueSlot| VenueRoute {
        name: config.venues.get(slot).name.clone(),
        dex_label: config.venues.get(slot).dex_label.clone(),
    };
    let quoter = |slot: VenueSlot| -> Arc<dyn Quoter> {
        Arc::new(RouteApiVenue::new(Arc::clone(&route_client), slot, route(slot), pair.clone()))
    };
    let quoters = VenueValues::new(quoter(VenueSlot::First), quoter(VenueSlot::Second));
    let swapper = Arc::new(RouteApiSwapper::new(
        Arc::clone(&route_client),
        VenueValues::new(route(VenueSlot::First), route(VenueSlot::Second)),
        pair.clone(),
        keypair,
        rpc.clone(),
    ));

    let evaluator = Evaluator::new(
        quoters,
        cost_estimator,
        balances.clone(),
        ProfitCalculator::new(settings.min_profit_percent),
        config.timeouts.quote(),
        config.timeouts.balance(),
    );
    let coordinator = ExecutionCoordinator::new(
        swapper,
        balances,
        pair.clone(),
        config.timeouts.swap(),
        config.timeouts.balance(),
    );

    let ledger = match &config.ledger.journal_path {
        Some(path) => Ledger::with_journal(path)
            .with_context(|| format!("cannot open ledger journal {}", path.display()))?,
        None => Ledger::new(),
    };
    let engine = Arc::new(ArbitrageEngine::new(
        evaluator,
        coordinator,
        pair,
        venues.clone(),
        settings,
        ledger,
    ));

    let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE);
    let watchers = AccountWatcher::new(config.rpc.websocket_url(), &venues).spawn(tx);
    let scheduler = Scheduler::new(SchedulerSettings::from(&config.scheduler), engine.clone(), rx);
    let mut scheduler_task = tokio::spawn(scheduler.run());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("🛑 Shutting down");
        }
        result = &mut scheduler_task => {
            if let Err(e) = result {
                error!("Scheduler task failed: {}", e);
            }
            warn!("Scheduler stopped: all pool subscriptions are gone");
        }
    }

    for watcher in watchers {
        watcher.abort();
    }
    scheduler_task.abort();

    let trades = engine.recent_trades(usize::MAX).await;
    let attention = trades.iter().filter(|t| t.needs_attention()).count();
    info!(
        "Session summary: {} ledger records, {} dropped triggers",
        trades.len(),
        engine.dropped_triggers()
    );
    if attention > 0 {
        error!("❗ {} partial failure(s) left tokens in the wallet, manual intervention required", attention);
    }
    Ok(())
}
