//! Pool account change notifications over the RPC websocket

use anyhow::Result;
use futures::StreamExt;
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::RpcAccountInfoConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::shared::types::{VenuePair, VenueSlot};

/// Subscribes to both pool accounts and forwards the venue slot of every
/// change to the scheduler. Payloads are not decoded: a change is only a
/// trigger to re-evaluate.
pub struct AccountWatcher {
    ws_url: String,
    pools: Vec<(VenueSlot, Pubkey)>,
    reconnect_delay: Duration,
}

impl AccountWatcher {
    pub fn new(ws_url: String, venues: &VenuePair) -> Self {
        Self {
            ws_url,
            pools: VenueSlot::ALL
                .into_iter()
                .map(|slot| (slot, venues.get(slot).pool_address))
                .collect(),
            reconnect_delay: Duration::from_secs(3),
        }
    }

    /// One task per pool. Tasks end once the receiving side is dropped.
    pub fn spawn(self, tx: mpsc::Sender<VenueSlot>) -> Vec<JoinHandle<()>> {
        self.pools
            .into_iter()
            .map(|(slot, pool)| {
                let ws_url = self.ws_url.clone();
                let tx = tx.clone();
                let delay = self.reconnect_delay;
                tokio::spawn(async move {
                    loop {
                        match watch_pool(&ws_url, slot, pool, &tx).await {
                            Ok(()) => debug!("Subscription for {} ended", pool),
                            Err(e) => warn!("⚠️ Subscription for {} failed: {}", pool, e),
                        }
                        if tx.is_closed() {
                            return;
                        }
                        tokio::time::sleep(delay).await;
                        info!("🔄 Resubscribing to {}", pool);
                    }
                })
            })
            .collect()
    }
}

async fn watch_pool(ws_url: &str, slot: VenueSlot, pool: Pubkey, tx: &mpsc::Sender<VenueSlot>) -> Result<()> {
    let client = PubsubClient::new(ws_url).await?;
    let config = RpcAccountInfoConfig {
        encoding: Some(UiAccountEncoding::Base64),
        data_slice: None,
        commitment: Some(CommitmentConfig::processed()),
        min_context_slot: None,
    };
    let (mut stream, unsubscribe) = client.account_subscribe(&pool, Some(config)).await?;
    info!("📡 Watching pool {} ({:?})", pool, slot);

    loop {
        tokio::select! {
            update = stream.next() => match update {
                Some(update) => {
                    debug!("Pool {} changed at slot {}", pool, update.context.slot);
                    if !forward(tx, slot) {
                        break;
                    }
                }
                None => break,
            },
            _ = tx.closed() => break,
        }
    }

    drop(stream);
    unsubscribe().await;
    Ok(())
}

/// Queue a trigger without waiting. A full queue loses nothing that matters
/// because the scheduler coalesces triggers anyway. Returns false once the
/// receiver is gone.
pub fn forward(tx: &mpsc::Sender<VenueSlot>, slot: VenueSlot) -> bool {
    match tx.try_send(slot) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::VenueDescriptor;

    #[test]
    fn test_watches_both_pools() {
        let venues = VenuePair {
            first: VenueDescriptor {
                slot: VenueSlot::First,
                name: "Raydium".to_string(),
                pool_address: Pubkey::new_unique(),
            },
            second: VenueDescriptor {
                slot: VenueSlot::Second,
                name: "Orca".to_string(),
                pool_address: Pubkey::new_unique(),
            },
        };
        let watcher = AccountWatcher::new("wss://example.invalid".to_string(), &venues);
        assert_eq!(
            watcher.pools,
            vec![
                (VenueSlot::First, venues.first.pool_address),
                (VenueSlot::Second, venues.second.pool_address)
            ]
        );
    }

    #[tokio::test]
    async fn test_forward_tolerates_full_queue_but_not_closed() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(forward(&tx, VenueSlot::First));
        assert!(forward(&tx, VenueSlot::Second));
        assert_eq!(rx.recv().await, Some(VenueSlot::First));

        drop(rx);
        assert!(!forward(&tx, VenueSlot::First));
    }
}
