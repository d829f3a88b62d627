use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::SyncQueue;
use crate::chain::ChainService;
use crate::storage::aggregate::price_to_decimal;
use crate::storage::{NetworkStatusUpdate, Storage};

/// Background sweep that keeps stored data fresh without client traffic.
///
/// Each tick refreshes the stored network status and queues a sync for
/// every active wallet.
pub struct Poller {
    storage: Arc<dyn Storage>,
    chain: Arc<dyn ChainService>,
    queue: SyncQueue,
    poll_interval: Duration,
}

impl Poller {
    pub fn new(
        storage: Arc<dyn Storage>,
        chain: Arc<dyn ChainService>,
        queue: SyncQueue,
        poll_interval: Duration,
    ) -> Self {
        Self {
            storage,
            chain,
            queue,
            poll_interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            "Reward poller starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.poll_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("Reward poller shutting down");
    }

    /// One sweep. Returns the number of wallets queued.
    pub async fn poll_step(&self) -> usize {
        if let Err(e) = self.refresh_network_status().await {
            tracing::warn!(error = %e, "Poller: failed to refresh network status");
        }

        let wallets = match self.storage.list_wallets().await {
            Ok(wallets) => wallets,
            Err(e) => {
                tracing::warn!(error = %e, "Poller: failed to list wallets");
                return 0;
            }
        };

        let mut queued = 0;
        for entry in wallets.iter().filter(|w| w.wallet.is_active) {
            if self.queue.submit(&entry.wallet.id, &entry.wallet.address) {
                queued += 1;
            }
        }

        if queued > 0 {
            tracing::info!(count = queued, "Poller: queued wallet syncs");
        }
        queued
    }

    async fn refresh_network_status(&self) -> eyre::Result<()> {
        let status = self.chain.network_status().await?;
        let price = self.chain.ztc_price().await?;

        self.storage
            .update_network_status(NetworkStatusUpdate {
                current_era: Some(status.current_era),
                current_block: Some(status.current_block),
                ztc_price_usd: Some(price_to_decimal(price)),
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}
