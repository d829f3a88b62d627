use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{sync_wallet, SyncReport};
use crate::chain::ChainService;
use crate::storage::Storage;

const REPORT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct SyncJob {
    wallet_id: String,
    address: String,
}

/// Handle for submitting background wallet syncs.
///
/// Jobs are served one at a time by a single worker task. Every finished job
/// is published as a [`SyncReport`] to all current subscribers.
#[derive(Clone)]
pub struct SyncQueue {
    jobs: mpsc::UnboundedSender<SyncJob>,
    reports: broadcast::Sender<SyncReport>,
}

impl SyncQueue {
    /// Start the worker. It drains jobs until `shutdown` fires or every
    /// queue handle has been dropped.
    pub fn spawn(
        storage: Arc<dyn Storage>,
        chain: Arc<dyn ChainService>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (reports_tx, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        let handle = tokio::spawn(run_worker(
            storage,
            chain,
            jobs_rx,
            reports_tx.clone(),
            shutdown,
        ));

        (
            Self {
                jobs: jobs_tx,
                reports: reports_tx,
            },
            handle,
        )
    }

    /// Queue a sync. Returns false if the worker has stopped.
    pub fn submit(&self, wallet_id: &str, address: &str) -> bool {
        let job = SyncJob {
            wallet_id: wallet_id.to_string(),
            address: address.to_string(),
        };
        match self.jobs.send(job) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(wallet_id = %wallet_id, "Sync worker stopped, dropping job");
                false
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncReport> {
        self.reports.subscribe()
    }
}

async fn run_worker(
    storage: Arc<dyn Storage>,
    chain: Arc<dyn ChainService>,
    mut jobs: mpsc::UnboundedReceiver<SyncJob>,
    reports: broadcast::Sender<SyncReport>,
    shutdown: CancellationToken,
) {
    tracing::info!("Sync worker starting");

    loop {
        let job = tokio::select! {
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        tracing::debug!(wallet_id = %job.wallet_id, "Running queued sync");
        let report = sync_wallet(storage.as_ref(), chain.as_ref(), &job.wallet_id, &job.address).await;

        // No subscribers is fine
        let _ = reports.send(report);
    }

    tracing::info!("Sync worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::{reward, FakeChain};
    use crate::storage::{MemStorage, NewWallet, RewardType, WalletType};
    use crate::sync::SyncOutcome;
    use chrono::Utc;
    use std::time::Duration;

    const ADDRESS: &str = "0x742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67e";

    async fn setup(chain: FakeChain) -> (Arc<MemStorage>, Arc<FakeChain>, String) {
        let storage = Arc::new(MemStorage::new());
        let id = storage
            .create_wallet(NewWallet {
                address: ADDRESS.to_string(),
                label: "Main".to_string(),
                wallet_type: WalletType::Both,
            })
            .await
            .unwrap()
            .id;
        (storage, Arc::new(chain), id)
    }

    #[tokio::test]
    async fn test_submitted_job_publishes_report() {
        let chain = FakeChain::new().with_rewards(vec![reward(
            RewardType::Staking,
            "1",
            "0x01",
            Utc::now(),
        )]);
        let (storage, chain, id) = setup(chain).await;
        let shutdown = CancellationToken::new();
        let (queue, handle) = SyncQueue::spawn(storage.clone(), chain, shutdown.clone());

        let mut reports = queue.subscribe();
        assert!(queue.submit(&id, ADDRESS));

        let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.wallet_id, id);
        assert_eq!(
            report.outcome,
            SyncOutcome::Completed {
                rewards_added: 1,
                rewards_skipped: 0
            }
        );

        let balance = storage.get_wallet_balance(&id).await.unwrap().unwrap();
        assert_eq!(balance.last_update_era, 10);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_job_is_reported_not_raised() {
        let (storage, chain, id) = setup(FakeChain::new()).await;
        chain.set_failing(true);
        let shutdown = CancellationToken::new();
        let (queue, handle) = SyncQueue::spawn(storage, chain.clone(), shutdown.clone());

        let mut reports = queue.subscribe();
        queue.submit(&id, ADDRESS);

        let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(!report.is_completed());

        // Worker survives a failed job
        chain.set_failing(false);
        queue.submit(&id, ADDRESS);
        let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(report.is_completed());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let (storage, chain, id) = setup(FakeChain::new()).await;
        let shutdown = CancellationToken::new();
        let (queue, handle) = SyncQueue::spawn(storage, chain, shutdown.clone());

        shutdown.cancel();
        handle.await.unwrap();

        assert!(!queue.submit(&id, ADDRESS));
    }
}
