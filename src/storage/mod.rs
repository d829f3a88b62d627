pub mod aggregate;
pub mod memory;
pub mod postgres;
pub mod types;

use async_trait::async_trait;

pub use memory::MemStorage;
pub use postgres::PgStorage;
pub use types::*;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("wallet address {0} is already tracked")]
    DuplicateAddress(String),
    #[error("wallet {0} not found")]
    WalletNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence seam for wallets, reward entries, balance snapshots and the
/// network status singleton. Every call applies fully or not at all.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>>;

    /// Case-insensitive lookup.
    async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>>;

    /// All wallets joined with their balance, highest total rewards first.
    async fn list_wallets(&self) -> StorageResult<Vec<WalletWithBalance>>;

    /// Creates the wallet together with an all-zero balance snapshot.
    async fn create_wallet(&self, wallet: NewWallet) -> StorageResult<Wallet>;

    async fn update_wallet(&self, id: &str, update: WalletUpdate) -> StorageResult<Option<Wallet>>;

    /// Removes the wallet, its balance snapshot and all of its reward entries.
    async fn delete_wallet(&self, id: &str) -> StorageResult<bool>;

    /// Fails with `WalletNotFound` if the owning wallet does not exist.
    async fn add_reward_entry(&self, entry: NewRewardEntry) -> StorageResult<RewardEntry>;

    async fn has_reward_entry(
        &self,
        wallet_id: &str,
        transaction_hash: &str,
        reward_type: RewardType,
    ) -> StorageResult<bool>;

    /// Newest first, optionally filtered by wallet.
    async fn reward_history(&self, query: HistoryQuery) -> StorageResult<Vec<RewardHistoryEntry>>;

    /// Exactly `days` daily buckets ending today, oldest first.
    async fn rewards_by_timeframe(&self, wallet_id: &str, days: u32)
        -> StorageResult<Vec<ChartDataPoint>>;

    async fn get_wallet_balance(&self, wallet_id: &str) -> StorageResult<Option<WalletBalance>>;

    /// Overwrites the snapshot. Fails with `WalletNotFound` for unknown wallets.
    async fn upsert_wallet_balance(
        &self,
        wallet_id: &str,
        snapshot: BalanceSnapshot,
    ) -> StorageResult<WalletBalance>;

    async fn dashboard_stats(&self) -> StorageResult<DashboardStats>;

    async fn get_network_status(&self) -> StorageResult<NetworkStatus>;

    async fn update_network_status(&self, update: NetworkStatusUpdate)
        -> StorageResult<NetworkStatus>;
}
