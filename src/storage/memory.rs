use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::aggregate::{self, decimal_to_f64};
use super::{Storage, StorageError, StorageResult};
use super::types::*;

#[derive(Default)]
struct Tables {
    wallets: HashMap<String, Wallet>,
    rewards: Vec<RewardEntry>,
    balances: HashMap<String, WalletBalance>,
    network: NetworkStatus,
}

/// Process-local store. Each operation holds the lock for its whole duration,
/// so readers never observe a half-applied write.
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>> {
        Ok(self.tables.read().await.wallets.get(id).cloned())
    }

    async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>> {
        let tables = self.tables.read().await;
        Ok(tables
            .wallets
            .values()
            .find(|w| w.address.eq_ignore_ascii_case(address))
            .cloned())
    }

    async fn list_wallets(&self) -> StorageResult<Vec<WalletWithBalance>> {
        let tables = self.tables.read().await;
        let mut wallets: Vec<WalletWithBalance> = tables
            .wallets
            .values()
            .map(|w| WalletWithBalance::new(w.clone(), tables.balances.get(&w.id).cloned()))
            .collect();
        aggregate::sort_by_total_rewards(&mut wallets);
        Ok(wallets)
    }

    async fn create_wallet(&self, wallet: NewWallet) -> StorageResult<Wallet> {
        let mut tables = self.tables.write().await;

        if tables
            .wallets
            .values()
            .any(|w| w.address.eq_ignore_ascii_case(&wallet.address))
        {
            return Err(StorageError::DuplicateAddress(wallet.address));
        }

        let now = Utc::now();
        let created = Wallet {
            id: Uuid::new_v4().to_string(),
            address: wallet.address,
            label: wallet.label,
            wallet_type: wallet.wallet_type,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let balance = WalletBalance::empty(&created, tables.network.current_era);
        tables.balances.insert(created.id.clone(), balance);
        tables.wallets.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn update_wallet(&self, id: &str, update: WalletUpdate) -> StorageResult<Option<Wallet>> {
        let mut tables = self.tables.write().await;
        let Some(wallet) = tables.wallets.get_mut(id) else {
            return Ok(None);
        };

        if let Some(label) = update.label {
            wallet.label = label;
        }
        if let Some(wallet_type) = update.wallet_type {
            wallet.wallet_type = wallet_type;
        }
        if let Some(is_active) = update.is_active {
            wallet.is_active = is_active;
        }
        wallet.updated_at = Utc::now();

        Ok(Some(wallet.clone()))
    }

    async fn delete_wallet(&self, id: &str) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.wallets.remove(id).is_none() {
            return Ok(false);
        }
        tables.balances.remove(id);
        tables.rewards.retain(|entry| entry.wallet_id != id);
        Ok(true)
    }

    async fn add_reward_entry(&self, entry: NewRewardEntry) -> StorageResult<RewardEntry> {
        let mut tables = self.tables.write().await;
        if !tables.wallets.contains_key(&entry.wallet_id) {
            return Err(StorageError::WalletNotFound(entry.wallet_id));
        }

        let stored = RewardEntry {
            id: Uuid::new_v4().to_string(),
            wallet_id: entry.wallet_id,
            wallet_address: entry.wallet_address,
            reward_type: entry.reward_type,
            amount: entry.amount,
            amount_usd: entry.amount_usd,
            era: entry.era,
            block_number: entry.block_number,
            transaction_hash: entry.transaction_hash,
            timestamp: entry.timestamp,
            created_at: Utc::now(),
        };
        tables.rewards.push(stored.clone());
        Ok(stored)
    }

    async fn has_reward_entry(
        &self,
        wallet_id: &str,
        transaction_hash: &str,
        reward_type: RewardType,
    ) -> StorageResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.rewards.iter().any(|e| {
            e.wallet_id == wallet_id
                && e.reward_type == reward_type
                && e.transaction_hash.eq_ignore_ascii_case(transaction_hash)
        }))
    }

    async fn reward_history(&self, query: HistoryQuery) -> StorageResult<Vec<RewardHistoryEntry>> {
        let tables = self.tables.read().await;

        let mut entries: Vec<&RewardEntry> = tables
            .rewards
            .iter()
            .filter(|e| query.wallet_id.as_deref().map_or(true, |id| e.wallet_id == id))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(entries
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|e| RewardHistoryEntry {
                id: e.id.clone(),
                wallet_address: e.wallet_address.clone(),
                wallet_label: tables
                    .wallets
                    .get(&e.wallet_id)
                    .map(|w| w.label.clone())
                    .unwrap_or_else(|| "Unknown Wallet".to_string()),
                reward_type: e.reward_type,
                amount: decimal_to_f64(&e.amount),
                amount_usd: e.amount_usd.as_ref().map(decimal_to_f64),
                era: e.era,
                transaction_hash: e.transaction_hash.clone(),
                timestamp: e.timestamp,
            })
            .collect())
    }

    async fn rewards_by_timeframe(
        &self,
        wallet_id: &str,
        days: u32,
    ) -> StorageResult<Vec<ChartDataPoint>> {
        let tables = self.tables.read().await;
        let points: Vec<RewardPoint> = tables
            .rewards
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .map(RewardPoint::from)
            .collect();
        Ok(aggregate::bucket_by_day(&points, days, Utc::now().date_naive()))
    }

    async fn get_wallet_balance(&self, wallet_id: &str) -> StorageResult<Option<WalletBalance>> {
        Ok(self.tables.read().await.balances.get(wallet_id).cloned())
    }

    async fn upsert_wallet_balance(
        &self,
        wallet_id: &str,
        snapshot: BalanceSnapshot,
    ) -> StorageResult<WalletBalance> {
        let mut tables = self.tables.write().await;
        let Some(wallet) = tables.wallets.get(wallet_id) else {
            return Err(StorageError::WalletNotFound(wallet_id.to_string()));
        };

        let balance = WalletBalance {
            wallet_id: wallet.id.clone(),
            wallet_address: wallet.address.clone(),
            total_staking_rewards: snapshot.total_staking_rewards,
            total_validator_rewards: snapshot.total_validator_rewards,
            total_staking_rewards_usd: snapshot.total_staking_rewards_usd,
            total_validator_rewards_usd: snapshot.total_validator_rewards_usd,
            current_staked_amount: snapshot.current_staked_amount,
            last_update_era: snapshot.last_update_era,
            last_updated: Utc::now(),
        };
        tables.balances.insert(wallet_id.to_string(), balance.clone());
        Ok(balance)
    }

    async fn dashboard_stats(&self) -> StorageResult<DashboardStats> {
        let tables = self.tables.read().await;
        let now = Utc::now();

        let (total_rewards, total_rewards_usd) = tables.balances.values().fold(
            (0.0, 0.0),
            |(ztc, usd), b| {
                (
                    ztc + decimal_to_f64(&b.total_rewards()),
                    usd + decimal_to_f64(&b.total_rewards_usd()),
                )
            },
        );

        let since = now - Duration::hours(48);
        let recent: Vec<RewardPoint> = tables
            .rewards
            .iter()
            .filter(|e| e.timestamp > since)
            .map(RewardPoint::from)
            .collect();

        Ok(DashboardStats {
            total_wallets: tables.wallets.len() as i64,
            active_wallets: tables.wallets.values().filter(|w| w.is_active).count() as i64,
            total_rewards,
            total_rewards_usd,
            reward_change_24h: aggregate::reward_change_24h(&recent, now),
            last_update_time: now,
        })
    }

    async fn get_network_status(&self) -> StorageResult<NetworkStatus> {
        Ok(self.tables.read().await.network.clone())
    }

    async fn update_network_status(
        &self,
        update: NetworkStatusUpdate,
    ) -> StorageResult<NetworkStatus> {
        let mut tables = self.tables.write().await;
        let network = &mut tables.network;

        if let Some(era) = update.current_era {
            network.current_era = era;
        }
        if let Some(block) = update.current_block {
            network.current_block = block;
        }
        if let Some(price) = update.ztc_price_usd {
            network.ztc_price_usd = price;
        }
        if let Some(staked) = update.total_staked {
            network.total_staked = staked;
        }
        if let Some(validators) = update.active_validators {
            network.active_validators = validators;
        }
        network.last_updated = Utc::now();

        Ok(network.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, Duration};
    use std::str::FromStr;

    fn new_wallet(address: &str, label: &str) -> NewWallet {
        NewWallet {
            address: address.to_string(),
            label: label.to_string(),
            wallet_type: WalletType::Staking,
        }
    }

    fn reward(wallet: &Wallet, amount: &str, tx: &str, at: DateTime<Utc>) -> NewRewardEntry {
        NewRewardEntry {
            wallet_id: wallet.id.clone(),
            wallet_address: wallet.address.clone(),
            reward_type: RewardType::Staking,
            amount: BigDecimal::from_str(amount).unwrap(),
            amount_usd: None,
            era: 10,
            block_number: 36_000,
            transaction_hash: tx.to_string(),
            timestamp: at,
        }
    }

    fn snapshot(staking: &str, validator: &str) -> BalanceSnapshot {
        BalanceSnapshot {
            total_staking_rewards: BigDecimal::from_str(staking).unwrap(),
            total_validator_rewards: BigDecimal::from_str(validator).unwrap(),
            total_staking_rewards_usd: BigDecimal::from(0),
            total_validator_rewards_usd: BigDecimal::from(0),
            current_staked_amount: BigDecimal::from(0),
            last_update_era: 1,
        }
    }

    #[tokio::test]
    async fn test_create_wallet_rejects_duplicate_address_any_case() {
        let store = MemStorage::new();
        let wallet = store
            .create_wallet(new_wallet("0x742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67e", "Main"))
            .await
            .unwrap();
        assert!(wallet.is_active);

        let err = store
            .create_wallet(new_wallet("0x742D35CC6634C0532925A3B8D3AC19C7C1C3A67E", "Again"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateAddress(_)));

        let found = store
            .get_wallet_by_address("0x742d35cc6634c0532925a3b8d3ac19c7c1c3a67e")
            .await
            .unwrap();
        assert_eq!(found, Some(wallet));
    }

    #[tokio::test]
    async fn test_create_wallet_initializes_empty_balance() {
        let store = MemStorage::new();
        store
            .update_network_status(NetworkStatusUpdate {
                current_era: Some(42),
                ..Default::default()
            })
            .await
            .unwrap();

        let wallet = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "A"))
            .await
            .unwrap();
        let balance = store.get_wallet_balance(&wallet.id).await.unwrap().unwrap();

        assert_eq!(balance.total_rewards(), BigDecimal::from(0));
        assert_eq!(balance.last_update_era, 42);
        assert_eq!(balance.wallet_address, wallet.address);
    }

    #[tokio::test]
    async fn test_delete_wallet_cascades() {
        let store = MemStorage::new();
        let wallet = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "A"))
            .await
            .unwrap();
        let other = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000002", "B"))
            .await
            .unwrap();

        let now = Utc::now();
        store.add_reward_entry(reward(&wallet, "1", "0xaa", now)).await.unwrap();
        store.add_reward_entry(reward(&wallet, "2", "0xbb", now)).await.unwrap();
        store.add_reward_entry(reward(&other, "3", "0xcc", now)).await.unwrap();

        assert!(store.delete_wallet(&wallet.id).await.unwrap());
        assert!(!store.delete_wallet(&wallet.id).await.unwrap());

        assert!(store.get_wallet(&wallet.id).await.unwrap().is_none());
        assert!(store.get_wallet_balance(&wallet.id).await.unwrap().is_none());

        let history = store
            .reward_history(HistoryQuery {
                wallet_id: Some(wallet.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(history.is_empty());

        let all = store.reward_history(HistoryQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].transaction_hash, "0xcc");
    }

    #[tokio::test]
    async fn test_reward_entry_requires_live_wallet() {
        let store = MemStorage::new();
        let wallet = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "A"))
            .await
            .unwrap();
        store.delete_wallet(&wallet.id).await.unwrap();

        let err = store
            .add_reward_entry(reward(&wallet, "1", "0xaa", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WalletNotFound(_)));

        let err = store
            .upsert_wallet_balance(&wallet.id, snapshot("1", "0"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn test_reward_history_is_sorted_and_paginated() {
        let store = MemStorage::new();
        let wallet = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "Main"))
            .await
            .unwrap();

        let now = Utc::now();
        for i in 0..5 {
            store
                .add_reward_entry(reward(&wallet, "1", &format!("0x{:02x}", i), now - Duration::hours(i)))
                .await
                .unwrap();
        }

        let page = store
            .reward_history(HistoryQuery {
                wallet_id: Some(wallet.id.clone()),
                limit: 2,
                offset: 1,
            })
            .await
            .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].transaction_hash, "0x01");
        assert_eq!(page[1].transaction_hash, "0x02");
        assert_eq!(page[0].wallet_label, "Main");
        assert!(page[0].timestamp > page[1].timestamp);
    }

    #[tokio::test]
    async fn test_list_wallets_sorted_by_total_rewards() {
        let store = MemStorage::new();
        let low = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "low"))
            .await
            .unwrap();
        let high = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000002", "high"))
            .await
            .unwrap();
        let mid = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000003", "mid"))
            .await
            .unwrap();

        store.upsert_wallet_balance(&low.id, snapshot("1", "0")).await.unwrap();
        store.upsert_wallet_balance(&high.id, snapshot("5", "10")).await.unwrap();
        store.upsert_wallet_balance(&mid.id, snapshot("2", "3.5")).await.unwrap();

        let wallets = store.list_wallets().await.unwrap();
        let labels: Vec<&str> = wallets.iter().map(|w| w.wallet.label.as_str()).collect();
        assert_eq!(labels, vec!["high", "mid", "low"]);
        assert_eq!(wallets[0].total_rewards, 15.0);
        assert!(wallets[0].is_connected);
    }

    #[tokio::test]
    async fn test_update_wallet_partial() {
        let store = MemStorage::new();
        let wallet = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "A"))
            .await
            .unwrap();

        let updated = store
            .update_wallet(
                &wallet.id,
                WalletUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.label, "A");
        assert_eq!(updated.wallet_type, WalletType::Staking);
        assert!(!updated.is_active);
        assert!(updated.updated_at >= wallet.updated_at);

        let missing = store
            .update_wallet("nope", WalletUpdate::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_rewards_by_timeframe_returns_requested_days() {
        let store = MemStorage::new();
        let wallet = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "A"))
            .await
            .unwrap();
        let now = Utc::now();
        store.add_reward_entry(reward(&wallet, "2.5", "0xaa", now)).await.unwrap();

        let chart = store.rewards_by_timeframe(&wallet.id, 7).await.unwrap();
        assert_eq!(chart.len(), 7);
        assert_eq!(chart[6].date, now.date_naive().format("%Y-%m-%d").to_string());
        assert_eq!(chart[6].staking_rewards, 2.5);
        assert!(chart[..6].iter().all(|p| p.total_rewards == 0.0));
    }

    #[tokio::test]
    async fn test_dashboard_stats_totals() {
        let store = MemStorage::new();
        let a = store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000001", "A"))
            .await
            .unwrap();
        store
            .create_wallet(new_wallet("0x0000000000000000000000000000000000000002", "B"))
            .await
            .unwrap();
        store.upsert_wallet_balance(&a.id, snapshot("1.5", "2")).await.unwrap();
        store
            .update_wallet(&a.id, WalletUpdate { is_active: Some(false), ..Default::default() })
            .await
            .unwrap();

        let stats = store.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_wallets, 2);
        assert_eq!(stats.active_wallets, 1);
        assert_eq!(stats.total_rewards, 3.5);
        assert_eq!(stats.reward_change_24h, 0.0);
    }
}
