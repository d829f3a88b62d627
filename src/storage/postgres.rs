use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::aggregate::{self, decimal_to_f64};
use super::types::*;
use super::{Storage, StorageError, StorageResult};
use crate::config::DatabaseConfig;

type WalletRow = (String, String, String, String, bool, DateTime<Utc>, DateTime<Utc>);

type BalanceRow = (
    String,
    String,
    BigDecimal,
    BigDecimal,
    BigDecimal,
    BigDecimal,
    BigDecimal,
    i64,
    DateTime<Utc>,
);

type HistoryRow = (
    String,
    String,
    String,
    String,
    BigDecimal,
    Option<BigDecimal>,
    i64,
    String,
    DateTime<Utc>,
);

type NetworkRow = (i64, i64, BigDecimal, BigDecimal, i64, DateTime<Utc>);

const WALLET_COLUMNS: &str = "id, address, label, wallet_type, is_active, created_at, updated_at";

const BALANCE_COLUMNS: &str = "wallet_id, wallet_address, total_staking_rewards, \
     total_validator_rewards, total_staking_rewards_usd, total_validator_rewards_usd, \
     current_staked_amount, last_update_era, last_updated";

const NETWORK_COLUMNS: &str =
    "current_era, current_block, ztc_price_usd, total_staked, active_validators, last_updated";

/// Postgres LIMIT/OFFSET take BIGINT; saturate instead of wrapping.
fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn decode_error(msg: String) -> StorageError {
    StorageError::Database(sqlx::Error::Decode(msg.into()))
}

fn wallet_from_row(row: WalletRow) -> StorageResult<Wallet> {
    let (id, address, label, wallet_type, is_active, created_at, updated_at) = row;
    Ok(Wallet {
        id,
        address,
        label,
        wallet_type: WalletType::from_str(&wallet_type).map_err(decode_error)?,
        is_active,
        created_at,
        updated_at,
    })
}

fn balance_from_row(row: BalanceRow) -> WalletBalance {
    let (
        wallet_id,
        wallet_address,
        total_staking_rewards,
        total_validator_rewards,
        total_staking_rewards_usd,
        total_validator_rewards_usd,
        current_staked_amount,
        last_update_era,
        last_updated,
    ) = row;
    WalletBalance {
        wallet_id,
        wallet_address,
        total_staking_rewards,
        total_validator_rewards,
        total_staking_rewards_usd,
        total_validator_rewards_usd,
        current_staked_amount,
        last_update_era,
        last_updated,
    }
}

fn network_from_row(row: NetworkRow) -> NetworkStatus {
    let (current_era, current_block, ztc_price_usd, total_staked, active_validators, last_updated) =
        row;
    NetworkStatus {
        current_era,
        current_block,
        ztc_price_usd,
        total_staked,
        active_validators,
        last_updated,
    }
}

/// PostgreSQL-backed store. Multi-table writes run in one transaction and
/// cascades are declared on the foreign keys.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, run embedded migrations and return a ready store.
    pub async fn connect(config: &DatabaseConfig) -> eyre::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| eyre::eyre!("Failed to connect to database: {}", e))?;

        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| eyre::eyre!("Failed to run migrations: {}", e))?;

        tracing::info!("Database migrations complete");
        Ok(Self::new(pool))
    }

    async fn reward_points_since(
        &self,
        wallet_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<RewardPoint>> {
        let rows: Vec<(String, BigDecimal, DateTime<Utc>)> = sqlx::query_as(
            "SELECT reward_type, amount, timestamp FROM reward_entries
             WHERE ($1::TEXT IS NULL OR wallet_id = $1) AND timestamp >= $2",
        )
        .bind(wallet_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(reward_type, amount, timestamp)| {
                Ok(RewardPoint {
                    reward_type: RewardType::from_str(&reward_type).map_err(decode_error)?,
                    amount,
                    timestamp,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_wallet(&self, id: &str) -> StorageResult<Option<Wallet>> {
        let row: Option<WalletRow> =
            sqlx::query_as(&format!("SELECT {} FROM wallets WHERE id = $1", WALLET_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(wallet_from_row).transpose()
    }

    async fn get_wallet_by_address(&self, address: &str) -> StorageResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wallets WHERE LOWER(address) = LOWER($1)",
            WALLET_COLUMNS
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        row.map(wallet_from_row).transpose()
    }

    async fn list_wallets(&self) -> StorageResult<Vec<WalletWithBalance>> {
        let wallet_rows: Vec<WalletRow> =
            sqlx::query_as(&format!("SELECT {} FROM wallets", WALLET_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        let balance_rows: Vec<BalanceRow> =
            sqlx::query_as(&format!("SELECT {} FROM wallet_balances", BALANCE_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        let mut balances: HashMap<String, WalletBalance> = balance_rows
            .into_iter()
            .map(balance_from_row)
            .map(|b| (b.wallet_id.clone(), b))
            .collect();

        let mut wallets = Vec::with_capacity(wallet_rows.len());
        for row in wallet_rows {
            let wallet = wallet_from_row(row)?;
            let balance = balances.remove(&wallet.id);
            wallets.push(WalletWithBalance::new(wallet, balance));
        }

        aggregate::sort_by_total_rewards(&mut wallets);
        Ok(wallets)
    }

    async fn create_wallet(&self, wallet: NewWallet) -> StorageResult<Wallet> {
        let mut tx = self.pool.begin().await?;

        let inserted: Result<WalletRow, sqlx::Error> = sqlx::query_as(&format!(
            "INSERT INTO wallets (id, address, label, wallet_type, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
             RETURNING {}",
            WALLET_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&wallet.address)
        .bind(&wallet.label)
        .bind(wallet.wallet_type.as_str())
        .fetch_one(&mut *tx)
        .await;

        let row = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StorageError::DuplicateAddress(wallet.address));
            }
            Err(e) => return Err(e.into()),
        };
        let created = wallet_from_row(row)?;

        let era: Option<(i64,)> =
            sqlx::query_as("SELECT current_era FROM network_status WHERE id = 'zenchain'")
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            "INSERT INTO wallet_balances (wallet_id, wallet_address, last_update_era, last_updated)
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(&created.id)
        .bind(&created.address)
        .bind(era.map(|(e,)| e).unwrap_or(0))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_wallet(&self, id: &str, update: WalletUpdate) -> StorageResult<Option<Wallet>> {
        let row: Option<WalletRow> = sqlx::query_as(&format!(
            "UPDATE wallets
             SET label = COALESCE($2, label),
                 wallet_type = COALESCE($3, wallet_type),
                 is_active = COALESCE($4, is_active),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {}",
            WALLET_COLUMNS
        ))
        .bind(id)
        .bind(update.label)
        .bind(update.wallet_type.map(|t| t.as_str()))
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?;
        row.map(wallet_from_row).transpose()
    }

    async fn delete_wallet(&self, id: &str) -> StorageResult<bool> {
        // reward_entries and wallet_balances cascade
        let result = sqlx::query("DELETE FROM wallets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_reward_entry(&self, entry: NewRewardEntry) -> StorageResult<RewardEntry> {
        let id = Uuid::new_v4().to_string();
        let inserted: Result<(DateTime<Utc>,), sqlx::Error> = sqlx::query_as(
            "INSERT INTO reward_entries (id, wallet_id, wallet_address, reward_type, amount,
                 amount_usd, era, block_number, transaction_hash, timestamp, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
             RETURNING created_at",
        )
        .bind(&id)
        .bind(&entry.wallet_id)
        .bind(&entry.wallet_address)
        .bind(entry.reward_type.as_str())
        .bind(&entry.amount)
        .bind(&entry.amount_usd)
        .bind(entry.era)
        .bind(entry.block_number)
        .bind(&entry.transaction_hash)
        .bind(entry.timestamp)
        .fetch_one(&self.pool)
        .await;

        let (created_at,) = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                return Err(StorageError::WalletNotFound(entry.wallet_id));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(RewardEntry {
            id,
            wallet_id: entry.wallet_id,
            wallet_address: entry.wallet_address,
            reward_type: entry.reward_type,
            amount: entry.amount,
            amount_usd: entry.amount_usd,
            era: entry.era,
            block_number: entry.block_number,
            transaction_hash: entry.transaction_hash,
            timestamp: entry.timestamp,
            created_at,
        })
    }

    async fn has_reward_entry(
        &self,
        wallet_id: &str,
        transaction_hash: &str,
        reward_type: RewardType,
    ) -> StorageResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM reward_entries
                 WHERE wallet_id = $1 AND LOWER(transaction_hash) = LOWER($2) AND reward_type = $3
             )",
        )
        .bind(wallet_id)
        .bind(transaction_hash)
        .bind(reward_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn reward_history(&self, query: HistoryQuery) -> StorageResult<Vec<RewardHistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT r.id, r.wallet_address, COALESCE(w.label, 'Unknown Wallet'), r.reward_type,
                    r.amount, r.amount_usd, r.era, r.transaction_hash, r.timestamp
             FROM reward_entries r
             LEFT JOIN wallets w ON w.id = r.wallet_id
             WHERE ($1::TEXT IS NULL OR r.wallet_id = $1)
             ORDER BY r.timestamp DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(query.wallet_id.as_deref())
        .bind(sql_count(query.limit))
        .bind(sql_count(query.offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, wallet_address, wallet_label, reward_type, amount, amount_usd, era, tx, ts)| {
                    Ok(RewardHistoryEntry {
                        id,
                        wallet_address,
                        wallet_label,
                        reward_type: RewardType::from_str(&reward_type).map_err(decode_error)?,
                        amount: decimal_to_f64(&amount),
                        amount_usd: amount_usd.as_ref().map(decimal_to_f64),
                        era,
                        transaction_hash: tx,
                        timestamp: ts,
                    })
                },
            )
            .collect()
    }

    async fn rewards_by_timeframe(
        &self,
        wallet_id: &str,
        days: u32,
    ) -> StorageResult<Vec<ChartDataPoint>> {
        let now = Utc::now();
        let since = now - Duration::days(i64::from(days));
        let points = self.reward_points_since(Some(wallet_id), since).await?;
        Ok(aggregate::bucket_by_day(&points, days, now.date_naive()))
    }

    async fn get_wallet_balance(&self, wallet_id: &str) -> StorageResult<Option<WalletBalance>> {
        let row: Option<BalanceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM wallet_balances WHERE wallet_id = $1",
            BALANCE_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(balance_from_row))
    }

    async fn upsert_wallet_balance(
        &self,
        wallet_id: &str,
        snapshot: BalanceSnapshot,
    ) -> StorageResult<WalletBalance> {
        let row: Option<BalanceRow> = sqlx::query_as(&format!(
            "INSERT INTO wallet_balances ({cols})
             SELECT w.id, w.address, $2, $3, $4, $5, $6, $7, NOW() FROM wallets w WHERE w.id = $1
             ON CONFLICT (wallet_id) DO UPDATE
             SET total_staking_rewards = $2, total_validator_rewards = $3,
                 total_staking_rewards_usd = $4, total_validator_rewards_usd = $5,
                 current_staked_amount = $6, last_update_era = $7, last_updated = NOW()
             RETURNING {cols}",
            cols = BALANCE_COLUMNS
        ))
        .bind(wallet_id)
        .bind(&snapshot.total_staking_rewards)
        .bind(&snapshot.total_validator_rewards)
        .bind(&snapshot.total_staking_rewards_usd)
        .bind(&snapshot.total_validator_rewards_usd)
        .bind(&snapshot.current_staked_amount)
        .bind(snapshot.last_update_era)
        .fetch_optional(&self.pool)
        .await?;

        row.map(balance_from_row)
            .ok_or_else(|| StorageError::WalletNotFound(wallet_id.to_string()))
    }

    async fn dashboard_stats(&self) -> StorageResult<DashboardStats> {
        let now = Utc::now();

        let (total_wallets, active_wallets): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM wallets")
                .fetch_one(&self.pool)
                .await?;

        let (total_rewards, total_rewards_usd): (BigDecimal, BigDecimal) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_staking_rewards + total_validator_rewards), 0),
                    COALESCE(SUM(total_staking_rewards_usd + total_validator_rewards_usd), 0)
             FROM wallet_balances",
        )
        .fetch_one(&self.pool)
        .await?;

        let recent = self
            .reward_points_since(None, now - Duration::hours(48))
            .await?;

        Ok(DashboardStats {
            total_wallets,
            active_wallets,
            total_rewards: decimal_to_f64(&total_rewards),
            total_rewards_usd: decimal_to_f64(&total_rewards_usd),
            reward_change_24h: aggregate::reward_change_24h(&recent, now),
            last_update_time: now,
        })
    }

    async fn get_network_status(&self) -> StorageResult<NetworkStatus> {
        let row: Option<NetworkRow> = sqlx::query_as(&format!(
            "SELECT {} FROM network_status WHERE id = 'zenchain'",
            NETWORK_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(network_from_row).unwrap_or_default())
    }

    async fn update_network_status(
        &self,
        update: NetworkStatusUpdate,
    ) -> StorageResult<NetworkStatus> {
        let row: NetworkRow = sqlx::query_as(&format!(
            "INSERT INTO network_status (id, current_era, current_block, ztc_price_usd,
                 total_staked, active_validators, last_updated)
             VALUES ('zenchain', COALESCE($1, 0), COALESCE($2, 0), COALESCE($3, 0),
                 COALESCE($4, 0), COALESCE($5, 0), NOW())
             ON CONFLICT (id) DO UPDATE
             SET current_era = COALESCE($1, network_status.current_era),
                 current_block = COALESCE($2, network_status.current_block),
                 ztc_price_usd = COALESCE($3, network_status.ztc_price_usd),
                 total_staked = COALESCE($4, network_status.total_staked),
                 active_validators = COALESCE($5, network_status.active_validators),
                 last_updated = NOW()
             RETURNING {}",
            NETWORK_COLUMNS
        ))
        .bind(update.current_era)
        .bind(update.current_block)
        .bind(update.ztc_price_usd)
        .bind(update.total_staked)
        .bind(update.active_validators)
        .fetch_one(&self.pool)
        .await?;
        Ok(network_from_row(row))
    }
}
