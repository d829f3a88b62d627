use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::aggregate::decimal_to_f64;

// ============================================================
// Enums
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Staking,
    Validator,
    Both,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Staking => "staking",
            WalletType::Validator => "validator",
            WalletType::Both => "both",
        }
    }
}

impl FromStr for WalletType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staking" => Ok(WalletType::Staking),
            "validator" => Ok(WalletType::Validator),
            "both" => Ok(WalletType::Both),
            other => Err(format!("Unknown wallet type '{}'", other)),
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Staking,
    Validator,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Staking => "staking",
            RewardType::Validator => "validator",
        }
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staking" => Ok(RewardType::Staking),
            "validator" => Ok(RewardType::Validator),
            other => Err(format!("Unknown reward type '{}'", other)),
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// Stored entities
// ============================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub address: String,
    pub label: String,
    pub wallet_type: WalletType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One reward event credited to a tracked wallet. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEntry {
    pub id: String,
    pub wallet_id: String,
    pub wallet_address: String,
    pub reward_type: RewardType,
    pub amount: BigDecimal,
    pub amount_usd: Option<BigDecimal>,
    pub era: i64,
    pub block_number: i64,
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Rolling per-wallet snapshot, overwritten on every sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub wallet_id: String,
    pub wallet_address: String,
    pub total_staking_rewards: BigDecimal,
    pub total_validator_rewards: BigDecimal,
    pub total_staking_rewards_usd: BigDecimal,
    pub total_validator_rewards_usd: BigDecimal,
    pub current_staked_amount: BigDecimal,
    pub last_update_era: i64,
    pub last_updated: DateTime<Utc>,
}

impl WalletBalance {
    /// All-zero snapshot created alongside a new wallet.
    pub fn empty(wallet: &Wallet, era: i64) -> Self {
        Self {
            wallet_id: wallet.id.clone(),
            wallet_address: wallet.address.clone(),
            total_staking_rewards: BigDecimal::from(0),
            total_validator_rewards: BigDecimal::from(0),
            total_staking_rewards_usd: BigDecimal::from(0),
            total_validator_rewards_usd: BigDecimal::from(0),
            current_staked_amount: BigDecimal::from(0),
            last_update_era: era,
            last_updated: Utc::now(),
        }
    }

    pub fn total_rewards(&self) -> BigDecimal {
        &self.total_staking_rewards + &self.total_validator_rewards
    }

    pub fn total_rewards_usd(&self) -> BigDecimal {
        &self.total_staking_rewards_usd + &self.total_validator_rewards_usd
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub current_era: i64,
    pub current_block: i64,
    pub ztc_price_usd: BigDecimal,
    pub total_staked: BigDecimal,
    pub active_validators: i64,
    pub last_updated: DateTime<Utc>,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        Self {
            current_era: 0,
            current_block: 0,
            ztc_price_usd: BigDecimal::from(0),
            total_staked: BigDecimal::from(0),
            active_validators: 0,
            last_updated: Utc::now(),
        }
    }
}

// ============================================================
// Inputs
// ============================================================

#[derive(Debug, Clone)]
pub struct NewWallet {
    pub address: String,
    pub label: String,
    pub wallet_type: WalletType,
}

/// Partial wallet update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct WalletUpdate {
    pub label: Option<String>,
    pub wallet_type: Option<WalletType>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewRewardEntry {
    pub wallet_id: String,
    pub wallet_address: String,
    pub reward_type: RewardType,
    pub amount: BigDecimal,
    pub amount_usd: Option<BigDecimal>,
    pub era: i64,
    pub block_number: i64,
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Full replacement for a wallet's balance snapshot.
#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    pub total_staking_rewards: BigDecimal,
    pub total_validator_rewards: BigDecimal,
    pub total_staking_rewards_usd: BigDecimal,
    pub total_validator_rewards_usd: BigDecimal,
    pub current_staked_amount: BigDecimal,
    pub last_update_era: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStatusUpdate {
    pub current_era: Option<i64>,
    pub current_block: Option<i64>,
    pub ztc_price_usd: Option<BigDecimal>,
    pub total_staked: Option<BigDecimal>,
    pub active_validators: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub wallet_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            wallet_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

// ============================================================
// Read-side views
// ============================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletWithBalance {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub balance: Option<WalletBalance>,
    pub total_rewards: f64,
    pub total_rewards_usd: f64,
    pub is_connected: bool,
}

impl WalletWithBalance {
    pub fn new(wallet: Wallet, balance: Option<WalletBalance>) -> Self {
        let (total_rewards, total_rewards_usd) = balance
            .as_ref()
            .map(|b| {
                (
                    decimal_to_f64(&b.total_rewards()),
                    decimal_to_f64(&b.total_rewards_usd()),
                )
            })
            .unwrap_or((0.0, 0.0));
        let is_connected = wallet.is_active;

        Self {
            wallet,
            balance,
            total_rewards,
            total_rewards_usd,
            is_connected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardHistoryEntry {
    pub id: String,
    pub wallet_address: String,
    pub wallet_label: String,
    pub reward_type: RewardType,
    pub amount: f64,
    pub amount_usd: Option<f64>,
    pub era: i64,
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataPoint {
    pub date: String,
    pub staking_rewards: f64,
    pub validator_rewards: f64,
    pub total_rewards: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_wallets: i64,
    pub active_wallets: i64,
    pub total_rewards: f64,
    pub total_rewards_usd: f64,
    pub reward_change_24h: f64,
    pub last_update_time: DateTime<Utc>,
}

/// Minimal projection of a reward entry used by the aggregations.
#[derive(Debug, Clone)]
pub struct RewardPoint {
    pub reward_type: RewardType,
    pub amount: BigDecimal,
    pub timestamp: DateTime<Utc>,
}

impl From<&RewardEntry> for RewardPoint {
    fn from(entry: &RewardEntry) -> Self {
        Self {
            reward_type: entry.reward_type,
            amount: entry.amount.clone(),
            timestamp: entry.timestamp,
        }
    }
}
