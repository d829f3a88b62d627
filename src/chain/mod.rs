pub mod price;
pub mod zenchain;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::storage::RewardType;

pub use price::PriceFeed;
pub use zenchain::ZenchainClient;

/// Live chain head as seen by the RPC endpoint.
#[derive(Debug, Clone)]
pub struct ChainNetworkStatus {
    pub current_era: i64,
    pub current_block: i64,
    pub block_timestamp: DateTime<Utc>,
    pub chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct StakingInfo {
    pub staking_amount: BigDecimal,
    pub rewards: BigDecimal,
    pub era: i64,
}

#[derive(Debug, Clone)]
pub struct ValidatorInfo {
    pub rewards: BigDecimal,
    pub era: i64,
}

/// A reward credited on chain, normalized to ZTC.
#[derive(Debug, Clone)]
pub struct RewardEvent {
    pub reward_type: RewardType,
    pub era: i64,
    pub amount: BigDecimal,
    pub block_number: i64,
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// External collaborator producing reward data for an address.
#[async_trait]
pub trait ChainService: Send + Sync {
    async fn network_status(&self) -> eyre::Result<ChainNetworkStatus>;

    async fn staking_info(&self, address: Address) -> eyre::Result<StakingInfo>;

    async fn validator_info(&self, address: Address) -> eyre::Result<ValidatorInfo>;

    /// Reward events over the configured lookback window, newest block first.
    /// Event query failures yield the events collected so far rather than an error.
    async fn reward_history(&self, address: Address) -> eyre::Result<Vec<RewardEvent>>;

    /// ZTC price in USD.
    async fn ztc_price(&self) -> eyre::Result<f64>;
}

pub fn era_for_block(block_number: u64, era_length_blocks: u64) -> u64 {
    block_number / era_length_blocks
}

/// Convert an 18-decimal wei amount to ZTC.
pub fn wei_to_ztc(value: U256) -> BigDecimal {
    BigDecimal::from_str(&format!("{}e-18", value))
        .map(|d| d.normalized())
        .unwrap_or_default()
}

/// Parse a hex address as the chain client would accept it.
pub fn parse_address(address: &str) -> Option<Address> {
    Address::from_str(address).ok()
}

/// EIP-55 mixed-case form of a valid address.
pub fn checksum_address(address: &str) -> Option<String> {
    parse_address(address).map(|a| a.to_checksum(None))
}
