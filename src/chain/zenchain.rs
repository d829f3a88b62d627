use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use super::price::PriceFeed;
use super::{
    era_for_block, wei_to_ztc, ChainNetworkStatus, ChainService, RewardEvent, StakingInfo,
    ValidatorInfo,
};
use crate::config::{ChainConfig, PriceConfig};
use crate::storage::RewardType;

// Native staking precompile, reduced to the calls and events the tracker reads.
sol! {
    #[sol(rpc)]
    interface NativeStaking {
        function ledger(address stash) external view returns (uint256 active, uint256 total, uint256[] unlocking, uint256 claimedRewards);
        function validators(address stash) external view returns (uint256 commission, bool blocked);
        function erasValidatorReward(uint32 era, address validator) external view returns (uint256);

        event Rewarded(address indexed stash, uint256 amount);
        event PayoutStarted(uint32 indexed era, address indexed validator);
    }
}

/// A staking precompile log decoded before block timestamps are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReward {
    pub reward_type: RewardType,
    pub beneficiary: Address,
    /// Only `Rewarded` carries an amount; payouts are priced separately.
    pub amount: Option<U256>,
    /// Only `PayoutStarted` names its era explicitly.
    pub era: Option<u64>,
    pub block_number: u64,
    pub tx_hash: B256,
}

/// Attempt to decode a staking precompile log.
///
/// Returns `None` if the topic layout matches neither reward event or the
/// payload is malformed.
pub fn decode_reward_log(log: &Log) -> Option<DecodedReward> {
    let topics = log.inner.data.topics();
    let signature = *topics.first()?;
    let block_number = log.block_number.unwrap_or(0);
    let tx_hash = log.transaction_hash.unwrap_or_default();

    if signature == NativeStaking::Rewarded::SIGNATURE_HASH {
        if topics.len() != 2 {
            return None;
        }
        let data = log.inner.data.data.as_ref();
        if data.len() < 32 {
            return None;
        }
        return Some(DecodedReward {
            reward_type: RewardType::Staking,
            beneficiary: Address::from_word(topics[1]),
            amount: Some(U256::from_be_slice(&data[..32])),
            era: None,
            block_number,
            tx_hash,
        });
    }

    if signature == NativeStaking::PayoutStarted::SIGNATURE_HASH {
        if topics.len() != 3 {
            return None;
        }
        let era = u64::try_from(U256::from_be_slice(topics[1].as_slice())).ok()?;
        return Some(DecodedReward {
            reward_type: RewardType::Validator,
            beneficiary: Address::from_word(topics[2]),
            amount: None,
            era: Some(era),
            block_number,
            tx_hash,
        });
    }

    None
}

/// Zenchain JSON-RPC adapter backed by an alloy HTTP provider.
pub struct ZenchainClient {
    provider: DynProvider,
    staking_address: Address,
    chain_id: u64,
    era_length_blocks: u64,
    reward_lookback_blocks: u64,
    price_feed: PriceFeed,
}

impl ZenchainClient {
    pub fn new(chain: &ChainConfig, price: &PriceConfig) -> eyre::Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(chain.rpc_http.parse().map_err(|e| eyre::eyre!("Invalid RPC URL: {}", e))?)
            .erased();

        let staking_address = Address::from_str(&chain.staking_address)
            .map_err(|e| eyre::eyre!("Invalid staking address '{}': {}", chain.staking_address, e))?;

        Ok(Self {
            provider,
            staking_address,
            chain_id: chain.chain_id,
            era_length_blocks: chain.era_length_blocks,
            reward_lookback_blocks: chain.reward_lookback_blocks,
            price_feed: PriceFeed::new(price)?,
        })
    }

    fn staking(&self) -> NativeStaking::NativeStakingInstance<DynProvider> {
        NativeStaking::new(self.staking_address, self.provider.clone())
    }

    async fn current_era(&self) -> eyre::Result<u64> {
        let block = self.provider.get_block_number().await?;
        Ok(era_for_block(block, self.era_length_blocks))
    }

    async fn block_timestamp(
        &self,
        block_number: u64,
        cache: &mut HashMap<u64, DateTime<Utc>>,
    ) -> eyre::Result<DateTime<Utc>> {
        if let Some(ts) = cache.get(&block_number) {
            return Ok(*ts);
        }

        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await?;
        let ts = block
            .and_then(|b| DateTime::from_timestamp(b.header.timestamp as i64, 0))
            .unwrap_or_default();
        cache.insert(block_number, ts);
        Ok(ts)
    }

    async fn payout_amount(&self, era: u64, validator: Address) -> BigDecimal {
        let Ok(era32) = u32::try_from(era) else {
            return BigDecimal::from(0);
        };
        match self.staking().erasValidatorReward(era32, validator).call().await {
            Ok(value) => wei_to_ztc(value),
            Err(e) => {
                tracing::debug!(%validator, era, error = %e, "No validator reward recorded for era");
                BigDecimal::from(0)
            }
        }
    }

    /// Push reward events for `address` over the lookback window into `out`.
    /// On error, `out` keeps every event decoded before the failure.
    async fn collect_rewards(&self, address: Address, out: &mut Vec<RewardEvent>) -> eyre::Result<()> {
        let current = self.provider.get_block_number().await?;
        let from_block = current.saturating_sub(self.reward_lookback_blocks);

        let staking_filter = Filter::new()
            .address(self.staking_address)
            .event_signature(NativeStaking::Rewarded::SIGNATURE_HASH)
            .topic1(address.into_word())
            .from_block(from_block)
            .to_block(current);

        let payout_filter = Filter::new()
            .address(self.staking_address)
            .event_signature(NativeStaking::PayoutStarted::SIGNATURE_HASH)
            .topic2(address.into_word())
            .from_block(from_block)
            .to_block(current);

        let mut logs = Vec::new();
        for filter in [&staking_filter, &payout_filter] {
            match self.provider.get_logs(filter).await {
                Ok(batch) => logs.extend(batch),
                Err(e) => {
                    tracing::warn!(%address, from_block, to_block = current, error = %e, "Failed to fetch reward logs");
                }
            }
        }

        tracing::debug!(
            %address,
            from_block,
            to_block = current,
            logs = logs.len(),
            "Fetched reward logs"
        );

        let mut block_times: HashMap<u64, DateTime<Utc>> = HashMap::new();

        for log in &logs {
            let Some(decoded) = decode_reward_log(log) else {
                continue;
            };
            if decoded.beneficiary != address {
                continue;
            }

            let timestamp = self.block_timestamp(decoded.block_number, &mut block_times).await?;
            let era = decoded
                .era
                .unwrap_or_else(|| era_for_block(decoded.block_number, self.era_length_blocks));
            let amount = match decoded.amount {
                Some(value) => wei_to_ztc(value),
                None => self.payout_amount(era, address).await,
            };

            out.push(RewardEvent {
                reward_type: decoded.reward_type,
                era: era as i64,
                amount,
                block_number: decoded.block_number as i64,
                transaction_hash: decoded.tx_hash.to_string(),
                timestamp,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ChainService for ZenchainClient {
    async fn network_status(&self) -> eyre::Result<ChainNetworkStatus> {
        let current_block = self.provider.get_block_number().await?;
        let mut cache = HashMap::new();
        let block_timestamp = self.block_timestamp(current_block, &mut cache).await?;

        Ok(ChainNetworkStatus {
            current_era: era_for_block(current_block, self.era_length_blocks) as i64,
            current_block: current_block as i64,
            block_timestamp,
            chain_id: self.chain_id,
        })
    }

    async fn staking_info(&self, address: Address) -> eyre::Result<StakingInfo> {
        let era = self.current_era().await? as i64;

        match self.staking().ledger(address).call().await {
            Ok(ledger) => Ok(StakingInfo {
                staking_amount: wei_to_ztc(ledger.active),
                rewards: wei_to_ztc(ledger.claimedRewards),
                era,
            }),
            Err(e) => {
                // A reverted ledger lookup means the address is not bonded
                tracing::debug!(%address, error = %e, "No staking ledger for address");
                Ok(StakingInfo {
                    staking_amount: BigDecimal::from(0),
                    rewards: BigDecimal::from(0),
                    era,
                })
            }
        }
    }

    async fn validator_info(&self, address: Address) -> eyre::Result<ValidatorInfo> {
        let era = self.current_era().await?;

        if let Err(e) = self.staking().validators(address).call().await {
            tracing::debug!(%address, error = %e, "Address is not a validator");
            return Ok(ValidatorInfo {
                rewards: BigDecimal::from(0),
                era: era as i64,
            });
        }

        let rewards = self.payout_amount(era.saturating_sub(1), address).await;

        Ok(ValidatorInfo {
            rewards,
            era: era as i64,
        })
    }

    async fn reward_history(&self, address: Address) -> eyre::Result<Vec<RewardEvent>> {
        let mut rewards = Vec::new();

        // A failing log query must not block the balance update; keep what was collected
        if let Err(e) = self.collect_rewards(address, &mut rewards).await {
            tracing::warn!(
                %address,
                collected = rewards.len(),
                error = %e,
                "Reward event query failed, returning partial history"
            );
        }

        rewards.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        Ok(rewards)
    }

    async fn ztc_price(&self) -> eyre::Result<f64> {
        Ok(self.price_feed.ztc_price().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData};

    fn rpc_log(topics: Vec<B256>, data: Vec<u8>, block: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::with_last_byte(0x08),
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            block_number: Some(block),
            transaction_hash: Some(B256::repeat_byte(0xab)),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_rewarded_log() {
        let stash = Address::repeat_byte(0x11);
        let amount = U256::from(2_000_000_000_000_000_000u128);
        let log = rpc_log(
            vec![NativeStaking::Rewarded::SIGNATURE_HASH, stash.into_word()],
            amount.to_be_bytes::<32>().to_vec(),
            7_200,
        );

        let decoded = decode_reward_log(&log).unwrap();
        assert_eq!(decoded.reward_type, RewardType::Staking);
        assert_eq!(decoded.beneficiary, stash);
        assert_eq!(decoded.amount, Some(amount));
        assert_eq!(decoded.era, None);
        assert_eq!(decoded.block_number, 7_200);
        assert_eq!(decoded.tx_hash, B256::repeat_byte(0xab));
    }

    #[test]
    fn test_decode_payout_started_log() {
        let validator = Address::repeat_byte(0x22);
        let era_topic = B256::left_padding_from(&41u64.to_be_bytes());
        let log = rpc_log(
            vec![
                NativeStaking::PayoutStarted::SIGNATURE_HASH,
                era_topic,
                validator.into_word(),
            ],
            Vec::new(),
            150_000,
        );

        let decoded = decode_reward_log(&log).unwrap();
        assert_eq!(decoded.reward_type, RewardType::Validator);
        assert_eq!(decoded.beneficiary, validator);
        assert_eq!(decoded.era, Some(41));
        assert_eq!(decoded.amount, None);
    }

    #[test]
    fn test_decode_rejects_unknown_or_malformed_logs() {
        let stash = Address::repeat_byte(0x11);

        let unknown = rpc_log(vec![B256::repeat_byte(0x01)], vec![0u8; 32], 1);
        assert!(decode_reward_log(&unknown).is_none());

        let short_data = rpc_log(
            vec![NativeStaking::Rewarded::SIGNATURE_HASH, stash.into_word()],
            vec![0u8; 16],
            1,
        );
        assert!(decode_reward_log(&short_data).is_none());

        let no_topics = rpc_log(Vec::new(), Vec::new(), 1);
        assert!(decode_reward_log(&no_topics).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_rpc_yields_empty_reward_history() {
        let chain = ChainConfig {
            rpc_http: "http://127.0.0.1:9".to_string(),
            ..ChainConfig::default()
        };
        let price = PriceConfig {
            timeout_secs: 1,
            ..PriceConfig::default()
        };
        let client = ZenchainClient::new(&chain, &price).unwrap();

        let history = client
            .reward_history(Address::repeat_byte(0x11))
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_client_rejects_bad_rpc_url() {
        let chain = ChainConfig {
            rpc_http: "not a url".to_string(),
            ..ChainConfig::default()
        };
        assert!(ZenchainClient::new(&chain, &PriceConfig::default()).is_err());
    }
}
