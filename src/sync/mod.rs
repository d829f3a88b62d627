pub mod poller;
pub mod queue;

use serde::Serialize;

use crate::chain::{self, ChainService};
use crate::storage::aggregate::{price_to_decimal, usd_value};
use crate::storage::{BalanceSnapshot, NewRewardEntry, Storage};

pub use poller::Poller;
pub use queue::SyncQueue;

/// Outcome of one wallet sync, published on the queue's report channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub wallet_id: String,
    pub address: String,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcome {
    #[serde(rename_all = "camelCase")]
    Completed {
        rewards_added: usize,
        rewards_skipped: usize,
    },
    Failed { error: String },
}

impl SyncReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Completed { .. })
    }
}

/// Pull the latest chain data for one wallet into storage.
///
/// Overwrites the balance snapshot and appends reward entries not already
/// stored. Never returns an error: failures are logged and carried in the
/// report.
pub async fn sync_wallet(
    storage: &dyn Storage,
    chain: &dyn ChainService,
    wallet_id: &str,
    address: &str,
) -> SyncReport {
    let outcome = match run_sync(storage, chain, wallet_id, address).await {
        Ok((added, skipped)) => {
            tracing::info!(
                wallet_id = %wallet_id,
                address = %address,
                rewards_added = added,
                rewards_skipped = skipped,
                "Wallet synced"
            );
            SyncOutcome::Completed {
                rewards_added: added,
                rewards_skipped: skipped,
            }
        }
        Err(e) => {
            tracing::error!(
                wallet_id = %wallet_id,
                address = %address,
                error = %e,
                "Wallet sync failed"
            );
            SyncOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    SyncReport {
        wallet_id: wallet_id.to_string(),
        address: address.to_string(),
        outcome,
    }
}

async fn run_sync(
    storage: &dyn Storage,
    chain: &dyn ChainService,
    wallet_id: &str,
    address: &str,
) -> eyre::Result<(usize, usize)> {
    let parsed = chain::parse_address(address)
        .ok_or_else(|| eyre::eyre!("Invalid wallet address '{}'", address))?;

    let (staking, validator, history) = futures::future::try_join3(
        chain.staking_info(parsed),
        chain.validator_info(parsed),
        chain.reward_history(parsed),
    )
    .await?;
    let price = chain.ztc_price().await?;
    let price_dec = price_to_decimal(price);

    let snapshot = BalanceSnapshot {
        total_staking_rewards_usd: usd_value(&staking.rewards, &price_dec),
        total_validator_rewards_usd: usd_value(&validator.rewards, &price_dec),
        total_staking_rewards: staking.rewards,
        total_validator_rewards: validator.rewards,
        current_staked_amount: staking.staking_amount,
        last_update_era: staking.era,
    };
    storage.upsert_wallet_balance(wallet_id, snapshot).await?;

    let mut added = 0;
    let mut skipped = 0;
    for event in history {
        if storage
            .has_reward_entry(wallet_id, &event.transaction_hash, event.reward_type)
            .await?
        {
            skipped += 1;
            continue;
        }

        storage
            .add_reward_entry(NewRewardEntry {
                wallet_id: wallet_id.to_string(),
                wallet_address: address.to_string(),
                reward_type: event.reward_type,
                amount_usd: Some(usd_value(&event.amount, &price_dec)),
                amount: event.amount,
                era: event.era,
                block_number: event.block_number,
                transaction_hash: event.transaction_hash,
                timestamp: event.timestamp,
            })
            .await?;
        added += 1;
    }

    Ok((added, skipped))
}
