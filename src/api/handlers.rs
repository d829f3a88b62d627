use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use super::error::ApiError;
use super::types::*;
use super::AppState;
use crate::chain;
use crate::storage::aggregate::price_to_decimal;
use crate::storage::{
    ChartDataPoint, HistoryQuery, NetworkStatusUpdate, NewWallet, RewardHistoryEntry, Wallet,
    WalletUpdate, WalletWithBalance,
};
use crate::sync::{self, SyncOutcome};

type ApiResult<T> = Result<T, ApiError>;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 1000;
const DEFAULT_TIMEFRAME_DAYS: u32 = 30;
const MAX_TIMEFRAME_DAYS: u32 = 365;
const EXPORT_ROW_LIMIT: usize = 1000;

fn body_error(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
}

// ============================================================
// Dashboard
// ============================================================

pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<DashboardResponse>> {
    let stats = state.storage.dashboard_stats().await?;
    let network = state.storage.get_network_status().await?;
    Ok(Json(DashboardResponse { stats, network }))
}

// ============================================================
// Wallets
// ============================================================

pub async fn list_wallets(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<WalletWithBalance>>> {
    Ok(Json(state.storage.list_wallets().await?))
}

pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<WalletWithBalance>> {
    let wallet = state
        .storage
        .get_wallet(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wallet not found"))?;
    let balance = state.storage.get_wallet_balance(&id).await?;
    Ok(Json(WalletWithBalance::new(wallet, balance)))
}

pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateWalletRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Wallet>)> {
    let Json(request) = payload.map_err(body_error)?;
    let valid = request.validate().map_err(ApiError::validation)?;

    if state.storage.get_wallet_by_address(&valid.address).await?.is_some() {
        return Err(ApiError::conflict("Wallet address already exists"));
    }

    let address = chain::checksum_address(&valid.address)
        .ok_or_else(|| ApiError::bad_request("Invalid wallet address format"))?;

    let wallet = state
        .storage
        .create_wallet(NewWallet {
            address,
            label: valid.label,
            wallet_type: valid.wallet_type,
        })
        .await?;

    tracing::info!(wallet_id = %wallet.id, address = %wallet.address, "Wallet added");
    state.sync.submit(&wallet.id, &wallet.address);

    Ok((StatusCode::CREATED, Json(wallet)))
}

pub async fn update_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateWalletRequest>, JsonRejection>,
) -> ApiResult<Json<Wallet>> {
    let Json(request) = payload.map_err(body_error)?;
    let wallet_type = request.validate().map_err(ApiError::validation)?;

    state
        .storage
        .update_wallet(
            &id,
            WalletUpdate {
                label: request.label,
                wallet_type,
                is_active: request.is_active,
            },
        )
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Wallet not found"))
}

pub async fn delete_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    if !state.storage.delete_wallet(&id).await? {
        return Err(ApiError::not_found("Wallet not found"));
    }
    tracing::info!(wallet_id = %id, "Wallet deleted");
    Ok(Json(DeleteResponse { success: true }))
}

pub async fn sync_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SyncResponse>> {
    let wallet = state
        .storage
        .get_wallet(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Wallet not found"))?;

    let report =
        sync::sync_wallet(state.storage.as_ref(), state.chain.as_ref(), &wallet.id, &wallet.address).await;

    if let SyncOutcome::Failed { error } = &report.outcome {
        return Err(ApiError::internal("Failed to sync wallet data", error));
    }

    Ok(Json(SyncResponse {
        success: true,
        message: "Sync completed".to_string(),
        report,
    }))
}

// ============================================================
// Rewards
// ============================================================

pub async fn reward_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<RewardHistoryEntry>>> {
    let query = HistoryQuery {
        wallet_id: params.wallet_id,
        limit: params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT),
        offset: params.offset.unwrap_or(0),
    };
    Ok(Json(state.storage.reward_history(query).await?))
}

pub async fn reward_chart(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<String>,
    Query(params): Query<ChartParams>,
) -> ApiResult<Json<Vec<ChartDataPoint>>> {
    let days = params.timeframe.unwrap_or(DEFAULT_TIMEFRAME_DAYS);
    if !(1..=MAX_TIMEFRAME_DAYS).contains(&days) {
        return Err(ApiError::bad_request(format!(
            "timeframe must be between 1 and {} days",
            MAX_TIMEFRAME_DAYS
        )));
    }
    Ok(Json(state.storage.rewards_by_timeframe(&wallet_id, days).await?))
}

pub async fn export_rewards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> ApiResult<impl IntoResponse> {
    let rewards = state
        .storage
        .reward_history(HistoryQuery {
            wallet_id: params.wallet_id,
            limit: EXPORT_ROW_LIMIT,
            offset: 0,
        })
        .await?;

    let csv = rewards_csv(&rewards).map_err(|e| ApiError::internal("Failed to export rewards", e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=zenchain-rewards.csv",
            ),
        ],
        csv,
    ))
}

pub fn rewards_csv(rewards: &[RewardHistoryEntry]) -> eyre::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Date",
        "Wallet",
        "Type",
        "Amount",
        "Amount USD",
        "Era",
        "Transaction Hash",
    ])?;

    for reward in rewards {
        writer.write_record([
            reward.timestamp.to_rfc3339(),
            reward.wallet_label.clone(),
            reward.reward_type.to_string(),
            reward.amount.to_string(),
            reward.amount_usd.unwrap_or(0.0).to_string(),
            reward.era.to_string(),
            reward.transaction_hash.clone(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| eyre::eyre!("Failed to flush CSV writer: {}", e))?;
    Ok(String::from_utf8(bytes)?)
}

// ============================================================
// Network
// ============================================================

pub async fn network_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<NetworkStatusResponse>> {
    let status = state
        .chain
        .network_status()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch network status", e))?;
    let ztc_price = state
        .chain
        .ztc_price()
        .await
        .map_err(|e| ApiError::internal("Failed to fetch network status", e))?;

    state
        .storage
        .update_network_status(NetworkStatusUpdate {
            current_era: Some(status.current_era),
            current_block: Some(status.current_block),
            ztc_price_usd: Some(price_to_decimal(ztc_price)),
            ..Default::default()
        })
        .await?;

    Ok(Json(NetworkStatusResponse {
        current_era: status.current_era,
        current_block: status.current_block,
        block_timestamp: status.block_timestamp,
        chain_id: status.chain_id,
        ztc_price,
    }))
}
