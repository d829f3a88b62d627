use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ztc_reward_tracker::api::{self, AppState};
use ztc_reward_tracker::chain::{ChainService, ZenchainClient};
use ztc_reward_tracker::config::{Config, LogFormat};
use ztc_reward_tracker::storage::{MemStorage, PgStorage, Storage};
use ztc_reward_tracker::sync::{Poller, SyncQueue};

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Load configuration before logging so the output format is known
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    init_logging(config.logging.format);
    tracing::info!("ZTC reward tracker starting");
    tracing::info!(
        rpc = %config.chain.rpc_http,
        chain_id = config.chain.chain_id,
        "Configuration loaded from {}",
        config_path
    );

    let storage: Arc<dyn Storage> = match &config.database {
        Some(db) => Arc::new(PgStorage::connect(db).await?),
        None => {
            tracing::warn!("No [database] configured, using in-memory storage");
            Arc::new(MemStorage::new())
        }
    };

    let chain: Arc<dyn ChainService> = Arc::new(ZenchainClient::new(&config.chain, &config.price)?);

    // Create shutdown signal
    let shutdown = CancellationToken::new();

    let (sync, worker) = SyncQueue::spawn(storage.clone(), chain.clone(), shutdown.clone());
    let mut handles = vec![worker];

    if config.sync.poll_interval_secs > 0 {
        let poller = Poller::new(
            storage.clone(),
            chain.clone(),
            sync.clone(),
            Duration::from_secs(config.sync.poll_interval_secs),
        );
        handles.push(tokio::spawn(poller.run(shutdown.clone())));
    } else {
        tracing::info!("Periodic polling disabled");
    }

    // Spawn API server
    {
        let state = AppState {
            storage,
            chain,
            sync,
        };
        let host = config.api.host.clone();
        let port = config.api.port;
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = api::serve(state, &host, port, shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        }));
    }

    tracing::info!("Tracker running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping background tasks...");
    shutdown.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("ZTC reward tracker stopped gracefully");
    Ok(())
}
