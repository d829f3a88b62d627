use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Absent means the in-memory store is used.
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

// ============================================================
// Chain Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_http")]
    pub rpc_http: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_staking_address")]
    pub staking_address: String,
    #[serde(default = "default_era_length_blocks")]
    pub era_length_blocks: u64,
    #[serde(default = "default_reward_lookback_blocks")]
    pub reward_lookback_blocks: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_http: default_rpc_http(),
            chain_id: default_chain_id(),
            staking_address: default_staking_address(),
            era_length_blocks: default_era_length_blocks(),
            reward_lookback_blocks: default_reward_lookback_blocks(),
        }
    }
}

fn default_rpc_http() -> String {
    "https://zenchain-testnet.api.onfinality.io/public".to_string()
}

fn default_chain_id() -> u64 {
    8408
}

fn default_staking_address() -> String {
    "0x0000000000000000000000000000000000000800".to_string()
}

fn default_era_length_blocks() -> u64 {
    3600
}

fn default_reward_lookback_blocks() -> u64 {
    10_000
}

// ============================================================
// Price Feed Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct PriceConfig {
    #[serde(default = "default_price_url")]
    pub url: String,
    #[serde(default = "default_coin_id")]
    pub coin_id: String,
    #[serde(default = "default_fallback_usd")]
    pub fallback_usd: f64,
    #[serde(default = "default_price_timeout")]
    pub timeout_secs: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            url: default_price_url(),
            coin_id: default_coin_id(),
            fallback_usd: default_fallback_usd(),
            timeout_secs: default_price_timeout(),
        }
    }
}

fn default_price_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price".to_string()
}

fn default_coin_id() -> String {
    "zenchain".to_string()
}

fn default_fallback_usd() -> f64 {
    0.45
}

fn default_price_timeout() -> u64 {
    10
}

// ============================================================
// Sync Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Seconds between poller sweeps; 0 disables the poller.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    600
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
            host: default_api_host(),
        }
    }
}

fn default_api_port() -> u16 {
    5000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

// ============================================================
// Logging Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.chain.era_length_blocks == 0 {
            return Err(eyre::eyre!("chain.era_length_blocks must be greater than zero"));
        }
        let staking = &self.chain.staking_address;
        if !staking.starts_with("0x") || staking.len() != 42 {
            return Err(eyre::eyre!(
                "Invalid staking precompile address '{}'",
                staking
            ));
        }
        if self.price.fallback_usd < 0.0 {
            return Err(eyre::eyre!("price.fallback_usd must not be negative"));
        }
        if let Some(db) = &self.database {
            if db.url.is_empty() {
                return Err(eyre::eyre!("database.url must not be empty"));
            }
        }
        Ok(())
    }
}
