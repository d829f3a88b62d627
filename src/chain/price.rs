use std::time::Duration;

use crate::config::PriceConfig;

/// CoinGecko-style `simple/price` client. Never fails: any upstream problem
/// yields the configured fallback price.
pub struct PriceFeed {
    client: reqwest::Client,
    url: String,
    coin_id: String,
    fallback_usd: f64,
}

impl PriceFeed {
    pub fn new(config: &PriceConfig) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| eyre::eyre!("Failed to build price feed client: {}", e))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            coin_id: config.coin_id.clone(),
            fallback_usd: config.fallback_usd,
        })
    }

    pub async fn ztc_price(&self) -> f64 {
        match self.fetch().await {
            Ok(Some(price)) => price,
            Ok(None) => {
                tracing::warn!(
                    coin = %self.coin_id,
                    fallback = self.fallback_usd,
                    "Price feed has no quote for coin, using fallback"
                );
                self.fallback_usd
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = self.fallback_usd,
                    "Failed to fetch ZTC price, using fallback"
                );
                self.fallback_usd
            }
        }
    }

    fn request(&self) -> reqwest::RequestBuilder {
        self.client
            .get(&self.url)
            .query(&[("ids", self.coin_id.as_str()), ("vs_currencies", "usd")])
    }

    async fn fetch(&self) -> eyre::Result<Option<f64>> {
        let response = self.request().send().await?;

        if !response.status().is_success() {
            return Err(eyre::eyre!("price feed returned HTTP {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        Ok(parse_usd_quote(&body, &self.coin_id))
    }
}

/// Extract `{"<coin>": {"usd": <price>}}`.
pub fn parse_usd_quote(body: &serde_json::Value, coin_id: &str) -> Option<f64> {
    body.get(coin_id)?
        .get("usd")?
        .as_f64()
        .filter(|p| p.is_finite() && *p >= 0.0)
}
