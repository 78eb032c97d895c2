//! CoinGecko API client
//!
//! - /simple/price - spot price in USD
//! - /coins/{id} - detail endpoint, used for all-time high/low

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::price_source::PriceSource;
use crate::error::{TrackerError, TrackerResult};
use crate::models::AthAtl;

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

// --- Response Structs ---

#[derive(Debug, Deserialize)]
struct CoinDetailResponse {
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    #[serde(default)]
    ath: HashMap<String, f64>,
    #[serde(default)]
    ath_date: HashMap<String, DateTime<Utc>>,
    #[serde(default)]
    atl: HashMap<String, f64>,
    #[serde(default)]
    atl_date: HashMap<String, DateTime<Utc>>,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> TrackerResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::builder().timeout(Duration::from_secs(20)).build()?,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> TrackerResult<Option<reqwest::Response>> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status == StatusCode::NOT_FOUND {
            debug!("CoinGecko has no data at {}", path);
            return Ok(None);
        }

        let error_text = response.text().await.unwrap_or_default();
        warn!("CoinGecko API error for {}: {} - {}", path, status, error_text);
        Err(TrackerError::NetworkError(format!("CoinGecko returned {}", status)))
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_price(&self, coin_id: &str) -> TrackerResult<Option<f64>> {
        let Some(response) = self
            .get("/simple/price", &[("ids", coin_id), ("vs_currencies", "usd")])
            .await?
        else {
            return Ok(None);
        };

        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .map_err(|e| TrackerError::SerializationError(format!("CoinGecko price: {}", e)))?;

        Ok(body.get(coin_id).and_then(|prices| prices.get("usd")).copied())
    }

    async fn fetch_ath_atl(&self, coin_id: &str) -> TrackerResult<Option<AthAtl>> {
        let path = format!("/coins/{}", coin_id);
        let Some(response) = self
            .get(
                &path,
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("market_data", "true"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
            )
            .await?
        else {
            return Ok(None);
        };

        let detail: CoinDetailResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::SerializationError(format!("CoinGecko detail: {}", e)))?;

        Ok(detail.market_data.map(|m| AthAtl {
            ath: m.ath.get("usd").copied(),
            ath_date: m.ath_date.get("usd").copied(),
            atl: m.atl.get("usd").copied(),
            atl_date: m.atl_date.get("usd").copied(),
        }))
    }
}
