use async_trait::async_trait;

use crate::error::TrackerResult;
use crate::models::AthAtl;

/// Third-party price API, queried by per-asset identifier.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Spot price in USD; `Ok(None)` when the API does not know the asset.
    async fn fetch_price(&self, coin_id: &str) -> TrackerResult<Option<f64>>;

    /// All-time high/low from the detail endpoint.
    async fn fetch_ath_atl(&self, coin_id: &str) -> TrackerResult<Option<AthAtl>>;
}
