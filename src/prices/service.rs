//! Layered price lookup
//!
//! Tiers, each tried only when the previous one misses or errors:
//! 1. in-memory TTL cache, then the persistent local store (same TTL)
//! 2. remote shared `price_cache` row, if younger than the remote TTL
//! 3. live price API through the serialized request queue, with retries
//! 4. stale local value, then the bundled last-known price table
//!
//! A live hit is written back to tiers 1 and 2. ATH/ATL data has its own
//! longer-lived cache and degrades to the last value ever seen.
//! Nothing here returns an error: failures are logged and treated as misses.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::fallback;
use super::request_queue::RequestQueue;
use crate::api::{PriceSource, RemoteStore, RetryPolicy};
use crate::config::Config;
use crate::error::TrackerResult;
use crate::models::{AthAtl, CachedPriceRow, PriceQuote, PriceTier};
use crate::storage::{LocalStore, TtlCache};

#[derive(Debug, Clone)]
pub struct PriceSettings {
    pub memory_ttl: Duration,
    pub remote_ttl: Duration,
    pub ath_ttl: Duration,
    pub queue_delay: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl PriceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            memory_ttl: config.price_memory_ttl(),
            remote_ttl: config.price_remote_ttl(),
            ath_ttl: config.ath_ttl(),
            queue_delay: config.price_queue_delay(),
            retries: config.fetch_retries,
            retry_delay: config.fetch_retry_delay(),
        }
    }
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
struct CachedPrice {
    price_usd: f64,
    fetched_at: DateTime<Utc>,
}

fn price_key(coin_id: &str) -> String {
    format!("price:{}", coin_id)
}

fn ath_key(coin_id: &str) -> String {
    format!("ath:{}", coin_id)
}

/// Never expires; read when the detail endpoint fails.
fn ath_last_key(coin_id: &str) -> String {
    format!("ath_last:{}", coin_id)
}

pub struct PriceService {
    memory: RwLock<TtlCache<String, CachedPrice>>,
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    source: Arc<dyn PriceSource>,
    queue: RequestQueue,
    settings: PriceSettings,
}

impl PriceService {
    pub fn new(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        source: Arc<dyn PriceSource>,
        settings: PriceSettings,
    ) -> Self {
        Self {
            memory: RwLock::new(TtlCache::new(settings.memory_ttl)),
            local,
            remote,
            source,
            queue: RequestQueue::new(settings.queue_delay),
            settings,
        }
    }

    /// Resolve a price through every tier. `None` only when the asset is unknown everywhere.
    pub async fn get_price(&self, coin_id: &str) -> Option<PriceQuote> {
        if let Some(quote) = self.cached_quote(coin_id).await {
            return Some(quote);
        }

        if let Some(row) = self.remote_price(coin_id).await {
            let cached = CachedPrice {
                price_usd: row.price_usd,
                fetched_at: row.updated_at,
            };
            self.store_locally(coin_id, cached).await;
            return Some(quote(coin_id, cached, PriceTier::Remote));
        }

        if let Some(price) = self.live_price(coin_id).await {
            let cached = CachedPrice {
                price_usd: price,
                fetched_at: Utc::now(),
            };
            self.write_through(coin_id, cached).await;
            return Some(quote(coin_id, cached, PriceTier::Live));
        }

        self.fallback_quote(coin_id)
    }

    /// Resolve several ids, in order, through the full pipeline.
    pub async fn get_prices(&self, coin_ids: &[String]) -> HashMap<String, PriceQuote> {
        stream::iter(coin_ids)
            .then(|coin_id| async move { (coin_id.clone(), self.get_price(coin_id).await) })
            .filter_map(|(coin_id, quote)| async move { quote.map(|q| (coin_id, q)) })
            .collect()
            .await
    }

    /// Best price available without any network call.
    pub async fn cached_price(&self, coin_id: &str) -> Option<PriceQuote> {
        match self.cached_quote(coin_id).await {
            Some(q) => Some(q),
            None => self.fallback_quote(coin_id),
        }
    }

    /// All-time high/low, cached for the ATH TTL. On failure the last value ever
    /// fetched is returned, however old.
    pub async fn get_ath_atl(&self, coin_id: &str) -> Option<AthAtl> {
        match self.local.get::<AthAtl>(&ath_key(coin_id)) {
            Ok(Some(cached)) => return Some(cached),
            Ok(None) => {}
            Err(e) => warn!("Local ATH cache read failed for {}: {}", coin_id, e),
        }

        let source = self.source.clone();
        let fetched = self
            .call_with_retries("ATH/ATL", coin_id, || {
                let source = source.clone();
                let id = coin_id.to_string();
                async move { source.fetch_ath_atl(&id).await }
            })
            .await;

        if let Some(ath) = fetched {
            if let Err(e) = self.store_ath(coin_id, &ath) {
                warn!("Failed to cache ATH/ATL for {}: {}", coin_id, e);
            }
            return Some(ath);
        }

        match self.local.get_stale::<AthAtl>(&ath_last_key(coin_id)) {
            Ok(Some((previous, stored_at))) => {
                info!("Serving ATH/ATL for {} cached at {}", coin_id, stored_at);
                Some(previous)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Local ATH fallback read failed for {}: {}", coin_id, e);
                None
            }
        }
    }

    /// Drop the memory and local entries for `coin_id`.
    pub async fn invalidate(&self, coin_id: &str) {
        self.memory.write().await.remove(&coin_id.to_string());
        if let Err(e) = self.local.remove(&price_key(coin_id)) {
            warn!("Failed to invalidate local price for {}: {}", coin_id, e);
        }
    }

    /// Housekeeping for both local tiers. Returns entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut removed = self.memory.write().await.cleanup();
        match self.local.purge_expired() {
            Ok(n) => removed += n,
            Err(e) => warn!("Local cache purge failed: {}", e),
        }
        removed
    }

    async fn cached_quote(&self, coin_id: &str) -> Option<PriceQuote> {
        if let Some(cached) = self.memory.read().await.get(&coin_id.to_string()) {
            debug!("Price for {} served from memory", coin_id);
            return Some(quote(coin_id, cached, PriceTier::Memory));
        }

        match self.local.get::<CachedPrice>(&price_key(coin_id)) {
            Ok(Some(cached)) => {
                debug!("Price for {} served from local store", coin_id);
                self.memory
                    .write()
                    .await
                    .insert(coin_id.to_string(), cached);
                Some(quote(coin_id, cached, PriceTier::Local))
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Local price cache read failed for {}: {}", coin_id, e);
                None
            }
        }
    }

    async fn remote_price(&self, coin_id: &str) -> Option<CachedPriceRow> {
        let remote = self.remote.as_ref()?;
        match remote.get_cached_price(coin_id).await {
            Ok(Some(row)) => {
                let max_age = ChronoDuration::from_std(self.settings.remote_ttl).ok()?;
                if !(row.price_usd.is_finite() && row.price_usd > 0.0) {
                    warn!("Ignoring invalid remote price {} for {}", row.price_usd, coin_id);
                    None
                } else if Utc::now() - row.updated_at < max_age {
                    debug!("Price for {} served from remote cache", coin_id);
                    Some(row)
                } else {
                    debug!("Remote cached price for {} is stale", coin_id);
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Remote price cache lookup failed for {}: {}", coin_id, e);
                None
            }
        }
    }

    async fn live_price(&self, coin_id: &str) -> Option<f64> {
        let source = self.source.clone();
        self.call_with_retries("price", coin_id, || {
            let source = source.clone();
            let id = coin_id.to_string();
            async move { source.fetch_price(&id).await }
        })
        .await
        .filter(|price| price.is_finite() && *price > 0.0)
    }

    /// Queue a call to the price API, retrying transient failures with a fixed delay.
    async fn call_with_retries<T, F, Fut>(&self, what: &str, coin_id: &str, mut call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TrackerResult<Option<T>>>,
    {
        let policy = RetryPolicy::new(self.settings.retries, self.settings.retry_delay);
        let label = format!("Live {} fetch for {}", what, coin_id);
        let queue = &self.queue;
        let result = policy
            .run(&label, move || {
                let fut = call();
                queue.run(move || fut)
            })
            .await;

        match result {
            Ok(value) => value,
            Err(e) => {
                warn!("{} failed: {}", label, e);
                None
            }
        }
    }

    async fn store_locally(&self, coin_id: &str, cached: CachedPrice) {
        self.memory
            .write()
            .await
            .insert(coin_id.to_string(), cached);
        if let Err(e) = self
            .local
            .set(&price_key(coin_id), &cached, Some(self.settings.memory_ttl))
        {
            warn!("Failed to write local price for {}: {}", coin_id, e);
        }
    }

    async fn write_through(&self, coin_id: &str, cached: CachedPrice) {
        self.store_locally(coin_id, cached).await;

        // Kept without expiry so it can serve as a last-resort fallback
        if let Err(e) = self.local.set(&format!("price_last:{}", coin_id), &cached, None) {
            warn!("Failed to record last price for {}: {}", coin_id, e);
        }

        if let Some(remote) = &self.remote {
            let row = CachedPriceRow {
                coin_id: coin_id.to_string(),
                price_usd: cached.price_usd,
                updated_at: cached.fetched_at,
            };
            if let Err(e) = remote.upsert_cached_price(&row).await {
                warn!("Failed to update remote price cache for {}: {}", coin_id, e);
            }
        }
    }

    fn store_ath(&self, coin_id: &str, ath: &AthAtl) -> TrackerResult<()> {
        self.local.set(&ath_key(coin_id), ath, Some(self.settings.ath_ttl))?;
        self.local.set(&ath_last_key(coin_id), ath, None)
    }

    fn fallback_quote(&self, coin_id: &str) -> Option<PriceQuote> {
        match self
            .local
            .get_stale::<CachedPrice>(&format!("price_last:{}", coin_id))
        {
            Ok(Some((cached, _))) => {
                info!("Using last fetched price for {}", coin_id);
                return Some(quote(coin_id, cached, PriceTier::Fallback));
            }
            Ok(None) => {}
            Err(e) => warn!("Last price read failed for {}: {}", coin_id, e),
        }

        match fallback::last_known_price(coin_id) {
            Some(price) => {
                info!("Using bundled fallback price for {}", coin_id);
                Some(PriceQuote {
                    coin_id: coin_id.to_string(),
                    price_usd: price,
                    source: PriceTier::Fallback,
                    fetched_at: Utc::now(),
                })
            }
            None => {
                warn!("No price available for {}", coin_id);
                None
            }
        }
    }
}

fn quote(coin_id: &str, cached: CachedPrice, source: PriceTier) -> PriceQuote {
    PriceQuote {
        coin_id: coin_id.to_string(),
        price_usd: cached.price_usd,
        source,
        fetched_at: cached.fetched_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fakes::{InMemoryStore, ScriptedPriceSource};

    fn settings() -> PriceSettings {
        PriceSettings {
            memory_ttl: Duration::from_secs(120),
            remote_ttl: Duration::from_secs(600),
            ath_ttl: Duration::from_secs(86_400),
            queue_delay: Duration::ZERO,
            retries: 2,
            retry_delay: Duration::ZERO,
        }
    }

    fn service(
        remote: Option<Arc<InMemoryStore>>,
        source: Arc<ScriptedPriceSource>,
    ) -> PriceService {
        PriceService::new(
            LocalStore::temporary().unwrap(),
            remote.map(|r| r as Arc<dyn RemoteStore>),
            source,
            settings(),
        )
    }

    #[tokio::test]
    async fn test_live_hit_is_written_through_and_then_cached() {
        let remote = Arc::new(InMemoryStore::new());
        let source = Arc::new(ScriptedPriceSource::with_price("fuel-network", 0.05));
        let prices = service(Some(remote.clone()), source.clone());

        let first = prices.get_price("fuel-network").await.unwrap();
        assert_eq!(first.source, PriceTier::Live);
        assert_eq!(first.price_usd, 0.05);
        assert!(remote.prices.lock().unwrap().contains_key("fuel-network"));

        let second = prices.get_price("fuel-network").await.unwrap();
        assert_eq!(second.source, PriceTier::Memory);
        assert_eq!(second.price_usd, 0.05);
        assert_eq!(source.price_calls(), 1);
    }

    #[tokio::test]
    async fn test_local_tier_survives_memory_loss() {
        let source = Arc::new(ScriptedPriceSource::with_price("fuel-network", 0.05));
        let prices = service(None, source.clone());

        prices.get_price("fuel-network").await.unwrap();
        prices.memory.write().await.clear();

        let quote = prices.get_price("fuel-network").await.unwrap();
        assert_eq!(quote.source, PriceTier::Local);
        assert_eq!(source.price_calls(), 1);
    }

    #[tokio::test]
    async fn test_fresh_remote_row_avoids_live_call() {
        let remote = Arc::new(InMemoryStore::new());
        remote.prices.lock().unwrap().insert(
            "giza".to_string(),
            CachedPriceRow {
                coin_id: "giza".to_string(),
                price_usd: 0.2,
                updated_at: Utc::now() - ChronoDuration::minutes(5),
            },
        );
        let source = Arc::new(ScriptedPriceSource::with_price("giza", 0.3));
        let prices = service(Some(remote), source.clone());

        let quote = prices.get_price("giza").await.unwrap();
        assert_eq!(quote.source, PriceTier::Remote);
        assert_eq!(quote.price_usd, 0.2);
        assert_eq!(source.price_calls(), 0);

        // Remote hit back-fills the memory tier
        let again = prices.get_price("giza").await.unwrap();
        assert_eq!(again.source, PriceTier::Memory);
    }

    #[tokio::test]
    async fn test_stale_remote_row_falls_through_to_live() {
        let remote = Arc::new(InMemoryStore::new());
        remote.prices.lock().unwrap().insert(
            "giza".to_string(),
            CachedPriceRow {
                coin_id: "giza".to_string(),
                price_usd: 0.2,
                updated_at: Utc::now() - ChronoDuration::minutes(11),
            },
        );
        let source = Arc::new(ScriptedPriceSource::with_price("giza", 0.3));
        let prices = service(Some(remote.clone()), source);

        let quote = prices.get_price("giza").await.unwrap();
        assert_eq!(quote.source, PriceTier::Live);
        assert_eq!(remote.prices.lock().unwrap()["giza"].price_usd, 0.3);
    }

    #[tokio::test]
    async fn test_invalid_remote_row_is_ignored() {
        let remote = Arc::new(InMemoryStore::new());
        remote.prices.lock().unwrap().insert(
            "giza".to_string(),
            CachedPriceRow {
                coin_id: "giza".to_string(),
                price_usd: 0.0,
                updated_at: Utc::now() - ChronoDuration::minutes(1),
            },
        );
        let source = Arc::new(ScriptedPriceSource::with_price("giza", 0.3));
        let prices = service(Some(remote.clone()), source.clone());

        let quote = prices.get_price("giza").await.unwrap();
        assert_eq!(quote.source, PriceTier::Live);
        assert_eq!(quote.price_usd, 0.3);
        assert_eq!(source.price_calls(), 1);
        assert_eq!(remote.prices.lock().unwrap()["giza"].price_usd, 0.3);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let source = Arc::new(ScriptedPriceSource::with_price("fuel-network", 0.06));
        source.fail_next(2);
        let prices = service(None, source.clone());

        let quote = prices.get_price("fuel-network").await.unwrap();
        assert_eq!(quote.source, PriceTier::Live);
        assert_eq!(quote.price_usd, 0.06);
        assert_eq!(source.price_calls(), 3);
    }

    #[tokio::test]
    async fn test_everything_down_uses_bundled_fallback() {
        let remote = Arc::new(InMemoryStore::new());
        remote.set_unreachable(true);
        let source = Arc::new(ScriptedPriceSource::default());
        source.fail_next(10);
        let prices = service(Some(remote), source.clone());

        let quote = prices.get_price("fuel-network").await.unwrap();
        assert_eq!(quote.source, PriceTier::Fallback);
        assert_eq!(quote.price_usd, 0.05);
        // Initial attempt plus two retries
        assert_eq!(source.price_calls(), 3);

        assert!(prices.get_price("unknown-coin").await.is_none());
    }

    #[tokio::test]
    async fn test_last_fetched_price_beats_bundled_fallback() {
        let source = Arc::new(ScriptedPriceSource::with_price("fuel-network", 0.07));
        let prices = service(None, source.clone());
        prices.get_price("fuel-network").await.unwrap();

        prices.invalidate("fuel-network").await;
        source.fail_next(10);

        let quote = prices.get_price("fuel-network").await.unwrap();
        assert_eq!(quote.source, PriceTier::Fallback);
        assert_eq!(quote.price_usd, 0.07);
    }

    #[tokio::test]
    async fn test_cached_price_never_calls_network() {
        let source = Arc::new(ScriptedPriceSource::with_price("nexera", 0.01));
        let prices = service(None, source.clone());

        let quote = prices.cached_price("nexera").await.unwrap();
        assert_eq!(quote.source, PriceTier::Fallback);
        assert_eq!(source.price_calls(), 0);
    }

    #[tokio::test]
    async fn test_ath_cached_and_degrades_to_previous_value() {
        let source = Arc::new(ScriptedPriceSource::default());
        let ath = AthAtl {
            ath: Some(0.1),
            ath_date: None,
            atl: Some(0.01),
            atl_date: None,
        };
        source.ath.lock().unwrap().insert("fuel-network".to_string(), ath.clone());
        let prices = service(None, source.clone());

        assert_eq!(prices.get_ath_atl("fuel-network").await, Some(ath.clone()));
        assert_eq!(prices.get_ath_atl("fuel-network").await, Some(ath.clone()));
        assert_eq!(source.ath_calls(), 1);

        // Expire the 24h entry and break the API
        prices.local.remove(&ath_key("fuel-network")).unwrap();
        source.fail_next(10);
        assert_eq!(prices.get_ath_atl("fuel-network").await, Some(ath));
    }

    #[tokio::test]
    async fn test_get_prices_skips_unknown() {
        let source = Arc::new(ScriptedPriceSource::with_price("giza", 0.2));
        let prices = service(None, source);
        let quotes = prices
            .get_prices(&["giza".to_string(), "no-such-coin".to_string()])
            .await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes["giza"].price_usd, 0.2);
    }

    #[tokio::test]
    async fn test_get_prices_resolves_in_order() {
        let source = Arc::new(ScriptedPriceSource::default());
        for (id, price) in [("silencio", 0.0005), ("giza", 0.2), ("fuel-network", 0.05)] {
            source.prices.lock().unwrap().insert(id.to_string(), price);
        }
        let prices = service(None, source.clone());

        let ids: Vec<String> = ["silencio", "giza", "fuel-network"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let quotes = prices.get_prices(&ids).await;

        assert_eq!(quotes.len(), 3);
        assert_eq!(*source.requested.lock().unwrap(), ids);
    }
}
