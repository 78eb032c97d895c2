//! Token metadata and sale data
//!
//! Remote rows are merged over the bundled list. Any failure (no remote
//! store configured, network error, empty result) falls back to the bundled
//! data with a warning; callers never see an error.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::static_data::{static_sale, static_token, STATIC_SALES, STATIC_TOKENS};
use crate::api::{RemoteStore, RetryPolicy};
use crate::models::{Token, TokenSale};
use crate::storage::TtlCache;

pub struct TokenService {
    remote: Option<Arc<dyn RemoteStore>>,
    retry: RetryPolicy,
    all_tokens: RwLock<TtlCache<(), Vec<Token>>>,
    tokens: RwLock<TtlCache<String, Token>>,
    all_sales: RwLock<TtlCache<(), Vec<TokenSale>>>,
    sales: RwLock<TtlCache<String, TokenSale>>,
}

impl TokenService {
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, cache_ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            remote,
            retry,
            all_tokens: RwLock::new(TtlCache::new(cache_ttl)),
            tokens: RwLock::new(TtlCache::new(cache_ttl)),
            all_sales: RwLock::new(TtlCache::new(cache_ttl)),
            sales: RwLock::new(TtlCache::new(cache_ttl)),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.remote.is_none()
    }

    /// Full token list: remote overrides merged over the bundled list.
    pub async fn fetch_tokens_from_database(&self) -> Vec<Token> {
        if let Some(cached) = self.all_tokens.read().await.get(&()) {
            return cached;
        }

        let Some(remote) = &self.remote else {
            return STATIC_TOKENS.clone();
        };

        let tokens = match self
            .retry
            .run("Token list fetch", move || remote.fetch_tokens())
            .await
        {
            Ok(rows) if !rows.is_empty() => {
                debug!("Fetched {} tokens from remote store", rows.len());
                merge_tokens(&STATIC_TOKENS, rows)
            }
            Ok(_) => {
                warn!("Remote token table is empty, using bundled tokens");
                return STATIC_TOKENS.clone();
            }
            Err(e) => {
                warn!("Failed to fetch tokens, using bundled tokens: {}", e);
                return STATIC_TOKENS.clone();
            }
        };

        self.all_tokens.write().await.insert((), tokens.clone());
        tokens
    }

    /// One token by id, or `None` if it exists neither remotely nor in the bundle.
    pub async fn fetch_token_details(&self, id: &str) -> Option<Token> {
        if let Some(cached) = self.tokens.read().await.get(&id.to_string()) {
            return Some(cached);
        }

        let Some(remote) = &self.remote else {
            return static_token(id);
        };

        match self
            .retry
            .run("Token fetch", move || remote.fetch_token(id))
            .await
        {
            Ok(Some(row)) => {
                let token = match static_token(id) {
                    Some(bundled) => merge_token(&bundled, row),
                    None => row,
                };
                self.tokens.write().await.insert(id.to_string(), token.clone());
                Some(token)
            }
            Ok(None) => {
                debug!("Token {} not in remote store, checking bundled data", id);
                static_token(id)
            }
            Err(e) => {
                warn!("Failed to fetch token {}, using bundled data: {}", id, e);
                static_token(id)
            }
        }
    }

    pub async fn fetch_token_sales_details(&self, token_id: &str) -> Option<TokenSale> {
        if let Some(cached) = self.sales.read().await.get(&token_id.to_string()) {
            return Some(cached);
        }

        let Some(remote) = &self.remote else {
            return static_sale(token_id);
        };

        match self
            .retry
            .run("Token sale fetch", move || remote.fetch_token_sale(token_id))
            .await
        {
            Ok(Some(sale)) => {
                self.sales
                    .write()
                    .await
                    .insert(token_id.to_string(), sale.clone());
                Some(sale)
            }
            Ok(None) => static_sale(token_id),
            Err(e) => {
                warn!("Failed to fetch sale for {}, using bundled data: {}", token_id, e);
                static_sale(token_id)
            }
        }
    }

    pub async fn fetch_all_token_sales(&self) -> Vec<TokenSale> {
        if let Some(cached) = self.all_sales.read().await.get(&()) {
            return cached;
        }

        let Some(remote) = &self.remote else {
            return STATIC_SALES.clone();
        };

        match self
            .retry
            .run("Token sales fetch", move || remote.fetch_token_sales())
            .await
        {
            Ok(rows) if !rows.is_empty() => {
                self.all_sales.write().await.insert((), rows.clone());
                rows
            }
            Ok(_) => {
                warn!("Remote sales table is empty, using bundled sales");
                STATIC_SALES.clone()
            }
            Err(e) => {
                warn!("Failed to fetch token sales, using bundled sales: {}", e);
                STATIC_SALES.clone()
            }
        }
    }

    /// Token with a fresh price applied and ROI recomputed.
    pub async fn token_with_price(&self, id: &str, price: f64) -> Option<Token> {
        let mut token = self.fetch_token_details(id).await?;
        token.apply_price(price, Utc::now());
        Some(token)
    }

    pub async fn invalidate(&self) {
        self.all_tokens.write().await.clear();
        self.tokens.write().await.clear();
        self.all_sales.write().await.clear();
        self.sales.write().await.clear();
    }
}

/// Remote row wins field by field; optional fields missing remotely keep the bundled value.
fn merge_token(bundled: &Token, remote: Token) -> Token {
    let live_price = remote.live_price.or(bundled.live_price);
    let mut merged = Token {
        vesting: remote.vesting.or_else(|| bundled.vesting.clone()),
        vesting_schedule: remote.vesting_schedule.or(bundled.vesting_schedule),
        links: remote.links.or_else(|| bundled.links.clone()),
        coingecko_id: remote.coingecko_id.or_else(|| bundled.coingecko_id.clone()),
        ..remote
    };
    match live_price {
        Some(price) => {
            let at = merged.price_updated_at.unwrap_or_else(Utc::now);
            merged.apply_price(price, at);
        }
        None => {
            merged.live_price = None;
            merged.roi_percent = None;
            merged.investment_value = None;
        }
    }
    merged
}

fn merge_tokens(bundled: &[Token], remote: Vec<Token>) -> Vec<Token> {
    let mut remote_by_id: HashMap<String, Token> =
        remote.into_iter().map(|t| (t.id.clone(), t)).collect();

    let mut merged: Vec<Token> = bundled
        .iter()
        .map(|b| match remote_by_id.remove(&b.id) {
            Some(row) => merge_token(b, row),
            None => b.clone(),
        })
        .collect();

    // Tokens only the remote store knows about, in a stable order
    let mut extra: Vec<Token> = remote_by_id.into_values().collect();
    extra.sort_by(|a, b| a.id.cmp(&b.id));
    merged.extend(extra);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fakes::InMemoryStore;
    use crate::models::TokenStatus;

    fn service(store: Option<Arc<InMemoryStore>>) -> TokenService {
        TokenService::new(
            store.map(|s| s as Arc<dyn RemoteStore>),
            Duration::from_secs(300),
            RetryPolicy::new(2, Duration::ZERO),
        )
    }

    fn remote_fuel() -> Token {
        let mut fuel = static_token("fuel").unwrap();
        fuel.live_price = None;
        fuel.roi_percent = None;
        fuel.investment_value = None;
        fuel.status = TokenStatus::LiveVested;
        fuel.coingecko_id = None;
        fuel
    }

    #[tokio::test]
    async fn test_offline_returns_bundled_data() {
        let tokens = service(None);
        assert!(tokens.is_offline());
        assert_eq!(tokens.fetch_tokens_from_database().await, STATIC_TOKENS.clone());
        assert_eq!(tokens.fetch_token_details("fuel").await, static_token("fuel"));
        assert_eq!(tokens.fetch_token_sales_details("fuel").await, static_sale("fuel"));
        assert!(tokens.fetch_token_details("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store_returns_bundled_data() {
        let store = Arc::new(InMemoryStore::new());
        store.tokens.lock().unwrap().push(remote_fuel());
        store.set_unreachable(true);
        let tokens = service(Some(store));

        assert_eq!(tokens.fetch_tokens_from_database().await, STATIC_TOKENS.clone());
        assert_eq!(tokens.fetch_token_details("fuel").await, static_token("fuel"));
        assert_eq!(tokens.fetch_token_sales_details("giza").await, static_sale("giza"));
        assert_eq!(tokens.fetch_all_token_sales().await, STATIC_SALES.clone());
    }

    #[tokio::test]
    async fn test_empty_remote_table_returns_bundled_data() {
        let store = Arc::new(InMemoryStore::new());
        let tokens = service(Some(store));
        assert_eq!(tokens.fetch_tokens_from_database().await.len(), STATIC_TOKENS.len());
    }

    #[tokio::test]
    async fn test_remote_rows_override_bundled_fields() {
        let store = Arc::new(InMemoryStore::new());
        let mut extra = remote_fuel();
        extra.id = "zzz-new".to_string();
        store.tokens.lock().unwrap().extend([remote_fuel(), extra]);
        let tokens = service(Some(store));

        let list = tokens.fetch_tokens_from_database().await;
        assert_eq!(list.len(), STATIC_TOKENS.len() + 1);
        assert_eq!(list.last().unwrap().id, "zzz-new");

        let fuel = list.iter().find(|t| t.id == "fuel").unwrap();
        assert_eq!(fuel.status, TokenStatus::LiveVested);
        // Missing remotely, kept from the bundle
        assert_eq!(fuel.coingecko_id.as_deref(), Some("fuel-network"));
        assert_eq!(fuel.live_price, Some(0.05));
    }

    #[tokio::test]
    async fn test_results_are_cached_within_ttl() {
        let store = Arc::new(InMemoryStore::new());
        store.tokens.lock().unwrap().push(remote_fuel());
        let tokens = service(Some(store.clone()));

        tokens.fetch_tokens_from_database().await;
        tokens.fetch_tokens_from_database().await;
        tokens.fetch_token_details("fuel").await;
        tokens.fetch_token_details("fuel").await;
        assert_eq!(store.call_count(), 2);

        tokens.invalidate().await;
        tokens.fetch_tokens_from_database().await;
        assert_eq!(store.call_count(), 3);
    }

    #[tokio::test]
    async fn test_cached_list_never_answers_id_lookups() {
        let store = Arc::new(InMemoryStore::new());
        store.tokens.lock().unwrap().push(remote_fuel());
        store.sales.lock().unwrap().push(static_sale("fuel").unwrap());
        let tokens = service(Some(store));

        assert!(!tokens.fetch_tokens_from_database().await.is_empty());
        assert!(!tokens.fetch_all_token_sales().await.is_empty());

        assert!(tokens.fetch_token_details("__all__").await.is_none());
        assert!(tokens.fetch_token_sales_details("__all__").await.is_none());
        assert_eq!(tokens.fetch_token_details("fuel").await.unwrap().id, "fuel");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_before_falling_back() {
        let store = Arc::new(InMemoryStore::new());
        store.tokens.lock().unwrap().push(remote_fuel());
        store.fail_next(1);
        let tokens = service(Some(store.clone()));

        let list = tokens.fetch_tokens_from_database().await;
        let fuel = list.iter().find(|t| t.id == "fuel").unwrap();
        assert_eq!(fuel.status, TokenStatus::LiveVested);
        assert_eq!(store.call_count(), 2);

        store.fail_next(1);
        let fuel = tokens.fetch_token_details("fuel").await.unwrap();
        assert_eq!(fuel.status, TokenStatus::LiveVested);
    }

    #[tokio::test]
    async fn test_token_with_price_recomputes_roi() {
        let tokens = service(None);
        let giza = tokens.token_with_price("giza", 0.2).await.unwrap();
        assert_eq!(giza.live_price, Some(0.2));
        assert!((giza.roi_percent.unwrap() - 150.0).abs() < 1e-9);
        assert!((giza.investment_value.unwrap() - 2500.0).abs() < 1e-9);
    }
}
