//! Web API module for the Legion tracker
//!
//! REST endpoints for tokens, prices, sentiment and discussions, plus a
//! WebSocket feed for live updates.

pub mod server;
pub mod routes;
pub mod handlers;
pub mod websocket;
pub mod models;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::api::{PriceSource, RemoteStore, RetryPolicy};
use crate::config::Config;
use crate::prices::{PriceService, PriceSettings};
use crate::services::{DiscussionService, IdentityHasher, SentimentService, TokenService};
use crate::storage::{LocalStore, RateLimiter};

use self::websocket::WsMessage;

/// Shared application state for all API handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub prices: Arc<PriceService>,
    pub sentiment: Arc<SentimentService>,
    pub discussions: Arc<DiscussionService>,
    /// Write limiters, kept here so their cleanup tasks can be spawned
    pub limiters: Vec<Arc<RateLimiter>>,
    /// Broadcast channel for WebSocket messages
    pub ws_tx: broadcast::Sender<WsMessage>,
}

impl AppState {
    /// Wire every service from the configuration and the outbound clients.
    /// `remote` is `None` in offline mode.
    pub fn new(
        config: Arc<Config>,
        remote: Option<Arc<dyn RemoteStore>>,
        source: Arc<dyn PriceSource>,
        local: LocalStore,
    ) -> Self {
        // Create broadcast channel for WebSocket messages (capacity of 100 messages)
        let (ws_tx, _) = broadcast::channel(100);

        let tokens = Arc::new(TokenService::new(
            remote.clone(),
            config.token_cache_ttl(),
            RetryPolicy::from_config(&config),
        ));
        let prices = Arc::new(PriceService::new(
            local,
            remote.clone(),
            source,
            PriceSettings::from_config(&config),
        ));

        let vote_limiter = Arc::new(RateLimiter::new(
            "votes",
            config.vote_rate_limit,
            Duration::from_secs(config.vote_rate_window_secs),
        ));
        let discussion_limiter = Arc::new(RateLimiter::new(
            "discussions",
            config.discussion_rate_limit,
            Duration::from_secs(config.discussion_rate_window_secs),
        ));
        let comment_limiter = Arc::new(RateLimiter::new(
            "comments",
            config.comment_rate_limit,
            Duration::from_secs(config.comment_rate_window_secs),
        ));

        let hasher = IdentityHasher::new(&config.identity_salt);
        let sentiment = Arc::new(
            SentimentService::new(remote.clone(), tokens.clone(), vote_limiter.clone(), hasher.clone())
                .with_events(ws_tx.clone()),
        );
        let discussions = Arc::new(
            DiscussionService::new(
                remote,
                tokens.clone(),
                discussion_limiter.clone(),
                comment_limiter.clone(),
                hasher,
            )
            .with_events(ws_tx.clone()),
        );

        Self {
            config,
            tokens,
            prices,
            sentiment,
            discussions,
            limiters: vec![vote_limiter, discussion_limiter, comment_limiter],
            ws_tx,
        }
    }

    /// Get a new receiver for WebSocket messages
    pub fn subscribe_ws(&self) -> broadcast::Receiver<WsMessage> {
        self.ws_tx.subscribe()
    }

    /// Broadcast a message to all WebSocket clients
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore errors (no subscribers)
        let _ = self.ws_tx.send(msg);
    }
}
