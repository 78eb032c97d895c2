//! Community sentiment voting
//!
//! Votes are append-only rows keyed by (token, hashed identity); one vote per
//! identity per token per 24h. The displayed tally is updated optimistically
//! before the insert round trip, then reconciled with the stored count or
//! reverted if the insert fails.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::identity::IdentityHasher;
use super::sanitize::validate_id;
use super::tokens::TokenService;
use crate::api::RemoteStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{SentimentTally, SentimentVote, VoteKind, VoteOutcome, SENTIMENT_WINDOW_HOURS};
use crate::storage::RateLimiter;
use crate::web::websocket::WsMessage;

pub struct SentimentService {
    remote: Option<Arc<dyn RemoteStore>>,
    tokens: Arc<TokenService>,
    limiter: Arc<RateLimiter>,
    hasher: IdentityHasher,
    /// Tally shown to readers, possibly including unconfirmed votes
    displayed: RwLock<HashMap<String, SentimentTally>>,
    events: Option<broadcast::Sender<WsMessage>>,
}

impl SentimentService {
    pub fn new(
        remote: Option<Arc<dyn RemoteStore>>,
        tokens: Arc<TokenService>,
        limiter: Arc<RateLimiter>,
        hasher: IdentityHasher,
    ) -> Self {
        Self {
            remote,
            tokens,
            limiter,
            hasher,
            displayed: RwLock::new(HashMap::new()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<WsMessage>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn submit_vote(&self, token_id: &str, ip: &str, vote: VoteKind) -> TrackerResult<VoteOutcome> {
        validate_id("token id", token_id)?;
        if self.tokens.fetch_token_details(token_id).await.is_none() {
            return Err(TrackerError::NotFound(format!("token {}", token_id)));
        }
        let remote = self.remote.as_ref().ok_or(TrackerError::Offline)?;

        let ip_hash = self.hasher.hash(ip);
        if !self.limiter.try_request(&ip_hash).await {
            let retry_after = self.limiter.retry_after(&ip_hash).await;
            return Err(TrackerError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        let now = Utc::now();
        let since = now - ChronoDuration::hours(SENTIMENT_WINDOW_HOURS);
        match remote.has_voted_since(token_id, &ip_hash, since).await {
            Ok(true) => {
                debug!("Identity already voted on {} in the last day", token_id);
                return Ok(VoteOutcome::AlreadyVoted(self.reconcile(token_id).await));
            }
            Ok(false) => {}
            // The insert's uniqueness check still guards against doubles
            Err(e) => warn!("Vote lookup failed for {}: {}", token_id, e),
        }

        self.apply_optimistic(token_id, vote).await;

        let row = SentimentVote {
            token_id: token_id.to_string(),
            ip_hash,
            vote,
            created_at: now,
        };

        match remote.insert_vote(&row).await {
            Ok(()) => {
                info!("Recorded {} vote for {}", vote, token_id);
                let confirmed = self.reconcile(token_id).await;
                Ok(VoteOutcome::Recorded(confirmed))
            }
            Err(TrackerError::Duplicate(_)) => {
                debug!("Duplicate vote for {} caught by the store", token_id);
                let tally = match self.stored_tally(token_id).await {
                    Some(tally) => {
                        self.publish(&tally, false);
                        tally
                    }
                    None => self.revert(token_id, vote).await,
                };
                Ok(VoteOutcome::AlreadyVoted(tally))
            }
            Err(e) => {
                warn!("Failed to record vote for {}: {}", token_id, e);
                self.revert(token_id, vote).await;
                Err(e)
            }
        }
    }

    /// Votes over the last 24h. Falls back to the displayed tally when the store is unavailable.
    pub async fn get_sentiment(&self, token_id: &str) -> TrackerResult<SentimentTally> {
        validate_id("token id", token_id)?;
        let Some(remote) = &self.remote else {
            return Ok(self.displayed_tally(token_id).await);
        };

        let since = Utc::now() - ChronoDuration::hours(SENTIMENT_WINDOW_HOURS);
        match remote.count_votes_since(token_id, since).await {
            Ok(tally) => {
                self.displayed
                    .write()
                    .await
                    .insert(token_id.to_string(), tally.clone());
                Ok(tally)
            }
            Err(e) => {
                warn!("Failed to count votes for {}: {}", token_id, e);
                Ok(self.displayed_tally(token_id).await)
            }
        }
    }

    pub async fn displayed_tally(&self, token_id: &str) -> SentimentTally {
        self.displayed
            .read()
            .await
            .get(token_id)
            .cloned()
            .unwrap_or_else(|| SentimentTally::empty(token_id))
    }

    /// Count the vote locally before the server confirms it.
    async fn apply_optimistic(&self, token_id: &str, vote: VoteKind) {
        let after = {
            let mut displayed = self.displayed.write().await;
            let tally = displayed
                .entry(token_id.to_string())
                .or_insert_with(|| SentimentTally::empty(token_id));
            tally.increment(vote);
            tally.clone()
        };
        self.publish(&after, true);
    }

    async fn revert(&self, token_id: &str, vote: VoteKind) -> SentimentTally {
        let after = {
            let mut displayed = self.displayed.write().await;
            let tally = displayed
                .entry(token_id.to_string())
                .or_insert_with(|| SentimentTally::empty(token_id));
            tally.decrement(vote);
            tally.clone()
        };
        self.publish(&after, false);
        after
    }

    /// Stored count over the last 24h, also made the displayed tally. `None` if it cannot be fetched.
    async fn stored_tally(&self, token_id: &str) -> Option<SentimentTally> {
        let remote = self.remote.as_ref()?;
        let since = Utc::now() - ChronoDuration::hours(SENTIMENT_WINDOW_HOURS);
        match remote.count_votes_since(token_id, since).await {
            Ok(tally) => {
                self.displayed
                    .write()
                    .await
                    .insert(token_id.to_string(), tally.clone());
                Some(tally)
            }
            Err(e) => {
                warn!("Could not confirm tally for {}: {}", token_id, e);
                None
            }
        }
    }

    /// Replace the displayed tally with the stored count. Keeps the optimistic
    /// value if the count cannot be fetched.
    async fn reconcile(&self, token_id: &str) -> SentimentTally {
        let tally = match self.stored_tally(token_id).await {
            Some(tally) => tally,
            None => self.displayed_tally(token_id).await,
        };
        self.publish(&tally, false);
        tally
    }

    fn publish(&self, tally: &SentimentTally, pending: bool) {
        if let Some(events) = &self.events {
            // Ignore errors (no subscribers)
            let _ = events.send(WsMessage::SentimentUpdate {
                token_id: tally.token_id.clone(),
                bullish: tally.bullish,
                bearish: tally.bearish,
                pending,
                timestamp: Utc::now(),
            });
        }
    }
}
