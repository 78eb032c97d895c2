//! In-process stand-ins for the remote store and price API, for service tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::price_source::PriceSource;
use super::store::RemoteStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{
    AthAtl, CachedPriceRow, Comment, Discussion, SentimentTally, SentimentVote, Token, TokenSale,
    SENTIMENT_WINDOW_HOURS,
};

#[derive(Default)]
pub struct InMemoryStore {
    pub tokens: Mutex<Vec<Token>>,
    pub sales: Mutex<Vec<TokenSale>>,
    pub prices: Mutex<HashMap<String, CachedPriceRow>>,
    pub votes: Mutex<Vec<SentimentVote>>,
    pub discussions: Mutex<Vec<Discussion>>,
    pub comments: Mutex<Vec<Comment>>,
    /// Every call fails with a network error while set
    pub unreachable: AtomicBool,
    /// Only vote inserts fail while set
    pub fail_vote_insert: AtomicBool,
    /// `has_voted_since` always answers false while set
    pub hide_votes_from_lookup: AtomicBool,
    /// Number of upcoming calls that fail with a network error
    pub failures_remaining: AtomicUsize,
    pub calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, value: bool) {
        self.unreachable.store(value, Ordering::SeqCst);
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> TrackerResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TrackerError::NetworkError("connection refused".to_string()));
        }
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TrackerError::NetworkError("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn fetch_tokens(&self) -> TrackerResult<Vec<Token>> {
        self.enter()?;
        Ok(self.tokens.lock().unwrap().clone())
    }

    async fn fetch_token(&self, id: &str) -> TrackerResult<Option<Token>> {
        self.enter()?;
        Ok(self.tokens.lock().unwrap().iter().find(|t| t.id == id).cloned())
    }

    async fn fetch_token_sales(&self) -> TrackerResult<Vec<TokenSale>> {
        self.enter()?;
        Ok(self.sales.lock().unwrap().clone())
    }

    async fn fetch_token_sale(&self, token_id: &str) -> TrackerResult<Option<TokenSale>> {
        self.enter()?;
        Ok(self
            .sales
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.token_id == token_id)
            .cloned())
    }

    async fn get_cached_price(&self, coin_id: &str) -> TrackerResult<Option<CachedPriceRow>> {
        self.enter()?;
        Ok(self.prices.lock().unwrap().get(coin_id).cloned())
    }

    async fn upsert_cached_price(&self, row: &CachedPriceRow) -> TrackerResult<()> {
        self.enter()?;
        self.prices
            .lock()
            .unwrap()
            .insert(row.coin_id.clone(), row.clone());
        Ok(())
    }

    async fn has_voted_since(
        &self,
        token_id: &str,
        ip_hash: &str,
        since: DateTime<Utc>,
    ) -> TrackerResult<bool> {
        self.enter()?;
        if self.hide_votes_from_lookup.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self
            .votes
            .lock()
            .unwrap()
            .iter()
            .any(|v| v.token_id == token_id && v.ip_hash == ip_hash && v.created_at >= since))
    }

    async fn insert_vote(&self, vote: &SentimentVote) -> TrackerResult<()> {
        self.enter()?;
        if self.fail_vote_insert.load(Ordering::SeqCst) {
            return Err(TrackerError::NetworkError("insert timed out".to_string()));
        }
        let mut votes = self.votes.lock().unwrap();
        let window_start = vote.created_at - ChronoDuration::hours(SENTIMENT_WINDOW_HOURS);
        if votes.iter().any(|v| {
            v.token_id == vote.token_id && v.ip_hash == vote.ip_hash && v.created_at >= window_start
        }) {
            return Err(TrackerError::Duplicate("sentiment_votes".to_string()));
        }
        votes.push(vote.clone());
        Ok(())
    }

    async fn count_votes_since(&self, token_id: &str, since: DateTime<Utc>) -> TrackerResult<SentimentTally> {
        self.enter()?;
        let mut tally = SentimentTally::empty(token_id);
        for vote in self.votes.lock().unwrap().iter() {
            if vote.token_id == token_id && vote.created_at >= since {
                tally.increment(vote.vote);
            }
        }
        Ok(tally)
    }

    async fn insert_discussion(&self, discussion: &Discussion) -> TrackerResult<()> {
        self.enter()?;
        self.discussions.lock().unwrap().push(discussion.clone());
        Ok(())
    }

    async fn fetch_discussion(&self, id: &str) -> TrackerResult<Option<Discussion>> {
        self.enter()?;
        Ok(self
            .discussions
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn list_discussions(&self, token_id: &str) -> TrackerResult<Vec<Discussion>> {
        self.enter()?;
        let mut list: Vec<Discussion> = self
            .discussions
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.token_id == token_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn insert_comment(&self, comment: &Comment) -> TrackerResult<()> {
        self.enter()?;
        self.comments.lock().unwrap().push(comment.clone());
        Ok(())
    }

    async fn list_comments(&self, discussion_id: &str) -> TrackerResult<Vec<Comment>> {
        self.enter()?;
        let mut list: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.discussion_id == discussion_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }
}

/// Price API fake: fixed answers, optional leading failures, call counting.
#[derive(Default)]
pub struct ScriptedPriceSource {
    pub prices: Mutex<HashMap<String, f64>>,
    pub ath: Mutex<HashMap<String, AthAtl>>,
    /// Number of upcoming calls that fail with a network error
    pub failures_remaining: AtomicUsize,
    pub price_calls: AtomicUsize,
    pub ath_calls: AtomicUsize,
    /// Coin ids passed to `fetch_price`, in call order
    pub requested: Mutex<Vec<String>>,
}

impl ScriptedPriceSource {
    pub fn with_price(coin_id: &str, price: f64) -> Self {
        let source = Self::default();
        source.prices.lock().unwrap().insert(coin_id.to_string(), price);
        source
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn ath_calls(&self) -> usize {
        self.ath_calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> TrackerResult<()> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(TrackerError::NetworkError("price API unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceSource for ScriptedPriceSource {
    async fn fetch_price(&self, coin_id: &str) -> TrackerResult<Option<f64>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(coin_id.to_string());
        self.maybe_fail()?;
        Ok(self.prices.lock().unwrap().get(coin_id).copied())
    }

    async fn fetch_ath_atl(&self, coin_id: &str) -> TrackerResult<Option<AthAtl>> {
        self.ath_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_fail()?;
        Ok(self.ath.lock().unwrap().get(coin_id).cloned())
    }
}
