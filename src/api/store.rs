//! Remote relational store contract
//!
//! Everything the services need from the hosted database, expressed in
//! domain terms. `SupabaseClient` is the production implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TrackerResult;
use crate::models::{
    CachedPriceRow, Comment, Discussion, SentimentTally, SentimentVote, Token, TokenSale,
};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_tokens(&self) -> TrackerResult<Vec<Token>>;

    async fn fetch_token(&self, id: &str) -> TrackerResult<Option<Token>>;

    async fn fetch_token_sales(&self) -> TrackerResult<Vec<TokenSale>>;

    async fn fetch_token_sale(&self, token_id: &str) -> TrackerResult<Option<TokenSale>>;

    async fn get_cached_price(&self, coin_id: &str) -> TrackerResult<Option<CachedPriceRow>>;

    /// Last write wins.
    async fn upsert_cached_price(&self, row: &CachedPriceRow) -> TrackerResult<()>;

    async fn has_voted_since(
        &self,
        token_id: &str,
        ip_hash: &str,
        since: DateTime<Utc>,
    ) -> TrackerResult<bool>;

    /// Fails with `TrackerError::Duplicate` when the identity already voted this period.
    async fn insert_vote(&self, vote: &SentimentVote) -> TrackerResult<()>;

    async fn count_votes_since(&self, token_id: &str, since: DateTime<Utc>) -> TrackerResult<SentimentTally>;

    async fn insert_discussion(&self, discussion: &Discussion) -> TrackerResult<()>;

    async fn fetch_discussion(&self, id: &str) -> TrackerResult<Option<Discussion>>;

    /// Newest first.
    async fn list_discussions(&self, token_id: &str) -> TrackerResult<Vec<Discussion>>;

    async fn insert_comment(&self, comment: &Comment) -> TrackerResult<()>;

    /// Oldest first.
    async fn list_comments(&self, discussion_id: &str) -> TrackerResult<Vec<Comment>>;
}
