//! Supabase (PostgREST) client
//!
//! Talks to `{SUPABASE_URL}/rest/v1/{table}` with the anon key. Tables:
//! - tokens, token_sales - reference data
//! - price_cache - shared price cache, upserted on `coin_id`
//! - sentiment_votes - append-only, unique per (token_id, ip_hash) per period
//! - discussions, comments

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::store::RemoteStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{
    CachedPriceRow, Comment, Discussion, SentimentTally, SentimentVote, Token, TokenSale, VoteKind,
};

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    rest_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct VoteRow {
    vote: VoteKind,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, api_key: &str) -> TrackerResult<Self> {
        Ok(Self {
            rest_url: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            client: Client::builder().timeout(Duration::from_secs(15)).build()?,
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> TrackerResult<Vec<T>> {
        let url = format!("{}/{}", self.rest_url, table);
        debug!("Supabase select {} {:?}", table, query);

        let response = self
            .authed(self.client.get(&url))
            .query(query)
            .send()
            .await?;
        let response = check_status(table, response).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| TrackerError::StoreError(format!("failed to parse {} rows: {}", table, e)))
    }

    async fn select_one<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> TrackerResult<Option<T>> {
        let mut query = query.to_vec();
        query.push(("limit", "1".to_string()));
        Ok(self.select(table, &query).await?.into_iter().next())
    }

    async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T, upsert_on: Option<&str>) -> TrackerResult<()> {
        let url = format!("{}/{}", self.rest_url, table);
        let mut builder = self.authed(self.client.post(&url)).json(row);

        builder = match upsert_on {
            Some(column) => builder
                .query(&[("on_conflict", column)])
                .header("Prefer", "resolution=merge-duplicates,return=minimal"),
            None => builder.header("Prefer", "return=minimal"),
        };

        let response = builder.send().await?;
        check_status(table, response).await?;
        Ok(())
    }
}

/// Map a PostgREST response to success or a typed error.
async fn check_status(table: &str, response: Response) -> TrackerResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<PostgrestError> = serde_json::from_str(&body).ok();
    let code = parsed.as_ref().and_then(|e| e.code.clone()).unwrap_or_default();

    if status == StatusCode::CONFLICT || code == UNIQUE_VIOLATION {
        return Err(TrackerError::Duplicate(format!("{}: {}", table, body)));
    }

    let message = parsed
        .and_then(|e| e.message)
        .unwrap_or(body);
    warn!("Supabase {} request failed: {} - {}", table, status, message);

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(TrackerError::NetworkError(format!("{} returned {}", table, status)))
    } else {
        Err(TrackerError::StoreError(format!("{} returned {}: {}", table, status, message)))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

fn gte_time(since: DateTime<Utc>) -> String {
    format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn fetch_tokens(&self) -> TrackerResult<Vec<Token>> {
        self.select("tokens", &[("select", "*".to_string())]).await
    }

    async fn fetch_token(&self, id: &str) -> TrackerResult<Option<Token>> {
        self.select_one("tokens", &[("select", "*".to_string()), ("id", eq(id))])
            .await
    }

    async fn fetch_token_sales(&self) -> TrackerResult<Vec<TokenSale>> {
        self.select("token_sales", &[("select", "*".to_string())]).await
    }

    async fn fetch_token_sale(&self, token_id: &str) -> TrackerResult<Option<TokenSale>> {
        self.select_one(
            "token_sales",
            &[("select", "*".to_string()), ("token_id", eq(token_id))],
        )
        .await
    }

    async fn get_cached_price(&self, coin_id: &str) -> TrackerResult<Option<CachedPriceRow>> {
        self.select_one(
            "price_cache",
            &[("select", "*".to_string()), ("coin_id", eq(coin_id))],
        )
        .await
    }

    async fn upsert_cached_price(&self, row: &CachedPriceRow) -> TrackerResult<()> {
        self.insert("price_cache", row, Some("coin_id")).await
    }

    async fn has_voted_since(
        &self,
        token_id: &str,
        ip_hash: &str,
        since: DateTime<Utc>,
    ) -> TrackerResult<bool> {
        let rows: Vec<VoteRow> = self
            .select(
                "sentiment_votes",
                &[
                    ("select", "vote".to_string()),
                    ("token_id", eq(token_id)),
                    ("ip_hash", eq(ip_hash)),
                    ("created_at", gte_time(since)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_vote(&self, vote: &SentimentVote) -> TrackerResult<()> {
        self.insert("sentiment_votes", vote, None).await
    }

    async fn count_votes_since(&self, token_id: &str, since: DateTime<Utc>) -> TrackerResult<SentimentTally> {
        let rows: Vec<VoteRow> = self
            .select(
                "sentiment_votes",
                &[
                    ("select", "vote".to_string()),
                    ("token_id", eq(token_id)),
                    ("created_at", gte_time(since)),
                ],
            )
            .await?;

        let mut tally = SentimentTally::empty(token_id);
        for row in rows {
            tally.increment(row.vote);
        }
        Ok(tally)
    }

    async fn insert_discussion(&self, discussion: &Discussion) -> TrackerResult<()> {
        self.insert("discussions", discussion, None).await
    }

    async fn fetch_discussion(&self, id: &str) -> TrackerResult<Option<Discussion>> {
        self.select_one("discussions", &[("select", "*".to_string()), ("id", eq(id))])
            .await
    }

    async fn list_discussions(&self, token_id: &str) -> TrackerResult<Vec<Discussion>> {
        self.select(
            "discussions",
            &[
                ("select", "*".to_string()),
                ("token_id", eq(token_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn insert_comment(&self, comment: &Comment) -> TrackerResult<()> {
        self.insert("comments", comment, None).await
    }

    async fn list_comments(&self, discussion_id: &str) -> TrackerResult<Vec<Comment>> {
        self.select(
            "comments",
            &[
                ("select", "*".to_string()),
                ("discussion_id", eq(discussion_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )
        .await
    }
}
