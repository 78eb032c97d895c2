//! Request and Response DTOs for the Web API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    format_roi, format_usd, Comment, Discussion, PriceTier, SentimentTally, Token, TokenSale,
    VestingSchedule, VoteKind,
};

// ============================================================================
// Health & Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// True when no remote store is configured and bundled data is served
    pub offline: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(flatten)]
    pub token: Token,
    pub price_source: Option<PriceTier>,
    /// e.g. "+150.00%"
    pub roi_display: Option<String>,
    /// e.g. "$2500.00"
    pub investment_display: Option<String>,
}

impl TokenResponse {
    pub fn new(token: Token, price_source: Option<PriceTier>) -> Self {
        Self {
            roi_display: token.roi_percent.map(format_roi),
            investment_display: token.investment_value.map(format_usd),
            price_source,
            token,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokensListResponse {
    pub tokens: Vec<TokenResponse>,
    pub total: usize,
    pub offline: bool,
}

#[derive(Debug, Serialize)]
pub struct SaleResponse {
    #[serde(flatten)]
    pub sale: TokenSale,
    pub average_allocation_usd: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VestingResponse {
    pub token_id: String,
    pub vesting: Option<String>,
    pub schedule: Option<VestingSchedule>,
    pub launch_date: Option<NaiveDate>,
    pub unlocked_percent: f64,
    pub fully_vested_months: Option<u32>,
}

// ============================================================================
// Sentiment
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote: VoteKind,
}

#[derive(Debug, Serialize)]
pub struct SentimentResponse {
    pub token_id: String,
    pub bullish: u64,
    pub bearish: u64,
    pub total: u64,
    pub bullish_percent: Option<f64>,
}

impl From<SentimentTally> for SentimentResponse {
    fn from(tally: SentimentTally) -> Self {
        Self {
            total: tally.total(),
            bullish_percent: tally.bullish_percent(),
            token_id: tally.token_id,
            bullish: tally.bullish,
            bearish: tally.bearish,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    /// "recorded" or "already_voted"
    pub status: String,
    pub sentiment: SentimentResponse,
}

// ============================================================================
// Discussions
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateDiscussionRequest {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DiscussionsListResponse {
    pub discussions: Vec<Discussion>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CommentsListResponse {
    pub comments: Vec<Comment>,
    pub total: usize,
}
