//! Request handlers for all API endpoints

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::net::SocketAddr;
use tracing::{error, warn};

use super::models::*;
use super::AppState;
use crate::error::TrackerError;
use crate::models::{AthAtl, Comment, Discussion, PriceQuote, Token, VoteOutcome};
use crate::services::sanitize::validate_id;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: &str, details: Option<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            details,
        }),
    )
}

fn not_found(what: String) -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Not found", Some(what))
}

/// Map a service error onto an HTTP status
fn api_error(e: TrackerError) -> ApiError {
    match e {
        TrackerError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, "Invalid input", Some(msg)),
        TrackerError::NotFound(what) => not_found(what),
        TrackerError::RateLimited { retry_after_secs } => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded",
            Some(format!("Retry in {}s", retry_after_secs)),
        ),
        TrackerError::Offline => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Community features are unavailable in offline mode",
            None,
        ),
        TrackerError::Duplicate(msg) => error_response(StatusCode::CONFLICT, "Already exists", Some(msg)),
        other => {
            error!("Request failed: {}", other);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                Some(other.to_string()),
            )
        }
    }
}

/// First X-Forwarded-For entry, else the peer address, else "unknown".
fn client_ip(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    peer.map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn load_token(state: &AppState, id: &str) -> Result<Token, ApiError> {
    validate_id("token id", id).map_err(api_error)?;
    state
        .tokens
        .fetch_token_details(id)
        .await
        .ok_or_else(|| not_found(format!("token {}", id)))
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        offline: state.tokens.is_offline(),
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Tokens
// ============================================================================

/// All tokens. Prices come from cache only; the poller keeps them warm.
pub async fn list_tokens(State(state): State<AppState>) -> Json<TokensListResponse> {
    let tokens = state.tokens.fetch_tokens_from_database().await;

    let mut responses = Vec::with_capacity(tokens.len());
    for mut token in tokens {
        let mut source = None;
        if let Some(coin_id) = token.coingecko_id.clone().filter(|_| token.status.is_trading()) {
            if let Some(quote) = state.prices.cached_price(&coin_id).await {
                token.apply_price(quote.price_usd, quote.fetched_at);
                source = Some(quote.source);
            }
        }
        responses.push(TokenResponse::new(token, source));
    }

    let total = responses.len();
    Json(TokensListResponse {
        tokens: responses,
        total,
        offline: state.tokens.is_offline(),
    })
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut token = load_token(&state, &id).await?;

    let mut source = None;
    if let Some(coin_id) = token.coingecko_id.clone().filter(|_| token.status.is_trading()) {
        match state.prices.get_price(&coin_id).await {
            Some(quote) => {
                token.apply_price(quote.price_usd, quote.fetched_at);
                source = Some(quote.source);
            }
            None => warn!("No price available for {}", token.symbol),
        }
    }

    Ok(Json(TokenResponse::new(token, source)))
}

pub async fn get_token_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleResponse>, ApiError> {
    load_token(&state, &id).await?;
    let sale = state
        .tokens
        .fetch_token_sales_details(&id)
        .await
        .ok_or_else(|| not_found(format!("sale for {}", id)))?;

    Ok(Json(SaleResponse {
        average_allocation_usd: sale.average_allocation_usd(),
        sale,
    }))
}

pub async fn get_token_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PriceQuote>, ApiError> {
    let token = load_token(&state, &id).await?;
    let coin_id = token
        .coingecko_id
        .ok_or_else(|| not_found(format!("price feed for {}", id)))?;

    state
        .prices
        .get_price(&coin_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("price for {}", id)))
}

pub async fn get_token_ath(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AthAtl>, ApiError> {
    let token = load_token(&state, &id).await?;
    let coin_id = token
        .coingecko_id
        .ok_or_else(|| not_found(format!("price feed for {}", id)))?;

    state
        .prices
        .get_ath_atl(&coin_id)
        .await
        .map(Json)
        .ok_or_else(|| not_found(format!("all-time high/low for {}", id)))
}

pub async fn get_token_vesting(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VestingResponse>, ApiError> {
    let token = load_token(&state, &id).await?;

    Ok(Json(VestingResponse {
        unlocked_percent: token.unlocked_percent_at(Utc::now()),
        launch_date: token.launch_date(),
        fully_vested_months: token.vesting_schedule.map(|s| s.total_months()),
        schedule: token.vesting_schedule,
        vesting: token.vesting,
        token_id: token.id,
    }))
}

// ============================================================================
// Sentiment
// ============================================================================

pub async fn get_sentiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SentimentResponse>, ApiError> {
    load_token(&state, &id).await?;
    let tally = state.sentiment.get_sentiment(&id).await.map_err(api_error)?;
    Ok(Json(tally.into()))
}

pub async fn submit_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let ip = client_ip(&headers, peer);
    let outcome = state
        .sentiment
        .submit_vote(&id, &ip, req.vote)
        .await
        .map_err(api_error)?;

    let (status, tally) = match outcome {
        VoteOutcome::Recorded(tally) => ("recorded", tally),
        VoteOutcome::AlreadyVoted(tally) => ("already_voted", tally),
    };
    Ok(Json(VoteResponse {
        status: status.to_string(),
        sentiment: tally.into(),
    }))
}

// ============================================================================
// Discussions
// ============================================================================

pub async fn list_discussions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DiscussionsListResponse>, ApiError> {
    let discussions = state.discussions.list_discussions(&id).await.map_err(api_error)?;
    let total = discussions.len();
    Ok(Json(DiscussionsListResponse { discussions, total }))
}

pub async fn create_discussion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<CreateDiscussionRequest>,
) -> Result<(StatusCode, Json<Discussion>), ApiError> {
    let ip = client_ip(&headers, peer);
    let discussion = state
        .discussions
        .create_discussion(&id, &ip, &req.title, &req.content)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(discussion)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CommentsListResponse>, ApiError> {
    let comments = state.discussions.list_comments(&id).await.map_err(api_error)?;
    let total = comments.len();
    Ok(Json(CommentsListResponse { comments, total }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let ip = client_ip(&headers, peer);
    let comment = state
        .discussions
        .add_comment(&id, &ip, &req.content)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(comment)))
}
