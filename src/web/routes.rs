//! API route definitions

use axum::{
    routing::get,
    Router,
};

use super::handlers;
use super::websocket::ws_handler;
use super::AppState;

/// Create all API routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health_check))

        // Tokens
        .route("/api/tokens", get(handlers::list_tokens))
        .route("/api/tokens/:id", get(handlers::get_token))
        .route("/api/tokens/:id/sale", get(handlers::get_token_sale))
        .route("/api/tokens/:id/price", get(handlers::get_token_price))
        .route("/api/tokens/:id/ath", get(handlers::get_token_ath))
        .route("/api/tokens/:id/vesting", get(handlers::get_token_vesting))

        // Sentiment
        .route(
            "/api/tokens/:id/sentiment",
            get(handlers::get_sentiment).post(handlers::submit_vote),
        )

        // Discussions
        .route(
            "/api/tokens/:id/discussions",
            get(handlers::list_discussions).post(handlers::create_discussion),
        )
        .route(
            "/api/discussions/:id/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )

        // WebSocket
        .route("/ws", get(ws_handler))

        // Add state to all routes
        .with_state(state)
}
