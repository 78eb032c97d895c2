//! WebSocket handler for real-time updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::AppState;
use crate::models::PriceTier;

/// WebSocket message types broadcast to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Fresh price for a trading token
    PriceUpdate {
        token_id: String,
        symbol: String,
        price_usd: f64,
        roi_percent: Option<f64>,
        investment_value: Option<f64>,
        source: PriceTier,
        timestamp: DateTime<Utc>,
    },

    /// Sentiment tally changed; `pending` while a vote awaits confirmation
    SentimentUpdate {
        token_id: String,
        bullish: u64,
        bearish: u64,
        pending: bool,
        timestamp: DateTime<Utc>,
    },

    DiscussionCreated {
        id: String,
        token_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    CommentAdded {
        id: String,
        discussion_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Heartbeat/ping message
    Ping {
        timestamp: DateTime<Utc>,
    },
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the greeting so nothing is missed in between
    let mut rx = state.subscribe_ws();

    info!("New WebSocket client connected");

    let ping = WsMessage::Ping {
        timestamp: Utc::now(),
    };
    if let Ok(json) = serde_json::to_string(&ping) {
        let _ = sender.send(Message::Text(json)).await;
    }

    // Forward broadcast messages to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize WebSocket message: {}", e),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagging, skipped {} messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Incoming messages are only drained; clients do not send commands
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => debug!("Received WebSocket message: {}", text),
                Ok(Message::Close(_)) => {
                    info!("WebSocket client disconnected");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("WebSocket connection closed");
}
