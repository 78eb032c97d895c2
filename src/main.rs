use anyhow::{Context, Result};
use chrono::Utc;
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod error;
mod models;
mod prices;
mod services;
mod storage;
mod web;

use crate::api::{CoinGeckoClient, PriceSource, RemoteStore, SupabaseClient};
use crate::config::Config;
use crate::prices::PricePoller;
use crate::storage::LocalStore;
use crate::web::websocket::WsMessage;
use crate::web::AppState;

const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let remote: Option<Arc<dyn RemoteStore>> = match config.supabase_credentials() {
        Some((url, key)) => {
            let client = SupabaseClient::new(url, key)?;
            info!("Remote store client initialized");
            Some(Arc::new(client))
        }
        None => {
            warn!("SUPABASE_URL/SUPABASE_ANON_KEY not set, running in offline mode with bundled data");
            None
        }
    };

    let source: Arc<dyn PriceSource> = Arc::new(CoinGeckoClient::new(
        &config.coingecko_base_url,
        config.coingecko_api_key.clone(),
    )?);
    info!("Price API client initialized");

    let local = LocalStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open local cache in {}", config.data_dir.display()))?;

    let state = AppState::new(config.clone(), remote, source, local);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    let poller = PricePoller::new(
        state.tokens.clone(),
        state.prices.clone(),
        state.ws_tx.clone(),
        config.price_poll_interval(),
    );
    tasks.push(poller.spawn(shutdown_rx.clone()));

    for limiter in &state.limiters {
        tasks.push(
            limiter
                .clone()
                .spawn_cleanup(LIMITER_CLEANUP_INTERVAL, shutdown_rx.clone()),
        );
    }

    tasks.push(spawn_heartbeat(state.clone(), shutdown_rx.clone()));

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    web::server::start_server(state, shutdown_rx).await?;

    for task in tasks {
        let _ = task.await;
    }
    info!("Shutdown complete");
    Ok(())
}

/// Keep idle WebSocket connections alive through proxies.
fn spawn_heartbeat(state: AppState, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => state.broadcast(WsMessage::Ping { timestamp: Utc::now() }),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
