//! Live price poller
//!
//! Refreshes the price of every trading token on a fixed interval and
//! broadcasts the result to WebSocket subscribers. A failed tick is logged;
//! the next tick runs regardless.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::service::PriceService;
use crate::services::TokenService;
use crate::web::websocket::WsMessage;

pub struct PricePoller {
    tokens: Arc<TokenService>,
    prices: Arc<PriceService>,
    events: broadcast::Sender<WsMessage>,
    every: Duration,
}

impl PricePoller {
    pub fn new(
        tokens: Arc<TokenService>,
        prices: Arc<PriceService>,
        events: broadcast::Sender<WsMessage>,
        every: Duration,
    ) -> Self {
        Self {
            tokens,
            prices,
            events,
            every,
        }
    }

    /// One refresh pass. Returns how many tokens got a price.
    pub async fn tick(&self) -> usize {
        let tokens: Vec<_> = self
            .tokens
            .fetch_tokens_from_database()
            .await
            .into_iter()
            .filter(|t| t.status.is_trading() && t.coingecko_id.is_some())
            .collect();
        let coin_ids: Vec<String> = tokens.iter().filter_map(|t| t.coingecko_id.clone()).collect();
        let quotes = self.prices.get_prices(&coin_ids).await;
        let mut updated = 0;

        for mut token in tokens {
            let Some(quote) = token.coingecko_id.as_ref().and_then(|id| quotes.get(id)) else {
                debug!("No price for {} this tick", token.symbol);
                continue;
            };

            token.apply_price(quote.price_usd, quote.fetched_at);
            updated += 1;

            // Ignore errors (no subscribers)
            let _ = self.events.send(WsMessage::PriceUpdate {
                token_id: token.id.clone(),
                symbol: token.symbol.clone(),
                price_usd: quote.price_usd,
                roi_percent: token.roi_percent,
                investment_value: token.investment_value,
                source: quote.source,
                timestamp: Utc::now(),
            });
        }

        let purged = self.prices.purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired price cache entries", purged);
        }
        updated
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Price poller running every {:?}", self.every);
            let mut ticker = interval(self.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let updated = self.tick().await;
                        debug!("Price poll refreshed {} tokens", updated);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Price poller stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
