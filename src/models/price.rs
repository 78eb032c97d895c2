use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache tier a price was served from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Memory,
    Local,
    Remote,
    Live,
    Fallback,
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
            Self::Live => write!(f, "live"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub coin_id: String,
    pub price_usd: f64,
    pub source: PriceTier,
    pub fetched_at: DateTime<Utc>,
}

/// All-time high and low, from the price API's detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AthAtl {
    pub ath: Option<f64>,
    pub ath_date: Option<DateTime<Utc>>,
    pub atl: Option<f64>,
    pub atl_date: Option<DateTime<Utc>>,
}

/// Row in the remote shared price cache table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedPriceRow {
    pub coin_id: String,
    pub price_usd: f64,
    pub updated_at: DateTime<Utc>,
}
