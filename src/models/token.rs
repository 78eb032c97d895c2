use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the hypothetical seed-round investment used for "what would it be worth" figures.
pub const HYPOTHETICAL_INVESTMENT_USD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TokenStatus {
    #[serde(rename = "Live")]
    Live,
    #[serde(rename = "Live (Vested)", alias = "Live-Vested")]
    LiveVested,
    #[serde(rename = "Pending TGE")]
    PendingTge,
    #[serde(rename = "ICO Soon")]
    IcoSoon,
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl TokenStatus {
    /// Whether the token trades and therefore has a live price worth polling.
    pub fn is_trading(&self) -> bool {
        matches!(self, Self::Live | Self::LiveVested)
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "Live"),
            Self::LiveVested => write!(f, "Live (Vested)"),
            Self::PendingTge => write!(f, "Pending TGE"),
            Self::IcoSoon => write!(f, "ICO Soon"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenLinks {
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub telegram: Option<String>,
}

/// Token release terms after TGE.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VestingSchedule {
    pub tge_unlock_percent: f64,
    pub cliff_months: u32,
    pub vesting_months: u32,
}

impl VestingSchedule {
    /// Percentage of the allocation unlocked `months_since_tge` months after TGE.
    ///
    /// The TGE unlock is released immediately; the remainder vests linearly
    /// over `vesting_months` starting once the cliff has passed.
    pub fn unlocked_percent(&self, months_since_tge: f64) -> f64 {
        if months_since_tge < 0.0 {
            return 0.0;
        }
        let tge = self.tge_unlock_percent.clamp(0.0, 100.0);
        let remainder = 100.0 - tge;
        let after_cliff = months_since_tge - self.cliff_months as f64;
        if after_cliff <= 0.0 {
            return tge;
        }
        if self.vesting_months == 0 {
            return 100.0;
        }
        let vested = remainder * (after_cliff / self.vesting_months as f64).min(1.0);
        (tge + vested).min(100.0)
    }

    /// Months until the allocation is fully unlocked, counted from TGE.
    pub fn total_months(&self) -> u32 {
        self.cliff_months + self.vesting_months
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub status: TokenStatus,
    /// ISO date (YYYY-MM-DD) or "TBD"
    pub launch_date: String,
    pub seed_price: f64,
    #[serde(default)]
    pub live_price: Option<f64>,
    #[serde(default)]
    pub roi_percent: Option<f64>,
    #[serde(default)]
    pub investment_value: Option<f64>,
    #[serde(default)]
    pub vesting: Option<String>,
    #[serde(default)]
    pub vesting_schedule: Option<VestingSchedule>,
    #[serde(default)]
    pub links: Option<TokenLinks>,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    #[serde(default)]
    pub price_updated_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Apply a fresh price and recompute the derived fields.
    pub fn apply_price(&mut self, price: f64, at: DateTime<Utc>) {
        self.live_price = Some(price);
        self.roi_percent = roi_percent(self.seed_price, price);
        self.investment_value = investment_value(self.seed_price, price);
        self.price_updated_at = Some(at);
    }

    /// Parsed launch date; `None` for "TBD" or anything unparseable.
    pub fn launch_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.launch_date.trim(), "%Y-%m-%d").ok()
    }

    /// Unlocked share of the allocation at `now`, 0 before TGE or without a schedule.
    pub fn unlocked_percent_at(&self, now: DateTime<Utc>) -> f64 {
        let (Some(schedule), Some(launch)) = (self.vesting_schedule, self.launch_date()) else {
            return 0.0;
        };
        let days = (now.date_naive() - launch).num_days();
        if days < 0 {
            return 0.0;
        }
        // Average Gregorian month length
        schedule.unlocked_percent(days as f64 / 30.436875)
    }
}

/// Percentage change from seed price to current price.
pub fn roi_percent(seed_price: f64, current_price: f64) -> Option<f64> {
    if seed_price <= 0.0 || current_price <= 0.0 {
        return None;
    }
    Some((current_price - seed_price) / seed_price * 100.0)
}

/// Value today of a [`HYPOTHETICAL_INVESTMENT_USD`] seed-round investment.
pub fn investment_value(seed_price: f64, current_price: f64) -> Option<f64> {
    if seed_price <= 0.0 || current_price <= 0.0 {
        return None;
    }
    Some(HYPOTHETICAL_INVESTMENT_USD * (1.0 + (current_price - seed_price) / seed_price))
}

pub fn format_roi(roi: f64) -> String {
    if roi >= 0.0 {
        format!("+{:.2}%", roi)
    } else {
        format!("{:.2}%", roi)
    }
}

pub fn format_usd(value: f64) -> String {
    format!("${:.2}", value)
}
