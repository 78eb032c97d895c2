use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    // Remote store; both must be set for online mode
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,

    pub coingecko_base_url: String,
    pub coingecko_api_key: Option<String>,

    pub api_host: Option<String>,
    pub api_port: Option<u16>,
    pub data_dir: PathBuf,

    // Cache lifetimes
    pub price_memory_ttl_secs: u64,
    pub price_remote_ttl_secs: u64,
    pub ath_ttl_secs: u64,
    pub token_cache_ttl_secs: u64,

    // Outbound price API behaviour
    pub price_poll_interval_secs: u64,
    pub price_queue_delay_ms: u64,
    pub fetch_retries: u32,
    pub fetch_retry_delay_ms: u64,

    // Write rate limits (per hashed identity)
    pub vote_rate_limit: usize,
    pub vote_rate_window_secs: u64,
    pub discussion_rate_limit: usize,
    pub discussion_rate_window_secs: u64,
    pub comment_rate_limit: usize,
    pub comment_rate_window_secs: u64,

    pub identity_salt: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            supabase_url: non_empty_var("SUPABASE_URL"),
            supabase_anon_key: non_empty_var("SUPABASE_ANON_KEY"),

            coingecko_base_url: env::var("COINGECKO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_BASE_URL.to_string()),
            coingecko_api_key: non_empty_var("COINGECKO_API_KEY"),

            api_host: env::var("API_HOST").ok(),
            api_port: env::var("API_PORT")
                .ok()
                .map(|p| p.parse())
                .transpose()
                .context("Failed to parse API_PORT")?,
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),

            price_memory_ttl_secs: parse_var("PRICE_MEMORY_TTL_SECS", 120)?,
            price_remote_ttl_secs: parse_var("PRICE_REMOTE_TTL_SECS", 600)?,
            ath_ttl_secs: parse_var("ATH_TTL_SECS", 86_400)?,
            token_cache_ttl_secs: parse_var("TOKEN_CACHE_TTL_SECS", 300)?,

            price_poll_interval_secs: parse_var("PRICE_POLL_INTERVAL_SECS", 30)?,
            price_queue_delay_ms: parse_var("PRICE_QUEUE_DELAY_MS", 1200)?,
            fetch_retries: parse_var("FETCH_RETRIES", 2)?,
            fetch_retry_delay_ms: parse_var("FETCH_RETRY_DELAY_MS", 1000)?,

            vote_rate_limit: parse_var("VOTE_RATE_LIMIT", 5)?,
            vote_rate_window_secs: parse_var("VOTE_RATE_WINDOW_SECS", 60)?,
            discussion_rate_limit: parse_var("DISCUSSION_RATE_LIMIT", 3)?,
            discussion_rate_window_secs: parse_var("DISCUSSION_RATE_WINDOW_SECS", 600)?,
            comment_rate_limit: parse_var("COMMENT_RATE_LIMIT", 10)?,
            comment_rate_window_secs: parse_var("COMMENT_RATE_WINDOW_SECS", 300)?,

            identity_salt: env::var("IDENTITY_SALT").unwrap_or_else(|_| "legion-tracker".to_string()),
        })
    }

    /// Remote store credentials, if both are present.
    pub fn supabase_credentials(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.supabase_credentials().is_none()
    }

    pub fn price_memory_ttl(&self) -> Duration {
        Duration::from_secs(self.price_memory_ttl_secs)
    }

    pub fn price_remote_ttl(&self) -> Duration {
        Duration::from_secs(self.price_remote_ttl_secs)
    }

    pub fn ath_ttl(&self) -> Duration {
        Duration::from_secs(self.ath_ttl_secs)
    }

    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }

    pub fn price_poll_interval(&self) -> Duration {
        Duration::from_secs(self.price_poll_interval_secs)
    }

    pub fn price_queue_delay(&self) -> Duration {
        Duration::from_millis(self.price_queue_delay_ms)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            coingecko_base_url: DEFAULT_COINGECKO_BASE_URL.to_string(),
            coingecko_api_key: None,
            api_host: None,
            api_port: None,
            data_dir: PathBuf::from("data"),
            price_memory_ttl_secs: 120,
            price_remote_ttl_secs: 600,
            ath_ttl_secs: 86_400,
            token_cache_ttl_secs: 300,
            price_poll_interval_secs: 30,
            price_queue_delay_ms: 1200,
            fetch_retries: 2,
            fetch_retry_delay_ms: 1000,
            vote_rate_limit: 5,
            vote_rate_window_secs: 60,
            discussion_rate_limit: 3,
            discussion_rate_window_secs: 600,
            comment_rate_limit: 10,
            comment_rate_window_secs: 300,
            identity_salt: "legion-tracker".to_string(),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}", name)),
        Err(_) => Ok(default),
    }
}
