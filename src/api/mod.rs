pub mod coingecko;
pub mod price_source;
pub mod retry;
pub mod store;
pub mod supabase;

#[cfg(test)]
pub mod fakes;

pub use coingecko::CoinGeckoClient;
pub use price_source::PriceSource;
pub use retry::RetryPolicy;
pub use store::RemoteStore;
pub use supabase::SupabaseClient;
