pub mod local_store;
pub mod rate_limiter;
pub mod ttl_cache;

pub use local_store::LocalStore;
pub use rate_limiter::RateLimiter;
pub use ttl_cache::TtlCache;
