pub mod discussion;
pub mod price;
pub mod sale;
pub mod sentiment;
pub mod token;

// Re-export commonly used types
pub use discussion::{Comment, Discussion};
pub use price::{AthAtl, CachedPriceRow, PriceQuote, PriceTier};
pub use sale::TokenSale;
pub use sentiment::{SentimentTally, SentimentVote, VoteKind, VoteOutcome, SENTIMENT_WINDOW_HOURS};
pub use token::{format_roi, format_usd, Token, TokenLinks, TokenStatus, VestingSchedule};
