pub mod discussions;
pub mod identity;
pub mod sanitize;
pub mod sentiment;
pub mod static_data;
pub mod tokens;

pub use discussions::DiscussionService;
pub use identity::IdentityHasher;
pub use sentiment::SentimentService;
pub use tokens::TokenService;
