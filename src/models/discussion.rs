use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discussion {
    pub id: String,
    pub token_id: String,
    pub title: String,
    pub content: String,
    pub author_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub discussion_id: String,
    pub content: String,
    pub author_hash: String,
    pub created_at: DateTime<Utc>,
}
