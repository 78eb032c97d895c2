use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the window votes are tallied over, and within which an identity may vote once.
pub const SENTIMENT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Bullish,
    Bearish,
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

/// Append-only vote row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentVote {
    pub token_id: String,
    pub ip_hash: String,
    pub vote: VoteKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentimentTally {
    pub token_id: String,
    pub bullish: u64,
    pub bearish: u64,
}

impl SentimentTally {
    pub fn empty(token_id: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> u64 {
        self.bullish + self.bearish
    }

    pub fn increment(&mut self, vote: VoteKind) {
        match vote {
            VoteKind::Bullish => self.bullish += 1,
            VoteKind::Bearish => self.bearish += 1,
        }
    }

    /// Undo a previously applied vote.
    pub fn decrement(&mut self, vote: VoteKind) {
        match vote {
            VoteKind::Bullish => self.bullish = self.bullish.saturating_sub(1),
            VoteKind::Bearish => self.bearish = self.bearish.saturating_sub(1),
        }
    }

    /// Bullish share of all votes, `None` with no votes.
    pub fn bullish_percent(&self) -> Option<f64> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some(self.bullish as f64 / total as f64 * 100.0)
    }
}

/// Result of a vote submission. A duplicate vote is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Recorded(SentimentTally),
    AlreadyVoted(SentimentTally),
}
