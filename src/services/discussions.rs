//! Per-token discussion threads and their comments.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use super::identity::IdentityHasher;
use super::sanitize::{
    sanitize_text, validate_id, COMMENT_MAX_LEN, DISCUSSION_MAX_LEN, TITLE_MAX_LEN, TITLE_MIN_LEN,
};
use super::tokens::TokenService;
use crate::api::RemoteStore;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Comment, Discussion};
use crate::storage::RateLimiter;
use crate::web::websocket::WsMessage;

pub struct DiscussionService {
    remote: Option<Arc<dyn RemoteStore>>,
    tokens: Arc<TokenService>,
    discussion_limiter: Arc<RateLimiter>,
    comment_limiter: Arc<RateLimiter>,
    hasher: IdentityHasher,
    events: Option<broadcast::Sender<WsMessage>>,
}

impl DiscussionService {
    pub fn new(
        remote: Option<Arc<dyn RemoteStore>>,
        tokens: Arc<TokenService>,
        discussion_limiter: Arc<RateLimiter>,
        comment_limiter: Arc<RateLimiter>,
        hasher: IdentityHasher,
    ) -> Self {
        Self {
            remote,
            tokens,
            discussion_limiter,
            comment_limiter,
            hasher,
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Sender<WsMessage>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn create_discussion(
        &self,
        token_id: &str,
        ip: &str,
        title: &str,
        content: &str,
    ) -> TrackerResult<Discussion> {
        validate_id("token id", token_id)?;
        let title = sanitize_text("title", title, TITLE_MIN_LEN, TITLE_MAX_LEN)?;
        let content = sanitize_text("content", content, 1, DISCUSSION_MAX_LEN)?;

        if self.tokens.fetch_token_details(token_id).await.is_none() {
            return Err(TrackerError::NotFound(format!("token {}", token_id)));
        }
        let remote = self.remote.as_ref().ok_or(TrackerError::Offline)?;

        let author_hash = self.hasher.hash(ip);
        check_limit(&self.discussion_limiter, &author_hash).await?;

        let discussion = Discussion {
            id: Uuid::new_v4().to_string(),
            token_id: token_id.to_string(),
            title,
            content,
            author_hash,
            created_at: Utc::now(),
        };
        remote.insert_discussion(&discussion).await?;
        info!("New discussion {} on {}", discussion.id, token_id);

        self.publish(WsMessage::DiscussionCreated {
            id: discussion.id.clone(),
            token_id: discussion.token_id.clone(),
            title: discussion.title.clone(),
            timestamp: discussion.created_at,
        });
        Ok(discussion)
    }

    pub async fn add_comment(&self, discussion_id: &str, ip: &str, content: &str) -> TrackerResult<Comment> {
        validate_id("discussion id", discussion_id)?;
        let content = sanitize_text("comment", content, 1, COMMENT_MAX_LEN)?;
        let remote = self.remote.as_ref().ok_or(TrackerError::Offline)?;

        let author_hash = self.hasher.hash(ip);
        check_limit(&self.comment_limiter, &author_hash).await?;

        if remote.fetch_discussion(discussion_id).await?.is_none() {
            return Err(TrackerError::NotFound(format!("discussion {}", discussion_id)));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            discussion_id: discussion_id.to_string(),
            content,
            author_hash,
            created_at: Utc::now(),
        };
        remote.insert_comment(&comment).await?;

        self.publish(WsMessage::CommentAdded {
            id: comment.id.clone(),
            discussion_id: comment.discussion_id.clone(),
            timestamp: comment.created_at,
        });
        Ok(comment)
    }

    /// Newest first; empty when offline or on error.
    pub async fn list_discussions(&self, token_id: &str) -> TrackerResult<Vec<Discussion>> {
        validate_id("token id", token_id)?;
        let Some(remote) = &self.remote else {
            return Ok(Vec::new());
        };
        match remote.list_discussions(token_id).await {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("Failed to list discussions for {}: {}", token_id, e);
                Ok(Vec::new())
            }
        }
    }

    /// Oldest first; empty when offline or on error.
    pub async fn list_comments(&self, discussion_id: &str) -> TrackerResult<Vec<Comment>> {
        validate_id("discussion id", discussion_id)?;
        let Some(remote) = &self.remote else {
            return Ok(Vec::new());
        };
        match remote.list_comments(discussion_id).await {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("Failed to list comments for {}: {}", discussion_id, e);
                Ok(Vec::new())
            }
        }
    }

    fn publish(&self, msg: WsMessage) {
        if let Some(events) = &self.events {
            let _ = events.send(msg);
        }
    }
}

async fn check_limit(limiter: &RateLimiter, key: &str) -> TrackerResult<()> {
    if limiter.try_request(key).await {
        return Ok(());
    }
    let retry_after = limiter.retry_after(key).await;
    Err(TrackerError::RateLimited {
        retry_after_secs: retry_after.as_secs().max(1),
    })
}
