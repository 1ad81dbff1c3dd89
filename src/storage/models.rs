use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StashError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    pub fn parse(s: &str) -> Option<Sentiment> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub video_id: String,
    pub video_url: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub post_time: Option<String>,
    pub music: Option<String>,
    pub tags: BTreeSet<String>,
    pub crawled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub video_id: String,
    pub video_url: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub comments: i64,
    pub post_time: Option<String>,
    pub music: Option<String>,
    pub tags: BTreeSet<String>,
    /// Falls back to the ingestion time when absent.
    pub crawled_at: Option<DateTime<Utc>>,
}

impl NewVideo {
    pub fn validate(&self) -> Result<()> {
        if self.video_id.trim().is_empty() {
            return Err(StashError::InvalidInput("video_id must not be empty".into()));
        }
        if self.video_url.trim().is_empty() {
            return Err(StashError::InvalidInput(format!(
                "video {} has no URL",
                self.video_id
            )));
        }
        for (name, value) in [
            ("views", self.views),
            ("likes", self.likes),
            ("shares", self.shares),
            ("comments", self.comments),
        ] {
            if value < 0 {
                return Err(StashError::InvalidInput(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub comment_id: i64,
    pub video_id: String,
    pub username: String,
    pub comment_text: Option<String>,
    pub likes: i64,
    pub comment_time: Option<String>,
    pub replies_count: i64,
    pub is_reply: bool,
    pub parent_comment_id: Option<i64>,
    pub sentiment: Option<Sentiment>,
    pub hashtags: BTreeSet<String>,
    pub crawled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub video_id: String,
    pub username: String,
    pub comment_text: Option<String>,
    pub likes: i64,
    pub comment_time: Option<String>,
    pub replies_count: i64,
    pub is_reply: bool,
    /// Ignored unless `is_reply` is set.
    pub parent_comment_id: Option<i64>,
    pub sentiment: Option<Sentiment>,
    pub hashtags: BTreeSet<String>,
    pub crawled_at: Option<DateTime<Utc>>,
}

impl NewComment {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(StashError::InvalidInput(format!(
                "comment on video {} has no username",
                self.video_id
            )));
        }
        if self.likes < 0 || self.replies_count < 0 {
            return Err(StashError::InvalidInput(format!(
                "comment by {} has negative counters",
                self.username
            )));
        }
        Ok(())
    }

    pub fn effective_parent(&self) -> Option<i64> {
        if self.is_reply { self.parent_comment_id } else { None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub query_id: i64,
    pub keyword: String,
    /// Number of results the search returned when it was recorded.
    pub results_count: i64,
    /// Result rows currently stored; drops when result videos are deleted.
    pub stored_results: i64,
    pub created_at: DateTime<Utc>,
}

/// A comment written in the same batch as its video. `parent_index` points
/// at an earlier entry of the batch and is only honoured for replies.
#[derive(Debug, Clone, Default)]
pub struct BatchComment {
    pub comment: NewComment,
    pub parent_index: Option<usize>,
}

/// A video and its comments, written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct VideoImport {
    pub video: NewVideo,
    pub comments: Vec<BatchComment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub result_id: i64,
    pub query_id: i64,
    pub video_id: String,
    pub rank: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedVideo {
    pub rank: i64,
    pub video: Video,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementStats {
    pub video_id: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub total_comments: i64,
    pub unique_commenters: i64,
    pub avg_likes_per_comment: Option<f64>,
    pub main_comments: i64,
    pub replies: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentDistribution {
    pub video_id: String,
    pub total_comments: i64,
    pub positive_count: i64,
    pub neutral_count: i64,
    pub negative_count: i64,
    pub unclassified_count: i64,
    pub positive_percentage: Option<i64>,
    pub negative_percentage: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentedVideo {
    pub video_id: String,
    pub video_url: String,
    pub comment_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserActivity {
    pub username: String,
    pub comment_count: i64,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub videos_count: i64,
    pub comments_count: i64,
    pub unique_users: i64,
    pub search_queries_count: i64,
    pub most_commented_video: Option<CommentedVideo>,
    pub top_users: Vec<UserActivity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HashtagCount {
    pub hashtag: String,
    pub count: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct PurgeSummary {
    pub videos: i64,
    pub comments: i64,
    pub search_queries: i64,
}

#[derive(Debug, Default)]
pub struct VideoFilter {
    pub author: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl VideoFilter {
    pub fn effective_limit(&self) -> i64 {
        if self.limit <= 0 { 50 } else { self.limit }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommentFilter {
    pub video_id: Option<String>,
    pub username: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub unclassified_only: bool,
    pub is_reply: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

impl CommentFilter {
    pub fn effective_limit(&self) -> i64 {
        if self.limit <= 0 { 100 } else { self.limit }
    }
}
