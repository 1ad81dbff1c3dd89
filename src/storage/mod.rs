pub mod models;
pub mod schema;
pub mod sqlite;

use crate::errors::Result;
use models::{
    Comment, CommentFilter, DatabaseStats, EngagementStats, HashtagCount, NewComment, NewVideo,
    PurgeSummary, RankedVideo, SearchQuery, SearchResult, Sentiment, SentimentDistribution, Video,
    VideoFilter, VideoImport,
};

/// Write and lookup operations over the scraped dataset.
pub trait ScrapeStorage {
    fn upsert_video(&self, video: NewVideo) -> Result<Video>;
    fn get_video(&self, video_id: &str) -> Result<Video>;
    fn list_videos(&self, filter: VideoFilter) -> Result<Vec<Video>>;
    fn delete_video(&self, video_id: &str) -> Result<bool>;

    fn insert_comment(&self, comment: NewComment) -> Result<Comment>;
    fn insert_comments(&self, comments: Vec<NewComment>) -> Result<Vec<Comment>>;
    fn get_comment(&self, comment_id: i64) -> Result<Comment>;
    fn list_comments(&self, filter: CommentFilter) -> Result<Vec<Comment>>;
    fn replies_to(&self, comment_id: i64) -> Result<Vec<Comment>>;
    fn set_sentiment(&self, comment_id: i64, sentiment: Option<Sentiment>) -> Result<()>;

    fn record_search(&self, keyword: &str, video_ids: &[String]) -> Result<SearchQuery>;
    fn add_search_result(&self, query_id: i64, video_id: &str, rank: i64) -> Result<SearchResult>;
    fn get_search(&self, query_id: i64) -> Result<SearchQuery>;
    fn list_searches(&self, limit: i64) -> Result<Vec<SearchQuery>>;
    fn search_results(&self, query_id: i64) -> Result<Vec<RankedVideo>>;
    fn delete_search(&self, query_id: i64) -> Result<bool>;

    /// Upserts the video and appends its comments atomically.
    fn import_video(&self, import: VideoImport) -> Result<Vec<Comment>>;
    /// Imports every video and records the search (document order as rank)
    /// in one transaction. Nothing is kept when any part fails.
    fn import_search(
        &self,
        keyword: &str,
        imports: Vec<VideoImport>,
    ) -> Result<(SearchQuery, Vec<Vec<Comment>>)>;

    fn purge_all(&self) -> Result<PurgeSummary>;
}

/// Read-only projections computed at query time.
pub trait AnalyticsStorage {
    fn engagement_stats(&self, video_id: &str) -> Result<EngagementStats>;
    fn all_engagement_stats(&self) -> Result<Vec<EngagementStats>>;
    fn sentiment_distribution(&self, video_id: &str) -> Result<SentimentDistribution>;
    fn all_sentiment_distributions(&self) -> Result<Vec<SentimentDistribution>>;
    fn database_stats(&self) -> Result<DatabaseStats>;
    fn popular_hashtags(&self, limit: i64) -> Result<Vec<HashtagCount>>;
}
