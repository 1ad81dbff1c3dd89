use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, ffi, params};
use tracing::{debug, info};

use super::models::{
    Comment, CommentFilter, CommentedVideo, DatabaseStats, EngagementStats, HashtagCount,
    NewComment, NewVideo, PurgeSummary, RankedVideo, SearchQuery, SearchResult, Sentiment,
    SentimentDistribution, UserActivity, Video, VideoFilter, VideoImport,
};
use super::schema;
use super::{AnalyticsStorage, ScrapeStorage};
use crate::errors::{Result, StashError};

// Unit separator; tags and hashtags never contain it.
const SET_SEPARATOR: char = '\u{1f}';

const VIDEO_SELECT: &str = "
    SELECT videos.video_id, videos.video_url, videos.author, videos.title,
           videos.description, videos.views, videos.likes, videos.shares,
           videos.comments, videos.post_time, videos.music, videos.crawled_at,
           GROUP_CONCAT(t.tag, char(31)) AS tags
    FROM videos
    LEFT JOIN video_tags t ON t.video_id = videos.video_id
";

const COMMENT_SELECT: &str = "
    SELECT comments.comment_id, comments.video_id, comments.username,
           comments.comment_text, comments.likes, comments.comment_time,
           comments.replies_count, comments.is_reply, comments.parent_comment_id,
           comments.sentiment, comments.crawled_at,
           GROUP_CONCAT(h.hashtag, char(31)) AS hashtags
    FROM comments
    LEFT JOIN comment_hashtags h ON h.comment_id = comments.comment_id
";

const SEARCH_SELECT: &str = "
    SELECT q.query_id, q.keyword, q.results_count,
           (SELECT COUNT(*) FROM search_results r WHERE r.query_id = q.query_id),
           q.created_at
    FROM search_queries q
";

const ENGAGEMENT_SELECT: &str = "
    SELECT video_id, author, title, total_comments, unique_commenters,
           avg_likes_per_comment, main_comments, replies
    FROM video_engagement_stats
";

const SENTIMENT_SELECT: &str = "
    SELECT video_id, total_comments, positive_count, neutral_count, negative_count,
           unclassified_count, positive_percentage, negative_percentage
    FROM video_sentiment_distribution
";

pub struct SqliteStorage {
    conn: Connection,
}

fn split_set(joined: Option<String>) -> BTreeSet<String> {
    match joined {
        Some(s) if !s.is_empty() => s.split(SET_SEPARATOR).map(String::from).collect(),
        _ => BTreeSet::new(),
    }
}

fn row_to_video(row: &Row) -> rusqlite::Result<Video> {
    Ok(Video {
        video_id: row.get(0)?,
        video_url: row.get(1)?,
        author: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        views: row.get(5)?,
        likes: row.get(6)?,
        shares: row.get(7)?,
        comments: row.get(8)?,
        post_time: row.get(9)?,
        music: row.get(10)?,
        crawled_at: row.get(11)?,
        tags: split_set(row.get(12)?),
    })
}

fn row_to_comment(row: &Row) -> rusqlite::Result<Comment> {
    let is_reply: i32 = row.get(7)?;
    let sentiment: Option<String> = row.get(9)?;
    Ok(Comment {
        comment_id: row.get(0)?,
        video_id: row.get(1)?,
        username: row.get(2)?,
        comment_text: row.get(3)?,
        likes: row.get(4)?,
        comment_time: row.get(5)?,
        replies_count: row.get(6)?,
        is_reply: is_reply != 0,
        parent_comment_id: row.get(8)?,
        sentiment: sentiment.as_deref().and_then(Sentiment::parse),
        crawled_at: row.get(10)?,
        hashtags: split_set(row.get(11)?),
    })
}

fn row_to_search(row: &Row) -> rusqlite::Result<SearchQuery> {
    Ok(SearchQuery {
        query_id: row.get(0)?,
        keyword: row.get(1)?,
        results_count: row.get(2)?,
        stored_results: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_engagement(row: &Row) -> rusqlite::Result<EngagementStats> {
    Ok(EngagementStats {
        video_id: row.get(0)?,
        author: row.get(1)?,
        title: row.get(2)?,
        total_comments: row.get(3)?,
        unique_commenters: row.get(4)?,
        avg_likes_per_comment: row.get(5)?,
        main_comments: row.get(6)?,
        replies: row.get(7)?,
    })
}

fn row_to_sentiment(row: &Row) -> rusqlite::Result<SentimentDistribution> {
    Ok(SentimentDistribution {
        video_id: row.get(0)?,
        total_comments: row.get(1)?,
        positive_count: row.get(2)?,
        neutral_count: row.get(3)?,
        negative_count: row.get(4)?,
        unclassified_count: row.get(5)?,
        positive_percentage: row.get(6)?,
        negative_percentage: row.get(7)?,
    })
}

/// Translates SQLite constraint failures into the crate's error kinds.
fn constraint_error(err: rusqlite::Error, context: &str) -> StashError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return StashError::Integrity(format!("{}: referenced row does not exist", context));
            }
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StashError::Conflict(format!("{}: duplicate key", context));
            }
            ffi::SQLITE_CONSTRAINT_CHECK => {
                return StashError::InvalidInput(format!("{}: value out of range", context));
            }
            _ => {}
        }
    }
    StashError::Storage(err)
}

fn not_found(err: rusqlite::Error, what: String) -> StashError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StashError::NotFound(what),
        other => StashError::Storage(other),
    }
}

fn insert_comment_row(conn: &Connection, comment: &NewComment) -> Result<i64> {
    comment.validate()?;
    let parent = comment.effective_parent();
    if let Some(parent_id) = parent {
        let parent_video: Option<String> = conn
            .query_row(
                "SELECT video_id FROM comments WHERE comment_id = ?",
                params![parent_id],
                |row| row.get(0),
            )
            .optional()?;
        match parent_video {
            None => {
                return Err(StashError::Integrity(format!(
                    "parent comment {} does not exist",
                    parent_id
                )));
            }
            Some(ref video_id) if *video_id != comment.video_id => {
                return Err(StashError::Integrity(format!(
                    "parent comment {} belongs to video {}, not {}",
                    parent_id, video_id, comment.video_id
                )));
            }
            Some(_) => {}
        }
    }

    let crawled_at = comment.crawled_at.unwrap_or_else(Utc::now);
    conn.execute(
        "INSERT INTO comments (video_id, username, comment_text, likes, comment_time,
                               replies_count, is_reply, parent_comment_id, sentiment, crawled_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            comment.video_id,
            comment.username,
            comment.comment_text,
            comment.likes,
            comment.comment_time,
            comment.replies_count,
            comment.is_reply as i32,
            parent,
            comment.sentiment.map(|s| s.as_str()),
            crawled_at,
        ],
    )
    .map_err(|e| constraint_error(e, &format!("comment on video {}", comment.video_id)))?;
    let comment_id = conn.last_insert_rowid();

    for hashtag in &comment.hashtags {
        conn.execute(
            "INSERT OR IGNORE INTO comment_hashtags (comment_id, hashtag) VALUES (?, ?)",
            params![comment_id, hashtag],
        )?;
    }
    Ok(comment_id)
}

fn insert_search_result_row(
    conn: &Connection,
    query_id: i64,
    video_id: &str,
    rank: i64,
) -> Result<i64> {
    if rank < 1 {
        return Err(StashError::InvalidInput(format!("rank must be >= 1, got {}", rank)));
    }
    conn.execute(
        "INSERT INTO search_results (query_id, video_id, rank, created_at) VALUES (?, ?, ?, ?)",
        params![query_id, video_id, rank, Utc::now()],
    )
    .map_err(|e| {
        constraint_error(
            e,
            &format!("search result #{} of query {} ({})", rank, query_id, video_id),
        )
    })?;
    Ok(conn.last_insert_rowid())
}

fn upsert_video_row(conn: &Connection, video: &NewVideo) -> Result<bool> {
    video.validate()?;
    let crawled_at = video.crawled_at.unwrap_or_else(Utc::now);
    let existed = conn
        .query_row(
            "SELECT 1 FROM videos WHERE video_id = ?",
            params![video.video_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    // ON CONFLICT keeps the row (and its dependents) instead of replacing it.
    conn.execute(
        "INSERT INTO videos (video_id, video_url, author, title, description, views, likes,
                             shares, comments, post_time, music, crawled_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(video_id) DO UPDATE SET
             video_url = excluded.video_url,
             author = excluded.author,
             title = excluded.title,
             description = excluded.description,
             views = excluded.views,
             likes = excluded.likes,
             shares = excluded.shares,
             comments = excluded.comments,
             post_time = excluded.post_time,
             music = excluded.music,
             crawled_at = excluded.crawled_at",
        params![
            video.video_id,
            video.video_url,
            video.author,
            video.title,
            video.description,
            video.views,
            video.likes,
            video.shares,
            video.comments,
            video.post_time,
            video.music,
            crawled_at,
        ],
    )
    .map_err(|e| constraint_error(e, &format!("video {}", video.video_id)))?;

    conn.execute("DELETE FROM video_tags WHERE video_id = ?", params![video.video_id])?;
    for tag in &video.tags {
        conn.execute(
            "INSERT OR IGNORE INTO video_tags (video_id, tag) VALUES (?, ?)",
            params![video.video_id, tag],
        )?;
    }
    Ok(existed)
}

fn validate_keyword(keyword: &str) -> Result<()> {
    if keyword.trim().is_empty() {
        return Err(StashError::InvalidInput("search keyword must not be empty".into()));
    }
    Ok(())
}

fn record_search_rows(conn: &Connection, keyword: &str, video_ids: &[String]) -> Result<i64> {
    validate_keyword(keyword)?;
    conn.execute(
        "INSERT INTO search_queries (keyword, results_count, created_at) VALUES (?, ?, ?)",
        params![keyword, video_ids.len() as i64, Utc::now()],
    )?;
    let query_id = conn.last_insert_rowid();
    for (position, video_id) in video_ids.iter().enumerate() {
        insert_search_result_row(conn, query_id, video_id, position as i64 + 1)?;
    }
    Ok(query_id)
}

/// Writes a video and its comment batch. Reply parents are resolved from
/// batch positions to the ids assigned here.
fn import_video_rows(conn: &Connection, import: &VideoImport) -> Result<Vec<i64>> {
    upsert_video_row(conn, &import.video)?;
    let mut ids: Vec<i64> = Vec::with_capacity(import.comments.len());
    for (position, entry) in import.comments.iter().enumerate() {
        if entry.comment.video_id != import.video.video_id {
            return Err(StashError::InvalidInput(format!(
                "comment #{} belongs to video {}, not {}",
                position, entry.comment.video_id, import.video.video_id
            )));
        }
        let mut comment = entry.comment.clone();
        if let Some(index) = entry.parent_index.filter(|_| comment.is_reply) {
            let parent_id = ids.get(index).copied().ok_or_else(|| {
                StashError::Integrity(format!(
                    "comment #{} refers to batch entry {} which is not an earlier comment",
                    position, index
                ))
            })?;
            comment.parent_comment_id = Some(parent_id);
        }
        ids.push(insert_comment_row(conn, &comment)?);
    }
    Ok(ids)
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    Ok(conn.query_row(sql, [], |row| row.get(0))?)
}

impl SqliteStorage {
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for statement in schema::ALL {
            conn.execute(statement, [])?;
        }
        Ok(Self { conn })
    }

    /// Opens (or creates) a database file in WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened database");
        Self::new(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::new(conn)
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl ScrapeStorage for SqliteStorage {
    fn upsert_video(&self, video: NewVideo) -> Result<Video> {
        let tx = self.conn.unchecked_transaction()?;
        let existed = upsert_video_row(&tx, &video)?;
        tx.commit()?;

        if existed {
            info!(video_id = %video.video_id, "updated video");
        } else {
            info!(video_id = %video.video_id, "inserted video");
        }
        self.get_video(&video.video_id)
    }

    fn get_video(&self, video_id: &str) -> Result<Video> {
        let sql = format!("{} WHERE videos.video_id = ? GROUP BY videos.video_id", VIDEO_SELECT);
        self.conn
            .query_row(&sql, params![video_id], row_to_video)
            .map_err(|e| not_found(e, format!("Video {} not found", video_id)))
    }

    fn list_videos(&self, filter: VideoFilter) -> Result<Vec<Video>> {
        let (where_clause, author) = match filter.author.as_deref() {
            Some(author) => (
                "WHERE videos.author LIKE '%' || ? || '%' COLLATE NOCASE",
                Some(author),
            ),
            None => ("", None),
        };
        let sql = format!(
            "{} {} GROUP BY videos.video_id
             ORDER BY videos.crawled_at DESC, videos.video_id LIMIT ? OFFSET ?",
            VIDEO_SELECT, where_clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match author {
            Some(author) => stmt.query_map(
                params![author, filter.effective_limit(), filter.offset],
                row_to_video,
            )?,
            None => stmt.query_map(params![filter.effective_limit(), filter.offset], row_to_video)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn delete_video(&self, video_id: &str) -> Result<bool> {
        let changes = self
            .conn
            .execute("DELETE FROM videos WHERE video_id = ?", params![video_id])?;
        if changes > 0 {
            info!(video_id, "purged video and its dependents");
        }
        Ok(changes > 0)
    }

    fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let id = insert_comment_row(&self.conn, &comment)?;
        self.get_comment(id)
    }

    fn insert_comments(&self, comments: Vec<NewComment>) -> Result<Vec<Comment>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(comments.len());
        for comment in &comments {
            ids.push(insert_comment_row(&tx, comment)?);
        }
        tx.commit()?;
        debug!(count = ids.len(), "inserted comment batch");
        ids.into_iter().map(|id| self.get_comment(id)).collect()
    }

    fn get_comment(&self, comment_id: i64) -> Result<Comment> {
        let sql = format!(
            "{} WHERE comments.comment_id = ? GROUP BY comments.comment_id",
            COMMENT_SELECT
        );
        self.conn
            .query_row(&sql, params![comment_id], row_to_comment)
            .map_err(|e| not_found(e, format!("Comment with id {} not found", comment_id)))
    }

    fn list_comments(&self, filter: CommentFilter) -> Result<Vec<Comment>> {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref video_id) = filter.video_id {
            conditions.push("comments.video_id = ?");
            param_values.push(Box::new(video_id.clone()));
        }
        if let Some(ref username) = filter.username {
            conditions.push("comments.username LIKE '%' || ? || '%' COLLATE NOCASE");
            param_values.push(Box::new(username.clone()));
        }
        if let Some(sentiment) = filter.sentiment {
            conditions.push("comments.sentiment = ?");
            param_values.push(Box::new(sentiment.as_str()));
        }
        if filter.unclassified_only {
            conditions.push("comments.sentiment IS NULL");
        }
        if let Some(is_reply) = filter.is_reply {
            conditions.push("comments.is_reply = ?");
            param_values.push(Box::new(is_reply as i32));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "{} {} GROUP BY comments.comment_id ORDER BY comments.comment_id LIMIT ? OFFSET ?",
            COMMENT_SELECT, where_clause
        );

        param_values.push(Box::new(filter.effective_limit()));
        param_values.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let comments = stmt
            .query_map(param_refs.as_slice(), row_to_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    fn replies_to(&self, comment_id: i64) -> Result<Vec<Comment>> {
        self.get_comment(comment_id)?;
        let sql = format!(
            "{} WHERE comments.parent_comment_id = ?
             GROUP BY comments.comment_id ORDER BY comments.comment_id",
            COMMENT_SELECT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let replies = stmt
            .query_map(params![comment_id], row_to_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(replies)
    }

    fn set_sentiment(&self, comment_id: i64, sentiment: Option<Sentiment>) -> Result<()> {
        let changes = self.conn.execute(
            "UPDATE comments SET sentiment = ? WHERE comment_id = ?",
            params![sentiment.map(|s| s.as_str()), comment_id],
        )?;
        if changes == 0 {
            return Err(StashError::NotFound(format!(
                "Comment with id {} not found",
                comment_id
            )));
        }
        Ok(())
    }

    fn record_search(&self, keyword: &str, video_ids: &[String]) -> Result<SearchQuery> {
        validate_keyword(keyword)?;
        let tx = self.conn.unchecked_transaction()?;
        let query_id = record_search_rows(&tx, keyword, video_ids)?;
        tx.commit()?;
        info!(query_id, keyword, results = video_ids.len(), "recorded search");
        self.get_search(query_id)
    }

    fn import_video(&self, import: VideoImport) -> Result<Vec<Comment>> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = import_video_rows(&tx, &import)?;
        tx.commit()?;
        info!(video_id = %import.video.video_id, comments = ids.len(), "imported video");
        ids.into_iter().map(|id| self.get_comment(id)).collect()
    }

    fn import_search(
        &self,
        keyword: &str,
        imports: Vec<VideoImport>,
    ) -> Result<(SearchQuery, Vec<Vec<Comment>>)> {
        validate_keyword(keyword)?;
        let tx = self.conn.unchecked_transaction()?;
        let mut batches = Vec::with_capacity(imports.len());
        let mut video_ids = Vec::with_capacity(imports.len());
        for import in &imports {
            batches.push(import_video_rows(&tx, import)?);
            video_ids.push(import.video.video_id.clone());
        }
        let query_id = record_search_rows(&tx, keyword, &video_ids)?;
        tx.commit()?;
        info!(query_id, keyword, videos = video_ids.len(), "imported search");

        let comments = batches
            .into_iter()
            .map(|ids| {
                ids.into_iter()
                    .map(|id| self.get_comment(id))
                    .collect::<Result<Vec<Comment>>>()
            })
            .collect::<Result<Vec<Vec<Comment>>>>()?;
        Ok((self.get_search(query_id)?, comments))
    }

    fn add_search_result(&self, query_id: i64, video_id: &str, rank: i64) -> Result<SearchResult> {
        let result_id = insert_search_result_row(&self.conn, query_id, video_id, rank)?;
        self.conn
            .query_row(
                "SELECT result_id, query_id, video_id, rank, created_at
                 FROM search_results WHERE result_id = ?",
                params![result_id],
                |row| {
                    Ok(SearchResult {
                        result_id: row.get(0)?,
                        query_id: row.get(1)?,
                        video_id: row.get(2)?,
                        rank: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .map_err(StashError::Storage)
    }

    fn get_search(&self, query_id: i64) -> Result<SearchQuery> {
        let sql = format!("{} WHERE q.query_id = ?", SEARCH_SELECT);
        self.conn
            .query_row(&sql, params![query_id], row_to_search)
            .map_err(|e| not_found(e, format!("Search query {} not found", query_id)))
    }

    fn list_searches(&self, limit: i64) -> Result<Vec<SearchQuery>> {
        let limit = if limit <= 0 { 50 } else { limit };
        let sql = format!("{} ORDER BY q.query_id DESC LIMIT ?", SEARCH_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let searches = stmt
            .query_map(params![limit], row_to_search)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(searches)
    }

    fn search_results(&self, query_id: i64) -> Result<Vec<RankedVideo>> {
        self.get_search(query_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT rank, video_id FROM search_results WHERE query_id = ? ORDER BY rank",
        )?;
        let ranked = stmt
            .query_map(params![query_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ranked
            .into_iter()
            .map(|(rank, video_id)| {
                Ok(RankedVideo {
                    rank,
                    video: self.get_video(&video_id)?,
                })
            })
            .collect()
    }

    fn delete_search(&self, query_id: i64) -> Result<bool> {
        let changes = self.conn.execute(
            "DELETE FROM search_queries WHERE query_id = ?",
            params![query_id],
        )?;
        Ok(changes > 0)
    }

    fn purge_all(&self) -> Result<PurgeSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let summary = PurgeSummary {
            videos: count(&tx, "SELECT COUNT(*) FROM videos")?,
            comments: count(&tx, "SELECT COUNT(*) FROM comments")?,
            search_queries: count(&tx, "SELECT COUNT(*) FROM search_queries")?,
        };
        tx.execute("DELETE FROM search_queries", [])?;
        tx.execute("DELETE FROM videos", [])?;
        tx.commit()?;
        info!(
            videos = summary.videos,
            comments = summary.comments,
            searches = summary.search_queries,
            "purged all data"
        );
        Ok(summary)
    }
}

impl AnalyticsStorage for SqliteStorage {
    fn engagement_stats(&self, video_id: &str) -> Result<EngagementStats> {
        let sql = format!("{} WHERE video_id = ?", ENGAGEMENT_SELECT);
        self.conn
            .query_row(&sql, params![video_id], row_to_engagement)
            .map_err(|e| not_found(e, format!("Video {} not found", video_id)))
    }

    fn all_engagement_stats(&self) -> Result<Vec<EngagementStats>> {
        let sql = format!("{} ORDER BY total_comments DESC, video_id", ENGAGEMENT_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let stats = stmt
            .query_map([], row_to_engagement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    fn sentiment_distribution(&self, video_id: &str) -> Result<SentimentDistribution> {
        let sql = format!("{} WHERE video_id = ?", SENTIMENT_SELECT);
        self.conn
            .query_row(&sql, params![video_id], row_to_sentiment)
            .map_err(|e| not_found(e, format!("Video {} not found", video_id)))
    }

    fn all_sentiment_distributions(&self) -> Result<Vec<SentimentDistribution>> {
        let sql = format!("{} ORDER BY total_comments DESC, video_id", SENTIMENT_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let dists = stmt
            .query_map([], row_to_sentiment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(dists)
    }

    fn database_stats(&self) -> Result<DatabaseStats> {
        let most_commented_video = self
            .conn
            .query_row(
                "SELECT v.video_id, v.video_url, COUNT(c.comment_id) AS comment_count
                 FROM videos v
                 JOIN comments c ON c.video_id = v.video_id
                 GROUP BY v.video_id
                 ORDER BY comment_count DESC, v.video_id
                 LIMIT 1",
                [],
                |row| {
                    Ok(CommentedVideo {
                        video_id: row.get(0)?,
                        video_url: row.get(1)?,
                        comment_count: row.get(2)?,
                    })
                },
            )
            .optional()?;

        let mut stmt = self.conn.prepare(
            "SELECT username, COUNT(*) AS comment_count
             FROM comments
             GROUP BY username
             ORDER BY comment_count DESC, username
             LIMIT 10",
        )?;
        let top_users = stmt
            .query_map([], |row| {
                Ok(UserActivity {
                    username: row.get(0)?,
                    comment_count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(DatabaseStats {
            videos_count: count(&self.conn, "SELECT COUNT(*) FROM videos")?,
            comments_count: count(&self.conn, "SELECT COUNT(*) FROM comments")?,
            unique_users: count(&self.conn, "SELECT COUNT(DISTINCT username) FROM comments")?,
            search_queries_count: count(&self.conn, "SELECT COUNT(*) FROM search_queries")?,
            most_commented_video,
            top_users,
        })
    }

    fn popular_hashtags(&self, limit: i64) -> Result<Vec<HashtagCount>> {
        let limit = if limit <= 0 { 10 } else { limit };
        let mut stmt = self.conn.prepare(
            "SELECT hashtag, COUNT(*) AS uses
             FROM comment_hashtags
             GROUP BY hashtag
             ORDER BY uses DESC, hashtag
             LIMIT ?",
        )?;
        let tags = stmt
            .query_map(params![limit], |row| {
                Ok(HashtagCount {
                    hashtag: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StashError;
    use crate::storage::models::BatchComment;

    fn test_storage() -> SqliteStorage {
        SqliteStorage::in_memory().unwrap()
    }

    fn video(id: &str) -> NewVideo {
        NewVideo {
            video_id: id.to_string(),
            video_url: format!("https://www.tiktok.com/@creator/video/{}", id),
            author: Some("@creator".to_string()),
            title: Some(format!("video {}", id)),
            views: 1000,
            likes: 100,
            shares: 10,
            comments: 5,
            ..Default::default()
        }
    }

    fn comment(video_id: &str, username: &str, likes: i64) -> NewComment {
        NewComment {
            video_id: video_id.to_string(),
            username: username.to_string(),
            comment_text: Some(format!("comment from {}", username)),
            likes,
            ..Default::default()
        }
    }

    fn reply(video_id: &str, username: &str, likes: i64, parent: Option<i64>) -> NewComment {
        NewComment {
            is_reply: true,
            parent_comment_id: parent,
            ..comment(video_id, username, likes)
        }
    }

    fn labelled(video_id: &str, username: &str, sentiment: Sentiment) -> NewComment {
        NewComment {
            sentiment: Some(sentiment),
            ..comment(video_id, username, 0)
        }
    }

    fn count_rows(storage: &SqliteStorage, sql: &str, video_id: &str) -> i64 {
        storage
            .conn()
            .query_row(sql, [video_id], |row| row.get(0))
            .unwrap()
    }

    // --- Schema ---

    #[test]
    fn test_in_memory_creates_tables_and_views() {
        let storage = test_storage();
        let tables: i64 = storage
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('videos', 'video_tags', 'comments', 'comment_hashtags',
                  'search_queries', 'search_results')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
        let views: i64 = storage
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='view' AND name IN
                 ('video_engagement_stats', 'video_sentiment_distribution')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(views, 2);
    }

    #[test]
    fn test_schema_creation_is_idempotent() {
        let storage = test_storage();
        for statement in schema::ALL {
            storage.conn().execute(statement, []).unwrap();
        }
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stash.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.upsert_video(video("1")).unwrap();
        }
        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.get_video("1").unwrap().views, 1000);
    }

    // --- Videos ---

    #[test]
    fn test_upsert_inserts_video() {
        let storage = test_storage();
        let mut new = video("7001");
        new.tags = ["dance", "fyp"].iter().map(|s| s.to_string()).collect();
        let stored = storage.upsert_video(new).unwrap();
        assert_eq!(stored.video_id, "7001");
        assert_eq!(stored.author.as_deref(), Some("@creator"));
        assert_eq!(stored.views, 1000);
        assert_eq!(stored.tags.iter().cloned().collect::<Vec<_>>(), vec!["dance", "fyp"]);
    }

    #[test]
    fn test_upsert_updates_instead_of_duplicating() {
        let storage = test_storage();
        storage.upsert_video(video("7001")).unwrap();
        let mut updated = video("7001");
        updated.title = Some("new title".to_string());
        updated.views = 5000;
        updated.tags = ["trend".to_string()].into_iter().collect();
        storage.upsert_video(updated).unwrap();

        let rows = count_rows(&storage, "SELECT COUNT(*) FROM videos WHERE video_id = ?", "7001");
        assert_eq!(rows, 1);
        let fetched = storage.get_video("7001").unwrap();
        assert_eq!(fetched.title.as_deref(), Some("new title"));
        assert_eq!(fetched.views, 5000);
        assert_eq!(fetched.tags.len(), 1);
        assert!(fetched.tags.contains("trend"));
    }

    #[test]
    fn test_upsert_keeps_existing_comments() {
        let storage = test_storage();
        storage.upsert_video(video("7001")).unwrap();
        storage.insert_comment(comment("7001", "alice", 1)).unwrap();
        storage.upsert_video(video("7001")).unwrap();
        let comments = storage
            .list_comments(CommentFilter {
                video_id: Some("7001".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(comments.len(), 1);
    }

    #[test]
    fn test_upsert_rejects_negative_counter() {
        let storage = test_storage();
        let mut bad = video("1");
        bad.views = -5;
        assert!(matches!(storage.upsert_video(bad), Err(StashError::InvalidInput(_))));
        assert!(matches!(storage.get_video("1"), Err(StashError::NotFound(_))));
    }

    #[test]
    fn test_get_video_not_found() {
        let storage = test_storage();
        assert!(matches!(storage.get_video("missing"), Err(StashError::NotFound(_))));
    }

    #[test]
    fn test_list_videos_filter_by_author() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let mut other = video("2");
        other.author = Some("@someone_else".to_string());
        storage.upsert_video(other).unwrap();

        let all = storage.list_videos(VideoFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        let filtered = storage
            .list_videos(VideoFilter {
                author: Some("SOMEONE".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].video_id, "2");
    }

    #[test]
    fn test_list_videos_with_limit_and_offset() {
        let storage = test_storage();
        for i in 0..5 {
            storage.upsert_video(video(&i.to_string())).unwrap();
        }
        let page = storage
            .list_videos(VideoFilter {
                limit: 2,
                offset: 4,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_delete_video_cascades() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.upsert_video(video("2")).unwrap();
        let parent = storage.insert_comment(comment("1", "alice", 1)).unwrap();
        storage
            .insert_comment(reply("1", "bob", 1, Some(parent.comment_id)))
            .unwrap();
        storage.insert_comment(comment("2", "carol", 1)).unwrap();
        let search = storage
            .record_search("dance", &["1".to_string(), "2".to_string()])
            .unwrap();

        assert!(storage.delete_video("1").unwrap());

        assert_eq!(count_rows(&storage, "SELECT COUNT(*) FROM comments WHERE video_id = ?", "1"), 0);
        assert_eq!(
            count_rows(&storage, "SELECT COUNT(*) FROM search_results WHERE video_id = ?", "1"),
            0
        );
        assert_eq!(count_rows(&storage, "SELECT COUNT(*) FROM video_tags WHERE video_id = ?", "1"), 0);
        assert_eq!(count_rows(&storage, "SELECT COUNT(*) FROM comments WHERE video_id = ?", "2"), 1);
        let remaining = storage.search_results(search.query_id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].video.video_id, "2");
    }

    #[test]
    fn test_delete_nonexistent_video() {
        let storage = test_storage();
        assert!(!storage.delete_video("nope").unwrap());
    }

    // --- Comments ---

    #[test]
    fn test_insert_comment_defaults() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let stored = storage
            .insert_comment(NewComment {
                video_id: "1".into(),
                username: "alice".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(stored.likes, 0);
        assert_eq!(stored.replies_count, 0);
        assert!(!stored.is_reply);
        assert!(stored.parent_comment_id.is_none());
        assert!(stored.sentiment.is_none());
        assert!(stored.hashtags.is_empty());
    }

    #[test]
    fn test_insert_comment_requires_existing_video() {
        let storage = test_storage();
        let result = storage.insert_comment(comment("ghost", "alice", 0));
        assert!(matches!(result, Err(StashError::Integrity(_))));
        let total: i64 = storage
            .conn()
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_insert_comment_returns_incrementing_ids() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let c1 = storage.insert_comment(comment("1", "a", 0)).unwrap();
        let c2 = storage.insert_comment(comment("1", "b", 0)).unwrap();
        assert!(c2.comment_id > c1.comment_id);
    }

    #[test]
    fn test_insert_comment_with_hashtags() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let mut new = comment("1", "alice", 0);
        new.hashtags = ["fyp", "dance"].iter().map(|s| s.to_string()).collect();
        let stored = storage.insert_comment(new).unwrap();
        assert_eq!(stored.hashtags.len(), 2);
        assert!(stored.hashtags.contains("fyp"));
    }

    #[test]
    fn test_reply_links_to_parent() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let parent = storage.insert_comment(comment("1", "alice", 3)).unwrap();
        let child = storage
            .insert_comment(reply("1", "bob", 1, Some(parent.comment_id)))
            .unwrap();
        assert_eq!(child.parent_comment_id, Some(parent.comment_id));

        let replies = storage.replies_to(parent.comment_id).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].username, "bob");
    }

    #[test]
    fn test_reply_to_missing_parent_fails() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let result = storage.insert_comment(reply("1", "bob", 0, Some(42)));
        assert!(matches!(result, Err(StashError::Integrity(_))));
    }

    #[test]
    fn test_reply_parent_must_share_video() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.upsert_video(video("2")).unwrap();
        let parent = storage.insert_comment(comment("1", "alice", 0)).unwrap();
        let result = storage.insert_comment(reply("2", "bob", 0, Some(parent.comment_id)));
        assert!(matches!(result, Err(StashError::Integrity(_))));
    }

    #[test]
    fn test_top_level_comment_drops_parent() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let mut new = comment("1", "alice", 0);
        new.parent_comment_id = Some(999);
        let stored = storage.insert_comment(new).unwrap();
        assert!(stored.parent_comment_id.is_none());
    }

    #[test]
    fn test_reply_without_known_parent_is_allowed() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let stored = storage.insert_comment(reply("1", "bob", 0, None)).unwrap();
        assert!(stored.is_reply);
        assert!(stored.parent_comment_id.is_none());
    }

    #[test]
    fn test_insert_comments_is_all_or_nothing() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let batch = vec![comment("1", "alice", 0), comment("missing", "bob", 0)];
        assert!(storage.insert_comments(batch).is_err());
        assert_eq!(count_rows(&storage, "SELECT COUNT(*) FROM comments WHERE video_id = ?", "1"), 0);
    }

    #[test]
    fn test_insert_comments_batch() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let stored = storage
            .insert_comments(vec![comment("1", "a", 1), comment("1", "b", 2)])
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].likes, 2);
    }

    #[test]
    fn test_list_comments_filters() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.upsert_video(video("2")).unwrap();
        let parent = storage.insert_comment(labelled("1", "Alice", Sentiment::Positive)).unwrap();
        storage
            .insert_comment(reply("1", "bob", 0, Some(parent.comment_id)))
            .unwrap();
        storage.insert_comment(comment("2", "alice_two", 0)).unwrap();

        let by_video = storage
            .list_comments(CommentFilter {
                video_id: Some("1".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_video.len(), 2);

        let by_user = storage
            .list_comments(CommentFilter {
                username: Some("alice".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_user.len(), 2);

        let positive = storage
            .list_comments(CommentFilter {
                sentiment: Some(Sentiment::Positive),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(positive.len(), 1);

        let unclassified = storage
            .list_comments(CommentFilter {
                unclassified_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(unclassified.len(), 2);

        let replies = storage
            .list_comments(CommentFilter {
                is_reply: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].username, "bob");
    }

    #[test]
    fn test_set_sentiment_reclassifies() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let stored = storage.insert_comment(comment("1", "alice", 0)).unwrap();
        storage.set_sentiment(stored.comment_id, Some(Sentiment::Negative)).unwrap();
        assert_eq!(
            storage.get_comment(stored.comment_id).unwrap().sentiment,
            Some(Sentiment::Negative)
        );
        storage.set_sentiment(stored.comment_id, None).unwrap();
        assert!(storage.get_comment(stored.comment_id).unwrap().sentiment.is_none());
    }

    #[test]
    fn test_set_sentiment_nonexistent() {
        let storage = test_storage();
        let result = storage.set_sentiment(5, Some(Sentiment::Neutral));
        assert!(matches!(result, Err(StashError::NotFound(_))));
    }

    #[test]
    fn test_sentiment_column_rejects_unknown_labels() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let stored = storage.insert_comment(comment("1", "alice", 0)).unwrap();
        let result = storage.conn().execute(
            "UPDATE comments SET sentiment = 'furious' WHERE comment_id = ?",
            [stored.comment_id],
        );
        assert!(result.is_err());
    }

    // --- Searches ---

    #[test]
    fn test_record_search_ranks_in_order() {
        let storage = test_storage();
        for id in ["a", "b", "c"] {
            storage.upsert_video(video(id)).unwrap();
        }
        let ids: Vec<String> = ["c", "a", "b"].iter().map(|s| s.to_string()).collect();
        let query = storage.record_search("cats", &ids).unwrap();
        assert_eq!(query.keyword, "cats");
        assert_eq!(query.results_count, 3);

        let results = storage.search_results(query.query_id).unwrap();
        let order: Vec<(i64, &str)> = results
            .iter()
            .map(|r| (r.rank, r.video.video_id.as_str()))
            .collect();
        assert_eq!(order, vec![(1, "c"), (2, "a"), (3, "b")]);
    }

    #[test]
    fn test_record_search_with_unknown_video_rolls_back() {
        let storage = test_storage();
        storage.upsert_video(video("a")).unwrap();
        let ids = vec!["a".to_string(), "zzz".to_string()];
        assert!(matches!(
            storage.record_search("cats", &ids),
            Err(StashError::Integrity(_))
        ));
        assert!(storage.list_searches(10).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let storage = test_storage();
        storage.upsert_video(video("a")).unwrap();
        storage.upsert_video(video("b")).unwrap();
        let query = storage.record_search("cats", &["a".to_string()]).unwrap();
        let result = storage.add_search_result(query.query_id, "b", 1);
        assert!(matches!(result, Err(StashError::Conflict(_))));

        let appended = storage.add_search_result(query.query_id, "b", 2).unwrap();
        assert_eq!(appended.rank, 2);
        assert_eq!(appended.video_id, "b");
    }

    #[test]
    fn test_search_result_requires_query() {
        let storage = test_storage();
        storage.upsert_video(video("a")).unwrap();
        let result = storage.add_search_result(77, "a", 1);
        assert!(matches!(result, Err(StashError::Integrity(_))));
    }

    #[test]
    fn test_delete_search_cascades_results_only() {
        let storage = test_storage();
        storage.upsert_video(video("a")).unwrap();
        let query = storage.record_search("cats", &["a".to_string()]).unwrap();
        assert!(storage.delete_search(query.query_id).unwrap());
        assert_eq!(count_rows(&storage, "SELECT COUNT(*) FROM search_results WHERE video_id = ?", "a"), 0);
        assert!(storage.get_video("a").is_ok());
        assert!(matches!(storage.get_search(query.query_id), Err(StashError::NotFound(_))));
    }

    #[test]
    fn test_list_searches_newest_first() {
        let storage = test_storage();
        storage.record_search("first", &[]).unwrap();
        storage.record_search("second", &[]).unwrap();
        let searches = storage.list_searches(10).unwrap();
        assert_eq!(searches[0].keyword, "second");
        assert_eq!(searches[1].results_count, 0);
    }

    #[test]
    fn test_stored_results_tracks_rows() {
        let storage = test_storage();
        for id in ["a", "b"] {
            storage.upsert_video(video(id)).unwrap();
        }
        let query = storage.record_search("cats", &["a".to_string()]).unwrap();
        assert_eq!(query.results_count, 1);
        assert_eq!(query.stored_results, 1);

        storage.add_search_result(query.query_id, "b", 2).unwrap();
        let after_append = storage.get_search(query.query_id).unwrap();
        assert_eq!(after_append.results_count, 1);
        assert_eq!(after_append.stored_results, 2);

        storage.delete_video("a").unwrap();
        let listed = storage.list_searches(10).unwrap();
        assert_eq!(listed[0].stored_results, 1);
    }

    // --- Batch import ---

    fn batch(comment: NewComment, parent_index: Option<usize>) -> BatchComment {
        BatchComment {
            comment,
            parent_index,
        }
    }

    #[test]
    fn test_import_video_resolves_batch_parents() {
        let storage = test_storage();
        let stored = storage
            .import_video(VideoImport {
                video: video("1"),
                comments: vec![
                    batch(comment("1", "alice", 1), None),
                    batch(reply("1", "bob", 0, None), Some(0)),
                    batch(comment("1", "carol", 0), Some(0)),
                ],
            })
            .unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[1].parent_comment_id, Some(stored[0].comment_id));
        assert_eq!(stored[2].parent_comment_id, None);
    }

    #[test]
    fn test_import_video_failure_keeps_nothing() {
        let storage = test_storage();
        let result = storage.import_video(VideoImport {
            video: video("1"),
            comments: vec![
                batch(comment("1", "alice", 1), None),
                batch(reply("1", "bob", 0, None), Some(5)),
            ],
        });
        assert!(matches!(result, Err(StashError::Integrity(_))));
        assert!(matches!(storage.get_video("1"), Err(StashError::NotFound(_))));
        assert_eq!(count_rows(&storage, "SELECT COUNT(*) FROM comments WHERE video_id = ?", "1"), 0);
    }

    #[test]
    fn test_import_video_rejects_foreign_comment() {
        let storage = test_storage();
        let result = storage.import_video(VideoImport {
            video: video("1"),
            comments: vec![batch(comment("2", "alice", 0), None)],
        });
        assert!(matches!(result, Err(StashError::InvalidInput(_))));
        assert!(storage.get_video("1").is_err());
    }

    #[test]
    fn test_import_search_blank_keyword_writes_nothing() {
        let storage = test_storage();
        let result = storage.import_search(
            "   ",
            vec![VideoImport {
                video: video("22"),
                comments: vec![batch(comment("22", "alice", 0), None)],
            }],
        );
        assert!(matches!(result, Err(StashError::InvalidInput(_))));
        assert_eq!(storage.database_stats().unwrap().videos_count, 0);
        assert_eq!(storage.database_stats().unwrap().comments_count, 0);
    }

    #[test]
    fn test_import_search_rolls_back_earlier_videos() {
        let storage = test_storage();
        let mut broken = video("2");
        broken.likes = -1;
        let result = storage.import_search(
            "cats",
            vec![
                VideoImport {
                    video: video("1"),
                    comments: vec![batch(comment("1", "alice", 0), None)],
                },
                VideoImport {
                    video: broken,
                    comments: Vec::new(),
                },
            ],
        );
        assert!(matches!(result, Err(StashError::InvalidInput(_))));
        let stats = storage.database_stats().unwrap();
        assert_eq!(stats.videos_count, 0);
        assert_eq!(stats.comments_count, 0);
        assert_eq!(stats.search_queries_count, 0);
    }

    #[test]
    fn test_import_search_records_ranks() {
        let storage = test_storage();
        let (query, comments) = storage
            .import_search(
                "cats",
                vec![
                    VideoImport {
                        video: video("b"),
                        comments: vec![batch(comment("b", "alice", 0), None)],
                    },
                    VideoImport {
                        video: video("a"),
                        comments: Vec::new(),
                    },
                ],
            )
            .unwrap();
        assert_eq!(query.results_count, 2);
        assert_eq!(comments[0].len(), 1);
        assert!(comments[1].is_empty());
        let results = storage.search_results(query.query_id).unwrap();
        assert_eq!(results[0].video.video_id, "b");
        assert_eq!(results[1].rank, 2);
    }

    // --- Purge ---

    #[test]
    fn test_purge_all() {
        let storage = test_storage();
        storage.upsert_video(video("a")).unwrap();
        storage.insert_comment(comment("a", "alice", 0)).unwrap();
        storage.record_search("cats", &["a".to_string()]).unwrap();
        let summary = storage.purge_all().unwrap();
        assert_eq!(summary.videos, 1);
        assert_eq!(summary.comments, 1);
        assert_eq!(summary.search_queries, 1);
        let stats = storage.database_stats().unwrap();
        assert_eq!(stats.videos_count, 0);
        assert_eq!(stats.comments_count, 0);
    }

    // --- Engagement ---

    #[test]
    fn test_engagement_zero_comments() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let stats = storage.engagement_stats("1").unwrap();
        assert_eq!(stats.total_comments, 0);
        assert_eq!(stats.unique_commenters, 0);
        assert_eq!(stats.avg_likes_per_comment, None);
        assert_eq!(stats.main_comments, 0);
        assert_eq!(stats.replies, 0);
    }

    #[test]
    fn test_engagement_counts() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let parent = storage.insert_comment(comment("1", "alice", 2)).unwrap();
        storage
            .insert_comment(reply("1", "bob", 4, Some(parent.comment_id)))
            .unwrap();
        let stats = storage.engagement_stats("1").unwrap();
        assert_eq!(stats.total_comments, 2);
        assert_eq!(stats.unique_commenters, 2);
        assert_eq!(stats.avg_likes_per_comment, Some(3.0));
        assert_eq!(stats.main_comments, 1);
        assert_eq!(stats.replies, 1);
    }

    #[test]
    fn test_engagement_distinct_commenters() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.insert_comment(comment("1", "alice", 0)).unwrap();
        storage.insert_comment(comment("1", "alice", 0)).unwrap();
        storage.insert_comment(comment("1", "bob", 0)).unwrap();
        let stats = storage.engagement_stats("1").unwrap();
        assert_eq!(stats.total_comments, 3);
        assert_eq!(stats.unique_commenters, 2);
    }

    #[test]
    fn test_engagement_reflects_latest_rows() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        assert_eq!(storage.engagement_stats("1").unwrap().total_comments, 0);
        storage.insert_comment(comment("1", "alice", 0)).unwrap();
        assert_eq!(storage.engagement_stats("1").unwrap().total_comments, 1);
    }

    #[test]
    fn test_engagement_unknown_video() {
        let storage = test_storage();
        assert!(matches!(storage.engagement_stats("x"), Err(StashError::NotFound(_))));
    }

    #[test]
    fn test_all_engagement_stats_includes_empty_videos() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.upsert_video(video("2")).unwrap();
        storage.insert_comment(comment("2", "alice", 0)).unwrap();
        let all = storage.all_engagement_stats().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].video_id, "2");
        assert_eq!(all[1].avg_likes_per_comment, None);
    }

    // --- Sentiment distribution ---

    #[test]
    fn test_sentiment_distribution_percentages() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        for (name, label) in [
            ("a", Sentiment::Positive),
            ("b", Sentiment::Positive),
            ("c", Sentiment::Negative),
            ("d", Sentiment::Neutral),
        ] {
            storage.insert_comment(labelled("1", name, label)).unwrap();
        }
        let dist = storage.sentiment_distribution("1").unwrap();
        assert_eq!(dist.total_comments, 4);
        assert_eq!(dist.positive_count, 2);
        assert_eq!(dist.neutral_count, 1);
        assert_eq!(dist.negative_count, 1);
        assert_eq!(dist.unclassified_count, 0);
        assert_eq!(dist.positive_percentage, Some(50));
        assert_eq!(dist.negative_percentage, Some(25));
    }

    #[test]
    fn test_sentiment_distribution_zero_comments() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        let dist = storage.sentiment_distribution("1").unwrap();
        assert_eq!(dist.total_comments, 0);
        assert_eq!(dist.positive_percentage, None);
        assert_eq!(dist.negative_percentage, None);
    }

    #[test]
    fn test_sentiment_distribution_rounds_to_nearest() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.insert_comment(labelled("1", "a", Sentiment::Positive)).unwrap();
        storage.insert_comment(labelled("1", "b", Sentiment::Positive)).unwrap();
        storage.insert_comment(labelled("1", "c", Sentiment::Negative)).unwrap();
        let dist = storage.sentiment_distribution("1").unwrap();
        assert_eq!(dist.positive_percentage, Some(67));
        assert_eq!(dist.negative_percentage, Some(33));
    }

    #[test]
    fn test_sentiment_distribution_counts_unclassified_in_total() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.insert_comment(labelled("1", "a", Sentiment::Positive)).unwrap();
        storage.insert_comment(comment("1", "b", 0)).unwrap();
        let dist = storage.sentiment_distribution("1").unwrap();
        assert_eq!(dist.unclassified_count, 1);
        assert_eq!(dist.positive_percentage, Some(50));
        assert_eq!(dist.negative_percentage, Some(0));
    }

    // --- Stats ---

    #[test]
    fn test_database_stats_empty() {
        let storage = test_storage();
        let stats = storage.database_stats().unwrap();
        assert_eq!(stats.videos_count, 0);
        assert_eq!(stats.unique_users, 0);
        assert!(stats.most_commented_video.is_none());
        assert!(stats.top_users.is_empty());
    }

    #[test]
    fn test_database_stats_counts() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        storage.upsert_video(video("2")).unwrap();
        storage.insert_comment(comment("1", "alice", 0)).unwrap();
        storage.insert_comment(comment("2", "alice", 0)).unwrap();
        storage.insert_comment(comment("2", "bob", 0)).unwrap();
        let stats = storage.database_stats().unwrap();
        assert_eq!(stats.videos_count, 2);
        assert_eq!(stats.comments_count, 3);
        assert_eq!(stats.unique_users, 2);
        let top = stats.most_commented_video.unwrap();
        assert_eq!(top.video_id, "2");
        assert_eq!(top.comment_count, 2);
        assert_eq!(stats.top_users[0].username, "alice");
        assert_eq!(stats.top_users[0].comment_count, 2);
    }

    #[test]
    fn test_popular_hashtags() {
        let storage = test_storage();
        storage.upsert_video(video("1")).unwrap();
        for tags in [vec!["fyp", "cat"], vec!["fyp"], vec!["dog"]] {
            let mut new = comment("1", "alice", 0);
            new.hashtags = tags.into_iter().map(String::from).collect();
            storage.insert_comment(new).unwrap();
        }
        let popular = storage.popular_hashtags(2).unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0].hashtag, "fyp");
        assert_eq!(popular[0].count, 2);
        assert_eq!(popular[1].hashtag, "cat");
    }
}
