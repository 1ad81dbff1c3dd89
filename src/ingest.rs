//! Conversion of crawler output into storage writes.
//!
//! The crawler emits one JSON document per video (or an array of them), and a
//! search document wrapping the videos a keyword search surfaced. Counters
//! arrive either as numbers or as the abbreviated strings shown on the page
//! ("1.2K", "4.5M").

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{Result, StashError};
use crate::storage::ScrapeStorage;
use crate::storage::models::{
    BatchComment, NewComment, NewVideo, SearchQuery, Sentiment, VideoImport,
};

static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.|m\.|vm\.|vt\.)?tiktok\.com/(?:@[\w.-]+/video/|v/|embed/(?:v2/)?)(\d+)",
    )
    .expect("video url pattern")
});

static USERNAME_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tiktok\.com/(@[\w.-]+)").expect("username pattern"));

static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag pattern"));

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Number(i64),
    Float(f64),
    Text(String),
}

impl RawCount {
    pub fn value(&self) -> i64 {
        match self {
            RawCount::Number(n) => (*n).max(0),
            RawCount::Float(f) if f.is_finite() && *f > 0.0 => f.round() as i64,
            RawCount::Float(_) => 0,
            RawCount::Text(s) => parse_count(s),
        }
    }
}

fn count_of(raw: &Option<RawCount>) -> i64 {
    raw.as_ref().map(RawCount::value).unwrap_or(0)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedComment {
    #[serde(default)]
    pub username: String,
    pub comment_text: Option<String>,
    pub likes: Option<RawCount>,
    pub comment_time: Option<String>,
    pub replies_count: Option<RawCount>,
    #[serde(default)]
    pub is_reply: bool,
    pub parent_comment_username: Option<String>,
    pub crawled_at: Option<String>,
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedVideo {
    pub video_url: String,
    pub video_id: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub views: Option<RawCount>,
    pub likes: Option<RawCount>,
    pub shares: Option<RawCount>,
    #[serde(alias = "comments_count")]
    pub comment_count: Option<RawCount>,
    pub post_time: Option<String>,
    pub music: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub crawled_at: Option<String>,
    #[serde(default)]
    pub comments: Vec<ScrapedComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedSearch {
    pub keyword: String,
    #[serde(default)]
    pub videos: Vec<ScrapedVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<ScrapedVideo>),
    One(Box<ScrapedVideo>),
}

#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub video_id: String,
    pub comments: usize,
    pub replies_linked: usize,
    pub skipped: usize,
}

/// Parses page counters such as "1.2K", "4.5M", "3B" or "1,024".
/// Anything unreadable counts as zero.
pub fn parse_count(raw: &str) -> i64 {
    let text = raw.trim().replace(',', "");
    if text.is_empty() {
        return 0;
    }
    let (number, multiplier) = match text.chars().last() {
        Some('K' | 'k') => (&text[..text.len() - 1], 1_000.0),
        Some('M' | 'm') => (&text[..text.len() - 1], 1_000_000.0),
        Some('B' | 'b') => (&text[..text.len() - 1], 1_000_000_000.0),
        _ => (text.as_str(), 1.0),
    };
    match number.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value * multiplier).round() as i64,
        _ => 0,
    }
}

pub fn video_id_from_url(url: &str) -> Option<String> {
    VIDEO_URL_RE
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn username_from_url(url: &str) -> Option<String> {
    USERNAME_URL_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Lowercased `#tags` found in free text.
pub fn extract_hashtags(text: &str) -> BTreeSet<String> {
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Accepts RFC 3339 as well as the offset-less ISO timestamps the crawler writes,
/// which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

impl ScrapedVideo {
    pub fn resolve_id(&self) -> Result<String> {
        non_blank(&self.video_id)
            .or_else(|| video_id_from_url(&self.video_url))
            .ok_or_else(|| {
                StashError::InvalidInput(format!("cannot determine video id for {}", self.video_url))
            })
    }

    pub fn to_new_video(&self) -> Result<NewVideo> {
        let video_id = self.resolve_id()?;
        let author = non_blank(&self.author).or_else(|| username_from_url(&self.video_url));
        let tags = self
            .tags
            .iter()
            .map(|tag| tag.trim().trim_start_matches('#').to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        Ok(NewVideo {
            video_id,
            video_url: self.video_url.trim().to_string(),
            author,
            title: non_blank(&self.title),
            description: non_blank(&self.description),
            views: count_of(&self.views),
            likes: count_of(&self.likes),
            shares: count_of(&self.shares),
            comments: count_of(&self.comment_count),
            post_time: non_blank(&self.post_time),
            music: non_blank(&self.music),
            tags,
            crawled_at: self.crawled_at.as_deref().and_then(parse_timestamp),
        })
    }
}

impl ScrapedComment {
    fn to_new_comment(&self, video_id: &str) -> NewComment {
        let hashtags = self
            .comment_text
            .as_deref()
            .map(extract_hashtags)
            .unwrap_or_default();
        NewComment {
            video_id: video_id.to_string(),
            username: self.username.trim().to_string(),
            comment_text: self.comment_text.clone(),
            likes: count_of(&self.likes),
            comment_time: non_blank(&self.comment_time),
            replies_count: count_of(&self.replies_count),
            is_reply: self.is_reply,
            parent_comment_id: None,
            sentiment: self.sentiment,
            hashtags,
            crawled_at: self.crawled_at.as_deref().and_then(parse_timestamp),
        }
    }
}

impl ScrapedVideo {
    /// Builds the storage batch for this document. A reply is linked to the
    /// latest earlier top-level comment by its parent's username.
    pub fn to_import(&self) -> Result<(VideoImport, IngestSummary)> {
        let video = self.to_new_video()?;
        let mut summary = IngestSummary {
            video_id: video.video_id.clone(),
            ..Default::default()
        };
        let mut comments = Vec::with_capacity(self.comments.len());
        let mut top_level_by_user: HashMap<String, usize> = HashMap::new();

        for raw in &self.comments {
            let username = raw.username.trim();
            if username.is_empty() {
                warn!(video_id = %video.video_id, "skipping comment without username");
                summary.skipped += 1;
                continue;
            }

            let parent_index = if raw.is_reply {
                let found = raw
                    .parent_comment_username
                    .as_deref()
                    .map(str::trim)
                    .and_then(|name| top_level_by_user.get(name).copied());
                if found.is_some() {
                    summary.replies_linked += 1;
                } else {
                    warn!(
                        video_id = %video.video_id,
                        username,
                        "reply parent not found in batch"
                    );
                }
                found
            } else {
                top_level_by_user.insert(username.to_string(), comments.len());
                None
            };

            comments.push(BatchComment {
                comment: raw.to_new_comment(&video.video_id),
                parent_index,
            });
        }

        summary.comments = comments.len();
        Ok((VideoImport { video, comments }, summary))
    }
}

/// Upserts the video and appends its comments in page order, all or nothing.
pub fn ingest_video<S: ScrapeStorage>(storage: &S, scraped: &ScrapedVideo) -> Result<IngestSummary> {
    let (import, summary) = scraped.to_import()?;
    storage.import_video(import)?;
    info!(
        video_id = %summary.video_id,
        comments = summary.comments,
        skipped = summary.skipped,
        "ingested video"
    );
    Ok(summary)
}

/// Ingests every video of a search and records the search with the document
/// order as rank. A failure anywhere leaves the store untouched.
pub fn ingest_search<S: ScrapeStorage>(
    storage: &S,
    scraped: &ScrapedSearch,
) -> Result<(SearchQuery, Vec<IngestSummary>)> {
    let keyword = scraped.keyword.trim();
    if keyword.is_empty() {
        return Err(StashError::InvalidInput("search keyword must not be empty".into()));
    }
    let mut imports = Vec::with_capacity(scraped.videos.len());
    let mut summaries = Vec::with_capacity(scraped.videos.len());
    for video in &scraped.videos {
        let (import, summary) = video.to_import()?;
        imports.push(import);
        summaries.push(summary);
    }
    let (query, _) = storage.import_search(keyword, imports)?;
    info!(query_id = query.query_id, keyword, videos = summaries.len(), "ingested search");
    Ok((query, summaries))
}

pub fn parse_videos(json: &str) -> Result<Vec<ScrapedVideo>> {
    Ok(match serde_json::from_str::<OneOrMany>(json)? {
        OneOrMany::Many(videos) => videos,
        OneOrMany::One(video) => vec![*video],
    })
}

pub fn load_videos(path: &Path) -> Result<Vec<ScrapedVideo>> {
    parse_videos(&fs::read_to_string(path)?)
}

pub fn load_search(path: &Path) -> Result<ScrapedSearch> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}
