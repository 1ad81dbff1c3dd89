pub const CREATE_VIDEOS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS videos (
        video_id TEXT PRIMARY KEY,
        video_url TEXT NOT NULL,
        author TEXT,
        title TEXT,
        description TEXT,
        views INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
        likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
        shares INTEGER NOT NULL DEFAULT 0 CHECK (shares >= 0),
        comments INTEGER NOT NULL DEFAULT 0 CHECK (comments >= 0),
        post_time TEXT,
        music TEXT,
        crawled_at TEXT NOT NULL
    )
";

pub const CREATE_VIDEO_TAGS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS video_tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL,
        tag TEXT NOT NULL,
        FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE,
        UNIQUE(video_id, tag)
    )
";

pub const CREATE_COMMENTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS comments (
        comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id TEXT NOT NULL,
        username TEXT NOT NULL,
        comment_text TEXT,
        likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
        comment_time TEXT,
        replies_count INTEGER NOT NULL DEFAULT 0 CHECK (replies_count >= 0),
        is_reply INTEGER NOT NULL DEFAULT 0,
        parent_comment_id INTEGER,
        sentiment TEXT CHECK (sentiment IN ('positive', 'neutral', 'negative')),
        crawled_at TEXT NOT NULL,
        FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE,
        FOREIGN KEY (parent_comment_id) REFERENCES comments(comment_id) ON DELETE SET NULL
    )
";

pub const CREATE_COMMENT_HASHTAGS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS comment_hashtags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        comment_id INTEGER NOT NULL,
        hashtag TEXT NOT NULL,
        FOREIGN KEY (comment_id) REFERENCES comments(comment_id) ON DELETE CASCADE,
        UNIQUE(comment_id, hashtag)
    )
";

pub const CREATE_SEARCH_QUERIES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS search_queries (
        query_id INTEGER PRIMARY KEY AUTOINCREMENT,
        keyword TEXT NOT NULL,
        results_count INTEGER NOT NULL DEFAULT 0 CHECK (results_count >= 0),
        created_at TEXT NOT NULL
    )
";

pub const CREATE_SEARCH_RESULTS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS search_results (
        result_id INTEGER PRIMARY KEY AUTOINCREMENT,
        query_id INTEGER NOT NULL,
        video_id TEXT NOT NULL,
        rank INTEGER NOT NULL CHECK (rank >= 1),
        created_at TEXT NOT NULL,
        FOREIGN KEY (query_id) REFERENCES search_queries(query_id) ON DELETE CASCADE,
        FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE,
        UNIQUE(query_id, rank)
    )
";

pub const CREATE_INDEX_COMMENTS_VIDEO: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_video_id ON comments(video_id)";

pub const CREATE_INDEX_COMMENTS_USERNAME: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_username ON comments(username)";

pub const CREATE_INDEX_COMMENTS_PARENT: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id)";

pub const CREATE_INDEX_VIDEO_TAGS: &str =
    "CREATE INDEX IF NOT EXISTS idx_video_tags_video_id ON video_tags(video_id)";

pub const CREATE_INDEX_COMMENT_HASHTAGS: &str =
    "CREATE INDEX IF NOT EXISTS idx_comment_hashtags_hashtag ON comment_hashtags(hashtag)";

pub const CREATE_INDEX_SEARCH_RESULTS_VIDEO: &str =
    "CREATE INDEX IF NOT EXISTS idx_search_results_video_id ON search_results(video_id)";

// AVG over an empty group is NULL, which is what a video without comments reports.
pub const CREATE_ENGAGEMENT_VIEW: &str = "
    CREATE VIEW IF NOT EXISTS video_engagement_stats AS
    SELECT v.video_id,
           v.author,
           v.title,
           COUNT(c.comment_id) AS total_comments,
           COUNT(DISTINCT c.username) AS unique_commenters,
           AVG(c.likes) AS avg_likes_per_comment,
           COUNT(CASE WHEN c.is_reply = 0 THEN 1 END) AS main_comments,
           COUNT(CASE WHEN c.is_reply = 1 THEN 1 END) AS replies
    FROM videos v
    LEFT JOIN comments c ON c.video_id = v.video_id
    GROUP BY v.video_id
";

pub const CREATE_SENTIMENT_VIEW: &str = "
    CREATE VIEW IF NOT EXISTS video_sentiment_distribution AS
    SELECT v.video_id,
           COUNT(c.comment_id) AS total_comments,
           COUNT(CASE WHEN c.sentiment = 'positive' THEN 1 END) AS positive_count,
           COUNT(CASE WHEN c.sentiment = 'neutral' THEN 1 END) AS neutral_count,
           COUNT(CASE WHEN c.sentiment = 'negative' THEN 1 END) AS negative_count,
           COUNT(CASE WHEN c.comment_id IS NOT NULL AND c.sentiment IS NULL THEN 1 END)
               AS unclassified_count,
           CASE WHEN COUNT(c.comment_id) = 0 THEN NULL
                ELSE CAST(ROUND(100.0 * COUNT(CASE WHEN c.sentiment = 'positive' THEN 1 END)
                                / COUNT(c.comment_id)) AS INTEGER)
           END AS positive_percentage,
           CASE WHEN COUNT(c.comment_id) = 0 THEN NULL
                ELSE CAST(ROUND(100.0 * COUNT(CASE WHEN c.sentiment = 'negative' THEN 1 END)
                                / COUNT(c.comment_id)) AS INTEGER)
           END AS negative_percentage
    FROM videos v
    LEFT JOIN comments c ON c.video_id = v.video_id
    GROUP BY v.video_id
";

pub const ALL: &[&str] = &[
    CREATE_VIDEOS_TABLE,
    CREATE_VIDEO_TAGS_TABLE,
    CREATE_COMMENTS_TABLE,
    CREATE_COMMENT_HASHTAGS_TABLE,
    CREATE_SEARCH_QUERIES_TABLE,
    CREATE_SEARCH_RESULTS_TABLE,
    CREATE_INDEX_COMMENTS_VIDEO,
    CREATE_INDEX_COMMENTS_USERNAME,
    CREATE_INDEX_COMMENTS_PARENT,
    CREATE_INDEX_VIDEO_TAGS,
    CREATE_INDEX_COMMENT_HASHTAGS,
    CREATE_INDEX_SEARCH_RESULTS_VIDEO,
    CREATE_ENGAGEMENT_VIEW,
    CREATE_SENTIMENT_VIEW,
];
