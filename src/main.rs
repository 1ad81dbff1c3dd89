use std::path::{Path, PathBuf};
use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tokstash::config::AppPaths;
use tokstash::errors::{Result, StashError};
use tokstash::export::{self, ExportFormat};
use tokstash::ingest;
use tokstash::sentiment;
use tokstash::storage::models::{
    Comment, CommentFilter, EngagementStats, Sentiment, SentimentDistribution, Video, VideoFilter,
};
use tokstash::storage::sqlite::SqliteStorage;
use tokstash::storage::{AnalyticsStorage, ScrapeStorage};

#[derive(Parser)]
#[command(name = "tokstash", version, about = "Store and analyse scraped TikTok videos and comments")]
struct Cli {
    /// Output results as JSON
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Database file (defaults to ~/.tokstash/tokstash.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema
    Init,

    /// Import crawler output (one video object or an array per file)
    Import {
        /// JSON files produced by the crawler
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Label the imported videos' unclassified comments
        #[arg(short, long)]
        classify: bool,
    },

    /// Import a keyword search and the videos it returned
    ImportSearch {
        /// Search JSON file
        file: PathBuf,

        /// Label the imported videos' unclassified comments
        #[arg(short, long)]
        classify: bool,
    },

    /// List stored videos
    Videos {
        /// Filter by author
        #[arg(short, long)]
        author: Option<String>,

        /// Maximum number of videos to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Offset for pagination
        #[arg(short, long, default_value = "0")]
        offset: i64,
    },

    /// Show one video with its aggregates
    Video {
        /// Video ID
        id: String,
    },

    /// List comments
    Comments {
        /// Filter by video ID
        #[arg(long)]
        video: Option<String>,

        /// Filter by username
        #[arg(short, long)]
        user: Option<String>,

        /// Filter by sentiment: positive, neutral, negative
        #[arg(short, long)]
        sentiment: Option<String>,

        /// Only comments without a sentiment label
        #[arg(long, conflicts_with = "sentiment")]
        unclassified: bool,

        /// Only replies
        #[arg(long, conflicts_with = "top_level")]
        replies: bool,

        /// Only top-level comments
        #[arg(long)]
        top_level: bool,

        /// Maximum number of comments to show
        #[arg(short, long, default_value = "50")]
        limit: i64,

        /// Offset for pagination
        #[arg(short, long, default_value = "0")]
        offset: i64,
    },

    /// Show the replies to a comment
    Replies {
        /// Comment ID
        id: i64,
    },

    /// Label comments with the keyword classifier
    Classify {
        /// Restrict to one video
        #[arg(long)]
        video: Option<String>,

        /// Relabel comments that already have a sentiment
        #[arg(short, long)]
        force: bool,
    },

    /// Set or clear the sentiment of a comment
    Label {
        /// Comment ID
        id: i64,

        /// positive, neutral, negative or none
        sentiment: String,
    },

    /// Per-video engagement statistics
    Engagement {
        /// Video ID (all videos when omitted)
        video: Option<String>,
    },

    /// Per-video sentiment distribution
    Sentiment {
        /// Video ID (all videos when omitted)
        video: Option<String>,
    },

    /// List recorded searches
    Searches {
        /// Maximum number of searches to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show the ranked results of a search
    Search {
        /// Search query ID
        id: i64,
    },

    /// Show database statistics
    Stats,

    /// Most used hashtags in comments
    Hashtags {
        /// Number of hashtags
        #[arg(short, long, default_value = "15")]
        limit: i64,
    },

    /// Export rows to CSV, JSON, HTML or Excel
    Export {
        /// What to export
        #[arg(value_enum)]
        what: ExportTarget,

        /// Output file (defaults to the exports directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// csv, json, html or xlsx (defaults to the output extension, then csv)
        #[arg(short, long)]
        format: Option<String>,

        /// Restrict to one video
        #[arg(long)]
        video: Option<String>,
    },

    /// Delete a video with its comments and search results
    Delete {
        /// Video ID
        id: String,
    },

    /// Delete a recorded search
    DeleteSearch {
        /// Search query ID
        id: i64,
    },

    /// Delete all stored data
    Purge {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportTarget {
    Comments,
    Engagement,
    Sentiment,
}

impl ExportTarget {
    fn name(&self) -> &'static str {
        match self {
            ExportTarget::Comments => "comments",
            ExportTarget::Engagement => "engagement",
            ExportTarget::Sentiment => "sentiment",
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<i64>,
}

#[derive(Serialize)]
struct VideoDetail<'a> {
    video: &'a Video,
    engagement: &'a EngagementStats,
    sentiment: &'a SentimentDistribution,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    if let Err(e) = run(cli) {
        if json {
            eprintln!("{}", serde_json::json!({"error": e.to_string()}));
        } else {
            eprintln!("error: {}", e);
        }
        process::exit(1);
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tokstash={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut paths = AppPaths::new()?;
    if let Some(db) = cli.db {
        paths = paths.with_db_path(db);
    }
    let json = cli.json;

    match cli.command {
        Commands::Init => cmd_init(&paths, json),
        Commands::Import { files, classify } => cmd_import(&paths, &files, classify, json),
        Commands::ImportSearch { file, classify } => cmd_import_search(&paths, &file, classify, json),
        Commands::Videos { author, limit, offset } => cmd_videos(
            &paths,
            VideoFilter {
                author,
                limit,
                offset,
            },
            json,
        ),
        Commands::Video { id } => cmd_video(&paths, &id, json),
        Commands::Comments {
            video,
            user,
            sentiment,
            unclassified,
            replies,
            top_level,
            limit,
            offset,
        } => {
            let sentiment = sentiment.as_deref().map(parse_sentiment).transpose()?;
            let is_reply = match (replies, top_level) {
                (true, _) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            };
            cmd_comments(
                &paths,
                CommentFilter {
                    video_id: video,
                    username: user,
                    sentiment,
                    unclassified_only: unclassified,
                    is_reply,
                    limit,
                    offset,
                },
                json,
            )
        }
        Commands::Replies { id } => cmd_replies(&paths, id, json),
        Commands::Classify { video, force } => cmd_classify(&paths, video.as_deref(), force, json),
        Commands::Label { id, sentiment } => cmd_label(&paths, id, &sentiment, json),
        Commands::Engagement { video } => cmd_engagement(&paths, video.as_deref(), json),
        Commands::Sentiment { video } => cmd_sentiment(&paths, video.as_deref(), json),
        Commands::Searches { limit } => cmd_searches(&paths, limit, json),
        Commands::Search { id } => cmd_search(&paths, id, json),
        Commands::Stats => cmd_stats(&paths, json),
        Commands::Hashtags { limit } => cmd_hashtags(&paths, limit, json),
        Commands::Export {
            what,
            out,
            format,
            video,
        } => cmd_export(&paths, what, out, format.as_deref(), video, json),
        Commands::Delete { id } => cmd_delete(&paths, &id, json),
        Commands::DeleteSearch { id } => cmd_delete_search(&paths, id, json),
        Commands::Purge { yes } => cmd_purge(&paths, yes, json),
    }
}

fn open_storage(paths: &AppPaths) -> Result<SqliteStorage> {
    if let Some(parent) = paths.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::open(&paths.db_path)
}

fn parse_sentiment(raw: &str) -> Result<Sentiment> {
    Sentiment::parse(&raw.to_ascii_lowercase()).ok_or_else(|| {
        StashError::InvalidInput(format!(
            "unknown sentiment \"{}\" (expected positive, neutral or negative)",
            raw
        ))
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn report(json: bool, success: bool, message: String, count: Option<i64>) -> Result<()> {
    if json {
        print_json(&StatusResponse {
            success,
            message,
            count,
        })
    } else {
        println!("{}", message);
        Ok(())
    }
}

fn cmd_init(paths: &AppPaths, json: bool) -> Result<()> {
    open_storage(paths)?;
    report(
        json,
        true,
        format!("Database ready at {}.", paths.db_path.display()),
        None,
    )
}

fn cmd_import(paths: &AppPaths, files: &[PathBuf], classify: bool, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let mut summaries = Vec::new();
    for file in files {
        for video in ingest::load_videos(file)? {
            summaries.push(ingest::ingest_video(&storage, &video)?);
        }
    }
    let labelled = if classify {
        let ids: Vec<String> = summaries.iter().map(|s| s.video_id.clone()).collect();
        sentiment::classify_videos(&storage, &ids)?
    } else {
        0
    };

    if json {
        return print_json(&serde_json::json!({
            "videos": summaries,
            "classified": labelled,
        }));
    }

    for summary in &summaries {
        println!(
            "{}: {} comment(s), {} repl(ies) linked, {} skipped",
            summary.video_id, summary.comments, summary.replies_linked, summary.skipped
        );
    }
    println!("Imported {} video(s).", summaries.len());
    if classify {
        println!("Classified {} comment(s).", labelled);
    }
    Ok(())
}

fn cmd_import_search(paths: &AppPaths, file: &Path, classify: bool, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let search = ingest::load_search(file)?;
    let (query, summaries) = ingest::ingest_search(&storage, &search)?;
    let labelled = if classify {
        let ids: Vec<String> = summaries.iter().map(|s| s.video_id.clone()).collect();
        sentiment::classify_videos(&storage, &ids)?
    } else {
        0
    };

    if json {
        return print_json(&serde_json::json!({
            "search": query,
            "videos": summaries,
            "classified": labelled,
        }));
    }

    println!(
        "Recorded search #{} \"{}\" with {} result(s).",
        query.query_id, query.keyword, query.results_count
    );
    if classify {
        println!("Classified {} comment(s).", labelled);
    }
    Ok(())
}

fn cmd_videos(paths: &AppPaths, filter: VideoFilter, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let videos = storage.list_videos(filter)?;

    if json {
        return print_json(&videos);
    }

    if videos.is_empty() {
        println!("No videos found.");
        return Ok(());
    }

    for video in &videos {
        print_video_row(video);
    }
    Ok(())
}

fn cmd_video(paths: &AppPaths, id: &str, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let video = storage.get_video(id)?;
    let engagement = storage.engagement_stats(id)?;
    let sentiment = storage.sentiment_distribution(id)?;

    if json {
        return print_json(&VideoDetail {
            video: &video,
            engagement: &engagement,
            sentiment: &sentiment,
        });
    }

    print_video_detail(&video);
    println!("─────────────────────────");
    print_engagement(&engagement);
    print_sentiment(&sentiment);
    Ok(())
}

fn cmd_comments(paths: &AppPaths, filter: CommentFilter, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let comments = storage.list_comments(filter)?;

    if json {
        return print_json(&comments);
    }

    if comments.is_empty() {
        println!("No comments found.");
        return Ok(());
    }

    for comment in &comments {
        print_comment_row(comment);
    }
    Ok(())
}

fn cmd_replies(paths: &AppPaths, id: i64, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let parent = storage.get_comment(id)?;
    let replies = storage.replies_to(id)?;

    if json {
        return print_json(&serde_json::json!({
            "comment": parent,
            "replies": replies,
        }));
    }

    print_comment_row(&parent);
    if replies.is_empty() {
        println!("      (no replies)");
    }
    for reply in &replies {
        print!("    ");
        print_comment_row(reply);
    }
    Ok(())
}

fn cmd_classify(paths: &AppPaths, video: Option<&str>, force: bool, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    if let Some(id) = video {
        storage.get_video(id)?;
    }
    let labelled = sentiment::classify_comments(&storage, video, force)?;
    report(
        json,
        true,
        format!("Classified {} comment(s).", labelled),
        Some(labelled as i64),
    )
}

fn cmd_label(paths: &AppPaths, id: i64, raw: &str, json: bool) -> Result<()> {
    let label = if raw.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(parse_sentiment(raw)?)
    };
    let storage = open_storage(paths)?;
    storage.set_sentiment(id, label)?;
    let message = match label {
        Some(s) => format!("Labelled comment #{} as {}.", id, s.as_str()),
        None => format!("Cleared sentiment of comment #{}.", id),
    };
    report(json, true, message, None)
}

fn cmd_engagement(paths: &AppPaths, video: Option<&str>, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let stats = match video {
        Some(id) => vec![storage.engagement_stats(id)?],
        None => storage.all_engagement_stats()?,
    };

    if json {
        return print_json(&stats);
    }

    if stats.is_empty() {
        println!("No videos found.");
        return Ok(());
    }

    println!(
        "{:<22} {:>8} {:>8} {:>9} {:>8} {:>8}",
        "VIDEO", "COMMENTS", "USERS", "AVG LIKES", "MAIN", "REPLIES"
    );
    for s in &stats {
        println!(
            "{:<22} {:>8} {:>8} {:>9} {:>8} {:>8}",
            s.video_id,
            s.total_comments,
            s.unique_commenters,
            format_avg(s.avg_likes_per_comment),
            s.main_comments,
            s.replies
        );
    }
    Ok(())
}

fn cmd_sentiment(paths: &AppPaths, video: Option<&str>, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let dists = match video {
        Some(id) => vec![storage.sentiment_distribution(id)?],
        None => storage.all_sentiment_distributions()?,
    };

    if json {
        return print_json(&dists);
    }

    if dists.is_empty() {
        println!("No videos found.");
        return Ok(());
    }

    println!(
        "{:<22} {:>8} {:>5} {:>5} {:>5} {:>6} {:>6} {:>6}",
        "VIDEO", "COMMENTS", "POS", "NEU", "NEG", "UNSET", "POS%", "NEG%"
    );
    for d in &dists {
        println!(
            "{:<22} {:>8} {:>5} {:>5} {:>5} {:>6} {:>6} {:>6}",
            d.video_id,
            d.total_comments,
            d.positive_count,
            d.neutral_count,
            d.negative_count,
            d.unclassified_count,
            format_pct(d.positive_percentage),
            format_pct(d.negative_percentage)
        );
    }
    Ok(())
}

fn cmd_searches(paths: &AppPaths, limit: i64, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let searches = storage.list_searches(limit)?;

    if json {
        return print_json(&searches);
    }

    if searches.is_empty() {
        println!("No searches recorded.");
        return Ok(());
    }

    for s in &searches {
        println!(
            "{:>4} {}  {:>3} result(s), {:>3} stored  \"{}\"",
            s.query_id,
            s.created_at.format("%Y-%m-%d %H:%M"),
            s.results_count,
            s.stored_results,
            s.keyword
        );
    }
    Ok(())
}

fn cmd_search(paths: &AppPaths, id: i64, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let query = storage.get_search(id)?;
    let results = storage.search_results(id)?;

    if json {
        return print_json(&serde_json::json!({
            "search": query,
            "results": results,
        }));
    }

    println!("Search #{} \"{}\"", query.query_id, query.keyword);
    for ranked in &results {
        print!("{:>3}. ", ranked.rank);
        print_video_row(&ranked.video);
    }
    Ok(())
}

fn cmd_stats(paths: &AppPaths, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let stats = storage.database_stats()?;

    if json {
        return print_json(&stats);
    }

    println!("Database Statistics");
    println!("───────────────────");
    println!("Videos:        {}", stats.videos_count);
    println!("Comments:      {}", stats.comments_count);
    println!("Unique users:  {}", stats.unique_users);
    println!("Searches:      {}", stats.search_queries_count);
    if let Some(ref top) = stats.most_commented_video {
        println!(
            "Most comments: {} ({} comments)",
            top.video_id, top.comment_count
        );
    }
    if !stats.top_users.is_empty() {
        println!("Top users:");
        for user in &stats.top_users {
            println!("  {:<24} {}", user.username, user.comment_count);
        }
    }
    Ok(())
}

fn cmd_hashtags(paths: &AppPaths, limit: i64, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let tags = storage.popular_hashtags(limit)?;

    if json {
        return print_json(&tags);
    }

    if tags.is_empty() {
        println!("No hashtags found.");
        return Ok(());
    }

    for tag in &tags {
        println!("{:>6}  #{}", tag.count, tag.hashtag);
    }
    Ok(())
}

fn cmd_export(
    paths: &AppPaths,
    what: ExportTarget,
    out: Option<PathBuf>,
    format: Option<&str>,
    video: Option<String>,
    json: bool,
) -> Result<()> {
    let format = match format {
        Some(raw) => ExportFormat::parse(raw)
            .ok_or_else(|| StashError::InvalidInput(format!("unknown export format \"{}\"", raw)))?,
        None => out
            .as_deref()
            .and_then(ExportFormat::from_path)
            .unwrap_or(ExportFormat::Csv),
    };
    let out = out.unwrap_or_else(|| {
        paths.exports_dir.join(format!(
            "{}_{}.{}",
            what.name(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.as_str()
        ))
    });

    let storage = open_storage(paths)?;
    let rows = match what {
        ExportTarget::Comments => {
            let comments = export_comments(&storage, video)?;
            export::export_to_path(&comments, format, "TikTok Comments", &out)?;
            comments.len()
        }
        ExportTarget::Engagement => {
            let stats = match video {
                Some(id) => vec![storage.engagement_stats(&id)?],
                None => storage.all_engagement_stats()?,
            };
            export::export_to_path(&stats, format, "Engagement Statistics", &out)?;
            stats.len()
        }
        ExportTarget::Sentiment => {
            let dists = match video {
                Some(id) => vec![storage.sentiment_distribution(&id)?],
                None => storage.all_sentiment_distributions()?,
            };
            export::export_to_path(&dists, format, "Sentiment Distribution", &out)?;
            dists.len()
        }
    };

    report(
        json,
        true,
        format!("Exported {} row(s) to {}.", rows, out.display()),
        Some(rows as i64),
    )
}

fn export_comments(storage: &SqliteStorage, video: Option<String>) -> Result<Vec<Comment>> {
    const PAGE: i64 = 1000;
    let mut all = Vec::new();
    loop {
        let page = storage.list_comments(CommentFilter {
            video_id: video.clone(),
            limit: PAGE,
            offset: all.len() as i64,
            ..Default::default()
        })?;
        let done = (page.len() as i64) < PAGE;
        all.extend(page);
        if done {
            return Ok(all);
        }
    }
}

fn cmd_delete(paths: &AppPaths, id: &str, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let found = storage.delete_video(id)?;
    let message = if found {
        format!("Deleted video {} and its comments.", id)
    } else {
        format!("Video {} not found.", id)
    };
    report(json, found, message, None)
}

fn cmd_delete_search(paths: &AppPaths, id: i64, json: bool) -> Result<()> {
    let storage = open_storage(paths)?;
    let found = storage.delete_search(id)?;
    let message = if found {
        format!("Deleted search #{}.", id)
    } else {
        format!("Search #{} not found.", id)
    };
    report(json, found, message, None)
}

fn cmd_purge(paths: &AppPaths, yes: bool, json: bool) -> Result<()> {
    if !yes {
        return Err(StashError::InvalidInput(
            "refusing to delete all data without --yes".into(),
        ));
    }
    let storage = open_storage(paths)?;
    let summary = storage.purge_all()?;

    if json {
        return print_json(&summary);
    }

    println!(
        "Removed {} video(s), {} comment(s) and {} search(es).",
        summary.videos, summary.comments, summary.search_queries
    );
    Ok(())
}

fn print_video_row(video: &Video) {
    let author = video.author.as_deref().unwrap_or("?");
    let title = preview(video.title.as_deref().unwrap_or(""), 50);
    println!(
        "{:<20} {:<18} {:>8} views {:>7} likes  {}",
        video.video_id,
        preview(author, 18),
        format_count(video.views),
        format_count(video.likes),
        title
    );
}

fn print_video_detail(video: &Video) {
    println!("ID:       {}", video.video_id);
    println!("URL:      {}", video.video_url);
    println!("Author:   {}", video.author.as_deref().unwrap_or("unknown"));
    if let Some(ref title) = video.title {
        println!("Title:    {}", title);
    }
    if let Some(ref description) = video.description {
        println!("About:    {}", description);
    }
    println!(
        "Counts:   {} views, {} likes, {} shares, {} comments",
        format_count(video.views),
        format_count(video.likes),
        format_count(video.shares),
        format_count(video.comments)
    );
    if let Some(ref posted) = video.post_time {
        println!("Posted:   {}", posted);
    }
    if let Some(ref music) = video.music {
        println!("Music:    {}", music);
    }
    if !video.tags.is_empty() {
        let tags: Vec<&str> = video.tags.iter().map(String::as_str).collect();
        println!("Tags:     {}", tags.join(", "));
    }
    println!("Crawled:  {}", video.crawled_at.format("%Y-%m-%d %H:%M:%S"));
}

fn print_engagement(stats: &EngagementStats) {
    println!("Comments:       {}", stats.total_comments);
    println!("  Top-level:    {}", stats.main_comments);
    println!("  Replies:      {}", stats.replies);
    println!("Commenters:     {}", stats.unique_commenters);
    println!("Avg likes:      {}", format_avg(stats.avg_likes_per_comment));
}

fn print_sentiment(dist: &SentimentDistribution) {
    println!(
        "Sentiment:      {} positive, {} neutral, {} negative, {} unlabelled",
        dist.positive_count, dist.neutral_count, dist.negative_count, dist.unclassified_count
    );
    println!(
        "  Positive:     {}",
        format_pct(dist.positive_percentage)
    );
    println!(
        "  Negative:     {}",
        format_pct(dist.negative_percentage)
    );
}

fn print_comment_row(comment: &Comment) {
    let marker = if comment.is_reply { "↳" } else { " " };
    let label = match comment.sentiment {
        Some(Sentiment::Positive) => "+",
        Some(Sentiment::Neutral) => "=",
        Some(Sentiment::Negative) => "-",
        None => " ",
    };
    let text = comment
        .comment_text
        .as_deref()
        .unwrap_or("")
        .replace('\n', "\\n");
    println!(
        "{:>6} {}{} {:<20} {:>6}♥  {}",
        comment.comment_id,
        marker,
        label,
        preview(&comment.username, 20),
        format_count(comment.likes),
        preview(&text, 60)
    );
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

fn format_count(n: i64) -> String {
    if n < 1_000 {
        n.to_string()
    } else if n < 1_000_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else if n < 1_000_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else {
        format!("{:.1}B", n as f64 / 1_000_000_000.0)
    }
}

fn format_avg(avg: Option<f64>) -> String {
    avg.map(|a| format!("{:.2}", a)).unwrap_or_else(|| "-".to_string())
}

fn format_pct(pct: Option<i64>) -> String {
    pct.map(|p| format!("{}%", p)).unwrap_or_else(|| "-".to_string())
}
