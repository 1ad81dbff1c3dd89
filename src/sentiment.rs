//! Keyword-based sentiment labelling for comments.

use std::collections::BTreeSet;

use tracing::info;

use crate::errors::Result;
use crate::storage::ScrapeStorage;
use crate::storage::models::{CommentFilter, Sentiment};

const BATCH_SIZE: i64 = 500;

// Matched on whole words after lowercasing.
const POSITIVE_WORDS: &[&str] = &[
    "hay", "tốt", "đẹp", "thích", "yêu", "tuyệt vời", "xuất sắc", "tuyệt", "giỏi", "thú vị",
    "ủng hộ", "tài năng", "đỉnh", "chất", "vip", "pro", "hahaha", "hihi", "xinh", "dễ thương",
    "đáng yêu", "cool", "thích thú", "love", "great", "amazing", "awesome", "best", "beautiful",
    "cute", "funny", "nice", "wow", "perfect",
];

const NEGATIVE_WORDS: &[&str] = &[
    "tệ", "kém", "dở", "ghét", "chán", "buồn", "thất vọng", "không thích", "tào lao", "vô duyên",
    "nhảm", "xấu", "dở tệ", "phí", "dỡ", "lừa đảo", "scam", "cùi", "gà", "dở hơi", "phèn", "cay",
    "toxic", "hate", "bad", "worst", "boring", "ugly", "cringe", "fake", "terrible", "awful",
];

// Matched as substrings of the raw text.
const POSITIVE_EMOJI: &[&str] = &["❤️", "😍", "👍", "👏", "🔥", "💯", "👌", "😊"];
const NEGATIVE_EMOJI: &[&str] = &["👎", "😒", "😡", "🤮", "💩", "😤", "🤬"];

fn word_form(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn hits(words: &str, raw: &str, lexicon: &[&str], emoji: &[&str]) -> usize {
    let word_hits = lexicon
        .iter()
        .filter(|word| words.contains(&format!(" {} ", word)))
        .count();
    let emoji_hits = emoji.iter().filter(|e| raw.contains(*e)).count();
    word_hits + emoji_hits
}

/// More positive than negative hits is positive, the reverse negative,
/// everything else neutral.
pub fn classify(text: &str) -> Sentiment {
    let words = word_form(text);
    let positive = hits(&words, text, POSITIVE_WORDS, POSITIVE_EMOJI);
    let negative = hits(&words, text, NEGATIVE_WORDS, NEGATIVE_EMOJI);
    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Labels unclassified comments (or every comment when `force` is set),
/// optionally restricted to one video. Returns how many were labelled.
pub fn classify_comments<S: ScrapeStorage>(
    storage: &S,
    video_id: Option<&str>,
    force: bool,
) -> Result<usize> {
    let mut labelled = 0;
    let mut offset = 0;
    loop {
        let batch = storage.list_comments(CommentFilter {
            video_id: video_id.map(String::from),
            unclassified_only: !force,
            limit: BATCH_SIZE,
            offset,
            ..Default::default()
        })?;
        if batch.is_empty() {
            break;
        }
        for comment in &batch {
            let label = comment
                .comment_text
                .as_deref()
                .map(classify)
                .unwrap_or(Sentiment::Neutral);
            storage.set_sentiment(comment.comment_id, Some(label))?;
            labelled += 1;
        }
        // Unclassified pages shrink as they are labelled, so only forced runs advance.
        if force {
            offset += batch.len() as i64;
        }
        if (batch.len() as i64) < BATCH_SIZE {
            break;
        }
    }
    info!(labelled, force, "classified comments");
    Ok(labelled)
}

/// Labels the unclassified comments of the given videos only.
pub fn classify_videos<S: ScrapeStorage>(storage: &S, video_ids: &[String]) -> Result<usize> {
    let unique: BTreeSet<&str> = video_ids.iter().map(String::as_str).collect();
    let mut labelled = 0;
    for video_id in unique {
        labelled += classify_comments(storage, Some(video_id), false)?;
    }
    Ok(labelled)
}
