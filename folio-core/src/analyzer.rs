//! Book-level metadata and statistics pulled from raw text.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_READING_SPEED_WPM: u32 = 250;
pub const UNTITLED: &str = "Untitled";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

static TITLE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(\S.*?)[ \t]*\r?$").expect("valid title pattern"));
static AUTHOR_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^[ \t]*author[ \t]*:[ \t]*(\S.*?)[ \t]*\r?$").expect("valid author pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
    pub title: String,
    pub author: String,
    pub total_words: usize,
    pub total_chars: usize,
    pub reading_time_minutes: u32,
}

pub fn analyze(raw: &str, words_per_minute: u32) -> ContentSummary {
    let title = TITLE_LINE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNTITLED.to_string());
    let author = AUTHOR_LINE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let total_words = count_words(raw);

    ContentSummary {
        title,
        author,
        total_words,
        total_chars: raw.chars().count(),
        reading_time_minutes: reading_minutes(total_words, words_per_minute),
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whole minutes needed to read `words`, rounded up; zero only for no words.
pub fn reading_minutes(words: usize, words_per_minute: u32) -> u32 {
    let wpm = words_per_minute.max(1) as usize;
    words.div_ceil(wpm) as u32
}
