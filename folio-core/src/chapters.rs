//! Chapter segmentation driven by a prioritized list of heading heuristics.
//!
//! Heuristics are tried in priority order and the first one that finds at
//! least one heading decides every chapter boundary. Lower-priority
//! heuristics are never mixed in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::count_words;

pub const MAIN_CONTENT_TITLE: &str = "Main content";
pub const FRONT_MATTER_TITLE: &str = "Front matter";

static MARKDOWN_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,2})[ \t]+(\S.*?)[ \t]*$").expect("valid header pattern"));
static CHAPTER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[ \t]*(cap[íi]tulo|chapter)[ \t]+(\d+\b|[ivxlcdm]+[ \t]*([:.\-–—]|$))")
        .expect("valid chapter label pattern")
});
static NUMBERED_SECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(\d{1,3})\.[ \t]+(\S.*?)[ \t]*$").expect("valid numbered section pattern")
});

const MAX_CAPS_HEADING_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub content: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub word_count: usize,
    pub chapter_number: usize,
    pub level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeuristicKind {
    MarkdownHeader,
    ChapterLabel,
    NumberedSection,
    AllCapsLine,
}

/// A heading found by a heuristic, located by the byte offset of its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    pub offset: usize,
    pub title: String,
    pub level: u8,
}

pub type HeadingMatcher = fn(&str) -> Vec<HeadingMatch>;

#[derive(Clone)]
pub struct ChapterHeuristic {
    pub priority: u8,
    pub kind: HeuristicKind,
    pub matcher: HeadingMatcher,
}

impl std::fmt::Debug for ChapterHeuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterHeuristic")
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .finish()
    }
}

impl ChapterHeuristic {
    pub fn new(priority: u8, kind: HeuristicKind) -> Self {
        let matcher: HeadingMatcher = match kind {
            HeuristicKind::MarkdownHeader => match_markdown_headers,
            HeuristicKind::ChapterLabel => match_chapter_labels,
            HeuristicKind::NumberedSection => match_numbered_sections,
            HeuristicKind::AllCapsLine => match_all_caps_lines,
        };
        Self {
            priority,
            kind,
            matcher,
        }
    }

    pub fn find(&self, raw: &str) -> Vec<HeadingMatch> {
        (self.matcher)(raw)
    }
}

pub fn default_heuristics() -> Vec<ChapterHeuristic> {
    vec![
        ChapterHeuristic::new(1, HeuristicKind::MarkdownHeader),
        ChapterHeuristic::new(2, HeuristicKind::ChapterLabel),
        ChapterHeuristic::new(3, HeuristicKind::NumberedSection),
        ChapterHeuristic::new(4, HeuristicKind::AllCapsLine),
    ]
}

#[derive(Debug, Clone)]
pub struct ChapterDetector {
    heuristics: Vec<ChapterHeuristic>,
}

impl Default for ChapterDetector {
    fn default() -> Self {
        Self::with_heuristics(default_heuristics())
    }
}

impl ChapterDetector {
    pub fn with_heuristics(mut heuristics: Vec<ChapterHeuristic>) -> Self {
        heuristics.sort_by_key(|h| h.priority);
        Self { heuristics }
    }

    /// The first heuristic with a non-empty match set, and its matches.
    pub fn winning_matches(&self, raw: &str) -> Option<(HeuristicKind, Vec<HeadingMatch>)> {
        self.heuristics.iter().find_map(|heuristic| {
            let matches = heuristic.find(raw);
            if matches.is_empty() {
                None
            } else {
                Some((heuristic.kind, matches))
            }
        })
    }

    pub fn detect(&self, raw: &str) -> Vec<Chapter> {
        match self.winning_matches(raw) {
            Some((kind, matches)) => {
                debug!(?kind, headings = matches.len(), "chapter heuristic selected");
                chapters_from_matches(raw, matches)
            }
            None => {
                debug!("no chapter headings found, using a single chapter");
                vec![make_chapter(raw, 0, raw.len(), MAIN_CONTENT_TITLE, 1, 1)]
            }
        }
    }
}

fn chapters_from_matches(raw: &str, mut matches: Vec<HeadingMatch>) -> Vec<Chapter> {
    matches.sort_by_key(|m| m.offset);
    matches.dedup_by_key(|m| m.offset);

    let mut chapters = Vec::with_capacity(matches.len() + 1);
    if let Some(first) = matches.first_mut() {
        if first.offset > 0 {
            if raw[..first.offset].trim().is_empty() {
                first.offset = 0;
            } else {
                chapters.push(make_chapter(raw, 0, first.offset, FRONT_MATTER_TITLE, 1, 1));
            }
        }
    }

    for (idx, heading) in matches.iter().enumerate() {
        let end = matches
            .get(idx + 1)
            .map(|next| next.offset)
            .unwrap_or(raw.len());
        let number = chapters.len() + 1;
        chapters.push(make_chapter(
            raw,
            heading.offset,
            end,
            &heading.title,
            heading.level,
            number,
        ));
    }
    chapters
}

fn make_chapter(
    raw: &str,
    start: usize,
    end: usize,
    title: &str,
    level: u8,
    chapter_number: usize,
) -> Chapter {
    let content = raw[start..end].to_string();
    Chapter {
        id: format!("chapter-{}", chapter_number),
        title: title.to_string(),
        word_count: count_words(&content),
        content,
        start_offset: start,
        end_offset: end,
        chapter_number,
        level,
    }
}

/// Yields `(byte offset, line)` pairs with line terminators removed.
fn lines_with_offsets(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    raw.split_inclusive('\n').map(move |segment| {
        let start = offset;
        offset += segment.len();
        let line = segment.strip_suffix('\n').unwrap_or(segment);
        (start, line.strip_suffix('\r').unwrap_or(line))
    })
}

fn match_markdown_headers(raw: &str) -> Vec<HeadingMatch> {
    lines_with_offsets(raw)
        .filter_map(|(offset, line)| {
            let caps = MARKDOWN_HEADER.captures(line)?;
            Some(HeadingMatch {
                offset,
                title: caps[2].to_string(),
                level: caps[1].len() as u8,
            })
        })
        .collect()
}

fn match_chapter_labels(raw: &str) -> Vec<HeadingMatch> {
    lines_with_offsets(raw)
        .filter(|(_, line)| CHAPTER_LABEL.is_match(line))
        .map(|(offset, line)| HeadingMatch {
            offset,
            title: line.trim().to_string(),
            level: 1,
        })
        .collect()
}

fn match_numbered_sections(raw: &str) -> Vec<HeadingMatch> {
    lines_with_offsets(raw)
        .filter(|(_, line)| NUMBERED_SECTION.is_match(line))
        .map(|(offset, line)| HeadingMatch {
            offset,
            title: line.trim().to_string(),
            level: 1,
        })
        .collect()
}

fn match_all_caps_lines(raw: &str) -> Vec<HeadingMatch> {
    let lines: Vec<(usize, &str)> = lines_with_offsets(raw).collect();
    let is_blank = |idx: Option<usize>| match idx.and_then(|i| lines.get(i)) {
        Some((_, line)) => line.trim().is_empty(),
        None => true,
    };

    lines
        .iter()
        .enumerate()
        .filter(|(idx, (_, line))| {
            is_caps_heading(line) && is_blank(idx.checked_sub(1)) && is_blank(Some(idx + 1))
        })
        .map(|(_, (offset, line))| HeadingMatch {
            offset: *offset,
            title: line.trim().to_string(),
            level: 1,
        })
        .collect()
}

fn is_caps_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_CAPS_HEADING_CHARS {
        return false;
    }
    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2 && !trimmed.chars().any(char::is_lowercase)
}
