//! Greedy page packing over chapter paragraphs.
//!
//! Decisions are made on raw text only; markup is rendered after a page's
//! text is final.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::analyzer::{count_words, reading_minutes};
use crate::chapters::Chapter;
use crate::format::{format_page, PLACEHOLDER_PAGE_HTML};
use crate::layout::PageBudget;
use crate::text::{sentence_spans, split_paragraphs};

/// Share of the word budget a sentence-split part may fill.
pub const SENTENCE_SPLIT_FILL: f32 = 0.9;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub formatted_content: String,
    pub raw_content: String,
    pub page_number: usize,
    pub chapter_index: usize,
    pub word_count: usize,
    pub estimated_reading_time_minutes: u32,
    /// Set when a single sentence could not be split to fit the word budget.
    pub oversized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub pages: Vec<Page>,
    /// Page number of the first page emitted for each chapter.
    pub first_pages: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DraftPage {
    raw: String,
    words: usize,
}

#[instrument(skip_all, fields(chapters = chapters.len(), words_per_page = budget.words_per_page))]
pub fn paginate(chapters: &[Chapter], budget: &PageBudget, words_per_minute: u32) -> Pagination {
    let mut pages: Vec<Page> = Vec::new();
    let mut first_pages = Vec::with_capacity(chapters.len());

    for (chapter_index, chapter) in chapters.iter().enumerate() {
        let drafts = paginate_chapter(&chapter.content, budget);
        first_pages.push((!drafts.is_empty()).then(|| pages.len() + 1));
        for draft in drafts {
            let page_number = pages.len() + 1;
            pages.push(Page {
                id: format!("page-{}", page_number),
                formatted_content: format_page(&draft.raw),
                page_number,
                chapter_index,
                word_count: draft.words,
                estimated_reading_time_minutes: reading_minutes(draft.words, words_per_minute),
                oversized: draft.words > budget.words_per_page,
                raw_content: draft.raw,
            });
        }
    }

    if pages.is_empty() {
        debug!("no text to paginate, emitting placeholder page");
        pages.push(placeholder_page());
        if let Some(first) = first_pages.first_mut() {
            *first = Some(1);
        }
    }

    debug!(pages = pages.len(), "pagination complete");
    Pagination { pages, first_pages }
}

pub fn placeholder_page() -> Page {
    Page {
        id: "page-1".to_string(),
        formatted_content: PLACEHOLDER_PAGE_HTML.to_string(),
        raw_content: String::new(),
        page_number: 1,
        chapter_index: 0,
        word_count: 0,
        estimated_reading_time_minutes: 0,
        oversized: false,
    }
}

fn paginate_chapter(content: &str, budget: &PageBudget) -> Vec<DraftPage> {
    let mut drafts = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_words = 0;

    for paragraph in split_paragraphs(content) {
        let words = count_words(paragraph);
        if words > budget.words_per_page {
            flush(&mut drafts, &mut buffer, &mut buffer_words);
            drafts.extend(split_long_paragraph(paragraph, budget));
            continue;
        }
        if !buffer.is_empty() && !budget.fits(buffer_words + words) {
            flush(&mut drafts, &mut buffer, &mut buffer_words);
        }
        buffer.push(paragraph);
        buffer_words += words;
    }
    flush(&mut drafts, &mut buffer, &mut buffer_words);
    drafts
}

fn flush(drafts: &mut Vec<DraftPage>, buffer: &mut Vec<&str>, buffer_words: &mut usize) {
    if buffer.is_empty() {
        return;
    }
    drafts.push(DraftPage {
        raw: buffer.join(PARAGRAPH_SEPARATOR),
        words: *buffer_words,
    });
    buffer.clear();
    *buffer_words = 0;
}

/// Splits a paragraph longer than a page at sentence boundaries. Each part
/// holds whole sentences up to the fill limit and keeps the source spacing.
fn split_long_paragraph(paragraph: &str, budget: &PageBudget) -> Vec<DraftPage> {
    let limit = ((budget.words_per_page as f32 * SENTENCE_SPLIT_FILL).floor() as usize).max(1);
    let mut parts = Vec::new();
    let mut part_start = None;
    let mut part_end = 0;
    let mut part_words = 0;

    for span in sentence_spans(paragraph) {
        let words = count_words(&paragraph[span.clone()]);
        if let Some(start) = part_start {
            if part_words + words > limit {
                parts.push(DraftPage {
                    raw: paragraph[start..part_end].to_string(),
                    words: part_words,
                });
                part_start = None;
                part_words = 0;
            }
        }
        part_start.get_or_insert(span.start);
        part_end = span.end;
        part_words += words;
    }
    if let Some(start) = part_start {
        parts.push(DraftPage {
            raw: paragraph[start..part_end].to_string(),
            words: part_words,
        });
    }

    debug!(
        words = count_words(paragraph),
        parts = parts.len(),
        "split oversized paragraph at sentence boundaries"
    );
    parts
}
