use serde::{Deserialize, Serialize};

use crate::chapters::Chapter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub chapter_id: String,
    pub title: String,
    pub chapter_number: usize,
    /// First page of the chapter; `None` until pagination has run.
    pub page_number: Option<usize>,
    pub level: u8,
}

pub fn skeleton(chapters: &[Chapter]) -> Vec<TocEntry> {
    chapters
        .iter()
        .map(|chapter| TocEntry {
            chapter_id: chapter.id.clone(),
            title: chapter.title.clone(),
            chapter_number: chapter.chapter_number,
            page_number: None,
            level: chapter.level,
        })
        .collect()
}

/// Fills page numbers from each chapter's first emitted page. A chapter that
/// emitted nothing points at the next page that exists, or the last page.
pub fn fill_page_numbers(toc: &mut [TocEntry], first_pages: &[Option<usize>], total_pages: usize) {
    let last_page = total_pages.max(1);
    let mut next_known = last_page;
    for (entry, first) in toc.iter_mut().zip(first_pages.iter()).rev() {
        if let Some(page) = first {
            next_known = *page;
        }
        entry.page_number = Some(first.unwrap_or(next_known).min(last_page));
    }
}
