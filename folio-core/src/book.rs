use once_cell::sync::Lazy;
use tracing::instrument;
use uuid::Uuid;

use crate::analyzer::{analyze, reading_minutes};
use crate::chapters::{Chapter, ChapterDetector};
use crate::error::PipelineError;
use crate::layout::{self, PageBudget, Viewport};
use crate::pagination::{paginate, Page};
use crate::search::{SearchHit, SearchIndex};
use crate::settings::Settings;
use crate::toc::{self, TocEntry};

pub type BookId = Uuid;

static BOOK_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d8a52-6c1e-5b7a-9e44-2d9c8b1f7a60").expect("valid namespace UUID")
});

/// Stable identifier derived from the text, so saved progress can be matched
/// to the same book later.
pub fn book_id_for_content(raw: &str) -> BookId {
    Uuid::new_v5(&BOOK_NAMESPACE, raw.as_bytes())
}

/// One immutable revision of a paginated book. Settings or viewport changes
/// produce a new `Book` through [`Book::reflow`].
#[derive(Debug, Clone)]
pub struct Book {
    pub id: BookId,
    pub raw_content: String,
    pub title: String,
    pub author: String,
    pub total_words: usize,
    pub total_chars: usize,
    pub reading_time_minutes: u32,
    pub chapters: Vec<Chapter>,
    pub pages: Vec<Page>,
    pub toc: Vec<TocEntry>,
    pub search_index: SearchIndex,
    pub budget: PageBudget,
}

impl Book {
    #[instrument(skip(raw, settings), fields(bytes = raw.len()))]
    pub fn build(
        raw: &str,
        settings: &Settings,
        viewport: Viewport,
        words_per_minute: u32,
    ) -> Result<Self, PipelineError> {
        let summary = analyze(raw, words_per_minute);
        let chapters = ChapterDetector::default().detect(raw);
        let budget = layout::compute(settings, viewport)?;
        let book = Self::assemble(
            Self {
                id: book_id_for_content(raw),
                raw_content: raw.to_string(),
                title: summary.title,
                author: summary.author,
                total_words: summary.total_words,
                total_chars: summary.total_chars,
                reading_time_minutes: summary.reading_time_minutes,
                toc: toc::skeleton(&chapters),
                chapters,
                pages: Vec::new(),
                search_index: SearchIndex::default(),
                budget,
            },
            words_per_minute,
        );
        book.verify()?;
        Ok(book)
    }

    /// Re-runs layout, pagination and indexing against new settings. Content
    /// analysis and chapters carry over unchanged.
    #[instrument(skip(self, settings), fields(book = %self.id))]
    pub fn reflow(
        &self,
        settings: &Settings,
        viewport: Viewport,
        words_per_minute: u32,
    ) -> Result<Self, PipelineError> {
        let budget = layout::compute(settings, viewport)?;
        let book = Self::assemble(
            Self {
                id: self.id,
                raw_content: self.raw_content.clone(),
                title: self.title.clone(),
                author: self.author.clone(),
                total_words: self.total_words,
                total_chars: self.total_chars,
                reading_time_minutes: self.reading_time_minutes,
                chapters: self.chapters.clone(),
                toc: toc::skeleton(&self.chapters),
                pages: Vec::new(),
                search_index: SearchIndex::default(),
                budget,
            },
            words_per_minute,
        );
        book.verify()?;
        Ok(book)
    }

    fn assemble(mut book: Self, words_per_minute: u32) -> Self {
        let pagination = paginate(&book.chapters, &book.budget, words_per_minute);
        toc::fill_page_numbers(&mut book.toc, &pagination.first_pages, pagination.pages.len());
        book.search_index = SearchIndex::build(&pagination.pages);
        book.pages = pagination.pages;
        book
    }

    fn verify(&self) -> Result<(), PipelineError> {
        if self.pages.is_empty() {
            return Err(PipelineError::Inconsistent("no pages emitted".into()));
        }
        if let Some((idx, page)) = self
            .pages
            .iter()
            .enumerate()
            .find(|(idx, page)| page.page_number != idx + 1)
        {
            return Err(PipelineError::Inconsistent(format!(
                "page at position {} is numbered {}",
                idx, page.page_number
            )));
        }
        let mut previous = 0;
        for entry in &self.toc {
            let page = entry.page_number.ok_or_else(|| {
                PipelineError::Inconsistent(format!("chapter {:?} has no page", entry.title))
            })?;
            if page < previous || page > self.pages.len() {
                return Err(PipelineError::Inconsistent(format!(
                    "chapter {:?} points at page {}",
                    entry.title, page
                )));
            }
            previous = page;
        }
        Ok(())
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    /// Page by 1-based page number.
    pub fn page(&self, page_number: usize) -> Option<&Page> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
    }

    pub fn chapter_title(&self, chapter_index: usize) -> Option<&str> {
        self.chapters.get(chapter_index).map(|c| c.title.as_str())
    }

    /// Index of the page a chapter starts on.
    pub fn chapter_start_index(&self, chapter_index: usize) -> Option<usize> {
        self.toc
            .get(chapter_index)
            .and_then(|entry| entry.page_number)
            .map(|page| page - 1)
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.search_index.search(query)
    }

    /// Minutes to finish the chapter of `page_index`, counting that page.
    pub fn minutes_left_in_chapter(&self, page_index: usize, words_per_minute: u32) -> u32 {
        let Some(current) = self.pages.get(page_index) else {
            return 0;
        };
        let words: usize = self.pages[page_index..]
            .iter()
            .take_while(|page| page.chapter_index == current.chapter_index)
            .map(|page| page.word_count)
            .sum();
        reading_minutes(words, words_per_minute)
    }
}
