//! Navigation state machine that owns the current book revision.
//!
//! `Uninitialized → Ready ⇄ Transitioning`, with `Error` reachable from any
//! pipeline run. Navigation is only accepted in `Ready`; calls made while a
//! transition is in flight are dropped, not queued.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use tracing::{debug, error, info, instrument, warn};

use crate::book::{book_id_for_content, Book};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, PipelineError};
use crate::events::{EventSink, NullSink, ReaderEvent};
use crate::layout::Viewport;
use crate::pagination::Page;
use crate::search::SearchHit;
use crate::settings::{Settings, SettingsPatch};
use crate::store::{Bookmark, KeyValueStore, ReadingStore};
use crate::toc::TocEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Uninitialized,
    Ready,
    Transitioning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationState {
    pub current_page_index: usize,
    pub current_chapter_index: usize,
    pub is_transitioning: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NextPage,
    PrevPage,
    GotoPage { index: usize },
    GotoChapter { index: usize },
    FirstPage,
    LastPage,
    ApplySettings(SettingsPatch),
    Resize(Viewport),
    AddBookmark { label: String },
    RemoveBookmark { page_number: usize },
    FinishTransition,
}

/// Reading-progress fraction of `index` within `total_pages`.
pub fn progress_fraction(index: usize, total_pages: usize) -> f64 {
    if total_pages <= 1 {
        0.0
    } else {
        index.min(total_pages - 1) as f64 / (total_pages - 1) as f64
    }
}

/// Page index that keeps `fraction` of the way through `total_pages`.
pub fn restore_page_index(fraction: f64, total_pages: usize) -> usize {
    if total_pages == 0 {
        return 0;
    }
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((fraction * total_pages as f64).floor() as usize).min(total_pages - 1)
}

pub struct Reader {
    config: EngineConfig,
    state: ReaderState,
    settings: Settings,
    viewport: Viewport,
    book: Option<Arc<Book>>,
    navigation: NavigationState,
    bookmarks: Vec<Bookmark>,
    sink: Arc<dyn EventSink>,
    store: Option<ReadingStore>,
    clock: Arc<dyn Clock>,
}

impl Reader {
    pub fn new(config: EngineConfig) -> Self {
        let settings = config.settings.clamped();
        let viewport = settings.device_profile.viewport(&config.chrome);
        Self {
            config,
            state: ReaderState::Uninitialized,
            settings,
            viewport,
            book: None,
            navigation: NavigationState::default(),
            bookmarks: Vec::new(),
            sink: Arc::new(NullSink),
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(ReadingStore::new(store));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn navigation(&self) -> NavigationState {
        self.navigation
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// The last successfully built book, kept through later failures.
    pub fn book(&self) -> Option<&Arc<Book>> {
        self.book.as_ref()
    }

    pub fn total_pages(&self) -> usize {
        self.book.as_ref().map_or(0, |book| book.total_pages())
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.book
            .as_ref()
            .and_then(|book| book.pages.get(self.navigation.current_page_index))
    }

    /// Page by 1-based page number.
    pub fn get_page(&self, page_number: usize) -> Option<&Page> {
        self.book.as_ref().and_then(|book| book.page(page_number))
    }

    pub fn toc(&self) -> &[TocEntry] {
        match &self.book {
            Some(book) => &book.toc,
            None => &[],
        }
    }

    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        self.book
            .as_ref()
            .map(|book| book.search(query))
            .unwrap_or_default()
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn progress(&self) -> f64 {
        progress_fraction(self.navigation.current_page_index, self.total_pages())
    }

    pub fn minutes_left_in_chapter(&self) -> u32 {
        self.book.as_ref().map_or(0, |book| {
            book.minutes_left_in_chapter(
                self.navigation.current_page_index,
                self.config.reading_speed_wpm,
            )
        })
    }

    /// Runs the whole pipeline for `content`. On failure the previous book,
    /// if any, stays published and the reader enters `Error`.
    #[instrument(skip(self, content, settings), fields(bytes = content.len()))]
    pub fn init(
        &mut self,
        content: &str,
        settings: Settings,
        viewport: Viewport,
    ) -> Result<(), EngineError> {
        let book_id = book_id_for_content(content);
        let settings = self
            .load_or_warn("settings", |store| store.load_settings())
            .flatten()
            .unwrap_or(settings)
            .clamped();
        let same_book = self
            .load_or_warn("book id", |store| store.load_book_id())
            .flatten()
            == Some(book_id);

        let book = match Book::build(content, &settings, viewport, self.config.reading_speed_wpm) {
            Ok(book) => book,
            Err(err) => return Err(self.fail(err)),
        };

        let total_pages = book.total_pages();
        let (restored_page, bookmarks) = if same_book {
            let page = self
                .load_or_warn("current page", |store| store.load_current_page())
                .flatten();
            let bookmarks = self
                .load_or_warn("bookmarks", |store| store.load_bookmarks())
                .unwrap_or_default();
            (page, bookmarks)
        } else {
            (None, Vec::new())
        };
        let index = restored_page
            .map(|page| page.saturating_sub(1).min(total_pages - 1))
            .unwrap_or(0);

        self.settings = settings;
        self.viewport = viewport;
        self.bookmarks = bookmarks
            .into_iter()
            .filter(|b| (1..=total_pages).contains(&b.page_number))
            .collect();
        self.navigation = NavigationState {
            current_page_index: index,
            current_chapter_index: book.pages[index].chapter_index,
            is_transitioning: false,
        };
        info!(
            title = %book.title,
            pages = total_pages,
            chapters = book.total_chapters(),
            "book initialized"
        );
        let book = Arc::new(book);
        self.book = Some(Arc::clone(&book));
        self.state = ReaderState::Ready;

        self.sink.emit(ReaderEvent::Initialized {
            total_pages,
            total_chapters: book.total_chapters(),
        });
        self.emit_page_changed(&book);
        self.persist("book id", |store| store.save_book_id(book_id));
        self.persist("settings", |store| store.save_settings(&settings));
        self.persist_position();
        Ok(())
    }

    /// Moves to page `index` (0-based). Returns `false` and changes nothing
    /// when the index is out of range, a transition is in flight or no book
    /// was ever built. After a failed rebuild the last good book stays
    /// navigable.
    pub fn go_to_page(&mut self, index: usize) -> bool {
        if self.state == ReaderState::Transitioning {
            debug!(index, "navigation ignored during transition");
            return false;
        }
        let Some(book) = self.book.clone() else {
            debug!(state = ?self.state, index, "navigation ignored without a book");
            return false;
        };
        let Some(page) = book.pages.get(index) else {
            debug!(index, total = book.total_pages(), "page out of range");
            return false;
        };

        self.state = ReaderState::Transitioning;
        self.navigation = NavigationState {
            current_page_index: index,
            current_chapter_index: page.chapter_index,
            is_transitioning: true,
        };
        self.emit_page_changed(&book);
        self.persist_position();
        if !self.config.animated_transitions {
            self.finish_transition();
        }
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.navigation.current_page_index + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.navigation.current_page_index.checked_sub(1) {
            Some(index) => self.go_to_page(index),
            None => false,
        }
    }

    pub fn go_to_first(&mut self) -> bool {
        self.go_to_page(0)
    }

    pub fn go_to_last(&mut self) -> bool {
        match self.total_pages().checked_sub(1) {
            Some(index) => self.go_to_page(index),
            None => false,
        }
    }

    pub fn go_to_chapter(&mut self, chapter_index: usize) -> bool {
        let start = self
            .book
            .as_ref()
            .and_then(|book| book.chapter_start_index(chapter_index));
        match start {
            Some(index) => self.go_to_page(index),
            None => false,
        }
    }

    /// Ends a held page-turn transition.
    pub fn finish_transition(&mut self) -> bool {
        if self.state != ReaderState::Transitioning {
            return false;
        }
        self.state = ReaderState::Ready;
        self.navigation.is_transitioning = false;
        true
    }

    /// Merges `patch` into the settings and re-paginates, keeping the reader
    /// at the same fraction of the book. Changes that leave layout alone keep
    /// the current pages.
    #[instrument(skip(self))]
    pub fn apply_settings(&mut self, patch: SettingsPatch) -> Result<bool, EngineError> {
        if self.state == ReaderState::Transitioning {
            debug!("settings change ignored during transition");
            return Ok(false);
        }
        let merged = self.settings.merged(&patch);
        let viewport = if merged.device_profile != self.settings.device_profile {
            merged.device_profile.viewport(&self.config.chrome)
        } else {
            self.viewport
        };

        let Some(book) = self.book.clone() else {
            self.settings = merged;
            self.viewport = viewport;
            self.sink.emit(ReaderEvent::SettingsChanged { settings: merged });
            self.persist("settings", |store| store.save_settings(&merged));
            return Ok(true);
        };

        if self.settings.affects_layout(&merged) || viewport != self.viewport {
            self.reflow(&book, merged, viewport)?;
        } else {
            debug!(theme = ?merged.theme, "cosmetic settings change, pages kept");
            self.settings = merged;
        }
        self.sink.emit(ReaderEvent::SettingsChanged { settings: merged });
        self.emit_current_page();
        self.persist("settings", |store| store.save_settings(&merged));
        self.persist_position();
        Ok(true)
    }

    /// Re-paginates for a new viewport. Hosts debounce resize bursts before
    /// calling this; a run cannot be cancelled.
    #[instrument(skip(self))]
    pub fn resize(&mut self, viewport: Viewport) -> Result<bool, EngineError> {
        if self.state == ReaderState::Transitioning {
            return Ok(false);
        }
        let Some(book) = self.book.clone() else {
            self.viewport = viewport;
            return Ok(true);
        };
        self.reflow(&book, self.settings, viewport)?;
        self.emit_current_page();
        self.persist_position();
        Ok(true)
    }

    fn reflow(
        &mut self,
        book: &Book,
        settings: Settings,
        viewport: Viewport,
    ) -> Result<(), EngineError> {
        let old_total = book.total_pages();
        let fraction = progress_fraction(self.navigation.current_page_index, old_total);
        let reflowed = match book.reflow(&settings, viewport, self.config.reading_speed_wpm) {
            Ok(reflowed) => reflowed,
            Err(err) => return Err(self.fail(err)),
        };

        let new_total = reflowed.total_pages();
        let index = restore_page_index(fraction, new_total);
        for bookmark in &mut self.bookmarks {
            let fraction = progress_fraction(bookmark.page_number.saturating_sub(1), old_total);
            bookmark.page_number = restore_page_index(fraction, new_total) + 1;
        }
        self.bookmarks.dedup_by_key(|b| b.page_number);
        debug!(
            old_total,
            new_total,
            fraction,
            index,
            "re-paginated with preserved progress"
        );

        self.navigation = NavigationState {
            current_page_index: index,
            current_chapter_index: reflowed.pages[index].chapter_index,
            is_transitioning: false,
        };
        self.settings = settings;
        self.viewport = viewport;
        self.book = Some(Arc::new(reflowed));
        self.state = ReaderState::Ready;
        self.persist_bookmarks();
        Ok(())
    }

    /// Bookmarks the current page, replacing the label of an existing one.
    pub fn add_bookmark(&mut self, label: impl Into<String>) -> Option<Bookmark> {
        self.book.as_ref()?;
        let page_number = self.navigation.current_page_index + 1;
        let bookmark = Bookmark {
            page_number,
            label: label.into(),
            timestamp: self.clock.now_ms(),
        };
        match self
            .bookmarks
            .iter_mut()
            .find(|b| b.page_number == page_number)
        {
            Some(existing) => *existing = bookmark.clone(),
            None => {
                self.bookmarks.push(bookmark.clone());
                self.bookmarks.sort_by_key(|b| b.page_number);
            }
        }
        self.persist_bookmarks();
        Some(bookmark)
    }

    pub fn remove_bookmark(&mut self, page_number: usize) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| b.page_number != page_number);
        let removed = self.bookmarks.len() != before;
        if removed {
            self.persist_bookmarks();
        }
        removed
    }

    pub fn apply(&mut self, command: Command) -> Result<bool, EngineError> {
        if self.book.is_none()
            && !matches!(command, Command::ApplySettings(_) | Command::Resize(_))
        {
            return Err(EngineError::NotInitialized);
        }
        let accepted = match command {
            Command::NextPage => self.next_page(),
            Command::PrevPage => self.previous_page(),
            Command::GotoPage { index } => self.go_to_page(index),
            Command::GotoChapter { index } => self.go_to_chapter(index),
            Command::FirstPage => self.go_to_first(),
            Command::LastPage => self.go_to_last(),
            Command::ApplySettings(patch) => self.apply_settings(patch)?,
            Command::Resize(viewport) => self.resize(viewport)?,
            Command::AddBookmark { label } => self.add_bookmark(label).is_some(),
            Command::RemoveBookmark { page_number } => self.remove_bookmark(page_number),
            Command::FinishTransition => self.finish_transition(),
        };
        Ok(accepted)
    }

    fn fail(&mut self, err: PipelineError) -> EngineError {
        error!(error = %err, "pipeline failed");
        self.state = ReaderState::Error;
        self.navigation.is_transitioning = false;
        self.sink.emit(ReaderEvent::CriticalError {
            message: err.to_string(),
        });
        EngineError::Pipeline(err)
    }

    fn emit_current_page(&self) {
        if let Some(book) = &self.book {
            self.emit_page_changed(book);
        }
    }

    fn emit_page_changed(&self, book: &Book) {
        self.sink.emit(ReaderEvent::PageChanged {
            current_page: self.navigation.current_page_index + 1,
            total_pages: book.total_pages(),
            chapter_title: book
                .chapter_title(self.navigation.current_chapter_index)
                .unwrap_or_default()
                .to_string(),
        });
    }

    fn persist_position(&self) {
        let page_number = self.navigation.current_page_index + 1;
        self.persist("current page", |store| store.save_current_page(page_number));
    }

    fn persist_bookmarks(&self) {
        self.persist("bookmarks", |store| store.save_bookmarks(&self.bookmarks));
    }

    fn persist<F>(&self, what: &str, save: F)
    where
        F: FnOnce(&ReadingStore) -> AnyResult<()>,
    {
        if let Some(store) = &self.store {
            if let Err(err) = save(store) {
                warn!(error = %err, "failed to save {}", what);
            }
        }
    }

    fn load_or_warn<T, F>(&self, what: &str, load: F) -> Option<T>
    where
        F: FnOnce(&ReadingStore) -> AnyResult<T>,
    {
        let store = self.store.as_ref()?;
        match load(store) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "failed to load {}", what);
                None
            }
        }
    }
}
