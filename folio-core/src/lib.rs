//! Reflowable-text pagination and navigation engine.
//!
//! Raw text flows through analysis, chapter detection, layout, pagination
//! and indexing into an immutable [`Book`], which a [`Reader`] owns and
//! navigates.

pub mod analyzer;
pub mod book;
pub mod chapters;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod layout;
pub mod pagination;
pub mod reader;
pub mod search;
pub mod settings;
pub mod store;
pub mod text;
pub mod toc;

pub use analyzer::{analyze, ContentSummary};
pub use book::{book_id_for_content, Book, BookId};
pub use chapters::{Chapter, ChapterDetector, ChapterHeuristic, HeuristicKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ChromeConfig, EngineConfig};
pub use error::{EngineError, PipelineError};
pub use events::{ChannelSink, EventLog, EventSink, NullSink, ReaderEvent};
pub use layout::{PageBudget, Viewport};
pub use pagination::Page;
pub use reader::{Command, NavigationState, Reader, ReaderState};
pub use search::{Occurrence, SearchHit, SearchIndex};
pub use settings::{DeviceProfile, Settings, SettingsPatch, Theme};
pub use store::{Bookmark, FileStore, KeyValueStore, MemoryStore, ReadingStore};
pub use toc::TocEntry;
