use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::terminal;
use directories::ProjectDirs;
use folio_core::settings::saturate_level;
use folio_core::{
    book_id_for_content, Book, Clock, Command, DeviceProfile, EngineConfig, FileStore,
    KeyValueStore, Reader, ReaderState, SearchHit, SettingsPatch, SystemClock, Theme,
};
use folio_tty::{
    terminal_viewport, DrawParams, EventMapper, InputMode, PageRenderer, ResizeDebouncer,
    StatusLine, UiEvent,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Paginated reader for plain and lightly marked-up text")]
struct Args {
    /// Text file to open
    file: PathBuf,

    /// Engine configuration (TOML); defaults to the platform config dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for logs and reading state; defaults to the platform data dir
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Font size level, 1 to 8; other values are clamped
    #[arg(long = "font-size", allow_negative_numbers = true)]
    font_size: Option<i64>,

    /// Margin level, 0 to 3; other values are clamped
    #[arg(long, allow_negative_numbers = true)]
    margin: Option<i64>,

    /// white, sepia or dark
    #[arg(long)]
    theme: Option<String>,

    /// basic, paperwhite, oasis or scribe
    #[arg(long)]
    device: Option<String>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Print title, author and size statistics
    Info,
    /// Print the table of contents with page numbers
    Toc,
    /// Print one page (1-based)
    Page {
        number: usize,
        /// Print the formatted markup instead of the raw text
        #[arg(long)]
        html: bool,
    },
    /// List the pages matching a query
    Search { query: String },
    /// Read interactively in the terminal
    Read,
}

impl Args {
    fn settings_patch(&self) -> SettingsPatch {
        SettingsPatch {
            font_size_level: self.font_size.map(saturate_level),
            margin_level: self.margin.map(saturate_level),
            theme: self.theme.as_deref().map(Theme::from_name_lossy),
            device_profile: self.device.as_deref().map(DeviceProfile::from_name_lossy),
            ..SettingsPatch::default()
        }
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => project_dirs()?.data_local_dir().to_path_buf(),
    };
    let interactive = matches!(args.command, Mode::Read);
    let _log_guard = init_logging(&data_dir.join("logs"), !interactive)?;

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => project_dirs()?.config_dir().join("config.toml"),
    };
    let config = EngineConfig::load(&config_path)?;
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {:?}", args.file))?;

    let settings = config.settings.merged(&args.settings_patch());
    let viewport = settings.device_profile.viewport(&config.chrome);
    let book = || {
        Book::build(&content, &settings, viewport, config.reading_speed_wpm)
            .with_context(|| format!("failed to paginate {:?}", args.file))
    };
    match &args.command {
        Mode::Info => print_info(&mut io::stdout().lock(), &book()?),
        Mode::Toc => print_toc(&mut io::stdout().lock(), &book()?),
        Mode::Page { number, html } => print_page(&mut io::stdout().lock(), &book()?, *number, *html),
        Mode::Search { query } => print_hits(&mut io::stdout().lock(), &book()?.search(query)),
        Mode::Read => run_interactive(&args, config.clone(), &content, &data_dir),
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("net", "folio", "folio")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))
}

fn print_info(out: &mut impl Write, book: &Book) -> Result<()> {
    writeln!(out, "Title: {}", book.title)?;
    writeln!(out, "Author: {}", book.author)?;
    writeln!(out, "Words: {}", book.total_words)?;
    writeln!(out, "Characters: {}", book.total_chars)?;
    writeln!(out, "Reading time: {} min", book.reading_time_minutes)?;
    writeln!(out, "Chapters: {}", book.total_chapters())?;
    writeln!(out, "Pages: {}", book.total_pages())?;
    Ok(())
}

fn print_toc(out: &mut impl Write, book: &Book) -> Result<()> {
    for entry in &book.toc {
        let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
        let page = entry
            .page_number
            .map_or_else(|| "-".to_string(), |page| page.to_string());
        writeln!(out, "{:>5}  {}{}", page, indent, entry.title)?;
    }
    Ok(())
}

fn print_page(out: &mut impl Write, book: &Book, number: usize, html: bool) -> Result<()> {
    let Some(page) = book.page(number) else {
        bail!(
            "page {} is out of range (book has {} pages)",
            number,
            book.total_pages()
        );
    };
    let body = if html {
        &page.formatted_content
    } else {
        &page.raw_content
    };
    writeln!(out, "{}", body)?;
    Ok(())
}

fn print_hits(out: &mut impl Write, hits: &[SearchHit]) -> Result<()> {
    if hits.is_empty() {
        writeln!(out, "no matches")?;
    }
    for hit in hits {
        writeln!(out, "{:>5}  {}", hit.page_number, hit.context)?;
    }
    Ok(())
}

fn run_interactive(args: &Args, config: EngineConfig, content: &str, data_dir: &Path) -> Result<()> {
    let state_path = data_dir
        .join("state")
        .join(format!("{}.json", book_id_for_content(content)));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(state_path)?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let debounce_ms = config.resize_debounce_ms;
    let settings = config.settings;

    let (columns, rows) = terminal::size()?;
    let mut reader = Reader::new(config)
        .with_store(store)
        .with_clock(Arc::clone(&clock));
    reader.init(content, settings, terminal_viewport(columns, rows))?;
    let patch = args.settings_patch();
    if !patch.is_empty() {
        reader.apply_settings(patch)?;
    }
    info!(file = ?args.file, pages = reader.total_pages(), "reading session started");

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut app = App {
        reader,
        mapper: EventMapper::new(),
        renderer: PageRenderer::new(stdout),
        overlay: Overlay::None,
        search: None,
        size: (columns, rows),
        debouncer: ResizeDebouncer::new(debounce_ms),
        clock,
    };

    let mut dirty = true;
    loop {
        if dirty {
            app.redraw()?;
            dirty = false;
        }
        if app.reader.state() == ReaderState::Transitioning {
            app.reader.finish_transition();
        }
        if let Some(viewport) = app.debouncer.poll(app.clock.now_ms()) {
            app.reader.resize(viewport)?;
            dirty = true;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Resize(columns, rows) => {
                    app.size = (columns, rows);
                    app.debouncer
                        .note(terminal_viewport(columns, rows), app.clock.now_ms());
                    dirty = true;
                }
                ev => {
                    let ui_event = app.mapper.map_event(ev);
                    match app.handle_event(ui_event)? {
                        LoopAction::ContinueRedraw => dirty = true,
                        LoopAction::Continue => {}
                        LoopAction::Quit => break,
                    }
                }
            }
        }
    }

    app.renderer.clear_all()?;
    Ok(())
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

enum Overlay {
    None,
    Toc { selected: usize },
}

/// Hits of the last submitted query and the one last jumped to.
struct SearchCursor {
    query: String,
    hits: Vec<SearchHit>,
    position: usize,
}

impl SearchCursor {
    /// Starts at the first hit on or after `current_page`, wrapping to the
    /// first hit of the book.
    fn new(query: String, hits: Vec<SearchHit>, current_page: usize) -> Self {
        let position = hits
            .iter()
            .position(|hit| hit.page_number >= current_page)
            .unwrap_or(0);
        Self {
            query,
            hits,
            position,
        }
    }

    fn current(&self) -> Option<&SearchHit> {
        self.hits.get(self.position)
    }

    fn step(&mut self, forward: bool) -> Option<&SearchHit> {
        if self.hits.is_empty() {
            return None;
        }
        let len = self.hits.len();
        self.position = if forward {
            (self.position + 1) % len
        } else {
            (self.position + len - 1) % len
        };
        self.current()
    }
}

struct App {
    reader: Reader,
    mapper: EventMapper,
    renderer: PageRenderer<io::Stdout>,
    overlay: Overlay,
    search: Option<SearchCursor>,
    size: (u16, u16),
    debouncer: ResizeDebouncer,
    clock: Arc<dyn Clock>,
}

impl App {
    fn params(&self) -> DrawParams {
        DrawParams::clamped(self.size.0, self.size.1, self.reader.settings().theme)
    }

    fn redraw(&mut self) -> Result<()> {
        let params = self.params();
        if let Overlay::Toc { selected } = self.overlay {
            let items: Vec<String> = self
                .reader
                .toc()
                .iter()
                .map(|entry| {
                    format!(
                        "{}{}  {}",
                        "  ".repeat(usize::from(entry.level.saturating_sub(1))),
                        entry.title,
                        entry.page_number.unwrap_or_default()
                    )
                })
                .collect();
            return self
                .renderer
                .draw_list("Contents", &items, selected, params);
        }

        let Some(page) = self.reader.current_page() else {
            return Ok(());
        };
        let chapter_title = self
            .reader
            .book()
            .and_then(|book| book.chapter_title(page.chapter_index))
            .unwrap_or_default()
            .to_string();
        let mut pending = self.mapper.pending_input();
        if pending.is_none() {
            pending = self.search.as_ref().map(|cursor| {
                format!(
                    "\"{}\" {}/{}",
                    cursor.query,
                    if cursor.hits.is_empty() { 0 } else { cursor.position + 1 },
                    cursor.hits.len()
                )
            });
        }
        let status = StatusLine {
            page_number: page.page_number,
            total_pages: self.reader.total_pages(),
            chapter_title,
            progress: self.reader.progress(),
            minutes_left: self.reader.minutes_left_in_chapter(),
            pending,
        };
        let raw = page.raw_content.clone();
        self.renderer.draw_page(&raw, &status, params)
    }

    fn handle_event(&mut self, event: UiEvent) -> Result<LoopAction> {
        if let Some(patch) = event.settings_patch(&self.reader.settings()) {
            self.reader.apply_settings(patch)?;
            return Ok(LoopAction::ContinueRedraw);
        }
        match event {
            UiEvent::Command(Command::AddBookmark { .. }) => {
                self.toggle_bookmark();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Command(command) => {
                self.reader.apply(command)?;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Repeat { command, count } => {
                for _ in 0..count {
                    if self.reader.state() == ReaderState::Transitioning {
                        self.reader.finish_transition();
                    }
                    if !self.reader.apply(command.clone())? {
                        break;
                    }
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::OpenTableOfContents => {
                let current = self.reader.navigation().current_chapter_index;
                self.overlay = Overlay::Toc {
                    selected: current.min(self.reader.toc().len().saturating_sub(1)),
                };
                self.mapper.set_mode(InputMode::Toc);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::CloseOverlay => {
                self.close_overlay();
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::TocMoveSelection { delta } => {
                if let Overlay::Toc { selected } = &mut self.overlay {
                    let last = self.reader.toc().len().saturating_sub(1);
                    *selected = selected.saturating_add_signed(delta).min(last);
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::TocActivateSelection => {
                if let Overlay::Toc { selected } = self.overlay {
                    self.close_overlay();
                    self.reader.go_to_chapter(selected);
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::BeginSearch | UiEvent::SearchQueryChanged { .. } => {
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::SearchSubmit { query } => {
                if query.trim().is_empty() {
                    self.search = None;
                    return Ok(LoopAction::ContinueRedraw);
                }
                let hits = self.reader.search(&query);
                let current = self
                    .reader
                    .current_page()
                    .map_or(1, |page| page.page_number);
                let cursor = SearchCursor::new(query, hits, current);
                if let Some(hit) = cursor.current() {
                    self.reader.go_to_page(hit.page_number - 1);
                }
                self.search = Some(cursor);
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::SearchCancel => {
                self.search = None;
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::SearchNext | UiEvent::SearchPrev => {
                let forward = matches!(event, UiEvent::SearchNext);
                let target = self
                    .search
                    .as_mut()
                    .and_then(|cursor| cursor.step(forward))
                    .map(|hit| hit.page_number);
                if let Some(page_number) = target {
                    self.reader.go_to_page(page_number - 1);
                }
                Ok(LoopAction::ContinueRedraw)
            }
            UiEvent::Quit => Ok(LoopAction::Quit),
            UiEvent::AdjustFontSize { .. }
            | UiEvent::CycleMargin
            | UiEvent::CycleTheme
            | UiEvent::None => Ok(LoopAction::Continue),
        }
    }

    fn close_overlay(&mut self) {
        self.overlay = Overlay::None;
        self.mapper.set_mode(InputMode::Normal);
    }

    fn toggle_bookmark(&mut self) {
        let Some(page) = self.reader.current_page() else {
            return;
        };
        let (page_number, chapter_index) = (page.page_number, page.chapter_index);
        if self
            .reader
            .bookmarks()
            .iter()
            .any(|bookmark| bookmark.page_number == page_number)
        {
            self.reader.remove_bookmark(page_number);
            return;
        }
        let label = self
            .reader
            .book()
            .and_then(|book| book.chapter_title(chapter_index))
            .unwrap_or_default()
            .to_string();
        if self.reader.add_bookmark(label).is_none() {
            warn!(page_number, "bookmark not added");
        }
    }
}

fn init_logging(log_dir: &Path, console: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory at {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::never(log_dir, "folio.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    // Raw-mode sessions own the terminal, so they only log to the file.
    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_filter(EnvFilter::new("warn"))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(page_number: usize) -> SearchHit {
        SearchHit {
            page_number,
            context: String::new(),
        }
    }

    #[test]
    fn search_cursor_starts_at_or_after_current_page() {
        let cursor = SearchCursor::new("storm".into(), vec![hit(2), hit(5), hit(9)], 4);
        assert_eq!(cursor.current().map(|h| h.page_number), Some(5));

        let wrapped = SearchCursor::new("storm".into(), vec![hit(2), hit(5)], 7);
        assert_eq!(wrapped.current().map(|h| h.page_number), Some(2));
    }

    #[test]
    fn search_cursor_steps_wrap_around() {
        let mut cursor = SearchCursor::new("storm".into(), vec![hit(2), hit(5)], 1);
        assert_eq!(cursor.step(true).map(|h| h.page_number), Some(5));
        assert_eq!(cursor.step(true).map(|h| h.page_number), Some(2));
        assert_eq!(cursor.step(false).map(|h| h.page_number), Some(5));

        let mut empty = SearchCursor::new("none".into(), Vec::new(), 1);
        assert!(empty.step(true).is_none());
    }

    #[test]
    fn flags_become_a_settings_patch() {
        let args = Args::parse_from([
            "folio",
            "book.txt",
            "--font-size",
            "5",
            "--theme",
            "sepia",
            "info",
        ]);
        let patch = args.settings_patch();
        assert_eq!(patch.font_size_level, Some(5));
        assert_eq!(patch.theme, Some(Theme::Sepia));
        assert_eq!(patch.margin_level, None);
        assert!(Args::parse_from(["folio", "book.txt", "toc"])
            .settings_patch()
            .is_empty());
    }

    #[test]
    fn out_of_range_flags_are_clamped() {
        let args = Args::parse_from([
            "folio",
            "book.txt",
            "--font-size",
            "300",
            "--margin",
            "-1",
            "--theme",
            "neon",
            "info",
        ]);
        let settings = folio_core::Settings::default().merged(&args.settings_patch());
        assert_eq!(settings.font_size_level, 8);
        assert_eq!(settings.margin_level, 0);
        assert_eq!(settings.theme, Theme::White);
    }
}
