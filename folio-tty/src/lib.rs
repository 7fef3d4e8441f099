mod debounce;
mod render;

pub use debounce::ResizeDebouncer;
pub use render::{
    layout_page_lines, strip_inline_markup, DrawParams, PageLine, PageRenderer, StatusLine,
};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use folio_core::layout::Viewport;
use folio_core::settings::{Settings, SettingsPatch, FONT_SIZE_LEVELS, MARGIN_LEVELS};
use folio_core::Command;

/// Nominal pixel size of one terminal cell, used to express a terminal
/// window as a reader viewport.
pub const CELL_WIDTH_PX: f32 = 8.0;
pub const CELL_HEIGHT_PX: f32 = 16.0;

/// Viewport for a terminal of `columns` by `rows`, keeping one row for the
/// status line.
pub fn terminal_viewport(columns: u16, rows: u16) -> Viewport {
    Viewport::new(
        f32::from(columns.max(1)) * CELL_WIDTH_PX,
        f32::from(rows.saturating_sub(1).max(1)) * CELL_HEIGHT_PX,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Command(Command),
    Repeat { command: Command, count: usize },
    AdjustFontSize { delta: i8 },
    CycleMargin,
    CycleTheme,
    OpenTableOfContents,
    CloseOverlay,
    TocMoveSelection { delta: isize },
    TocActivateSelection,
    BeginSearch,
    SearchQueryChanged { query: String },
    SearchSubmit { query: String },
    SearchCancel,
    SearchNext,
    SearchPrev,
    Quit,
    None,
}

impl UiEvent {
    /// Settings change requested by this event, relative to `current`.
    pub fn settings_patch(&self, current: &Settings) -> Option<SettingsPatch> {
        match self {
            UiEvent::AdjustFontSize { delta } => {
                let level = current
                    .font_size_level
                    .saturating_add_signed(*delta)
                    .clamp(FONT_SIZE_LEVELS.0, FONT_SIZE_LEVELS.1);
                (level != current.font_size_level).then(|| SettingsPatch::font_size(level))
            }
            UiEvent::CycleMargin => {
                let next = if current.margin_level >= MARGIN_LEVELS.1 {
                    MARGIN_LEVELS.0
                } else {
                    current.margin_level + 1
                };
                Some(SettingsPatch::margin(next))
            }
            UiEvent::CycleTheme => Some(SettingsPatch::theme(current.theme.next())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Toc,
    Search,
}

/// Digits typed ahead of a command, as in `12j` or `40G`.
#[derive(Debug, Default)]
struct CountPrefix {
    digits: String,
}

impl CountPrefix {
    /// Longer prefixes are ignored rather than overflowing a page count.
    const MAX_DIGITS: usize = 6;

    fn push(&mut self, digit: char) {
        let leading_zero = digit == '0' && self.digits.is_empty();
        if !leading_zero && self.digits.len() < Self::MAX_DIGITS {
            self.digits.push(digit);
        }
    }

    /// Returns the typed number, if any, and clears it.
    fn take(&mut self) -> Option<usize> {
        let value = self.digits.parse().ok();
        self.digits.clear();
        value
    }

    fn clear(&mut self) {
        self.digits.clear();
    }

    fn pending(&self) -> Option<&str> {
        (!self.digits.is_empty()).then_some(self.digits.as_str())
    }
}

#[derive(Debug, Default)]
pub struct EventMapper {
    prefix: CountPrefix,
    mode: InputMode,
    query: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.prefix.clear();
            self.query.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Toc => self.map_event_toc(event),
            InputMode::Search => self.map_event_search(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                self.prefix.push(c);
                UiEvent::None
            }
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Char('l'), KeyModifiers::NONE)
            | (KeyCode::Char(' '), _)
            | (KeyCode::Down, _)
            | (KeyCode::Right, _)
            | (KeyCode::PageDown, _) => self.repeated(Command::NextPage),
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Char('h'), KeyModifiers::NONE)
            | (KeyCode::Up, _)
            | (KeyCode::Left, _)
            | (KeyCode::PageUp, _) => self.repeated(Command::PrevPage),
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                self.goto_or(Command::FirstPage)
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => self.goto_or(Command::LastPage),
            (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => {
                self.prefix.clear();
                UiEvent::AdjustFontSize { delta: 1 }
            }
            (KeyCode::Char('-'), _) => {
                self.prefix.clear();
                UiEvent::AdjustFontSize { delta: -1 }
            }
            (KeyCode::Char('m'), KeyModifiers::NONE) => {
                self.prefix.clear();
                UiEvent::CycleMargin
            }
            (KeyCode::Char('d'), KeyModifiers::NONE) => {
                self.prefix.clear();
                UiEvent::CycleTheme
            }
            (KeyCode::Char('b'), KeyModifiers::NONE) => {
                self.prefix.clear();
                UiEvent::Command(Command::AddBookmark {
                    label: String::new(),
                })
            }
            (KeyCode::Char('c'), KeyModifiers::NONE) | (KeyCode::Char('t'), KeyModifiers::NONE) => {
                self.prefix.clear();
                UiEvent::OpenTableOfContents
            }
            (KeyCode::Char('/'), KeyModifiers::NONE) => {
                self.set_mode(InputMode::Search);
                UiEvent::BeginSearch
            }
            (KeyCode::Char('n'), KeyModifiers::NONE) => {
                self.prefix.clear();
                UiEvent::SearchNext
            }
            (KeyCode::Char('N'), _) => {
                self.prefix.clear();
                UiEvent::SearchPrev
            }
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => {
                self.prefix.clear();
                UiEvent::Quit
            }
            _ => {
                self.prefix.clear();
                UiEvent::None
            }
        }
    }

    fn map_event_toc(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('c'), _) | (KeyCode::Char('t'), _) => {
                UiEvent::CloseOverlay
            }
            (KeyCode::Enter, _) => UiEvent::TocActivateSelection,
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                UiEvent::TocMoveSelection { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                UiEvent::TocMoveSelection { delta: -1 }
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_event_search(&mut self, event: Event) -> UiEvent {
        let Event::Key(key) = event else {
            return UiEvent::None;
        };
        let typed = matches!(key.modifiers, KeyModifiers::NONE | KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Esc => self.leave_search(UiEvent::SearchCancel),
            KeyCode::Enter => {
                let query = std::mem::take(&mut self.query).trim().to_string();
                self.leave_search(UiEvent::SearchSubmit { query })
            }
            // Erasing past the start of the query abandons the search.
            KeyCode::Backspace => match self.query.pop() {
                Some(_) => self.query_changed(),
                None => self.leave_search(UiEvent::SearchCancel),
            },
            KeyCode::Char(c) if typed => {
                self.query.push(c);
                self.query_changed()
            }
            _ => UiEvent::None,
        }
    }

    fn leave_search(&mut self, event: UiEvent) -> UiEvent {
        self.set_mode(InputMode::Normal);
        event
    }

    fn query_changed(&self) -> UiEvent {
        UiEvent::SearchQueryChanged {
            query: self.query.clone(),
        }
    }

    fn repeated(&mut self, command: Command) -> UiEvent {
        match self.prefix.take() {
            Some(count) if count > 1 => UiEvent::Repeat { command, count },
            _ => UiEvent::Command(command),
        }
    }

    /// A numeric prefix turns `g`/`G` into a jump to that page number.
    fn goto_or(&mut self, fallback: Command) -> UiEvent {
        match self.prefix.take() {
            Some(page) => UiEvent::Command(Command::GotoPage { index: page - 1 }),
            None => UiEvent::Command(fallback),
        }
    }

    /// Text the status line echoes back while a command is being typed.
    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Search => Some(format!("/{}", self.query)),
            _ => self.prefix.pending().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use folio_core::settings::Theme;

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn event_mapper_uses_numeric_prefix_for_repeats() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('1'))), UiEvent::None);
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('2'))), UiEvent::None);
        assert_eq!(mapper.pending_input().as_deref(), Some("12"));

        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::Repeat {
                command: Command::NextPage,
                count: 12
            }
        );
        assert!(mapper.pending_input().is_none());
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('k'))),
            UiEvent::Command(Command::PrevPage)
        );
    }

    #[test]
    fn event_mapper_prefix_with_g_jumps_to_page_number() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('4')));
        match mapper.map_event(key_event_with_modifiers(
            KeyCode::Char('G'),
            KeyModifiers::SHIFT,
        )) {
            UiEvent::Command(Command::GotoPage { index }) => assert_eq!(index, 3),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::Command(Command::FirstPage)
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::End)),
            UiEvent::Command(Command::LastPage)
        );
    }

    #[test]
    fn event_mapper_drops_prefix_on_other_command() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('4')));
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('d'))), UiEvent::CycleTheme);
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char(' '))),
            UiEvent::Command(Command::NextPage)
        );
    }

    #[test]
    fn event_mapper_search_mode_collects_query() {
        let mut mapper = EventMapper::new();
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('/'))), UiEvent::BeginSearch);
        assert_eq!(mapper.mode(), InputMode::Search);
        mapper.map_event(key_event(KeyCode::Char('t')));
        mapper.map_event(key_event(KeyCode::Char('x')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Backspace)),
            UiEvent::SearchQueryChanged { query: "t".into() }
        );
        mapper.map_event(key_event_with_modifiers(KeyCode::Char('I'), KeyModifiers::SHIFT));
        assert_eq!(mapper.pending_input().as_deref(), Some("/tI"));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::SearchSubmit { query: "tI".into() }
        );
        assert_eq!(mapper.mode(), InputMode::Normal);
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn event_mapper_prefix_ignores_leading_zero_and_caps_length() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('0')));
        assert!(mapper.pending_input().is_none());
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::Command(Command::NextPage)
        );

        for _ in 0..9 {
            mapper.map_event(key_event(KeyCode::Char('9')));
        }
        assert_eq!(mapper.pending_input().as_deref(), Some("999999"));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::Command(Command::GotoPage { index: 999_998 })
        );
    }

    #[test]
    fn event_mapper_backspace_on_empty_query_cancels_search() {
        let mut mapper = EventMapper::new();
        mapper.map_event(key_event(KeyCode::Char('/')));
        mapper.map_event(key_event(KeyCode::Char('a')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Backspace)),
            UiEvent::SearchQueryChanged { query: String::new() }
        );
        assert_eq!(mapper.map_event(key_event(KeyCode::Backspace)), UiEvent::SearchCancel);
        assert_eq!(mapper.mode(), InputMode::Normal);
        assert_eq!(
            mapper.map_event(key_event_with_modifiers(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            UiEvent::None
        );
    }

    #[test]
    fn event_mapper_toc_mode_maps_navigation_keys() {
        let mut mapper = EventMapper::new();
        mapper.set_mode(InputMode::Toc);
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::TocMoveSelection { delta: 1 }
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Up)),
            UiEvent::TocMoveSelection { delta: -1 }
        );
        assert_eq!(mapper.map_event(key_event(KeyCode::Enter)), UiEvent::TocActivateSelection);
        assert_eq!(mapper.map_event(key_event(KeyCode::Esc)), UiEvent::CloseOverlay);
    }

    #[test]
    fn settings_events_become_patches() {
        let current = Settings::default();
        assert_eq!(
            UiEvent::AdjustFontSize { delta: 1 }.settings_patch(&current),
            Some(SettingsPatch::font_size(current.font_size_level + 1))
        );
        let smallest = Settings {
            font_size_level: 1,
            ..current
        };
        assert_eq!(
            UiEvent::AdjustFontSize { delta: -1 }.settings_patch(&smallest),
            None
        );
        assert_eq!(
            UiEvent::CycleTheme.settings_patch(&current),
            Some(SettingsPatch::theme(Theme::Sepia))
        );
        let widest = Settings {
            margin_level: 3,
            ..current
        };
        assert_eq!(
            UiEvent::CycleMargin.settings_patch(&widest),
            Some(SettingsPatch::margin(0))
        );
        assert_eq!(UiEvent::Quit.settings_patch(&current), None);
    }

    #[test]
    fn terminal_viewport_reserves_status_row() {
        let viewport = terminal_viewport(80, 25);
        assert_eq!(viewport.width, 640.0);
        assert_eq!(viewport.height, 384.0);
    }
}
