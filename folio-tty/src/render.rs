use std::io::Write;

use anyhow::Result;
use crossterm::{
    cursor, queue,
    style::{Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use folio_core::settings::Theme;
use folio_core::text::split_paragraphs;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{1,2}(\S(?:[^*]*?\S)?)\*{1,2}").expect("valid emphasis pattern"));

/// Terminal size and colors for one draw. Built through [`DrawParams::clamped`]
/// so there is always a text row above the status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    columns: u16,
    rows: u16,
    theme: Theme,
}

impl DrawParams {
    pub fn clamped(columns: u16, rows: u16, theme: Theme) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(2),
            theme,
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    fn status_row(&self) -> u16 {
        self.rows.saturating_sub(1)
    }

    fn text_rows(&self) -> usize {
        usize::from(self.status_row())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLine {
    pub text: String,
    pub heading: bool,
}

impl PageLine {
    fn blank() -> Self {
        Self {
            text: String::new(),
            heading: false,
        }
    }
}

/// What the bottom row shows while reading.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    pub page_number: usize,
    pub total_pages: usize,
    pub chapter_title: String,
    pub progress: f64,
    pub minutes_left: u32,
    pub pending: Option<String>,
}

impl StatusLine {
    pub fn label(&self, columns: usize) -> String {
        let mut label = format!(
            " {}/{} | {} | {:.0}% | {} min left in chapter",
            self.page_number,
            self.total_pages,
            self.chapter_title,
            self.progress * 100.0,
            self.minutes_left
        );
        if let Some(pending) = &self.pending {
            label.push_str(" | ");
            label.push_str(pending);
        }
        truncate(&label, columns)
    }
}

/// Drops the asterisk markup the formatter turns into bold or italics.
pub fn strip_inline_markup(text: &str) -> String {
    EMPHASIS.replace_all(text, "$1").into_owned()
}

/// Word-wraps a page's raw text to `columns`, one blank line between
/// paragraphs. Headings keep their own line.
pub fn layout_page_lines(raw: &str, columns: usize) -> Vec<PageLine> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    for paragraph in split_paragraphs(raw) {
        if !lines.is_empty() {
            lines.push(PageLine::blank());
        }
        let (first, rest) = paragraph.split_once('\n').unwrap_or((paragraph, ""));
        let heading = first
            .trim()
            .strip_prefix("## ")
            .or_else(|| first.trim().strip_prefix("# "));
        let body = match heading {
            Some(title) => {
                wrap_into(&mut lines, &strip_inline_markup(title.trim()), columns, true);
                rest
            }
            None => paragraph,
        };
        if !body.trim().is_empty() {
            wrap_into(&mut lines, &strip_inline_markup(body), columns, false);
        }
    }
    lines
}

fn wrap_into(lines: &mut Vec<PageLine>, text: &str, columns: usize, heading: bool) {
    let mut current = String::new();
    let mut width = 0;
    let mut flush = |current: &mut String, width: &mut usize| {
        if !current.is_empty() {
            lines.push(PageLine {
                text: std::mem::take(current),
                heading,
            });
        }
        *width = 0;
    };
    for word in text.split_whitespace() {
        let word_width = word.width();
        let gap = usize::from(!current.is_empty());
        if width + gap + word_width <= columns {
            if gap == 1 {
                current.push(' ');
            }
            current.push_str(word);
            width += gap + word_width;
            continue;
        }
        flush(&mut current, &mut width);
        if word_width <= columns {
            current.push_str(word);
            width = word_width;
            continue;
        }
        // Words wider than the terminal, including unspaced CJK runs, are
        // cut at the cell limit.
        for ch in word.chars() {
            let ch_width = ch.width().unwrap_or(0);
            if width + ch_width > columns {
                flush(&mut current, &mut width);
            }
            current.push(ch);
            width += ch_width;
        }
    }
    flush(&mut current, &mut width);
}

/// Cuts `text` to at most `columns` terminal cells, ending in an ellipsis
/// when anything was dropped.
fn truncate(text: &str, columns: usize) -> String {
    if text.width() <= columns {
        return text.to_string();
    }
    let budget = columns.saturating_sub(1);
    let mut out = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > budget {
            break;
        }
        out.push(ch);
        width += ch_width;
    }
    if columns > 0 {
        out.push('…');
    }
    out
}

fn theme_colors(theme: Theme) -> (Color, Color) {
    match theme {
        Theme::White => (Color::Black, Color::White),
        Theme::Sepia => (
            Color::Rgb {
                r: 0x5b,
                g: 0x46,
                b: 0x36,
            },
            Color::Rgb {
                r: 0xf4,
                g: 0xec,
                b: 0xd8,
            },
        ),
        Theme::Dark => (Color::Grey, Color::Black),
    }
}

pub struct PageRenderer<W: Write> {
    writer: W,
}

impl<W: Write> PageRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Draws one page plus the status row. Lines that do not fit the
    /// terminal are cut, with an ellipsis on the last visible row.
    pub fn draw_page(&mut self, raw: &str, status: &StatusLine, params: DrawParams) -> Result<()> {
        let columns = usize::from(params.columns);
        let mut lines = layout_page_lines(raw, columns);
        let rows = params.text_rows();
        if lines.len() > rows {
            lines.truncate(rows);
            if let Some(last) = lines.last_mut() {
                last.text = truncate(&format!("{} …", last.text), columns);
            }
        }

        let (fg, bg) = theme_colors(params.theme);
        queue!(
            self.writer,
            SetForegroundColor(fg),
            SetBackgroundColor(bg),
            Clear(ClearType::All)
        )?;
        for (row, line) in lines.iter().enumerate() {
            queue!(self.writer, cursor::MoveTo(0, row as u16))?;
            if line.heading {
                queue!(
                    self.writer,
                    SetAttribute(Attribute::Bold),
                    Print(&line.text),
                    SetAttribute(Attribute::NormalIntensity)
                )?;
            } else {
                queue!(self.writer, Print(&line.text))?;
            }
        }
        queue!(
            self.writer,
            cursor::MoveTo(0, params.status_row()),
            SetAttribute(Attribute::Reverse),
            Print(status.label(columns)),
            SetAttribute(Attribute::Reset)
        )?;
        self.writer.flush()?;
        Ok(())
    }

    /// Draws a selectable list, used for the table of contents and search
    /// results overlays.
    pub fn draw_list(
        &mut self,
        title: &str,
        items: &[String],
        selected: usize,
        params: DrawParams,
    ) -> Result<()> {
        let columns = usize::from(params.columns);
        let visible = params.text_rows().saturating_sub(2).max(1);
        let first = selected.saturating_sub(visible - 1);

        let (fg, bg) = theme_colors(params.theme);
        queue!(
            self.writer,
            SetForegroundColor(fg),
            SetBackgroundColor(bg),
            Clear(ClearType::All),
            cursor::MoveTo(0, 0),
            SetAttribute(Attribute::Bold),
            Print(truncate(title, columns)),
            SetAttribute(Attribute::NormalIntensity)
        )?;
        for (row, (index, item)) in items.iter().enumerate().skip(first).take(visible).enumerate() {
            let marker = if index == selected { "> " } else { "  " };
            queue!(
                self.writer,
                cursor::MoveTo(0, row as u16 + 2),
                Print(truncate(&format!("{}{}", marker, item), columns))
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            SetAttribute(Attribute::Reset),
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_paragraphs_and_keeps_headings_apart() {
        let raw = "# Chapter One\nThe storm came in fast over the hills.\n\nShe ran.";
        let lines = layout_page_lines(raw, 16);
        let texts: Vec<_> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Chapter One",
                "The storm came",
                "in fast over the",
                "hills.",
                "",
                "She ran."
            ]
        );
        assert!(lines[0].heading);
        assert!(!lines[1].heading);
    }

    #[test]
    fn overlong_word_is_cut_at_the_width() {
        let lines = layout_page_lines("a extraordinarily b", 5);
        let texts: Vec<_> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "extra", "ordin", "arily", "b"]);
    }

    #[test]
    fn wide_characters_wrap_by_display_cells() {
        let lines = layout_page_lines("日本語 日本語 日本語", 12);
        let texts: Vec<_> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["日本語", "日本語", "日本語"]);
        for line in layout_page_lines("日本語の文章は空白なしで続きます 日本語", 12) {
            assert!(line.text.width() <= 12, "{:?}", line.text);
        }
    }

    #[test]
    fn truncate_counts_display_cells() {
        let cut = truncate("日本語の本", 7);
        assert_eq!(cut, "日本語…");
        assert!(cut.width() <= 7);
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn draw_params_always_leave_a_status_row() {
        let params = DrawParams::clamped(0, 0, Theme::White);
        assert_eq!((params.columns(), params.rows()), (1, 2));
        assert_eq!(params.text_rows(), 1);
        assert_eq!(params.status_row(), 1);

        let mut renderer = PageRenderer::new(Vec::new());
        renderer
            .draw_page("one two", &StatusLine::default(), params)
            .unwrap();
        renderer.draw_list("Contents", &[], 0, params).unwrap();
    }

    #[test]
    fn strips_emphasis_markers() {
        assert_eq!(
            strip_inline_markup("a **bold** and *quiet* word, 2 * 3"),
            "a bold and quiet word, 2 * 3"
        );
    }

    #[test]
    fn status_label_truncates_to_width() {
        let status = StatusLine {
            page_number: 3,
            total_pages: 12,
            chapter_title: "Chapter 2".into(),
            progress: 2.0 / 11.0,
            minutes_left: 4,
            pending: Some("1".into()),
        };
        assert_eq!(
            status.label(200),
            " 3/12 | Chapter 2 | 18% | 4 min left in chapter | 1"
        );
        let short = status.label(10);
        assert_eq!(short.chars().count(), 10);
        assert!(short.ends_with('…'));
    }

    #[test]
    fn draw_page_writes_text_and_status() {
        let mut renderer = PageRenderer::new(Vec::new());
        let status = StatusLine {
            page_number: 1,
            total_pages: 2,
            chapter_title: "Main Content".into(),
            ..StatusLine::default()
        };
        renderer
            .draw_page(
                "Hello there reader.",
                &status,
                DrawParams::clamped(40, 10, Theme::Dark),
            )
            .unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.starts_with('\u{1b}'));
        assert!(output.contains("Hello there reader."));
        assert!(output.contains("1/2 | Main Content"));
    }

    #[test]
    fn draw_page_cuts_lines_that_do_not_fit() {
        let mut renderer = PageRenderer::new(Vec::new());
        let raw = "one\n\ntwo\n\nthree\n\nfour";
        renderer
            .draw_page(raw, &StatusLine::default(), DrawParams::clamped(20, 4, Theme::White))
            .unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("two …"));
        assert!(!output.contains("four"));
    }

    #[test]
    fn draw_list_marks_selection() {
        let mut renderer = PageRenderer::new(Vec::new());
        let items = vec!["Chapter 1".to_string(), "Chapter 2".to_string()];
        renderer
            .draw_list("Contents", &items, 1, DrawParams::clamped(30, 10, Theme::Sepia))
            .unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("  Chapter 1"));
        assert!(output.contains("> Chapter 2"));
    }
}
