//! Converts settings and a measured viewport into a page budget.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::settings::Settings;

/// Font pixel size for font levels 1 through 8.
pub const FONT_SIZE_PX: [f32; 8] = [12.0, 14.0, 16.0, 18.0, 20.0, 24.0, 28.0, 32.0];
/// Horizontal and vertical margin, per side, for margin levels 0 through 3.
pub const MARGIN_PX: [f32; 4] = [8.0, 20.0, 40.0, 60.0];

pub const LINE_HEIGHT_FACTOR: f32 = 1.35;
pub const CHAR_WIDTH_FACTOR: f32 = 0.55;
/// Average word length including the trailing space.
pub const CHARS_PER_WORD: f32 = 5.5;

pub const MIN_CHARS_PER_LINE: usize = 30;
pub const MIN_LINES_PER_PAGE: usize = 10;
pub const MIN_WORDS_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let usable = |v: f32| v.is_finite() && v > 0.0;
        if usable(self.width) && usable(self.height) {
            Ok(())
        } else {
            Err(PipelineError::InvalidViewport {
                width: self.width,
                height: self.height,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBudget {
    pub chars_per_line: usize,
    pub lines_per_page: usize,
    pub words_per_page: usize,
    pub font_px: f32,
    pub line_height_px: f32,
    pub margins_px: f32,
}

impl PageBudget {
    /// Budget with explicit capacities, bypassing the viewport derivation.
    pub fn fixed(chars_per_line: usize, lines_per_page: usize, words_per_page: usize) -> Self {
        let font_px = FONT_SIZE_PX[2];
        Self {
            chars_per_line,
            lines_per_page,
            words_per_page,
            font_px,
            line_height_px: font_px * LINE_HEIGHT_FACTOR,
            margins_px: MARGIN_PX[1],
        }
    }

    pub fn words_per_line(&self) -> f32 {
        (self.chars_per_line as f32 / CHARS_PER_WORD).max(1.0)
    }

    /// Lines `words` are expected to occupy at this budget's line width.
    pub fn estimated_lines(&self, words: usize) -> usize {
        (words as f32 / self.words_per_line()).ceil() as usize
    }

    pub fn fits(&self, words: usize) -> bool {
        words <= self.words_per_page && self.estimated_lines(words) <= self.lines_per_page
    }
}

pub fn font_px(level: u8) -> f32 {
    let idx = (level.clamp(1, FONT_SIZE_PX.len() as u8) - 1) as usize;
    FONT_SIZE_PX[idx]
}

pub fn margin_px(level: u8) -> f32 {
    MARGIN_PX[(level as usize).min(MARGIN_PX.len() - 1)]
}

pub fn compute(settings: &Settings, viewport: Viewport) -> Result<PageBudget, PipelineError> {
    viewport.validate()?;
    let font_px = font_px(settings.font_size_level);
    let margins_px = margin_px(settings.margin_level);
    let line_height_px = font_px * LINE_HEIGHT_FACTOR;
    let char_width_px = font_px * CHAR_WIDTH_FACTOR;

    let effective_width = (viewport.width - 2.0 * margins_px).max(0.0);
    let effective_height = (viewport.height - 2.0 * margins_px).max(0.0);

    let chars_per_line =
        ((effective_width / char_width_px).floor() as usize).max(MIN_CHARS_PER_LINE);
    let lines_per_page =
        ((effective_height / line_height_px).floor() as usize).max(MIN_LINES_PER_PAGE);
    let words_per_page = (((chars_per_line * lines_per_page) as f32 / CHARS_PER_WORD).floor()
        as usize)
        .max(MIN_WORDS_PER_PAGE);

    Ok(PageBudget {
        chars_per_line,
        lines_per_page,
        words_per_page,
        font_px,
        line_height_px,
        margins_px,
    })
}
