//! Character stylization of a rendered frame.
//!
//! Each grid cell maps the luminance of the pixels beneath it onto a palette
//! ordered from sparse to dense glyphs.

use crate::render::raster::Frame;
use thiserror::Error;

pub const DEFAULT_CHARSET: &str = " .:-+*=%@#";
pub const DEFAULT_RESOLUTION: f32 = 0.205;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StylizeError {
    #[error("palette must contain at least one character")]
    EmptyPalette,
    #[error("resolution {0} is outside (0, 1]")]
    InvalidResolution(f32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    chars: Vec<char>,
}

impl Palette {
    pub fn new(characters: &str) -> Result<Self, StylizeError> {
        let chars: Vec<char> = characters.chars().filter(|c| *c != '\n' && *c != '\r').collect();
        if chars.is_empty() {
            return Err(StylizeError::EmptyPalette);
        }
        Ok(Self { chars })
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Glyph for a brightness in `[0, 1]`.
    pub fn glyph(&self, brightness: f32, invert: bool) -> char {
        let last = self.chars.len() - 1;
        let brightness = if brightness.is_finite() {
            brightness.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let mut index = (((1.0 - brightness) * last as f32).floor() as usize).min(last);
        if invert {
            index = last - index;
        }
        self.chars[index]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            chars: DEFAULT_CHARSET.chars().collect(),
        }
    }
}

/// Everything that shapes the stylized surface.
#[derive(Debug, Clone, PartialEq)]
pub struct StylizationConfig {
    pub palette: Palette,
    pub resolution: f32,
    pub foreground: [u8; 3],
    pub background: [u8; 3],
    pub invert: bool,
}

impl StylizationConfig {
    pub fn validate(&self) -> Result<(), StylizeError> {
        if self.palette.is_empty() {
            return Err(StylizeError::EmptyPalette);
        }
        if !(self.resolution > 0.0 && self.resolution <= 1.0) {
            return Err(StylizeError::InvalidResolution(self.resolution));
        }
        Ok(())
    }
}

impl Default for StylizationConfig {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            resolution: DEFAULT_RESOLUTION,
            foreground: [255, 255, 255],
            background: [0, 0, 0],
            invert: true,
        }
    }
}

/// Character grid produced for a viewport of `width × height` pixels.
pub fn grid_dimensions(width: u32, height: u32, resolution: f32) -> (u32, u32) {
    let scale = |extent: u32| ((extent as f32 * resolution).floor() as u32).max(1);
    (scale(width), scale(height))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharGrid {
    cols: u32,
    rows: u32,
    cells: Vec<char>,
}

impl CharGrid {
    pub fn blank(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            cells: vec![' '; (cols * rows) as usize],
        }
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn char_at(&self, row: u32, col: u32) -> Option<char> {
        if row < self.rows && col < self.cols {
            Some(self.cells[(row * self.cols + col) as usize])
        } else {
            None
        }
    }

    pub fn row(&self, row: u32) -> impl Iterator<Item = char> + '_ {
        let start = (row.min(self.rows) * self.cols) as usize;
        let end = if row < self.rows { start + self.cols as usize } else { start };
        self.cells[start..end].iter().copied()
    }

    /// Rows joined by `\n`, no trailing newline.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.cells.len() + self.rows as usize);
        for row in 0..self.rows {
            if row > 0 {
                text.push('\n');
            }
            text.extend(self.row(row));
        }
        text
    }
}

/// Perceived brightness of an RGBA pixel; fully transparent pixels count as white.
pub fn brightness(rgba: [f32; 4]) -> f32 {
    if rgba[3] <= 0.0 {
        return 1.0;
    }
    (0.3 * rgba[0] + 0.59 * rgba[1] + 0.11 * rgba[2]) / 255.0
}

/// Maps `frame` onto a `cols × rows` grid, box-averaging the pixels under each cell.
pub fn stylize(frame: &Frame, cols: u32, rows: u32, palette: &Palette, invert: bool) -> CharGrid {
    let cols = cols.max(1);
    let rows = rows.max(1);
    let mut grid = CharGrid::blank(cols, rows);
    let (width, height) = (frame.width(), frame.height());

    for row in 0..rows {
        let (y0, y1) = cell_span(row, rows, height);
        for col in 0..cols {
            let (x0, x1) = cell_span(col, cols, width);
            let mut sum = [0.0f32; 4];
            for y in y0..y1 {
                for x in x0..x1 {
                    let pixel = frame.pixel(x, y);
                    for (acc, channel) in sum.iter_mut().zip(pixel) {
                        *acc += channel as f32;
                    }
                }
            }
            let count = ((x1 - x0) * (y1 - y0)) as f32;
            let average = sum.map(|channel| channel / count);
            grid.cells[(row * cols + col) as usize] = palette.glyph(brightness(average), invert);
        }
    }
    grid
}

// Pixel range covered by one cell; never empty.
fn cell_span(index: u32, cells: u32, pixels: u32) -> (u32, u32) {
    let start = ((index as u64 * pixels as u64) / cells as u64) as u32;
    let end = (((index as u64 + 1) * pixels as u64) / cells as u64) as u32;
    let start = start.min(pixels - 1);
    (start, end.max(start + 1).min(pixels))
}
