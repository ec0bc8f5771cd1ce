//! A [`Surface`] made of terminal cells, so the map panel is drawn by the same
//! pipeline as the PNG export.

use birdwatch_render::{Layer, Rgba, Surface};
use ratatui::style::Color;

/// Surface units per terminal cell. Cells are roughly twice as tall as wide.
pub const CELL_WIDTH: f32 = 8.0;
pub const CELL_HEIGHT: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphCell {
    pub ch: char,
    pub fg: Option<Rgba>,
    /// Layer that last wrote this cell.
    pub layer: Option<Layer>,
}

impl Default for GlyphCell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            layer: None,
        }
    }
}

pub struct GlyphSurface {
    columns: u16,
    rows: u16,
    cells: Vec<GlyphCell>,
    layer: Option<Layer>,
}

impl GlyphSurface {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns,
            rows,
            cells: vec![GlyphCell::default(); usize::from(columns) * usize::from(rows)],
            layer: None,
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cell(&self, column: u16, row: u16) -> Option<&GlyphCell> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells
            .get(usize::from(row) * usize::from(self.columns) + usize::from(column))
    }

    /// One line of characters per row, for logs and tests.
    pub fn to_lines(&self) -> Vec<String> {
        self.cells
            .chunks(usize::from(self.columns).max(1))
            .map(|row| row.iter().map(|cell| cell.ch).collect())
            .collect()
    }

    fn cell_at(&self, point: (f32, f32)) -> Option<(u16, u16)> {
        if !point.0.is_finite() || !point.1.is_finite() || point.0 < 0.0 || point.1 < 0.0 {
            return None;
        }
        let column = (point.0 / CELL_WIDTH).floor();
        let row = (point.1 / CELL_HEIGHT).floor();
        if column >= f32::from(self.columns) || row >= f32::from(self.rows) {
            return None;
        }
        Some((column as u16, row as u16))
    }

    fn put(&mut self, column: u16, row: u16, ch: char, color: Rgba) {
        if column >= self.columns || row >= self.rows {
            return;
        }
        let index = usize::from(row) * usize::from(self.columns) + usize::from(column);
        self.cells[index] = GlyphCell {
            ch,
            fg: Some(color),
            layer: self.layer,
        };
    }

    /// Cells whose centre lies within `radius` of `center`, in surface units.
    fn cells_within(&self, center: (f32, f32), radius: f32) -> Vec<(u16, u16)> {
        let mut hits = Vec::new();
        if !center.0.is_finite() || !center.1.is_finite() {
            return hits;
        }
        let min_col = ((center.0 - radius) / CELL_WIDTH).floor().max(0.0) as u16;
        let max_col = ((center.0 + radius) / CELL_WIDTH)
            .floor()
            .min(f32::from(self.columns) - 1.0);
        let min_row = ((center.1 - radius) / CELL_HEIGHT).floor().max(0.0) as u16;
        let max_row = ((center.1 + radius) / CELL_HEIGHT)
            .floor()
            .min(f32::from(self.rows) - 1.0);
        if max_col < 0.0 || max_row < 0.0 {
            return hits;
        }
        for row in min_row..=max_row as u16 {
            for column in min_col..=max_col as u16 {
                let dx = (f32::from(column) + 0.5) * CELL_WIDTH - center.0;
                let dy = (f32::from(row) + 0.5) * CELL_HEIGHT - center.1;
                if (dx * dx + dy * dy).sqrt() <= radius {
                    hits.push((column, row));
                }
            }
        }
        hits
    }

    fn fill_glyph(&self) -> char {
        match self.layer {
            Some(Layer::Obstacles) => '▓',
            Some(Layer::Resources) => '+',
            Some(Layer::Birds) => '•',
            Some(Layer::Predators) => '▲',
            Some(Layer::ZoneAnnotations) | None => '●',
        }
    }
}

impl Surface for GlyphSurface {
    fn size(&self) -> (u32, u32) {
        (
            (f32::from(self.columns) * CELL_WIDTH) as u32,
            (f32::from(self.rows) * CELL_HEIGHT) as u32,
        )
    }

    /// Resets to the terminal's own background rather than painting `_color`.
    fn clear(&mut self, _color: Rgba) {
        self.cells.fill(GlyphCell::default());
        self.layer = None;
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba) {
        let ch = self.fill_glyph();
        let covered = if radius >= CELL_WIDTH {
            self.cells_within(center, radius)
        } else {
            Vec::new()
        };
        if covered.is_empty() {
            if let Some((column, row)) = self.cell_at(center) {
                self.put(column, row, ch, color);
            }
            return;
        }
        for (column, row) in covered {
            self.put(column, row, ch, color);
        }
    }

    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, _width: f32, color: Rgba) {
        let Some((column, row)) = self.cell_at(center) else {
            return;
        };
        if radius < CELL_HEIGHT {
            // Outline of a marker this layer just filled: one cell already
            // says everything.
            if self.cell(column, row).and_then(|cell| cell.layer) == self.layer {
                return;
            }
            self.put(column, row, '◌', color);
            return;
        }
        let inner = radius - CELL_WIDTH * 0.5;
        let outer = radius + CELL_WIDTH * 0.5;
        for (column, row) in self.cells_within(center, outer) {
            let dx = (f32::from(column) + 0.5) * CELL_WIDTH - center.0;
            let dy = (f32::from(row) + 0.5) * CELL_HEIGHT - center.1;
            if (dx * dx + dy * dy).sqrt() >= inner {
                self.put(column, row, '○', color);
            }
        }
    }

    fn draw_text(&mut self, anchor: (f32, f32), text: &str, color: Rgba) {
        let Some((column, row)) = self.cell_at(anchor) else {
            return;
        };
        for (offset, ch) in text.chars().enumerate() {
            let Ok(offset) = u16::try_from(offset) else {
                break;
            };
            let Some(column) = column.checked_add(offset) else {
                break;
            };
            if column >= self.columns {
                break;
            }
            self.put(column, row, ch, color);
        }
    }

    fn begin_layer(&mut self, layer: Layer) {
        self.layer = Some(layer);
    }
}

/// Terminal colour for a palette entry. Without true-colour support the
/// nearest basic ANSI colour is used.
pub fn terminal_color(color: Rgba, truecolor: bool) -> Color {
    let [r, g, b, _] = color;
    if truecolor {
        return Color::Rgb(r, g, b);
    }
    const BASIC: [([u8; 3], Color); 8] = [
        ([0, 0, 0], Color::Black),
        ([205, 0, 0], Color::Red),
        ([0, 205, 0], Color::Green),
        ([205, 205, 0], Color::Yellow),
        ([0, 0, 238], Color::Blue),
        ([205, 0, 205], Color::Magenta),
        ([0, 205, 205], Color::Cyan),
        ([229, 229, 229], Color::Gray),
    ];
    let distance = |[br, bg, bb]: [u8; 3]| {
        let dr = i32::from(r) - i32::from(br);
        let dg = i32::from(g) - i32::from(bg);
        let db = i32::from(b) - i32::from(bb);
        dr * dr + dg * dg + db * db
    };
    BASIC
        .iter()
        .min_by_key(|(rgb, _)| distance(*rgb))
        .map(|(_, color)| *color)
        .unwrap_or(Color::Reset)
}
