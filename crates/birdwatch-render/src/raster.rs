use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgba as ImgRgba, RgbaImage};

use crate::RenderError;
use crate::style::Rgba;
use crate::surface::Surface;

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;
const GLYPH_SCALE: i32 = 2;

/// CPU rasterizer backed by an RGBA image buffer.
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::new(width.max(1), height.max(1)),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.image.width() || y >= self.image.height() {
            return None;
        }
        Some(self.image.get_pixel(x, y).0)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn put(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.image.width() as i32 || y >= self.image.height() as i32 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, ImgRgba(color));
    }

    /// Visit every pixel whose centre lies within `outer` of `center` and at
    /// least `inner` away from it.
    fn for_each_in_band(
        &mut self,
        center: (f32, f32),
        inner: f32,
        outer: f32,
        color: Rgba,
    ) {
        if !center.0.is_finite() || !center.1.is_finite() || outer.is_nan() || outer <= 0.0 {
            return;
        }
        let (width, height) = self.image.dimensions();
        let min_x = ((center.0 - outer).floor() as i32).max(0);
        let max_x = ((center.0 + outer).ceil() as i32).min(width as i32 - 1);
        let min_y = ((center.1 - outer).floor() as i32).max(0);
        let max_y = ((center.1 + outer).ceil() as i32).min(height as i32 - 1);
        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 + 0.5 - center.0;
                let dy = py as f32 + 0.5 - center.1;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist <= outer && dist >= inner {
                    self.put(px, py, color);
                }
            }
        }
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self, color: Rgba) {
        for pixel in self.image.pixels_mut() {
            *pixel = ImgRgba(color);
        }
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba) {
        self.for_each_in_band(center, 0.0, radius, color);
    }

    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, width: f32, color: Rgba) {
        let half = (width * 0.5).max(0.5);
        self.for_each_in_band(center, (radius - half).max(0.0), radius + half, color);
    }

    fn draw_text(&mut self, anchor: (f32, f32), text: &str, color: Rgba) {
        let mut cursor_x = anchor.0.round() as i32;
        let origin_y = anchor.1.round() as i32;
        for ch in text.chars() {
            if let Some(rows) = glyph(ch) {
                for (row, bits) in rows.iter().enumerate() {
                    for col in 0..GLYPH_WIDTH {
                        if bits & (0b100 >> col) == 0 {
                            continue;
                        }
                        for sy in 0..GLYPH_SCALE {
                            for sx in 0..GLYPH_SCALE {
                                self.put(
                                    cursor_x + col * GLYPH_SCALE + sx,
                                    origin_y + row as i32 * GLYPH_SCALE + sy,
                                    color,
                                );
                            }
                        }
                    }
                }
            }
            cursor_x += (GLYPH_WIDTH + 1) * GLYPH_SCALE;
        }
    }
}

/// 3x5 bitmaps for the characters temperature labels use.
fn glyph(ch: char) -> Option<[u8; GLYPH_HEIGHT as usize]> {
    let rows = match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        _ => return None,
    };
    Some(rows)
}
