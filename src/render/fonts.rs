//! Typefaces used to draw result cards.
//!
//! Fonts are parsed once at startup and shared read-only between renders.

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;

use super::RenderError;

/// Something that can measure and draw a line of text.
///
/// Sizes are in points at 72 DPI, so one point is one pixel.
pub trait Typeface: Send + Sync {
    /// Advance width of `text`, rounded to whole pixels.
    fn measure(&self, text: &str, size: f32) -> i32;

    /// Draw `text` with the left end of its baseline at `(x, baseline)`.
    fn draw(
        &self,
        canvas: &mut RgbaImage,
        x: i32,
        baseline: i32,
        text: &str,
        size: f32,
        color: Rgba<u8>,
    );
}

/// A TrueType/OpenType face backed by `ab_glyph`.
pub struct FontFace {
    font: FontVec,
}

impl FontFace {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| RenderError::FontLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes).map_err(|_| RenderError::FontParse(path.display().to_string()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| RenderError::FontParse("<memory>".to_string()))?;
        Ok(Self { font })
    }

    /// `ab_glyph` scales by line height; convert an em size to that.
    fn scale(&self, size: f32) -> PxScale {
        let units_per_em = self.font.units_per_em().unwrap_or(1000.0);
        PxScale::from(size * self.font.height_unscaled() / units_per_em)
    }
}

impl Typeface for FontFace {
    fn measure(&self, text: &str, size: f32) -> i32 {
        let font = self.font.as_scaled(self.scale(size));
        let mut width = 0.0;
        let mut previous = None;
        for c in text.chars() {
            let id = font.glyph_id(c);
            if let Some(previous) = previous {
                width += font.kern(previous, id);
            }
            width += font.h_advance(id);
            previous = Some(id);
        }
        width.round() as i32
    }

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        x: i32,
        baseline: i32,
        text: &str,
        size: f32,
        color: Rgba<u8>,
    ) {
        let font = self.font.as_scaled(self.scale(size));
        let mut caret = x as f32;
        let mut previous = None;
        for c in text.chars() {
            let id = font.glyph_id(c);
            if let Some(previous) = previous {
                caret += font.kern(previous, id);
            }
            let glyph = id.with_scale_and_position(font.scale(), point(caret, baseline as f32));
            caret += font.h_advance(id);
            previous = Some(id);

            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    blend_pixel(
                        canvas,
                        bounds.min.x as i32 + gx as i32,
                        bounds.min.y as i32 + gy as i32,
                        color,
                        coverage,
                    );
                });
            }
        }
    }
}

/// Mix `color` into the pixel at `(x, y)` by `coverage`; off-canvas writes
/// are dropped.
pub fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for channel in 0..3 {
        let under = f32::from(pixel[channel]);
        let over = f32::from(color[channel]);
        pixel[channel] = (under + (over - under) * coverage).round() as u8;
    }
    pixel[3] = 255;
}

/// The two weights a result card is drawn with.
#[derive(Clone)]
pub struct FontSet {
    /// Values and the watermark.
    pub light: Arc<dyn Typeface>,
    /// Labels, units and the ISP line.
    pub bold: Arc<dyn Typeface>,
}

impl FontSet {
    pub fn new(light: Arc<dyn Typeface>, bold: Arc<dyn Typeface>) -> Self {
        Self { light, bold }
    }

    pub fn load(light: impl AsRef<Path>, bold: impl AsRef<Path>) -> Result<Self, RenderError> {
        Ok(Self {
            light: Arc::new(FontFace::load(light)?),
            bold: Arc::new(FontFace::load(bold)?),
        })
    }
}
