//! Result cards: a fixed-layout PNG summarising one stored speed test.
//!
//! Rendering is deterministic. The same record drawn with the same fonts
//! always produces byte-identical PNG output.

pub mod fonts;
pub mod layout;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use std::path::PathBuf;
use thiserror::Error;

use crate::isp::strip_asn;
use crate::models::{IspInfo, TelemetryRecord};

pub use fonts::{blend_pixel, FontFace, FontSet, Typeface};
pub use layout::{compose, Element, TextRun, Weight, CANVAS_HEIGHT, CANVAS_WIDTH};

/// Default bottom-right watermark.
pub const DEFAULT_WATERMARK: &str = "LibreSpeed";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read font {path}: {source}")]
    FontLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse font {0}")]
    FontParse(String),
    #[error("stored ISP info is not valid JSON: {0}")]
    IspInfo(#[from] serde_json::Error),
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

pub struct ResultRenderer {
    fonts: FontSet,
    watermark: String,
}

impl ResultRenderer {
    pub fn new(fonts: FontSet, watermark: impl Into<String>) -> Self {
        Self {
            fonts,
            watermark: watermark.into(),
        }
    }

    /// The ISP line printed above the separator.
    ///
    /// Uses the organization (minus any leading `AS<number>`) and country
    /// from the geolocation lookup. Without a usable lookup it falls back
    /// to the processed string the client was shown, and without any ISP
    /// blob at all to the stored address.
    pub fn footer(&self, record: &TelemetryRecord) -> Result<String, RenderError> {
        if record.isp_info.trim().is_empty() {
            return Ok(record.ip_address.clone());
        }

        let info: IspInfo = serde_json::from_str(&record.isp_info)?;
        let footer = match info.lookup() {
            Some(lookup) if !lookup.organization.trim().is_empty() => {
                format!("{}, {}", strip_asn(&lookup.organization), lookup.country)
            }
            _ if !info.processed_string.is_empty() => info.processed_string,
            _ => record.ip_address.clone(),
        };
        Ok(footer)
    }

    pub fn layout(&self, record: &TelemetryRecord) -> Result<Vec<Element>, RenderError> {
        let footer = self.footer(record)?;
        Ok(compose(&self.fonts, record, &footer, &self.watermark))
    }

    /// Draw `record` and encode it as PNG.
    pub fn render(&self, record: &TelemetryRecord) -> Result<Vec<u8>, RenderError> {
        let elements = self.layout(record)?;

        let mut canvas = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, layout::COLOR_BACKGROUND);
        for element in &elements {
            match element {
                Element::Text(run) => {
                    let face = match run.weight {
                        Weight::Light => &self.fonts.light,
                        Weight::Bold => &self.fonts.bold,
                    };
                    face.draw(&mut canvas, run.x, run.baseline, &run.text, run.size, run.color);
                }
                Element::Rule { y, color } => {
                    for x in 0..CANVAS_WIDTH {
                        canvas.put_pixel(x, *y, *color);
                    }
                }
            }
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            canvas.as_raw(),
            CANVAS_WIDTH,
            CANVAS_HEIGHT,
            ExtendedColorType::Rgba8,
        )?;
        Ok(png)
    }
}
