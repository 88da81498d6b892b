//! Fixed placement of everything drawn on a result card.

use image::Rgba;

use super::fonts::{FontSet, Typeface};
use crate::models::TelemetryRecord;

pub const CANVAS_WIDTH: u32 = 500;
pub const CANVAS_HEIGHT: u32 = 286;

const LEFT_CENTER: i32 = CANVAS_WIDTH as i32 / 4;
const RIGHT_CENTER: i32 = CANVAS_WIDTH as i32 * 3 / 4;

const LABEL_SIZE: f32 = 26.0;
const VALUE_SIZE: f32 = 36.0;
const SMALL_LABEL_SIZE: f32 = 20.0;
const ORG_SIZE: f32 = 16.0;
const WATERMARK_SIZE: f32 = 14.0;

const UPPER_LABEL_BASELINE: i32 = 35;
const UPPER_VALUE_BASELINE: i32 = 80;
const LOWER_LABEL_BASELINE: i32 = 145;
const LOWER_VALUE_BASELINE: i32 = 190;
const UNIT_BASELINE: i32 = 220;
const FOOTER_BASELINE: i32 = 260;
const FOOTER_X: i32 = 6;
pub const SEPARATOR_Y: u32 = 265;
const WATERMARK_BASELINE: i32 = 280;
const WATERMARK_MARGIN: i32 = 5;

pub const COLOR_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const COLOR_LABEL: Rgba<u8> = Rgba([40, 40, 40, 255]);
pub const COLOR_DOWNLOAD: Rgba<u8> = Rgba([96, 96, 170, 255]);
pub const COLOR_UPLOAD: Rgba<u8> = Rgba([96, 96, 96, 255]);
pub const COLOR_PING: Rgba<u8> = Rgba([170, 96, 96, 255]);
pub const COLOR_JITTER: Rgba<u8> = Rgba([170, 96, 96, 255]);
pub const COLOR_MEASURE: Rgba<u8> = Rgba([40, 40, 40, 255]);
pub const COLOR_ISP: Rgba<u8> = Rgba([40, 40, 40, 255]);
pub const COLOR_WATERMARK: Rgba<u8> = Rgba([160, 160, 160, 255]);
pub const COLOR_SEPARATOR: Rgba<u8> = Rgba([192, 192, 192, 255]);

const MS_SUFFIX: &str = " ms";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weight {
    Light,
    Bold,
}

/// One line of text at a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub weight: Weight,
    pub size: f32,
    pub x: i32,
    pub baseline: i32,
    pub color: Rgba<u8>,
}

/// Card elements in paint order.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextRun),
    /// One-pixel horizontal line across the whole canvas.
    Rule { y: u32, color: Rgba<u8> },
}

/// Integer part of a submitted measurement; `"12.3"` becomes `"12"`.
pub fn integer_part(value: &str) -> &str {
    value.split_once('.').map_or(value, |(whole, _)| whole)
}

struct Composer<'a> {
    fonts: &'a FontSet,
    elements: Vec<Element>,
}

impl Composer<'_> {
    fn face(&self, weight: Weight) -> &dyn Typeface {
        match weight {
            Weight::Light => self.fonts.light.as_ref(),
            Weight::Bold => self.fonts.bold.as_ref(),
        }
    }

    fn width(&self, text: &str, weight: Weight, size: f32) -> i32 {
        self.face(weight).measure(text, size)
    }

    fn push(&mut self, text: &str, weight: Weight, size: f32, x: i32, baseline: i32, color: Rgba<u8>) {
        self.elements.push(Element::Text(TextRun {
            text: text.to_string(),
            weight,
            size,
            x,
            baseline,
            color,
        }));
    }

    fn centered(&mut self, text: &str, weight: Weight, size: f32, center: i32, baseline: i32, color: Rgba<u8>) {
        let x = center - self.width(text, weight, size) / 2;
        self.push(text, weight, size, x, baseline, color);
    }

    /// Integer value followed by a smaller `" ms"`, centred as one unit.
    fn latency(&mut self, value: &str, center: i32, color: Rgba<u8>) {
        let value = integer_part(value);
        let value_width = self.width(value, Weight::Light, VALUE_SIZE);
        let suffix_width = self.width(MS_SUFFIX, Weight::Bold, SMALL_LABEL_SIZE);

        let x = center - (value_width + suffix_width) / 2;
        self.push(value, Weight::Light, VALUE_SIZE, x, UPPER_VALUE_BASELINE, color);
        self.push(
            MS_SUFFIX,
            Weight::Bold,
            SMALL_LABEL_SIZE,
            x + value_width,
            UPPER_VALUE_BASELINE,
            COLOR_MEASURE,
        );
    }
}

/// Place every element of a card for `record`.
///
/// `footer` is the already-resolved ISP line.
pub fn compose(fonts: &FontSet, record: &TelemetryRecord, footer: &str, watermark: &str) -> Vec<Element> {
    let mut card = Composer {
        fonts,
        elements: Vec::with_capacity(16),
    };

    card.centered("Ping", Weight::Bold, LABEL_SIZE, LEFT_CENTER, UPPER_LABEL_BASELINE, COLOR_LABEL);
    card.centered("Jitter", Weight::Bold, LABEL_SIZE, RIGHT_CENTER, UPPER_LABEL_BASELINE, COLOR_LABEL);
    card.centered("Download", Weight::Bold, LABEL_SIZE, LEFT_CENTER, LOWER_LABEL_BASELINE, COLOR_LABEL);
    card.centered("Upload", Weight::Bold, LABEL_SIZE, RIGHT_CENTER, LOWER_LABEL_BASELINE, COLOR_LABEL);

    card.centered("Mbps", Weight::Bold, SMALL_LABEL_SIZE, LEFT_CENTER, UNIT_BASELINE, COLOR_MEASURE);
    card.centered("Mbps", Weight::Bold, SMALL_LABEL_SIZE, RIGHT_CENTER, UNIT_BASELINE, COLOR_MEASURE);

    card.latency(&record.ping, LEFT_CENTER, COLOR_PING);
    card.latency(&record.jitter, RIGHT_CENTER, COLOR_JITTER);

    card.centered(&record.download, Weight::Light, VALUE_SIZE, LEFT_CENTER, LOWER_VALUE_BASELINE, COLOR_DOWNLOAD);
    card.centered(&record.upload, Weight::Light, VALUE_SIZE, RIGHT_CENTER, LOWER_VALUE_BASELINE, COLOR_UPLOAD);

    card.push(footer, Weight::Bold, ORG_SIZE, FOOTER_X, FOOTER_BASELINE, COLOR_ISP);

    card.elements.push(Element::Rule {
        y: SEPARATOR_Y,
        color: COLOR_SEPARATOR,
    });

    let watermark_x =
        CANVAS_WIDTH as i32 - card.width(watermark, Weight::Light, WATERMARK_SIZE) - WATERMARK_MARGIN;
    card.push(watermark, Weight::Light, WATERMARK_SIZE, watermark_x, WATERMARK_BASELINE, COLOR_WATERMARK);

    card.elements
}
