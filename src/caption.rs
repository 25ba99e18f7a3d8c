//! Caption bar rendering.
//!
//! Produces the translucent lower-third bar as an RGBA image, with the
//! caption text block vertically centered and each line horizontally
//! centered. The output is deterministic for a given (text, frame size)
//! pair so rendered fixtures stay stable.

use image::{Rgba, RgbaImage};
use rusttype::{Font, Point, Scale};
use std::path::Path;
use tracing::warn;

const BAR_FILL: Rgba<u8> = Rgba([50, 50, 50, 140]);
const TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];

/// System fonts tried in order; CJK-capable families come first so
/// non-Latin captions render with full glyph coverage where available.
const FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
];

pub fn bar_height(frame_h: u32) -> u32 {
    (frame_h / 6).max(60)
}

pub fn font_size(frame_w: u32, bar_h: u32) -> f32 {
    ((frame_w.min(bar_h) / 16).max(24) * 2) as f32
}

pub fn line_spacing(font_size: f32) -> i32 {
    ((font_size as i32) / 4).max(4)
}

/// Loads the first usable candidate font. `None` means captions render as
/// a bare bar; the caller decides how loudly to warn.
pub fn load_font() -> Option<Font<'static>> {
    for candidate in FONT_CANDIDATES {
        let path = Path::new(candidate);
        if !path.is_file() {
            continue;
        }
        match std::fs::read(path) {
            Ok(bytes) => {
                if let Some(font) = Font::try_from_vec(bytes) {
                    return Some(font);
                }
            }
            Err(err) => warn!("Could not read font {}: {}", candidate, err),
        }
    }
    None
}

/// Renders the caption bar for one segment. An empty `text` (or an
/// unavailable font) yields the bar with no glyphs.
pub fn render_caption_bar(
    text: &str,
    frame_w: u32,
    frame_h: u32,
    font: Option<&Font<'_>>,
) -> RgbaImage {
    let bar_h = bar_height(frame_h);
    let mut img = RgbaImage::from_pixel(frame_w, bar_h, BAR_FILL);

    if text.is_empty() {
        return img;
    }
    let Some(font) = font else {
        return img;
    };

    let size = font_size(frame_w, bar_h);
    let spacing = line_spacing(size);
    let lines: Vec<&str> = text.split('\n').collect();

    let metrics: Vec<LineBox> = lines
        .iter()
        .map(|line| measure_line(font, size, if line.is_empty() { "A" } else { line }))
        .collect();
    let heights: Vec<i32> = metrics.iter().map(|m| m.height).collect();
    let offsets = line_offsets(bar_h as i32, &heights, spacing);

    for ((line, m), y) in lines.iter().zip(&metrics).zip(offsets) {
        if line.is_empty() {
            continue;
        }
        let x = (frame_w as i32 - m.width) / 2;
        draw_line(&mut img, font, size, line, x, y, m);
    }

    img
}

/// Pixel bounding box of one laid-out line.
struct LineBox {
    width: i32,
    height: i32,
    min_x: i32,
    min_y: i32,
}

fn measure_line(font: &Font<'_>, size: f32, line: &str) -> LineBox {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;

    for glyph in font.layout(line, scale, Point { x: 0.0, y: ascent }) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            min_x = min_x.min(bb.min.x);
            min_y = min_y.min(bb.min.y);
            max_x = max_x.max(bb.max.x);
            max_y = max_y.max(bb.max.y);
        }
    }

    if min_x > max_x {
        // Nothing rasterizable (e.g. all-space line); fall back to an em
        // square so stacking stays stable.
        let side = size as i32;
        return LineBox { width: side, height: side, min_x: 0, min_y: 0 };
    }
    LineBox {
        width: max_x - min_x,
        height: max_y - min_y,
        min_x,
        min_y,
    }
}

/// Vertical offsets that center a block of line boxes inside the bar with
/// fixed spacing between them.
fn line_offsets(bar_h: i32, heights: &[i32], spacing: i32) -> Vec<i32> {
    let total: i32 = heights.iter().sum::<i32>() + spacing * (heights.len().saturating_sub(1)) as i32;
    let mut y = (bar_h - total) / 2;
    heights
        .iter()
        .map(|h| {
            let top = y;
            y += h + spacing;
            top
        })
        .collect()
}

fn draw_line(
    img: &mut RgbaImage,
    font: &Font<'_>,
    size: f32,
    line: &str,
    x: i32,
    y: i32,
    m: &LineBox,
) {
    let scale = Scale::uniform(size);
    let ascent = font.v_metrics(scale).ascent;
    let (w, h) = (img.width() as i32, img.height() as i32);

    for glyph in font.layout(line, scale, Point { x: 0.0, y: ascent }) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        let origin_x = x + bb.min.x - m.min_x;
        let origin_y = y + bb.min.y - m.min_y;
        glyph.draw(|gx, gy, coverage| {
            let px = origin_x + gx as i32;
            let py = origin_y + gy as i32;
            if px < 0 || px >= w || py < 0 || py >= h {
                return;
            }
            let alpha = coverage.clamp(0.0, 1.0);
            let pixel = img.get_pixel_mut(px as u32, py as u32);
            for c in 0..4 {
                let src = TEXT_COLOR[c] as f32;
                let dst = pixel[c] as f32;
                pixel[c] = (dst + (src - dst) * alpha).round() as u8;
            }
        });
    }
}
