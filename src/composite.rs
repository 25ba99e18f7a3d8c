//! In-process frame compositing for the `composite` fidelity strategy.
//!
//! Placeholder and still-image segments get their full frame composed here
//! (letterboxed visual plus caption bar alpha-blended in) and handed to the
//! engine as a single looped still, instead of routing the compositing
//! through an engine filter graph. Video segments always stay on the engine
//! path since frame decoding is the engine's job.

use crate::plan::AssetKind;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::warn;

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([60, 60, 60, 255]);
const LETTERBOX_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Scales (cw, ch) to fit within (tw, th) preserving aspect ratio.
fn fit_within(cw: u32, ch: u32, tw: u32, th: u32) -> (u32, u32) {
    if cw == 0 || ch == 0 {
        return (tw, th);
    }
    let scale = (tw as f64 / cw as f64).min(th as f64 / ch as f64);
    let w = ((cw as f64 * scale).round() as u32).max(1);
    let h = ((ch as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Composes one full output frame: background visual scaled and letterboxed
/// to the target size, caption bar blended at the lower third.
///
/// An unreadable image degrades to the placeholder fill with a warning,
/// mirroring how the engine path treats a failing asset as "no asset".
pub fn compose_still(
    asset: &AssetKind,
    caption_bar: &RgbaImage,
    width: u32,
    height: u32,
) -> RgbaImage {
    let mut frame = match asset {
        AssetKind::Image(path) => match image::open(path) {
            Ok(src) => {
                let src = src.to_rgba8();
                let (sw, sh) = (src.width(), src.height());
                if (sw, sh) == (width, height) {
                    // Already at target size; skip the resize entirely.
                    src
                } else {
                    let (fw, fh) = fit_within(sw, sh, width, height);
                    let scaled = imageops::resize(&src, fw, fh, FilterType::Triangle);
                    let mut bg = RgbaImage::from_pixel(width, height, LETTERBOX_FILL);
                    let x = (width - fw) / 2;
                    let y = (height - fh) / 2;
                    imageops::overlay(&mut bg, &scaled, x as i64, y as i64);
                    bg
                }
            }
            Err(err) => {
                warn!("Could not load image {}: {}", path.display(), err);
                RgbaImage::from_pixel(width, height, PLACEHOLDER_FILL)
            }
        },
        _ => RgbaImage::from_pixel(width, height, PLACEHOLDER_FILL),
    };

    let bar_y = (height as i64 * 2) / 3;
    imageops::overlay(&mut frame, caption_bar, 0, bar_y);
    frame
}
