//! Segment planning: turns manifest rows into a uniform, ordered list of
//! segment specs that the rest of the pipeline consumes.

use crate::manifest::Row;
use crate::timecode::parse_duration_or_default;
use std::path::{Path, PathBuf};

pub const CAPTION_MAX_CHARS: usize = 80;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "webm"];

/// Resolved visual for one segment, classified exactly once at planning
/// time. Downstream code pattern-matches on this instead of re-inspecting
/// file extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetKind {
    /// No usable visual: render a solid placeholder background.
    None,
    Image(PathBuf),
    Video(PathBuf),
}

/// One planned segment. `index` defines final concatenation order and is
/// the invariant the parallel renderer must preserve.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    pub index: usize,
    pub ordinal: u32,
    pub duration_secs: f64,
    pub asset: AssetKind,
    pub caption: String,
}

/// Builds the ordered segment plan from manifest rows.
pub fn plan_segments(rows: &[Row], assets_dir: &Path) -> Vec<SegmentSpec> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| SegmentSpec {
            index,
            ordinal: row.ordinal(index),
            duration_secs: parse_duration_or_default(row.duration.as_deref().unwrap_or("")),
            asset: resolve_asset(row.visual.as_ref().and_then(|v| v.file.as_deref()), assets_dir),
            caption: normalize_caption(row.caption.as_deref().unwrap_or("")),
        })
        .collect()
}

/// Trims surrounding whitespace and truncates to [`CAPTION_MAX_CHARS`]
/// characters (not bytes; captions are frequently non-ASCII).
pub fn normalize_caption(raw: &str) -> String {
    raw.trim().chars().take(CAPTION_MAX_CHARS).collect()
}

/// Resolves a manifest visual reference against the assets directory.
///
/// Only the final path component of the reference is honored, so a
/// reference can never escape the assets directory. A missing file is
/// treated the same as no reference at all.
pub fn resolve_asset(file_ref: Option<&str>, assets_dir: &Path) -> AssetKind {
    let Some(file_ref) = file_ref.map(str::trim).filter(|s| !s.is_empty()) else {
        return AssetKind::None;
    };
    let Some(name) = Path::new(file_ref).file_name() else {
        return AssetKind::None;
    };
    let path = assets_dir.join(name);
    if !path.is_file() {
        return AssetKind::None;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        AssetKind::Image(path)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        AssetKind::Video(path)
    } else {
        AssetKind::None
    }
}
