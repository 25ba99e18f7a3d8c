//! External encoding engine interface.
//!
//! Everything the pipeline needs from ffmpeg is expressed here: per-segment
//! encodes, stream-copy concatenation, and BGM multiplexing. Command lines
//! are built by pure functions so the exact invocations stay unit-testable
//! without a toolchain on PATH; the only failure signals consumed upstream
//! are a non-zero exit status and the per-segment timeout.

use crate::plan::AssetKind;
use anyhow::{Result, anyhow};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const PLACEHOLDER_COLOR: &str = "0x3c3c3c";

/// Caption bar overlay position: horizontally centered, top edge at the
/// lower third of the frame.
const OVERLAY_XY: &str = "(main_w-overlay_w)/2:main_h*2/3";

/// Target output parameters shared by every segment encode, which is what
/// makes lossless concatenation of the results safe.
#[derive(Debug, Clone)]
pub struct OutputProfile {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub preset: String,
}

impl OutputProfile {
    fn scale_pad_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
            w = self.width,
            h = self.height
        )
    }
}

/// Outcome of one engine invocation.
#[derive(Debug)]
pub enum EngineStatus {
    Completed,
    /// Non-zero exit (or failure to run at all); carries trimmed stderr
    /// for diagnostics.
    Failed(String),
    TimedOut,
}

/// Per-segment watchdog: generous floor plus headroom proportional to the
/// segment length, so long cuts are not killed prematurely.
pub fn segment_timeout(duration_secs: f64) -> Duration {
    Duration::from_secs_f64((duration_secs * 6.0).max(120.0))
}

pub async fn check_ffmpeg() -> bool {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Runs ffmpeg with the standard quiet prelude. A `limit` of `None` means
/// no watchdog (used for the short concat/mux steps).
pub async fn run_ffmpeg(args: &[String], limit: Option<Duration>) -> EngineStatus {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => return EngineStatus::Failed(format!("failed to spawn ffmpeg: {err}")),
    };

    let wait = child.wait_with_output();
    let output = match limit {
        // Dropping the wait future on timeout kills the stuck process via
        // kill_on_drop; nothing else shares it.
        Some(limit) => match timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => return EngineStatus::TimedOut,
        },
        None => wait.await,
    };

    match output {
        Ok(out) if out.status.success() => EngineStatus::Completed,
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("ffmpeg exited with {}", out.status)
            } else {
                stderr
            };
            EngineStatus::Failed(detail)
        }
        Err(err) => EngineStatus::Failed(format!("ffmpeg did not complete: {err}")),
    }
}

/// Builds the per-segment encode command. All branches share the same
/// codec/size/fps/preset so the concat step can stream-copy.
pub fn segment_args(
    asset: &AssetKind,
    caption_png: &Path,
    duration_secs: f64,
    profile: &OutputProfile,
    out: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let filter;

    match asset {
        AssetKind::None => {
            // Solid placeholder background straight from lavfi.
            args.extend([
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c={}:s={}x{}:d={}",
                    PLACEHOLDER_COLOR, profile.width, profile.height, duration_secs
                ),
                "-i".into(),
                caption_png.display().to_string(),
            ]);
            filter = format!("[0][1]overlay={OVERLAY_XY}[out]");
        }
        AssetKind::Image(path) => {
            args.extend([
                "-loop".into(),
                "1".into(),
                "-i".into(),
                path.display().to_string(),
                "-i".into(),
                caption_png.display().to_string(),
                "-t".into(),
                duration_secs.to_string(),
            ]);
            filter = format!(
                "[0:v]{}[v];[v][1:v]overlay={OVERLAY_XY}[out]",
                profile.scale_pad_filter()
            );
        }
        AssetKind::Video(path) => {
            args.extend([
                "-i".into(),
                path.display().to_string(),
                "-i".into(),
                caption_png.display().to_string(),
                "-t".into(),
                duration_secs.to_string(),
            ]);
            // tpad clones the last frame when the source is shorter than
            // the cut; -t clamps when it is longer.
            filter = format!(
                "[0:v]{},tpad=stop_mode=clone:stop=-1[v];[v][1:v]overlay={OVERLAY_XY}[out]",
                profile.scale_pad_filter()
            );
        }
    }

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[out]".into(),
        "-an".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        profile.preset.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        profile.fps.to_string(),
        out.display().to_string(),
    ]);
    args
}

/// Encode command for a pre-composed full-frame still (composite fidelity
/// path): no filter graph, the frame already carries the caption.
pub fn still_frame_args(
    frame_png: &Path,
    duration_secs: f64,
    profile: &OutputProfile,
    out: &Path,
) -> Vec<String> {
    vec![
        "-loop".into(),
        "1".into(),
        "-i".into(),
        frame_png.display().to_string(),
        "-t".into(),
        duration_secs.to_string(),
        "-an".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        profile.preset.clone(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        profile.fps.to_string(),
        out.display().to_string(),
    ]
}

fn concat_args(list_txt: &Path, out: &Path) -> Vec<String> {
    vec![
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_txt.display().to_string(),
        "-c".into(),
        "copy".into(),
        out.display().to_string(),
    ]
}

fn mux_bgm_args(video_in: &Path, bgm_in: &Path, out: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        video_in.display().to_string(),
        "-i".into(),
        bgm_in.display().to_string(),
        "-map".into(),
        "0:v".into(),
        "-map".into(),
        "1:a".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        out.display().to_string(),
    ]
}

/// Stream-copies the listed segment files into one output. Errors here are
/// fatal for the job.
pub async fn concat_segments(list_txt: &Path, out: &Path) -> Result<()> {
    match run_ffmpeg(&concat_args(list_txt, out), None).await {
        EngineStatus::Completed => Ok(()),
        EngineStatus::Failed(detail) => Err(anyhow!(detail)),
        EngineStatus::TimedOut => Err(anyhow!("concatenation timed out")),
    }
}

/// Multiplexes the BGM track onto the concatenated video, clamped to the
/// shorter stream. Callers treat failure as a warning, not a job failure.
pub async fn mux_bgm(video_in: &Path, bgm_in: &Path, out: &Path) -> Result<()> {
    match run_ffmpeg(&mux_bgm_args(video_in, bgm_in, out), None).await {
        EngineStatus::Completed => Ok(()),
        EngineStatus::Failed(detail) => Err(anyhow!(detail)),
        EngineStatus::TimedOut => Err(anyhow!("bgm mux timed out")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn profile() -> OutputProfile {
        OutputProfile {
            width: 1920,
            height: 1080,
            fps: 30.0,
            preset: "fast".into(),
        }
    }

    #[test]
    fn timeout_has_two_minute_floor() {
        assert_eq!(segment_timeout(3.0), Duration::from_secs(120));
        assert_eq!(segment_timeout(30.0), Duration::from_secs(180));
    }

    #[test]
    fn placeholder_segment_uses_color_source() {
        let args = segment_args(
            &AssetKind::None,
            Path::new("/tmp/cap.png"),
            2.5,
            &profile(),
            Path::new("/tmp/seg.mp4"),
        );
        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "lavfi");
        assert!(args[3].contains("color=c=0x3c3c3c:s=1920x1080:d=2.5"));
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("overlay=(main_w-overlay_w)/2:main_h*2/3"));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
    }

    #[test]
    fn image_segment_loops_and_letterboxes() {
        let args = segment_args(
            &AssetKind::Image(PathBuf::from("/a/cover.png")),
            Path::new("/tmp/cap.png"),
            4.0,
            &profile(),
            Path::new("/tmp/seg.mp4"),
        );
        assert_eq!(&args[0..2], &["-loop".to_string(), "1".to_string()]);
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(filter.contains("pad=1920:1080:(ow-iw)/2:(oh-ih)/2:black"));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "4");
    }

    #[test]
    fn video_segment_clamps_and_extends() {
        let args = segment_args(
            &AssetKind::Video(PathBuf::from("/a/clip.mp4")),
            Path::new("/tmp/cap.png"),
            6.0,
            &profile(),
            Path::new("/tmp/seg.mp4"),
        );
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("tpad=stop_mode=clone:stop=-1"));
        assert!(args.contains(&"-t".to_string()));
    }

    #[test]
    fn concat_is_stream_copy() {
        let args = concat_args(Path::new("/w/list.txt"), Path::new("/w/combined.mp4"));
        assert_eq!(
            args,
            vec![
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                "/w/list.txt",
                "-c",
                "copy",
                "/w/combined.mp4"
            ]
        );
    }

    #[test]
    fn bgm_mux_clamps_to_shorter_stream() {
        let args = mux_bgm_args(
            Path::new("/w/combined.mp4"),
            Path::new("/a/track.mp3"),
            Path::new("/w/final.mp4"),
        );
        assert!(args.contains(&"-shortest".to_string()));
        let v = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[v + 1], "copy");
    }
}
