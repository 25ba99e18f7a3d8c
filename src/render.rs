//! Render pipeline: job context, parallel segment supervision, ordered
//! concatenation and BGM muxing.

use crate::caption;
use crate::composite;
use crate::error::RenderError;
use crate::ffmpeg::{self, EngineStatus, OutputProfile};
use crate::plan::{self, AssetKind, SegmentSpec};
use crate::project::Project;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Where compositing happens: inside ffmpeg filter graphs, or in-process
/// for still frames. Video segments go through the engine either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Fidelity {
    #[default]
    Engine,
    Composite,
}

/// Job-scoped context. The workspace owns every intermediate artifact and
/// is removed on drop, whatever the exit path.
pub struct RenderJob {
    pub profile: OutputProfile,
    pub fidelity: Fidelity,
    pub mix_bgm: bool,
    workspace: TempDir,
}

impl RenderJob {
    pub fn new(profile: OutputProfile, fidelity: Fidelity, mix_bgm: bool) -> Result<Self> {
        let workspace = TempDir::with_prefix("cuts_render_")
            .context("Failed to create render workspace")?;
        std::fs::create_dir(workspace.path().join("segments"))
            .context("Failed to create segment directory")?;
        Ok(Self {
            profile,
            fidelity,
            mix_bgm,
            workspace,
        })
    }

    fn segments_dir(&self) -> PathBuf {
        self.workspace.path().join("segments")
    }

    fn segment_path(&self, index: usize) -> PathBuf {
        self.segments_dir().join(format!("seg_{index:04}.mp4"))
    }

    fn caption_path(&self, index: usize) -> PathBuf {
        self.segments_dir().join(format!("cap_{index:04}.png"))
    }

    fn frame_path(&self, index: usize) -> PathBuf {
        self.segments_dir().join(format!("frame_{index:04}.png"))
    }

    fn work_path(&self, name: &str) -> PathBuf {
        self.workspace.path().join(name)
    }
}

/// Outcome for one planned segment; the supervisor records exactly one
/// per index.
#[derive(Debug)]
pub enum SegmentResult {
    Succeeded(PathBuf),
    Failed(String),
    TimedOut,
}

/// One ready-to-run encode: everything the engine needs, no shared state.
#[derive(Debug, Clone)]
pub(crate) struct EncodeTask {
    pub index: usize,
    pub ordinal: u32,
    pub output: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(2)
}

/// Runs all encode tasks with bounded parallelism and returns one result
/// per task, restored to index order regardless of completion order.
pub(crate) async fn supervise<F, Fut>(
    tasks: Vec<EncodeTask>,
    parallelism: usize,
    run: F,
) -> Vec<SegmentResult>
where
    F: Fn(EncodeTask) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = EngineStatus> + Send + 'static,
{
    let total = tasks.len();
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let mut set = JoinSet::new();

    for task in tasks {
        let semaphore = Arc::clone(&semaphore);
        let run = run.clone();
        set.spawn(async move {
            let index = task.index;
            let ordinal = task.ordinal;
            let output = task.output.clone();
            let limit = task.timeout;

            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, SegmentResult::Failed("worker pool closed".into()));
            };
            info!("Encoding segment {}/{}", index + 1, total);

            let result = match run(task).await {
                EngineStatus::Completed => SegmentResult::Succeeded(output),
                EngineStatus::Failed(detail) => {
                    warn!("Segment {} failed: {}", ordinal, detail);
                    SegmentResult::Failed(detail)
                }
                EngineStatus::TimedOut => {
                    warn!("Segment {} timed out after {:?}", ordinal, limit);
                    SegmentResult::TimedOut
                }
            };
            (index, result)
        });
    }

    let mut results: Vec<Option<SegmentResult>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(err) => warn!("Segment task aborted: {}", err),
        }
    }

    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| SegmentResult::Failed("task aborted".into())))
        .collect()
}

/// Paths of succeeded segments, in index order.
fn surviving_in_order(results: &[SegmentResult]) -> Vec<&Path> {
    results
        .iter()
        .filter_map(|r| match r {
            SegmentResult::Succeeded(path) => Some(path.as_path()),
            _ => None,
        })
        .collect()
}

/// Concat-demuxer list line; single quotes in paths get the standard
/// `'\''` escape.
fn concat_list_entry(path: &Path) -> String {
    let escaped = path.display().to_string().replace('\'', r"'\''");
    format!("file '{escaped}'\n")
}

/// Writes caption layers (and composed frames for the composite path) and
/// builds one encode task per planned segment.
fn prepare_tasks(
    specs: &[SegmentSpec],
    job: &RenderJob,
    font: Option<&rusttype::Font<'_>>,
) -> Result<Vec<EncodeTask>> {
    let (w, h) = (job.profile.width, job.profile.height);
    let mut tasks = Vec::with_capacity(specs.len());

    for spec in specs {
        let bar = caption::render_caption_bar(&spec.caption, w, h, font);
        let output = job.segment_path(spec.index);

        let composite_still = job.fidelity == Fidelity::Composite
            && !matches!(spec.asset, AssetKind::Video(_));

        let args = if composite_still {
            let frame = composite::compose_still(&spec.asset, &bar, w, h);
            let frame_png = job.frame_path(spec.index);
            frame
                .save(&frame_png)
                .with_context(|| format!("Failed to write frame {}", frame_png.display()))?;
            ffmpeg::still_frame_args(&frame_png, spec.duration_secs, &job.profile, &output)
        } else {
            let caption_png = job.caption_path(spec.index);
            bar.save(&caption_png)
                .with_context(|| format!("Failed to write caption {}", caption_png.display()))?;
            ffmpeg::segment_args(&spec.asset, &caption_png, spec.duration_secs, &job.profile, &output)
        };

        tasks.push(EncodeTask {
            index: spec.index,
            ordinal: spec.ordinal,
            output,
            args,
            timeout: ffmpeg::segment_timeout(spec.duration_secs),
        });
    }

    Ok(tasks)
}

/// Runs the whole pipeline for an opened project and writes the final
/// artifact to `out_path`.
pub async fn render_project(project: &Project, job: &RenderJob, out_path: &Path) -> Result<()> {
    if project.manifest.rows.is_empty() {
        return Err(RenderError::NoRows.into());
    }

    let specs = plan::plan_segments(&project.manifest.rows, &project.assets_dir);
    info!(
        "Planned {} segments ({}x{} @ {} fps, {:?} fidelity)",
        specs.len(),
        job.profile.width,
        job.profile.height,
        job.profile.fps,
        job.fidelity
    );

    let font = caption::load_font();
    if font.is_none() && specs.iter().any(|s| !s.caption.is_empty()) {
        warn!("No usable caption font found; captions will render as bare bars");
    }

    let tasks = prepare_tasks(&specs, job, font.as_ref())?;
    let results = supervise(tasks, default_parallelism(), |task| async move {
        ffmpeg::run_ffmpeg(&task.args, Some(task.timeout)).await
    })
    .await;

    let surviving = surviving_in_order(&results);
    let failed = results.len() - surviving.len();
    if failed > 0 {
        warn!("{} of {} segments dropped from the final cut", failed, results.len());
    }
    if surviving.is_empty() {
        return Err(RenderError::NoSegments.into());
    }

    let list_path = job.work_path("list.txt");
    let mut list = tokio::fs::File::create(&list_path)
        .await
        .context("Failed to create concat list")?;
    for path in &surviving {
        list.write_all(concat_list_entry(path).as_bytes()).await?;
    }
    list.flush().await?;

    let combined = job.work_path("combined.mp4");
    info!("Concatenating {} segments (stream copy)", surviving.len());
    ffmpeg::concat_segments(&list_path, &combined)
        .await
        .map_err(|err| RenderError::ConcatFailed(format!("{err:#}")))?;

    let final_video = apply_bgm(project, job, &combined).await;

    tokio::fs::copy(&final_video, out_path)
        .await
        .map_err(|source| RenderError::OutputWrite {
            path: out_path.display().to_string(),
            source,
        })?;

    Ok(())
}

/// Muxes the configured BGM track onto the concatenated video when
/// possible. Every failure here falls back to the video-only file.
async fn apply_bgm(project: &Project, job: &RenderJob, combined: &Path) -> PathBuf {
    if !job.mix_bgm {
        return combined.to_path_buf();
    }
    let Some(file_ref) = project
        .manifest
        .bgm
        .as_ref()
        .and_then(|b| b.file.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return combined.to_path_buf();
    };

    // Same traversal-safe resolution as visual assets: base name only.
    let Some(name) = Path::new(file_ref).file_name() else {
        return combined.to_path_buf();
    };
    let bgm_path = project.assets_dir.join(name);
    if !bgm_path.is_file() {
        warn!("BGM file not found: {}; writing video-only output", bgm_path.display());
        return combined.to_path_buf();
    }

    let with_bgm = job.work_path("final.mp4");
    match ffmpeg::mux_bgm(combined, &bgm_path, &with_bgm).await {
        Ok(()) => with_bgm,
        Err(err) => {
            warn!("BGM mux failed ({err:#}); writing video-only output");
            combined.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stub_task(index: usize) -> EncodeTask {
        EncodeTask {
            index,
            ordinal: index as u32 + 1,
            output: PathBuf::from(format!("/w/seg_{index:04}.mp4")),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn results_restore_index_order_under_random_completion() {
        let tasks: Vec<EncodeTask> = (0..16).map(stub_task).collect();
        // Scrambled artificial delays so completion order differs from
        // dispatch order.
        let results = supervise(tasks, 4, |task| async move {
            let jitter = (task.index * 7 + 3) % 11;
            tokio::time::sleep(Duration::from_millis(jitter as u64)).await;
            EngineStatus::Completed
        })
        .await;

        assert_eq!(results.len(), 16);
        let surviving = surviving_in_order(&results);
        assert_eq!(surviving.len(), 16);
        for (i, path) in surviving.iter().enumerate() {
            assert_eq!(**path, PathBuf::from(format!("/w/seg_{i:04}.mp4")));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn single_failure_drops_only_that_segment() {
        let tasks: Vec<EncodeTask> = (0..6).map(stub_task).collect();
        let results = supervise(tasks, 3, |task| async move {
            if task.index == 2 {
                EngineStatus::Failed("forced".into())
            } else {
                EngineStatus::Completed
            }
        })
        .await;

        assert!(matches!(&results[2], SegmentResult::Failed(r) if r == "forced"));
        let surviving = surviving_in_order(&results);
        assert_eq!(surviving.len(), 5);
        // Ordering holds across the gap.
        assert!(surviving[1].ends_with("seg_0001.mp4"));
        assert!(surviving[2].ends_with("seg_0003.mp4"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timeout_is_recorded_not_fatal() {
        let tasks: Vec<EncodeTask> = (0..3).map(stub_task).collect();
        let results = supervise(tasks, 2, |task| async move {
            if task.index == 1 {
                EngineStatus::TimedOut
            } else {
                EngineStatus::Completed
            }
        })
        .await;

        assert!(matches!(results[1], SegmentResult::TimedOut));
        assert_eq!(surviving_in_order(&results).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parallelism_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<EncodeTask> = (0..12).map(stub_task).collect();

        let (active_c, peak_c) = (Arc::clone(&active), Arc::clone(&peak));
        let results = supervise(tasks, 2, move |_task| {
            let active = Arc::clone(&active_c);
            let peak = Arc::clone(&peak_c);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                EngineStatus::Completed
            }
        })
        .await;

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn total_failure_leaves_nothing_to_concatenate() {
        let results = vec![
            SegmentResult::Failed("a".into()),
            SegmentResult::TimedOut,
        ];
        assert!(surviving_in_order(&results).is_empty());
    }

    #[tokio::test]
    async fn missing_bgm_falls_back_to_video_only() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{ "rows": [ { "duration": "3" } ], "bgm": { "file": "assets/gone.mp3" } }"#,
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        let project = Project::open(dir.path()).await.unwrap();

        let job = RenderJob::new(
            OutputProfile {
                width: 320,
                height: 240,
                fps: 30.0,
                preset: "fast".into(),
            },
            Fidelity::Engine,
            true,
        )
        .unwrap();
        let combined = job.work_path("combined.mp4");

        // The configured track does not exist under assets; the mux step
        // is skipped and the concatenated video is passed through as-is.
        assert_eq!(apply_bgm(&project, &job, &combined).await, combined);
    }

    #[tokio::test]
    async fn bgm_skipped_when_mixing_disabled() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("manifest.json"),
            r#"{ "rows": [], "bgm": { "file": "assets/track.mp3" } }"#,
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/track.mp3"), b"x").unwrap();
        let project = Project::open(dir.path()).await.unwrap();

        let job = RenderJob::new(
            OutputProfile {
                width: 320,
                height: 240,
                fps: 30.0,
                preset: "fast".into(),
            },
            Fidelity::Engine,
            false,
        )
        .unwrap();
        let combined = job.work_path("combined.mp4");

        assert_eq!(apply_bgm(&project, &job, &combined).await, combined);
    }

    #[test]
    fn concat_entries_quote_paths() {
        assert_eq!(
            concat_list_entry(Path::new("/tmp/seg_0000.mp4")),
            "file '/tmp/seg_0000.mp4'\n"
        );
        assert_eq!(
            concat_list_entry(Path::new("/tmp/o'brien.mp4")),
            "file '/tmp/o'\\''brien.mp4'\n"
        );
    }

    #[test]
    fn parallelism_floor_is_two() {
        assert!(default_parallelism() >= 2);
    }
}
