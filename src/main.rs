use anyhow::Result;
use clap::Parser;
use tracing::info;

use cuts_mock::cli::Args;
use cuts_mock::ffmpeg::{self, OutputProfile};
use cuts_mock::project::{Project, default_output_path, normalize_output_path};
use cuts_mock::render::{RenderJob, render_project};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if !ffmpeg::check_ffmpeg().await {
        anyhow::bail!("ffmpeg not found in PATH; it is required for rendering");
    }

    let mut project = Project::open(&args.input).await?;

    let out_path = match args.output.clone() {
        Some(path) => normalize_output_path(path),
        None => default_output_path(&args.input),
    };

    let profile = OutputProfile {
        width: args.width,
        height: args.height,
        fps: args.fps,
        preset: args.preset.as_str().to_string(),
    };
    let job = RenderJob::new(profile, args.fidelity, !args.no_bgm)?;

    // Disarm the extraction guard up front so the tree survives failed
    // renders too.
    if args.keep_temp {
        project.keep_extracted();
    }

    render_project(&project, &job, &out_path).await?;

    info!("Wrote {}", out_path.display());
    Ok(())
}
