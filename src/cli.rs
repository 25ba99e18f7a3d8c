//! Command-line interface.

use crate::render::Fidelity;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Renders a quick disposable video mock from a CUTS storyboard project.
#[derive(Debug, Parser)]
#[command(name = "cuts-mock", version, about)]
pub struct Args {
    /// Project ZIP, or a directory containing manifest.json + assets/
    pub input: PathBuf,

    /// Output video path (defaults to <project>_mock.mp4)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output frame rate
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    /// Output frame width
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Output frame height
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    /// x264 speed/size tradeoff
    #[arg(long, value_enum, default_value_t = Preset::Fast)]
    pub preset: Preset,

    /// Skip background music even when the manifest configures one
    #[arg(long)]
    pub no_bgm: bool,

    /// Keep the extracted ZIP contents instead of removing them
    #[arg(long)]
    pub keep_temp: bool,

    /// Compositing strategy: engine filter graphs, or in-process stills
    #[arg(long, value_enum, default_value_t = Fidelity::Engine)]
    pub fidelity: Fidelity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
        }
    }
}
