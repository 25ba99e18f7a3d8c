pub mod caption;
pub mod cli;
pub mod composite;
pub mod error;
pub mod ffmpeg;
pub mod manifest;
pub mod plan;
pub mod project;
pub mod render;
pub mod timecode;

pub use error::RenderError;
