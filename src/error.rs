//! Fatal error taxonomy for the render job.
//!
//! Per-segment and audio-mix problems are recovered locally and only show
//! up as warnings; the variants here are the cases that must fail the
//! whole job with a non-zero exit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("manifest contains no rows")]
    NoRows,

    #[error("no segments could be encoded; nothing to concatenate")]
    NoSegments,

    #[error("segment concatenation failed: {0}")]
    ConcatFailed(String),

    #[error("could not write output file {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
