// src/error.rs
//
// Fatal input errors abort the whole video and surface as a terminal job
// failure. Per-light detection misses and geometry fallbacks are absorbed
// inside the components and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no position metadata could be extracted from {path}")]
    NoPositionMetadata { path: String },

    #[error("video could not be opened: {path}")]
    VideoOpen { path: String },

    #[error("no reference point surveyed for light {name}")]
    MissingReferencePoint { name: String },

    #[error("runway heading is required for horizontal angles but was not supplied")]
    MissingRunwayHeading,

    #[error("processing cancelled at frame {frame}")]
    Cancelled { frame: u64 },

    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}
