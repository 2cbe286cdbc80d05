//! Highlight finder
//!
//! Samples a video at fixed intervals, has every frame scored by a vision
//! service, and ranks the moments that score at or above a threshold.

pub mod aggregate;
pub mod analysis;
pub mod cancel;
pub mod config;
pub mod config_file;
pub mod error;
pub mod estimate;
pub mod ffmpeg;
pub mod http;
pub mod limits;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod sampler;
pub mod state;
pub mod types;

#[cfg(test)]
mod integration;

pub use error::{AnalysisError, HighlightError, MediaError, Result};
pub use pipeline::{Pipeline, RunSummary};
pub use types::{AnalysisConfig, AnnotatedFrame, Frame, Model, VideoDomain, VideoHandle};
