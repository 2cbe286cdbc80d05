//! Progress side channel of a run.

use crate::error::AnalysisError;
use crate::types::AnnotatedFrame;

/// Receives progress events while a run is in flight. All methods default to no-ops.
pub trait ProgressSink: Send {
    /// A frame was sampled. `percent` is the share of the duration covered so far.
    fn on_sampled(&mut self, percent: u8, frames_so_far: usize) {
        let _ = (percent, frames_so_far);
    }

    /// A frame was scored. `processed` counts attempts so far, 1-based.
    fn on_analyzed(&mut self, processed: usize, total: usize, frame: &AnnotatedFrame) {
        let _ = (processed, total, frame);
    }

    /// A frame could not be scored and was skipped.
    fn on_skipped(&mut self, index: usize, timestamp: u64, cause: &AnalysisError) {
        let _ = (index, timestamp, cause);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Reports progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_sampled(&mut self, percent: u8, frames_so_far: usize) {
        tracing::info!("Sampling... {}% ({} frames)", percent, frames_so_far);
    }

    fn on_analyzed(&mut self, processed: usize, total: usize, frame: &AnnotatedFrame) {
        tracing::info!(
            "Analyzed {}/{} - {} scored {}/10",
            processed,
            total,
            frame.timestamp_label(),
            frame.score
        );
    }

    fn on_skipped(&mut self, index: usize, timestamp: u64, cause: &AnalysisError) {
        tracing::warn!("Skipped frame {} at {}s: {}", index, timestamp, cause);
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for Box<T> {
    fn on_sampled(&mut self, percent: u8, frames_so_far: usize) {
        (**self).on_sampled(percent, frames_so_far)
    }

    fn on_analyzed(&mut self, processed: usize, total: usize, frame: &AnnotatedFrame) {
        (**self).on_analyzed(processed, total, frame)
    }

    fn on_skipped(&mut self, index: usize, timestamp: u64, cause: &AnalysisError) {
        (**self).on_skipped(index, timestamp, cause)
    }
}
