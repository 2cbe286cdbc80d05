//! Sequential scoring of sampled frames.
//!
//! Frames are scored one at a time, in sampling order. A failed frame is
//! recorded as a [`FrameOutcome::Failure`] and the run moves on; it never
//! aborts the run and is never retried.

use uuid::Uuid;

use crate::analysis::AnalysisClient;
use crate::cancel::CancellationToken;
use crate::error::{AnalysisError, HighlightError, Result};
use crate::limits::RateLimiter;
use crate::progress::ProgressSink;
use crate::types::{AnalysisConfig, AnnotatedFrame, Frame};

/// Result of one scoring attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Success(AnnotatedFrame),
    Failure {
        index: usize,
        timestamp: u64,
        cause: AnalysisError,
    },
}

impl FrameOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FrameOutcome::Success(_))
    }
}

/// Everything a scoring pass produced, one outcome per attempted frame.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcomes: Vec<FrameOutcome>,
    /// Frames handed to the run
    pub total: usize,
    /// Stopped early on request
    pub cancelled: bool,
}

impl RunReport {
    /// Successfully scored frames, in sampling order.
    pub fn annotated(&self) -> Vec<AnnotatedFrame> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                FrameOutcome::Success(frame) => Some(frame.clone()),
                FrameOutcome::Failure { .. } => None,
            })
            .collect()
    }

    /// Consume the report, keeping only the scored frames.
    pub fn into_annotated(self) -> Vec<AnnotatedFrame> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                FrameOutcome::Success(frame) => Some(frame),
                FrameOutcome::Failure { .. } => None,
            })
            .collect()
    }

    /// `(index, timestamp, cause)` of every skipped frame.
    pub fn failures(&self) -> Vec<(usize, u64, AnalysisError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                FrameOutcome::Failure {
                    index,
                    timestamp,
                    cause,
                } => Some((*index, *timestamp, cause.clone())),
                FrameOutcome::Success(_) => None,
            })
            .collect()
    }

    /// Number of frames that could not be scored.
    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    /// Number of frames a scoring call was made for.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// Score `frames` one by one.
///
/// Fails fast, before any call, when the API key is blank, the frame list is
/// empty or the interval is zero. The limiter is awaited before every attempt.
/// Cancellation is checked before each call and returns what was scored so far.
pub async fn run(
    frames: &[Frame],
    config: &AnalysisConfig,
    client: &dyn AnalysisClient,
    limiter: &mut dyn RateLimiter,
    progress: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    if config.api_key.trim().is_empty() {
        return Err(HighlightError::Validation("API key is required".to_string()));
    }
    if frames.is_empty() {
        return Err(HighlightError::Validation("no frames to analyze".to_string()));
    }
    if config.interval == 0 {
        return Err(HighlightError::Validation(
            "sampling interval must be greater than zero".to_string(),
        ));
    }

    let run_id = Uuid::new_v4();
    let total = frames.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut cancelled = false;

    tracing::info!(
        run_id = %run_id,
        "Analyzing {} frames with model {} ({})",
        total,
        config.model,
        config.domain
    );

    for frame in frames {
        if cancel.is_cancelled() {
            tracing::info!(run_id = %run_id, "Analysis cancelled after {} frames", outcomes.len());
            cancelled = true;
            break;
        }

        limiter.acquire().await;
        if cancel.is_cancelled() {
            tracing::info!(run_id = %run_id, "Analysis cancelled after {} frames", outcomes.len());
            cancelled = true;
            break;
        }

        let outcome = match client.analyze(frame, config).await {
            Ok(annotated) => {
                tracing::debug!(
                    "Frame {} at {}s scored {}",
                    frame.index,
                    frame.timestamp,
                    annotated.score
                );
                progress.on_analyzed(outcomes.len() + 1, total, &annotated);
                FrameOutcome::Success(annotated)
            }
            Err(cause) => {
                tracing::warn!(
                    run_id = %run_id,
                    "Skipping frame {} at {}s: {}",
                    frame.index,
                    frame.timestamp,
                    cause
                );
                progress.on_skipped(frame.index, frame.timestamp, &cause);
                FrameOutcome::Failure {
                    index: frame.index,
                    timestamp: frame.timestamp,
                    cause,
                }
            }
        };
        outcomes.push(outcome);
    }

    let report = RunReport {
        run_id,
        outcomes,
        total,
        cancelled,
    };
    tracing::info!(
        run_id = %run_id,
        "Analysis done: {} scored, {} skipped",
        report.attempted() - report.skipped(),
        report.skipped()
    );
    Ok(report)
}
