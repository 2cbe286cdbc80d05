//! One analysis run from byte source to ranked moments.
//!
//! validate -> sample (blocking worker) -> score (sequential) -> rank

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::aggregate::{aggregate, ResultSet};
use crate::analysis::AnalysisClient;
use crate::cancel::CancellationToken;
use crate::error::{AnalysisError, HighlightError, Result};
use crate::limits::RateLimitConfig;
use crate::orchestrator;
use crate::progress::ProgressSink;
use crate::sampler::{
    MediaDecoder, SamplingOptions, VideoSampler, VideoSource, DEFAULT_MAX_HEIGHT,
    DEFAULT_MAX_WIDTH,
};
use crate::types::{AnalysisConfig, VideoHandle};

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Option<Uuid>,
    pub handle: VideoHandle,
    pub results: ResultSet,
    /// Frames produced by the sampler
    pub sampled: usize,
    /// Frames a scoring call was made for
    pub attempted: usize,
    /// Frames that could not be scored
    pub skipped: usize,
    /// `(index, timestamp, cause)` of every skipped frame
    pub failures: Vec<(usize, u64, AnalysisError)>,
    /// The run stopped early on request
    pub cancelled: bool,
}

/// Forwards sampling progress from the blocking worker to the run task.
struct ChannelProgress(mpsc::UnboundedSender<(u8, usize)>);

impl ProgressSink for ChannelProgress {
    fn on_sampled(&mut self, percent: u8, frames_so_far: usize) {
        let _ = self.0.send((percent, frames_so_far));
    }
}

/// Runs the whole chain for one video at a time.
#[derive(Clone)]
pub struct Pipeline {
    client: Arc<dyn AnalysisClient>,
    rate_limit: RateLimitConfig,
    max_width: u32,
    max_height: u32,
}

impl Pipeline {
    pub fn new(client: Arc<dyn AnalysisClient>) -> Self {
        Self {
            client,
            rate_limit: RateLimitConfig::default(),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Bounding box sampled frames are shrunk into.
    pub fn with_bounds(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Analyze `source` with `decoder`.
    ///
    /// Validation and media errors abort the run with no partial result.
    /// Frames that fail to score are skipped and counted in the summary.
    pub async fn analyze<D>(
        &self,
        source: VideoSource,
        decoder: D,
        config: &AnalysisConfig,
        progress: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary>
    where
        D: MediaDecoder + Send + 'static,
    {
        config.validate()?;
        if self.max_width == 0 || self.max_height == 0 {
            return Err(HighlightError::Config(format!(
                "frame bounds must be non-zero, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        let mut limiter = self.rate_limit.build()?;

        tracing::info!(
            "Sampling {} every {}s (max {} frames)",
            source.describe(),
            config.interval,
            config.max_frames
        );

        let options = SamplingOptions::from_config(config, self.max_width, self.max_height);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker_cancel = cancel.clone();
        let worker = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelProgress(tx);
            VideoSampler::new(options).sample_all(decoder, &source, &mut sink, worker_cancel)
        });

        while let Some((percent, frames_so_far)) = rx.recv().await {
            progress.on_sampled(percent, frames_so_far);
        }
        let sampled = worker
            .await
            .map_err(|e| HighlightError::Task(format!("sampling task failed: {}", e)))??;

        tracing::info!(
            "Sampled {} frames from {} of video",
            sampled.frames.len(),
            sampled.handle.duration_label()
        );

        if sampled.frames.is_empty() && sampled.cancelled {
            return Ok(RunSummary {
                run_id: None,
                handle: sampled.handle,
                results: ResultSet::default(),
                sampled: 0,
                attempted: 0,
                skipped: 0,
                failures: Vec::new(),
                cancelled: true,
            });
        }

        let report = orchestrator::run(
            &sampled.frames,
            config,
            self.client.as_ref(),
            limiter.as_mut(),
            progress,
            cancel,
        )
        .await?;

        let results = aggregate(&report.annotated(), config.min_score);
        tracing::info!(
            run_id = %report.run_id,
            "{} moments at or above {}/10",
            results.len(),
            config.min_score
        );

        Ok(RunSummary {
            run_id: Some(report.run_id),
            handle: sampled.handle,
            results,
            sampled: sampled.frames.len(),
            attempted: report.attempted(),
            skipped: report.skipped(),
            failures: report.failures(),
            cancelled: sampled.cancelled || report.cancelled,
        })
    }
}
