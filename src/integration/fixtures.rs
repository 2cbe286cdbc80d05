//! Test fixtures for integration tests
//!
//! Provides a scripted decoder, a scripted scoring client and a recording
//! progress sink so whole runs can be driven without media files or network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgb, RgbImage};

use crate::analysis::{AnalysisClient, ScoreReply};
use crate::cancel::CancellationToken;
use crate::error::{AnalysisError, MediaError};
use crate::progress::ProgressSink;
use crate::sampler::{MediaDecoder, VideoSource};
use crate::types::{AnalysisConfig, AnnotatedFrame, EncodedImage, Frame, ImageFormat, VideoHandle};

#[derive(Debug, Default)]
struct DecoderEvents {
    opened: bool,
    seeks: Vec<u64>,
    closed: bool,
}

/// What a [`FakeDecoder`] was asked to do. Survives the decoder itself.
#[derive(Debug, Clone, Default)]
pub struct DecoderLog(Arc<Mutex<DecoderEvents>>);

impl DecoderLog {
    pub fn opened(&self) -> bool {
        self.0.lock().unwrap().opened
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.0.lock().unwrap().seeks.clone()
    }

    pub fn closed(&self) -> bool {
        self.0.lock().unwrap().closed
    }
}

/// Decoder over a synthetic video of a given duration and size.
#[derive(Debug)]
pub struct FakeDecoder {
    duration: u64,
    width: u32,
    height: u32,
    fail_open: bool,
    fail_at: Option<u64>,
    log: DecoderLog,
}

impl FakeDecoder {
    pub fn new(duration: u64, width: u32, height: u32) -> (Self, DecoderLog) {
        let log = DecoderLog::default();
        let decoder = Self {
            duration,
            width,
            height,
            fail_open: false,
            fail_at: None,
            log: log.clone(),
        };
        (decoder, log)
    }

    /// A decoder whose source is not a video.
    pub fn failing_open() -> (Self, DecoderLog) {
        let (mut decoder, log) = Self::new(0, 0, 0);
        decoder.fail_open = true;
        (decoder, log)
    }

    /// Fail the capture at `timestamp`.
    pub fn fail_capture_at(mut self, timestamp: u64) -> Self {
        self.fail_at = Some(timestamp);
        self
    }
}

impl MediaDecoder for FakeDecoder {
    fn open(&mut self, source: &VideoSource) -> Result<VideoHandle, MediaError> {
        self.log.0.lock().unwrap().opened = true;
        if self.fail_open {
            return Err(MediaError::OpenInput(format!(
                "{}: Invalid data found when processing input",
                source.describe()
            )));
        }
        Ok(VideoHandle {
            duration_secs: self.duration,
            width: self.width,
            height: self.height,
            byte_size: source.byte_size().unwrap_or(0),
        })
    }

    fn seek_and_capture(&mut self, timestamp: u64) -> Result<RgbImage, MediaError> {
        self.log.0.lock().unwrap().seeks.push(timestamp);
        if self.fail_at == Some(timestamp) {
            return Err(MediaError::DecodePacket("corrupt packet".to_string()));
        }
        let shade = (timestamp % 256) as u8;
        Ok(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([shade, 128, 255 - shade]),
        ))
    }

    fn close(&mut self) {
        self.log.0.lock().unwrap().closed = true;
    }
}

/// Frames at the given timestamps, indexed in order.
pub fn frames_at(timestamps: &[u64]) -> Vec<Frame> {
    timestamps
        .iter()
        .enumerate()
        .map(|(index, &timestamp)| Frame {
            timestamp,
            index,
            image: EncodedImage {
                data: Bytes::from(vec![0xFF, 0xD8, index as u8]),
                format: ImageFormat::Jpeg,
                quality: 0.8,
                width: 64,
                height: 36,
            },
        })
        .collect()
}

/// Scoring client answering from a script keyed by frame index.
///
/// `Some(score)` answers with that score, `None` fails the call.
pub struct ScriptedClient {
    script: Vec<Option<i64>>,
    calls: Mutex<Vec<u64>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedClient {
    pub fn scores(script: &[Option<i64>]) -> Self {
        Self {
            script: script.to_vec(),
            calls: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    /// Cancel `token` once `calls` calls were made.
    pub fn cancel_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    /// Timestamps of the frames scored so far, in call order.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisClient for ScriptedClient {
    async fn analyze(
        &self,
        frame: &Frame,
        _config: &AnalysisConfig,
    ) -> Result<AnnotatedFrame, AnalysisError> {
        let made = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(frame.timestamp);
            calls.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if made >= *after {
                token.cancel();
            }
        }

        match self.script.get(frame.index).copied().flatten() {
            Some(score) => ScoreReply {
                score,
                description: format!("frame {}", frame.index),
                raw: None,
            }
            .into_annotated(frame.timestamp),
            None => Err(AnalysisError::Transport("connection reset by peer".to_string())),
        }
    }
}

/// Progress sink keeping every event.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub sampled: Vec<(u8, usize)>,
    pub analyzed: Vec<(usize, usize)>,
    pub skipped: Vec<(usize, u64)>,
}

impl ProgressSink for RecordingProgress {
    fn on_sampled(&mut self, percent: u8, frames_so_far: usize) {
        self.sampled.push((percent, frames_so_far));
    }

    fn on_analyzed(&mut self, processed: usize, total: usize, _frame: &AnnotatedFrame) {
        self.analyzed.push((processed, total));
    }

    fn on_skipped(&mut self, index: usize, timestamp: u64, _cause: &AnalysisError) {
        self.skipped.push((index, timestamp));
    }
}
