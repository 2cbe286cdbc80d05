//! Data types shared by every stage of a run.
//!
//! `VideoHandle` and `Frame` live for one run only. `AnnotatedFrame` is what the
//! scoring service says about one frame; it is immutable once built.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, Result};

/// Highest score the scoring service may return.
pub const MAX_SCORE: u8 = 10;

/// Metadata of an opened video, produced once by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoHandle {
    /// Duration in whole seconds (fractional part dropped)
    pub duration_secs: u64,
    /// Width of the video in pixels
    pub width: u32,
    /// Height of the video in pixels
    pub height: u32,
    /// Size of the byte source
    pub byte_size: u64,
}

impl VideoHandle {
    /// Duration formatted as `m:ss`.
    pub fn duration_label(&self) -> String {
        format_timestamp(self.duration_secs)
    }

    /// Byte size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.byte_size as f64 / 1024.0 / 1024.0
    }
}

/// Compression format of a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    /// MIME type sent to the scoring service
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A compressed still image.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub data: Bytes,
    pub format: ImageFormat,
    /// Compression quality in (0, 1]
    pub quality: f32,
    pub width: u32,
    pub height: u32,
}

/// One sampled, resized and compressed image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Sampling instant in whole seconds
    pub timestamp: u64,
    /// 0-based position in sampling order
    pub index: usize,
    pub image: EncodedImage,
}

/// Model tiers offered by the scoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Fast and cheap
    #[default]
    Fast,
    Balanced,
    /// Most accurate, most expensive
    Best,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::Fast, Model::Balanced, Model::Best];

    /// Identifier sent on the wire as `model`.
    pub fn id(&self) -> &'static str {
        match self {
            Model::Fast => "claude-haiku-4-20250514",
            Model::Balanced => "claude-sonnet-4-20250514",
            Model::Best => "claude-opus-4-20250514",
        }
    }

    /// Estimated cost of scoring one frame, in euros.
    pub fn per_frame_cost(&self) -> f64 {
        match self {
            Model::Fast => 0.0008,
            Model::Balanced => 0.003,
            Model::Best => 0.015,
        }
    }

    /// Resolve a tier from its short name or its wire id.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|m| {
            value == m.name() || value == m.id() || value.contains(m.family())
        })
    }

    /// Short name used in configuration and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Model::Fast => "fast",
            Model::Balanced => "balanced",
            Model::Best => "best",
        }
    }

    fn family(&self) -> &'static str {
        match self {
            Model::Fast => "haiku",
            Model::Balanced => "sonnet",
            Model::Best => "opus",
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of footage; biases how the scoring service reads a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoDomain {
    #[default]
    Gaming,
    Sport,
    Action,
}

impl VideoDomain {
    /// Identifier sent on the wire as `video_type`.
    pub fn id(&self) -> &'static str {
        match self {
            VideoDomain::Gaming => "gaming",
            VideoDomain::Sport => "sport",
            VideoDomain::Action => "action",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gaming" => Some(VideoDomain::Gaming),
            "sport" => Some(VideoDomain::Sport),
            "action" => Some(VideoDomain::Action),
            _ => None,
        }
    }
}

impl std::fmt::Display for VideoDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Settings of one analysis run. Passed by value into the pipeline and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub api_key: String,
    pub model: Model,
    pub domain: VideoDomain,
    /// Seconds between two sampled timestamps
    pub interval: u64,
    /// Inclusive lower bound for the result set
    pub min_score: u8,
    /// Cap on sampled frames, 0 for unbounded
    pub max_frames: usize,
    /// JPEG quality in (0, 1]
    pub frame_quality: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: Model::Fast,
            domain: VideoDomain::Gaming,
            interval: 5,
            min_score: 7,
            max_frames: 50,
            frame_quality: 0.8,
        }
    }
}

impl AnalysisConfig {
    /// Check every field before any decode or network work starts.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(HighlightError::Validation("API key is required".to_string()));
        }
        if self.interval == 0 {
            return Err(HighlightError::Validation(
                "sampling interval must be greater than zero".to_string(),
            ));
        }
        if self.min_score > MAX_SCORE {
            return Err(HighlightError::Validation(format!(
                "minimum score must be between 0 and {}, got {}",
                MAX_SCORE, self.min_score
            )));
        }
        if !(self.frame_quality > 0.0 && self.frame_quality <= 1.0) {
            return Err(HighlightError::Validation(format!(
                "frame quality must be in (0, 1], got {}",
                self.frame_quality
            )));
        }
        Ok(())
    }
}

/// A frame's timestamp together with the verdict of the scoring service.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedFrame {
    pub timestamp: u64,
    pub score: u8,
    pub description: String,
    /// Provider payload, kept for diagnostics only
    pub raw: Option<serde_json::Value>,
}

impl AnnotatedFrame {
    /// Timestamp formatted as `m:ss`.
    pub fn timestamp_label(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Format whole seconds as `m:ss`.
pub fn format_timestamp(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
