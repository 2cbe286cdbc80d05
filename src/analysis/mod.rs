//! Scoring service boundary.
//!
//! [`AnalysisClient`] is the only thing the orchestrator knows about the
//! service. Two transports implement it:
//! - [`http::HttpAnalysisClient`] posts the wire request to a scoring endpoint
//! - [`anthropic::AnthropicClient`] talks to the vision provider directly
//!
//! The wire types below are shared by both clients and by the `serve` endpoint.

pub mod anthropic;
pub mod http;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::types::{AnalysisConfig, AnnotatedFrame, Frame, Model, VideoDomain, MAX_SCORE};

pub use anthropic::AnthropicClient;
pub use http::HttpAnalysisClient;

/// Scores one frame. Implementations must be stateless per call.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(
        &self,
        frame: &Frame,
        config: &AnalysisConfig,
    ) -> Result<AnnotatedFrame, AnalysisError>;
}

#[async_trait]
impl<T: AnalysisClient + ?Sized> AnalysisClient for std::sync::Arc<T> {
    async fn analyze(
        &self,
        frame: &Frame,
        config: &AnalysisConfig,
    ) -> Result<AnnotatedFrame, AnalysisError> {
        (**self).analyze(frame, config).await
    }
}

/// Answers a wire request. This is what sits behind the scoring endpoint.
#[async_trait]
pub trait VisionScorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreReply, AnalysisError>;
}

fn default_model() -> String {
    Model::default().id().to_string()
}

fn default_video_type() -> String {
    VideoDomain::default().id().to_string()
}

/// Request body of a scoring call.
///
/// The timestamp never travels: the caller re-attaches it from the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Base64 of the compressed image
    #[serde(default)]
    pub frame: String,
    #[serde(default)]
    pub api_key: String,
    /// Provider model id
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_video_type")]
    pub video_type: String,
}

impl ScoreRequest {
    pub fn from_frame(frame: &Frame, config: &AnalysisConfig) -> Self {
        Self {
            frame: BASE64.encode(&frame.image.data),
            api_key: config.api_key.clone(),
            model: config.model.id().to_string(),
            video_type: config.domain.id().to_string(),
        }
    }

    /// Domain named in the request; unknown values fall back to the default domain.
    pub fn domain(&self) -> VideoDomain {
        VideoDomain::parse(&self.video_type).unwrap_or_default()
    }
}

/// Successful response body of a scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReply {
    pub score: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl ScoreReply {
    /// Check the score range and attach the frame's timestamp.
    pub fn into_annotated(self, timestamp: u64) -> Result<AnnotatedFrame, AnalysisError> {
        Ok(AnnotatedFrame {
            timestamp,
            score: validate_score(self.score)?,
            description: self.description,
            raw: self.raw,
        })
    }
}

/// Error response body of a scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Scores outside `0..=10` break the provider contract and are rejected.
pub fn validate_score(score: i64) -> Result<u8, AnalysisError> {
    if (0..=MAX_SCORE as i64).contains(&score) {
        Ok(score as u8)
    } else {
        Err(AnalysisError::ScoreOutOfRange(score))
    }
}
