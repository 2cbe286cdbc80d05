//! Direct client for the Anthropic Messages API.
//!
//! Each frame goes out as a base64 JPEG block followed by a domain prompt that
//! asks for a `Score: X/10` line and a `Description:` line. The reply text is
//! parsed back into a score and a description; the full text is kept as the
//! raw payload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AnalysisClient, ScoreReply, ScoreRequest, VisionScorer};
use crate::error::{AnalysisError, HighlightError, Result};
use crate::types::{AnalysisConfig, AnnotatedFrame, Frame, ImageFormat, VideoDomain};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

// helper.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}

const REPLY_FORMAT: &str = "Answer EXACTLY in this format:
Score: X/10
Description: [your description in 1-2 sentences]";

/// Prompt sent along with a frame of the given kind of footage.
pub fn prompt_for(domain: VideoDomain) -> String {
    let body = match domain {
        VideoDomain::Gaming => {
            "You are analyzing a gaming video.
Rate how interesting this moment is out of 10, looking for:
- Impressive kills
- Epic comebacks
- Technical plays
- Funny moments"
        }
        VideoDomain::Sport => {
            "You are analyzing a sports video.
Rate how interesting this moment is out of 10, looking for:
- Spectacular actions
- Goals or points
- Technical feats
- Decisive moments"
        }
        VideoDomain::Action => {
            "You are analyzing an action video.
Rate how interesting this moment is out of 10, looking for:
- Dynamic scenes
- Moments of suspense
- Impactful actions"
        }
    };
    format!("{}\n\n{}", body, REPLY_FORMAT)
}

/// Pull the score and description out of the model's reply.
///
/// The score is the integer on the first `Score:` line, before any `/`. The
/// description is everything after `Description:`, or the whole reply when
/// that marker is missing.
pub fn parse_analysis_text(text: &str) -> std::result::Result<(i64, String), AnalysisError> {
    let score = regex!(r"Score:\s*(-?\d+)")
        .captures(text)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .ok_or_else(|| AnalysisError::Malformed(format!("no score in reply: {:?}", text)))?;

    let description = match text.split_once("Description:") {
        Some((_, rest)) => rest.trim().to_string(),
        None => text.trim().to_string(),
    };

    Ok((score, description))
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: String },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Vision provider client. The API key travels with each request.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HighlightError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Ask the model about one base64 image and return its reply text.
    async fn complete(
        &self,
        request: &ScoreRequest,
        domain: VideoDomain,
    ) -> std::result::Result<String, AnalysisError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: ImageFormat::Jpeg.mime_type(),
                            data: &request.frame,
                        },
                    },
                    ContentBlock::Text {
                        text: prompt_for(domain),
                    },
                ],
            }],
        };

        tracing::debug!(model = %request.model, video_type = %domain, "Sending frame to vision provider");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &request.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(err) if !err.error.message.trim().is_empty() => {
                    Err(AnalysisError::provider(err.error.message))
                }
                _ => Err(AnalysisError::Rejected {
                    status: status.as_u16(),
                }),
            };
        }

        let reply: MessagesResponse = response.json().await?;
        reply
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| AnalysisError::Malformed("reply has no text block".to_string()))
    }
}

#[async_trait]
impl VisionScorer for AnthropicClient {
    async fn score(&self, request: &ScoreRequest) -> std::result::Result<ScoreReply, AnalysisError> {
        let text = self.complete(request, request.domain()).await?;
        let (score, description) = parse_analysis_text(&text)?;
        Ok(ScoreReply {
            score,
            description,
            raw: Some(serde_json::Value::String(text)),
        })
    }
}

#[async_trait]
impl AnalysisClient for AnthropicClient {
    async fn analyze(
        &self,
        frame: &Frame,
        config: &AnalysisConfig,
    ) -> std::result::Result<AnnotatedFrame, AnalysisError> {
        let request = ScoreRequest::from_frame(frame, config);
        self.score(&request).await?.into_annotated(frame.timestamp)
    }
}
