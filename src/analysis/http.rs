//! Client for a remote scoring endpoint speaking the JSON wire format.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{AnalysisClient, ErrorReply, ScoreReply, ScoreRequest};
use crate::error::{AnalysisError, HighlightError, Result};
use crate::types::{AnalysisConfig, AnnotatedFrame, Frame};

/// Posts every frame to `endpoint` (e.g. `http://localhost:3000/api/analyze`).
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: String,
}

impl HttpAnalysisClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HighlightError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one wire request and decode the reply.
    pub async fn send(&self, request: &ScoreRequest) -> std::result::Result<ScoreReply, AnalysisError> {
        let response = self.client.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<ScoreReply>().await?);
        }

        // Error bodies are best-effort: prefer the provider's message
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorReply>(&body) {
            Ok(reply) if !reply.error.trim().is_empty() => Err(AnalysisError::provider(reply.error)),
            _ => Err(AnalysisError::Rejected {
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(
        &self,
        frame: &Frame,
        config: &AnalysisConfig,
    ) -> std::result::Result<AnnotatedFrame, AnalysisError> {
        let request = ScoreRequest::from_frame(frame, config);
        tracing::debug!(
            "Scoring frame {} at {}s via {}",
            frame.index,
            frame.timestamp,
            self.endpoint
        );
        self.send(&request).await?.into_annotated(frame.timestamp)
    }
}
