//! HTTP request handlers
//!
//! Implements the scoring endpoint and the service endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::analysis::{validate_score, ErrorReply, ScoreReply, ScoreRequest};
use crate::error::AnalysisError;
use crate::state::AppState;

/// HTTP error type
#[derive(Debug)]
pub enum HttpError {
    BadRequest(String),
    Analysis(AnalysisError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            HttpError::Analysis(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        (status, Json(ErrorReply { error })).into_response()
    }
}

impl From<AnalysisError> for HttpError {
    fn from(err: AnalysisError) -> Self {
        HttpError::Analysis(err)
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> String {
    format!(
        "highlight-finder v{} ({})",
        env!("CARGO_PKG_VERSION"),
        crate::ffmpeg::version_info()
    )
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub scored: u64,
    pub failed: u64,
}

/// Counters endpoint
/// GET /stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<Stats> {
    let (scored, failed) = state.counters();
    Json(Stats { scored, failed })
}

/// Scoring endpoint
/// POST /api/analyze
pub async fn analyze_frame(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<ScoreReply>, HttpError> {
    let Json(request) = payload.map_err(|e| HttpError::BadRequest(e.body_text()))?;

    if request.frame.is_empty() || request.api_key.trim().is_empty() {
        return Err(HttpError::BadRequest(
            "frame and api_key are required".to_string(),
        ));
    }

    let reply = state
        .scorer
        .score(&request)
        .await
        .and_then(|reply| validate_score(reply.score).map(|_| reply));

    match reply {
        Ok(reply) => {
            state.record_scored();
            tracing::debug!(
                model = %request.model,
                video_type = %request.video_type,
                "Scored frame: {}/10",
                reply.score
            );
            Ok(Json(reply))
        }
        Err(e) => {
            state.record_failed();
            tracing::warn!(model = %request.model, "Scoring failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_status() {
        let response = HttpError::BadRequest("missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_analysis_error_status() {
        let response =
            HttpError::from(AnalysisError::Transport("timed out".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
