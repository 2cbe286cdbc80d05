//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{analyze_frame, health_check, stats, version_check};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors_enabled = state.config.cors_enabled;

    let router = Router::new()
        .route("/api/analyze", post(analyze_frame))
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        // Browser front-ends post frames from another origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ScoreReply, ScoreRequest, VisionScorer};
    use crate::config::ServerConfig;
    use crate::error::AnalysisError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    /// Scores by video type; the key "bad-key" is rejected like a provider would.
    struct StubScorer {
        score: i64,
    }

    #[async_trait]
    impl VisionScorer for StubScorer {
        async fn score(&self, request: &ScoreRequest) -> Result<ScoreReply, AnalysisError> {
            if request.api_key == "bad-key" {
                return Err(AnalysisError::provider("invalid x-api-key"));
            }
            Ok(ScoreReply {
                score: self.score,
                description: format!("{} moment", request.video_type),
                raw: Some(serde_json::json!(format!("Score: {}/10", self.score))),
            })
        }
    }

    fn app_with(score: i64, config: ServerConfig) -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(Arc::new(StubScorer { score }), config));
        (create_router(state.clone()), state)
    }

    fn app(score: i64) -> Router {
        app_with(score, ServerConfig::default()).0
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_success() {
        let response = app(8)
            .oneshot(post_json(
                r#"{"frame":"/9j/","api_key":"sk-test","model":"claude-haiku-4-20250514","video_type":"sport"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["score"], 8);
        assert_eq!(body["description"], "sport moment");
        assert_eq!(body["raw"], "Score: 8/10");
    }

    #[tokio::test]
    async fn test_missing_frame_or_key_is_bad_request() {
        for body in [r#"{"api_key":"sk-test"}"#, r#"{"frame":"/9j/"}"#, r#"{"frame":"/9j/","api_key":""}"#] {
            let response = app(8).oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(json_body(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let response = app(8).oneshot(post_json("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_provider_failure_is_server_error() {
        let (router, state) = app_with(8, ServerConfig::default());
        let response = router
            .oneshot(post_json(r#"{"frame":"/9j/","api_key":"bad-key"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "invalid x-api-key");
        assert_eq!(state.counters(), (0, 1));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_server_error() {
        let response = app(11)
            .oneshot(post_json(r#"{"frame":"/9j/","api_key":"sk-test"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(5)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_options() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/analyze")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app(5).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("POST"));
    }

    #[tokio::test]
    async fn test_cors_disabled() {
        let config = ServerConfig {
            cors_enabled: false,
            ..Default::default()
        };
        let (router, _) = app_with(5, config);
        let request = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }
}
