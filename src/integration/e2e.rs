//! End-to-end runs: sample, score, rank

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use crate::analysis::AnalysisClient;
    use crate::cancel::CancellationToken;
    use crate::error::HighlightError;
    use crate::integration::fixtures::{FakeDecoder, RecordingProgress, ScriptedClient};
    use crate::limits::RateLimitConfig;
    use crate::pipeline::Pipeline;
    use crate::sampler::VideoSource;
    use crate::types::AnalysisConfig;

    fn source() -> VideoSource {
        VideoSource::Bytes(Bytes::from_static(b"synthetic clip"))
    }

    fn config(min_score: u8, max_frames: usize) -> AnalysisConfig {
        AnalysisConfig {
            api_key: "sk-test".to_string(),
            interval: 5,
            min_score,
            max_frames,
            ..Default::default()
        }
    }

    fn pipeline(client: &Arc<ScriptedClient>) -> Pipeline {
        let client: Arc<dyn AnalysisClient> = client.clone();
        Pipeline::new(client).with_rate_limit(RateLimitConfig::None)
    }

    #[tokio::test]
    async fn test_twelve_second_clip_samples_three_frames() {
        let (decoder, log) = FakeDecoder::new(12, 1280, 720);
        let client = Arc::new(ScriptedClient::scores(&[Some(5), Some(5), Some(5)]));
        let mut progress = RecordingProgress::default();

        let summary = pipeline(&client)
            .analyze(source(), decoder, &config(0, 0), &mut progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(log.seeks(), vec![0, 5, 10]);
        assert!(log.closed());
        assert_eq!(client.calls(), vec![0, 5, 10]);
        assert_eq!(summary.sampled, 3);
        assert_eq!(progress.sampled, vec![(0, 1), (41, 2), (83, 3)]);
        assert_eq!(progress.analyzed, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_min_score_filters_and_ranks() {
        let (decoder, _log) = FakeDecoder::new(20, 640, 360);
        let client = Arc::new(ScriptedClient::scores(&[Some(9), Some(4), Some(8), Some(7)]));

        let summary = pipeline(&client)
            .analyze(
                source(),
                decoder,
                &config(7, 0),
                &mut RecordingProgress::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let scores: Vec<u8> = summary.results.moments().iter().map(|m| m.score).collect();
        assert_eq!(scores, vec![9, 8, 7]);
        let timestamps: Vec<u64> = summary.results.moments().iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![0, 10, 15]);
        assert_eq!(summary.skipped, 0);
    }

    #[tokio::test]
    async fn test_max_frames_caps_sampling() {
        let (decoder, log) = FakeDecoder::new(50, 640, 360);
        let client = Arc::new(ScriptedClient::scores(&[Some(8); 10]));

        let summary = pipeline(&client)
            .analyze(
                source(),
                decoder,
                &config(0, 2),
                &mut RecordingProgress::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(log.seeks(), vec![0, 5]);
        assert_eq!(summary.sampled, 2);
        assert_eq!(client.calls(), vec![0, 5]);
    }

    #[tokio::test]
    async fn test_one_failed_frame_is_skipped_and_counted() {
        let (decoder, _log) = FakeDecoder::new(15, 640, 360);
        let client = Arc::new(ScriptedClient::scores(&[Some(9), None, Some(8)]));
        let mut progress = RecordingProgress::default();

        let summary = pipeline(&client)
            .analyze(source(), decoder, &config(0, 0), &mut progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.results.len(), 2);
        let timestamps: Vec<u64> = summary.results.moments().iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![0, 10]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!((summary.failures[0].0, summary.failures[0].1), (1, 5));
        assert_eq!(progress.skipped, vec![(1, 5)]);
    }

    #[tokio::test]
    async fn test_empty_api_key_fails_before_sampling() {
        let (decoder, log) = FakeDecoder::new(30, 640, 360);
        let client = Arc::new(ScriptedClient::scores(&[Some(9); 6]));
        let config = AnalysisConfig {
            api_key: String::new(),
            ..config(7, 0)
        };

        let err = pipeline(&client)
            .analyze(
                source(),
                decoder,
                &config,
                &mut RecordingProgress::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(!log.opened());
        assert!(log.seeks().is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_source_aborts_run() {
        let (decoder, log) = FakeDecoder::failing_open();
        let client = Arc::new(ScriptedClient::scores(&[Some(9)]));

        let err = pipeline(&client)
            .analyze(
                source(),
                decoder,
                &config(7, 0),
                &mut RecordingProgress::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(err.is_media_load());
        assert!(log.closed());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_scoring_keeps_partial_results() {
        let (decoder, _log) = FakeDecoder::new(30, 640, 360);
        let cancel = CancellationToken::new();
        let client = Arc::new(ScriptedClient::scores(&[Some(9); 6]).cancel_after(3, cancel.clone()));

        let summary = pipeline(&client)
            .analyze(
                source(),
                decoder,
                &config(0, 0),
                &mut RecordingProgress::default(),
                &cancel,
            )
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.sampled, 6);
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.results.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start_returns_empty() {
        let (decoder, log) = FakeDecoder::new(30, 640, 360);
        let client = Arc::new(ScriptedClient::scores(&[Some(9); 6]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = pipeline(&client)
            .analyze(
                source(),
                decoder,
                &config(0, 0),
                &mut RecordingProgress::default(),
                &cancel,
            )
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert!(summary.results.is_empty());
        assert!(log.seeks().is_empty());
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_run_settings_fail_before_sampling() {
        let client = Arc::new(ScriptedClient::scores(&[Some(9); 6]));
        let client_dyn: Arc<dyn AnalysisClient> = client.clone();

        let stalled =
            Pipeline::new(client_dyn.clone()).with_rate_limit(RateLimitConfig::TokenBucket {
                requests_per_second: 0.0,
                burst_size: 1,
            });
        let flat = Pipeline::new(client_dyn)
            .with_rate_limit(RateLimitConfig::None)
            .with_bounds(640, 0);

        for pipeline in [stalled, flat] {
            let (decoder, log) = FakeDecoder::new(30, 640, 360);
            let err = pipeline
                .analyze(
                    source(),
                    decoder,
                    &config(7, 0),
                    &mut RecordingProgress::default(),
                    &CancellationToken::new(),
                )
                .await
                .unwrap_err();

            assert!(matches!(err, HighlightError::Config(_)));
            assert!(!log.opened());
        }
        assert!(client.calls().is_empty());
    }
}
