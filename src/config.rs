//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{AnalysisClient, AnthropicClient, HttpAnalysisClient};
use crate::error::{HighlightError, Result};
use crate::limits::RateLimitConfig;
use crate::sampler::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};
use crate::types::{AnalysisConfig, Model, VideoDomain};

/// Frame bounding box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Maximum frame width in pixels
    pub max_width: u32,

    /// Maximum frame height in pixels
    pub max_height: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }
}

/// Which transport scores frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringProvider {
    /// A scoring endpoint speaking the JSON wire format
    Endpoint,
    /// The vision provider, called directly
    #[default]
    Anthropic,
}

/// Scoring service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub provider: ScoringProvider,

    /// URL of the scoring endpoint
    pub endpoint: String,

    /// Base URL of the vision provider
    pub anthropic_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            provider: ScoringProvider::default(),
            endpoint: "http://localhost:3000/api/analyze".to_string(),
            anthropic_url: crate::analysis::anthropic::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ScoringConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Build the client for the configured provider.
    pub fn build_client(&self) -> Result<Arc<dyn AnalysisClient>> {
        Ok(match self.provider {
            ScoringProvider::Endpoint => {
                Arc::new(HttpAnalysisClient::new(self.endpoint.clone(), self.timeout())?)
            }
            ScoringProvider::Anthropic => Arc::new(AnthropicClient::with_base_url(
                self.anthropic_url.clone(),
                self.timeout(),
            )?),
        })
    }
}

/// Scoring endpoint server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Defaults for run settings not given on the command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDefaults {
    pub model: Model,
    pub video_type: VideoDomain,
    /// Seconds between sampled frames
    pub interval: u64,
    pub min_score: u8,
    /// 0 for unbounded
    pub max_frames: usize,
    pub frame_quality: f32,
}

impl Default for RunDefaults {
    fn default() -> Self {
        let base = AnalysisConfig::default();
        Self {
            model: base.model,
            video_type: base.domain,
            interval: base.interval,
            min_score: base.min_score,
            max_frames: base.max_frames,
            frame_quality: base.frame_quality,
        }
    }
}

impl RunDefaults {
    pub fn to_analysis_config(&self, api_key: impl Into<String>) -> AnalysisConfig {
        AnalysisConfig {
            api_key: api_key.into(),
            model: self.model,
            domain: self.video_type,
            interval: self.interval,
            min_score: self.min_score,
            max_frames: self.max_frames,
            frame_quality: self.frame_quality,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    pub sampler: SamplerConfig,
    pub rate_limit: RateLimitConfig,
    pub scoring: ScoringConfig,
    pub server: ServerConfig,
    pub defaults: RunDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            sampler: SamplerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            scoring: ScoringConfig::default(),
            server: ServerConfig::default(),
            defaults: RunDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| HighlightError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| HighlightError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
