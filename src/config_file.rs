//! Configuration file support
//!
//! Loads application configuration from TOML files. Every section and key is
//! optional; whatever is missing takes its default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{
    AppConfig, RunDefaults, SamplerConfig, ScoringConfig, ScoringProvider, ServerConfig,
};
use crate::error::{HighlightError, Result};
use crate::limits::{RateLimitConfig, DEFAULT_DELAY};
use crate::types::{Model, VideoDomain};

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Frame bounding box
    pub sampler: Option<SamplerSettings>,
    /// Pacing of scoring calls
    pub rate_limit: Option<RateLimitSettings>,
    /// Scoring service
    pub scoring: Option<ScoringSettings>,
    /// Scoring endpoint server
    pub server: Option<ServerSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Run defaults
    pub defaults: Option<DefaultsSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Maximum frame width in pixels
    pub max_width: Option<u32>,
    /// Maximum frame height in pixels
    pub max_height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// fixed, token_bucket or none
    pub mode: Option<String>,
    /// Pause between calls in fixed mode
    pub delay_ms: Option<u64>,
    /// Sustained rate in token_bucket mode
    pub requests_per_second: Option<f64>,
    /// Burst size in token_bucket mode
    pub burst_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringSettings {
    /// endpoint or anthropic
    pub provider: Option<ScoringProvider>,
    /// URL of the scoring endpoint
    pub endpoint: Option<String>,
    /// Base URL of the vision provider
    pub anthropic_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsSettings {
    /// fast, balanced or best
    pub model: Option<Model>,
    /// gaming, sport or action
    pub video_type: Option<VideoDomain>,
    pub interval: Option<u64>,
    pub min_score: Option<u8>,
    pub max_frames: Option<usize>,
    pub frame_quality: Option<f32>,
}

impl SamplerSettings {
    /// Zero bounds would leave nothing to encode; they fall back to `base`
    /// with a warning.
    fn into_config(self, base: SamplerConfig) -> SamplerConfig {
        let max_width = self.max_width.unwrap_or(base.max_width);
        let max_height = self.max_height.unwrap_or(base.max_height);
        if max_width == 0 || max_height == 0 {
            tracing::warn!(
                "frame bounds {}x{} must be non-zero; using {}x{}",
                max_width,
                max_height,
                base.max_width,
                base.max_height
            );
            return base;
        }
        SamplerConfig {
            max_width,
            max_height,
        }
    }
}

impl RateLimitSettings {
    fn into_config(self) -> Result<RateLimitConfig> {
        let mode = self.mode.unwrap_or_else(|| "fixed".to_string());
        match mode.as_str() {
            "fixed" => Ok(RateLimitConfig::Fixed {
                delay_ms: self
                    .delay_ms
                    .unwrap_or(DEFAULT_DELAY.as_millis() as u64),
            }),
            "token_bucket" => {
                let config = RateLimitConfig::TokenBucket {
                    requests_per_second: self.requests_per_second.unwrap_or(2.0),
                    burst_size: self.burst_size.unwrap_or(1),
                };
                config.validate()?;
                Ok(config)
            }
            "none" => Ok(RateLimitConfig::None),
            other => Err(HighlightError::Config(format!(
                "unknown rate limit mode: {}",
                other
            ))),
        }
    }
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile =
            toml::from_str(&content).map_err(|e| HighlightError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| HighlightError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Load `path` if given; a missing file yields the defaults, and so does
    /// an unreadable one after a warning.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => {
                tracing::debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring config file {}: {}; using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        let app = AppConfig::default();
        Self {
            sampler: Some(SamplerSettings {
                max_width: Some(app.sampler.max_width),
                max_height: Some(app.sampler.max_height),
            }),
            rate_limit: Some(RateLimitSettings {
                mode: Some("fixed".to_string()),
                delay_ms: Some(DEFAULT_DELAY.as_millis() as u64),
                requests_per_second: None,
                burst_size: None,
            }),
            scoring: Some(ScoringSettings {
                provider: Some(app.scoring.provider),
                endpoint: Some(app.scoring.endpoint),
                anthropic_url: Some(app.scoring.anthropic_url),
                request_timeout_secs: Some(app.scoring.request_timeout_secs),
            }),
            server: Some(ServerSettings {
                host: Some(app.server.host),
                port: Some(app.server.port),
                cors_enabled: Some(app.server.cors_enabled),
            }),
            logging: Some(LoggingSettings {
                level: app.log_level,
                format: Some(app.log_format),
            }),
            defaults: Some(DefaultsSettings {
                model: Some(app.defaults.model),
                video_type: Some(app.defaults.video_type),
                interval: Some(app.defaults.interval),
                min_score: Some(app.defaults.min_score),
                max_frames: Some(app.defaults.max_frames),
                frame_quality: Some(app.defaults.frame_quality),
            }),
        }
    }

    /// Convert to AppConfig. An unknown rate limit mode falls back to the
    /// default policy with a warning.
    pub fn into_app_config(self) -> AppConfig {
        let base = AppConfig::default();

        let sampler = self.sampler.unwrap_or_default();
        let scoring = self.scoring.unwrap_or_default();
        let server = self.server.unwrap_or_default();
        let defaults = self.defaults.unwrap_or_default();

        let rate_limit = match self.rate_limit.map(RateLimitSettings::into_config) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                tracing::warn!("{}; using the default rate limit", e);
                base.rate_limit
            }
            None => base.rate_limit,
        };

        AppConfig {
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(base.log_level),
            log_format: self
                .logging
                .and_then(|l| l.format)
                .unwrap_or(base.log_format),
            sampler: sampler.into_config(base.sampler),
            rate_limit,
            scoring: ScoringConfig {
                provider: scoring.provider.unwrap_or(base.scoring.provider),
                endpoint: scoring.endpoint.unwrap_or(base.scoring.endpoint),
                anthropic_url: scoring.anthropic_url.unwrap_or(base.scoring.anthropic_url),
                request_timeout_secs: scoring
                    .request_timeout_secs
                    .unwrap_or(base.scoring.request_timeout_secs),
            },
            server: ServerConfig {
                host: server.host.unwrap_or(base.server.host),
                port: server.port.unwrap_or(base.server.port),
                cors_enabled: server.cors_enabled.unwrap_or(base.server.cors_enabled),
            },
            defaults: RunDefaults {
                model: defaults.model.unwrap_or(base.defaults.model),
                video_type: defaults.video_type.unwrap_or(base.defaults.video_type),
                interval: defaults.interval.unwrap_or(base.defaults.interval),
                min_score: defaults.min_score.unwrap_or(base.defaults.min_score),
                max_frames: defaults.max_frames.unwrap_or(base.defaults.max_frames),
                frame_quality: defaults.frame_quality.unwrap_or(base.defaults.frame_quality),
            },
        }
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
