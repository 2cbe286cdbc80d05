use thiserror::Error;

/// Main error type for an analysis run
#[derive(Error, Debug)]
pub enum HighlightError {
    /// Input rejected before any decode or network work
    #[error("Validation error: {0}")]
    Validation(String),

    /// The byte source could not be decoded
    #[error("Media load error: {0}")]
    MediaLoad(#[from] MediaError),

    /// Configuration file or option error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking worker task panicked or was aborted
    #[error("Task error: {0}")]
    Task(String),
}

impl HighlightError {
    /// Fatal errors abort the run and leave no partial result.
    pub fn is_validation(&self) -> bool {
        matches!(self, HighlightError::Validation(_))
    }

    pub fn is_media_load(&self) -> bool {
        matches!(self, HighlightError::MediaLoad(_))
    }
}

/// Decoder errors. Every variant aborts sampling for the whole run.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening the byte source
    #[error("Failed to open input: {0}")]
    OpenInput(String),

    /// Failure locating stream information within the source
    #[error("Failed to find stream info: {0}")]
    FindStreamInfo(String),

    /// The source does not contain a video stream
    #[error("No video stream found in source")]
    NoVideoStream,

    /// Failure instantiating a decoder
    #[error("Failed to create decoder: {0}")]
    DecoderCreate(String),

    /// Failure seeking to a timestamp
    #[error("Failed to seek to {timestamp}s: {reason}")]
    Seek { timestamp: u64, reason: String },

    /// Failure decoding a single packet into a frame
    #[error("Failed to decode packet: {0}")]
    DecodePacket(String),

    /// No picture could be rendered at the requested timestamp
    #[error("No frame available at {0}s")]
    NoFrameAt(u64),

    /// Failure converting a decoded picture to RGB
    #[error("Failed to scale frame: {0}")]
    Scale(String),

    /// Failure compressing a rendered image
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// The decoder was used after it was closed or before it was opened
    #[error("Decoder is not open")]
    NotOpen,
}

impl From<ffmpeg_next::Error> for MediaError {
    fn from(err: ffmpeg_next::Error) -> Self {
        MediaError::DecodePacket(err.to_string())
    }
}

/// Failure of one call to the scoring service. Recoverable per frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The request never got a response
    #[error("{0}")]
    Transport(String),

    /// The provider answered with an error message
    #[error("{0}")]
    Provider(String),

    /// The provider answered with a non-success status and no usable message
    #[error("analysis failed (HTTP {status})")]
    Rejected { status: u16 },

    /// The response could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The provider returned a score outside 0..=10
    #[error("score {0} is outside the range 0-10")]
    ScoreOutOfRange(i64),
}

impl AnalysisError {
    /// Generic cause used when the provider gives no message.
    pub const FALLBACK: &'static str = "analysis failed";

    /// Build a provider error, falling back to a generic cause for empty messages.
    pub fn provider(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            AnalysisError::Provider(Self::FALLBACK.to_string())
        } else {
            AnalysisError::Provider(message)
        }
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalysisError::Malformed(err.to_string())
        } else {
            AnalysisError::Transport(err.to_string())
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HighlightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_fallback() {
        assert_eq!(
            AnalysisError::provider("").to_string(),
            AnalysisError::FALLBACK
        );
        assert_eq!(
            AnalysisError::provider("invalid x-api-key").to_string(),
            "invalid x-api-key"
        );
    }

    #[test]
    fn test_media_error_is_fatal_kind() {
        let err: HighlightError = MediaError::NoVideoStream.into();
        assert!(err.is_media_load());
        assert!(!err.is_validation());
        assert_eq!(
            err.to_string(),
            "Media load error: No video stream found in source"
        );
    }
}
