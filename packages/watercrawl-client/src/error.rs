//! Error types for the WaterCrawl client.

use thiserror::Error;

/// Result type for WaterCrawl client operations.
pub type Result<T> = std::result::Result<T, WaterCrawlError>;

/// WaterCrawl client errors.
#[derive(Debug, Error)]
pub enum WaterCrawlError {
    /// Configuration error (invalid base URL, client could not be built)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection refused or reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Response body ended or broke mid-stream
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// API error (non-2xx response)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WaterCrawlError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::StreamInterrupted(_)
        )
    }

    /// HTTP status for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify a reqwest error raised while sending a request.
    pub(crate) fn from_request(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::StreamInterrupted(e.to_string())
        } else if e.is_builder() {
            Self::Config(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }

    /// Classify a reqwest error raised while reading a streamed body.
    pub(crate) fn from_stream(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::StreamInterrupted(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(WaterCrawlError::Network("reset".into()).is_transient());
        assert!(WaterCrawlError::Timeout("slow".into()).is_transient());
        assert!(WaterCrawlError::StreamInterrupted("eof".into()).is_transient());
        assert!(!WaterCrawlError::Parse("bad".into()).is_transient());
        assert!(!WaterCrawlError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_transient());
    }

    #[test]
    fn test_status_only_for_api_errors() {
        let err = WaterCrawlError::Api {
            status: 401,
            message: "unauthorized".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(WaterCrawlError::Network("x".into()).status(), None);
    }
}
