//! Typed errors surfaced to the host.
//!
//! Transient network failures never reach this type: the monitoring loop
//! retries them and then finalizes best-effort.

use std::fmt::Display;

use thiserror::Error;

/// Errors a crawl or credential check can end with.
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// Missing or malformed input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Credentials were rejected or are missing; the host should ask for new ones.
    #[error("{0}")]
    Credential(String),

    /// Any other failure, with the original message preserved.
    #[error("Failed to crawl website {0}")]
    CrawlFailed(String),
}

impl DatasourceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential(message.into())
    }

    pub fn crawl_failed(source: impl Display) -> Self {
        Self::CrawlFailed(source.to_string())
    }

    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Credential(_))
    }
}

/// Result type alias for datasource operations.
pub type Result<T> = std::result::Result<T, DatasourceError>;
