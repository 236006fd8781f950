//! Provider credentials with secure memory.
//!
//! The API key lives in a `secrecy` box so it never shows up in logs, debug
//! output, or error messages.

use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::time::Duration;
use watercrawl_client::{WaterCrawlClient, DEFAULT_BASE_URL};

use crate::error::{DatasourceError, Result};

/// An API key held in a zeroizing box. Formats as `[REDACTED]`.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// Borrow the key for building a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self(SecretBox::new(Box::from(self.expose())))
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Credentials configured for the WaterCrawl provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    api_key: Option<SecretString>,
    #[serde(default)]
    base_url: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(SecretString::new(api_key)),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The API key, if one was configured and is not blank.
    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key
            .as_ref()
            .filter(|key| !key.expose().trim().is_empty())
    }

    /// Configured base URL, falling back to the hosted service.
    pub fn base_url(&self) -> &str {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_BASE_URL,
        }
    }

    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.api_key()
            .ok_or_else(|| DatasourceError::credential("api key is required"))
    }

    /// Build an API client from these credentials.
    pub fn client(&self, timeout: Option<Duration>) -> Result<WaterCrawlClient> {
        let api_key = self.require_api_key()?;
        let client = WaterCrawlClient::new(api_key.expose()).with_base_url(self.base_url());
        match timeout {
            Some(timeout) => client
                .with_timeout(timeout)
                .map_err(DatasourceError::crawl_failed),
            None => Ok(client),
        }
    }
}
