use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::credentials::Credentials;

/// How the reported total evolves during a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalPolicy {
    /// Keep the page limit echoed by the service.
    #[default]
    Fixed,
    /// Raise the total as documents are counted or received.
    Live,
}

/// What the final record carries when the results listing cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationFailurePolicy {
    /// Complete with an empty result list.
    #[default]
    Empty,
    /// Complete with the pages already seen on the event stream.
    StreamedResults,
}

/// Tuning for the crawl monitoring loop.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Consecutive transient failures tolerated before monitoring stops.
    pub max_consecutive_failures: u32,
    /// Backoff unit; the n-th consecutive failure waits `n * backoff_base`.
    pub backoff_base: Duration,
    pub results_page_size: u32,
    /// Ask the service to inline page content in events and results.
    pub prefetched: bool,
    /// Whether intermediate records carry the pages received so far.
    pub report_partial_results: bool,
    pub total_policy: TotalPolicy,
    pub pagination_failure_policy: PaginationFailurePolicy,
    /// HTTP timeout for client calls; `None` keeps reqwest's default.
    pub http_timeout: Option<Duration>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            backoff_base: Duration::from_secs(2),
            results_page_size: 100,
            prefetched: true,
            report_partial_results: true,
            total_policy: TotalPolicy::Fixed,
            pagination_failure_policy: PaginationFailurePolicy::Empty,
            http_timeout: None,
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures.max(1);
        self
    }

    pub fn with_backoff_base(mut self, backoff: Duration) -> Self {
        self.backoff_base = backoff;
        self
    }

    pub fn with_results_page_size(mut self, page_size: u32) -> Self {
        self.results_page_size = page_size.max(1);
        self
    }

    pub fn with_prefetched(mut self, prefetched: bool) -> Self {
        self.prefetched = prefetched;
        self
    }

    pub fn with_partial_results(mut self, report: bool) -> Self {
        self.report_partial_results = report;
        self
    }

    pub fn with_total_policy(mut self, policy: TotalPolicy) -> Self {
        self.total_policy = policy;
        self
    }

    pub fn with_pagination_failure_policy(mut self, policy: PaginationFailurePolicy) -> Self {
        self.pagination_failure_policy = policy;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Wait before the given (1-based) consecutive retry.
    pub fn backoff_for(&self, failures: u32) -> Duration {
        self.backoff_base.saturating_mul(failures)
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub crawl: CrawlConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut credentials = Credentials::default();
        if let Ok(api_key) = env::var("WATERCRAWL_API_KEY") {
            credentials = Credentials::new(api_key);
        }
        if let Ok(base_url) = env::var("WATERCRAWL_BASE_URL") {
            credentials = credentials.with_base_url(base_url);
        }

        let mut crawl = CrawlConfig::default();
        if let Some(failures) = parse_var::<u32>("WATERCRAWL_MAX_FAILURES")? {
            crawl = crawl.with_max_consecutive_failures(failures);
        }
        if let Some(secs) = parse_var::<u64>("WATERCRAWL_BACKOFF_SECS")? {
            crawl = crawl.with_backoff_base(Duration::from_secs(secs));
        }
        if let Some(page_size) = parse_var::<u32>("WATERCRAWL_RESULTS_PAGE_SIZE")? {
            crawl = crawl.with_results_page_size(page_size);
        }
        if let Some(partial) = parse_var::<bool>("WATERCRAWL_PARTIAL_RESULTS")? {
            crawl = crawl.with_partial_results(partial);
        }
        if let Some(secs) = parse_var::<u64>("WATERCRAWL_HTTP_TIMEOUT_SECS")? {
            crawl = crawl.with_http_timeout(Duration::from_secs(secs));
        }

        Ok(Self { credentials, crawl })
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid value", name)),
        _ => Ok(None),
    }
}
