//! Website-crawl datasource backed by the WaterCrawl API.
//!
//! Validates provider credentials, submits a crawl, follows its event stream
//! and reports progress records until the crawl completes.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use watercrawl_datasource::{website_crawl, CrawlConfig, CrawlParameters, Credentials};
//!
//! let credentials = Credentials::new("your-api-key");
//! let params = CrawlParameters::new("https://example.com").with_limit(10);
//!
//! let mut progress = website_crawl(credentials, params, CrawlConfig::default());
//! while let Some(record) = progress.next().await {
//!     let record = record?;
//!     println!("{}/{} {:?}", record.completed, record.total, record.status);
//! }
//! ```

pub mod config;
pub mod crawl;
pub mod credentials;
pub mod error;
pub mod params;
pub mod testing;
pub mod traits;
pub mod types;
pub mod validator;

pub use config::{Config, CrawlConfig, PaginationFailurePolicy, TotalPolicy};
pub use crawl::{run_crawl, website_crawl, ProgressStream};
pub use credentials::{Credentials, SecretString};
pub use error::{DatasourceError, Result};
pub use params::{build_crawl_request, CrawlParameters};
pub use traits::{CrawlApi, EventStream};
pub use types::{CrawlProgress, ProgressStatus, WebInfoDetail};
pub use validator::{validate_credentials, validate_with};
