//! Credential validation against the crawl-requests listing.

use tracing::{debug, info};
use url::Url;
use watercrawl_client::{WaterCrawlClient, WaterCrawlError};

use crate::credentials::Credentials;
use crate::error::{DatasourceError, Result};
use crate::traits::CrawlApi;

/// Check that the base URL is usable and the API key is accepted.
///
/// Makes exactly one outbound call, unless the base URL or key is rejected
/// locally first.
pub async fn validate_credentials(credentials: &Credentials) -> Result<()> {
    let base_url = credentials.base_url();
    if !is_valid_base_url(base_url) {
        return Err(DatasourceError::credential("Invalid base URL"));
    }

    let api_key = credentials.require_api_key()?;
    let client = WaterCrawlClient::new(api_key.expose()).with_base_url(base_url);

    validate_with(&client).await?;
    info!(base_url, "WaterCrawl credentials validated");
    Ok(())
}

/// Run the validation request against any API implementation.
pub async fn validate_with<A: CrawlApi + ?Sized>(api: &A) -> Result<()> {
    match api.list_crawl_requests(1).await {
        Ok(_) => Ok(()),
        Err(e) => {
            debug!(error = %e, "Credential validation request failed");
            Err(credential_error(e))
        }
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn is_valid_base_url(base_url: &str) -> bool {
    match Url::parse(base_url) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

fn credential_error(error: WaterCrawlError) -> DatasourceError {
    match error {
        WaterCrawlError::Api { status: 401, .. } => DatasourceError::credential("Invalid API key"),
        WaterCrawlError::Api { status: 404, .. } => DatasourceError::credential("Invalid base URL"),
        // A 2xx that is not a crawl-request listing
        WaterCrawlError::Parse(_) => DatasourceError::credential("Invalid URL or API key"),
        other => DatasourceError::credential(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_shapes() {
        assert!(is_valid_base_url("https://app.watercrawl.dev/"));
        assert!(is_valid_base_url("http://localhost:8000"));
        assert!(!is_valid_base_url("ftp://app.watercrawl.dev"));
        assert!(!is_valid_base_url("app.watercrawl.dev"));
        assert!(!is_valid_base_url("https://"));
        assert!(!is_valid_base_url(""));
    }

    #[test]
    fn test_status_mapping() {
        let api = |status| WaterCrawlError::Api {
            status,
            message: String::new(),
        };
        assert_eq!(credential_error(api(401)).to_string(), "Invalid API key");
        assert_eq!(credential_error(api(404)).to_string(), "Invalid base URL");
        assert_eq!(
            credential_error(WaterCrawlError::Parse("missing field `results`".into())).to_string(),
            "Invalid URL or API key"
        );

        let other = credential_error(api(500));
        assert!(other.is_credential());
        assert_eq!(other.to_string(), "API error (500): ");
    }
}
