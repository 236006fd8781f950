//! Inbound crawl parameters and their translation into a crawl request.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use watercrawl_client::{CreateCrawlRequest, PageOptions, SpiderOptions};

use crate::error::{DatasourceError, Result};

/// Parameters the host passes for a website crawl. Only `url` is required.
///
/// List-valued options arrive as comma-separated strings. Numeric and boolean
/// options accept either JSON scalars or their string forms.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrawlParameters {
    pub url: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub max_depth: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub limit: Option<u32>,
    pub exclude_paths: Option<String>,
    pub include_paths: Option<String>,
    pub allowed_domains: Option<String>,
    pub exclude_tags: Option<String>,
    pub include_tags: Option<String>,
    pub locale: Option<String>,
    pub proxy_server_slug: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub only_main_content: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub ignore_rendering: Option<bool>,
    pub extra_headers: Option<String>,
}

impl CrawlParameters {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// The target URL, or a validation error when it is absent or blank.
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DatasourceError::validation("Url is required"))
    }
}

/// Build the crawl request body, leaving out options the host left empty so
/// the service defaults apply.
pub fn build_crawl_request(params: &CrawlParameters) -> Result<CreateCrawlRequest> {
    let url = params.require_url()?;

    let spider_options = SpiderOptions {
        max_depth: params.max_depth.filter(|d| *d > 0).unwrap_or(1),
        page_limit: params.limit.filter(|l| *l > 0).unwrap_or(1),
        allowed_domains: split_list(params.allowed_domains.as_deref()),
        exclude_paths: split_list(params.exclude_paths.as_deref()),
        include_paths: split_list(params.include_paths.as_deref()),
        proxy_server: non_empty(params.proxy_server_slug.as_deref()),
    };

    let page_options = PageOptions {
        only_main_content: params.only_main_content.unwrap_or(true),
        ignore_rendering: params.ignore_rendering.unwrap_or(false),
        exclude_tags: split_list(params.exclude_tags.as_deref()),
        include_tags: split_list(params.include_tags.as_deref()),
        locale: non_empty(params.locale.as_deref()),
        extra_headers: parse_extra_headers(params.extra_headers.as_deref())?,
    };

    Ok(CreateCrawlRequest::new(url)
        .with_spider_options(spider_options)
        .with_page_options(page_options))
}

/// Split a comma-separated option into trimmed, non-empty entries.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the `extra_headers` option: a JSON object whose values are strings
/// (numbers and booleans are stringified).
pub fn parse_extra_headers(value: Option<&str>) -> Result<BTreeMap<String, String>> {
    let invalid = || DatasourceError::validation("extra_headers must be valid JSON");

    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(BTreeMap::new());
    };

    let parsed: BTreeMap<String, Value> = serde_json::from_str(raw).map_err(|_| invalid())?;

    parsed
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => Ok((name, s)),
            Value::Number(n) => Ok((name, n.to_string())),
            Value::Bool(b) => Ok((name, b.to_string())),
            _ => Err(invalid()),
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(u64),
    Float(f64),
    Text(String),
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    use serde::de::Error;

    let Some(value) = Option::<Scalar>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match value {
        Scalar::Int(n) => u32::try_from(n).map(Some).map_err(D::Error::custom),
        Scalar::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => {
            Ok(Some(f as u32))
        }
        Scalar::Text(s) if s.trim().is_empty() => Ok(None),
        Scalar::Text(s) => s.trim().parse().map(Some).map_err(D::Error::custom),
        _ => Err(D::Error::custom("expected a non-negative integer")),
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    use serde::de::Error;

    let Some(value) = Option::<Scalar>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match value {
        Scalar::Bool(b) => Ok(Some(b)),
        Scalar::Int(n) => Ok(Some(n != 0)),
        Scalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("invalid boolean: {}", other))),
        },
        Scalar::Float(_) => Err(D::Error::custom("expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_url_is_validation_error() {
        let err = build_crawl_request(&CrawlParameters::default()).unwrap_err();
        assert!(matches!(err, DatasourceError::Validation(ref m) if m == "Url is required"));

        let err = build_crawl_request(&CrawlParameters::new("   ")).unwrap_err();
        assert!(matches!(err, DatasourceError::Validation(_)));
    }

    #[test]
    fn test_defaults_when_options_absent() {
        let request = build_crawl_request(&CrawlParameters::new("https://a.test")).unwrap();
        let spider = &request.options.spider_options;
        let page = &request.options.page_options;

        assert_eq!(spider.max_depth, 1);
        assert_eq!(spider.page_limit, 1);
        assert!(spider.allowed_domains.is_empty());
        assert!(spider.proxy_server.is_none());
        assert!(page.only_main_content);
        assert!(!page.ignore_rendering);
        assert!(page.extra_headers.is_empty());
    }

    #[test]
    fn test_comma_lists_are_split_and_trimmed() {
        assert_eq!(
            split_list(Some("/blog/*, /docs/*,,")),
            vec!["/blog/*".to_string(), "/docs/*".to_string()]
        );
        assert!(split_list(Some("")).is_empty());
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn test_host_parameter_map() {
        let params: CrawlParameters = serde_json::from_value(json!({
            "url": "https://a.test",
            "max_depth": "3",
            "limit": 20.0,
            "allowed_domains": "a.test,*.a.test",
            "exclude_tags": "nav, footer",
            "locale": "",
            "proxy_server_slug": "team-proxy",
            "only_main_content": "false",
            "ignore_rendering": true,
            "extra_headers": "{\"Cookie\": \"a=b\", \"X-Retry\": 2}"
        }))
        .unwrap();

        let request = build_crawl_request(&params).unwrap();
        let spider = &request.options.spider_options;
        let page = &request.options.page_options;

        assert_eq!(spider.max_depth, 3);
        assert_eq!(spider.page_limit, 20);
        assert_eq!(spider.allowed_domains, vec!["a.test", "*.a.test"]);
        assert_eq!(spider.proxy_server.as_deref(), Some("team-proxy"));
        assert_eq!(page.exclude_tags, vec!["nav", "footer"]);
        assert!(page.locale.is_none());
        assert!(!page.only_main_content);
        assert!(page.ignore_rendering);
        assert_eq!(page.extra_headers.get("Cookie").map(String::as_str), Some("a=b"));
        assert_eq!(page.extra_headers.get("X-Retry").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_empty_options_are_left_out_of_body() {
        let params: CrawlParameters = serde_json::from_value(json!({
            "url": "https://a.test",
            "include_paths": "",
            "locale": "  ",
            "extra_headers": "{}"
        }))
        .unwrap();

        let body = serde_json::to_value(build_crawl_request(&params).unwrap()).unwrap();
        let page = &body["options"]["page_options"];
        assert!(page.get("locale").is_none());
        assert!(page.get("extra_headers").is_none());
        assert!(body["options"]["spider_options"].get("include_paths").is_none());
    }

    #[test]
    fn test_malformed_extra_headers() {
        for raw in ["{not json", "[1, 2]", "{\"nested\": {\"a\": 1}}"] {
            let err = parse_extra_headers(Some(raw)).unwrap_err();
            assert!(
                matches!(err, DatasourceError::Validation(ref m) if m == "extra_headers must be valid JSON"),
                "input {:?} gave {:?}",
                raw,
                err
            );
        }
    }

    #[test]
    fn test_zero_limit_falls_back_to_one() {
        let request =
            build_crawl_request(&CrawlParameters::new("https://a.test").with_limit(0)).unwrap();
        assert_eq!(request.options.spider_options.page_limit, 1);
    }
}
