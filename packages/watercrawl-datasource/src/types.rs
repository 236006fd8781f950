use serde::{Deserialize, Serialize};
use serde_json::Value;
use watercrawl_client::CrawlResultRecord;

/// Overall status reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Processing,
    Completed,
}

/// A normalized crawled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebInfoDetail {
    pub source_url: String,
    pub content: String,
    pub title: String,
    pub description: String,
}

impl WebInfoDetail {
    /// Normalize a result record. Missing or malformed fields become empty
    /// strings rather than errors.
    pub fn from_record(record: &CrawlResultRecord) -> Self {
        let result = &record.result;
        let metadata = result.get("metadata").unwrap_or(&Value::Null);

        Self {
            source_url: record.url.clone(),
            content: text_field(result, &["markdown"]),
            title: text_field(metadata, &["title", "og:title"]),
            description: text_field(metadata, &["description", "og:description"]),
        }
    }
}

/// First non-empty string among `keys` of a JSON object.
fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// One progress record emitted to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub web_info_list: Vec<WebInfoDetail>,
    pub status: ProgressStatus,
    pub total: u64,
    pub completed: u64,
}

impl CrawlProgress {
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}
