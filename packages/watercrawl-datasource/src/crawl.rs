//! Crawl orchestration: submit, monitor, finalize.
//!
//! The crawl is exposed as a pull-driven stream of [`CrawlProgress`]
//! records. The stream ends after exactly one `completed` record, or after
//! the first error.
//!
//! Monitoring re-subscribes from the start of the event history after a
//! transient failure, so deduplication by URL spans every subscription.
//! Replayed events do not count as progress: only a new URL or a state not
//! seen before resets the consecutive failure count.

use async_stream::stream;
use futures::stream::{Stream, StreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use tracing::{debug, info, warn};
use watercrawl_client::{
    CrawlEvent, CrawlResultRecord, CrawlState, CrawlStatus, WaterCrawlError,
};

use crate::config::{CrawlConfig, PaginationFailurePolicy, TotalPolicy};
use crate::credentials::Credentials;
use crate::error::{DatasourceError, Result};
use crate::params::{build_crawl_request, CrawlParameters};
use crate::traits::CrawlApi;
use crate::types::{CrawlProgress, ProgressStatus, WebInfoDetail};

/// Progress records for one crawl.
pub type ProgressStream<'a> = Pin<Box<dyn Stream<Item = Result<CrawlProgress>> + Send + 'a>>;

/// Crawl a website with the given provider credentials.
///
/// A missing URL or API key is reported as the first (and only) item,
/// before any network call.
pub fn website_crawl(
    credentials: Credentials,
    params: CrawlParameters,
    config: CrawlConfig,
) -> ProgressStream<'static> {
    Box::pin(stream! {
        if let Err(e) = params.require_url() {
            yield Err(e);
            return;
        }

        let client = match credentials.client(config.http_timeout) {
            Ok(client) => client,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        let mut progress = run_crawl(&client, params, &config);
        while let Some(item) = progress.next().await {
            yield item;
        }
    })
}

/// Run a crawl against any API implementation.
pub fn run_crawl<'a, A: CrawlApi + ?Sized>(
    api: &'a A,
    params: CrawlParameters,
    config: &'a CrawlConfig,
) -> ProgressStream<'a> {
    Box::pin(stream! {
        let request = match build_crawl_request(&params) {
            Ok(request) => request,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        let crawl = match api.create_crawl_request(&request).await {
            Ok(crawl) => crawl,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Failed to submit crawl request");
                yield Err(DatasourceError::crawl_failed(e));
                return;
            }
        };

        let crawl_id = crawl.uuid.clone();
        info!(
            crawl_id = %crawl_id,
            url = %request.url,
            page_limit = crawl.page_limit(),
            "Crawl request submitted"
        );

        let mut tracker = ProgressTracker::new(u64::from(crawl.page_limit()), config);
        yield Ok(tracker.snapshot());

        let mut failures: u32 = 0;
        loop {
            let outcome = match api.monitor_crawl_request(&crawl_id, config.prefetched).await {
                Ok(mut events) => {
                    let mut outcome = StreamOutcome::Exhausted;
                    while let Some(item) = events.next().await {
                        match item {
                            Ok(event) => match tracker.apply(event) {
                                Applied::Progress => {
                                    failures = 0;
                                    yield Ok(tracker.snapshot());
                                }
                                Applied::Advanced => failures = 0,
                                Applied::Terminal => {
                                    outcome = StreamOutcome::Terminal;
                                    break;
                                }
                                Applied::Ignored => {}
                            },
                            Err(e) if e.is_transient() => {
                                outcome = StreamOutcome::Interrupted(e);
                                break;
                            }
                            Err(WaterCrawlError::Parse(message)) => {
                                warn!(crawl_id = %crawl_id, error = %message, "Skipping malformed event");
                            }
                            Err(e) => {
                                warn!(crawl_id = %crawl_id, error = %e, "Monitoring failed");
                                yield Err(DatasourceError::crawl_failed(e));
                                return;
                            }
                        }
                    }
                    outcome
                }
                Err(e) if e.is_transient() => StreamOutcome::Interrupted(e),
                Err(e) => {
                    warn!(crawl_id = %crawl_id, error = %e, "Could not subscribe to crawl events");
                    yield Err(DatasourceError::crawl_failed(e));
                    return;
                }
            };

            match outcome {
                StreamOutcome::Terminal => {
                    debug!(crawl_id = %crawl_id, "Crawl reached a terminal state");
                    break;
                }
                StreamOutcome::Exhausted => {
                    debug!(crawl_id = %crawl_id, "Event stream ended without a terminal state");
                    break;
                }
                StreamOutcome::Interrupted(e) => {
                    failures += 1;
                    if failures >= config.max_consecutive_failures {
                        warn!(
                            crawl_id = %crawl_id,
                            failures,
                            error = %e,
                            "Giving up on monitoring, finalizing with stored results"
                        );
                        break;
                    }
                    let delay = config.backoff_for(failures);
                    warn!(
                        crawl_id = %crawl_id,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Event stream interrupted, re-subscribing"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let fetched = fetch_all_results(api, &crawl_id, config).await;
        let final_record = match fetched {
            Ok(records) => tracker.complete(records.iter().map(WebInfoDetail::from_record)),
            Err(e) => {
                warn!(
                    crawl_id = %crawl_id,
                    error = %e,
                    policy = ?config.pagination_failure_policy,
                    "Failed to fetch crawl results"
                );
                match config.pagination_failure_policy {
                    PaginationFailurePolicy::Empty => tracker.complete(std::iter::empty()),
                    PaginationFailurePolicy::StreamedResults => {
                        let streamed = tracker.streamed_results();
                        tracker.complete(streamed)
                    }
                }
            }
        };

        info!(
            crawl_id = %crawl_id,
            completed = final_record.completed,
            "Crawl completed"
        );
        yield Ok(final_record);
    })
}

/// Page through the stored results until the listing has no next page.
///
/// Stops early on a page that adds no URL not already listed, so a listing
/// whose `next` link cycles cannot page forever.
async fn fetch_all_results<A: CrawlApi + ?Sized>(
    api: &A,
    crawl_id: &str,
    config: &CrawlConfig,
) -> watercrawl_client::Result<Vec<CrawlResultRecord>> {
    let mut records = Vec::new();
    let mut listed = HashSet::new();
    let mut page = 1;

    loop {
        let listing = api
            .get_crawl_request_results(crawl_id, page, config.results_page_size, config.prefetched)
            .await?;
        let received = listing.results.len();
        let has_next = listing.has_next();
        let before = records.len();
        records.extend(
            listing
                .results
                .into_iter()
                .filter(|record| listed.insert(record.url.clone())),
        );
        let added = records.len() - before;

        debug!(crawl_id, page, received, added, "Fetched results page");

        if !has_next {
            break;
        }
        if added == 0 {
            warn!(crawl_id, page, "Results page added nothing new, stopping pagination");
            break;
        }
        page += 1;
    }

    Ok(records)
}

enum StreamOutcome {
    Terminal,
    Exhausted,
    Interrupted(WaterCrawlError),
}

enum Applied {
    /// A new page; a record goes out.
    Progress,
    /// A state not seen before; nothing to report.
    Advanced,
    Terminal,
    Ignored,
}

/// Mutable state of one crawl: seen URLs, pages so far, reported counts.
struct ProgressTracker<'a> {
    config: &'a CrawlConfig,
    seen: HashSet<String>,
    statuses: HashSet<CrawlStatus>,
    max_documents: u64,
    results: Vec<WebInfoDetail>,
    total: u64,
}

impl<'a> ProgressTracker<'a> {
    fn new(total: u64, config: &'a CrawlConfig) -> Self {
        Self {
            config,
            seen: HashSet::new(),
            statuses: HashSet::new(),
            max_documents: 0,
            results: Vec::new(),
            total,
        }
    }

    fn apply(&mut self, event: CrawlEvent) -> Applied {
        match event {
            CrawlEvent::Result(record) => {
                if !self.seen.insert(record.url.clone()) {
                    debug!(url = %record.url, "Skipping duplicate result");
                    return Applied::Ignored;
                }
                self.results.push(WebInfoDetail::from_record(&record));
                self.raise_total(self.results.len() as u64);
                Applied::Progress
            }
            CrawlEvent::State(state) => self.observe_state(&state),
            CrawlEvent::Feed(_) | CrawlEvent::Other { .. } => Applied::Ignored,
        }
    }

    fn observe_state(&mut self, state: &CrawlState) -> Applied {
        let mut advanced = self.statuses.insert(state.status.clone());
        if let Some(documents) = state.number_of_documents {
            if documents > self.max_documents {
                self.max_documents = documents;
                advanced = true;
            }
            self.raise_total(documents);
        }

        if state.status.is_terminal() {
            info!(status = %state.status, "Crawl state is terminal");
            Applied::Terminal
        } else if advanced {
            debug!(status = %state.status, "Crawl state changed");
            Applied::Advanced
        } else {
            Applied::Ignored
        }
    }

    fn raise_total(&mut self, candidate: u64) {
        if self.config.total_policy == TotalPolicy::Live {
            self.total = self.total.max(candidate);
        }
    }

    fn snapshot(&self) -> CrawlProgress {
        CrawlProgress {
            web_info_list: if self.config.report_partial_results {
                self.results.clone()
            } else {
                Vec::new()
            },
            status: ProgressStatus::Processing,
            total: self.total,
            completed: self.results.len() as u64,
        }
    }

    fn streamed_results(&mut self) -> Vec<WebInfoDetail> {
        std::mem::take(&mut self.results)
    }

    /// Build the final record; the listing is deduplicated by URL as well.
    fn complete(&self, details: impl IntoIterator<Item = WebInfoDetail>) -> CrawlProgress {
        let mut seen = HashSet::new();
        let web_info_list: Vec<WebInfoDetail> = details
            .into_iter()
            .filter(|detail| seen.insert(detail.source_url.clone()))
            .collect();
        let count = web_info_list.len() as u64;

        CrawlProgress {
            web_info_list,
            status: ProgressStatus::Completed,
            total: count,
            completed: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{result_event, state_event};

    #[test]
    fn test_tracker_deduplicates() {
        let config = CrawlConfig::default();
        let mut tracker = ProgressTracker::new(2, &config);

        assert!(matches!(
            tracker.apply(result_event("https://a.test/x", "x")),
            Applied::Progress
        ));
        assert!(matches!(
            tracker.apply(result_event("https://a.test/x", "x")),
            Applied::Ignored
        ));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.web_info_list.len(), 1);
    }

    #[test]
    fn test_fixed_total_ignores_document_count() {
        let config = CrawlConfig::default();
        let mut tracker = ProgressTracker::new(2, &config);
        tracker.apply(state_event(CrawlStatus::Running, Some(10)));
        assert_eq!(tracker.snapshot().total, 2);
    }

    #[test]
    fn test_live_total_follows_document_count() {
        let config = CrawlConfig::default().with_total_policy(TotalPolicy::Live);
        let mut tracker = ProgressTracker::new(2, &config);
        tracker.apply(state_event(CrawlStatus::Running, Some(10)));
        assert_eq!(tracker.snapshot().total, 10);
    }

    #[test]
    fn test_partial_results_can_be_withheld() {
        let config = CrawlConfig::default().with_partial_results(false);
        let mut tracker = ProgressTracker::new(2, &config);
        tracker.apply(result_event("https://a.test/x", "x"));

        let snapshot = tracker.snapshot();
        assert!(snapshot.web_info_list.is_empty());
        assert_eq!(snapshot.completed, 1);
    }

    #[test]
    fn test_terminal_states() {
        let config = CrawlConfig::default();
        let mut tracker = ProgressTracker::new(1, &config);
        for status in [CrawlStatus::Finished, CrawlStatus::Failed, CrawlStatus::Canceled] {
            assert!(matches!(
                tracker.apply(state_event(status, None)),
                Applied::Terminal
            ));
        }
        assert!(matches!(
            tracker.apply(state_event(CrawlStatus::Running, None)),
            Applied::Advanced
        ));
    }

    #[test]
    fn test_replayed_state_is_not_progress() {
        let config = CrawlConfig::default();
        let mut tracker = ProgressTracker::new(5, &config);

        assert!(matches!(
            tracker.apply(state_event(CrawlStatus::Running, Some(2))),
            Applied::Advanced
        ));
        assert!(matches!(
            tracker.apply(state_event(CrawlStatus::Running, Some(2))),
            Applied::Ignored
        ));
        assert!(matches!(
            tracker.apply(state_event(CrawlStatus::Running, Some(3))),
            Applied::Advanced
        ));
    }
}
