//! SSE parser for the crawl monitoring endpoint.
//!
//! Converts a raw `reqwest` byte stream into `CrawlEvent` values. Lines are
//! buffered as bytes so multi-byte characters split across chunks survive.

use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::WaterCrawlError;
use crate::types::{CrawlEvent, RawEvent};

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Stream adapter that converts raw SSE bytes into `CrawlEvent` values.
///
/// A broken body yields one transient error and then ends; callers re-subscribe
/// to continue.
pub struct MonitorStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    finished: bool,
}

impl MonitorStream {
    pub(crate) fn new(
        byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            buffer: Vec::new(),
            finished: false,
        }
    }
}

impl Stream for MonitorStream {
    type Item = Result<CrawlEvent, WaterCrawlError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = try_parse_line(&mut this.buffer) {
                return Poll::Ready(Some(event));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(WaterCrawlError::from_stream(e))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    // Flush a trailing line that had no newline
                    if !this.buffer.is_empty() {
                        this.buffer.push(b'\n');
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Try to extract and parse a complete SSE data line from the buffer.
/// Returns `None` if no complete data line is available yet.
fn try_parse_line(buffer: &mut Vec<u8>) -> Option<Result<CrawlEvent, WaterCrawlError>> {
    loop {
        let newline_pos = buffer.iter().position(|b| *b == b'\n')?;
        let raw_line: Vec<u8> = buffer.drain(..=newline_pos).collect();

        let line = match std::str::from_utf8(&raw_line) {
            Ok(line) => line.trim(),
            Err(e) => {
                return Some(Err(WaterCrawlError::Parse(format!(
                    "Invalid UTF-8 in stream: {}",
                    e
                ))));
            }
        };

        // Blank lines separate events; "event:", "id:", "retry:" and comments carry nothing we use
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }

        return Some(
            serde_json::from_str::<RawEvent>(data)
                .map_err(|e| {
                    WaterCrawlError::Parse(format!(
                        "Failed to parse event: {} (data: {})",
                        e,
                        data.chars().take(200).collect::<String>()
                    ))
                })
                .and_then(RawEvent::into_event),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CrawlStatus;
    use futures::StreamExt;

    fn make_sse_bytes(lines: &[&str]) -> Vec<Result<Bytes, reqwest::Error>> {
        lines
            .iter()
            .map(|line| Ok(Bytes::from(format!("{}\n", line))))
            .collect()
    }

    #[tokio::test]
    async fn test_parse_result_and_state() {
        let data = make_sse_bytes(&[
            r#"data: {"type":"result","data":{"url":"https://a.test/x","result":{"markdown":"hi"}}}"#,
            "",
            r#"data: {"type":"state","data":{"uuid":"abc","status":"finished"}}"#,
            "",
        ]);

        let mut stream = MonitorStream::new(futures::stream::iter(data));

        match stream.next().await.unwrap().unwrap() {
            CrawlEvent::Result(record) => assert_eq!(record.url, "https://a.test/x"),
            other => panic!("expected result, got {:?}", other),
        }
        match stream.next().await.unwrap().unwrap() {
            CrawlEvent::State(state) => assert_eq!(state.status, CrawlStatus::Finished),
            other => panic!("expected state, got {:?}", other),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let full = "data: {\"type\":\"feed\",\"data\":{\"message\":\"caf\u{e9}\"}}\n";
        let bytes = full.as_bytes();
        // Split inside the two-byte "é"
        let split = full.find('\u{e9}').unwrap() + 1;
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ];

        let mut stream = MonitorStream::new(futures::stream::iter(chunks));
        match stream.next().await.unwrap().unwrap() {
            CrawlEvent::Feed(data) => assert_eq!(data["message"], "caf\u{e9}"),
            other => panic!("expected feed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from(
            r#"data: {"type":"state","data":{"status":"running"}}"#,
        ))];

        let mut stream = MonitorStream::new(futures::stream::iter(chunks));
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            CrawlEvent::State(_)
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_end_stream() {
        let data = make_sse_bytes(&[
            "event: message",
            "data: {not json",
            r#"data: {"type":"feed","data":{}}"#,
        ]);

        let mut stream = MonitorStream::new(futures::stream::iter(data));
        assert!(matches!(
            stream.next().await.unwrap(),
            Err(WaterCrawlError::Parse(_))
        ));
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            CrawlEvent::Feed(_)
        ));
    }
}
