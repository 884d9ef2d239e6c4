//! Sequencing, recovery and concurrency behaviour of the shipper.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;

use log_shipper::config::ShipperConfig;
use log_shipper::shipping::{
    ContinuationToken, EndpointError, LogRecord, MemoryEndpoint, RemoteLogEndpoint,
    SequencedLogShipper, ShipError,
};

const GROUP: &str = "digai-logs";
const STREAM: &str = "digai-stream";

fn config() -> ShipperConfig {
    ShipperConfig {
        group_name: GROUP.into(),
        stream_name: STREAM.into(),
        timeout_ms: 2_000,
        ..ShipperConfig::default()
    }
}

fn shipper(endpoint: &Arc<MemoryEndpoint>) -> Arc<SequencedLogShipper> {
    Arc::new(SequencedLogShipper::new(endpoint.clone(), config()))
}

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let fresh = Arc::new(MemoryEndpoint::new());
    shipper(&fresh).submit("line").await.unwrap();

    let existing = Arc::new(MemoryEndpoint::new());
    existing.create_group(GROUP).await.unwrap();
    existing.create_stream(GROUP, STREAM).await.unwrap();
    shipper(&existing).submit("line").await.unwrap();

    assert_eq!(fresh.messages(GROUP, STREAM), vec!["line"]);
    assert_eq!(existing.messages(GROUP, STREAM), vec!["line"]);
    assert_eq!(fresh.append_calls(), 1);
    assert_eq!(existing.append_calls(), 1);
}

#[tokio::test]
async fn test_serial_submissions_keep_order() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let shipper = shipper(&endpoint);

    let expected: Vec<String> = (0..50).map(|i| format!("event {i}")).collect();
    for message in &expected {
        shipper.submit(message.clone()).await.unwrap();
    }

    assert_eq!(endpoint.messages(GROUP, STREAM), expected);
    assert_eq!(endpoint.append_calls(), expected.len());
}

#[tokio::test]
async fn test_each_append_presents_previous_token() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let shipper = shipper(&endpoint);

    let mut returned = vec![None];
    for i in 0..5 {
        shipper.submit(format!("{i}")).await.unwrap();
        let cached = shipper.cached_token().await;
        assert_eq!(cached, endpoint.head_token(GROUP, STREAM));
        returned.push(cached);
    }

    returned.pop();
    assert_eq!(endpoint.presented_tokens(), returned);
}

#[tokio::test]
async fn test_recovers_after_another_writer() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    let shipper = shipper(&endpoint);
    shipper.submit("ours 1").await.unwrap();

    // Someone else appends, so our cached token goes stale.
    let head = endpoint.head_token(GROUP, STREAM);
    endpoint
        .append(GROUP, STREAM, &[LogRecord::now("theirs")], head.as_ref())
        .await
        .unwrap();

    shipper.submit("ours 2").await.unwrap();

    assert_eq!(
        endpoint.messages(GROUP, STREAM),
        vec!["ours 1", "theirs", "ours 2"]
    );
    // 1 + external 1 + stale attempt + retry
    assert_eq!(endpoint.append_calls(), 4);
    assert_eq!(shipper.cached_token().await, endpoint.head_token(GROUP, STREAM));
}

#[tokio::test]
async fn test_persistent_staleness_gives_up_after_one_retry() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    endpoint.inject_stale(u32::MAX);
    let shipper = shipper(&endpoint);

    let err = shipper.submit("doomed").await.unwrap_err();

    assert!(matches!(err, ShipError::RetryExhausted { attempts: 2 }));
    assert_eq!(endpoint.append_calls(), 2);
    assert!(endpoint.messages(GROUP, STREAM).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_are_serialized() {
    let endpoint = Arc::new(MemoryEndpoint::new().with_append_latency(Duration::from_millis(5)));
    let shipper = shipper(&endpoint);

    let callers = 32;
    let tasks = (0..callers).map(|i| {
        let shipper = shipper.clone();
        tokio::spawn(async move { shipper.submit(format!("caller {i}")).await })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let mut messages = endpoint.messages(GROUP, STREAM);
    messages.sort();
    let mut expected: Vec<String> = (0..callers).map(|i| format!("caller {i}")).collect();
    expected.sort();

    assert_eq!(messages, expected);
    assert_eq!(endpoint.peak_concurrent_appends(), 1);
    assert_eq!(endpoint.append_calls(), callers);
    assert_eq!(endpoint.group_create_calls(), 1);
}

#[tokio::test]
async fn test_empty_stream_needs_no_token() {
    let endpoint = Arc::new(MemoryEndpoint::new());
    endpoint.create_group(GROUP).await.unwrap();
    endpoint.create_stream(GROUP, STREAM).await.unwrap();
    let shipper = shipper(&endpoint);

    shipper.submit("first").await.unwrap();

    assert_eq!(endpoint.presented_tokens(), vec![None]);
    assert_eq!(endpoint.messages(GROUP, STREAM), vec!["first"]);
}

/// Answers every append with "already accepted", as after a lost response.
struct AlreadyAcceptedEndpoint {
    appends: AtomicUsize,
}

#[async_trait]
impl RemoteLogEndpoint for AlreadyAcceptedEndpoint {
    async fn create_group(&self, group: &str) -> Result<(), EndpointError> {
        Err(EndpointError::AlreadyExists(group.to_string()))
    }

    async fn create_stream(&self, _group: &str, stream: &str) -> Result<(), EndpointError> {
        Err(EndpointError::AlreadyExists(stream.to_string()))
    }

    async fn current_token(
        &self,
        _group: &str,
        _stream_prefix: &str,
    ) -> Result<Option<ContinuationToken>, EndpointError> {
        Ok(Some(ContinuationToken::from("1")))
    }

    async fn append(
        &self,
        _group: &str,
        _stream: &str,
        _records: &[LogRecord],
        _token: Option<&ContinuationToken>,
    ) -> Result<Option<ContinuationToken>, EndpointError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(EndpointError::AlreadyAccepted {
            next: Some(ContinuationToken::from("2")),
        })
    }
}

#[tokio::test]
async fn test_already_accepted_counts_as_delivered() {
    let endpoint = Arc::new(AlreadyAcceptedEndpoint {
        appends: AtomicUsize::new(0),
    });
    let shipper = SequencedLogShipper::new(endpoint.clone(), config());

    shipper.submit("dup").await.unwrap();

    assert_eq!(endpoint.appends.load(Ordering::SeqCst), 1);
    assert_eq!(shipper.cached_token().await, Some(ContinuationToken::from("2")));
}
