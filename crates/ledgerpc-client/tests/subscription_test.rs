//! Mirror subscription integration tests
//!
//! Runs topic subscriptions against scripted mirror channels on a paused
//! clock, covering reconnects, bounded retries, cancellation and chunk
//! reassembly across reconnects.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use futures::stream::{BoxStream, StreamExt};
use ledgerpc_client::{MirrorRequest, SubscribeIterator, TopicContext, TopicMessageQuery};
use ledgerpc_common::messages::ConsensusTopicResponse;
use ledgerpc_common::transport::Channel;
use ledgerpc_common::{AccountId, Code, LedgerError, Result, Timestamp, TopicId, TransactionId};
use serde_json::{json, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn topic_query() -> TopicMessageQuery {
    TopicMessageQuery::new(TopicId::from_num(42)).with_start_time(ts(0))
}

fn contents(messages: &[ledgerpc_client::TopicMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|m| String::from_utf8(m.contents.clone()).unwrap())
        .collect()
}

/// Topic query that also retries `NotFound`, yielding raw items.
struct RetryNotFound(TopicMessageQuery);

impl MirrorRequest for RetryNotFound {
    type GrpcItem = ConsensusTopicResponse;
    type Context = TopicContext;
    type Item = ConsensusTopicResponse;

    const METHOD: &'static str = "test.Mirror/subscribe";

    fn make_query(&self, context: &Self::Context) -> Result<Value> {
        self.0.make_query(context)
    }

    fn should_retry(&self, code: Code) -> bool {
        code == Code::NotFound
    }

    fn make_item_stream(raw: BoxStream<'static, Result<Self::GrpcItem>>) -> BoxStream<'static, Result<Self::Item>> {
        raw
    }
}

fn retrying(mirror: &Arc<MirrorChannel>, timeout: Duration) -> SubscribeIterator<RetryNotFound> {
    let channel: Arc<dyn Channel> = mirror.clone();
    SubscribeIterator::new(Arc::new(RetryNotFound(topic_query())), channel, timeout)
}

// ============================================================================
// Reconnects
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_unavailable_and_resumes() {
    init_tracing();
    let mirror = MirrorChannel::new(vec![
        Session::Items(vec![item(1, "a"), item(2, "b")], Some(Code::Unavailable)),
        Session::Items(vec![item(3, "c")], None),
    ]);
    let client = mirror_client(&mirror);

    let started = Instant::now();
    let messages = client.collect(topic_query(), None).await.unwrap();

    assert_eq!(contents(&messages), ["a", "b", "c"]);
    assert_eq!(Instant::now() - started, Duration::from_millis(500));

    let queries = mirror.queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].consensus_start_time, Some(ts(0)));
    assert_eq!(queries[1].consensus_start_time, Some(Timestamp::new(2, 1)));
    assert_eq!(queries[1].topic_id, Some(TopicId::from_num(42)));

    assert_eq!(client.metrics().subscription_reconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_failures_retry_without_limit() {
    let mirror = MirrorChannel::new(vec![
        Session::Refuse(Code::ResourceExhausted),
        Session::Refuse(Code::Aborted),
        Session::Refuse(Code::Unavailable),
        Session::Items(vec![item(1, "a")], None),
    ]);
    let client = mirror_client(&mirror);

    let messages = client.collect(topic_query(), Some(Duration::from_millis(1))).await.unwrap();

    assert_eq!(contents(&messages), ["a"]);
    assert_eq!(mirror.calls(), 4);
    assert_eq!(client.metrics().subscription_reconnects, 3);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_before_any_item_keeps_start_time() {
    let mirror = MirrorChannel::new(vec![
        Session::Items(vec![], Some(Code::Unavailable)),
        Session::Items(vec![item(5, "a")], None),
    ]);
    let client = mirror_client(&mirror);

    client.collect(topic_query(), None).await.unwrap();

    let queries = mirror.queries();
    assert_eq!(queries[1].consensus_start_time, Some(ts(0)));
}

// ============================================================================
// Terminal outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_end_of_stream_finishes() {
    let mirror = MirrorChannel::new(vec![Session::Items(vec![item(1, "a"), item(2, "b")], None)]);
    let client = mirror_client(&mirror);

    let mut stream = client.subscribe(topic_query()).unwrap();
    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.is_none());
    assert_eq!(mirror.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_code_ends_subscription() {
    let mirror = MirrorChannel::new(vec![Session::Items(vec![item(1, "a")], Some(Code::Internal))]);
    let client = mirror_client(&mirror);

    let mut stream = client.subscribe(topic_query()).unwrap();
    assert!(stream.next().await.unwrap().is_ok());

    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, LedgerError::GrpcStatus { code: Code::Internal, .. }));
    assert!(stream.next().await.is_none());
    assert_eq!(mirror.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_collect_fails_on_first_error() {
    let mirror = MirrorChannel::new(vec![Session::Refuse(Code::PermissionDenied)]);
    let client = mirror_client(&mirror);

    let err = client.collect(topic_query(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::GrpcStatus { code: Code::PermissionDenied, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_item_is_malformed() {
    let mirror = MirrorChannel::new(vec![Session::Items(vec![json!({ "message": [] })], None)]);
    let client = mirror_client(&mirror);

    let err = client.collect(topic_query(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::MalformedResponse(_)));
}

#[tokio::test(start_paused = true)]
async fn test_item_without_timestamp_is_malformed() {
    let mirror = MirrorChannel::new(vec![Session::Items(vec![json!({ "sequence_number": 1 })], None)]);
    let client = mirror_client(&mirror);

    let err = client.collect(topic_query(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::MalformedResponse(_)));
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_without_mirror_nodes_fails() {
    let client = node_client(Vec::new());
    assert!(matches!(client.subscribe(topic_query()), Err(LedgerError::Config(_))));
}

// ============================================================================
// Bounded retries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retryable_code_reconnects_within_window() {
    let mirror = MirrorChannel::new(vec![Session::Refuse(Code::NotFound), Session::Items(vec![item(1, "a")], None)]);

    let items: Vec<_> = retrying(&mirror, Duration::from_secs(10)).into_item_stream().collect().await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].as_ref().unwrap().sequence_number, 1);
    assert_eq!(mirror.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retryable_code_times_out_when_window_too_short() {
    let mirror = MirrorChannel::new(vec![Session::Refuse(Code::NotFound)]);
    let mut iterator = retrying(&mirror, Duration::from_millis(100));

    match iterator.next().await {
        Some(Err(LedgerError::TimedOut { last_error: Some(last) })) => {
            assert!(matches!(*last, LedgerError::GrpcStatus { code: Code::NotFound, .. }));
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert!(iterator.next().await.is_none());
    assert_eq!(mirror.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_topic_query_does_not_retry_not_found() {
    let mirror = MirrorChannel::new(vec![Session::Refuse(Code::NotFound), Session::Items(vec![item(1, "a")], None)]);
    let client = mirror_client(&mirror);

    let err = client.collect(topic_query(), None).await.unwrap_err();
    assert!(matches!(err, LedgerError::GrpcStatus { code: Code::NotFound, .. }));
    assert_eq!(mirror.calls(), 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let mirror = MirrorChannel::new(vec![Session::Items(vec![item(1, "a")], None)]);
    let client = mirror_client(&mirror);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut stream = client.subscribe_with(topic_query(), None, Some(cancel)).unwrap();

    assert!(matches!(stream.next().await, Some(Err(LedgerError::Cancelled))));
    assert!(stream.next().await.is_none());
    assert_eq!(mirror.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_open_stream() {
    let mirror = MirrorChannel::new(vec![Session::Hang(vec![item(1, "a")])]);
    let client = mirror_client(&mirror);
    let cancel = CancellationToken::new();

    let mut stream = client.subscribe_with(topic_query(), None, Some(cancel.clone())).unwrap();
    assert!(stream.next().await.unwrap().is_ok());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    assert!(matches!(stream.next().await, Some(Err(LedgerError::Cancelled))));
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_reconnect_sleep() {
    let mirror = MirrorChannel::new(vec![Session::Refuse(Code::Unavailable), Session::Items(vec![item(1, "a")], None)]);
    let client = mirror_client(&mirror);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let mut stream = client.subscribe_with(topic_query(), None, Some(cancel)).unwrap();

    assert!(matches!(stream.next().await, Some(Err(LedgerError::Cancelled))));
    assert_eq!(Instant::now() - started, Duration::from_millis(100));
    assert_eq!(mirror.calls(), 1);
}

// ============================================================================
// Chunked messages
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_chunks_reassemble_across_reconnect() {
    let transaction = TransactionId::new(AccountId::from_num(1001), ts(99));
    let mirror = MirrorChannel::new(vec![
        Session::Items(vec![chunk(1, transaction, 1, 2, "hel")], Some(Code::Unavailable)),
        Session::Items(vec![chunk(2, transaction, 2, 2, "lo"), item(3, "x")], None),
    ]);
    let client = mirror_client(&mirror);

    let messages = client.collect(topic_query(), None).await.unwrap();

    assert_eq!(contents(&messages), ["hello", "x"]);
    assert_eq!(messages[0].transaction, Some(transaction));
    assert_eq!(messages[0].sequence_number, 2);
    assert_eq!(messages[0].chunks.as_ref().map(Vec::len), Some(2));
    assert_eq!(messages[1].transaction, None);

    assert_eq!(mirror.queries()[1].consensus_start_time, Some(Timestamp::new(1, 1)));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_chunks_from_replay_are_ignored() {
    let transaction = TransactionId::new(AccountId::from_num(1001), ts(99));
    let mirror = MirrorChannel::new(vec![Session::Items(
        vec![
            chunk(1, transaction, 1, 3, "a"),
            chunk(2, transaction, 2, 3, "b"),
            chunk(2, transaction, 2, 3, "b"),
            chunk(3, transaction, 3, 3, "c"),
        ],
        None,
    )]);
    let client = mirror_client(&mirror);

    let messages = client.collect(topic_query(), None).await.unwrap();
    assert_eq!(contents(&messages), ["abc"]);
}
