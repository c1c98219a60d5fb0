//! Shared fixtures for the client tests: scripted node and mirror channels.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use ledgerpc_client::{Client, MirrorNetwork};
use ledgerpc_common::messages::{ConsensusMessageChunkInfo, ConsensusTopicQuery, ConsensusTopicResponse};
use ledgerpc_common::transport::{Channel, ItemStream, TransportError};
use ledgerpc_common::{AccountId, Code, Timestamp, TransactionId};
use ledgerpc_orchestrator::{Network, Node};
use parking_lot::Mutex;
use serde_json::Value;

/// One server-streaming call as a mirror node will serve it.
#[derive(Debug, Clone)]
pub enum Session {
    /// The call fails before any item.
    Refuse(Code),
    /// Items, then the stream ends cleanly (`None`) or fails with a code.
    Items(Vec<Value>, Option<Code>),
    /// Items, then the stream stays open forever.
    Hang(Vec<Value>),
}

/// Mirror node serving scripted sessions in order. Once the script is used
/// up every further call is refused with `Unimplemented`.
pub struct MirrorChannel {
    sessions: Mutex<VecDeque<Session>>,
    queries: Mutex<Vec<Value>>,
}

impl MirrorChannel {
    pub fn new(sessions: Vec<Session>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(sessions.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Topic queries received, in order.
    pub fn queries(&self) -> Vec<ConsensusTopicQuery> {
        self.queries
            .lock()
            .iter()
            .map(|query| serde_json::from_value(query.clone()).unwrap())
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl Channel for MirrorChannel {
    async fn unary(&self, method: &str, _: Value, _: Option<Duration>) -> Result<Value, TransportError> {
        Err(TransportError::new(Code::Unimplemented, method))
    }

    async fn server_streaming(&self, method: &str, payload: Value) -> Result<ItemStream, TransportError> {
        self.queries.lock().push(payload);

        let session = self
            .sessions
            .lock()
            .pop_front()
            .unwrap_or(Session::Refuse(Code::Unimplemented));

        match session {
            Session::Refuse(code) => Err(TransportError::new(code, format!("{method} refused"))),
            Session::Items(items, end) => {
                let tail = end.map(|code| Err(TransportError::new(code, "scripted stream failure")));
                let items = stream::iter(items.into_iter().map(Ok).chain(tail));
                Ok(items.boxed())
            }
            Session::Hang(items) => {
                let items = stream::iter(items.into_iter().map(Ok::<Value, TransportError>));
                Ok(items.chain(stream::pending()).boxed())
            }
        }
    }
}

/// Client with no consensus nodes and a single mirror node.
pub fn mirror_client(mirror: &Arc<MirrorChannel>) -> Client {
    let channel: Arc<dyn Channel> = mirror.clone();
    Client::for_network(Network::default(), MirrorNetwork::from_channels(vec![channel]))
}

/// Client over in-memory consensus nodes `0.0.3`, `0.0.4`, ...
pub fn node_client(channels: Vec<Arc<dyn Channel>>) -> Client {
    let nodes = channels
        .into_iter()
        .enumerate()
        .map(|(index, channel)| Node::new(node_id(index), vec![format!("node{index}:50211")], channel))
        .collect();
    Client::for_network(Network::new(nodes), MirrorNetwork::default())
}

pub fn node_id(index: usize) -> AccountId {
    AccountId::from_num(3 + index as u64)
}

pub fn ts(seconds: i64) -> Timestamp {
    Timestamp::new(seconds, 0)
}

/// A single-part topic item at `seconds`.
pub fn item(seconds: i64, body: &str) -> Value {
    serde_json::to_value(ConsensusTopicResponse {
        consensus_timestamp: Some(ts(seconds)),
        message: body.as_bytes().to_vec(),
        running_hash: vec![seconds as u8],
        running_hash_version: 3,
        sequence_number: seconds as u64,
        chunk_info: None,
    })
    .unwrap()
}

/// Chunk `number` of `total` of the message started by `transaction`.
pub fn chunk(seconds: i64, transaction: TransactionId, number: i32, total: i32, body: &str) -> Value {
    serde_json::to_value(ConsensusTopicResponse {
        consensus_timestamp: Some(ts(seconds)),
        message: body.as_bytes().to_vec(),
        running_hash: vec![seconds as u8],
        running_hash_version: 3,
        sequence_number: seconds as u64,
        chunk_info: Some(ConsensusMessageChunkInfo {
            initial_transaction_id: Some(transaction),
            total,
            number,
        }),
    })
    .unwrap()
}

/// Routes `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
