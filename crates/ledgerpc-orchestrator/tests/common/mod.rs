//! Shared fixtures for the execution engine tests: scripted in-memory
//! channels and a minimal transaction type.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledgerpc_common::messages::{methods, ResponseHeader};
use ledgerpc_common::transport::{Channel, ItemStream, TransportError};
use ledgerpc_common::{AccountId, Code, Result, Status, TransactionId};
use ledgerpc_orchestrator::{BackoffConfig, Execute, ExecuteContext, Network, Node};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const TEST_METHOD: &str = "test.Service/submit";

/// One scripted answer of a mock node.
#[derive(Debug, Clone)]
pub enum Reply {
    Precheck(Status),
    Transport(Code),
}

impl Reply {
    fn into_result(self) -> std::result::Result<Value, TransportError> {
        match self {
            Reply::Precheck(status) => Ok(precheck_payload(status)),
            Reply::Transport(code) => Err(TransportError::new(code, "scripted failure")),
        }
    }
}

pub fn precheck_payload(status: Status) -> Value {
    json!({ "header": { "node_transaction_precheck_code": status.code() } })
}

/// In-memory node. Answers the probe method with OK unless told otherwise;
/// answers everything else from a script, repeating the last entry.
pub struct MockChannel {
    script: Mutex<VecDeque<Reply>>,
    ping_reply: Reply,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockChannel {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Self::with_ping(script, Reply::Precheck(Status::Ok))
    }

    pub fn always(reply: Reply) -> Arc<Self> {
        Self::new(vec![reply])
    }

    pub fn with_ping(script: Vec<Reply>, ping_reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ping_reply,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Payloads received for `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.calls_to(TEST_METHOD)
    }

    pub fn pings(&self) -> usize {
        self.calls_to(methods::CRYPTO_GET_BALANCE).len()
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(Reply::Transport(Code::Unimplemented))
        }
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn unary(
        &self,
        method: &str,
        payload: Value,
        _timeout: Option<Duration>,
    ) -> std::result::Result<Value, TransportError> {
        self.calls.lock().push((method.to_string(), payload));

        if method == methods::CRYPTO_GET_BALANCE {
            return self.ping_reply.clone().into_result();
        }
        self.next_reply().into_result()
    }

    async fn server_streaming(&self, method: &str, _payload: Value) -> std::result::Result<ItemStream, TransportError> {
        Err(TransportError::new(Code::Unimplemented, method))
    }
}

pub fn node_id(index: usize) -> AccountId {
    AccountId::from_num(3 + index as u64)
}

/// Network whose node `i` (account `0.0.{3+i}`) is backed by `channels[i]`.
pub fn network_of(channels: &[Arc<MockChannel>]) -> Arc<Network> {
    let nodes = channels
        .iter()
        .enumerate()
        .map(|(index, channel)| {
            let channel: Arc<dyn Channel> = channel.clone();
            Node::new(node_id(index), vec![format!("node{index}:50211")], channel)
        })
        .collect();
    Arc::new(Network::new(nodes))
}

pub fn context(network: Arc<Network>) -> ExecuteContext {
    ExecuteContext::new(network, &BackoffConfig::default())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub transaction_id: Option<TransactionId>,
    pub node_account_id: AccountId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub header: ResponseHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub node_account_id: AccountId,
    pub transaction_id: Option<TransactionId>,
}

/// Minimal transaction: needs a transaction id unless `no_payment` is set,
/// retries the prechecks it is told to.
#[derive(Debug, Clone, Default)]
pub struct TestTransaction {
    pub node_account_ids: Option<Vec<AccountId>>,
    pub transaction_id: Option<TransactionId>,
    pub operator_account_id: Option<AccountId>,
    pub regenerate_transaction_id: Option<bool>,
    pub retry_prechecks: Vec<Status>,
    pub no_payment: bool,
}

impl TestTransaction {
    pub fn to_nodes(indexes: &[usize]) -> Self {
        Self {
            node_account_ids: Some(indexes.iter().copied().map(node_id).collect()),
            operator_account_id: Some(AccountId::from_num(1001)),
            ..Default::default()
        }
    }

    pub fn anywhere() -> Self {
        Self {
            operator_account_id: Some(AccountId::from_num(1001)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Execute for TestTransaction {
    type WireRequest = SubmitRequest;
    type WireResponse = SubmitResponse;
    type Context = ();
    type Response = Submitted;

    const METHOD: &'static str = TEST_METHOD;

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.node_account_ids.as_deref()
    }

    fn explicit_transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    fn requires_transaction_id(&self) -> bool {
        !self.no_payment
    }

    fn operator_account_id(&self) -> Option<AccountId> {
        self.operator_account_id
    }

    fn regenerate_transaction_id(&self) -> Option<bool> {
        self.regenerate_transaction_id
    }

    fn should_retry_precheck(&self, status: Status) -> bool {
        self.retry_prechecks.contains(&status)
    }

    fn make_request(
        &self,
        transaction_id: Option<&TransactionId>,
        node_account_id: AccountId,
    ) -> Result<(Self::WireRequest, Self::Context)> {
        Ok((
            SubmitRequest {
                transaction_id: transaction_id.copied(),
                node_account_id,
            },
            (),
        ))
    }

    fn make_response(
        &self,
        _response: Self::WireResponse,
        _context: Self::Context,
        node_account_id: AccountId,
        transaction_id: Option<TransactionId>,
    ) -> Result<Self::Response> {
        Ok(Submitted {
            node_account_id,
            transaction_id,
        })
    }

    fn response_precheck_status(response: &Self::WireResponse) -> i32 {
        response.header.node_transaction_precheck_code
    }
}

/// Routes `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
