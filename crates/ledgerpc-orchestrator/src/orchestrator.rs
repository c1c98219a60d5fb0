use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledgerpc_common::transport::{Channel, TransportError};
use ledgerpc_common::{AccountId, LedgerError, Result, Status, TransactionId};
use ledgerpc_metrics::{MetricsRegistry, NodeOutcome};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffConfig, ExponentialBackoff, MaxElapsedTime};
use crate::network::Network;
use crate::node_index::NodeIndexGenerator;

/// A request the execution engine can run against the network.
///
/// Implementors describe how to build the wire request for a node, how to
/// read the node's precheck code out of the wire response, and how to turn an
/// accepted response into the caller's value. The engine owns node
/// selection, retries, backoff and transaction-id regeneration.
#[async_trait]
pub trait Execute: Send + Sync {
    type WireRequest: Serialize + Send;
    type WireResponse: DeserializeOwned + Send;
    /// Per-attempt data carried from `make_request` to `make_response`.
    type Context: Send;
    type Response: Send;

    /// Method name the request is sent to.
    const METHOD: &'static str;

    /// Nodes this request must be sent to, in order. `None` lets the engine
    /// pick among healthy nodes.
    fn node_account_ids(&self) -> Option<&[AccountId]>;

    /// Transaction id fixed by the caller. Never regenerated.
    fn explicit_transaction_id(&self) -> Option<TransactionId> {
        None
    }

    fn requires_transaction_id(&self) -> bool;

    /// Payer for generated transaction ids, overriding the client operator.
    fn operator_account_id(&self) -> Option<AccountId> {
        None
    }

    /// Overrides the client's transaction-id regeneration policy.
    fn regenerate_transaction_id(&self) -> Option<bool> {
        None
    }

    /// Whether a non-OK precheck is worth retrying after a backoff.
    fn should_retry_precheck(&self, _status: Status) -> bool {
        false
    }

    /// Whether an OK response still asks to be retried after a backoff.
    fn should_retry(&self, _response: &Self::WireResponse) -> bool {
        false
    }

    fn make_request(
        &self,
        transaction_id: Option<&TransactionId>,
        node_account_id: AccountId,
    ) -> Result<(Self::WireRequest, Self::Context)>;

    /// Sends one attempt over `channel` and returns the raw response payload.
    async fn send(
        &self,
        channel: &dyn Channel,
        request: Self::WireRequest,
        timeout: Option<Duration>,
    ) -> std::result::Result<Value, TransportError> {
        let payload = serde_json::to_value(request)
            .map_err(|e| TransportError::internal(format!("encoding {}: {}", Self::METHOD, e)))?;
        channel.unary(Self::METHOD, payload, timeout).await
    }

    fn make_response(
        &self,
        response: Self::WireResponse,
        context: Self::Context,
        node_account_id: AccountId,
        transaction_id: Option<TransactionId>,
    ) -> Result<Self::Response>;

    /// Error returned for a terminal precheck.
    fn make_error_precheck(&self, status: Status, transaction_id: Option<TransactionId>) -> LedgerError {
        LedgerError::PrecheckFailed { status, transaction_id }
    }

    fn response_precheck_status(response: &Self::WireResponse) -> i32;
}

/// Everything one `execute` call needs from its client.
#[derive(Debug, Clone)]
pub struct ExecuteContext {
    pub network: Arc<Network>,
    /// Default payer for generated transaction ids.
    pub operator_account_id: Option<AccountId>,
    /// Default regeneration policy on `TransactionExpired`.
    pub regenerate_transaction_id: bool,
    /// Template; each call works on its own reset copy.
    pub backoff: ExponentialBackoff,
    pub max_attempts: usize,
    pub grpc_timeout: Option<Duration>,
    pub metrics: Option<Arc<MetricsRegistry>>,
}

impl ExecuteContext {
    pub fn new(network: Arc<Network>, config: &BackoffConfig) -> Self {
        Self {
            network,
            operator_account_id: None,
            regenerate_transaction_id: true,
            backoff: config.backoff(),
            max_attempts: config.max_attempts,
            grpc_timeout: config.grpc_timeout(),
            metrics: None,
        }
    }

    pub fn with_operator(mut self, operator_account_id: Option<AccountId>) -> Self {
        self.operator_account_id = operator_account_id;
        self
    }

    pub fn with_regenerate_transaction_id(mut self, regenerate: bool) -> Self {
        self.regenerate_transaction_id = regenerate;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Caps the total time the call may keep backing off.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.backoff = self.backoff.with_max_elapsed_time(MaxElapsedTime::Limited(timeout));
        self
    }

    /// Context for a liveness probe: no operator, one attempt, no backoff.
    pub(crate) fn for_probe(&self) -> Self {
        Self {
            network: self.network.clone(),
            operator_account_id: None,
            regenerate_transaction_id: false,
            backoff: self
                .backoff
                .clone()
                .with_max_elapsed_time(MaxElapsedTime::Limited(Duration::ZERO)),
            max_attempts: 1,
            grpc_timeout: self.grpc_timeout,
            metrics: self.metrics.clone(),
        }
    }

    fn record(&self, f: impl FnOnce(&MetricsRegistry)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

/// Runs `executable` against the network until a node accepts it, a terminal
/// error occurs, or the attempt and time limits run out.
///
/// # Errors
///
/// - [`LedgerError::TimedOut`] when `max_attempts` or the backoff window is
///   exhausted; carries the last recorded error
/// - [`LedgerError::PrecheckFailed`] (or the executable's own precheck error)
///   for a terminal precheck
/// - [`LedgerError::GrpcStatus`] for a transport failure other than
///   `Unavailable`/`ResourceExhausted`
/// - [`LedgerError::ResponseStatusUnrecognized`] for a precheck code this
///   client does not know
pub async fn execute<E: Execute>(ctx: &ExecuteContext, executable: &E) -> Result<E::Response> {
    let start = std::time::Instant::now();
    let result = execute_inner(ctx, executable).await;
    ctx.record(|m| m.record_execution(start, result.is_ok()));
    result
}

pub(crate) async fn execute_inner<E: Execute>(ctx: &ExecuteContext, executable: &E) -> Result<E::Response> {
    if ctx.network.is_empty() {
        return Err(LedgerError::Config("network has no nodes".to_string()));
    }

    let explicit_transaction_id = executable.explicit_transaction_id();
    let payer = executable.operator_account_id().or(ctx.operator_account_id);
    let regenerate = executable.requires_transaction_id()
        && explicit_transaction_id.is_none()
        && payer.is_some()
        && executable
            .regenerate_transaction_id()
            .unwrap_or(ctx.regenerate_transaction_id);

    let mut transaction_id = if executable.requires_transaction_id() {
        let id = explicit_transaction_id
            .or_else(|| payer.map(TransactionId::generate))
            .ok_or(LedgerError::NoPayerAccountOrTransactionId)?;
        Some(id)
    } else {
        None
    };

    let explicit_node_indexes = executable
        .node_account_ids()
        .map(|ids| ctx.network.node_indexes_for_ids(ids))
        .transpose()?;

    let mut backoff = ctx.backoff.clone();
    backoff.reset();

    let mut last_error: Option<LedgerError> = None;
    let mut attempt = 0;

    loop {
        let mut node_indexes = NodeIndexGenerator::new(ctx, explicit_node_indexes.as_deref());

        'nodes: while let Some(node_index) = node_indexes.next().await {
            if attempt >= ctx.max_attempts {
                return Err(LedgerError::timed_out(last_error));
            }
            attempt += 1;

            let node = ctx.network.node(node_index);
            let node_account_id = node.account_id();
            let node_label = node_account_id.to_string();

            let (request, context) = executable.make_request(transaction_id.as_ref(), node_account_id)?;
            ctx.record(|m| m.record_attempt(&node_label));

            let channel = node.channel();
            let payload = match executable.send(channel.as_ref(), request, ctx.grpc_timeout).await {
                Ok(payload) => payload,
                Err(error) if error.is_node_unavailable() => {
                    warn!(node = %node_account_id, attempt, code = ?error.code, "node unavailable, trying next node");
                    ctx.network.mark_node_unhealthy(node_index);
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::TransportFailure));
                    last_error = Some(error.into());
                    continue;
                }
                Err(error) => {
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::TransportFailure));
                    return Err(error.into());
                }
            };

            ctx.network.mark_node_healthy(node_index);

            let response: E::WireResponse = serde_json::from_value(payload)
                .map_err(|e| LedgerError::MalformedResponse(format!("{} from {}: {}", E::METHOD, node_account_id, e)))?;

            let status = Status::from_code(E::response_precheck_status(&response));

            match status {
                Status::Ok if executable.should_retry(&response) => {
                    debug!(node = %node_account_id, attempt, "response not final yet, backing off");
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::PrecheckRetry));
                    last_error = Some(executable.make_error_precheck(status, transaction_id));
                    break 'nodes;
                }

                Status::Ok => {
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::Success));
                    return executable.make_response(response, context, node_account_id, transaction_id);
                }

                Status::Busy | Status::PlatformNotActive => {
                    debug!(node = %node_account_id, attempt, status = ?status, "node busy, trying next node");
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::PrecheckRetry));
                    last_error = Some(executable.make_error_precheck(status, transaction_id));
                    continue;
                }

                Status::TransactionExpired if regenerate => {
                    let regenerated = payer.map(TransactionId::generate);
                    info!(
                        node = %node_account_id,
                        attempt,
                        expired = ?transaction_id,
                        regenerated = ?regenerated,
                        "transaction expired, regenerating transaction id"
                    );
                    ctx.record(|m| {
                        m.record_node_outcome(&node_label, NodeOutcome::PrecheckRetry);
                        m.record_regeneration();
                    });
                    last_error = Some(executable.make_error_precheck(status, transaction_id));
                    transaction_id = regenerated;
                    continue;
                }

                Status::Unrecognized(value) => {
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::PrecheckFailure));
                    return Err(LedgerError::ResponseStatusUnrecognized(value));
                }

                _ if executable.should_retry_precheck(status) => {
                    debug!(node = %node_account_id, attempt, status = ?status, "retryable precheck, backing off");
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::PrecheckRetry));
                    last_error = Some(executable.make_error_precheck(status, transaction_id));
                    break 'nodes;
                }

                _ => {
                    ctx.record(|m| m.record_node_outcome(&node_label, NodeOutcome::PrecheckFailure));
                    return Err(executable.make_error_precheck(status, transaction_id));
                }
            }
        }

        let Some(delay) = backoff.next_backoff() else {
            return Err(LedgerError::timed_out(last_error));
        };

        debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before next round");
        ctx.record(|m| m.record_backoff(delay));
        tokio::time::sleep(delay).await;
    }
}
