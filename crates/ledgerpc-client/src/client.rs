use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use ledgerpc_common::transport::{Connector, TcpConnector};
use ledgerpc_common::{AccountId, Result};
use ledgerpc_metrics::{MetricsRegistry, MetricsSnapshot};
use ledgerpc_orchestrator::{execute, ping, ping_all, BackoffConfig, Execute, ExecuteContext, Network};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ClientConfig, DEFAULT_SUBSCRIPTION_TIMEOUT};
use crate::mirror::{self, MirrorNetwork, MirrorRequest, SubscribeIterator};

/// Entry point for talking to a ledger network and its mirror nodes.
///
/// The client is cheap to share behind an `Arc`; every call takes a snapshot
/// of the current network, so replacing the network with
/// [`set_network`](Self::set_network) never disturbs calls in flight.
pub struct Client {
    network: RwLock<Arc<Network>>,
    mirror_network: RwLock<Arc<MirrorNetwork>>,
    connector: Arc<dyn Connector>,
    operator: RwLock<Option<AccountId>>,
    regenerate_transaction_id: AtomicBool,
    backoff: BackoffConfig,
    metrics: Arc<MetricsRegistry>,
}

impl Client {
    /// Creates a client talking TCP to the nodes in `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    pub fn with_connector(config: &ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;

        let network = Network::from_addresses(&config.network_addresses()?, connector.as_ref())?;
        let mirror_network = MirrorNetwork::from_addresses(&config.mirror_network, connector.as_ref())?;

        info!(
            nodes = network.len(),
            mirror_nodes = mirror_network.len(),
            "client created"
        );

        Ok(Self {
            network: RwLock::new(Arc::new(network)),
            mirror_network: RwLock::new(Arc::new(mirror_network)),
            connector,
            operator: RwLock::new(config.operator_account_id()?),
            regenerate_transaction_id: AtomicBool::new(config.regenerate_transaction_id),
            backoff: config.backoff.clone(),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    /// Creates a client over already built networks, with default settings.
    pub fn for_network(network: Network, mirror_network: MirrorNetwork) -> Self {
        Self {
            network: RwLock::new(Arc::new(network)),
            mirror_network: RwLock::new(Arc::new(mirror_network)),
            connector: Arc::new(TcpConnector),
            operator: RwLock::new(None),
            regenerate_transaction_id: AtomicBool::new(true),
            backoff: BackoffConfig::default(),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn operator(&self) -> Option<AccountId> {
        *self.operator.read()
    }

    pub fn set_operator(&self, operator: Option<AccountId>) {
        *self.operator.write() = operator;
    }

    pub fn regenerate_transaction_id(&self) -> bool {
        self.regenerate_transaction_id.load(Ordering::Relaxed)
    }

    pub fn set_regenerate_transaction_id(&self, regenerate: bool) {
        self.regenerate_transaction_id.store(regenerate, Ordering::Relaxed);
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Snapshot of the current node registry.
    pub fn network(&self) -> Arc<Network> {
        self.network.read().clone()
    }

    /// Replaces the node registry, keeping the health of known nodes.
    pub fn set_network(&self, addresses: &HashMap<String, AccountId>) -> Result<()> {
        let current = self.network();
        let replacement = current.with_addresses(addresses, self.connector.as_ref())?;

        info!(before = current.len(), after = replacement.len(), "network updated");
        *self.network.write() = Arc::new(replacement);
        Ok(())
    }

    pub fn mirror_network(&self) -> Arc<MirrorNetwork> {
        self.mirror_network.read().clone()
    }

    pub fn set_mirror_network(&self, addresses: &[String]) -> Result<()> {
        let replacement = MirrorNetwork::from_addresses(addresses, self.connector.as_ref())?;
        *self.mirror_network.write() = Arc::new(replacement);
        Ok(())
    }

    /// Execution settings for one call, over the current network.
    pub fn execute_context(&self) -> ExecuteContext {
        ExecuteContext::new(self.network(), &self.backoff)
            .with_operator(self.operator())
            .with_regenerate_transaction_id(self.regenerate_transaction_id())
            .with_metrics(self.metrics.clone())
    }

    /// Runs `request` against the network with the configured retry policy.
    pub async fn execute<E: Execute>(&self, request: &E) -> Result<E::Response> {
        execute(&self.execute_context(), request).await
    }

    /// Like [`execute`](Self::execute), with `timeout` as the backoff window.
    pub async fn execute_with_timeout<E: Execute>(&self, request: &E, timeout: Duration) -> Result<E::Response> {
        let ctx = self.execute_context().with_request_timeout(timeout);
        execute(&ctx, request).await
    }

    pub async fn ping(&self, node_account_id: AccountId) -> Result<()> {
        ping(&self.execute_context(), node_account_id).await
    }

    pub async fn ping_all(&self) -> Result<()> {
        ping_all(&self.execute_context()).await
    }

    /// Subscribes to `request` on a randomly chosen mirror node.
    pub fn subscribe<R: MirrorRequest>(&self, request: R) -> Result<BoxStream<'static, Result<R::Item>>> {
        self.subscribe_with(request, None, None)
    }

    /// Subscribes with an explicit retry window and cancellation token.
    ///
    /// `timeout` bounds retries of errors the request marks retryable and
    /// defaults to [`DEFAULT_SUBSCRIPTION_TIMEOUT`]. Once `cancel` fires the
    /// stream yields [`LedgerError::Cancelled`](ledgerpc_common::LedgerError::Cancelled)
    /// and ends.
    pub fn subscribe_with<R: MirrorRequest>(
        &self,
        request: R,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<BoxStream<'static, Result<R::Item>>> {
        Ok(self.subscribe_iterator(request, timeout, cancel)?.into_item_stream())
    }

    /// Subscribes and waits for the subscription to end, returning every item.
    pub async fn collect<R: MirrorRequest>(&self, request: R, timeout: Option<Duration>) -> Result<Vec<R::Item>> {
        mirror::collect(self.subscribe_iterator(request, timeout, None)?).await
    }

    fn subscribe_iterator<R: MirrorRequest>(
        &self,
        request: R,
        timeout: Option<Duration>,
        cancel: Option<CancellationToken>,
    ) -> Result<SubscribeIterator<R>> {
        let channel = self.mirror_network().channel()?;
        let iterator = SubscribeIterator::new(
            Arc::new(request),
            channel,
            timeout.unwrap_or(DEFAULT_SUBSCRIPTION_TIMEOUT),
        )
        .with_metrics(self.metrics.clone());

        Ok(match cancel {
            Some(cancel) => iterator.with_cancellation(cancel),
            None => iterator,
        })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("network", &self.network())
            .field("mirror_network", &self.mirror_network())
            .field("operator", &self.operator())
            .field("backoff", &self.backoff)
            .finish()
    }
}
