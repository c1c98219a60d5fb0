use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ledgerpc_common::transport::Channel;
use ledgerpc_common::AccountId;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Per-node backoff applied the first time a node is marked unhealthy.
pub const UNHEALTHY_INITIAL_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound of the per-node unhealthy backoff.
pub const UNHEALTHY_MAX_BACKOFF: Duration = Duration::from_secs(30 * 60);

/// How long a successful contact keeps a node from being probed again.
pub const RECENTLY_PINGED_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Health of one node as last observed by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeHealth {
    /// Never contacted. Counts as healthy but not recently contacted.
    Unused,
    /// Last contact succeeded at `used_at`.
    Healthy { used_at: Instant },
    /// Last contact failed; the node is excluded until `healthy_at`.
    Unhealthy {
        backoff_interval: Duration,
        healthy_at: Instant,
    },
}

impl NodeHealth {
    pub fn is_healthy(&self, now: Instant) -> bool {
        match self {
            NodeHealth::Unused | NodeHealth::Healthy { .. } => true,
            NodeHealth::Unhealthy { healthy_at, .. } => *healthy_at <= now,
        }
    }

    /// Whether a probe can be skipped for this node.
    pub fn recently_pinged(&self, now: Instant) -> bool {
        match self {
            NodeHealth::Unused => false,
            NodeHealth::Healthy { used_at } => now.saturating_duration_since(*used_at) < RECENTLY_PINGED_WINDOW,
            NodeHealth::Unhealthy { healthy_at, .. } => now < *healthy_at,
        }
    }

    pub fn mark_healthy(&mut self, now: Instant) {
        *self = NodeHealth::Healthy { used_at: now };
    }

    /// Excludes the node for a backoff that doubles on every consecutive
    /// failure, capped at [`UNHEALTHY_MAX_BACKOFF`].
    pub fn mark_unhealthy(&mut self, now: Instant) {
        let backoff_interval = match self {
            NodeHealth::Unhealthy { backoff_interval, .. } => {
                backoff_interval.saturating_mul(2).min(UNHEALTHY_MAX_BACKOFF)
            }
            NodeHealth::Unused | NodeHealth::Healthy { .. } => UNHEALTHY_INITIAL_BACKOFF,
        };

        *self = NodeHealth::Unhealthy {
            backoff_interval,
            healthy_at: now + backoff_interval,
        };
    }
}

/// A consensus node: its account id, addresses, channel and health record.
///
/// The health record is shared, so a registry rebuilt from new addresses can
/// keep the record of a node it already knew.
#[derive(Clone)]
pub struct Node {
    account_id: AccountId,
    addresses: Vec<String>,
    channel: Arc<dyn Channel>,
    health: Arc<Mutex<NodeHealth>>,
}

impl Node {
    pub fn new(account_id: AccountId, addresses: Vec<String>, channel: Arc<dyn Channel>) -> Self {
        Self {
            account_id,
            addresses,
            channel,
            health: Arc::new(Mutex::new(NodeHealth::Unused)),
        }
    }

    pub(crate) fn with_shared_health(mut self, other: &Node) -> Self {
        self.health = other.health.clone();
        self
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn channel(&self) -> Arc<dyn Channel> {
        self.channel.clone()
    }

    pub fn health(&self) -> NodeHealth {
        *self.health.lock()
    }

    pub fn is_healthy(&self, now: Instant) -> bool {
        self.health.lock().is_healthy(now)
    }

    pub fn recently_pinged(&self, now: Instant) -> bool {
        self.health.lock().recently_pinged(now)
    }

    pub fn mark_healthy(&self, now: Instant) {
        self.health.lock().mark_healthy(now);
    }

    pub fn mark_unhealthy(&self, now: Instant) {
        self.health.lock().mark_unhealthy(now);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("account_id", &self.account_id)
            .field("addresses", &self.addresses)
            .field("health", &self.health())
            .finish_non_exhaustive()
    }
}
