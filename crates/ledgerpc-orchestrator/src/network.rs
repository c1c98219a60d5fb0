use std::collections::{BTreeMap, HashMap};

use ledgerpc_common::transport::Connector;
use ledgerpc_common::{AccountId, LedgerError, Result};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::node::{Node, NodeHealth};

/// Registry of the consensus nodes a client talks to.
///
/// Nodes are addressed by position ("node index") in the registry. Indexes
/// are only meaningful for the registry that produced them.
#[derive(Debug, Default, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    index_by_id: HashMap<AccountId, usize>,
}

impl Network {
    /// Builds a registry from nodes. A node whose account id is already
    /// present is ignored.
    pub fn new(nodes: Vec<Node>) -> Self {
        let mut network = Self::default();
        for node in nodes {
            let account_id = node.account_id();
            if network.index_by_id.contains_key(&account_id) {
                warn!(node = %account_id, "duplicate node account id ignored");
                continue;
            }
            network.index_by_id.insert(account_id, network.nodes.len());
            network.nodes.push(node);
        }
        network
    }

    /// Builds a registry from a `"host:port" -> account id` map, opening one
    /// channel per node over all of its addresses.
    pub fn from_addresses(addresses: &HashMap<String, AccountId>, connector: &dyn Connector) -> Result<Self> {
        let nodes = group_addresses(addresses)
            .into_iter()
            .map(|(account_id, addresses)| -> Result<Node> {
                let channel = connector.open(&addresses)?;
                Ok(Node::new(account_id, addresses, channel))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(nodes))
    }

    /// Builds a replacement registry from a new address map.
    ///
    /// Nodes already known to `self` keep their health record; their channel
    /// is also kept when their address set is unchanged.
    pub fn with_addresses(&self, addresses: &HashMap<String, AccountId>, connector: &dyn Connector) -> Result<Self> {
        let nodes = group_addresses(addresses)
            .into_iter()
            .map(|(account_id, addresses)| -> Result<Node> {
                let existing = self.index_by_id.get(&account_id).map(|&index| &self.nodes[index]);

                match existing {
                    Some(node) if node.addresses() == addresses.as_slice() => Ok(node.clone()),
                    Some(node) => {
                        debug!(node = %account_id, "node addresses changed, opening new channel");
                        let channel = connector.open(&addresses)?;
                        Ok(Node::new(account_id, addresses, channel).with_shared_health(node))
                    }
                    None => {
                        let channel = connector.open(&addresses)?;
                        Ok(Node::new(account_id, addresses, channel))
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(nodes))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node at `index`. Panics if `index` did not come from this registry.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_ids(&self) -> Vec<AccountId> {
        self.nodes.iter().map(Node::account_id).collect()
    }

    pub fn index_of(&self, account_id: &AccountId) -> Option<usize> {
        self.index_by_id.get(account_id).copied()
    }

    /// Resolves explicit node ids to indexes, preserving order.
    pub fn node_indexes_for_ids(&self, ids: &[AccountId]) -> Result<Vec<usize>> {
        ids.iter()
            .map(|id| self.index_of(id).ok_or(LedgerError::NodeAccountUnknown(*id)))
            .collect()
    }

    /// Indexes of the nodes currently considered healthy, or of every node
    /// when none are.
    pub fn healthy_node_indexes(&self) -> Vec<usize> {
        self.healthy_node_indexes_at(Instant::now())
    }

    pub fn healthy_node_indexes_at(&self, now: Instant) -> Vec<usize> {
        let healthy: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_healthy(now))
            .map(|(index, _)| index)
            .collect();

        if healthy.is_empty() {
            (0..self.nodes.len()).collect()
        } else {
            healthy
        }
    }

    pub fn mark_node_healthy(&self, index: usize) {
        self.nodes[index].mark_healthy(Instant::now());
    }

    pub fn mark_node_unhealthy(&self, index: usize) {
        let node = &self.nodes[index];
        node.mark_unhealthy(Instant::now());
        if let NodeHealth::Unhealthy { backoff_interval, .. } = node.health() {
            warn!(
                node = %node.account_id(),
                backoff_ms = backoff_interval.as_millis() as u64,
                "node marked unhealthy"
            );
        }
    }

    pub fn node_recently_pinged(&self, index: usize, now: Instant) -> bool {
        self.nodes[index].recently_pinged(now)
    }
}

fn group_addresses(addresses: &HashMap<String, AccountId>) -> BTreeMap<AccountId, Vec<String>> {
    let mut grouped: BTreeMap<AccountId, Vec<String>> = BTreeMap::new();
    for (address, account_id) in addresses {
        grouped.entry(*account_id).or_default().push(address.clone());
    }
    for addresses in grouped.values_mut() {
        addresses.sort();
    }
    grouped
}
