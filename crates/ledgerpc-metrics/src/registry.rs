// Copyright 2025 Ledgerpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::snapshot::{MetricsSnapshot, NodeMetrics};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// How a node answered a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The node answered with an accepted precheck.
    Success,
    /// The call failed before the node answered.
    TransportFailure,
    /// The node answered with a precheck the engine retries.
    PrecheckRetry,
    /// The node answered with a terminal precheck.
    PrecheckFailure,
}

/// Internal storage for per-node metrics.
///
/// All fields are atomics; relaxed ordering is enough since snapshots are
/// best-effort.
#[derive(Debug, Default)]
struct NodeStats {
    attempts: AtomicU64,
    successes: AtomicU64,
    transport_failures: AtomicU64,
    precheck_retries: AtomicU64,
    precheck_failures: AtomicU64,
    last_attempt_ms: AtomicU64,
}

impl NodeStats {
    fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.last_attempt_ms.store(unix_millis(), Ordering::Relaxed);
    }

    fn record_outcome(&self, outcome: NodeOutcome) {
        let counter = match outcome {
            NodeOutcome::Success => &self.successes,
            NodeOutcome::TransportFailure => &self.transport_failures,
            NodeOutcome::PrecheckRetry => &self.precheck_retries,
            NodeOutcome::PrecheckFailure => &self.precheck_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, node: &str) -> NodeMetrics {
        NodeMetrics {
            node: node.to_string(),
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            precheck_retries: self.precheck_retries.load(Ordering::Relaxed),
            precheck_failures: self.precheck_failures.load(Ordering::Relaxed),
            last_attempt_ms: self.last_attempt_ms.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe metrics registry.
///
/// One registry is owned by a client and shared with every execution and
/// subscription it starts. The node table only ever holds nodes of the
/// client's network, so it is not evicted.
#[derive(Debug)]
pub struct MetricsRegistry {
    total_executions: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    total_latency_us: AtomicU64,
    attempts: AtomicU64,
    backoff_waits: AtomicU64,
    backoff_wait_ms: AtomicU64,
    regenerations: AtomicU64,
    reconnects: AtomicU64,
    nodes: RwLock<HashMap<String, Arc<NodeStats>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            total_executions: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            backoff_waits: AtomicU64::new(0),
            backoff_wait_ms: AtomicU64::new(0),
            regenerations: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            nodes: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    fn node(&self, node: &str) -> Arc<NodeStats> {
        if let Some(stats) = self.nodes.read().get(node) {
            return stats.clone();
        }
        self.nodes
            .write()
            .entry(node.to_string())
            .or_default()
            .clone()
    }

    /// Records the end of one `execute` call started at `start`.
    pub fn record_execution(&self, start: Instant, success: bool) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_executions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_executions.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    /// Records one attempt sent to `node`.
    pub fn record_attempt(&self, node: &str) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.node(node).record_attempt();
    }

    pub fn record_node_outcome(&self, node: &str, outcome: NodeOutcome) {
        self.node(node).record_outcome(outcome);
    }

    pub fn record_backoff(&self, delay: Duration) {
        self.backoff_waits.fetch_add(1, Ordering::Relaxed);
        self.backoff_wait_ms
            .fetch_add(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_regeneration(&self) {
        self.regenerations.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a subscription dropping back to reconnect.
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_executions = self.total_executions.load(Ordering::Relaxed);
        let total_latency_us = self.total_latency_us.load(Ordering::Relaxed);

        let nodes = self
            .nodes
            .read()
            .iter()
            .map(|(node, stats)| (node.clone(), stats.snapshot(node)))
            .collect();

        MetricsSnapshot {
            total_executions,
            successful_executions: self.successful_executions.load(Ordering::Relaxed),
            failed_executions: self.failed_executions.load(Ordering::Relaxed),
            avg_execution_latency_us: total_latency_us.checked_div(total_executions).unwrap_or(0),
            attempts: self.attempts.load(Ordering::Relaxed),
            backoff_waits: self.backoff_waits.load(Ordering::Relaxed),
            backoff_wait_ms: self.backoff_wait_ms.load(Ordering::Relaxed),
            transaction_id_regenerations: self.regenerations.load(Ordering::Relaxed),
            subscription_reconnects: self.reconnects.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            nodes,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
