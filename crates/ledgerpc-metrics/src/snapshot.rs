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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metrics for a single node, keyed by its account id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node: String,
    pub attempts: u64,
    pub successes: u64,
    pub transport_failures: u64,
    pub precheck_retries: u64,
    pub precheck_failures: u64,
    pub last_attempt_ms: u64,
}

impl NodeMetrics {
    pub fn new(node: String) -> Self {
        Self {
            node,
            ..Default::default()
        }
    }
}

/// Complete metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub avg_execution_latency_us: u64,
    pub attempts: u64,
    pub backoff_waits: u64,
    pub backoff_wait_ms: u64,
    pub transaction_id_regenerations: u64,
    pub subscription_reconnects: u64,
    pub uptime_ms: u64,
    pub nodes: HashMap<String, NodeMetrics>,
}

impl MetricsSnapshot {
    pub fn new(uptime_ms: u64) -> Self {
        Self {
            uptime_ms,
            ..Default::default()
        }
    }

    /// Share of attempts that ended in a transport failure, in `[0, 1]`.
    pub fn transport_failure_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        let failures: u64 = self.nodes.values().map(|n| n.transport_failures).sum();
        failures as f64 / self.attempts as f64
    }
}
