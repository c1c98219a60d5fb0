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

//! Ledgerpc Metrics Collection
//!
//! Thread-safe counters for the request execution engine and the mirror
//! subscription engine: how many calls ran, how many attempts they took, how
//! each node answered, and how long the client spent backing off.
//!
//! # Architecture
//!
//! - [`MetricsRegistry`]: lock-free counters plus a per-node table
//! - [`MetricsSnapshot`]: serializable point-in-time copy of the registry
//!
//! # Usage Example
//!
//! ```rust
//! use ledgerpc_metrics::{MetricsRegistry, NodeOutcome};
//! use std::time::{Duration, Instant};
//!
//! let metrics = MetricsRegistry::new();
//!
//! let start = Instant::now();
//! metrics.record_attempt("0.0.3");
//! metrics.record_node_outcome("0.0.3", NodeOutcome::TransportFailure);
//! metrics.record_backoff(Duration::from_millis(250));
//! metrics.record_attempt("0.0.4");
//! metrics.record_node_outcome("0.0.4", NodeOutcome::Success);
//! metrics.record_execution(start, true);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.attempts, 2);
//! assert_eq!(snapshot.nodes["0.0.3"].transport_failures, 1);
//! ```
//!
//! # Thread Safety
//!
//! The registry is shared behind an `Arc`. Counters are atomics; the per-node
//! table sits behind a read-mostly `RwLock`.

mod registry;
mod snapshot;

pub use registry::{MetricsRegistry, NodeOutcome};
pub use snapshot::{MetricsSnapshot, NodeMetrics};
