//! Ledgerpc Request Execution Engine
//!
//! This crate drives a single logical request against a network of
//! interchangeable consensus nodes until one of them accepts it.
//!
//! # Overview
//!
//! - **[`Network`]**: registry of nodes, their channels and health
//! - **[`NodeIndexGenerator`]**: which nodes a round tries, probing stale ones
//! - **[`ExponentialBackoff`]**: delays between rounds, bounded by a time window
//! - **[`execute`]**: the retry loop, classifying every outcome as success,
//!   try-next-node, back-off-then-retry, or terminal
//!
//! # Retry Classification
//!
//! | Outcome | Action |
//! |---|---|
//! | transport `Unavailable` / `ResourceExhausted` | mark node unhealthy, try next node |
//! | other transport code | fail with [`ledgerpc_common::LedgerError::GrpcStatus`] |
//! | precheck `Ok` | return the response, unless the request asks to retry it |
//! | precheck `Busy` / `PlatformNotActive` | try next node |
//! | precheck `TransactionExpired` with regeneration on | new transaction id, try next node |
//! | unknown precheck code | fail with `ResponseStatusUnrecognized` |
//! | precheck the request retries | back off, new round |
//! | any other precheck | fail with the request's precheck error |
//!
//! A round ends when its nodes are exhausted or a back-off outcome occurs.
//! Every attempt counts toward `max_attempts`; exceeding it, or running out of
//! backoff time, fails with `TimedOut` carrying the last recorded error.

pub mod backoff;
pub mod network;
pub mod node;
pub mod node_index;
pub mod orchestrator;
pub mod ping;

pub use backoff::{BackoffConfig, ExponentialBackoff, MaxElapsedTime};
pub use network::Network;
pub use node::{Node, NodeHealth};
pub use node_index::NodeIndexGenerator;
pub use orchestrator::{execute, Execute, ExecuteContext};
pub use ping::{ping, ping_all, PingQuery};
