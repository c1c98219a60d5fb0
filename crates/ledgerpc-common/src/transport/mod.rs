//! Ledgerpc Transport Layer
//!
//! This module provides the [`Channel`] abstraction the execution engine and
//! the subscription engine talk through, plus a TCP implementation of it.
//!
//! # Architecture
//!
//! - **Transport**: TCP, one connection per call
//! - **Codec**: JSON serialization for call frames
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Components
//!
//! - **[`Channel`]**: unary and server-streaming calls against one node
//! - **[`Connector`]** / **[`TcpConnector`]**: open a channel for a node's addresses
//! - **[`JsonCodec`]**: encode/decode call frames
//! - **[`TcpChannel`]**: TCP client channel
//! - **[`TcpServer`]** / **[`Service`]**: TCP server dispatching frames to a service
//!
//! # Error Mapping
//!
//! Failures surface as [`TransportError`] carrying a [`Code`]. Refused or
//! dropped connections map to [`Code::Unavailable`] and elapsed call timeouts
//! map to [`Code::DeadlineExceeded`].

pub mod codec;
pub mod tcp;
pub mod tcp_server;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::error::Result;
use crate::protocol::status::Code;

pub use codec::JsonCodec;
pub use tcp::{TcpChannel, TcpConnector};
pub use tcp_server::{Service, TcpServer};


/// Stream of payloads produced by a server-streaming call.
pub type ItemStream = BoxStream<'static, std::result::Result<Value, TransportError>>;

/// Failure of a call at the transport boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code:?}: {message}")]
pub struct TransportError {
    pub code: Code,
    pub message: String,
}

impl TransportError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// See [`Code::is_node_unavailable`].
    pub fn is_node_unavailable(&self) -> bool {
        self.code.is_node_unavailable()
    }
}

/// A logical connection to one node.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Sends one request and waits for one response.
    async fn unary(
        &self,
        method: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> std::result::Result<Value, TransportError>;

    /// Opens a server-streaming call.
    ///
    /// Errors that occur while opening the call are returned directly; errors
    /// that occur later are yielded by the stream, which then ends.
    async fn server_streaming(
        &self,
        method: &str,
        payload: Value,
    ) -> std::result::Result<ItemStream, TransportError>;
}

/// Opens channels for node addresses.
pub trait Connector: Send + Sync {
    /// Opens a channel over `addresses`, all of which belong to one node.
    fn open(&self, addresses: &[String]) -> Result<Arc<dyn Channel>>;
}
