//! Ledgerpc Common Types and Transport
//!
//! This crate provides the protocol definitions and transport layer shared by
//! the ledgerpc request engine and the mirror subscription engine.
//!
//! # Overview
//!
//! - **Protocol Layer**: entity identifiers, timestamps, transaction ids,
//!   precheck statuses, transport codes, wire messages and the error type
//! - **Transport Layer**: the [`transport::Channel`] abstraction plus a TCP
//!   implementation with JSON framing
//!
//! # Wire Format
//!
//! - **Transport**: TCP, one connection per call
//! - **Serialization**: JSON
//! - **Message Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//! - **Max Message Size**: 100 MB
//!
//! # Example
//!
//! ```
//! use ledgerpc_common::{AccountId, Status, TransactionId};
//!
//! let payer: AccountId = "0.0.1001".parse().unwrap();
//! let id = TransactionId::generate(payer);
//! assert_eq!(id.account_id, payer);
//! assert_eq!(Status::from_code(12), Status::Busy);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
