//! Ledgerpc Client
//!
//! Caller-facing client for a ledger network: queries and transactions run
//! through the request execution engine, topic subscriptions run against
//! mirror nodes.
//!
//! # Components
//!
//! - **[`Client`]**: network, mirror network, operator and retry settings
//! - **[`ClientConfig`]**: JSON configuration
//! - **[`AccountBalanceQuery`]** / **[`TransactionReceiptQuery`]**: node queries
//! - **[`TopicMessageQuery`]**: topic subscription with chunk reassembly
//! - **[`SubscribeIterator`]**: reconnecting mirror stream
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use ledgerpc_client::{AccountBalanceQuery, Client, ClientConfig, TopicMessageQuery};
//! use ledgerpc_common::{AccountId, TopicId};
//!
//! # async fn example() -> ledgerpc_common::Result<()> {
//! let client = Client::from_config(&ClientConfig::from_file("ledgerpc.json")?)?;
//!
//! let balance = client.execute(&AccountBalanceQuery::new(AccountId::from_num(1001))).await?;
//! println!("balance: {}", balance.balance);
//!
//! let mut messages = client.subscribe(TopicMessageQuery::new(TopicId::from_num(42)))?;
//! while let Some(message) = messages.next().await {
//!     println!("{:?}", message?.contents);
//! }
//! # Ok(())
//! # }
//! ```

pub mod balance;
pub mod client;
pub mod config;
pub mod mirror;
pub mod reassembly;
pub mod receipt;
pub mod topic;

pub use balance::{AccountBalance, AccountBalanceQuery};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_SUBSCRIPTION_TIMEOUT};
pub use mirror::{MirrorContext, MirrorNetwork, MirrorRequest, SubscribeIterator};
pub use reassembly::{ChunkReassembler, CHUNK_EXPIRY};
pub use receipt::{TransactionReceipt, TransactionReceiptQuery};
pub use topic::{TopicContext, TopicMessage, TopicMessageChunk, TopicMessageQuery};
