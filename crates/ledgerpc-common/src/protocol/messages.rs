//! Wire messages exchanged with consensus nodes and mirror nodes.
//!
//! Every node response carries a [`ResponseHeader`] whose precheck code is
//! classified by the execution engine before the payload is looked at.

use serde::{Deserialize, Serialize};

use crate::protocol::ids::{AccountId, Timestamp, TopicId, TransactionId};

/// Method names understood by nodes.
pub mod methods {
    pub const CRYPTO_GET_BALANCE: &str = "proto.CryptoService/cryptoGetBalance";
    pub const GET_TRANSACTION_RECEIPTS: &str = "proto.CryptoService/getTransactionReceipts";
    pub const SUBSCRIBE_TOPIC: &str = "com.hedera.mirror.api.proto.ConsensusService/subscribeTopic";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryHeader {
    /// Signed payment transaction, absent for free queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub node_transaction_precheck_code: i32,
    #[serde(default)]
    pub cost: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoGetAccountBalanceQuery {
    pub header: QueryHeader,
    pub account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoGetAccountBalanceResponse {
    pub header: ResponseHeader,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionGetReceiptQuery {
    pub header: QueryHeader,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceiptBody {
    pub status: i32,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub topic_id: Option<TopicId>,
    #[serde(default)]
    pub topic_sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionGetReceiptResponse {
    pub header: ResponseHeader,
    #[serde(default)]
    pub receipt: Option<TransactionReceiptBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusTopicQuery {
    pub topic_id: Option<TopicId>,
    #[serde(default)]
    pub consensus_start_time: Option<Timestamp>,
    #[serde(default)]
    pub consensus_end_time: Option<Timestamp>,
    /// Zero means unlimited.
    #[serde(default)]
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusMessageChunkInfo {
    #[serde(default)]
    pub initial_transaction_id: Option<TransactionId>,
    pub total: i32,
    pub number: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusTopicResponse {
    #[serde(default)]
    pub consensus_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub message: Vec<u8>,
    #[serde(default)]
    pub running_hash: Vec<u8>,
    #[serde(default)]
    pub running_hash_version: u64,
    pub sequence_number: u64,
    #[serde(default)]
    pub chunk_info: Option<ConsensusMessageChunkInfo>,
}
