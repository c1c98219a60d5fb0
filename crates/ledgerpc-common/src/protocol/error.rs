use thiserror::Error;

use crate::protocol::ids::{AccountId, TransactionId};
use crate::protocol::status::{Code, Status};
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(
        "request timed out{}",
        .last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default()
    )]
    TimedOut {
        #[source]
        last_error: Option<Box<LedgerError>>,
    },

    #[error("transport failed with status {code:?}: {message}")]
    GrpcStatus { code: Code, message: String },

    #[error(
        "transaction{} failed precheck with status `{status:?}`",
        .transaction_id.map(|id| format!(" `{id}`")).unwrap_or_default()
    )]
    PrecheckFailed {
        status: Status,
        transaction_id: Option<TransactionId>,
    },

    #[error("cost query failed precheck with status `{status:?}`")]
    QueryNoPaymentPrecheck { status: Status },

    #[error("node returned unrecognized precheck status {0}")]
    ResponseStatusUnrecognized(i32),

    #[error("node account `{0}` is not in the network")]
    NodeAccountUnknown(AccountId),

    #[error("request needs a transaction id but no payer account or transaction id was set")]
    NoPayerAccountOrTransactionId,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("failed to parse: {0}")]
    BasicParse(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl LedgerError {
    pub fn timed_out(last_error: Option<LedgerError>) -> Self {
        LedgerError::TimedOut {
            last_error: last_error.map(Box::new),
        }
    }

    /// The precheck status carried by this error, if any.
    pub fn precheck_status(&self) -> Option<Status> {
        match self {
            LedgerError::PrecheckFailed { status, .. }
            | LedgerError::QueryNoPaymentPrecheck { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for LedgerError {
    fn from(err: TransportError) -> Self {
        LedgerError::GrpcStatus {
            code: err.code,
            message: err.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
