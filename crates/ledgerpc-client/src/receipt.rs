use async_trait::async_trait;
use ledgerpc_common::messages::{methods, QueryHeader, TransactionGetReceiptQuery, TransactionGetReceiptResponse};
use ledgerpc_common::{AccountId, LedgerError, Result, Status, TopicId, TransactionId};
use ledgerpc_orchestrator::Execute;
use serde::Serialize;

/// Free query for the receipt of a submitted transaction.
///
/// Keeps polling, with backoff, until the transaction has reached consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceiptQuery {
    pub transaction_id: TransactionId,
    pub node_account_ids: Option<Vec<AccountId>>,
}

impl TransactionReceiptQuery {
    pub fn new(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id,
            node_account_ids: None,
        }
    }

    pub fn with_node_account_ids(mut self, node_account_ids: Vec<AccountId>) -> Self {
        self.node_account_ids = Some(node_account_ids);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub status: Status,
    pub account_id: Option<AccountId>,
    pub topic_id: Option<TopicId>,
    pub topic_sequence_number: u64,
}

/// Receipt statuses meaning "not reached consensus yet".
fn is_pending(status: Status) -> bool {
    matches!(status, Status::Unknown | Status::Ok | Status::ReceiptNotFound)
}

#[async_trait]
impl Execute for TransactionReceiptQuery {
    type WireRequest = TransactionGetReceiptQuery;
    type WireResponse = TransactionGetReceiptResponse;
    type Context = ();
    type Response = TransactionReceipt;

    const METHOD: &'static str = methods::GET_TRANSACTION_RECEIPTS;

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.node_account_ids.as_deref()
    }

    fn requires_transaction_id(&self) -> bool {
        false
    }

    fn should_retry_precheck(&self, status: Status) -> bool {
        matches!(status, Status::ReceiptNotFound | Status::Busy | Status::Unknown)
    }

    fn should_retry(&self, response: &Self::WireResponse) -> bool {
        response
            .receipt
            .as_ref()
            .is_some_and(|receipt| is_pending(Status::from_code(receipt.status)))
    }

    fn make_request(
        &self,
        _transaction_id: Option<&TransactionId>,
        _node_account_id: AccountId,
    ) -> Result<(Self::WireRequest, Self::Context)> {
        let request = TransactionGetReceiptQuery {
            header: QueryHeader::default(),
            transaction_id: self.transaction_id,
        };
        Ok((request, ()))
    }

    fn make_response(
        &self,
        response: Self::WireResponse,
        _context: Self::Context,
        node_account_id: AccountId,
        _transaction_id: Option<TransactionId>,
    ) -> Result<Self::Response> {
        let receipt = response.receipt.ok_or_else(|| {
            LedgerError::MalformedResponse(format!("receipt of {} from {} has no body", self.transaction_id, node_account_id))
        })?;

        Ok(TransactionReceipt {
            status: Status::from_code(receipt.status),
            account_id: receipt.account_id,
            topic_id: receipt.topic_id,
            topic_sequence_number: receipt.topic_sequence_number,
        })
    }

    fn make_error_precheck(&self, status: Status, _transaction_id: Option<TransactionId>) -> LedgerError {
        LedgerError::QueryNoPaymentPrecheck { status }
    }

    fn response_precheck_status(response: &Self::WireResponse) -> i32 {
        response.header.node_transaction_precheck_code
    }
}
