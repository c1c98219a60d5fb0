use async_trait::async_trait;
use ledgerpc_common::messages::{methods, CryptoGetAccountBalanceQuery, CryptoGetAccountBalanceResponse, QueryHeader};
use ledgerpc_common::{AccountId, LedgerError, Result, Status, TransactionId};
use ledgerpc_orchestrator::Execute;
use serde::Serialize;

/// Free query for the balance of an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalanceQuery {
    pub account_id: AccountId,
    pub node_account_ids: Option<Vec<AccountId>>,
}

impl AccountBalanceQuery {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            node_account_ids: None,
        }
    }

    /// Restricts the query to `node_account_ids`, tried in order.
    pub fn with_node_account_ids(mut self, node_account_ids: Vec<AccountId>) -> Self {
        self.node_account_ids = Some(node_account_ids);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    /// Balance in the ledger's smallest unit.
    pub balance: u64,
}

#[async_trait]
impl Execute for AccountBalanceQuery {
    type WireRequest = CryptoGetAccountBalanceQuery;
    type WireResponse = CryptoGetAccountBalanceResponse;
    type Context = ();
    type Response = AccountBalance;

    const METHOD: &'static str = methods::CRYPTO_GET_BALANCE;

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        self.node_account_ids.as_deref()
    }

    fn requires_transaction_id(&self) -> bool {
        false
    }

    fn make_request(
        &self,
        _transaction_id: Option<&TransactionId>,
        _node_account_id: AccountId,
    ) -> Result<(Self::WireRequest, Self::Context)> {
        let request = CryptoGetAccountBalanceQuery {
            header: QueryHeader::default(),
            account_id: self.account_id,
        };
        Ok((request, ()))
    }

    fn make_response(
        &self,
        response: Self::WireResponse,
        _context: Self::Context,
        _node_account_id: AccountId,
        _transaction_id: Option<TransactionId>,
    ) -> Result<Self::Response> {
        Ok(AccountBalance {
            account_id: response.account_id.unwrap_or(self.account_id),
            balance: response.balance,
        })
    }

    fn make_error_precheck(&self, status: Status, _transaction_id: Option<TransactionId>) -> LedgerError {
        LedgerError::QueryNoPaymentPrecheck { status }
    }

    fn response_precheck_status(response: &Self::WireResponse) -> i32 {
        response.header.node_transaction_precheck_code
    }
}
