use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use ledgerpc_common::messages::{methods, CryptoGetAccountBalanceQuery, CryptoGetAccountBalanceResponse, QueryHeader};
use ledgerpc_common::{AccountId, LedgerError, Result, Status, TransactionId};
use tracing::debug;

use crate::orchestrator::{execute, execute_inner, Execute, ExecuteContext};

/// Free balance query for a node's own account, sent to that node only.
#[derive(Debug, Clone)]
pub struct PingQuery {
    node_account_ids: [AccountId; 1],
}

impl PingQuery {
    pub fn new(node_account_id: AccountId) -> Self {
        Self {
            node_account_ids: [node_account_id],
        }
    }

    pub fn node_account_id(&self) -> AccountId {
        self.node_account_ids[0]
    }
}

#[async_trait]
impl Execute for PingQuery {
    type WireRequest = CryptoGetAccountBalanceQuery;
    type WireResponse = CryptoGetAccountBalanceResponse;
    type Context = ();
    type Response = ();

    const METHOD: &'static str = methods::CRYPTO_GET_BALANCE;

    fn node_account_ids(&self) -> Option<&[AccountId]> {
        Some(&self.node_account_ids)
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
            account_id: self.node_account_id(),
        };
        Ok((request, ()))
    }

    fn make_response(
        &self,
        _response: Self::WireResponse,
        _context: Self::Context,
        _node_account_id: AccountId,
        _transaction_id: Option<TransactionId>,
    ) -> Result<Self::Response> {
        Ok(())
    }

    fn make_error_precheck(&self, status: Status, _transaction_id: Option<TransactionId>) -> LedgerError {
        LedgerError::QueryNoPaymentPrecheck { status }
    }

    fn response_precheck_status(response: &Self::WireResponse) -> i32 {
        response.header.node_transaction_precheck_code
    }
}

/// Probes the node at `index` once. Returns whether it answered.
///
/// Boxed because probing happens inside node selection, which is itself part
/// of `execute`.
pub(crate) fn ping_node(ctx: &ExecuteContext, index: usize) -> BoxFuture<'_, bool> {
    Box::pin(async move {
        let node_account_id = ctx.network.node(index).account_id();
        let probe_ctx = ctx.for_probe();

        match execute_inner(&probe_ctx, &PingQuery::new(node_account_id)).await {
            Ok(()) => true,
            Err(e) => {
                debug!(node = %node_account_id, error = %e, "probe failed");
                false
            }
        }
    })
}

/// Pings `node_account_id` with the full retry policy of `ctx`.
pub async fn ping(ctx: &ExecuteContext, node_account_id: AccountId) -> Result<()> {
    execute(ctx, &PingQuery::new(node_account_id)).await
}

/// Pings every node of the network concurrently; fails on the first error.
pub async fn ping_all(ctx: &ExecuteContext) -> Result<()> {
    try_join_all(ctx.network.node_ids().into_iter().map(|id| ping(ctx, id))).await?;
    Ok(())
}
