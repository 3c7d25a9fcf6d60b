use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{CallbackLog, GatewayTransaction, NewCallbackLog, OrderNumber},
    traits::{CallbackStats, LedgerStats, PaymentGatewayDatabase, PaymentGatewayError, StatsWindow},
};

/// Read/append access to the transaction ledger and callback audit log. Never load-bearing for financial
/// correctness; reconciliation is the sole source of truth for order/payment state.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> LedgerApi<B>
where B: PaymentGatewayDatabase
{
    /// Append a raw inbound callback to the audit log. Recorded regardless of whether reconciliation accepted it.
    pub async fn record_callback(&self, log: NewCallbackLog) -> Result<CallbackLog, PaymentGatewayError> {
        let entry = self.db.record_callback(log).await?;
        trace!("🗒️ Callback #{} recorded in the audit log ({})", entry.id, entry.process_result);
        Ok(entry)
    }

    pub async fn transactions_for_order(
        &self,
        number: &OrderNumber,
    ) -> Result<Vec<GatewayTransaction>, PaymentGatewayError> {
        self.db.fetch_gateway_transactions_for_order(number).await
    }

    pub async fn ledger_stats(&self, window: StatsWindow) -> Result<Vec<LedgerStats>, PaymentGatewayError> {
        self.db.ledger_stats(window).await
    }

    pub async fn callback_stats(&self, window: StatsWindow) -> Result<Vec<CallbackStats>, PaymentGatewayError> {
        self.db.callback_stats(window).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
