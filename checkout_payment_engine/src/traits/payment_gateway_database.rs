use thiserror::Error;

use crate::{
    db_types::{
        CallbackLog,
        GatewayTransaction,
        NewCallbackLog,
        NewGatewayTransaction,
        NewOrder,
        Order,
        OrderHistory,
        OrderNumber,
        OrderPayment,
    },
    reconciliation::transitions::{CancellationTransition, FailureTransition, SuccessTransition},
    traits::{CallbackStats, LedgerStats, StatsWindow},
};

/// This trait defines the persistence behaviour for backends supporting the checkout payment engine.
///
/// This behaviour includes:
/// * Tracking orders by business key and applying reconciliation transitions to them atomically.
/// * The transaction ledger and the append-only callback audit log.
/// * Read-only rollup statistics over both.
///
/// The `apply_*` operations persist a transition produced by [`crate::reconciliation::transitions`] as one
/// database transaction: a crash mid-sequence must never leave an order update without its payment row or
/// history entry. Each one re-checks the order's status inside that transaction (the transition was decided on a
/// snapshot read earlier, outside it) and fails with [`PaymentGatewayError::OrderSuperseded`] without writing
/// anything when a concurrent transition won the race.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order. Idempotent: returns `false` in the second element if the order number already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError>;

    /// Resolves an order by its business key. Reconciliation never looks orders up any other way.
    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_payment(
        &self,
        order_id: i64,
        gateway_transaction_id: &str,
    ) -> Result<Option<OrderPayment>, PaymentGatewayError>;

    async fn fetch_history_for_order(&self, order_id: i64) -> Result<Vec<OrderHistory>, PaymentGatewayError>;

    /// In a single atomic transaction: set the order to `Paid` with the payment time, upsert the payment row by
    /// `(order_id, gateway_transaction_id)`, append the history entry, and stamp the matching ledger row.
    /// Returns the updated order.
    async fn apply_payment_success(
        &self,
        order: &Order,
        transition: &SuccessTransition,
    ) -> Result<Order, PaymentGatewayError>;

    /// In a single atomic transaction: record the failed payment attempt and append history. The order row is
    /// not modified.
    async fn apply_payment_failure(
        &self,
        order: &Order,
        transition: &FailureTransition,
    ) -> Result<(), PaymentGatewayError>;

    /// In a single atomic transaction: set the order to `Cancelled`, append history, and stamp the ledger.
    /// Returns the updated order.
    async fn apply_cancellation(
        &self,
        order: &Order,
        transition: &CancellationTransition,
    ) -> Result<Order, PaymentGatewayError>;

    /// Records a payment initiation attempt in the ledger. Append-only from the caller's perspective; every
    /// checkout attempt gets its own row.
    async fn insert_gateway_transaction(
        &self,
        tx: NewGatewayTransaction,
    ) -> Result<GatewayTransaction, PaymentGatewayError>;

    async fn fetch_gateway_transactions_for_order(
        &self,
        number: &OrderNumber,
    ) -> Result<Vec<GatewayTransaction>, PaymentGatewayError>;

    /// Appends a raw inbound callback to the audit log. Write-once; rows are never mutated after insert.
    async fn record_callback(&self, log: NewCallbackLog) -> Result<CallbackLog, PaymentGatewayError>;

    async fn ledger_stats(&self, window: StatsWindow) -> Result<Vec<LedgerStats>, PaymentGatewayError>;

    async fn callback_stats(&self, window: StatsWindow) -> Result<Vec<CallbackStats>, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderNumber),
    #[error("A concurrent transition already moved order {0} out of its snapshot status; nothing was written")]
    OrderSuperseded(OrderNumber),
    #[error("The requested ledger transaction (internal id {0}) does not exist")]
    TransactionNotFound(i64),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
