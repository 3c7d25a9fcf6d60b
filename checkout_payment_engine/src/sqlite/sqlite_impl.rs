use log::{debug, info};
use sqlx::SqlitePool;

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
    sqlite::db::{self, callback_log, history, order_payments, orders, transactions},
    traits::{CallbackStats, LedgerStats, PaymentGatewayDatabase, PaymentGatewayError, StatsWindow},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new database API handle using the database URL set in the `CPG_DATABASE_URL` envar.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = db::new_pool(url, max_connections).await?;
        info!("🗒️ Connected to database {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::idempotent_insert(order, &mut conn).await
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_payment(
        &self,
        order_id: i64,
        gateway_transaction_id: &str,
    ) -> Result<Option<OrderPayment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let payment = order_payments::fetch_payment(order_id, gateway_transaction_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_history_for_order(&self, order_id: i64) -> Result<Vec<OrderHistory>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let entries = history::fetch_history_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }

    async fn apply_payment_success(
        &self,
        order: &Order,
        transition: &SuccessTransition,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let Some(updated) =
            orders::mark_as_paid(order.id, transition.payment_time, transition.history.old_status, &mut tx).await?
        else {
            tx.rollback().await?;
            return Err(PaymentGatewayError::OrderSuperseded(order.order_number.clone()));
        };
        let payment = order_payments::upsert_payment(order.id, &transition.payment, &mut tx).await?;
        history::insert_history(order.id, &transition.history, &mut tx).await?;
        transactions::finalize_transactions(&order.order_number, &transition.ledger, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🔄️💰️ Order {} marked as {} with payment row {}",
            updated.order_number, updated.status, payment.id
        );
        Ok(updated)
    }

    async fn apply_payment_failure(
        &self,
        order: &Order,
        transition: &FailureTransition,
    ) -> Result<(), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        if orders::confirm_status(order.id, transition.history.old_status, &mut tx).await?.is_none() {
            tx.rollback().await?;
            return Err(PaymentGatewayError::OrderSuperseded(order.order_number.clone()));
        }
        let payment = order_payments::upsert_payment(order.id, &transition.payment, &mut tx).await?;
        history::insert_history(order.id, &transition.history, &mut tx).await?;
        transactions::finalize_transactions(&order.order_number, &transition.ledger, &mut tx).await?;
        tx.commit().await?;
        debug!("🔄️💰️ Failed payment attempt for order {} recorded as row {}", order.order_number, payment.id);
        Ok(())
    }

    async fn apply_cancellation(
        &self,
        order: &Order,
        transition: &CancellationTransition,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let Some(updated) =
            orders::update_status(order.id, transition.new_status, transition.history.old_status, &mut tx).await?
        else {
            tx.rollback().await?;
            return Err(PaymentGatewayError::OrderSuperseded(order.order_number.clone()));
        };
        history::insert_history(order.id, &transition.history, &mut tx).await?;
        transactions::finalize_transactions(&order.order_number, &transition.ledger, &mut tx).await?;
        tx.commit().await?;
        debug!("🔄️💰️ Order {} cancelled", updated.order_number);
        Ok(updated)
    }

    async fn insert_gateway_transaction(
        &self,
        tx: NewGatewayTransaction,
    ) -> Result<GatewayTransaction, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        transactions::insert_transaction(tx, &mut conn).await
    }

    async fn fetch_gateway_transactions_for_order(
        &self,
        number: &OrderNumber,
    ) -> Result<Vec<GatewayTransaction>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let txs = transactions::fetch_transactions_for_order(number, &mut conn).await?;
        Ok(txs)
    }

    async fn record_callback(&self, log: NewCallbackLog) -> Result<CallbackLog, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let row = callback_log::insert_callback(log, &mut conn).await?;
        Ok(row)
    }

    async fn ledger_stats(&self, window: StatsWindow) -> Result<Vec<LedgerStats>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let stats = transactions::ledger_stats(window, &mut conn).await?;
        Ok(stats)
    }

    async fn callback_stats(&self, window: StatsWindow) -> Result<Vec<CallbackStats>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let stats = callback_log::callback_stats(window, &mut conn).await?;
        Ok(stats)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}
