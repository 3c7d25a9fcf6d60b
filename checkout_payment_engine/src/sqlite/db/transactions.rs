use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{GatewayTransaction, NewGatewayTransaction, OrderNumber},
    reconciliation::transitions::LedgerFinalization,
    traits::{LedgerStats, PaymentGatewayError, StatsWindow},
};

/// Records a payment initiation attempt. Every checkout attempt gets its own `INITIATED` row; duplicates across
/// retries are expected and tolerated.
pub async fn insert_transaction(
    tx: NewGatewayTransaction,
    conn: &mut SqliteConnection,
) -> Result<GatewayTransaction, PaymentGatewayError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO gateway_transactions (order_id, order_number, gateway, amount, currency, payment_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(tx.order_id)
    .bind(tx.order_number)
    .bind(tx.gateway)
    .bind(tx.amount)
    .bind(tx.currency)
    .bind(tx.payment_url)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_transactions_for_order(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Vec<GatewayTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM gateway_transactions WHERE order_number = $1 ORDER BY created_at ASC")
        .bind(number.as_str())
        .fetch_all(conn)
        .await
}

/// Stamps the non-terminal ledger rows for `(order_number, gateway)` with the terminal status from reconciliation.
/// Terminal rows are never touched again, so a re-delivered callback leaves the ledger unchanged.
pub async fn finalize_transactions(
    number: &OrderNumber,
    ledger: &LedgerFinalization,
    conn: &mut SqliteConnection,
) -> Result<u64, PaymentGatewayError> {
    let result = sqlx::query(
        r#"
            UPDATE gateway_transactions
            SET status = $1,
                gateway_transaction_id = COALESCE($2, gateway_transaction_id),
                error_message = $3,
                updated_at = CURRENT_TIMESTAMP
            WHERE order_number = $4 AND gateway = $5 AND status IN ('INITIATED', 'PROCESSING')
        "#,
    )
    .bind(ledger.status)
    .bind(ledger.gateway_transaction_id.as_deref())
    .bind(ledger.error_message.as_deref())
    .bind(number.as_str())
    .bind(ledger.gateway)
    .execute(conn)
    .await?;
    debug!("📝️ {} ledger row(s) for order {number} stamped as {}", result.rows_affected(), ledger.status);
    Ok(result.rows_affected())
}

/// Per-gateway, per-status counts and amount sums over the ledger, optionally bounded by a time window.
pub async fn ledger_stats(
    window: StatsWindow,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerStats>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT gateway, status, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS total_amount
    FROM gateway_transactions
    "#,
    );
    if window.since.is_some() || window.until.is_some() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(since) = window.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = window.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" GROUP BY gateway, status ORDER BY gateway, status");
    trace!("📝️ Executing query: {}", builder.sql());
    let stats = builder.build_query_as::<LedgerStats>().fetch_all(conn).await?;
    Ok(stats)
}
