use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::OrderPayment, reconciliation::transitions::PaymentRecord, traits::PaymentGatewayError};

pub async fn fetch_payment(
    order_id: i64,
    gateway_transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderPayment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM order_payments WHERE order_id = $1 AND gateway_transaction_id = $2")
            .bind(order_id)
            .bind(gateway_transaction_id)
            .fetch_optional(conn)
            .await?;
    Ok(payment)
}

/// Updates the payment row matching `(order_id, gateway_transaction_id)`, or inserts a new one. Rows without a
/// gateway transaction id never match and always insert, so each unidentified attempt is kept.
pub async fn upsert_payment(
    order_id: i64,
    record: &PaymentRecord,
    conn: &mut SqliteConnection,
) -> Result<OrderPayment, PaymentGatewayError> {
    if let Some(txid) = record.gateway_transaction_id.as_deref() {
        if let Some(existing) = fetch_payment(order_id, txid, conn).await? {
            debug!("📝️ Updating existing payment row {} for order id {order_id}", existing.id);
            let updated = sqlx::query_as(
                r#"
                    UPDATE order_payments
                    SET payment_status = $1, payment_amount = $2, notes = $3, payment_time = $4,
                        updated_at = CURRENT_TIMESTAMP
                    WHERE id = $5
                    RETURNING *;
                "#,
            )
            .bind(record.payment_status)
            .bind(record.payment_amount)
            .bind(record.notes.as_deref())
            .bind(record.payment_time)
            .bind(existing.id)
            .fetch_one(conn)
            .await?;
            return Ok(updated);
        }
    }
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO order_payments
                (order_id, gateway, gateway_transaction_id, payment_status, payment_amount, notes, payment_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(record.gateway)
    .bind(record.gateway_transaction_id.as_deref())
    .bind(record.payment_status)
    .bind(record.payment_amount)
    .bind(record.notes.as_deref())
    .bind(record.payment_time)
    .fetch_one(conn)
    .await?;
    Ok(inserted)
}

pub async fn fetch_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_payments WHERE order_id = $1 ORDER BY created_at ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}
