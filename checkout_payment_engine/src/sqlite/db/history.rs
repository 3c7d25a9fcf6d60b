use sqlx::SqliteConnection;

use crate::{db_types::OrderHistory, reconciliation::transitions::HistoryEntry};

/// Appends an audit entry for an order state change. History rows are write-once.
pub async fn insert_history(
    order_id: i64,
    entry: &HistoryEntry,
    conn: &mut SqliteConnection,
) -> Result<OrderHistory, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_history (order_id, action_type, description, old_status, new_status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(entry.action_type)
    .bind(&entry.description)
    .bind(entry.old_status)
    .bind(entry.new_status)
    .fetch_one(conn)
    .await
}

pub async fn fetch_history_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderHistory>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_history WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await
}
