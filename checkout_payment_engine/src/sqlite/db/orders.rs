use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderNumber, OrderStatusType},
    traits::PaymentGatewayError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
/// The insert is a single `ON CONFLICT DO NOTHING` statement, so two concurrent registrations of the same order
/// number both resolve to the one row that won.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, bool), PaymentGatewayError> {
    let number = order.order_number.clone();
    let inserted: Option<Order> = sqlx::query_as(
        r#"
            INSERT INTO orders (order_number, total_amount, currency)
            VALUES ($1, $2, $3)
            ON CONFLICT (order_number) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.total_amount)
    .bind(order.currency)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(order) => {
            debug!("📝️ Order {} inserted with id {}", order.order_number, order.id);
            Ok((order, true))
        },
        None => {
            let existing =
                fetch_order_by_number(&number, conn).await?.ok_or(PaymentGatewayError::OrderNotFound(number))?;
            Ok((existing, false))
        },
    }
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_number = $1")
        .bind(number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Moves the order to `Paid` and stamps the payment time, but only if it is still in `expected`. The status guard
/// on the UPDATE is the serialization point for concurrent callbacks: the statement takes the row's write lock and
/// checks the status in one step. `None` means another transition got there first and nothing was written.
pub(crate) async fn mark_as_paid(
    id: i64,
    payment_time: DateTime<Utc>,
    expected: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, payment_time = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 AND status \
         = $4 RETURNING *",
    )
    .bind(OrderStatusType::Paid)
    .bind(payment_time)
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Moves the order from `expected` to `status` under the same guarded-UPDATE discipline as [`mark_as_paid`].
pub(crate) async fn update_status(
    id: i64,
    status: OrderStatusType,
    expected: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(status)
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Takes the order row's write lock and confirms the status is still `expected`, without changing it. Used by
/// transitions that leave `order.status` alone (a failed payment attempt) but must still be serialized against
/// concurrent status changes.
pub(crate) async fn confirm_status(
    id: i64,
    expected: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = $2 RETURNING *",
    )
    .bind(id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    Ok(result)
}
