use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{CallbackLog, NewCallbackLog},
    traits::{CallbackStats, StatsWindow},
};

/// Appends a raw inbound callback to the audit log. Rows are write-once; there is deliberately no update function
/// in this module.
pub async fn insert_callback(log: NewCallbackLog, conn: &mut SqliteConnection) -> Result<CallbackLog, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO callback_logs
                (gateway, order_number, transaction_id, status, raw_params, parsed_response, process_result,
                 error, request_ip, user_agent, process_time_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(log.gateway)
    .bind(log.order_number)
    .bind(log.transaction_id)
    .bind(log.status)
    .bind(log.raw_params)
    .bind(log.parsed_response)
    .bind(log.process_result)
    .bind(log.error)
    .bind(log.request_ip)
    .bind(log.user_agent)
    .bind(log.process_time_ms)
    .fetch_one(conn)
    .await
}

/// Per-gateway, per-result counts and mean processing time, optionally bounded by a time window.
pub async fn callback_stats(
    window: StatsWindow,
    conn: &mut SqliteConnection,
) -> Result<Vec<CallbackStats>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT gateway, process_result, COUNT(*) AS count,
           COALESCE(AVG(process_time_ms), 0.0) AS avg_process_time_ms
    FROM callback_logs
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
    builder.push(" GROUP BY gateway, process_result ORDER BY gateway, process_result");
    trace!("📝️ Executing query: {}", builder.sql());
    let stats = builder.build_query_as::<CallbackStats>().fetch_all(conn).await?;
    Ok(stats)
}
