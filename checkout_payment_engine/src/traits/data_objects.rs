use chrono::{DateTime, Utc};
use cpg_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::Gateway;

/// A time window for ledger statistics. Unbounded edges are omitted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Per-gateway, per-status rollup over the transaction ledger. Simple reporting; not part of the core contract.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerStats {
    pub gateway: Gateway,
    pub status: String,
    pub count: i64,
    pub total_amount: Money,
}

/// Per-gateway, per-result rollup over the callback audit log.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CallbackStats {
    pub gateway: Gateway,
    pub process_result: String,
    pub count: i64,
    pub avg_process_time_ms: f64,
}
