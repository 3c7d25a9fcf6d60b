//! Callback reconciliation.
//!
//! Applies verified payment outcomes to order state exactly once. The allowed transitions are pure functions in
//! [`transitions`]; the database trait persists a returned transition atomically. Duplicate and out-of-order
//! callbacks are harmless because the `Paid` transition is only reachable from `PendingPayment`.
pub mod transitions;

use std::fmt::Display;

use crate::db_types::{OrderNumber, OrderStatusType};

/// How a reconciliation entry point resolved a callback. `state_changed()` is the boolean the inbound handler uses
/// to decide its gateway-facing acknowledgement; the variants keep rejected callbacks distinguishable in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResolution {
    /// Order/payment state was changed and the audit trail appended.
    Applied,
    /// The order is not in a state this outcome can move; re-delivery of an already-applied callback lands here.
    AlreadyResolved(OrderStatusType),
    /// The callback references an order number this system has never seen. Nothing was written.
    OrderNotFound(OrderNumber),
}

impl CallbackResolution {
    pub fn state_changed(&self) -> bool {
        matches!(self, CallbackResolution::Applied)
    }
}

impl Display for CallbackResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackResolution::Applied => write!(f, "applied"),
            CallbackResolution::AlreadyResolved(s) => write!(f, "no-op (order status is {s})"),
            CallbackResolution::OrderNotFound(o) => write!(f, "order {o} not found"),
        }
    }
}
