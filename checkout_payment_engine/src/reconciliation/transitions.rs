//! Pure order state-transition functions.
//!
//! Each function takes an immutable snapshot of the order, decides whether the event may be applied, and returns
//! the next state together with the rows the storage layer must persist in one transaction. Keeping the rules here
//! makes the idempotency and no-downgrade invariants testable without a database.
//!
//! The allowed transitions:
//!
//! | From \ Event     | success | failure          | cancellation |
//! |------------------|---------|------------------|--------------|
//! | PendingPayment   | Paid    | (payment row)    | Cancelled    |
//! | Paid             | no-op   | no-op            | no-op        |
//! | Completed        | no-op   | no-op            | no-op        |
//! | Cancelled        | no-op   | no-op            | no-op        |
//! | Refunded         | no-op   | no-op            | no-op        |
//!
//! A failure never changes `order.status`: the customer can retry checkout on the same order, so a failed attempt
//! only adds a `FAILED` payment row and a history entry.

use chrono::{DateTime, Utc};
use cpg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{Gateway, Order, OrderStatusType, PaymentStatus, TransactionStatus},
    gateways::PaymentOutcome,
};

pub const ACTION_PAYMENT_SUCCESS: &str = "PAYMENT_SUCCESS";
pub const ACTION_PAYMENT_FAILED: &str = "PAYMENT_FAILED";
pub const ACTION_ORDER_CANCELLED: &str = "ORDER_CANCELLED";

/// The event cannot be applied to the order in its current state. This is the expected idempotency path for
/// re-delivered callbacks, not an error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order is in state {0}, the event is a no-op")]
pub struct TransitionRejected(pub OrderStatusType);

/// An OrderHistory row to append as part of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub action_type: &'static str,
    pub description: String,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
}

/// The OrderPayment row to upsert as part of a transition. The storage layer matches an existing row on
/// `(order_id, gateway_transaction_id)` and updates it, or inserts a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub gateway: Gateway,
    pub gateway_transaction_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_amount: Money,
    pub notes: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
}

/// The terminal status to stamp on the matching ledger row, inside the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFinalization {
    pub gateway: Gateway,
    pub gateway_transaction_id: Option<String>,
    pub status: TransactionStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SuccessTransition {
    pub new_status: OrderStatusType,
    pub payment_time: DateTime<Utc>,
    pub payment: PaymentRecord,
    pub history: HistoryEntry,
    pub ledger: LedgerFinalization,
}

#[derive(Debug, Clone)]
pub struct FailureTransition {
    /// `order.status` is never changed by a failure
    pub payment: PaymentRecord,
    pub history: HistoryEntry,
    pub ledger: LedgerFinalization,
}

#[derive(Debug, Clone)]
pub struct CancellationTransition {
    pub new_status: OrderStatusType,
    pub history: HistoryEntry,
    pub ledger: LedgerFinalization,
}

/// A successful payment moves the order from `PendingPayment` to `Paid`. Any other starting state rejects the
/// event, which is exactly what makes re-delivery of an already-applied success callback harmless.
pub fn on_payment_success(
    order: &Order,
    outcome: &PaymentOutcome,
    now: DateTime<Utc>,
) -> Result<SuccessTransition, TransitionRejected> {
    if order.status != OrderStatusType::PendingPayment {
        return Err(TransitionRejected(order.status));
    }
    let payment_time = outcome.payment_time.unwrap_or(now);
    let amount = outcome.amount.unwrap_or(order.total_amount);
    let txid = outcome.transaction_id.clone().unwrap_or_default();
    Ok(SuccessTransition {
        new_status: OrderStatusType::Paid,
        payment_time,
        payment: PaymentRecord {
            gateway: outcome.gateway,
            gateway_transaction_id: outcome.transaction_id.clone(),
            payment_status: PaymentStatus::Paid,
            payment_amount: amount,
            notes: None,
            payment_time: Some(payment_time),
        },
        history: HistoryEntry {
            action_type: ACTION_PAYMENT_SUCCESS,
            description: format!("Payment of {amount} received via {} (transaction {txid})", outcome.gateway),
            old_status: order.status,
            new_status: OrderStatusType::Paid,
        },
        ledger: LedgerFinalization {
            gateway: outcome.gateway,
            gateway_transaction_id: outcome.transaction_id.clone(),
            status: TransactionStatus::Success,
            error_message: None,
        },
    })
}

/// A failed attempt must not cancel an order the customer can retry, and must not downgrade a paid one. The order
/// status is untouched; the failure is recorded on the payment sub-ledger and in history.
pub fn on_payment_failure(order: &Order, outcome: &PaymentOutcome) -> Result<FailureTransition, TransitionRejected> {
    if order.status != OrderStatusType::PendingPayment {
        return Err(TransitionRejected(order.status));
    }
    let error = outcome.message.clone().unwrap_or_else(|| "Payment failed".to_string());
    Ok(FailureTransition {
        payment: PaymentRecord {
            gateway: outcome.gateway,
            gateway_transaction_id: outcome.transaction_id.clone(),
            payment_status: PaymentStatus::Failed,
            payment_amount: outcome.amount.unwrap_or(order.total_amount),
            notes: Some(error.clone()),
            payment_time: None,
        },
        history: HistoryEntry {
            action_type: ACTION_PAYMENT_FAILED,
            description: format!("Payment via {} failed: {error}", outcome.gateway),
            old_status: order.status,
            new_status: order.status,
        },
        ledger: LedgerFinalization {
            gateway: outcome.gateway,
            gateway_transaction_id: outcome.transaction_id.clone(),
            status: TransactionStatus::Failed,
            error_message: Some(error),
        },
    })
}

/// Cancellation is rejected once the order has reached a terminal completed state, and re-cancelling a cancelled
/// order is a no-op.
pub fn on_cancellation(order: &Order, gateway: Gateway) -> Result<CancellationTransition, TransitionRejected> {
    if order.status.is_finalized() || order.status == OrderStatusType::Cancelled {
        return Err(TransitionRejected(order.status));
    }
    Ok(CancellationTransition {
        new_status: OrderStatusType::Cancelled,
        history: HistoryEntry {
            action_type: ACTION_ORDER_CANCELLED,
            description: format!("Order cancelled before payment completed ({gateway})"),
            old_status: order.status,
            new_status: OrderStatusType::Cancelled,
        },
        ledger: LedgerFinalization {
            gateway,
            gateway_transaction_id: None,
            status: TransactionStatus::Cancelled,
            error_message: None,
        },
    })
}
