use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Gateway, Order, OrderNumber},
    gateways::PaymentOutcome,
    reconciliation::{transitions, CallbackResolution},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

/// `ReconciliationApi` is the sole writer of order/payment state driven by verified gateway outcomes.
///
/// Every entry point resolves the order by its business key, decides the transition with the pure functions in
/// [`transitions`], and lets the backend persist it atomically. A returned `Err` means the write failed and the
/// inbound handler must not acknowledge the callback, so the gateway redelivers.
pub struct ReconciliationApi<B> {
    db: B,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ReconciliationApi<B>
where B: PaymentGatewayDatabase
{
    /// Apply a successful payment outcome to its order. Re-delivery of an already-applied callback resolves as
    /// `AlreadyResolved` without touching state.
    pub async fn handle_success(&self, outcome: &PaymentOutcome) -> Result<CallbackResolution, PaymentGatewayError> {
        let Some(order) = self.db.fetch_order_by_number(&outcome.order_number).await? else {
            warn!("🔄️💰️ Success callback references unknown order {}. Rejecting, no writes.", outcome.order_number);
            return Ok(CallbackResolution::OrderNotFound(outcome.order_number.clone()));
        };
        match transitions::on_payment_success(&order, outcome, Utc::now()) {
            Err(rejected) => {
                info!(
                    "🔄️💰️ Success callback for order {} is a no-op (status {}). Expected for re-delivery.",
                    order.order_number, rejected.0
                );
                Ok(CallbackResolution::AlreadyResolved(rejected.0))
            },
            Ok(transition) => match self.db.apply_payment_success(&order, &transition).await {
                Ok(updated) => {
                    info!(
                        "🔄️💰️ Order {} marked as paid ({} via {})",
                        updated.order_number, transition.payment.payment_amount, outcome.gateway
                    );
                    Ok(CallbackResolution::Applied)
                },
                Err(PaymentGatewayError::OrderSuperseded(_)) => self.superseded(&order).await,
                Err(e) => Err(e),
            },
        }
    }

    /// Record a failed payment attempt. The order keeps its status so the customer can retry; a failure arriving
    /// after a success is a no-op.
    pub async fn handle_failure(&self, outcome: &PaymentOutcome) -> Result<CallbackResolution, PaymentGatewayError> {
        let Some(order) = self.db.fetch_order_by_number(&outcome.order_number).await? else {
            warn!("🔄️❌️ Failure callback references unknown order {}. Rejecting, no writes.", outcome.order_number);
            return Ok(CallbackResolution::OrderNotFound(outcome.order_number.clone()));
        };
        match transitions::on_payment_failure(&order, outcome) {
            Err(rejected) => {
                info!(
                    "🔄️❌️ Failure callback for order {} is a no-op (status {}). The order is not downgraded.",
                    order.order_number, rejected.0
                );
                Ok(CallbackResolution::AlreadyResolved(rejected.0))
            },
            Ok(transition) => match self.db.apply_payment_failure(&order, &transition).await {
                Ok(()) => {
                    info!(
                        "🔄️❌️ Failed payment attempt recorded for order {}: {}",
                        order.order_number,
                        transition.ledger.error_message.as_deref().unwrap_or("no detail")
                    );
                    Ok(CallbackResolution::Applied)
                },
                Err(PaymentGatewayError::OrderSuperseded(_)) => self.superseded(&order).await,
                Err(e) => Err(e),
            },
        }
    }

    /// Cancel an order that has not completed payment. Terminal completed states reject the cancellation as a
    /// no-op.
    pub async fn handle_cancellation(
        &self,
        order_number: &OrderNumber,
        gateway: Gateway,
    ) -> Result<CallbackResolution, PaymentGatewayError> {
        let Some(order) = self.db.fetch_order_by_number(order_number).await? else {
            warn!("🔄️🚫️ Cancellation references unknown order {order_number}. Rejecting, no writes.");
            return Ok(CallbackResolution::OrderNotFound(order_number.clone()));
        };
        match transitions::on_cancellation(&order, gateway) {
            Err(rejected) => {
                info!("🔄️🚫️ Cancellation of order {} is a no-op (status {}).", order.order_number, rejected.0);
                Ok(CallbackResolution::AlreadyResolved(rejected.0))
            },
            Ok(transition) => match self.db.apply_cancellation(&order, &transition).await {
                Ok(updated) => {
                    info!("🔄️🚫️ Order {} cancelled.", updated.order_number);
                    Ok(CallbackResolution::Applied)
                },
                Err(PaymentGatewayError::OrderSuperseded(_)) => self.superseded(&order).await,
                Err(e) => Err(e),
            },
        }
    }

    /// A concurrent delivery moved the order out of its snapshot status between our read and the guarded write.
    /// The backend wrote nothing, so this resolves exactly like a re-delivered callback.
    async fn superseded(&self, order: &Order) -> Result<CallbackResolution, PaymentGatewayError> {
        let status =
            self.db.fetch_order_by_number(&order.order_number).await?.map(|o| o.status).unwrap_or(order.status);
        info!(
            "🔄️ Order {} was finalized by a concurrent callback (status {status}). Treating this delivery as a \
             no-op.",
            order.order_number
        );
        Ok(CallbackResolution::AlreadyResolved(status))
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
