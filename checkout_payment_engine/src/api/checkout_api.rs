use std::fmt::Debug;

use log::*;
use thiserror::Error;

use crate::{
    db_types::{GatewayTransaction, NewGatewayTransaction, NewOrder, Order, OrderNumber, OrderStatusType},
    gateways::{GatewayClient, GatewayError, PaymentInitiation, PaymentRequest},
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("The order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("The order is not awaiting payment (status: {0})")]
    OrderNotPayable(OrderStatusType),
    #[error("The checkout amount does not match the order total")]
    AmountMismatch,
    #[error(transparent)]
    GatewayError(#[from] GatewayError),
    #[error(transparent)]
    DatabaseError(#[from] PaymentGatewayError),
}

/// `CheckoutApi` handles the synchronous, customer-initiated half of the flow: registering orders from the
/// storefront and building signed payment initiations, with every attempt recorded in the ledger.
pub struct CheckoutApi<B> {
    db: B,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CheckoutApi<B>
where B: PaymentGatewayDatabase
{
    /// Stores an order announced by the storefront. Idempotent: re-announcing an existing order is not an error.
    pub async fn register_order(&self, order: NewOrder) -> Result<(Order, bool), PaymentGatewayError> {
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            info!("🛒️ Order {} registered, awaiting payment of {}", order.order_number, order.total_amount);
        } else {
            debug!("🛒️ Order {} was already registered", order.order_number);
        }
        Ok((order, inserted))
    }

    /// Builds a signed redirect target for the order and records the `INITIATED` ledger row. The order must exist
    /// and still be awaiting payment; a customer retrying checkout for the same order gets a fresh ledger row.
    pub async fn initiate_payment<C: GatewayClient>(
        &self,
        client: &C,
        request: &PaymentRequest,
    ) -> Result<(PaymentInitiation, GatewayTransaction), CheckoutError> {
        let order = self
            .db
            .fetch_order_by_number(&request.order_number)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(request.order_number.clone()))?;
        if order.status != OrderStatusType::PendingPayment {
            debug!("🛒️ Refusing checkout for order {}: status is {}", order.order_number, order.status);
            return Err(CheckoutError::OrderNotPayable(order.status));
        }
        if request.amount != order.total_amount {
            warn!(
                "🛒️ Checkout amount {} does not match total {} for order {}",
                request.amount, order.total_amount, order.order_number
            );
            return Err(CheckoutError::AmountMismatch);
        }
        let initiation = client.initiate(request)?;
        let ledger_row = self
            .db
            .insert_gateway_transaction(NewGatewayTransaction {
                order_id: Some(order.id),
                order_number: order.order_number.clone(),
                gateway: initiation.gateway,
                amount: initiation.amount,
                currency: initiation.currency.clone(),
                payment_url: Some(initiation.payment_url.clone()),
            })
            .await?;
        info!(
            "🛒️ Payment initiation for order {} recorded in the ledger (row {}, {})",
            order.order_number, ledger_row.id, initiation.gateway
        );
        Ok((initiation, ledger_row))
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
