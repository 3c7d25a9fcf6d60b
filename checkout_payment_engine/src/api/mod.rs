//! The public-facing APIs of the engine, generic over any [`crate::traits::PaymentGatewayDatabase`] backend.
mod checkout_api;
mod ledger_api;
mod reconciliation_api;

pub use checkout_api::{CheckoutApi, CheckoutError};
pub use ledger_api::LedgerApi;
pub use reconciliation_api::ReconciliationApi;
