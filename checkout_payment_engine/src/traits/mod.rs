//! Behaviour that database backends must implement to support the checkout payment engine.
mod data_objects;
mod payment_gateway_database;

pub use data_objects::{CallbackStats, LedgerStats, StatsWindow};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
