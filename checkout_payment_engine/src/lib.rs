//! Checkout Payment Engine
//!
//! The engine coordinates checkout payments against third-party payment gateways and reconciles their asynchronous
//! outcome notifications against locally tracked orders. It is transport-agnostic; the HTTP surface lives in the
//! `checkout_payment_server` crate.
//!
//! The library is divided into three main sections:
//! 1. Gateway integration ([`mod@gateways`]). The checksum engine and one [`gateways::GatewayClient`] implementation
//!    per gateway variant. Clients build signed payment initiations and parse inbound callbacks into a canonical
//!    [`gateways::PaymentOutcome`]. Adding a gateway is additive and never touches reconciliation.
//! 2. Reconciliation ([`mod@reconciliation`] and [`api`]). The sole writer of order/payment state driven by verified
//!    outcomes. State transitions are pure functions over immutable snapshots, so the idempotency and no-downgrade
//!    invariants are testable without a database.
//! 3. Persistence ([`traits`] and the SQLite backend). You should never need to access the database directly; use the
//!    APIs. The exception is the data types, which are defined in [`db_types`] and are public.
mod api;

pub mod db_types;
pub mod gateways;
pub mod reconciliation;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use api::{CheckoutApi, CheckoutError, LedgerApi, ReconciliationApi};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{PaymentGatewayDatabase, PaymentGatewayError};
