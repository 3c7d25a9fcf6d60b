//! # Checkout payment server
//! This module hosts the HTTP surface for the checkout payment engine. It is responsible for:
//! Accepting order announcements from the storefront and checkout requests from customers.
//! Listening for incoming payment result callbacks from the payment gateways.
//! Serving ledger and callback statistics.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders`: Order intake from the storefront.
//! * `/api/checkout`: Builds the signed redirect to a gateway's hosted payment page.
//! * `/callback/ecpay`: The server-to-server payment result callback from ECPay.
//! * `/api/stats`: Ledger and callback rollups.

pub mod callback_routes;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
