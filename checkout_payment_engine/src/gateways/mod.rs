//! Gateway integrations.
//!
//! One [`GatewayClient`] implementation per gateway variant. Clients are pure: they build signed initiation
//! requests and translate verified callbacks into the canonical [`PaymentOutcome`] that reconciliation consumes.
//! Recording ledger rows and mutating order state is the caller's job, so reconciliation stays gateway-agnostic.
pub mod checksum;
pub mod ecpay;

use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use cpg_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Gateway, OrderNumber};

pub use ecpay::{EcPayClient, EcPayConfig};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Invalid gateway configuration. {0}")]
    ConfigurationError(String),
    #[error("The callback is missing the required field '{0}'")]
    MissingField(String),
    #[error("The callback field '{0}' could not be parsed. {1}")]
    MalformedField(String, String),
}

//--------------------------------------   PaymentRequest   ----------------------------------------------------------
/// A customer-initiated checkout that should be taken to a gateway's hosted payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_number: OrderNumber,
    pub amount: Money,
    pub currency: String,
    pub item_name: String,
}

//-------------------------------------- PaymentInitiation  ----------------------------------------------------------
/// A fully-formed, signed redirect target for a gateway's hosted payment page. Ephemeral; the caller records the
/// corresponding `INITIATED` ledger row and hands the form fields to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub gateway: Gateway,
    pub order_number: OrderNumber,
    pub amount: Money,
    pub currency: String,
    /// The URL of the gateway's hosted payment page the browser must POST to
    pub payment_url: String,
    /// The signed form parameters, including the checksum field
    pub params: Vec<(String, String)>,
}

//--------------------------------------   OutcomeStatus    ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Success,
    Failed,
    /// The gateway has not reached a final verdict (or the client cannot ask for one).
    Processing,
}

impl Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "SUCCESS"),
            OutcomeStatus::Failed => write!(f, "FAILED"),
            OutcomeStatus::Processing => write!(f, "PROCESSING"),
        }
    }
}

//--------------------------------------   PaymentOutcome   ----------------------------------------------------------
/// The canonical, gateway-independent result of a payment attempt. Everything reconciliation needs, and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub gateway: Gateway,
    pub order_number: OrderNumber,
    pub status: OutcomeStatus,
    /// The gateway's transaction identifier, when known
    pub transaction_id: Option<String>,
    /// The amount the gateway reports as paid
    pub amount: Option<Money>,
    /// The gateway's human-readable message. Carries the error detail for failed outcomes.
    pub message: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
}

impl PaymentOutcome {
    pub fn success(gateway: Gateway, order_number: OrderNumber, transaction_id: String, amount: Money) -> Self {
        Self {
            gateway,
            order_number,
            status: OutcomeStatus::Success,
            transaction_id: Some(transaction_id),
            amount: Some(amount),
            message: None,
            payment_time: None,
        }
    }

    pub fn failure(gateway: Gateway, order_number: OrderNumber, message: String) -> Self {
        Self {
            gateway,
            order_number,
            status: OutcomeStatus::Failed,
            transaction_id: None,
            amount: None,
            message: Some(message),
            payment_time: None,
        }
    }

    /// The annotated outcome for operations the gateway has no API for. Never an error; the caller treats the
    /// payment as still in flight.
    pub fn unsupported(gateway: Gateway, transaction_id: &str, operation: &str) -> Self {
        Self {
            gateway,
            order_number: OrderNumber::from(""),
            status: OutcomeStatus::Processing,
            transaction_id: Some(transaction_id.to_string()),
            amount: None,
            message: Some(format!("{operation} is not supported by {gateway}")),
            payment_time: None,
        }
    }
}

//--------------------------------------   GatewayClient    ----------------------------------------------------------
/// The single seam between the reconciliation engine and a concrete gateway's wire protocol.
pub trait GatewayClient {
    fn gateway(&self) -> Gateway;

    /// Build a signed payment initiation for the gateway's hosted payment page. Pure; the caller records the
    /// `INITIATED` ledger row.
    fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError>;

    /// Authenticate an inbound callback. Must be checked before any other field is trusted. Never errors; an
    /// unverifiable callback is simply invalid.
    fn verify(&self, params: &HashMap<String, String>) -> bool;

    /// Translate a raw inbound callback into the canonical outcome. Verifies the signature first; on verification
    /// failure the outcome is `Failed` with an explicit checksum error and no other field is trusted.
    fn parse_callback(&self, params: &HashMap<String, String>) -> Result<PaymentOutcome, GatewayError>;

    /// Actively query the gateway for the state of a transaction. Gateways without a query API return a
    /// `Processing` outcome annotated "not supported".
    fn query(&self, transaction_id: &str) -> PaymentOutcome;

    /// Ask the gateway to cancel a transaction. Gateways without a cancel API return a `Processing` outcome
    /// annotated "not supported".
    fn cancel(&self, transaction_id: &str) -> PaymentOutcome;
}
