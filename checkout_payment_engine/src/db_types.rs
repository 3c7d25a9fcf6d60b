use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cpg_common::{Money, DEFAULT_CURRENCY_CODE};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(String);

//--------------------------------------      Gateway       ----------------------------------------------------------
/// Identifies a third-party payment gateway. Stored on every ledger row and every payment record, so that
/// per-gateway behaviour stays additive: a new variant here plus a new [`crate::gateways::GatewayClient`]
/// implementation is all that a new integration requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gateway {
    EcPay,
    LinePay,
}

impl Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gateway::EcPay => write!(f, "EC_PAY"),
            Gateway::LinePay => write!(f, "LINE_PAY"),
        }
    }
}

impl FromStr for Gateway {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EC_PAY" | "ECPAY" => Ok(Self::EcPay),
            "LINE_PAY" | "LINEPAY" => Ok(Self::LinePay),
            s => Err(ConversionError(format!("Unknown gateway: {s}"))),
        }
    }
}

//--------------------------------------    OrderNumber     ----------------------------------------------------------
/// The business key for an order, assigned by the storefront. Reconciliation always resolves orders by this key and
/// never by a caller-supplied internal id.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl FromStr for OrderNumber {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------  OrderStatusType   ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusType {
    /// The order has been created and is waiting for a successful payment.
    PendingPayment,
    /// A successful payment has been reconciled against the order.
    Paid,
    /// The order has been fulfilled. Terminal.
    Completed,
    /// The order has been cancelled by the customer or an admin. Terminal.
    Cancelled,
    /// The payment has been returned to the customer. Terminal.
    Refunded,
}

impl OrderStatusType {
    /// Terminal completed states. Once an order reaches one of these, a cancellation callback is a no-op.
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Paid | Self::Completed | Self::Refunded)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::PendingPayment => write!(f, "PENDING_PAYMENT"),
            OrderStatusType::Paid => write!(f, "PAID"),
            OrderStatusType::Completed => write!(f, "COMPLETED"),
            OrderStatusType::Cancelled => write!(f, "CANCELLED"),
            OrderStatusType::Refunded => write!(f, "REFUNDED"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to PendingPayment");
            OrderStatusType::PendingPayment
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(Self::PendingPayment),
            "PAID" => Ok(Self::Paid),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------   PaymentStatus    ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunding,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Failed => write!(f, "FAILED"),
            PaymentStatus::Refunding => write!(f, "REFUNDING"),
            PaymentStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

//-------------------------------------- TransactionStatus  ----------------------------------------------------------
/// Lifecycle of a ledger row in `gateway_transactions`. A row is created as `Initiated` and updated at most once to a
/// terminal status by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Initiated,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Initiated => write!(f, "INITIATED"),
            TransactionStatus::Processing => write!(f, "PROCESSING"),
            TransactionStatus::Success => write!(f, "SUCCESS"),
            TransactionStatus::Failed => write!(f, "FAILED"),
            TransactionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

//--------------------------------------       Order        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub total_amount: Money,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewOrder      ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The order number as assigned by the storefront
    pub order_number: OrderNumber,
    /// The total price of the order in the smallest currency unit
    pub total_amount: Money,
    /// The currency of the order
    pub currency: String,
}

impl NewOrder {
    pub fn new(order_number: OrderNumber, total_amount: Money) -> Self {
        Self { order_number, total_amount, currency: DEFAULT_CURRENCY_CODE.to_string() }
    }
}

impl Display for NewOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order {} ({} {})", self.order_number, self.total_amount, self.currency)
    }
}

//--------------------------------------    OrderPayment    ----------------------------------------------------------
/// The payment sub-ledger for an order. One row per reconciled payment attempt, keyed by
/// `(order_id, gateway_transaction_id)` so that re-delivered callbacks update rather than duplicate.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderPayment {
    pub id: i64,
    pub order_id: i64,
    pub gateway: Gateway,
    pub gateway_transaction_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_amount: Money,
    pub notes: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    OrderHistory    ----------------------------------------------------------
/// Append-only audit trail of order state changes. Written by reconciliation only, never mutated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderHistory {
    pub id: i64,
    pub order_id: i64,
    pub action_type: String,
    pub description: String,
    pub old_status: OrderStatusType,
    pub new_status: OrderStatusType,
    pub created_at: DateTime<Utc>,
}

//-------------------------------------- GatewayTransaction ----------------------------------------------------------
/// A ledger row recording a single payment initiation attempt against a gateway. Independent of order state and
/// never load-bearing for financial correctness; used for debugging and dispute resolution.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub id: i64,
    pub order_id: Option<i64>,
    pub order_number: OrderNumber,
    pub gateway: Gateway,
    pub gateway_transaction_id: Option<String>,
    pub status: TransactionStatus,
    pub amount: Money,
    pub currency: String,
    pub payment_url: Option<String>,
    pub error_message: Option<String>,
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGatewayTransaction {
    pub order_id: Option<i64>,
    pub order_number: OrderNumber,
    pub gateway: Gateway,
    pub amount: Money,
    pub currency: String,
    pub payment_url: Option<String>,
}

//--------------------------------------    CallbackLog     ----------------------------------------------------------
/// How an inbound callback was resolved. Recorded verbatim in the audit log so that rejected callbacks are always
/// distinguishable from successfully processed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackProcessResult {
    /// The callback changed order/payment state.
    Applied,
    /// A verified callback that resulted in no state change (duplicate delivery, late failure).
    Ignored,
    /// The signature did not verify. No business field was trusted.
    SignatureInvalid,
    /// Processing aborted with an error; the gateway was asked to redeliver.
    Error,
}

impl Display for CallbackProcessResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackProcessResult::Applied => write!(f, "APPLIED"),
            CallbackProcessResult::Ignored => write!(f, "IGNORED"),
            CallbackProcessResult::SignatureInvalid => write!(f, "SIGNATURE_INVALID"),
            CallbackProcessResult::Error => write!(f, "ERROR"),
        }
    }
}

/// Write-once record of a raw inbound callback, kept regardless of whether reconciliation accepted it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CallbackLog {
    pub id: i64,
    pub gateway: Gateway,
    pub order_number: Option<OrderNumber>,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub raw_params: String,
    pub parsed_response: Option<String>,
    pub process_result: CallbackProcessResult,
    pub error: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub process_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCallbackLog {
    pub gateway: Gateway,
    pub order_number: Option<OrderNumber>,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub raw_params: String,
    pub parsed_response: Option<String>,
    pub process_result: CallbackProcessResult,
    pub error: Option<String>,
    pub request_ip: Option<String>,
    pub user_agent: Option<String>,
    pub process_time_ms: i64,
}

impl NewCallbackLog {
    pub fn new(gateway: Gateway, raw_params: String, process_result: CallbackProcessResult) -> Self {
        Self {
            gateway,
            order_number: None,
            transaction_id: None,
            status: None,
            raw_params,
            parsed_response: None,
            process_result,
            error: None,
            request_ip: None,
            user_agent: None,
            process_time_ms: 0,
        }
    }
}
