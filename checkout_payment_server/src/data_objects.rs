use std::fmt::Display;

use checkout_payment_engine::{
    db_types::Gateway,
    gateways::PaymentInitiation,
    traits::{CallbackStats, LedgerStats, StatsWindow},
};
use chrono::{DateTime, Utc};
use cpg_common::{Money, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// An order announcement from the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub order_number: String,
    pub total_amount: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY_CODE.to_string()
}

/// A customer checkout request. The amount must match the registered order total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub order_number: String,
    pub amount: Money,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub item_name: String,
}

/// Everything the storefront needs to render an auto-submitting form that takes the customer to the gateway's
/// hosted payment page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_number: String,
    pub payment_url: String,
    pub params: Vec<(String, String)>,
}

impl From<PaymentInitiation> for CheckoutResponse {
    fn from(init: PaymentInitiation) -> Self {
        Self { order_number: init.order_number.as_str().to_string(), payment_url: init.payment_url, params: init.params }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatsQuery {
    pub gateway: Option<Gateway>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl From<StatsQuery> for StatsWindow {
    fn from(q: StatsQuery) -> Self {
        StatsWindow { since: q.since, until: q.until }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub ledger: Vec<LedgerStats>,
    pub callbacks: Vec<CallbackStats>,
}
