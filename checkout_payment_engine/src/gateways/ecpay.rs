//! ECPay (綠界) gateway client.
//!
//! ECPay's AIO checkout is form-POST based: the shop redirects the browser to the hosted payment page with a signed
//! parameter set, and ECPay later POSTs a form-encoded callback to the notify URL carrying a `CheckMacValue`
//! signature. `RtnCode == 1` is the success sentinel; every other code is a failure with the detail in `RtnMsg`.
//! The expected acknowledgement body for a processed callback is the literal `1|OK`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use cpg_common::{Money, Secret};
use log::warn;

use crate::{
    db_types::{Gateway, OrderNumber},
    gateways::{checksum, GatewayClient, GatewayError, OutcomeStatus, PaymentInitiation, PaymentOutcome, PaymentRequest},
};

pub const ECPAY_PRODUCTION_URL: &str = "https://payment.ecpay.com.tw";
pub const ECPAY_SANDBOX_URL: &str = "https://payment-stage.ecpay.com.tw";
const CHECKOUT_PATH: &str = "/Cashier/AioCheckOut/V5";
/// ECPay's success sentinel for payment result callbacks.
const RTN_CODE_SUCCESS: &str = "1";
/// ECPay timestamps are Taipei local time in this fixed format.
const ECPAY_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
/// Taipei has no daylight saving, so a fixed UTC+8 offset is safe in both directions.
const TAIPEI_UTC_OFFSET_HOURS: i64 = 8;

/// Immutable per-merchant configuration, passed into the client constructor. Never read from ambient state.
#[derive(Debug, Clone, Default)]
pub struct EcPayConfig {
    pub merchant_id: String,
    pub hash_key: Secret<String>,
    pub hash_iv: Secret<String>,
    /// Overrides the sandbox/production base URL when set
    pub base_url: Option<String>,
    /// Where ECPay POSTs the server-to-server payment result callback
    pub notify_url: String,
    /// Where the customer's browser is sent after completing payment
    pub return_url: Option<String>,
    pub sandbox: bool,
}

#[derive(Debug, Clone)]
pub struct EcPayClient {
    config: EcPayConfig,
}

impl EcPayClient {
    /// Missing credentials are a configuration error, fatal at first use. There is no fallback.
    pub fn new(config: EcPayConfig) -> Result<Self, GatewayError> {
        if config.merchant_id.is_empty() {
            return Err(GatewayError::ConfigurationError("ECPay merchant id is not set".to_string()));
        }
        if config.hash_key.reveal().is_empty() || config.hash_iv.reveal().is_empty() {
            return Err(GatewayError::ConfigurationError("ECPay hash key/IV are not set".to_string()));
        }
        if config.notify_url.is_empty() {
            return Err(GatewayError::ConfigurationError("ECPay notify URL is not set".to_string()));
        }
        Ok(Self { config })
    }

    fn base_url(&self) -> &str {
        match (&self.config.base_url, self.config.sandbox) {
            (Some(url), _) => url.as_str(),
            (None, true) => ECPAY_SANDBOX_URL,
            (None, false) => ECPAY_PRODUCTION_URL,
        }
    }

    fn sign(&self, params: &[(String, String)]) -> String {
        checksum::generate(
            self.config.hash_key.reveal(),
            self.config.hash_iv.reveal(),
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }
}

fn parse_payment_date(params: &HashMap<String, String>) -> Option<DateTime<Utc>> {
    let raw = params.get("PaymentDate")?;
    match NaiveDateTime::parse_from_str(raw, ECPAY_DATE_FORMAT) {
        Ok(naive) => Some((naive - Duration::hours(TAIPEI_UTC_OFFSET_HOURS)).and_utc()),
        Err(e) => {
            warn!("🏦️ Ignoring unparseable PaymentDate '{raw}' in ECPay callback: {e}");
            None
        },
    }
}

impl GatewayClient for EcPayClient {
    fn gateway(&self) -> Gateway {
        Gateway::EcPay
    }

    fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiation, GatewayError> {
        let trade_date =
            (Utc::now() + Duration::hours(TAIPEI_UTC_OFFSET_HOURS)).format(ECPAY_DATE_FORMAT).to_string();
        let mut params: Vec<(String, String)> = vec![
            ("MerchantID".into(), self.config.merchant_id.clone()),
            ("MerchantTradeNo".into(), request.order_number.as_str().to_string()),
            ("MerchantTradeDate".into(), trade_date),
            ("PaymentType".into(), "aio".into()),
            ("TotalAmount".into(), request.amount.value().to_string()),
            ("TradeDesc".into(), "Checkout payment".into()),
            ("ItemName".into(), request.item_name.clone()),
            ("ReturnURL".into(), self.config.notify_url.clone()),
            ("ChoosePayment".into(), "ALL".into()),
            ("EncryptType".into(), "1".into()),
        ];
        if let Some(url) = &self.config.return_url {
            params.push(("OrderResultURL".into(), url.clone()));
        }
        let mac = self.sign(&params);
        params.push((checksum::SIGNATURE_FIELD.into(), mac));
        Ok(PaymentInitiation {
            gateway: Gateway::EcPay,
            order_number: request.order_number.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            payment_url: format!("{}{CHECKOUT_PATH}", self.base_url()),
            params,
        })
    }

    fn verify(&self, params: &HashMap<String, String>) -> bool {
        checksum::verify(
            self.config.hash_key.reveal(),
            self.config.hash_iv.reveal(),
            params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )
    }

    fn parse_callback(&self, params: &HashMap<String, String>) -> Result<PaymentOutcome, GatewayError> {
        if !self.verify(params) {
            // Do not trust any other field of an unauthenticated callback, including the order number.
            return Ok(PaymentOutcome::failure(
                Gateway::EcPay,
                OrderNumber::from(""),
                "checksum invalid".to_string(),
            ));
        }
        let order_number = params
            .get("MerchantTradeNo")
            .map(|s| OrderNumber::from(s.as_str()))
            .ok_or_else(|| GatewayError::MissingField("MerchantTradeNo".to_string()))?;
        let rtn_code =
            params.get("RtnCode").ok_or_else(|| GatewayError::MissingField("RtnCode".to_string()))?.trim();
        let transaction_id = params.get("TradeNo").cloned();
        let amount = params
            .get("TradeAmt")
            .map(|v| {
                v.parse::<Money>().map_err(|e| GatewayError::MalformedField("TradeAmt".to_string(), e.to_string()))
            })
            .transpose()?;
        let outcome = if rtn_code == RTN_CODE_SUCCESS {
            PaymentOutcome {
                gateway: Gateway::EcPay,
                order_number,
                status: OutcomeStatus::Success,
                transaction_id,
                amount,
                message: params.get("RtnMsg").cloned(),
                payment_time: parse_payment_date(params),
            }
        } else {
            let message = params
                .get("RtnMsg")
                .cloned()
                .unwrap_or_else(|| format!("Payment failed with gateway code {rtn_code}"));
            PaymentOutcome {
                gateway: Gateway::EcPay,
                order_number,
                status: OutcomeStatus::Failed,
                transaction_id,
                amount,
                message: Some(message),
                payment_time: None,
            }
        };
        Ok(outcome)
    }

    // ECPay's trade query and cancellation APIs require an outbound server-to-server call, which this engine does
    // not perform. The payment stays in flight until the callback arrives.
    fn query(&self, transaction_id: &str) -> PaymentOutcome {
        PaymentOutcome::unsupported(Gateway::EcPay, transaction_id, "Active trade query")
    }

    fn cancel(&self, transaction_id: &str) -> PaymentOutcome {
        PaymentOutcome::unsupported(Gateway::EcPay, transaction_id, "Trade cancellation")
    }
}
