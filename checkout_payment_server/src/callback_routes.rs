//----------------------------------------------   Callbacks  ----------------------------------------------------

use std::{collections::HashMap, time::Instant};

use actix_web::{web, HttpRequest, HttpResponse};
use checkout_payment_engine::{
    db_types::{CallbackProcessResult, Gateway, NewCallbackLog, OrderNumber},
    gateways::{EcPayClient, GatewayClient, OutcomeStatus, PaymentOutcome},
    reconciliation::CallbackResolution,
    traits::PaymentGatewayDatabase,
    LedgerApi,
    ReconciliationApi,
};
use log::*;

use crate::{
    config::ProxyConfig,
    helpers::{get_remote_ip, user_agent},
    route,
};

/// The acknowledgement body ECPay requires before it stops redelivering a callback.
pub const ACK_OK: &str = "1|OK";

route!(ecpay_callback => Post "/ecpay" impl PaymentGatewayDatabase);
/// The ECPay server-to-server payment result callback.
///
/// The CheckMacValue is verified before any other field is trusted. The response body is the gateway's
/// acknowledgement protocol: `1|OK` when the callback was processed or was an idempotent no-op, and `0|<reason>`
/// when it must be redelivered (signature failure, unknown order, write failure). Callback responses are always
/// HTTP 200; the verdict lives in the body.
///
/// Every delivery is recorded in the audit log with the caller's IP, user agent and processing time, whatever the
/// outcome.
pub async fn ecpay_callback<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Form<HashMap<String, String>>,
    client: web::Data<EcPayClient>,
    api: web::Data<ReconciliationApi<B>>,
    ledger: web::Data<LedgerApi<B>>,
    proxy: web::Data<ProxyConfig>,
) -> HttpResponse {
    let timer = Instant::now();
    trace!("🏦️ Received ECPay callback: {}", req.uri());
    let params = body.into_inner();
    let mut entry = NewCallbackLog::new(Gateway::EcPay, render_raw_params(&params), CallbackProcessResult::Error);
    entry.request_ip = get_remote_ip(&req, proxy.use_x_forwarded_for, proxy.use_forwarded).map(|ip| ip.to_string());
    entry.user_agent = user_agent(&req);
    // The claimed identifiers are recorded even for rejected callbacks. The audit log is never load-bearing, and a
    // forged MerchantTradeNo in a rejected delivery is exactly what an investigation wants to see.
    entry.order_number = params.get("MerchantTradeNo").map(|s| OrderNumber::from(s.as_str()));
    entry.transaction_id = params.get("TradeNo").cloned();
    entry.status = params.get("RtnCode").cloned();

    let ack = if !client.verify(&params) {
        warn!("🏦️ ECPay callback failed CheckMacValue verification. No field of it was trusted.");
        entry.process_result = CallbackProcessResult::SignatureInvalid;
        entry.error = Some("CheckMacValue verification failed".to_string());
        "0|CheckMacValue verification failed".to_string()
    } else {
        match client.parse_callback(&params) {
            Err(e) => {
                warn!("🏦️ Verified ECPay callback could not be parsed. {e}");
                entry.error = Some(e.to_string());
                format!("0|{e}")
            },
            Ok(outcome) => {
                entry.parsed_response = serde_json::to_string(&outcome).ok();
                reconcile(&outcome, api.as_ref(), &mut entry).await
            },
        }
    };
    entry.process_time_ms = timer.elapsed().as_millis() as i64;
    if let Err(e) = ledger.record_callback(entry).await {
        // The audit record is best-effort. A reconciled callback is still acknowledged.
        error!("🏦️ Could not record the ECPay callback in the audit log. {e}");
    }
    HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(ack)
}

async fn reconcile<B: PaymentGatewayDatabase>(
    outcome: &PaymentOutcome,
    api: &ReconciliationApi<B>,
    entry: &mut NewCallbackLog,
) -> String {
    let resolution = match outcome.status {
        OutcomeStatus::Success => api.handle_success(outcome).await,
        OutcomeStatus::Failed => api.handle_failure(outcome).await,
        OutcomeStatus::Processing => {
            info!("🏦️ ECPay callback for order {} is still in flight. Nothing to apply.", outcome.order_number);
            entry.process_result = CallbackProcessResult::Ignored;
            return ACK_OK.to_string();
        },
    };
    match resolution {
        Ok(CallbackResolution::Applied) => {
            entry.process_result = CallbackProcessResult::Applied;
            ACK_OK.to_string()
        },
        Ok(CallbackResolution::AlreadyResolved(status)) => {
            entry.process_result = CallbackProcessResult::Ignored;
            entry.error = Some(format!("No-op: order status is {status}"));
            ACK_OK.to_string()
        },
        Ok(CallbackResolution::OrderNotFound(number)) => {
            // The storefront may not have announced the order yet. Ask for redelivery.
            entry.error = Some(format!("Unknown order {number}"));
            "0|Unknown order".to_string()
        },
        Err(e) => {
            error!("🏦️ Could not persist the outcome for order {}. {e}", outcome.order_number);
            entry.error = Some(e.to_string());
            "0|Order update failed".to_string()
        },
    }
}

/// Renders the callback's form fields in a stable order for the audit log.
fn render_raw_params(params: &HashMap<String, String>) -> String {
    let mut fields: Vec<_> = params.iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));
    fields.into_iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
}
