//! End-to-end engine tests against a real SQLite database: checkout, callbacks, idempotent reconciliation and the
//! audit trail.
mod common;

use checkout_payment_engine::{
    db_types::{
        CallbackProcessResult,
        Gateway,
        NewCallbackLog,
        NewOrder,
        OrderNumber,
        OrderStatusType,
        PaymentStatus,
        TransactionStatus,
    },
    gateways::{EcPayClient, EcPayConfig, PaymentOutcome, PaymentRequest},
    reconciliation::{transitions, CallbackResolution},
    traits::StatsWindow,
    CheckoutApi,
    CheckoutError,
    LedgerApi,
    PaymentGatewayDatabase,
    PaymentGatewayError,
    ReconciliationApi,
};
use chrono::Utc;
use cpg_common::{Money, Secret};

fn test_client() -> EcPayClient {
    let config = EcPayConfig {
        merchant_id: "2000132".to_string(),
        hash_key: Secret::new("5294y06JbISpM5x9".to_string()),
        hash_iv: Secret::new("v77ho4kWxNNIS".to_string()),
        base_url: None,
        notify_url: "https://shop.example.com/callback/ecpay".to_string(),
        return_url: None,
        sandbox: true,
    };
    EcPayClient::new(config).expect("valid test config")
}

fn new_order(number: &str, amount: i64) -> NewOrder {
    NewOrder::new(OrderNumber::from(number), Money::from(amount))
}

#[tokio::test]
async fn checkout_records_an_initiated_ledger_row() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, inserted) = checkout.register_order(new_order("TEST20240101001", 1000)).await.unwrap();
    assert!(inserted);
    assert_eq!(order.status, OrderStatusType::PendingPayment);

    let request = PaymentRequest {
        order_number: order.order_number.clone(),
        amount: Money::from(1000),
        currency: "TWD".to_string(),
        item_name: "Test item".to_string(),
    };
    let (initiation, ledger_row) = checkout.initiate_payment(&test_client(), &request).await.unwrap();
    assert!(initiation.payment_url.contains("payment-stage.ecpay.com.tw"));
    assert!(initiation.params.iter().any(|(k, _)| k == "CheckMacValue"));
    assert_eq!(ledger_row.status, TransactionStatus::Initiated);
    assert_eq!(ledger_row.amount, Money::from(1000));

    // Retrying checkout gets a fresh ledger row
    let (_, second_row) = checkout.initiate_payment(&test_client(), &request).await.unwrap();
    assert_ne!(ledger_row.id, second_row.id);
    let ledger = LedgerApi::new(db.clone());
    assert_eq!(ledger.transactions_for_order(&order.order_number).await.unwrap().len(), 2);
}

#[tokio::test]
async fn registering_an_order_twice_is_idempotent() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (first, inserted) = checkout.register_order(new_order("TEST20240101002", 500)).await.unwrap();
    assert!(inserted);
    let (second, inserted) = checkout.register_order(new_order("TEST20240101002", 500)).await.unwrap();
    assert!(!inserted);
    assert_eq!(first.id, second.id);

    // The conflicting insert is a no-op; the winning row is returned untouched
    let (third, inserted) = checkout.register_order(new_order("TEST20240101002", 9999)).await.unwrap();
    assert!(!inserted);
    assert_eq!(third.id, first.id);
    assert_eq!(third.total_amount, Money::from(500));
}

#[tokio::test]
async fn checkout_rejects_a_mismatched_amount() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101003", 1000)).await.unwrap();
    let request = PaymentRequest {
        order_number: order.order_number.clone(),
        amount: Money::from(999),
        currency: "TWD".to_string(),
        item_name: "Test item".to_string(),
    };
    let err = checkout.initiate_payment(&test_client(), &request).await.unwrap_err();
    assert!(matches!(err, CheckoutError::AmountMismatch));
    // Nothing was recorded in the ledger
    let ledger = LedgerApi::new(db.clone());
    assert!(ledger.transactions_for_order(&order.order_number).await.unwrap().is_empty());
}

#[tokio::test]
async fn a_success_callback_marks_the_order_paid_and_finalizes_the_ledger() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101004", 2500)).await.unwrap();
    let request = PaymentRequest {
        order_number: order.order_number.clone(),
        amount: Money::from(2500),
        currency: "TWD".to_string(),
        item_name: "Test item".to_string(),
    };
    checkout.initiate_payment(&test_client(), &request).await.unwrap();

    let recon = ReconciliationApi::new(db.clone());
    let outcome =
        PaymentOutcome::success(Gateway::EcPay, order.order_number.clone(), "TXN4".to_string(), Money::from(2500));
    let resolution = recon.handle_success(&outcome).await.unwrap();
    assert_eq!(resolution, CallbackResolution::Applied);
    assert!(resolution.state_changed());

    let updated = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(updated.status, OrderStatusType::Paid);
    assert!(updated.payment_time.is_some());

    let payment = db.fetch_order_payment(order.id, "TXN4").await.unwrap().unwrap();
    assert_eq!(payment.payment_status, PaymentStatus::Paid);
    assert_eq!(payment.payment_amount, Money::from(2500));

    let history = db.fetch_history_for_order(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_type, "PAYMENT_SUCCESS");

    let ledger = LedgerApi::new(db.clone());
    let rows = ledger.transactions_for_order(&order.order_number).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, TransactionStatus::Success);
    assert_eq!(rows[0].gateway_transaction_id.as_deref(), Some("TXN4"));
}

#[tokio::test]
async fn a_redelivered_success_callback_changes_nothing() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101005", 1000)).await.unwrap();

    let recon = ReconciliationApi::new(db.clone());
    let outcome =
        PaymentOutcome::success(Gateway::EcPay, order.order_number.clone(), "TXN5".to_string(), Money::from(1000));
    assert_eq!(recon.handle_success(&outcome).await.unwrap(), CallbackResolution::Applied);

    let resolution = recon.handle_success(&outcome).await.unwrap();
    assert_eq!(resolution, CallbackResolution::AlreadyResolved(OrderStatusType::Paid));
    assert!(!resolution.state_changed());

    // Only the first delivery left an audit entry
    let history = db.fetch_history_for_order(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn a_failed_attempt_keeps_the_order_payable() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101006", 1000)).await.unwrap();

    let recon = ReconciliationApi::new(db.clone());
    let failure = PaymentOutcome::failure(Gateway::EcPay, order.order_number.clone(), "card declined".to_string());
    assert_eq!(recon.handle_failure(&failure).await.unwrap(), CallbackResolution::Applied);

    let after_failure = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(after_failure.status, OrderStatusType::PendingPayment);
    let history = db.fetch_history_for_order(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_type, "PAYMENT_FAILED");
    assert_eq!(history[0].old_status, history[0].new_status);

    // The customer retries and the retry succeeds
    let success =
        PaymentOutcome::success(Gateway::EcPay, order.order_number.clone(), "TXN6".to_string(), Money::from(1000));
    assert_eq!(recon.handle_success(&success).await.unwrap(), CallbackResolution::Applied);
    let paid = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn a_late_failure_never_downgrades_a_paid_order() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101007", 1000)).await.unwrap();

    let recon = ReconciliationApi::new(db.clone());
    let success =
        PaymentOutcome::success(Gateway::EcPay, order.order_number.clone(), "TXN7".to_string(), Money::from(1000));
    recon.handle_success(&success).await.unwrap();

    let failure = PaymentOutcome::failure(Gateway::EcPay, order.order_number.clone(), "late failure".to_string());
    let resolution = recon.handle_failure(&failure).await.unwrap();
    assert_eq!(resolution, CallbackResolution::AlreadyResolved(OrderStatusType::Paid));

    let after = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(after.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn a_callback_for_an_unknown_order_writes_nothing() {
    let db = common::prepare_db().await;
    let recon = ReconciliationApi::new(db.clone());
    let outcome = PaymentOutcome::success(
        Gateway::EcPay,
        OrderNumber::from("NO-SUCH-ORDER"),
        "TXN8".to_string(),
        Money::from(100),
    );
    let resolution = recon.handle_success(&outcome).await.unwrap();
    assert_eq!(resolution, CallbackResolution::OrderNotFound(OrderNumber::from("NO-SUCH-ORDER")));
    assert!(!resolution.state_changed());
}

#[tokio::test]
async fn cancellation_applies_once_and_only_before_payment() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101008", 1000)).await.unwrap();

    let recon = ReconciliationApi::new(db.clone());
    assert_eq!(
        recon.handle_cancellation(&order.order_number, Gateway::EcPay).await.unwrap(),
        CallbackResolution::Applied
    );
    let cancelled = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);

    // Re-cancelling is a no-op, and a cancelled order refuses checkout
    assert_eq!(
        recon.handle_cancellation(&order.order_number, Gateway::EcPay).await.unwrap(),
        CallbackResolution::AlreadyResolved(OrderStatusType::Cancelled)
    );
    let request = PaymentRequest {
        order_number: order.order_number.clone(),
        amount: Money::from(1000),
        currency: "TWD".to_string(),
        item_name: "Test item".to_string(),
    };
    let err = CheckoutApi::new(db.clone()).initiate_payment(&test_client(), &request).await.unwrap_err();
    assert!(matches!(err, CheckoutError::OrderNotPayable(OrderStatusType::Cancelled)));
}

#[tokio::test]
async fn a_transition_built_from_a_stale_snapshot_is_never_applied() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101010", 1000)).await.unwrap();

    // Two deliveries both read the order while it was still pending
    let outcome =
        PaymentOutcome::success(Gateway::EcPay, order.order_number.clone(), "TXN10".to_string(), Money::from(1000));
    let first = transitions::on_payment_success(&order, &outcome, Utc::now()).unwrap();
    let second = transitions::on_payment_success(&order, &outcome, Utc::now()).unwrap();

    db.apply_payment_success(&order, &first).await.unwrap();
    let err = db.apply_payment_success(&order, &second).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::OrderSuperseded(_)));

    // The losing delivery wrote nothing
    assert_eq!(db.fetch_history_for_order(order.id).await.unwrap().len(), 1);
    let paid = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Paid);
    let first_payment_time = paid.payment_time;

    // A failure decided on the same stale snapshot is refused without touching the payment sub-ledger
    let decline = PaymentOutcome::failure(Gateway::EcPay, order.order_number.clone(), "late decline".to_string());
    let stale_failure = transitions::on_payment_failure(&order, &decline).unwrap();
    let err = db.apply_payment_failure(&order, &stale_failure).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::OrderSuperseded(_)));
    assert_eq!(db.fetch_history_for_order(order.id).await.unwrap().len(), 1);

    // So is a stale cancellation
    let stale_cancel = transitions::on_cancellation(&order, Gateway::EcPay).unwrap();
    let err = db.apply_cancellation(&order, &stale_cancel).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::OrderSuperseded(_)));

    let after = db.fetch_order_by_number(&order.order_number).await.unwrap().unwrap();
    assert_eq!(after.status, OrderStatusType::Paid);
    assert_eq!(after.payment_time, first_payment_time);
}

#[tokio::test]
async fn the_audit_log_and_rollups_cover_every_delivery() {
    let db = common::prepare_db().await;
    let checkout = CheckoutApi::new(db.clone());
    let (order, _) = checkout.register_order(new_order("TEST20240101009", 1000)).await.unwrap();
    let request = PaymentRequest {
        order_number: order.order_number.clone(),
        amount: Money::from(1000),
        currency: "TWD".to_string(),
        item_name: "Test item".to_string(),
    };
    checkout.initiate_payment(&test_client(), &request).await.unwrap();

    let recon = ReconciliationApi::new(db.clone());
    let outcome =
        PaymentOutcome::success(Gateway::EcPay, order.order_number.clone(), "TXN9".to_string(), Money::from(1000));
    recon.handle_success(&outcome).await.unwrap();

    let ledger = LedgerApi::new(db.clone());
    let mut applied = NewCallbackLog::new(
        Gateway::EcPay,
        "MerchantTradeNo=TEST20240101009&RtnCode=1".to_string(),
        CallbackProcessResult::Applied,
    );
    applied.order_number = Some(order.order_number.clone());
    applied.transaction_id = Some("TXN9".to_string());
    applied.process_time_ms = 12;
    ledger.record_callback(applied).await.unwrap();
    let rejected =
        NewCallbackLog::new(Gateway::EcPay, "RtnCode=1".to_string(), CallbackProcessResult::SignatureInvalid);
    ledger.record_callback(rejected).await.unwrap();

    let callback_stats = ledger.callback_stats(StatsWindow::default()).await.unwrap();
    assert_eq!(callback_stats.len(), 2);
    assert!(callback_stats.iter().any(|s| s.process_result == "APPLIED" && s.count == 1));
    assert!(callback_stats.iter().any(|s| s.process_result == "SIGNATURE_INVALID" && s.count == 1));

    let ledger_stats = ledger.ledger_stats(StatsWindow::default()).await.unwrap();
    assert_eq!(ledger_stats.len(), 1);
    assert_eq!(ledger_stats[0].status, "SUCCESS");
    assert_eq!(ledger_stats[0].count, 1);
    assert_eq!(ledger_stats[0].total_amount, Money::from(1000));
}
