use actix_web::{http::StatusCode, test::TestRequest};
use checkout_payment_engine::{
    db_types::{OrderNumber, OrderStatusType},
    traits::PaymentGatewayDatabase,
};
use serde_json::json;

use super::helpers::{prepare_db, send_request, signed_callback_params};

async fn register_order(db: &checkout_payment_engine::SqliteDatabase, order_number: &str, amount: i64) {
    let body = json!({ "order_number": order_number, "total_amount": amount, "currency": "TWD" });
    let (status, _) = send_request(db, TestRequest::post().uri("/api/orders").set_json(body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn a_valid_success_callback_is_acknowledged_and_applied() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    register_order(&db, "ORD2001", 1000).await;

    let params = signed_callback_params("ORD2001", "2401011200001", 1000, "1");
    let (status, body) = send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1|OK");

    let order = db.fetch_order_by_number(&OrderNumber::from("ORD2001")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert!(order.payment_time.is_some());
    let payment = db.fetch_order_payment(order.id, "2401011200001").await.unwrap().unwrap();
    assert_eq!(payment.payment_amount.value(), 1000);
}

#[actix_web::test]
async fn a_redelivered_callback_is_acknowledged_without_a_second_write() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    register_order(&db, "ORD2002", 1000).await;

    let params = signed_callback_params("ORD2002", "2401011200002", 1000, "1");
    let (_, body) = send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    assert_eq!(body, "1|OK");
    let (_, body) = send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    assert_eq!(body, "1|OK");

    let order = db.fetch_order_by_number(&OrderNumber::from("ORD2002")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    let history = db.fetch_history_for_order(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[actix_web::test]
async fn a_tampered_callback_is_rejected_before_any_write() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    register_order(&db, "ORD2003", 1000).await;

    let mut params = signed_callback_params("ORD2003", "2401011200003", 1000, "1");
    params.insert("TradeAmt".to_string(), "1".to_string());
    let (status, body) = send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "0|CheckMacValue verification failed");

    let order = db.fetch_order_by_number(&OrderNumber::from("ORD2003")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    assert!(db.fetch_history_for_order(order.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn a_callback_for_an_unknown_order_asks_for_redelivery() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    let params = signed_callback_params("ORD2004", "2401011200004", 1000, "1");
    let (status, body) = send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "0|Unknown order");
}

#[actix_web::test]
async fn a_failure_callback_keeps_the_order_payable() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    register_order(&db, "ORD2005", 1000).await;

    let params = signed_callback_params("ORD2005", "2401011200005", 1000, "10200095");
    let (_, body) = send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    assert_eq!(body, "1|OK");

    let order = db.fetch_order_by_number(&OrderNumber::from("ORD2005")).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::PendingPayment);
    let history = db.fetch_history_for_order(order.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_type, "PAYMENT_FAILED");
}

#[actix_web::test]
async fn every_delivery_lands_in_the_audit_log() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    register_order(&db, "ORD2006", 1000).await;

    // One applied, one tampered
    let params = signed_callback_params("ORD2006", "2401011200006", 1000, "1");
    send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&params)).await;
    let mut tampered = params.clone();
    tampered.insert("TradeAmt".to_string(), "999999".to_string());
    send_request(&db, TestRequest::post().uri("/callback/ecpay").set_form(&tampered)).await;

    let (status, body) = send_request(&db, TestRequest::get().uri("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    let callbacks = response["callbacks"].as_array().unwrap();
    assert!(callbacks.iter().any(|s| s["process_result"] == "APPLIED" && s["count"] == 1));
    assert!(callbacks.iter().any(|s| s["process_result"] == "SIGNATURE_INVALID" && s["count"] == 1));
}
