use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::{json, Value};

use super::helpers::{prepare_db, send_request};

fn order_body(order_number: &str, amount: i64) -> Value {
    json!({ "order_number": order_number, "total_amount": amount, "currency": "TWD" })
}

fn checkout_body(order_number: &str, amount: i64) -> Value {
    json!({ "order_number": order_number, "amount": amount, "currency": "TWD", "item_name": "Widget x1" })
}

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    let (status, body) = send_request(&db, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn order_intake_is_idempotent() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    let req = || TestRequest::post().uri("/api/orders").set_json(order_body("ORD1001", 1000));
    let (status, body) = send_request(&db, req()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("registered"));
    let (status, body) = send_request(&db, req()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("already exists"));
}

#[actix_web::test]
async fn checkout_returns_a_signed_redirect() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    send_request(&db, TestRequest::post().uri("/api/orders").set_json(order_body("ORD1002", 1500))).await;
    let (status, body) =
        send_request(&db, TestRequest::post().uri("/api/checkout").set_json(checkout_body("ORD1002", 1500))).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert!(response["payment_url"].as_str().unwrap().contains("payment-stage.ecpay.com.tw"));
    let params = response["params"].as_array().unwrap();
    assert!(params.iter().any(|p| p[0] == "CheckMacValue"));
    assert!(params.iter().any(|p| p[0] == "TotalAmount" && p[1] == "1500"));
}

#[actix_web::test]
async fn checkout_for_an_unknown_order_is_a_404() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    let (status, body) =
        send_request(&db, TestRequest::post().uri("/api/checkout").set_json(checkout_body("NOPE", 100))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("error"));
}

#[actix_web::test]
async fn checkout_with_the_wrong_amount_is_a_400() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    send_request(&db, TestRequest::post().uri("/api/orders").set_json(order_body("ORD1003", 1000))).await;
    let (status, body) =
        send_request(&db, TestRequest::post().uri("/api/checkout").set_json(checkout_body("ORD1003", 999))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("does not match"));
}

#[actix_web::test]
async fn stats_reflect_the_ledger() {
    let _ = env_logger::try_init().ok();
    let db = prepare_db().await;
    send_request(&db, TestRequest::post().uri("/api/orders").set_json(order_body("ORD1004", 1000))).await;
    send_request(&db, TestRequest::post().uri("/api/checkout").set_json(checkout_body("ORD1004", 1000))).await;
    let (status, body) = send_request(&db, TestRequest::get().uri("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    let ledger = response["ledger"].as_array().unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0]["status"], "INITIATED");
    assert_eq!(ledger[0]["count"], 1);
}
