use std::collections::HashMap;

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    App,
};
use checkout_payment_engine::{
    gateways::{checksum, EcPayClient, EcPayConfig},
    test_utils::{prepare_test_env, random_db_path},
    CheckoutApi,
    LedgerApi,
    ReconciliationApi,
    SqliteDatabase,
};
use cpg_common::Secret;

use crate::{
    callback_routes::EcpayCallbackRoute,
    config::ProxyConfig,
    routes::{health, CheckoutRoute, IncomingOrderRoute, StatsRoute},
};

pub const TEST_HASH_KEY: &str = "5294y06JbISpM5x9";
pub const TEST_HASH_IV: &str = "v77hoKGq4kWxNNIS";

// Test merchant credentials. DO NOT use real ones in tests.
pub fn test_ecpay_config() -> EcPayConfig {
    EcPayConfig {
        merchant_id: "2000132".to_string(),
        hash_key: Secret::new(TEST_HASH_KEY.to_string()),
        hash_iv: Secret::new(TEST_HASH_IV.to_string()),
        base_url: None,
        notify_url: "https://shop.example.com/callback/ecpay".to_string(),
        return_url: None,
        sandbox: true,
    }
}

pub async fn prepare_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}

/// Builds the full application around the given database and dispatches one request against it.
pub async fn send_request(db: &SqliteDatabase, req: TestRequest) -> (StatusCode, String) {
    let ecpay = EcPayClient::new(test_ecpay_config()).expect("valid test config");
    let app = App::new()
        .app_data(web::Data::new(CheckoutApi::new(db.clone())))
        .app_data(web::Data::new(ReconciliationApi::new(db.clone())))
        .app_data(web::Data::new(LedgerApi::new(db.clone())))
        .app_data(web::Data::new(ecpay))
        .app_data(web::Data::new(ProxyConfig::default()))
        .service(health)
        .service(
            web::scope("/api")
                .service(IncomingOrderRoute::<SqliteDatabase>::new())
                .service(CheckoutRoute::<SqliteDatabase>::new())
                .service(StatsRoute::<SqliteDatabase>::new()),
        )
        .service(web::scope("/callback").service(EcpayCallbackRoute::<SqliteDatabase>::new()));
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req.to_request()).await;
    let (_, res) = res.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

/// A correctly signed ECPay payment result callback for the given order.
pub fn signed_callback_params(order_number: &str, trade_no: &str, amount: i64, rtn_code: &str) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = [
        ("MerchantID", "2000132"),
        ("MerchantTradeNo", order_number),
        ("TradeNo", trade_no),
        ("RtnCode", rtn_code),
        ("RtnMsg", if rtn_code == "1" { "交易成功" } else { "付款失敗" }),
        ("PaymentDate", "2024/01/01 12:00:00"),
        ("PaymentType", "Credit_CreditCard"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    params.insert("TradeAmt".to_string(), amount.to_string());
    let mac =
        checksum::generate(TEST_HASH_KEY, TEST_HASH_IV, params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    params.insert(checksum::SIGNATURE_FIELD.to_string(), mac);
    params
}
