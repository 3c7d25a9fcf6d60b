use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use checkout_payment_engine::{
    gateways::EcPayClient,
    CheckoutApi,
    LedgerApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    callback_routes::EcpayCallbackRoute,
    config::{ProxyConfig, ServerConfig},
    errors::ServerError,
    routes::{health, CheckoutRoute, IncomingOrderRoute, StatsRoute},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let ecpay = EcPayClient::new(config.ecpay.clone()).map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let proxy = ProxyConfig::from_config(&config);
    let srv = HttpServer::new(move || {
        let checkout_api = CheckoutApi::new(db.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone());
        let ledger_api = LedgerApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(ledger_api))
            .app_data(web::Data::new(ecpay.clone()))
            .app_data(web::Data::new(proxy));
        let api_scope = web::scope("/api")
            .service(IncomingOrderRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(StatsRoute::<SqliteDatabase>::new());
        let callback_scope = web::scope("/callback").service(EcpayCallbackRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(callback_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
