//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests, so any long, non-cpu-bound operation (I/O, database
//! operations, etc.) must be expressed as futures or asynchronous functions.

use actix_web::{get, web, HttpResponse, Responder};
use checkout_payment_engine::{
    db_types::{NewOrder, OrderNumber},
    gateways::{EcPayClient, PaymentRequest},
    traits::PaymentGatewayDatabase,
    CheckoutApi,
    LedgerApi,
};
use log::*;

use crate::{
    data_objects::{CheckoutRequest, CheckoutResponse, JsonResponse, NewOrderRequest, StatsQuery, StatsResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(incoming_order => Post "/orders" impl PaymentGatewayDatabase);
/// Order intake from the storefront. Idempotent: re-announcing an order that already exists is answered with a
/// success body, since storefront notifications are retried.
pub async fn incoming_order<B: PaymentGatewayDatabase>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    trace!("🛒️ Received new order notification for {}", request.order_number);
    let order = NewOrder {
        order_number: OrderNumber::from(request.order_number),
        total_amount: request.total_amount,
        currency: request.currency,
    };
    let (order, inserted) = api.register_order(order).await?;
    let response = if inserted {
        JsonResponse::success(format!("Order {} registered.", order.order_number))
    } else {
        JsonResponse::success(format!("Order {} already exists.", order.order_number))
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl PaymentGatewayDatabase);
/// Builds the signed form the storefront must auto-submit to take the customer to the gateway's hosted payment
/// page. The order must exist, be awaiting payment, and the amount must match the order total.
pub async fn checkout<B: PaymentGatewayDatabase>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B>>,
    client: web::Data<EcPayClient>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST checkout for order {}", request.order_number);
    let payment_request = PaymentRequest {
        order_number: OrderNumber::from(request.order_number),
        amount: request.amount,
        currency: request.currency,
        item_name: request.item_name,
    };
    let (initiation, ledger_row) = api.initiate_payment(client.as_ref(), &payment_request).await?;
    debug!("💻️ Checkout for order {} recorded as ledger row {}", initiation.order_number, ledger_row.id);
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(initiation)))
}

//----------------------------------------------   Stats  ----------------------------------------------------
route!(stats => Get "/stats" impl PaymentGatewayDatabase);
pub async fn stats<B: PaymentGatewayDatabase>(
    query: web::Query<StatsQuery>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    let window = query.into();
    trace!("💻️ GET stats");
    let mut ledger = api.ledger_stats(window).await?;
    let mut callbacks = api.callback_stats(window).await?;
    if let Some(gateway) = query.gateway {
        ledger.retain(|s| s.gateway == gateway);
        callbacks.retain(|s| s.gateway == gateway);
    }
    Ok(HttpResponse::Ok().json(StatsResponse { ledger, callbacks }))
}
