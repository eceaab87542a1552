//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database and gateway call in here is async for that reason.
//! Never call a blocking function from a handler.
//!
//! Every route except `/health` and the gateway webhooks sits behind the JWT middleware (see [`crate::server`]), so
//! handlers can take [`JwtClaims`] as an argument and scope their work to the caller.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use checkout_engine::{
    db_types::{PaymentStatus, Role},
    gateway::PaymentGateway,
    idempotency::IdempotencyStore,
    traits::{CheckoutDatabase, CheckoutRequest},
    CartApi,
    CheckoutFlowApi,
    OrderLedgerApi,
    WebhookApi,
    WebhookError,
    WebhookOutcome,
};
use flutterwave_tools::signature::SIGNATURE_HEADER;
use log::*;
use serde_json::json;

use crate::{
    auth::JwtClaims,
    data_objects::{
        AddToCartParams,
        BulkCartUpdate,
        CheckoutParams,
        JsonResponse,
        OrderStatusParams,
        QuantityParams,
        VerifyParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
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

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
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
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
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

//----------------------------------------------   Cart  ----------------------------------------------------
route!(my_cart => Get "/cart" impl CheckoutDatabase);
/// The caller's cart, with the current catalog price and name of every line.
pub async fn my_cart<B: CheckoutDatabase>(
    claims: JwtClaims,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET cart for user #{}", claims.sub);
    let cart = api.snapshot(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(add_to_cart => Post "/cart" impl CheckoutDatabase);
pub async fn add_to_cart<B: CheckoutDatabase>(
    claims: JwtClaims,
    body: web::Json<AddToCartParams>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let AddToCartParams { product_id, quantity } = body.into_inner();
    debug!("💻️ POST cart: user #{} adds {quantity} of product {product_id}", claims.sub);
    api.add_item(claims.user_id(), product_id, quantity).await?;
    let cart = api.snapshot(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(bulk_update_cart => Put "/cart/items/bulk" impl CheckoutDatabase);
/// Sets several quantities at once. Either every update is applied, or none is. Quantities must be at least 1.
pub async fn bulk_update_cart<B: CheckoutDatabase>(
    claims: JwtClaims,
    body: web::Json<BulkCartUpdate>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let updates = body.into_inner().items;
    debug!("💻️ PUT bulk cart update of {} items for user #{}", updates.len(), claims.sub);
    api.bulk_set(claims.user_id(), &updates).await?;
    let cart = api.snapshot(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(update_cart_item => Patch "/cart/items/{item_id}" impl CheckoutDatabase);
pub async fn update_cart_item<B: CheckoutDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<QuantityParams>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let item_id = path.into_inner();
    debug!("💻️ PATCH cart item {item_id} for user #{}", claims.sub);
    api.set_item_quantity(claims.user_id(), item_id, body.quantity).await?;
    let cart = api.snapshot(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(remove_cart_item => Delete "/cart/items/{item_id}" impl CheckoutDatabase);
pub async fn remove_cart_item<B: CheckoutDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let item_id = path.into_inner();
    debug!("💻️ DELETE cart item {item_id} for user #{}", claims.sub);
    api.remove_item(claims.user_id(), item_id).await?;
    let cart = api.snapshot(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(clear_cart => Post "/cart/clear" impl CheckoutDatabase);
pub async fn clear_cart<B: CheckoutDatabase>(
    claims: JwtClaims,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST clear cart for user #{}", claims.sub);
    let removed = api.clear(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Removed {removed} items from your cart"))))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl CheckoutDatabase, PaymentGateway);
/// Turns the caller's cart into an order and starts the payment.
///
/// The order is created even if the gateway cannot be reached. In that case the response carries `payment_error`
/// instead of `payment_link`, and the customer can pay later through `POST /orders/{order_number}/pay`.
pub async fn checkout<B: CheckoutDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CheckoutParams>,
    api: web::Data<CheckoutFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST checkout for user #{}", claims.sub);
    let request = CheckoutRequest::try_from(body.into_inner())?;
    let receipt = api.checkout(claims.user_id(), claims.customer_info(), request).await?;
    info!("💻️ User #{} placed order {}", claims.sub, receipt.order.order_number);
    Ok(HttpResponse::Created().json(receipt))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl CheckoutDatabase);
pub async fn my_orders<B: CheckoutDatabase>(
    claims: JwtClaims,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET orders for user #{}", claims.sub);
    let orders = api.orders_for_user(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_number => Get "/orders/{order_number}" impl CheckoutDatabase);
/// An order with its items and payment attempts. Users can only see their own orders; admins can see any.
pub async fn order_by_number<B: CheckoutDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = path.into_inner();
    debug!("💻️ GET order {order_number} for user #{}", claims.sub);
    let detail = api
        .order_detail(&order_number)
        .await?
        .filter(|d| d.order.user_id == claims.user_id() || claims.is_admin())
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_number} was not found")))?;
    Ok(HttpResponse::Ok().json(detail))
}

route!(pay_for_order => Post "/orders/{order_number}/pay" impl CheckoutDatabase, PaymentGateway);
pub async fn pay_for_order<B: CheckoutDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<CheckoutFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = path.into_inner();
    debug!("💻️ POST pay for order {order_number} by user #{}", claims.sub);
    let payment = api.pay_for_order(claims.user_id(), &order_number, claims.customer_info()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(update_order_status => Patch "/admin/orders/{order_number}/status" impl CheckoutDatabase where requires [Role::Admin]);
pub async fn update_order_status<B: CheckoutDatabase>(
    claims: JwtClaims,
    path: web::Path<String>,
    body: web::Json<OrderStatusParams>,
    api: web::Data<OrderLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_number = path.into_inner();
    let status = body.status;
    info!("💻️ Admin #{} is moving order {order_number} to {status}", claims.sub);
    let order = api.update_status(&order_number, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(verify_payment => Get "/payments/{payment_id}/verify" impl CheckoutDatabase, PaymentGateway);
/// Where the customer lands after the hosted payment page. If the payment is still open, the gateway is asked for
/// the outcome before answering.
pub async fn verify_payment<B: CheckoutDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    query: web::Query<VerifyParams>,
    api: web::Data<CheckoutFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    debug!("💻️ GET verify payment {payment_id} for user #{}", claims.sub);
    let tx_id = query.transaction_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let report = api.verify_payment(claims.user_id(), &payment_id, tx_id).await?;
    if report.payment.requires_review && report.payment.status == PaymentStatus::Failed {
        return Err(ServerError::AmountMismatch(report.order_number));
    }
    Ok(HttpResponse::Ok().json(report))
}

route!(payment_status => Get "/payments/{payment_id}/status" impl CheckoutDatabase, PaymentGateway);
pub async fn payment_status<B: CheckoutDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<CheckoutFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    trace!("💻️ GET status of payment {payment_id} for user #{}", claims.sub);
    let report = api.payment_status(claims.user_id(), &payment_id).await?;
    Ok(HttpResponse::Ok().json(report))
}

route!(retry_payment => Post "/payments/{payment_id}/retry" impl CheckoutDatabase, PaymentGateway);
pub async fn retry_payment<B: CheckoutDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<CheckoutFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let payment_id = path.into_inner();
    debug!("💻️ POST retry payment {payment_id} for user #{}", claims.sub);
    let payment = api.retry_payment(claims.user_id(), &payment_id, claims.customer_info()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(payment_history => Get "/payments/history" impl CheckoutDatabase, PaymentGateway);
pub async fn payment_history<B: CheckoutDatabase, G: PaymentGateway>(
    claims: JwtClaims,
    api: web::Data<CheckoutFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET payment history for user #{}", claims.sub);
    let payments = api.payment_history(claims.user_id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": payments.len(), "payments": payments })))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payment_webhook => Post "/payments/webhooks/{gateway}" impl CheckoutDatabase, PaymentGateway, IdempotencyStore);
/// Status notifications pushed by the payment gateway.
///
/// The gateway only needs to know whether to try again, so responses never carry internal detail:
/// * 200 for anything we handled, have seen before, or can never handle (an unknown reference). Retrying would not
///   help with the last one.
/// * 401 for a missing or bad signature, and 400 for a body we cannot read.
/// * 503 if the gateway's own verification endpoint could not be reached, and 500 for a database failure. The gateway
///   retries these later, and the replay is safe.
pub async fn payment_webhook<B, G, S>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, G, S>>,
) -> HttpResponse
where
    B: CheckoutDatabase,
    G: PaymentGateway,
    S: IdempotencyStore,
{
    let gateway = path.into_inner();
    if !gateway.eq_ignore_ascii_case(api.gateway_name()) {
        warn!("🪝️ Received a webhook for unknown gateway '{gateway}'");
        return HttpResponse::NotFound().json(JsonResponse::failure("Unknown gateway"));
    }
    let signature = req.headers().get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match api.handle(body.as_ref(), signature).await {
        Ok(WebhookOutcome::Duplicate) => HttpResponse::Ok().json(JsonResponse::success("Already processed")),
        Ok(WebhookOutcome::Applied(outcome)) => {
            debug!("🪝️ {gateway} webhook applied. Payment {} is {}", outcome.payment().payment_id, outcome.status());
            HttpResponse::Ok().json(JsonResponse::success("Processed"))
        },
        Err(WebhookError::PaymentNotFound(tx_ref)) => {
            warn!("🪝️ {gateway} webhook refers to unknown payment {tx_ref}. Acknowledging it anyway");
            HttpResponse::Ok().json(JsonResponse::success("Acknowledged"))
        },
        Err(WebhookError::Unauthorized) => HttpResponse::Unauthorized().json(JsonResponse::failure("Unauthorized")),
        Err(WebhookError::MalformedPayload(e)) => {
            warn!("🪝️ Could not read {gateway} webhook. {e}");
            HttpResponse::BadRequest().json(JsonResponse::failure("Malformed payload"))
        },
        Err(WebhookError::Gateway(e)) => {
            warn!("🪝️ Could not verify {gateway} webhook with the gateway. The gateway will retry. {e}");
            HttpResponse::ServiceUnavailable().json(JsonResponse::failure("Try again later"))
        },
        Err(WebhookError::Database(e)) => {
            error!("🪝️ Database error while handling {gateway} webhook. {e}");
            HttpResponse::InternalServerError().json(JsonResponse::failure("Try again later"))
        },
    }
}
