use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use checkout_engine::{
    events::EventProducers,
    idempotency::MemoryIdempotencyStore,
    CartApi,
    CheckoutFlowApi,
    OrderLedgerApi,
    SqliteDatabase,
    SweeperApi,
    WebhookApi,
};
use log::*;

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    integrations::{flutterwave::FlutterwaveGateway, notifications::create_notification_handlers},
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        AddToCartRoute,
        BulkUpdateCartRoute,
        CheckoutRoute,
        ClearCartRoute,
        MyCartRoute,
        MyOrdersRoute,
        OrderByNumberRoute,
        PayForOrderRoute,
        PaymentHistoryRoute,
        PaymentStatusRoute,
        PaymentWebhookRoute,
        RemoveCartItemRoute,
        RetryPaymentRoute,
        UpdateCartItemRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
    sweeper_worker::start_sweeper_worker,
};

type Db = SqliteDatabase;
type Gateway = FlutterwaveGateway;
type Dedup = MemoryIdempotencyStore;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?
        .with_max_line_quantity(config.max_line_quantity);
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = FlutterwaveGateway::new(config.flutterwave.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_notification_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.sweep_interval.is_zero() {
        warn!("🧹️ CKO_SWEEP_INTERVAL_SECS is zero. The payment sweeper is disabled.");
    } else {
        let sweeper = SweeperApi::new(db.clone(), gateway.clone(), config.sweeper, producers.clone());
        let _handle = start_sweeper_worker(sweeper, config.sweep_interval);
    }
    let dedup = MemoryIdempotencyStore::default();
    let srv = create_server_instance(config, db, gateway, dedup, producers)?;
    srv.await.map_err(ServerError::from)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: FlutterwaveGateway,
    dedup: MemoryIdempotencyStore,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let validator = TokenValidator::new(&config.auth);
    let pricing = config.pricing.clone();
    let payments = config.payments.clone();
    let dedup_ttl = config.webhook_dedup_ttl;
    let srv = HttpServer::new(move || {
        let cart_api = CartApi::new(db.clone(), producers.clone());
        let flow_api = CheckoutFlowApi::new(
            db.clone(),
            gateway.clone(),
            pricing.clone(),
            payments.clone(),
            producers.clone(),
        );
        let orders_api = OrderLedgerApi::new(db.clone(), producers.clone());
        let webhook_api = WebhookApi::new(db.clone(), gateway.clone(), dedup.clone(), dedup_ttl, producers.clone());
        // Routes that require a valid access token
        let auth_scope = web::scope("")
            .wrap(JwtMiddlewareFactory::new(validator.clone()))
            .service(MyCartRoute::<Db>::new())
            .service(AddToCartRoute::<Db>::new())
            .service(BulkUpdateCartRoute::<Db>::new())
            .service(UpdateCartItemRoute::<Db>::new())
            .service(RemoveCartItemRoute::<Db>::new())
            .service(ClearCartRoute::<Db>::new())
            .service(CheckoutRoute::<Db, Gateway>::new())
            .service(MyOrdersRoute::<Db>::new())
            .service(OrderByNumberRoute::<Db>::new())
            .service(PayForOrderRoute::<Db, Gateway>::new())
            .service(UpdateOrderStatusRoute::<Db>::new())
            .service(PaymentHistoryRoute::<Db, Gateway>::new())
            .service(VerifyPaymentRoute::<Db, Gateway>::new())
            .service(PaymentStatusRoute::<Db, Gateway>::new())
            .service(RetryPaymentRoute::<Db, Gateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("checkout::access_log"))
            .app_data(json_config())
            .app_data(web::Data::new(cart_api))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(webhook_api))
            .service(health)
            // Webhooks are authenticated by their signature, not by a user token
            .service(PaymentWebhookRoute::<Db, Gateway, Dedup>::new())
            .service(auth_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed JSON bodies get the same error shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}
