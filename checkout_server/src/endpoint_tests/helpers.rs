use std::time::Duration;

use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use checkout_engine::{
    db_types::{Product, Role, UserId},
    events::EventProducers,
    gateway::PaymentGateway,
    idempotency::MemoryIdempotencyStore,
    objects::PaymentSettings,
    pricing::PricingPolicy,
    test_utils::prepare_env::{prepare_test_env, seed_catalog},
    CartApi,
    CheckoutFlowApi,
    OrderLedgerApi,
    SqliteDatabase,
    WebhookApi,
};
use chrono::{DateTime, Days, Utc};
use log::debug;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{
    auth::{JwtClaims, TokenIssuer, TokenValidator},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
    server::json_config,
};

pub const ALICE: UserId = 1;
pub const BOB: UserId = 2;
pub const ADMIN: UserId = 99;

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("0b6f3c1e8d2a4f7e9c5b1a3d6e8f0a2c")
}

pub fn issue_token(claims: JwtClaims, expiry: DateTime<Utc>) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(claims, expiry).expect("Failed to sign token")
}

pub fn user_token(user_id: UserId) -> String {
    let claims = JwtClaims::new(user_id, &format!("user{user_id}@example.com"), "Test Customer", vec![Role::User]);
    issue_token(claims, Utc::now() + Days::new(1))
}

pub fn admin_token() -> String {
    let claims = JwtClaims::new(ADMIN, "admin@example.com", "Shop Admin", vec![Role::User, Role::Admin]);
    issue_token(claims, Utc::now() + Days::new(1))
}

/// A fresh database in a temporary directory, with two products in the catalog. The directory is removed when the
/// environment is dropped.
pub struct TestEnv {
    pub db: SqliteDatabase,
    pub product_a: Product,
    pub product_b: Product,
    _dir: TempDir,
}

pub async fn setup() -> TestEnv {
    let dir = tempfile::tempdir().expect("Could not create a temporary directory");
    let url = format!("sqlite://{}", dir.path().join("checkout.db").display());
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let (product_a, product_b) = seed_catalog(&db).await;
    TestEnv { db, product_a, product_b, _dir: dir }
}

impl TestEnv {
    pub fn cart_api(&self) -> CartApi<SqliteDatabase> {
        CartApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn flow_api<G: PaymentGateway>(&self, gateway: G) -> CheckoutFlowApi<SqliteDatabase, G> {
        let settings = PaymentSettings { network_backoff: Duration::from_millis(1), ..Default::default() };
        CheckoutFlowApi::new(self.db.clone(), gateway, PricingPolicy::default(), settings, EventProducers::default())
    }

    pub fn orders_api(&self) -> OrderLedgerApi<SqliteDatabase> {
        OrderLedgerApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn webhook_api<G: PaymentGateway>(&self, gateway: G) -> WebhookApi<SqliteDatabase, G, MemoryIdempotencyStore> {
        let dedup = MemoryIdempotencyStore::default();
        WebhookApi::new(self.db.clone(), gateway, dedup, Duration::from_secs(3600), EventProducers::default())
    }

    /// Two of product A and one of product B: a subtotal of 4500.00
    pub async fn fill_cart(&self, user_id: UserId) {
        let cart = self.cart_api();
        cart.add_item(user_id, self.product_a.id, 2).await.expect("Error adding to cart");
        cart.add_item(user_id, self.product_b.id, 1).await.expect("Error adding to cart");
    }
}

pub fn lekki_checkout(payment_method: &str) -> Value {
    json!({
        "shipping_address": "12 Admiralty Way",
        "shipping_city": "Lekki",
        "shipping_state": "Lagos Island",
        "shipping_country": "Nigeria",
        "shipping_zip_code": "106104",
        "payment_method": payment_method,
        "phone": "+2348000000000"
    })
}

pub fn json_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}

/// Sends `req` through the access token middleware, to the routes registered by `configure`. If `token` is given it
/// is sent as a bearer token.
pub async fn send_request<F>(req: TestRequest, token: Option<&str>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = match token {
        Some(token) => req.insert_header((AUTHORIZATION, format!("Bearer {token}"))),
        None => req,
    };
    let validator = TokenValidator::new(&get_auth_config());
    let app = App::new()
        .app_data(json_config())
        .service(web::scope("").wrap(JwtMiddlewareFactory::new(validator)).configure(configure));
    call(app, req).await
}

/// Sends `req` to routes that do not need an access token.
pub async fn send_public_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().app_data(json_config()).configure(configure);
    call(app, req).await
}

async fn call<T, B>(app: App<T>, req: TestRequest) -> (StatusCode, String)
where
    T: ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<B>,
        Error = actix_web::Error,
        InitError = (),
    > + 'static,
    T::Future: 'static,
    B: MessageBody + 'static,
{
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        // Errors raised by middleware are rendered by the server, not the service
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}
