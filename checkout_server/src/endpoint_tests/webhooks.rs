use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{Money, PaymentMethod, ShippingInfo},
    gateway::{CustomerInfo, GatewayError, GatewayTxStatus, PaymentGateway},
    idempotency::MemoryIdempotencyStore,
    objects::CheckoutReceipt,
    test_utils::scripted_gateway::ScriptedGateway,
    traits::CheckoutRequest,
    SqliteDatabase,
};
use flutterwave_tools::signature::SIGNATURE_HEADER;
use serde_json::json;

use super::{
    helpers::{json_body, send_public_request, setup, TestEnv, ALICE},
    mocks::mock_gateway,
};
use crate::routes::PaymentWebhookRoute;

fn configure<G: PaymentGateway + 'static>(env: &TestEnv, gateway: G) -> impl FnOnce(&mut ServiceConfig) {
    let api = web::Data::new(env.webhook_api(gateway));
    move |cfg| {
        cfg.app_data(api).service(PaymentWebhookRoute::<SqliteDatabase, G, MemoryIdempotencyStore>::new());
    }
}

async fn place_order(env: &TestEnv) -> CheckoutReceipt {
    env.fill_cart(ALICE).await;
    let request = CheckoutRequest {
        shipping: ShippingInfo {
            address: "12 Admiralty Way".into(),
            city: "Lekki".into(),
            state: "Lagos Island".into(),
            country: "Nigeria".into(),
            zip_code: "106104".into(),
        },
        payment_method: PaymentMethod::Flutterwave,
        customer_phone: None,
        notes: None,
    };
    let customer = CustomerInfo { email: "user1@example.com".into(), name: "Alice".into(), phone: None };
    let api = env.flow_api(ScriptedGateway::default());
    api.checkout(ALICE, customer, request).await.expect("Checkout failed")
}

fn notification(tx_ref: &str, status: &str, id: &str, amount: &str) -> String {
    json!({
        "event": "charge.completed",
        "data": { "id": id, "tx_ref": tx_ref, "status": status, "amount": amount, "currency": "NGN" }
    })
    .to_string()
}

fn webhook(body: String, signature: Option<&str>) -> TestRequest {
    let req = TestRequest::post()
        .uri("/payments/webhooks/flutterwave")
        .insert_header(("content-type", "application/json"))
        .set_payload(body);
    match signature {
        Some(sig) => req.insert_header((SIGNATURE_HEADER, sig.to_string())),
        None => req,
    }
}

async fn payment_status(env: &TestEnv, order_number: &str) -> (String, bool) {
    let detail = env.orders_api().order_detail(order_number).await.unwrap().expect("Order not found");
    (detail.payments[0].status.to_string(), detail.order.payment_status)
}

#[actix_web::test]
async fn successful_payment_is_applied_once() {
    let env = setup().await;
    let receipt = place_order(&env).await;
    let tx_ref = receipt.payment.tx_ref();
    let gateway = ScriptedGateway::default();
    gateway.set_transaction("8001", tx_ref, GatewayTxStatus::Successful, Money::from_major(9000));
    let sig = gateway.signature();
    let body = notification(tx_ref, "successful", "8001", "9000.00");

    let api = web::Data::new(env.webhook_api(gateway.clone()));
    for expected in ["Processed", "Already processed"] {
        let api = api.clone();
        let configure = move |cfg: &mut ServiceConfig| {
            cfg.app_data(api)
                .service(PaymentWebhookRoute::<SqliteDatabase, ScriptedGateway, MemoryIdempotencyStore>::new());
        };
        let (status, res) = send_public_request(webhook(body.clone(), Some(&sig)), configure).await;
        assert_eq!(status, StatusCode::OK);
        let res = json_body(&res);
        assert_eq!(res["success"], true);
        assert_eq!(res["message"], expected);
    }
    assert_eq!(gateway.verify_calls(), 1);
    let (status, paid) = payment_status(&env, &receipt.order.order_number).await;
    assert_eq!(status, "successful");
    assert!(paid);
}

#[actix_web::test]
async fn failed_payment() {
    let env = setup().await;
    let receipt = place_order(&env).await;
    let gateway = ScriptedGateway::default();
    let sig = gateway.signature();
    let body = notification(receipt.payment.tx_ref(), "failed", "8002", "9000.00");
    let (status, _) = send_public_request(webhook(body, Some(&sig)), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, paid) = payment_status(&env, &receipt.order.order_number).await;
    assert_eq!(status, "failed");
    assert!(!paid);
    assert_eq!(gateway.verify_calls(), 0);
}

#[actix_web::test]
async fn bad_signature() {
    let env = setup().await;
    let receipt = place_order(&env).await;
    let gateway = ScriptedGateway::default();
    gateway.set_transaction("8003", receipt.payment.tx_ref(), GatewayTxStatus::Successful, Money::from_major(9000));
    let body = notification(receipt.payment.tx_ref(), "successful", "8003", "9000.00");

    let req = webhook(body.clone(), Some("forged"));
    let (status, res) = send_public_request(req, configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&res)["message"], "Unauthorized");
    let (status, _) = send_public_request(webhook(body, None), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(gateway.verify_calls(), 0);
    let (status, paid) = payment_status(&env, &receipt.order.order_number).await;
    assert_eq!(status, "pending");
    assert!(!paid);
}

#[actix_web::test]
async fn unknown_payment_is_acknowledged() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let sig = gateway.signature();
    let body = notification("no-such-payment", "successful", "8004", "100.00");
    let (status, res) = send_public_request(webhook(body, Some(&sig)), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&res)["message"], "Acknowledged");
    assert_eq!(gateway.verify_calls(), 0);
}

#[actix_web::test]
async fn malformed_payload() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let sig = gateway.signature();
    let (status, res) =
        send_public_request(webhook("{\"event\": ".to_string(), Some(&sig)), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // No internal detail leaks to the caller
    assert_eq!(json_body(&res)["message"], "Malformed payload");
}

#[actix_web::test]
async fn unknown_gateway() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let req = TestRequest::post().uri("/payments/webhooks/paystack").set_payload("{}");
    let (status, _) = send_public_request(req, configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn verification_outage_asks_for_a_retry() {
    let env = setup().await;
    let receipt = place_order(&env).await;
    let mut gateway = mock_gateway();
    gateway.expect_validate_signature().returning(|_, sig| sig == "s3cret");
    gateway.expect_verify().times(1).returning(|_| Err(GatewayError::Network("connection reset".into())));
    let body = notification(receipt.payment.tx_ref(), "successful", "8005", "9000.00");
    let (status, res) = send_public_request(webhook(body, Some("s3cret")), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&res)["message"], "Try again later");
    let (status, paid) = payment_status(&env, &receipt.order.order_number).await;
    assert_eq!(status, "pending");
    assert!(!paid);
}
