use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::Money,
    gateway::{GatewayError, PaymentGateway},
    test_utils::scripted_gateway::ScriptedGateway,
    SqliteDatabase,
};
use serde_json::json;

use super::{
    helpers::{json_body, lekki_checkout, send_request, setup, user_token, TestEnv, ALICE},
    mocks::mock_gateway,
};
use crate::routes::{CheckoutRoute, MyCartRoute};

fn configure<G: PaymentGateway + 'static>(env: &TestEnv, gateway: G) -> impl FnOnce(&mut ServiceConfig) {
    let flow_api = web::Data::new(env.flow_api(gateway));
    let cart_api = web::Data::new(env.cart_api());
    move |cfg| {
        cfg.app_data(flow_api)
            .app_data(cart_api)
            .service(CheckoutRoute::<SqliteDatabase, G>::new())
            .service(MyCartRoute::<SqliteDatabase>::new());
    }
}

fn checkout_request(payment_method: &str) -> TestRequest {
    TestRequest::post().uri("/checkout").set_json(lekki_checkout(payment_method))
}

#[actix_web::test]
async fn checkout_returns_a_payment_link() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let (status, body) =
        send_request(checkout_request("flutterwave"), Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let receipt = json_body(&body);
    let order = &receipt["order"];
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], false);
    assert_eq!(order["subtotal"], "4500.00");
    assert_eq!(order["shipping_fee"], "4500.00");
    assert_eq!(order["total"], "9000.00");
    assert_eq!(receipt["items"].as_array().unwrap().len(), 2);
    let payment_id = receipt["payment"]["payment_id"].as_str().unwrap();
    assert_eq!(receipt["payment"]["status"], "pending");
    assert_eq!(receipt["payment_link"], format!("https://pay.test/{payment_id}"));
    assert!(receipt.get("payment_error").map_or(true, |e| e.is_null()));

    let requests = gateway.init_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tx_ref, payment_id);
    assert_eq!(requests[0].amount, Money::from_major(9000));
    assert_eq!(requests[0].customer.email, "user1@example.com");
    assert_eq!(requests[0].customer.phone.as_deref(), Some("+2348000000000"));
}

#[actix_web::test]
async fn prices_come_from_the_catalog() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let mut body = lekki_checkout("flutterwave");
    body["total"] = json!("1.00");
    body["subtotal"] = json!("1.00");
    let req = TestRequest::post().uri("/checkout").set_json(body);
    let (status, body) = send_request(req, Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["order"]["total"], "9000.00");
}

#[actix_web::test]
async fn cash_on_delivery_settles_at_checkout() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let (status, body) =
        send_request(checkout_request("cash_on_delivery"), Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let receipt = json_body(&body);
    assert_eq!(receipt["order"]["status"], "processing");
    assert_eq!(receipt["order"]["payment_status"], true);
    assert_eq!(receipt["payment"]["status"], "successful");
    assert!(gateway.init_requests().is_empty());

    let (_, body) = send_request(TestRequest::get().uri("/cart"), Some(&token), configure(&env, gateway)).await;
    assert_eq!(json_body(&body)["total_item_count"], 0);
}

#[actix_web::test]
async fn empty_cart() {
    let env = setup().await;
    let token = user_token(ALICE);
    let (status, body) =
        send_request(checkout_request("flutterwave"), Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "conflict");
}

#[actix_web::test]
async fn checking_out_the_same_cart_twice() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let (status, _) =
        send_request(checkout_request("flutterwave"), Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) =
        send_request(checkout_request("flutterwave"), Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "conflict");
}

#[actix_web::test]
async fn unsupported_region() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let mut body = lekki_checkout("flutterwave");
    body["shipping_state"] = json!("Kano");
    let req = TestRequest::post().uri("/checkout").set_json(body);
    let (status, body) = send_request(req, Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_body(&body);
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("Kano"));
}

#[actix_web::test]
async fn missing_shipping_details() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let mut body = lekki_checkout("flutterwave");
    body["shipping_address"] = json!(" ");
    let req = TestRequest::post().uri("/checkout").set_json(body);
    let (status, body) = send_request(req, Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"], "shipping_address is required");
}

#[actix_web::test]
async fn unknown_payment_method() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let (status, body) =
        send_request(checkout_request("bitcoin"), Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "validation_error");
}

#[actix_web::test]
async fn order_survives_a_gateway_outage() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let mut gateway = mock_gateway();
    gateway.expect_initialize().times(3).returning(|_| Err(GatewayError::Network("connection refused".into())));
    let (status, body) = send_request(checkout_request("flutterwave"), Some(&token), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::CREATED);
    let receipt = json_body(&body);
    assert_eq!(receipt["order"]["status"], "pending");
    assert_eq!(receipt["payment"]["status"], "failed");
    assert!(receipt["payment_link"].is_null());
    assert!(receipt["payment_error"].as_str().unwrap().contains("connection refused"));
}

#[actix_web::test]
async fn refused_payments_are_not_retried() {
    let env = setup().await;
    env.fill_cart(ALICE).await;
    let token = user_token(ALICE);
    let mut gateway = mock_gateway();
    gateway.expect_initialize().times(1).returning(|_| {
        Err(GatewayError::Rejected { status: Some(400), message: "Invalid currency".into() })
    });
    let (status, body) = send_request(checkout_request("flutterwave"), Some(&token), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::CREATED);
    let receipt = json_body(&body);
    assert_eq!(receipt["payment"]["status"], "failed");
    assert!(receipt["payment"]["last_error"].as_str().unwrap().contains("Invalid currency"));
}
