use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{Money, PaymentMethod, ShippingInfo},
    gateway::{CustomerInfo, GatewayError, GatewayTxStatus},
    objects::CheckoutReceipt,
    test_utils::scripted_gateway::ScriptedGateway,
    traits::CheckoutRequest,
    SqliteDatabase,
};

use super::helpers::{json_body, send_request, setup, user_token, TestEnv, ALICE, BOB};
use crate::routes::{PaymentHistoryRoute, PaymentStatusRoute, RetryPaymentRoute, VerifyPaymentRoute};

type Gateway = ScriptedGateway;

fn configure(env: &TestEnv, gateway: &Gateway) -> impl FnOnce(&mut ServiceConfig) {
    let flow_api = web::Data::new(env.flow_api(gateway.clone()));
    move |cfg| {
        cfg.app_data(flow_api)
            .service(PaymentHistoryRoute::<SqliteDatabase, Gateway>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, Gateway>::new())
            .service(PaymentStatusRoute::<SqliteDatabase, Gateway>::new())
            .service(RetryPaymentRoute::<SqliteDatabase, Gateway>::new());
    }
}

/// A Flutterwave order for 9000.00 (4500.00 of goods plus 4500.00 shipping to Lekki)
async fn place_order(env: &TestEnv, gateway: &Gateway) -> CheckoutReceipt {
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
    env.flow_api(gateway.clone()).checkout(ALICE, customer, request).await.expect("Checkout failed")
}

async fn get(env: &TestEnv, gateway: &Gateway, user: i64, path: &str) -> (StatusCode, String) {
    send_request(TestRequest::get().uri(path), Some(&user_token(user)), configure(env, gateway)).await
}

async fn post(env: &TestEnv, gateway: &Gateway, user: i64, path: &str) -> (StatusCode, String) {
    send_request(TestRequest::post().uri(path), Some(&user_token(user)), configure(env, gateway)).await
}

#[actix_web::test]
async fn verify_settles_a_successful_payment() {
    let env = setup().await;
    let gateway = Gateway::default();
    let receipt = place_order(&env, &gateway).await;
    let payment_id = receipt.payment.payment_id.as_str();
    gateway.set_transaction("7001", payment_id, GatewayTxStatus::Successful, Money::from_major(9000));

    let path = format!("/payments/{payment_id}/verify?transaction_id=7001");
    let (status, body) = get(&env, &gateway, ALICE, &path).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_body(&body);
    assert_eq!(report["payment"]["status"], "successful");
    assert_eq!(report["payment"]["gateway_transaction_id"], "7001");
    assert_eq!(report["payment"]["gateway_reference"], "FLW-7001");
    assert_eq!(report["order_number"], receipt.order.order_number);
    assert_eq!(report["order_status"], "processing");
    assert_eq!(report["order_paid"], true);
    assert_eq!(report["can_retry"], false);

    // Settled payments are not verified again
    let (status, _) = get(&env, &gateway, ALICE, &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gateway.verify_calls(), 1);
}

#[actix_web::test]
async fn verify_without_a_transaction_reports_stored_state() {
    let env = setup().await;
    let gateway = Gateway::default();
    let receipt = place_order(&env, &gateway).await;
    let path = format!("/payments/{}/verify", receipt.payment.payment_id);
    let (status, body) = get(&env, &gateway, ALICE, &path).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_body(&body);
    assert_eq!(report["payment"]["status"], "pending");
    assert_eq!(report["order_paid"], false);
    assert_eq!(gateway.verify_calls(), 0);
}

#[actix_web::test]
async fn verify_while_the_gateway_is_down() {
    let env = setup().await;
    let gateway = Gateway::default();
    let receipt = place_order(&env, &gateway).await;
    gateway.fail_verify("7002", GatewayError::Network("timed out".into()));
    let path = format!("/payments/{}/verify?transaction_id=7002", receipt.payment.payment_id);
    let (status, body) = get(&env, &gateway, ALICE, &path).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_body(&body);
    assert_eq!(report["payment"]["status"], "pending");
    // Unconfirmed ids are never stored
    assert!(report["payment"]["gateway_transaction_id"].is_null());
}

#[actix_web::test]
async fn verify_ignores_transactions_that_are_not_ours() {
    let env = setup().await;
    let gateway = Gateway::default();
    let receipt = place_order(&env, &gateway).await;
    let payment_id = receipt.payment.payment_id.as_str();
    gateway.set_transaction("7010", "some-other-payment", GatewayTxStatus::Successful, Money::from_major(9000));

    for tx_id in ["7010", "no-such-transaction"] {
        let path = format!("/payments/{payment_id}/verify?transaction_id={tx_id}");
        let (status, body) = get(&env, &gateway, ALICE, &path).await;
        assert_eq!(status, StatusCode::OK);
        let report = json_body(&body);
        assert_eq!(report["payment"]["status"], "pending");
        assert!(report["payment"]["gateway_transaction_id"].is_null());
        assert_eq!(report["order_paid"], false);
    }
    assert_eq!(gateway.verify_calls(), 2);
    let (_, body) = get(&env, &gateway, ALICE, &format!("/payments/{payment_id}/status")).await;
    assert!(json_body(&body)["payment"]["gateway_transaction_id"].is_null());
}

#[actix_web::test]
async fn underpayment_is_flagged() {
    let env = setup().await;
    let gateway = Gateway::default();
    let receipt = place_order(&env, &gateway).await;
    let payment_id = receipt.payment.payment_id.as_str();
    gateway.set_transaction("7003", payment_id, GatewayTxStatus::Successful, Money::from_major(90));

    let path = format!("/payments/{payment_id}/verify?transaction_id=7003");
    let (status, body) = get(&env, &gateway, ALICE, &path).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(&body);
    assert_eq!(body["code"], "amount_mismatch");
    assert!(body["error"].as_str().unwrap().contains(&receipt.order.order_number));

    let (status, body) = get(&env, &gateway, ALICE, &format!("/payments/{payment_id}/status")).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_body(&body);
    assert_eq!(report["payment"]["status"], "failed");
    assert_eq!(report["payment"]["requires_review"], true);
    assert_eq!(report["order_paid"], false);
}

#[actix_web::test]
async fn payments_are_private() {
    let env = setup().await;
    let gateway = Gateway::default();
    let receipt = place_order(&env, &gateway).await;
    let payment_id = receipt.payment.payment_id.as_str();
    let (status, body) = get(&env, &gateway, BOB, &format!("/payments/{payment_id}/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "not_found");
    let (status, _) = get(&env, &gateway, BOB, &format!("/payments/{payment_id}/verify?transaction_id=1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = post(&env, &gateway, BOB, &format!("/payments/{payment_id}/retry")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = get(&env, &gateway, BOB, "/payments/history").await;
    assert_eq!(json_body(&body)["count"], 0);
}

#[actix_web::test]
async fn retry_a_failed_payment() {
    let env = setup().await;
    let gateway = Gateway::default();
    gateway.fail_next_init(GatewayError::Rejected { status: Some(400), message: "Card issuer declined".into() });
    let receipt = place_order(&env, &gateway).await;
    let first = receipt.payment.payment_id.as_str();

    let (status, body) = get(&env, &gateway, ALICE, &format!("/payments/{first}/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["can_retry"], true);

    let (status, body) = post(&env, &gateway, ALICE, &format!("/payments/{first}/retry")).await;
    assert_eq!(status, StatusCode::OK);
    let retry = json_body(&body);
    let second = retry["payment_id"].as_str().unwrap();
    assert_ne!(second, first);
    assert_eq!(retry["tx_ref"], second);
    assert_eq!(retry["retry_count"], 1);
    assert_eq!(retry["payment_link"], format!("https://pay.test/{second}"));

    // The retry is open, so it cannot be retried, and the old attempt is no longer the latest
    let (status, body) = post(&env, &gateway, ALICE, &format!("/payments/{second}/retry")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "conflict");
    let (status, _) = post(&env, &gateway, ALICE, &format!("/payments/{first}/retry")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&env, &gateway, ALICE, "/payments/history").await;
    assert_eq!(status, StatusCode::OK);
    let history = json_body(&body);
    assert_eq!(history["count"], 2);
    assert_eq!(history["payments"][0]["payment_id"], second);
}

#[actix_web::test]
async fn retries_run_out() {
    let env = setup().await;
    let gateway = Gateway::default();
    for _ in 0..4 {
        gateway.fail_next_init(GatewayError::MissingLink);
    }
    let receipt = place_order(&env, &gateway).await;
    let mut payment_id = receipt.payment.payment_id.clone();
    for _ in 0..3 {
        let (status, body) = post(&env, &gateway, ALICE, &format!("/payments/{payment_id}/retry")).await;
        // The gateway refuses every attempt
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(&body)["code"], "gateway_error");
        let (_, body) = get(&env, &gateway, ALICE, "/payments/history").await;
        payment_id = json_body(&body)["payments"][0]["payment_id"].as_str().unwrap().to_string();
    }
    let (_, body) = get(&env, &gateway, ALICE, &format!("/payments/{payment_id}/status")).await;
    let report = json_body(&body);
    assert_eq!(report["payment"]["retry_count"], 3);
    assert_eq!(report["can_retry"], false);

    let (status, body) = post(&env, &gateway, ALICE, &format!("/payments/{payment_id}/retry")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "conflict");
    assert_eq!(gateway.init_requests().len(), 4);
}
