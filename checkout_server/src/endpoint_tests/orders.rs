use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::{
    db_types::{OrderStatusType, PaymentMethod, ShippingInfo},
    gateway::{CustomerInfo, GatewayError},
    objects::CheckoutReceipt,
    test_utils::scripted_gateway::ScriptedGateway,
    traits::CheckoutRequest,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{admin_token, json_body, send_request, setup, user_token, TestEnv, ALICE, BOB};
use crate::routes::{MyOrdersRoute, OrderByNumberRoute, PayForOrderRoute, UpdateOrderStatusRoute};

fn configure(env: &TestEnv, gateway: ScriptedGateway) -> impl FnOnce(&mut ServiceConfig) {
    let orders_api = web::Data::new(env.orders_api());
    let flow_api = web::Data::new(env.flow_api(gateway));
    move |cfg| {
        cfg.app_data(orders_api)
            .app_data(flow_api)
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByNumberRoute::<SqliteDatabase>::new())
            .service(PayForOrderRoute::<SqliteDatabase, ScriptedGateway>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new());
    }
}

async fn place_order(env: &TestEnv, gateway: &ScriptedGateway, payment_method: PaymentMethod) -> CheckoutReceipt {
    env.fill_cart(ALICE).await;
    let request = CheckoutRequest {
        shipping: ShippingInfo {
            address: "3 Allen Avenue".into(),
            city: "Ikeja".into(),
            state: "Lagos".into(),
            country: "Nigeria".into(),
            zip_code: String::new(),
        },
        payment_method,
        customer_phone: None,
        notes: Some("Leave with the gateman".into()),
    };
    let customer = CustomerInfo { email: "user1@example.com".into(), name: "Alice".into(), phone: None };
    env.flow_api(gateway.clone()).checkout(ALICE, customer, request).await.expect("Checkout failed")
}

fn status_update(order_number: &str, status: &str) -> TestRequest {
    TestRequest::patch().uri(&format!("/admin/orders/{order_number}/status")).set_json(json!({ "status": status }))
}

#[actix_web::test]
async fn my_orders() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::Flutterwave).await;

    let token = user_token(ALICE);
    let req = TestRequest::get().uri("/orders");
    let (status, body) = send_request(req, Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json_body(&body);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["order_number"], receipt.order.order_number);
    assert_eq!(orders[0]["shipping_fee"], "2500.00");
    assert_eq!(orders[0]["total"], "7000.00");
    assert_eq!(orders[0]["notes"], "Leave with the gateman");

    let token = user_token(BOB);
    let req = TestRequest::get().uri("/orders");
    let (status, body) = send_request(req, Some(&token), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn order_detail() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::Flutterwave).await;
    let path = format!("/orders/{}", receipt.order.order_number);

    let token = user_token(ALICE);
    let req = TestRequest::get().uri(&path);
    let (status, body) = send_request(req, Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let detail = json_body(&body);
    assert_eq!(detail["order"]["order_number"], receipt.order.order_number);
    assert_eq!(detail["items"].as_array().unwrap().len(), 2);
    assert_eq!(detail["items"][0]["product_name"], "Product A");
    assert_eq!(detail["items"][0]["product_price"], "1000.00");
    assert_eq!(detail["payments"].as_array().unwrap().len(), 1);
    assert_eq!(detail["payments"][0]["payment_id"], receipt.payment.payment_id);
}

#[actix_web::test]
async fn other_users_orders_are_hidden() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::Flutterwave).await;
    let path = format!("/orders/{}", receipt.order.order_number);

    let token = user_token(BOB);
    let req = TestRequest::get().uri(&path);
    let (status, body) = send_request(req, Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "not_found");

    let req = TestRequest::get().uri(&path);
    let (status, _) = send_request(req, Some(&admin_token()), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn unknown_order() {
    let env = setup().await;
    let token = user_token(ALICE);
    let req = TestRequest::get().uri("/orders/ORD-DEADBEEF");
    let (status, _) = send_request(req, Some(&token), configure(&env, ScriptedGateway::default())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn pay_for_an_order_later() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    gateway.fail_next_init(GatewayError::MissingLink);
    let receipt = place_order(&env, &gateway, PaymentMethod::Flutterwave).await;
    assert!(receipt.payment_error.is_some());

    let token = user_token(ALICE);
    let req = TestRequest::post().uri(&format!("/orders/{}/pay", receipt.order.order_number));
    let (status, body) = send_request(req, Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let payment = json_body(&body);
    let payment_id = payment["payment_id"].as_str().unwrap();
    assert_ne!(payment_id, receipt.payment.payment_id);
    assert_eq!(payment["payment_link"], format!("https://pay.test/{payment_id}"));
    assert_eq!(gateway.init_requests().len(), 2);

    // Someone else cannot pay for it
    let token = user_token(BOB);
    let req = TestRequest::post().uri(&format!("/orders/{}/pay", receipt.order.order_number));
    let (status, _) = send_request(req, Some(&token), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn paid_orders_cannot_be_paid_again() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::CashOnDelivery).await;
    let token = user_token(ALICE);
    let req = TestRequest::post().uri(&format!("/orders/{}/pay", receipt.order.order_number));
    let (status, body) = send_request(req, Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "conflict");
    assert!(gateway.init_requests().is_empty());
}

#[actix_web::test]
async fn admin_moves_an_order_along() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::CashOnDelivery).await;
    let order_number = receipt.order.order_number.as_str();
    let token = admin_token();

    let (status, body) =
        send_request(status_update(order_number, "shipped"), Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "shipped");

    let (status, body) =
        send_request(status_update(order_number, "delivered"), Some(&token), configure(&env, gateway.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order = json_body(&body);
    assert_eq!(order["status"], "delivered");
    assert!(!order["completed_at"].is_null());

    // Not a legal move
    let (status, body) =
        send_request(status_update(order_number, "pending"), Some(&token), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "validation_error");
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_processed() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::Flutterwave).await;
    let order_number = receipt.order.order_number.as_str();
    let req = status_update(order_number, "processing");
    let (status, body) = send_request(req, Some(&admin_token()), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "conflict");
}

#[actix_web::test]
async fn cancelling_an_order_cancels_its_open_payment() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::Flutterwave).await;
    let order_number = receipt.order.order_number.as_str();
    let (status, body) = send_request(
        status_update(order_number, "cancelled"),
        Some(&admin_token()),
        configure(&env, gateway.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "cancelled");

    let path = format!("/orders/{order_number}");
    let req = TestRequest::get().uri(&path);
    let (_, body) = send_request(req, Some(&user_token(ALICE)), configure(&env, gateway)).await;
    assert_eq!(json_body(&body)["payments"][0]["status"], "cancelled");
}

#[actix_web::test]
async fn users_cannot_change_order_status() {
    let env = setup().await;
    let gateway = ScriptedGateway::default();
    let receipt = place_order(&env, &gateway, PaymentMethod::CashOnDelivery).await;
    let order_number = receipt.order.order_number.as_str();
    let req = status_update(order_number, "shipped");
    let (status, _) = send_request(req, Some(&user_token(ALICE)), configure(&env, gateway)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let order = env.orders_api().order_detail(order_number).await.unwrap().unwrap().order;
    assert_eq!(order.status, OrderStatusType::Processing);
}

#[actix_web::test]
async fn unknown_status_value() {
    let env = setup().await;
    let (status, body) = send_request(
        status_update("ORD-DEADBEEF", "teleported"),
        Some(&admin_token()),
        configure(&env, ScriptedGateway::default()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "validation_error");
}
