use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use checkout_engine::SqliteDatabase;
use serde_json::json;

use super::helpers::{json_body, send_request, setup, user_token, TestEnv, ALICE, BOB};
use crate::routes::{
    AddToCartRoute,
    BulkUpdateCartRoute,
    ClearCartRoute,
    MyCartRoute,
    RemoveCartItemRoute,
    UpdateCartItemRoute,
};

fn configure(env: &TestEnv) -> impl FnOnce(&mut ServiceConfig) {
    let api = web::Data::new(env.cart_api());
    move |cfg| {
        cfg.app_data(api)
            .service(MyCartRoute::<SqliteDatabase>::new())
            .service(AddToCartRoute::<SqliteDatabase>::new())
            .service(BulkUpdateCartRoute::<SqliteDatabase>::new())
            .service(UpdateCartItemRoute::<SqliteDatabase>::new())
            .service(RemoveCartItemRoute::<SqliteDatabase>::new())
            .service(ClearCartRoute::<SqliteDatabase>::new());
    }
}

async fn add(env: &TestEnv, token: &str, product_id: i64, quantity: i64) -> (StatusCode, String) {
    let req = TestRequest::post().uri("/cart").set_json(json!({ "product_id": product_id, "quantity": quantity }));
    send_request(req, Some(token), configure(env)).await
}

#[actix_web::test]
async fn add_items_to_cart() {
    let env = setup().await;
    let token = user_token(ALICE);
    let (status, _) = add(&env, &token, env.product_a.id, 2).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = add(&env, &token, env.product_b.id, 1).await;
    assert_eq!(status, StatusCode::OK);
    let cart = json_body(&body);
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total_item_count"], 3);
    assert_eq!(cart["subtotal"], "4500.00");
    assert_eq!(cart["items"][0]["product_name"], "Product A");
    assert_eq!(cart["items"][0]["unit_price"], "1000.00");
}

#[actix_web::test]
async fn adding_the_same_product_merges_lines() {
    let env = setup().await;
    let token = user_token(ALICE);
    add(&env, &token, env.product_a.id, 1).await;
    let (status, body) = add(&env, &token, env.product_a.id, 2).await;
    assert_eq!(status, StatusCode::OK);
    let cart = json_body(&body);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 3);
}

#[actix_web::test]
async fn add_unknown_product() {
    let env = setup().await;
    let token = user_token(ALICE);
    let (status, body) = add(&env, &token, 4040, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["code"], "not_found");
}

#[actix_web::test]
async fn add_with_bad_quantity() {
    let env = setup().await;
    let token = user_token(ALICE);
    let (status, body) = add(&env, &token, env.product_a.id, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["code"], "validation_error");
}

#[actix_web::test]
async fn add_an_absurd_quantity() {
    let env = setup().await;
    let token = user_token(ALICE);
    let (status, body) = add(&env, &token, env.product_a.id, i64::MAX / 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_body(&body);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["error"], "No more than 1000 of a product can be in a cart");

    let req = TestRequest::get().uri("/cart");
    let (status, body) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["subtotal"], "0.00");
}

#[actix_web::test]
async fn malformed_body() {
    let env = setup().await;
    let token = user_token(ALICE);
    let req = TestRequest::post().uri("/cart").set_json(json!({ "product": "A" }));
    let (status, body) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_body(&body);
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn update_and_remove_items() {
    let env = setup().await;
    let token = user_token(ALICE);
    let (_, body) = add(&env, &token, env.product_a.id, 1).await;
    let item_id = json_body(&body)["items"][0]["item_id"].as_i64().unwrap();

    let req = TestRequest::patch().uri(&format!("/cart/items/{item_id}")).set_json(json!({ "quantity": 5 }));
    let (status, body) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["subtotal"], "5000.00");

    let req = TestRequest::delete().uri(&format!("/cart/items/{item_id}"));
    let (status, body) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::OK);
    let cart = json_body(&body);
    assert_eq!(cart["total_item_count"], 0);
    assert_eq!(cart["subtotal"], "0.00");
}

#[actix_web::test]
async fn users_cannot_touch_each_others_carts() {
    let env = setup().await;
    let alice = user_token(ALICE);
    let bob = user_token(BOB);
    let (_, body) = add(&env, &alice, env.product_a.id, 1).await;
    let item_id = json_body(&body)["items"][0]["item_id"].as_i64().unwrap();

    let req = TestRequest::patch().uri(&format!("/cart/items/{item_id}")).set_json(json!({ "quantity": 9 }));
    let (status, _) = send_request(req, Some(&bob), configure(&env)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let req = TestRequest::delete().uri(&format!("/cart/items/{item_id}"));
    let (status, _) = send_request(req, Some(&bob), configure(&env)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send_request(TestRequest::get().uri("/cart"), Some(&alice), configure(&env)).await;
    assert_eq!(json_body(&body)["items"][0]["quantity"], 1);
    let (_, body) = send_request(TestRequest::get().uri("/cart"), Some(&bob), configure(&env)).await;
    assert_eq!(json_body(&body)["total_item_count"], 0);
}

#[actix_web::test]
async fn bulk_update_is_all_or_nothing() {
    let env = setup().await;
    let token = user_token(ALICE);
    add(&env, &token, env.product_a.id, 1).await;
    let (_, body) = add(&env, &token, env.product_b.id, 1).await;
    let cart = json_body(&body);
    let a = cart["items"][0]["item_id"].as_i64().unwrap();
    let b = cart["items"][1]["item_id"].as_i64().unwrap();

    let bad = json!({ "items": [{ "item_id": a, "quantity": 4 }, { "item_id": b, "quantity": -1 }] });
    let req = TestRequest::put().uri("/cart/items/bulk").set_json(bad);
    let (status, _) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = send_request(TestRequest::get().uri("/cart"), Some(&token), configure(&env)).await;
    assert_eq!(json_body(&body)["total_item_count"], 2);

    let unknown = json!({ "items": [{ "item_id": a, "quantity": 4 }, { "item_id": 9999, "quantity": 1 }] });
    let req = TestRequest::put().uri("/cart/items/bulk").set_json(unknown);
    let (status, _) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let good = json!({ "items": [{ "item_id": a, "quantity": 4 }, { "id": b, "quantity": 2 }] });
    let req = TestRequest::put().uri("/cart/items/bulk").set_json(good);
    let (status, body) = send_request(req, Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::OK);
    let cart = json_body(&body);
    assert_eq!(cart["total_item_count"], 6);
    assert_eq!(cart["subtotal"], "9000.00");
}

#[actix_web::test]
async fn clear_cart() {
    let env = setup().await;
    let token = user_token(ALICE);
    env.fill_cart(ALICE).await;
    let (status, body) = send_request(TestRequest::post().uri("/cart/clear"), Some(&token), configure(&env)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Removed 2 items from your cart");
    let (_, body) = send_request(TestRequest::get().uri("/cart"), Some(&token), configure(&env)).await;
    assert_eq!(json_body(&body)["total_item_count"], 0);
}
