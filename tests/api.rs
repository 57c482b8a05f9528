//! End-to-end tests over the full router backed by the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use furniture_shop::api::{router, AppState};
use furniture_shop::config::Config;
use furniture_shop::store::MemoryStore;

struct TestApp {
    router: Router,
    uploads: TempDir,
}

fn app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let vars: HashMap<&str, String> = HashMap::from([
        ("UPLOAD_DIR", uploads.path().display().to_string()),
        ("INITIAL_BALANCE", "100".to_owned()),
        ("TOKEN_SECRET", "integration-test-secret".to_owned()),
    ]);
    let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    let state = AppState::new(config, Arc::new(MemoryStore::new())).unwrap();
    TestApp { router: router(state), uploads }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    /// Registers and logs in; returns the bearer token.
    async fn account(&self, username: &str, role: &str) -> String {
        let (status, _) = self
            .post(
                "/api/auth/register",
                None,
                json!({"username": username, "email": format!("{username}@example.com"), "password": "pw-123", "role": role}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.post("/api/auth/login", None, json!({"username": username, "password": "pw-123"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        body["access_token"].as_str().unwrap().to_owned()
    }

    /// Creates a product and, when `online`, publishes it. Returns its id.
    async fn product(&self, token: &str, name: &str, price: &str, online: bool) -> String {
        let (status, body) = self.post("/api/products", Some(token), json!({"name": name, "price": price})).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "offline");
        let id = body["id"].as_str().unwrap().to_owned();
        if online {
            let (status, body) = self.put(&format!("/api/products/{id}"), Some(token), json!({"status": "online"})).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "online");
        }
        id
    }
}

#[tokio::test]
async fn test_order_debits_balance_and_empties_cart() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let chair = app.product(&seller, "Chair", "40", true).await;
    let buyer = app.account("buyer", "user").await;

    let (status, line) = app.post("/api/cart/items", Some(&buyer), json!({"product_id": chair, "quantity": 2})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(line["quantity"], 2);

    let (status, order) = app
        .post(
            "/api/orders",
            Some(&buyer),
            json!({
                "items": [{"product_id": chair, "quantity": 2, "price_at_purchase": "40"}],
                "shipping_address": "1 Elm Street",
                "contact_name": "Buyer",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total_price"], "80");
    assert_eq!(order["status"], "pending_payment");
    assert_eq!(order["shipping_address"], "1 Elm Street");
    assert_eq!(order["items"][0]["product_name"], "Chair");
    assert_eq!(order["items"][0]["product_image"], Value::Null);

    let (_, me) = app.get("/api/auth/me", Some(&buyer)).await;
    assert_eq!(me["balance"], "20");
    assert!(me.get("password_hash").is_none());

    let (_, cart) = app.get("/api/cart", Some(&buyer)).await;
    assert_eq!(cart["items"], json!([]));

    let (_, first) = app.get("/api/orders/my-orders", Some(&buyer)).await;
    let (_, second) = app.get("/api/orders/my-orders", Some(&buyer)).await;
    assert_eq!(first.as_array().unwrap().len(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_insufficient_funds_changes_nothing() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let chair = app.product(&seller, "Chair", "40", true).await;
    let buyer = app.account("buyer", "user").await;

    let (status, body) = app
        .post("/api/orders", Some(&buyer), json!({"items": [{"product_id": chair, "quantity": 3, "price_at_purchase": "40"}]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Insufficient balance. Required: 120, Available: 100");

    let (_, me) = app.get("/api/auth/me", Some(&buyer)).await;
    assert_eq!(me["balance"], "100");
    let (_, orders) = app.get("/api/orders/my-orders", Some(&buyer)).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn test_order_validation() {
    let app = app();
    let buyer = app.account("buyer", "user").await;
    let (status, body) = app.post("/api/orders", Some(&buyer), json!({"items": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Order must contain at least one item");

    let item = json!({"product_id": uuid::Uuid::now_v7(), "quantity": 0, "price_at_purchase": "1"});
    let (status, _) = app.post("/api/orders", Some(&buyer), json!({"items": [item]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_update_requires_product_ownership() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let rival = app.account("rival", "merchant").await;
    let chair = app.product(&seller, "Chair", "10", true).await;
    let buyer = app.account("buyer", "user").await;

    let (_, order) = app
        .post("/api/orders", Some(&buyer), json!({"items": [{"product_id": chair, "quantity": 1, "price_at_purchase": "10"}]}))
        .await;
    let uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());

    let (status, _) = app.put(&uri, Some(&rival), json!({"status": "shipped"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.put(&uri, Some(&buyer), json!({"status": "shipped"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.put(&uri, Some(&seller), json!({"status": "lost"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.put(&uri, Some(&seller), json!({"status": "shipped"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");

    let (_, seen) = app.get("/api/orders/merchant/orders", Some(&seller)).await;
    assert_eq!(seen.as_array().unwrap().len(), 1);
    let (_, seen) = app.get("/api/orders/merchant/orders", Some(&rival)).await;
    assert_eq!(seen, json!([]));
}

#[tokio::test]
async fn test_search_only_returns_online_products() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    app.product(&seller, "Walnut Table", "300", false).await;
    let lamp = app.product(&seller, "Walnut Lamp", "45", true).await;

    let (status, hits) = app.get("/api/search?q=walnut", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["id"], lamp.as_str());

    let (_, hits) = app.get("/api/search?min_price=50", None).await;
    assert_eq!(hits, json!([]));
    let (_, hits) = app.get("/api/search?q=table", None).await;
    assert_eq!(hits, json!([]));

    let (_, all) = app.get("/api/products", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (_, online) = app.get("/api/products?status_filter=online", None).await;
    assert_eq!(online.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_authentication_failures() {
    let app = app();
    let token = app.account("alice", "user").await;

    let req = Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let mut tampered = token.clone();
    tampered.push('x');
    let (status, _) = app.get("/api/auth/me", Some(&tampered)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.post("/api/auth/login", None, json!({"username": "alice", "password": "nope"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Incorrect username or password");

    let (status, _) = app
        .post("/api/auth/register", None, json!({"username": "alice", "email": "other@example.com", "password": "x"}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .post("/api/auth/register", None, json!({"username": "zed", "email": "zed@example.com", "password": "x", "role": "admin"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Shoppers cannot reach merchant routes.
    let (status, _) = app.get("/api/merchants/me", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_merchant_profile() {
    let app = app();
    let seller = app.account("oakhouse", "merchant").await;
    let (_, profile) = app.get("/api/merchants/me", Some(&seller)).await;
    assert_eq!(profile["shop_name"], "oakhouse's Shop");

    let (status, profile) = app.put("/api/merchants/me", Some(&seller), json!({"description": "Handmade oak"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["description"], "Handmade oak");
    assert_eq!(profile["shop_name"], "oakhouse's Shop");
}

#[tokio::test]
async fn test_chat_without_api_key() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let buyer = app.account("buyer", "user").await;
    let (_, profile) = app.get("/api/merchants/me", Some(&seller)).await;

    let (status, body) = app
        .post("/api/chat", Some(&buyer), json!({"merchant_id": profile["id"], "message": "Any sofas?"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], furniture_shop::services::chat::NOT_CONFIGURED_REPLY);
}

fn multipart(boundary: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

async fn upload(app: &TestApp, token: &str, product: &str, files: &[(&str, &[u8])]) -> (StatusCode, Value) {
    let boundary = "furniture-test-boundary";
    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/upload/product/{product}/images"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(multipart(boundary, files)))
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_image_upload_serve_and_delete() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let rival = app.account("rival", "merchant").await;
    let desk = app.product(&seller, "Desk", "150", true).await;

    let (status, body) = upload(&app, &seller, &desk, &[("top.png", b"png-bytes"), ("shell.sh", b"#!/bin/sh")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("shell.sh"));
    assert!(!app.uploads.path().join("products").exists());

    let (status, _) = upload(&app, &rival, &desk, &[("top.png", b"png-bytes")]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = upload(&app, &seller, &desk, &[("top.png", b"png-bytes")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_images"], 1);
    let path = body["image_paths"][0].as_str().unwrap().to_owned();

    let req = Request::builder().uri(format!("/uploads/{path}")).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&to_bytes(response.into_body(), usize::MAX).await.unwrap()[..], b"png-bytes");

    let (_, product) = app.get(&format!("/api/products/{desk}"), None).await;
    assert_eq!(product["image_paths"], json!([path]));

    let uri = format!("/api/upload/product/{desk}/images?image_path={path}");
    let (status, _) = app.call(Method::DELETE, &uri, Some(&seller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.uploads.path().join(&path).exists());
    let (status, _) = app.call(Method::DELETE, &uri, Some(&seller), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_amounts_beyond_cents_are_rejected() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let (status, body) = app.post("/api/products", Some(&seller), json!({"name": "Stool", "price": "0.001"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Amount must have at most 2 decimal places");

    let stool = app.product(&seller, "Stool", "0.33", true).await;
    let buyer = app.account("buyer", "user").await;
    let (status, _) = app
        .post("/api/orders", Some(&buyer), json!({"items": [{"product_id": stool, "quantity": 3, "price_at_purchase": "0.333"}]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = app
        .post("/api/orders", Some(&buyer), json!({"items": [{"product_id": stool, "quantity": 3, "price_at_purchase": "0.33"}]}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total_price"], "0.99");
    let (_, me) = app.get("/api/auth/me", Some(&buyer)).await;
    assert_eq!(me["balance"], "99.01");
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = app();
    let seller = app.account("seller", "merchant").await;
    let chair = app.product(&seller, "Chair", "10", true).await;
    let buyer = app.account("buyer", "user").await;
    let (_, order) = app
        .post("/api/orders", Some(&buyer), json!({"items": [{"product_id": chair, "quantity": 1, "price_at_purchase": "10"}]}))
        .await;

    let uri = format!("/api/orders/{}/status", order["id"].as_str().unwrap());
    let (status, body) = app.put(&uri, Some(&seller), json!({"status": 3})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = app.post("/api/cart/items", Some(&buyer), json!({"quantity": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}
