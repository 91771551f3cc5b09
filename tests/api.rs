//! End-to-end tests of the REST surface over the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use shopfront::api::{self, SESSION_HEADER};
use shopfront::{MemoryStore, Order, Product};
use tower::ServiceExt;

fn app() -> Router {
    let products = vec![
        Product {
            id: "prod-a".into(),
            name: "Alpha".into(),
            price: dec!(10.00),
            description: "First test product".into(),
            image: "/images/prod-a.jpg".into(),
            category: "Test".into(),
            in_stock: true,
            rating: 4.0,
        },
        Product {
            id: "prod-b".into(),
            name: "Bravo".into(),
            price: dec!(5.00),
            description: "Second test product".into(),
            image: "/images/prod-b.jpg".into(),
            category: "Test".into(),
            in_stock: true,
            rating: 3.5,
        },
    ];
    api::router(Arc::new(MemoryStore::new(products)))
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn json_request(method: &str, path: &str, session: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .header(SESSION_HEADER, session)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn products_list_and_search() {
    let app = app();

    let response = app.clone().oneshot(get("/api/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["name"], "Alpha");

    let response = app.clone().oneshot(get("/api/products?q=bravo")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], "prod-b");

    let response = app.oneshot(get("/api/products/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_add_update_remove_roundtrip() {
    let app = app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/cart",
            "sess-1",
            serde_json::json!({"productId": "prod-a", "quantity": 2}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cart = body_json(response).await;
    assert_eq!(cart[0]["quantity"], 2);

    // merge-additive on repeat add
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/cart",
            "sess-1",
            serde_json::json!({"productId": "prod-a", "quantity": 3}),
        ))
        .await
        .unwrap();
    let cart = body_json(response).await;
    assert_eq!(cart[0]["quantity"], 5);

    // PUT with zero quantity drops the line
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/cart/prod-a",
            "sess-1",
            serde_json::json!({"quantity": 0}),
        ))
        .await
        .unwrap();
    let cart = body_json(response).await;
    assert!(cart.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cart_rejects_bad_input() {
    let app = app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/cart",
            "sess-1",
            serde_json::json!({"productId": "prod-a", "quantity": 0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await.get("error").is_some());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/cart",
            "sess-1",
            serde_json::json!({"productId": "missing-id", "quantity": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sessions_are_isolated_by_header() {
    let app = app();
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/cart",
            "sess-1",
            serde_json::json!({"productId": "prod-a", "quantity": 1}),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/cart")
                .header(SESSION_HEADER, "sess-2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let cart = body_json(response).await;
    assert!(cart.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn checkout_creates_order_and_empties_cart() {
    let app = app();
    for (product, quantity) in [("prod-a", 2), ("prod-b", 1)] {
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/cart",
                "sess-1",
                serde_json::json!({"productId": product, "quantity": quantity}),
            ))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/orders",
            "sess-1",
            serde_json::json!({
                "customerName": "Ada Lovelace",
                "customerEmail": "ada@example.com",
                "customerAddress": "12 Analytical Way",
                "customerPhone": "555-0100",
                // card fields are collected by the form but never charged
                "cardNumber": "4111111111111111"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order: Order = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(order.total_amount, dec!(25.00));
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.customer_name.as_deref(), Some("Ada Lovelace"));
    assert!(order.id.starts_with("ORD-"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/cart")
                .header(SESSION_HEADER, "sess-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(get(&format!("/api/orders/{}", order.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/orders")).await.unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed[0]["id"], order.id);
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let app = app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/orders",
            "sess-empty",
            serde_json::json!({"customerName": "Nobody"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "cart is empty");
}

#[tokio::test]
async fn unknown_order_returns_not_found() {
    let response = app().oneshot(get("/api/orders/ORD-999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
