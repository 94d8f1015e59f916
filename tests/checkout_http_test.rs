//! End-to-end tests of the JSON surface: session lifecycle, step
//! submissions and error statuses.

mod common;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use checkout_api::config::AppConfig;
use checkout_api::events::event_channel;
use checkout_api::handlers::SESSION_HEADER;
use checkout_api::models::ShippingOption;
use checkout_api::providers::{
    BasicCartValidator, FixedRateShippingResolver, InMemoryCustomerRepository,
    InMemoryOrderPlacementService, OfflinePaymentProvider, OrderPlacementService,
    PostProcessOutcome, StaticPaymentProviderRegistry,
};
use checkout_api::{app_router, AppState, CheckoutCollaborators};

fn test_app() -> Router {
    test_app_with_orders(Arc::new(InMemoryOrderPlacementService::new(0)))
}

fn test_app_with_orders(orders: Arc<dyn OrderPlacementService>) -> Router {
    let collaborators = CheckoutCollaborators {
        customers: Arc::new(InMemoryCustomerRepository::new()),
        payment_registry: Arc::new(StaticPaymentProviderRegistry::new(vec![Arc::new(
            OfflinePaymentProvider::new("Payments.Invoice", "Pay by invoice"),
        )])),
        shipping: Arc::new(FixedRateShippingResolver::new(vec![
            ShippingOption::new(1, "Shipping.FixedRate", "Standard", dec!(4.90)),
            ShippingOption::new(2, "Shipping.FixedRate", "Express", dec!(12.90)),
        ])),
        orders,
        cart_validator: Arc::new(BasicCartValidator),
    };
    let (event_sender, _task) = event_channel(64);
    let state = Arc::new(AppState::new(AppConfig::default(), &collaborators, event_sender));
    app_router(state)
}

fn json_request(method: &str, uri: &str, session: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn start_session(app: &Router) -> (String, Value) {
    let cart = common::shippable_cart();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout",
            None,
            json!({ "cart": cart }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();
    (session_id, body)
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn starting_a_checkout_lands_on_billing_address() {
    let app = test_app();
    let (_session_id, body) = start_session(&app).await;
    assert_eq!(body["status"], "step");
    assert_eq!(body["action"], "billing-address");
}

#[tokio::test]
async fn missing_session_header_is_rejected() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/checkout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/checkout")
                .header(SESSION_HEADER, uuid::Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_step_action_is_not_found() {
    let app = test_app();
    let (session_id, _) = start_session(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/teleport",
            Some(&session_id),
            json!({ "form": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_checkout_over_http_completes_the_order() {
    let app = test_app();
    let cart = common::shippable_cart();
    let address_id = cart.customer.addresses[0].id.to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout",
            None,
            json!({ "cart": cart }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // Billing address; mirroring satisfies the shipping address too.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/billing-address",
            Some(&session_id),
            json!({ "form": { "address_id": [address_id] } }),
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["status"], "step");
    assert_eq!(body["action"], "shipping-method");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/shipping-method",
            Some(&session_id),
            json!({ "form": { "shippingoption": ["1___Shipping.FixedRate"] } }),
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["status"], "step");
    assert_eq!(body["action"], "payment-method");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/payment-method",
            Some(&session_id),
            json!({ "form": { "paymentmethod": ["Payments.Invoice"] } }),
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["status"], "step");
    assert_eq!(body["action"], "confirm");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/confirm",
            Some(&session_id),
            json!({ "form": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "completed");
    assert_matches!(body["order_id"].as_str(), Some(id) if id.parse::<uuid::Uuid>().is_ok());

    // The session is gone once the order is placed.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/checkout")
                .header(SESSION_HEADER, &session_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hosted_payment_redirect_after_placement_ends_the_session() {
    let orders = Arc::new(common::ScriptedOrderService::succeeding());
    orders.push_post_process(Ok(PostProcessOutcome {
        redirect_url: Some("https://pay.example.com/hosted/42".into()),
    }));
    let app = test_app_with_orders(orders);

    let cart = common::shippable_cart();
    let address_id = cart.customer.addresses[0].id.to_string();
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout",
            None,
            json!({ "cart": cart }),
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    for (action, form) in [
        ("billing-address", json!({ "address_id": [address_id] })),
        ("shipping-method", json!({ "shippingoption": ["1___Shipping.FixedRate"] })),
        ("payment-method", json!({ "paymentmethod": ["Payments.Invoice"] })),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/checkout/{}", action),
                Some(&session_id),
                json!({ "form": form }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/confirm",
            Some(&session_id),
            json!({ "form": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "redirect");
    assert_eq!(body["redirect"]["target"], "external");
    assert_eq!(body["redirect"]["url"], "https://pay.example.com/hosted/42");
    assert_matches!(
        body["redirect"]["order_id"].as_str(),
        Some(id) if id.parse::<uuid::Uuid>().is_ok()
    );

    // The order was placed before the hosted page, so the session is gone.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/checkout")
                .header(SESSION_HEADER, &session_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn abandoning_a_checkout_removes_the_session() {
    let app = test_app();
    let (session_id, _) = start_session(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/checkout")
                .header(SESSION_HEADER, &session_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/checkout")
                .header(SESSION_HEADER, &session_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_submission_reports_field_errors() {
    let app = test_app();
    let (session_id, _) = start_session(&app).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/checkout/shipping-method",
            Some(&session_id),
            json!({ "form": { "shippingoption": ["garbage"] } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["action"], "shipping-method");
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}
