//! Checkout orchestration engine.
//!
//! The core is an ordered pipeline of step handlers (billing address,
//! shipping address, shipping method, payment method, confirm) driven by
//! [`checkout::CheckoutWorkflow`]. Carts, payment providers, shipping
//! rates, order placement and persistence are external collaborators
//! behind the traits in [`providers`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod checkout;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod sessions;

use axum::{response::Json, routing::get, Router};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use checkout::{
    BillingAddressHandler, CheckoutHandler, CheckoutWorkflow, ConfirmHandler,
    PaymentMethodHandler, ShippingAddressHandler, ShippingMethodHandler,
};
use config::{AppConfig, CheckoutConfig};
use events::EventSender;
use providers::{
    CartValidator, CustomerRepository, OrderPlacementService, PaymentProviderRegistry,
    ShippingOptionResolver,
};
use sessions::CheckoutSessionStore;

/// Everything the checkout pipeline consumes from the outside.
#[derive(Clone)]
pub struct CheckoutCollaborators {
    pub customers: Arc<dyn CustomerRepository>,
    pub payment_registry: Arc<dyn PaymentProviderRegistry>,
    pub shipping: Arc<dyn ShippingOptionResolver>,
    pub orders: Arc<dyn OrderPlacementService>,
    pub cart_validator: Arc<dyn CartValidator>,
}

/// Assembles the full step pipeline in its canonical order.
pub fn build_workflow(
    config: Arc<CheckoutConfig>,
    collaborators: &CheckoutCollaborators,
    events: EventSender,
) -> CheckoutWorkflow {
    let handlers: Vec<Arc<dyn CheckoutHandler>> = vec![
        Arc::new(BillingAddressHandler::new(
            config.clone(),
            collaborators.customers.clone(),
            events.clone(),
        )),
        Arc::new(ShippingAddressHandler::new(
            config.clone(),
            collaborators.customers.clone(),
            events.clone(),
        )),
        Arc::new(ShippingMethodHandler::new(
            config.clone(),
            collaborators.customers.clone(),
            collaborators.shipping.clone(),
            events.clone(),
        )),
        Arc::new(PaymentMethodHandler::new(
            config.clone(),
            collaborators.customers.clone(),
            collaborators.payment_registry.clone(),
            events.clone(),
        )),
        Arc::new(ConfirmHandler::new(
            config,
            collaborators.customers.clone(),
            collaborators.cart_validator.clone(),
            collaborators.orders.clone(),
            events,
        )),
    ];
    CheckoutWorkflow::new(handlers)
}

/// Shared application state for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub workflow: Arc<CheckoutWorkflow>,
    pub sessions: Arc<CheckoutSessionStore>,
    pub event_sender: EventSender,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        collaborators: &CheckoutCollaborators,
        event_sender: EventSender,
    ) -> Self {
        let checkout_config = Arc::new(config.checkout.clone());
        let workflow = Arc::new(build_workflow(
            checkout_config,
            collaborators,
            event_sender.clone(),
        ));
        Self {
            config,
            workflow,
            sessions: Arc::new(CheckoutSessionStore::new()),
            event_sender,
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Builds the application router with the ambient middleware stack.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1/checkout", handlers::checkout_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
