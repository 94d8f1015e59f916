use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkout_api::{
    app_router,
    config::load_config,
    events::event_channel,
    models::ShippingOption,
    providers::{
        BasicCartValidator, FixedRateShippingResolver, InMemoryCustomerRepository,
        InMemoryOrderPlacementService, OfflinePaymentProvider, StaticPaymentProviderRegistry,
    },
    AppState, CheckoutCollaborators,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("checkout_api={}", config.log_level))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (event_sender, _event_task) = event_channel(256);

    // In-memory collaborators; real deployments wire gateway- and
    // carrier-backed implementations of the provider traits instead.
    let collaborators = CheckoutCollaborators {
        customers: Arc::new(InMemoryCustomerRepository::new()),
        payment_registry: Arc::new(StaticPaymentProviderRegistry::new(vec![Arc::new(
            OfflinePaymentProvider::new("Payments.Invoice", "Pay by invoice"),
        )])),
        shipping: Arc::new(FixedRateShippingResolver::new(vec![
            ShippingOption::new(1, "Shipping.FixedRate", "Standard", dec!(4.90)),
            ShippingOption::new(2, "Shipping.FixedRate", "Express", dec!(12.90)),
        ])),
        orders: Arc::new(InMemoryOrderPlacementService::new(
            config.checkout.min_order_placement_interval_secs,
        )),
        cart_validator: Arc::new(BasicCartValidator),
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, &collaborators, event_sender));
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("checkout-api listening on {}", addr);
    axum::serve(listener, router).await?;

    Ok(())
}
