use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::ProcessPaymentRequest;

/// Result of an order placement attempt. A failed result carries
/// user-facing error strings; infrastructure failures come back as
/// `ServiceError` instead.
#[derive(Debug, Clone, Default)]
pub struct OrderPlacementResult {
    pub order_id: Option<Uuid>,
    pub errors: Vec<String>,
}

impl OrderPlacementResult {
    pub fn placed(order_id: Uuid) -> Self {
        Self {
            order_id: Some(order_id),
            errors: vec![],
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            order_id: None,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.order_id.is_some() && self.errors.is_empty()
    }
}

/// Outcome of payment post-processing after the order exists. A redirect
/// URL points at a provider-hosted confirmation page and takes precedence
/// over the normal order-complete navigation.
#[derive(Debug, Clone, Default)]
pub struct PostProcessOutcome {
    pub redirect_url: Option<String>,
}

/// Places orders and runs payment capture/confirmation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderPlacementService: Send + Sync {
    /// Anti-double-submit throttle: compares against the customer's last
    /// placed order for the store.
    async fn is_minimum_order_placement_interval_valid(
        &self,
        customer_id: Uuid,
        store_id: Uuid,
    ) -> Result<bool, ServiceError>;

    async fn place_order(
        &self,
        request: &ProcessPaymentRequest,
        extra: &HashMap<String, String>,
    ) -> Result<OrderPlacementResult, ServiceError>;

    async fn post_process_payment(
        &self,
        order_id: Uuid,
        request: &ProcessPaymentRequest,
    ) -> Result<PostProcessOutcome, ServiceError>;
}

/// In-memory placement service: assigns order ids and keeps the last
/// placement timestamp per customer/store to enforce the interval guard.
pub struct InMemoryOrderPlacementService {
    min_interval: Duration,
    last_placed: DashMap<(Uuid, Uuid), DateTime<Utc>>,
}

impl InMemoryOrderPlacementService {
    pub fn new(min_interval_secs: u64) -> Self {
        Self {
            min_interval: Duration::seconds(min_interval_secs as i64),
            last_placed: DashMap::new(),
        }
    }
}

#[async_trait]
impl OrderPlacementService for InMemoryOrderPlacementService {
    async fn is_minimum_order_placement_interval_valid(
        &self,
        customer_id: Uuid,
        store_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let valid = match self.last_placed.get(&(customer_id, store_id)) {
            Some(entry) => Utc::now() - *entry.value() >= self.min_interval,
            None => true,
        };
        Ok(valid)
    }

    async fn place_order(
        &self,
        request: &ProcessPaymentRequest,
        _extra: &HashMap<String, String>,
    ) -> Result<OrderPlacementResult, ServiceError> {
        if request.payment_method_system_name.is_empty() && request.order_total > rust_decimal::Decimal::ZERO {
            return Ok(OrderPlacementResult::failed(vec![
                "No payment method selected".to_string(),
            ]));
        }
        let order_id = Uuid::new_v4();
        self.last_placed
            .insert((request.customer_id, request.store_id), Utc::now());
        tracing::info!(%order_id, customer_id = %request.customer_id, "order placed");
        Ok(OrderPlacementResult::placed(order_id))
    }

    async fn post_process_payment(
        &self,
        _order_id: Uuid,
        _request: &ProcessPaymentRequest,
    ) -> Result<PostProcessOutcome, ServiceError> {
        Ok(PostProcessOutcome::default())
    }
}
