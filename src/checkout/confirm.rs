use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::errors::{CheckoutError, ServiceError};
use crate::events::{Event, EventSender};
use crate::models::ProcessPaymentRequest;
use crate::providers::{CartValidator, CustomerRepository, OrderPlacementService};

use super::{
    steps, CheckoutContext, CheckoutHandler, CheckoutHandlerResult, CheckoutRedirect, StepRequest,
    StepRoute,
};

pub const ACTION: &str = "confirm";

const COMMENT_FIELD: &str = "customer_comment";
const NEWSLETTER_FIELD: &str = "subscribe_to_newsletter";
const THIRD_PARTY_CONSENT_FIELD: &str = "accept_third_party_data";

/// Terminal step: order confirmation and placement. Never skippable; the
/// confirmation page is always shown at least once per order.
pub struct ConfirmHandler {
    route: StepRoute,
    config: Arc<CheckoutConfig>,
    customers: Arc<dyn CustomerRepository>,
    validator: Arc<dyn CartValidator>,
    orders: Arc<dyn OrderPlacementService>,
    events: EventSender,
}

impl ConfirmHandler {
    pub fn new(
        config: Arc<CheckoutConfig>,
        customers: Arc<dyn CustomerRepository>,
        validator: Arc<dyn CartValidator>,
        orders: Arc<dyn OrderPlacementService>,
        events: EventSender,
    ) -> Self {
        Self {
            route: StepRoute::new(steps::CONFIRM, ACTION),
            config,
            customers,
            validator,
            orders,
            events,
        }
    }

    fn cap_errors(&self, messages: Vec<String>) -> Vec<CheckoutError> {
        messages
            .into_iter()
            .take(self.config.max_displayed_errors)
            .map(|m| CheckoutError::new(html_escape(&m)))
            .collect()
    }

    fn assemble_payment_request(
        &self,
        ctx: &CheckoutContext<'_>,
        request: &StepRequest,
    ) -> ProcessPaymentRequest {
        let mut payment_request = ctx
            .state
            .payment_request
            .clone()
            .unwrap_or_else(|| ProcessPaymentRequest::for_cart(ctx.cart));

        for field in [COMMENT_FIELD, NEWSLETTER_FIELD, THIRD_PARTY_CONSENT_FIELD] {
            if let Some(value) = request.form.first(field) {
                payment_request
                    .custom_values
                    .insert(field.to_string(), value.to_string());
            }
        }
        payment_request
    }

    async fn clear_checkout_selections(&self, ctx: &mut CheckoutContext<'_>) {
        let customer_id = ctx.cart.customer.id;
        let attributes = &mut ctx.cart.customer.attributes;
        attributes.selected_payment_method = None;
        attributes.selected_shipping_option = None;
        // The order exists already; a failed attribute write must not fail
        // the confirmation.
        if let Err(err) = self.customers.save_attributes(customer_id, attributes).await {
            warn!(%err, "failed to clear checkout selections after order placement");
        }
    }

    async fn place_and_post_process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        payment_request: ProcessPaymentRequest,
        extra: HashMap<String, String>,
    ) -> CheckoutHandlerResult {
        let customer_id = ctx.cart.customer.id;

        let placement = self.orders.place_order(&payment_request, &extra).await;
        match placement {
            Ok(result) if result.is_success() => {
                let Some(order_id) = result.order_id else {
                    error!("order placement reported success without an order id");
                    return CheckoutHandlerResult::failed_with(vec![CheckoutError::new(
                        "An error occurred while placing the order",
                    )]);
                };
                self.events
                    .send_or_log(Event::OrderPlaced {
                        order_id,
                        customer_id,
                    })
                    .await;
                self.clear_checkout_selections(ctx).await;
                self.post_process(order_id, &payment_request).await
            }
            Ok(result) => {
                CheckoutHandlerResult::failed_with(self.cap_errors(result.errors))
            }
            Err(ServiceError::Payment(payment_error)) => {
                error!(error = %payment_error, "payment failure during order placement");
                let redirect = payment_error
                    .redirect
                    .clone()
                    .unwrap_or(CheckoutRedirect::PaymentMethod);
                CheckoutHandlerResult::failed_with(vec![CheckoutError::new(
                    payment_error.message,
                )])
                .with_redirect(redirect)
            }
            Err(err) => {
                error!(%err, "unexpected error during order placement");
                CheckoutHandlerResult::failed_with(vec![CheckoutError::new(
                    "An error occurred while placing the order",
                )])
            }
        }
    }

    async fn post_process(
        &self,
        order_id: Uuid,
        payment_request: &ProcessPaymentRequest,
    ) -> CheckoutHandlerResult {
        match self.orders.post_process_payment(order_id, payment_request).await {
            Ok(outcome) => {
                let redirect = match outcome.redirect_url {
                    // Provider-hosted confirmation page wins over the
                    // order-complete navigation; the order is placed either
                    // way, so the redirect carries the order id.
                    Some(url) => CheckoutRedirect::External {
                        url,
                        order_id: Some(order_id),
                    },
                    None => CheckoutRedirect::OrderComplete { order_id },
                };
                let mut result = CheckoutHandlerResult::succeeded();
                result.redirect = Some(redirect);
                result
            }
            Err(ServiceError::Payment(payment_error)) => {
                error!(error = %payment_error, "payment failure during post-processing");
                let redirect = payment_error
                    .redirect
                    .clone()
                    .unwrap_or(CheckoutRedirect::PaymentMethod);
                CheckoutHandlerResult::failed_with(vec![CheckoutError::new(
                    payment_error.message,
                )])
                .with_redirect(redirect)
            }
            Err(err) => {
                // The order exists; surface nothing fatal.
                warn!(%err, %order_id, "payment post-processing failed");
                let mut result = CheckoutHandlerResult::succeeded();
                result.redirect = Some(CheckoutRedirect::OrderComplete { order_id });
                result
            }
        }
    }
}

#[async_trait]
impl CheckoutHandler for ConfirmHandler {
    fn route(&self) -> &StepRoute {
        &self.route
    }

    #[instrument(skip(self, ctx, request), fields(customer_id = %ctx.cart.customer.id))]
    async fn process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        request: Option<&StepRequest>,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        // Never skip the confirm page: a GET is a pass-through that keeps
        // the customer here until an explicit submit.
        let Some(request) = request else {
            return Ok(CheckoutHandlerResult::failed());
        };

        let outcome = self.validator.validate(ctx.cart).await?;
        if let Some(redirect) = outcome.override_redirect {
            return Ok(CheckoutHandlerResult::redirect(redirect));
        }
        if !outcome.warnings.is_empty() {
            return Ok(
                CheckoutHandlerResult::failed_with(self.cap_errors(outcome.warnings))
                    .with_redirect(CheckoutRedirect::Cart),
            );
        }

        let interval_ok = self
            .orders
            .is_minimum_order_placement_interval_valid(ctx.cart.customer.id, ctx.cart.store_id)
            .await?;
        if !interval_ok {
            warn!(customer_id = %ctx.cart.customer.id, "order placement interval violated");
            return Ok(CheckoutHandlerResult::failed_with(vec![CheckoutError::new(
                "Orders cannot be placed this quickly one after another. Please wait a moment and try again.",
            )])
            .with_redirect(CheckoutRedirect::PaymentMethod));
        }

        let payment_request = self.assemble_payment_request(ctx, request);
        let extra = ctx.state.payment_data.clone();

        let result = self
            .place_and_post_process(ctx, payment_request, extra)
            .await;

        // Cleanup runs regardless of outcome: the cached payment request and
        // the rest of the session checkout state are gone after an attempt.
        ctx.state.reset();

        Ok(result)
    }
}

/// Minimal HTML escaping for provider-supplied plain-text error messages.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
