use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::CheckoutConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::FormData;
use crate::providers::{CustomerRepository, PaymentProvider, PaymentProviderRegistry};

use super::{
    steps, CheckoutContext, CheckoutHandler, CheckoutHandlerResult, StepRequest, StepRoute,
};

pub const ACTION: &str = "payment-method";

const PAYMENT_METHOD_FIELD: &str = "paymentmethod";

/// Selects the payment method. Skipped entirely for zero-total carts;
/// otherwise runs the provider's payment-data validation with rollback of
/// the durable preferred method on failure.
pub struct PaymentMethodHandler {
    route: StepRoute,
    config: Arc<CheckoutConfig>,
    customers: Arc<dyn CustomerRepository>,
    registry: Arc<dyn PaymentProviderRegistry>,
    events: EventSender,
}

impl PaymentMethodHandler {
    pub fn new(
        config: Arc<CheckoutConfig>,
        customers: Arc<dyn CustomerRepository>,
        registry: Arc<dyn PaymentProviderRegistry>,
        events: EventSender,
    ) -> Self {
        Self {
            route: StepRoute::new(steps::PAYMENT_METHOD, ACTION),
            config,
            customers,
            registry,
            events,
        }
    }

    /// Collapses the raw form into single-valued payment data. A field
    /// posting exactly two boolean-looking values is a hidden-checkbox
    /// pair and normalizes to its effective boolean.
    fn normalize_payment_form(form: &FormData) -> HashMap<String, String> {
        let mut data = HashMap::new();
        for (key, values) in form.iter() {
            let value = match values.as_slice() {
                [] => continue,
                [single] => single.clone(),
                [first, second] if is_boolean(first) && is_boolean(second) => {
                    (first == "true" || second == "true").to_string()
                }
                _ => values.join(","),
            };
            data.insert(key.clone(), value);
        }
        data
    }

    async fn handle_submission(
        &self,
        ctx: &mut CheckoutContext<'_>,
        system_name: &str,
        form: &FormData,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        let Some(provider) = self.registry.provider(system_name).await? else {
            debug!(system_name, "submitted payment method is not active");
            return Ok(CheckoutHandlerResult::failed());
        };

        let customer_id = ctx.cart.customer.id;
        let previous_preferred = ctx.cart.customer.attributes.preferred_payment_method.clone();

        // The selection is applied before validation: validators may depend
        // on it being visible.
        {
            let attributes = &mut ctx.cart.customer.attributes;
            attributes.selected_payment_method = Some(system_name.to_string());
            attributes.preferred_payment_method = Some(system_name.to_string());
        }
        ctx.state.payment_data = Self::normalize_payment_form(form);

        let validation = provider.validate_payment_data(form).await?;
        if !validation.is_valid() {
            let attributes = &mut ctx.cart.customer.attributes;
            attributes.preferred_payment_method = previous_preferred;
            self.customers.save_attributes(customer_id, attributes).await?;
            return Ok(CheckoutHandlerResult::failed_with(validation.errors));
        }

        let payment_request = provider.get_payment_info(ctx.cart, form).await?;
        ctx.state.payment_request = Some(payment_request);
        ctx.state.payment_summary = Some(provider.get_payment_summary().await?);

        self.customers
            .save_attributes(customer_id, &ctx.cart.customer.attributes)
            .await?;
        self.events
            .send_or_log(Event::PaymentMethodSelected {
                customer_id,
                provider: system_name.to_string(),
            })
            .await;
        Ok(CheckoutHandlerResult::succeeded())
    }

    async fn try_single_method_skip(
        &self,
        ctx: &mut CheckoutContext<'_>,
    ) -> Result<Option<CheckoutHandlerResult>, ServiceError> {
        let active = self.registry.active_providers().await?;
        if active.len() != 1 {
            return Ok(None);
        }
        let only: &Arc<dyn PaymentProvider> = &active[0];

        if only.requires_interaction() {
            // Sole option but it needs customer input: the step stays, the
            // UI offers a link to correct the input.
            ctx.state.offer_payment_correction_link = true;
            return Ok(None);
        }
        if only.requires_payment_selection() {
            // A selection-screen provider must be picked explicitly.
            return Ok(None);
        }

        let system_name = only.system_name().to_string();
        let attributes = &mut ctx.cart.customer.attributes;
        if attributes.selected_payment_method.as_deref() != Some(system_name.as_str()) {
            attributes.selected_payment_method = Some(system_name);
            self.customers
                .save_attributes(ctx.cart.customer.id, attributes)
                .await?;
        }
        ctx.state.payment_summary = Some(only.get_payment_summary().await?);
        ctx.state.is_payment_selection_skipped = true;
        Ok(Some(CheckoutHandlerResult::skipped()))
    }

    async fn try_preferred_auto_apply(
        &self,
        ctx: &mut CheckoutContext<'_>,
    ) -> Result<Option<CheckoutHandlerResult>, ServiceError> {
        let Some(preferred) = ctx.cart.customer.attributes.preferred_payment_method.clone() else {
            return Ok(None);
        };
        let Some(provider) = self.registry.provider(&preferred).await? else {
            return Ok(None);
        };
        if provider.requires_payment_selection() {
            return Ok(None);
        }

        if provider.requires_interaction() {
            // The provider must be able to replay a previous instrument;
            // otherwise the customer selects manually.
            match provider.create_process_payment_request(ctx.cart).await? {
                Some(request) => ctx.state.payment_request = Some(request),
                None => return Ok(None),
            }
        }

        let customer_id = ctx.cart.customer.id;
        let attributes = &mut ctx.cart.customer.attributes;
        if attributes.selected_payment_method.as_deref() != Some(preferred.as_str()) {
            attributes.selected_payment_method = Some(preferred);
            self.customers.save_attributes(customer_id, attributes).await?;
        }
        ctx.state.payment_summary = Some(provider.get_payment_summary().await?);
        Ok(Some(CheckoutHandlerResult::succeeded()))
    }
}

fn is_boolean(value: &str) -> bool {
    value == "true" || value == "false"
}

#[async_trait]
impl CheckoutHandler for PaymentMethodHandler {
    fn route(&self) -> &StepRoute {
        &self.route
    }

    #[instrument(skip(self, ctx, request), fields(customer_id = %ctx.cart.customer.id))]
    async fn process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        request: Option<&StepRequest>,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        if ctx.cart.total() <= Decimal::ZERO {
            // Nothing to pay: providers are not consulted at all.
            ctx.state.is_payment_required = false;
            let attributes = &mut ctx.cart.customer.attributes;
            if attributes.selected_payment_method.take().is_some() {
                self.customers
                    .save_attributes(ctx.cart.customer.id, attributes)
                    .await?;
            }
            return Ok(CheckoutHandlerResult::skipped());
        }
        ctx.state.is_payment_required = true;

        if let Some(request) = request {
            if let Some(system_name) = request.form.first(PAYMENT_METHOD_FIELD) {
                let system_name = system_name.to_string();
                return self.handle_submission(ctx, &system_name, &request.form).await;
            }
        }

        if self.config.skip_payment_if_single_method {
            if let Some(result) = self.try_single_method_skip(ctx).await? {
                return Ok(result);
            }
        }

        if ctx.cart.customer.attributes.selected_payment_method.is_some() {
            return Ok(CheckoutHandlerResult::succeeded());
        }

        if self.config.quick_checkout_enabled {
            if let Some(result) = self.try_preferred_auto_apply(ctx).await? {
                return Ok(result);
            }
        }

        Ok(CheckoutHandlerResult::failed())
    }
}
