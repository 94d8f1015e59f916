use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::CheckoutConfig;
use crate::errors::{CheckoutError, ServiceError};
use crate::events::{Event, EventSender};
use crate::models::{ShippingOption, ShoppingCart};
use crate::providers::{CustomerRepository, ShippingOptionResolver};

use super::{
    steps, CheckoutContext, CheckoutHandler, CheckoutHandlerResult, StepRequest, StepRoute,
};

pub const ACTION: &str = "shipping-method";

const SHIPPING_OPTION_FIELD: &str = "shippingoption";

/// Selects the shipping method. Offered options are computed once per
/// session and cached on the checkout state; selection is submitted as the
/// composite key `"<shippingMethodId>___<providerSystemName>"`.
pub struct ShippingMethodHandler {
    route: StepRoute,
    config: Arc<CheckoutConfig>,
    customers: Arc<dyn CustomerRepository>,
    resolver: Arc<dyn ShippingOptionResolver>,
    events: EventSender,
}

impl ShippingMethodHandler {
    pub fn new(
        config: Arc<CheckoutConfig>,
        customers: Arc<dyn CustomerRepository>,
        resolver: Arc<dyn ShippingOptionResolver>,
        events: EventSender,
    ) -> Self {
        Self {
            route: StepRoute::new(steps::SHIPPING_METHOD, ACTION),
            config,
            customers,
            resolver,
            events,
        }
    }

    async fn select(
        &self,
        ctx: &mut CheckoutContext<'_>,
        option: ShippingOption,
    ) -> Result<(), ServiceError> {
        let attributes = &mut ctx.cart.customer.attributes;
        let already_selected = attributes.selected_shipping_option.as_ref() == Some(&option);
        attributes.selected_shipping_option = Some(option.clone());
        if attributes.preferred_shipping_option.is_none() {
            attributes.preferred_shipping_option = Some(option.clone());
        }
        if !already_selected {
            self.customers
                .save_attributes(ctx.cart.customer.id, attributes)
                .await?;
            self.events
                .send_or_log(Event::ShippingMethodSelected {
                    customer_id: ctx.cart.customer.id,
                    shipping_method_id: option.shipping_method_id,
                    provider: option.provider_system_name.clone(),
                })
                .await;
        }
        Ok(())
    }

    async fn clear_selection(&self, ctx: &mut CheckoutContext<'_>) -> Result<(), ServiceError> {
        ctx.state.offered_shipping_options = None;
        let attributes = &mut ctx.cart.customer.attributes;
        if attributes.selected_shipping_option.take().is_some() {
            self.customers
                .save_attributes(ctx.cart.customer.id, attributes)
                .await?;
        }
        Ok(())
    }

    async fn handle_submission(
        &self,
        ctx: &mut CheckoutContext<'_>,
        raw: &str,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        let Some((method_id, provider)) = ShippingOption::parse_composite_key(raw) else {
            return Ok(CheckoutHandlerResult::failed_with(vec![CheckoutError::new(
                "The selected shipping option could not be parsed",
            )]));
        };

        let candidates: Vec<ShippingOption> = match &ctx.state.offered_shipping_options {
            Some(cached) => cached
                .iter()
                .filter(|o| o.provider_system_name.eq_ignore_ascii_case(&provider))
                .cloned()
                .collect(),
            None => {
                self.resolver
                    .shipping_options(ctx.cart, ctx.cart.shipping_address.as_ref(), Some(&provider))
                    .await?
                    .options
            }
        };

        match candidates
            .into_iter()
            .find(|o| o.shipping_method_id == method_id)
        {
            Some(option) => {
                self.select(ctx, option).await?;
                Ok(CheckoutHandlerResult::succeeded())
            }
            None => {
                debug!(method_id, provider, "submitted shipping option not offered");
                Ok(CheckoutHandlerResult::failed())
            }
        }
    }

    /// Quick-checkout auto-selection. Deliberate business rule: exact
    /// `(method id, provider)` match first, then the cheapest option
    /// sharing the method id.
    fn preferred_pick<'o>(
        preferred: &ShippingOption,
        offered: &'o [ShippingOption],
    ) -> Option<&'o ShippingOption> {
        offered
            .iter()
            .find(|o| {
                o.shipping_method_id == preferred.shipping_method_id
                    && o.provider_system_name
                        .eq_ignore_ascii_case(&preferred.provider_system_name)
            })
            .or_else(|| {
                offered
                    .iter()
                    .filter(|o| o.shipping_method_id == preferred.shipping_method_id)
                    .min_by_key(|o| o.rate)
            })
    }

    async fn ensure_offered_options(
        &self,
        cart: &ShoppingCart,
        ctx_state_options: &mut Option<Vec<ShippingOption>>,
        surface_errors: bool,
    ) -> Result<Option<CheckoutHandlerResult>, ServiceError> {
        if ctx_state_options.is_some() {
            return Ok(None);
        }
        let response = self
            .resolver
            .shipping_options(cart, cart.shipping_address.as_ref(), None)
            .await?;
        if response.options.is_empty() {
            // Errors are surfaced only on a direct visit of this step, not
            // on every background advance check.
            let result = if surface_errors {
                CheckoutHandlerResult::failed_with(
                    response.errors.into_iter().map(CheckoutError::new).collect(),
                )
            } else {
                CheckoutHandlerResult::failed()
            };
            return Ok(Some(result));
        }
        *ctx_state_options = Some(response.options);
        Ok(None)
    }
}

#[async_trait]
impl CheckoutHandler for ShippingMethodHandler {
    fn route(&self) -> &StepRoute {
        &self.route
    }

    #[instrument(skip(self, ctx, request), fields(customer_id = %ctx.cart.customer.id))]
    async fn process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        request: Option<&StepRequest>,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        if !ctx.cart.requires_shipping() {
            self.clear_selection(ctx).await?;
            return Ok(CheckoutHandlerResult::skipped());
        }

        if let Some(request) = request {
            if let Some(raw) = request.form.first(SHIPPING_OPTION_FIELD) {
                return self.handle_submission(ctx, raw).await;
            }
        }

        let (cart, state) = (&mut *ctx.cart, &mut *ctx.state);
        if let Some(result) = self
            .ensure_offered_options(cart, &mut state.offered_shipping_options, request.is_some())
            .await?
        {
            return Ok(result);
        }
        let offered = state
            .offered_shipping_options
            .clone()
            .unwrap_or_default();

        if offered.len() == 1 && self.config.skip_shipping_if_single_option {
            self.select(ctx, offered[0].clone()).await?;
            return Ok(CheckoutHandlerResult::skipped());
        }

        if ctx.cart.customer.attributes.selected_shipping_option.is_some() {
            return Ok(CheckoutHandlerResult::succeeded());
        }

        if self.config.quick_checkout_enabled {
            if let Some(preferred) = ctx.cart.customer.attributes.preferred_shipping_option.clone()
            {
                if let Some(pick) = Self::preferred_pick(&preferred, &offered) {
                    self.select(ctx, pick.clone()).await?;
                    return Ok(CheckoutHandlerResult::succeeded());
                }
            }
        }

        Ok(CheckoutHandlerResult::failed())
    }
}
