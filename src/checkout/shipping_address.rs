use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::CheckoutConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::providers::CustomerRepository;

use super::{
    steps, CheckoutContext, CheckoutHandler, CheckoutHandlerResult, StepRequest, StepRoute,
};

pub const ACTION: &str = "shipping-address";
pub const SELECT_ACTION: &str = "select-shipping-address";

const ADDRESS_ID_FIELD: &str = "address_id";

/// Assigns the shipping address. Unconditionally skipped (and cleared) for
/// carts that require no shipping; an address is only acceptable when its
/// country allows shipping.
pub struct ShippingAddressHandler {
    route: StepRoute,
    config: Arc<CheckoutConfig>,
    customers: Arc<dyn CustomerRepository>,
    events: EventSender,
}

impl ShippingAddressHandler {
    pub fn new(
        config: Arc<CheckoutConfig>,
        customers: Arc<dyn CustomerRepository>,
        events: EventSender,
    ) -> Self {
        Self {
            route: StepRoute::new(steps::SHIPPING_ADDRESS, ACTION)
                .with_select_action(SELECT_ACTION),
            config,
            customers,
            events,
        }
    }

    async fn clear_shipping_address(
        &self,
        ctx: &mut CheckoutContext<'_>,
    ) -> Result<(), ServiceError> {
        if ctx.cart.shipping_address.take().is_some() {
            self.customers
                .save_shipping_address(ctx.cart.customer.id, None)
                .await?;
        }
        Ok(())
    }

    async fn assign(
        &self,
        ctx: &mut CheckoutContext<'_>,
        address_id: Uuid,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        let Some(address) = ctx.cart.customer.address(address_id).cloned() else {
            debug!(%address_id, "submitted shipping address does not belong to the customer");
            return Ok(CheckoutHandlerResult::failed());
        };
        if !address.allows_shipping() {
            debug!(country = %address.country.code, "country does not allow shipping");
            return Ok(CheckoutHandlerResult::failed());
        }

        let customer_id = ctx.cart.customer.id;
        ctx.cart.shipping_address = Some(address.clone());
        self.customers
            .save_shipping_address(customer_id, Some(address.id))
            .await?;
        self.events
            .send_or_log(Event::ShippingAddressAssigned {
                customer_id,
                address_id: address.id,
            })
            .await;
        Ok(CheckoutHandlerResult::succeeded())
    }
}

#[async_trait]
impl CheckoutHandler for ShippingAddressHandler {
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
            // No stale shipping address may survive a shipping-free cart.
            self.clear_shipping_address(ctx).await?;
            return Ok(CheckoutHandlerResult::skipped());
        }

        if let Some(current) = &ctx.cart.shipping_address {
            if !current.allows_shipping() {
                self.clear_shipping_address(ctx).await?;
            }
        }

        // Read-once flags left by the billing step.
        let mirrored = ctx.state.take_skip_shipping_address();
        let differs = ctx.state.take_shipping_address_differs();

        if let Some(request) = request {
            if let Some(raw_id) = request.form.first(ADDRESS_ID_FIELD) {
                let Ok(address_id) = raw_id.parse::<Uuid>() else {
                    return Ok(CheckoutHandlerResult::failed());
                };
                return self.assign(ctx, address_id).await;
            }
        }

        if mirrored && ctx.cart.shipping_address.is_some() {
            // Billing already mirrored the address; satisfied without
            // interaction.
            return Ok(CheckoutHandlerResult::skipped());
        }

        // The customer explicitly asked for a different shipping address, so
        // the stored default must not preempt the choice.
        if self.config.quick_checkout_enabled && !differs {
            if let Some(default_id) = ctx.cart.customer.attributes.default_shipping_address_id {
                if let Some(address) = ctx.cart.customer.address(default_id).cloned() {
                    if address.allows_shipping() {
                        let current = ctx.cart.shipping_address.as_ref().map(|a| a.id);
                        if current != Some(address.id) {
                            let customer_id = ctx.cart.customer.id;
                            ctx.cart.shipping_address = Some(address.clone());
                            self.customers
                                .save_shipping_address(customer_id, Some(address.id))
                                .await?;
                        }
                        return Ok(CheckoutHandlerResult::succeeded());
                    }
                }
            }
        }

        Ok(if ctx.cart.shipping_address.is_some() {
            CheckoutHandlerResult::succeeded()
        } else {
            CheckoutHandlerResult::failed()
        })
    }
}
