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

pub const ACTION: &str = "billing-address";
pub const SELECT_ACTION: &str = "select-billing-address";

const ADDRESS_ID_FIELD: &str = "address_id";
const SHIPPING_DIFFERS_FIELD: &str = "shipping_address_differs";

/// First pipeline step: assigns the billing address, optionally mirroring
/// it into the shipping address when the customer keeps "ship to a
/// different address" unchecked.
pub struct BillingAddressHandler {
    route: StepRoute,
    config: Arc<CheckoutConfig>,
    customers: Arc<dyn CustomerRepository>,
    events: EventSender,
}

impl BillingAddressHandler {
    pub fn new(
        config: Arc<CheckoutConfig>,
        customers: Arc<dyn CustomerRepository>,
        events: EventSender,
    ) -> Self {
        Self {
            route: StepRoute::new(steps::BILLING_ADDRESS, ACTION)
                .with_select_action(SELECT_ACTION),
            config,
            customers,
            events,
        }
    }

    async fn apply_selection(
        &self,
        ctx: &mut CheckoutContext<'_>,
        address_id: Uuid,
        shipping_differs: bool,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        let Some(address) = ctx.cart.customer.address(address_id).cloned() else {
            // Foreign or stale address id: redisplay without error detail.
            debug!(%address_id, "submitted billing address does not belong to the customer");
            return Ok(CheckoutHandlerResult::failed());
        };

        let customer_id = ctx.cart.customer.id;
        ctx.cart.billing_address = Some(address.clone());
        self.customers
            .save_billing_address(customer_id, address.id)
            .await?;
        self.events
            .send_or_log(Event::BillingAddressAssigned {
                customer_id,
                address_id: address.id,
            })
            .await;

        ctx.state.set_shipping_address_differs(shipping_differs);

        if !shipping_differs && ctx.cart.requires_shipping() && address.allows_shipping() {
            // Mirror billing into shipping; the shipping-address step
            // consumes the flag and short-circuits.
            ctx.cart.shipping_address = Some(address.clone());
            self.customers
                .save_shipping_address(customer_id, Some(address.id))
                .await?;
            ctx.state.set_skip_shipping_address();
        }

        Ok(CheckoutHandlerResult::succeeded())
    }

    async fn apply_quick_checkout_default(
        &self,
        ctx: &mut CheckoutContext<'_>,
    ) -> Result<Option<CheckoutHandlerResult>, ServiceError> {
        let Some(default_id) = ctx.cart.customer.attributes.default_billing_address_id else {
            return Ok(None);
        };
        let Some(address) = ctx.cart.customer.address(default_id).cloned() else {
            return Ok(None);
        };

        let current = ctx.cart.billing_address.as_ref().map(|a| a.id);
        if current != Some(address.id) {
            let customer_id = ctx.cart.customer.id;
            ctx.cart.billing_address = Some(address.clone());
            self.customers
                .save_billing_address(customer_id, address.id)
                .await?;
        }
        Ok(Some(CheckoutHandlerResult::succeeded()))
    }
}

#[async_trait]
impl CheckoutHandler for BillingAddressHandler {
    fn route(&self) -> &StepRoute {
        &self.route
    }

    #[instrument(skip(self, ctx, request), fields(customer_id = %ctx.cart.customer.id))]
    async fn process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        request: Option<&StepRequest>,
    ) -> Result<CheckoutHandlerResult, ServiceError> {
        if let Some(request) = request {
            if let Some(raw_id) = request.form.first(ADDRESS_ID_FIELD) {
                let Ok(address_id) = raw_id.parse::<Uuid>() else {
                    return Ok(CheckoutHandlerResult::failed());
                };
                let shipping_differs = request.form.is_truthy(SHIPPING_DIFFERS_FIELD);
                return self.apply_selection(ctx, address_id, shipping_differs).await;
            }
        }

        if self.config.quick_checkout_enabled {
            if let Some(result) = self.apply_quick_checkout_default(ctx).await? {
                return Ok(result);
            }
        }

        // Whatever billing address is already assigned decides the step.
        Ok(if ctx.cart.billing_address.is_some() {
            CheckoutHandlerResult::succeeded()
        } else {
            CheckoutHandlerResult::failed()
        })
    }
}
