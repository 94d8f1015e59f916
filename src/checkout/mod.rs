//! The checkout pipeline: one handler per step, driven in ascending order
//! by the workflow. Handlers are pure with respect to control flow: given
//! cart + session state + an optional submitted payload they produce a
//! `CheckoutHandlerResult`; navigation decisions belong to the workflow.

pub mod billing_address;
pub mod confirm;
pub mod payment_method;
pub mod shipping_address;
pub mod shipping_method;
pub mod workflow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{CheckoutError, ServiceError};
use crate::models::{FormData, ProcessPaymentRequest, ShippingOption, ShoppingCart};

pub use billing_address::BillingAddressHandler;
pub use confirm::ConfirmHandler;
pub use payment_method::PaymentMethodHandler;
pub use shipping_address::ShippingAddressHandler;
pub use shipping_method::ShippingMethodHandler;
pub use workflow::{CheckoutWorkflow, WorkflowOutcome};

/// Pipeline positions. Addresses come before the shipping method, which
/// comes before payment, which comes before confirm.
pub mod steps {
    pub const BILLING_ADDRESS: i32 = 10;
    pub const SHIPPING_ADDRESS: i32 = 20;
    pub const SHIPPING_METHOD: i32 = 30;
    pub const PAYMENT_METHOD: i32 = 40;
    pub const CONFIRM: i32 = 50;
}

/// Navigation target produced by a handler or the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum CheckoutRedirect {
    Cart,
    BillingAddress,
    ShippingAddress,
    ShippingMethod,
    PaymentMethod,
    Confirm,
    OrderComplete {
        order_id: Uuid,
    },
    /// Provider-hosted page. `order_id` is set when the order was already
    /// placed and the redirect finishes the checkout (hosted confirmation
    /// page); `None` for redirects raised before placement.
    External {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<Uuid>,
    },
}

/// Route identity of a checkout step: the main action plus any step-specific
/// "select" sub-actions (picking from a saved address list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRoute {
    pub order: i32,
    pub action: String,
    pub controller: String,
    pub area: String,
    pub select_actions: Vec<String>,
}

impl StepRoute {
    pub fn new(order: i32, action: impl Into<String>) -> Self {
        Self {
            order,
            action: action.into(),
            controller: "checkout".to_string(),
            area: String::new(),
            select_actions: vec![],
        }
    }

    pub fn with_select_action(mut self, action: impl Into<String>) -> Self {
        self.select_actions.push(action.into());
        self
    }

    pub fn matches(&self, action: &str, controller: &str) -> bool {
        if !self.controller.eq_ignore_ascii_case(controller) {
            return false;
        }
        self.action.eq_ignore_ascii_case(action)
            || self
                .select_actions
                .iter()
                .any(|a| a.eq_ignore_ascii_case(action))
    }

    /// Handler identity is a pure function of the route; used by the
    /// workflow to deduplicate and order deterministically.
    pub fn identity(&self) -> HandlerIdentity {
        HandlerIdentity {
            order: self.order,
            action: self.action.to_ascii_lowercase(),
            controller: self.controller.to_ascii_lowercase(),
            area: self.area.to_ascii_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerIdentity {
    pub order: i32,
    pub action: String,
    pub controller: String,
    pub area: String,
}

/// A submitted step payload. `None` passed to `process` means the handler
/// is being evaluated for GET navigation / auto-advance only.
#[derive(Debug, Clone, Default)]
pub struct StepRequest {
    pub action: String,
    pub form: FormData,
}

impl StepRequest {
    pub fn new(action: impl Into<String>, form: FormData) -> Self {
        Self {
            action: action.into(),
            form,
        }
    }
}

/// Session-scoped checkout-in-progress data. Created at checkout start,
/// mutated by every handler, reset when the order is placed or the
/// checkout is abandoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutState {
    skip_shipping_address: bool,
    shipping_address_differs: bool,
    /// Set by the payment step when the only active provider requires
    /// interaction: the UI should offer a "correct your input" link
    /// instead of skipping the step.
    pub offer_payment_correction_link: bool,
    /// Raw submitted payment form fields, kept across redisplays so the
    /// customer need not re-enter them.
    pub payment_data: HashMap<String, String>,
    /// Session-cached payment request built by the selected provider.
    pub payment_request: Option<ProcessPaymentRequest>,
    pub payment_summary: Option<String>,
    pub is_payment_required: bool,
    pub is_payment_selection_skipped: bool,
    /// Offered-options cache: shipping rates are computed once per
    /// checkout, not per step transition.
    pub offered_shipping_options: Option<Vec<ShippingOption>>,
}

impl Default for CheckoutState {
    fn default() -> Self {
        Self {
            skip_shipping_address: false,
            shipping_address_differs: false,
            offer_payment_correction_link: false,
            payment_data: HashMap::new(),
            payment_request: None,
            payment_summary: None,
            is_payment_required: true,
            is_payment_selection_skipped: false,
            offered_shipping_options: None,
        }
    }
}

impl CheckoutState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_skip_shipping_address(&mut self) {
        self.skip_shipping_address = true;
    }

    /// Read-once: the flag is cleared on consumption.
    pub fn take_skip_shipping_address(&mut self) -> bool {
        std::mem::take(&mut self.skip_shipping_address)
    }

    pub fn set_shipping_address_differs(&mut self, differs: bool) {
        self.shipping_address_differs = differs;
    }

    /// Read-once: the flag is cleared on consumption.
    pub fn take_shipping_address_differs(&mut self) -> bool {
        std::mem::take(&mut self.shipping_address_differs)
    }

    /// Abandons the checkout in progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mutable view a handler works on: the cart aggregate and the session
/// state. Single writer per session is assumed.
pub struct CheckoutContext<'a> {
    pub cart: &'a mut ShoppingCart,
    pub state: &'a mut CheckoutState,
}

/// Outcome value of one handler invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutHandlerResult {
    pub success: bool,
    pub skip: bool,
    pub errors: Vec<CheckoutError>,
    pub redirect: Option<CheckoutRedirect>,
}

impl CheckoutHandlerResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    /// `success=false` with no errors: the step cannot complete silently
    /// and must be redisplayed.
    pub fn failed() -> Self {
        Self::default()
    }

    pub fn failed_with(errors: Vec<CheckoutError>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    /// The step is satisfied without user interaction, regardless of
    /// `success`.
    pub fn skipped() -> Self {
        Self {
            success: true,
            skip: true,
            ..Default::default()
        }
    }

    pub fn redirect(redirect: CheckoutRedirect) -> Self {
        Self {
            redirect: Some(redirect),
            ..Default::default()
        }
    }

    pub fn with_redirect(mut self, redirect: CheckoutRedirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Satisfied steps let the workflow move on.
    pub fn is_satisfied(&self) -> bool {
        self.skip || self.success
    }
}

/// One checkout step.
#[async_trait]
pub trait CheckoutHandler: Send + Sync {
    fn route(&self) -> &StepRoute;

    /// Whether an inbound `(action, controller)` pair targets this step,
    /// including its "select" sub-actions.
    fn is_handler_for(&self, action: &str, controller: &str) -> bool {
        self.route().matches(action, controller)
    }

    async fn process(
        &self,
        ctx: &mut CheckoutContext<'_>,
        request: Option<&StepRequest>,
    ) -> Result<CheckoutHandlerResult, ServiceError>;
}
