#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use checkout_api::checkout::{CheckoutContext, CheckoutState, CheckoutWorkflow};
use checkout_api::config::CheckoutConfig;
use checkout_api::errors::{CheckoutError, ServiceError};
use checkout_api::events::{EventSender, event_channel};
use checkout_api::models::{
    Address, CartItem, Country, Customer, CustomerAttributes, FormData, ProcessPaymentRequest,
    ShippingOption, ShoppingCart,
};
use checkout_api::providers::{
    CartValidator, InMemoryCustomerRepository, OrderPlacementResult, OrderPlacementService,
    PaymentProvider, PostProcessOutcome, ShippingOptionResolver, ShippingOptionResponse,
    StaticPaymentProviderRegistry, ValidationOutcome, ValidationResult,
};
use checkout_api::{build_workflow, CheckoutCollaborators};

// ==================== Builders ====================

pub fn address() -> Address {
    Address {
        id: Uuid::new_v4(),
        first_name: "Jo".into(),
        last_name: "Doe".into(),
        company: None,
        address_line_1: "1 Main St".into(),
        address_line_2: None,
        city: "Springfield".into(),
        postal_code: "12345".into(),
        country: Country::new("US", "United States"),
        phone: None,
    }
}

pub fn non_shippable_address() -> Address {
    Address {
        country: Country::new("XX", "Nowhere").without_shipping(),
        ..address()
    }
}

pub fn item(price: Decimal, requires_shipping: bool) -> CartItem {
    CartItem {
        product_id: Uuid::new_v4(),
        name: "Widget".into(),
        quantity: 1,
        unit_price: price,
        requires_shipping,
    }
}

pub fn cart_with(addresses: Vec<Address>, items: Vec<CartItem>) -> ShoppingCart {
    ShoppingCart {
        store_id: Uuid::new_v4(),
        customer: Customer {
            id: Uuid::new_v4(),
            email: Some("jo@example.com".into()),
            addresses,
            attributes: CustomerAttributes::default(),
        },
        items,
        currency: "USD".into(),
        billing_address: None,
        shipping_address: None,
    }
}

/// A cart with one saved address and one shippable item.
pub fn shippable_cart() -> ShoppingCart {
    cart_with(vec![address()], vec![item(dec!(25.00), true)])
}

/// A cart containing only digital goods.
pub fn digital_cart() -> ShoppingCart {
    cart_with(vec![address()], vec![item(dec!(9.99), false)])
}

pub fn option(method_id: i32, provider: &str, rate: Decimal) -> ShippingOption {
    ShippingOption::new(method_id, provider, format!("Option {}", method_id), rate)
}

pub fn form(pairs: &[(&str, &str)]) -> FormData {
    FormData::from_pairs(pairs.iter().map(|(k, v)| (*k, *v)))
}

// ==================== Test doubles ====================

/// Shipping resolver returning a fixed response and counting invocations,
/// so tests can assert the offered-options cache prevents recomputation.
pub struct CountingResolver {
    response: Mutex<ShippingOptionResponse>,
    pub calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new(options: Vec<ShippingOption>) -> Self {
        Self {
            response: Mutex::new(ShippingOptionResponse {
                options,
                errors: vec![],
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(errors: Vec<String>) -> Self {
        Self {
            response: Mutex::new(ShippingOptionResponse {
                options: vec![],
                errors,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShippingOptionResolver for CountingResolver {
    async fn shipping_options<'a>(
        &self,
        _cart: &ShoppingCart,
        _address: Option<&'a Address>,
        provider_filter: Option<&'a str>,
    ) -> Result<ShippingOptionResponse, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.lock().unwrap().clone();
        let options = match provider_filter {
            Some(provider) => response
                .options
                .into_iter()
                .filter(|o| o.provider_system_name.eq_ignore_ascii_case(provider))
                .collect(),
            None => response.options,
        };
        Ok(ShippingOptionResponse {
            options,
            errors: response.errors,
        })
    }
}

/// Payment provider with scripted flags and validation outcome.
pub struct StubPaymentProvider {
    pub name: String,
    pub interaction: bool,
    pub selection_screen: bool,
    pub validation_errors: Vec<CheckoutError>,
    pub can_replay: bool,
    pub summary: String,
}

impl StubPaymentProvider {
    pub fn offline(name: &str) -> Self {
        Self {
            name: name.into(),
            interaction: false,
            selection_screen: false,
            validation_errors: vec![],
            can_replay: true,
            summary: format!("{} summary", name),
        }
    }

    pub fn interactive(name: &str) -> Self {
        Self {
            interaction: true,
            ..Self::offline(name)
        }
    }

    pub fn rejecting(name: &str, errors: Vec<CheckoutError>) -> Self {
        Self {
            validation_errors: errors,
            ..Self::offline(name)
        }
    }
}

#[async_trait]
impl PaymentProvider for StubPaymentProvider {
    fn system_name(&self) -> &str {
        &self.name
    }

    fn requires_interaction(&self) -> bool {
        self.interaction
    }

    fn requires_payment_selection(&self) -> bool {
        self.selection_screen
    }

    async fn validate_payment_data(
        &self,
        _form: &FormData,
    ) -> Result<ValidationResult, ServiceError> {
        Ok(if self.validation_errors.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::with_errors(self.validation_errors.clone())
        })
    }

    async fn get_payment_info(
        &self,
        cart: &ShoppingCart,
        _form: &FormData,
    ) -> Result<ProcessPaymentRequest, ServiceError> {
        let mut request = ProcessPaymentRequest::for_cart(cart);
        request.payment_method_system_name = self.name.clone();
        Ok(request)
    }

    async fn get_payment_summary(&self) -> Result<String, ServiceError> {
        Ok(self.summary.clone())
    }

    async fn create_process_payment_request(
        &self,
        cart: &ShoppingCart,
    ) -> Result<Option<ProcessPaymentRequest>, ServiceError> {
        if !self.can_replay {
            return Ok(None);
        }
        let mut request = ProcessPaymentRequest::for_cart(cart);
        request.payment_method_system_name = self.name.clone();
        Ok(Some(request))
    }
}

/// Order service with scripted placement results and a switchable interval
/// guard.
pub struct ScriptedOrderService {
    pub interval_valid: AtomicBool,
    pub place_calls: AtomicUsize,
    placements: Mutex<VecDeque<Result<OrderPlacementResult, ServiceError>>>,
    post_process: Mutex<VecDeque<Result<PostProcessOutcome, ServiceError>>>,
}

impl ScriptedOrderService {
    pub fn succeeding() -> Self {
        Self {
            interval_valid: AtomicBool::new(true),
            place_calls: AtomicUsize::new(0),
            placements: Mutex::new(VecDeque::new()),
            post_process: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_placement(&self, result: Result<OrderPlacementResult, ServiceError>) {
        self.placements.lock().unwrap().push_back(result);
    }

    pub fn push_post_process(&self, result: Result<PostProcessOutcome, ServiceError>) {
        self.post_process.lock().unwrap().push_back(result);
    }

    pub fn placement_count(&self) -> usize {
        self.place_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderPlacementService for ScriptedOrderService {
    async fn is_minimum_order_placement_interval_valid(
        &self,
        _customer_id: Uuid,
        _store_id: Uuid,
    ) -> Result<bool, ServiceError> {
        Ok(self.interval_valid.load(Ordering::SeqCst))
    }

    async fn place_order(
        &self,
        _request: &ProcessPaymentRequest,
        _extra: &std::collections::HashMap<String, String>,
    ) -> Result<OrderPlacementResult, ServiceError> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        match self.placements.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(OrderPlacementResult::placed(Uuid::new_v4())),
        }
    }

    async fn post_process_payment(
        &self,
        _order_id: Uuid,
        _request: &ProcessPaymentRequest,
    ) -> Result<PostProcessOutcome, ServiceError> {
        match self.post_process.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(PostProcessOutcome::default()),
        }
    }
}

/// Cart validator returning a scripted outcome.
pub struct ScriptedValidator {
    outcome: Mutex<ValidationOutcome>,
}

impl ScriptedValidator {
    pub fn passing() -> Self {
        Self {
            outcome: Mutex::new(ValidationOutcome::ok()),
        }
    }

    pub fn with(outcome: ValidationOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
        }
    }
}

#[async_trait]
impl CartValidator for ScriptedValidator {
    async fn validate(&self, _cart: &ShoppingCart) -> Result<ValidationOutcome, ServiceError> {
        Ok(self.outcome.lock().unwrap().clone())
    }
}

// ==================== Harness ====================

/// Assembled pipeline plus handles on the collaborators, so tests can
/// script provider behavior and inspect persisted writes.
pub struct Harness {
    pub workflow: CheckoutWorkflow,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub resolver: Arc<CountingResolver>,
    pub orders: Arc<ScriptedOrderService>,
    pub events: EventSender,
}

pub struct HarnessBuilder {
    config: CheckoutConfig,
    providers: Vec<Arc<dyn PaymentProvider>>,
    resolver: Option<Arc<CountingResolver>>,
    orders: Option<Arc<ScriptedOrderService>>,
    validator: Option<Arc<ScriptedValidator>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: CheckoutConfig::default(),
            providers: vec![Arc::new(StubPaymentProvider::offline("Payments.Invoice"))],
            resolver: None,
            orders: None,
            validator: None,
        }
    }

    pub fn config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn payment_providers(mut self, providers: Vec<Arc<dyn PaymentProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn resolver(mut self, resolver: Arc<CountingResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn orders(mut self, orders: Arc<ScriptedOrderService>) -> Self {
        self.orders = Some(orders);
        self
    }

    pub fn validator(mut self, validator: Arc<ScriptedValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn build(self) -> Harness {
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(CountingResolver::new(vec![option(
                1,
                "Shipping.FixedRate",
                dec!(4.90),
            )]))
        });
        let orders = self
            .orders
            .unwrap_or_else(|| Arc::new(ScriptedOrderService::succeeding()));
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(ScriptedValidator::passing()));
        let (events, _task) = event_channel(64);

        let collaborators = CheckoutCollaborators {
            customers: customers.clone(),
            payment_registry: Arc::new(StaticPaymentProviderRegistry::new(self.providers)),
            shipping: resolver.clone(),
            orders: orders.clone(),
            cart_validator: validator,
        };
        let workflow = build_workflow(Arc::new(self.config), &collaborators, events.clone());

        Harness {
            workflow,
            customers,
            resolver,
            orders,
            events,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        HarnessBuilder::new().build()
    }
}

/// Runs a closure with a `CheckoutContext` over the given cart and state.
pub struct Session {
    pub cart: ShoppingCart,
    pub state: CheckoutState,
}

impl Session {
    pub fn new(cart: ShoppingCart) -> Self {
        Self {
            cart,
            state: CheckoutState::new(),
        }
    }

    pub fn ctx(&mut self) -> CheckoutContext<'_> {
        CheckoutContext {
            cart: &mut self.cart,
            state: &mut self.state,
        }
    }
}
