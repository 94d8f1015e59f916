//! Collaborator contracts consumed by the checkout pipeline, plus in-memory
//! reference implementations used by the server binary and the test suite.
//! Real deployments swap these for gateway- and carrier-backed services.

pub mod customers;
pub mod orders;
pub mod payment;
pub mod shipping;
pub mod validation;

pub use customers::{CustomerRepository, InMemoryCustomerRepository};
pub use orders::{
    InMemoryOrderPlacementService, OrderPlacementResult, OrderPlacementService, PostProcessOutcome,
};
pub use payment::{
    OfflinePaymentProvider, PaymentProvider, PaymentProviderRegistry, StaticPaymentProviderRegistry,
    ValidationResult,
};
pub use shipping::{FixedRateShippingResolver, ShippingOptionResolver, ShippingOptionResponse};
pub use validation::{BasicCartValidator, CartValidator, ValidationOutcome};
