use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::{CheckoutError, ServiceError};
use crate::models::{FormData, ProcessPaymentRequest, ShoppingCart};

/// Outcome of a provider's payment-data validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<CheckoutError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn with_errors(errors: Vec<CheckoutError>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A payment method provider. The pipeline only depends on this contract;
/// gateway wire protocols live behind it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Stable provider identity, e.g. `"Payments.Manual"`.
    fn system_name(&self) -> &str;

    /// Whether the customer must interact with the provider before a
    /// payment request can be built (e.g. entering card data).
    fn requires_interaction(&self) -> bool;

    /// Whether the provider insists on being picked on an explicit
    /// selection screen, which blocks auto-selection.
    fn requires_payment_selection(&self) -> bool;

    async fn validate_payment_data(&self, form: &FormData)
        -> Result<ValidationResult, ServiceError>;

    /// Builds the payment request from an explicit submission.
    async fn get_payment_info(
        &self,
        cart: &ShoppingCart,
        form: &FormData,
    ) -> Result<ProcessPaymentRequest, ServiceError>;

    async fn get_payment_summary(&self) -> Result<String, ServiceError>;

    /// Synthesizes a payment request from the cart alone, e.g. by replaying
    /// a stored instrument. `None` means the provider cannot, and
    /// quick-checkout must fall through to manual selection.
    async fn create_process_payment_request(
        &self,
        cart: &ShoppingCart,
    ) -> Result<Option<ProcessPaymentRequest>, ServiceError>;
}

/// Registry of payment providers activated for the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProviderRegistry: Send + Sync {
    async fn active_providers(&self) -> Result<Vec<Arc<dyn PaymentProvider>>, ServiceError>;

    async fn provider(
        &self,
        system_name: &str,
    ) -> Result<Option<Arc<dyn PaymentProvider>>, ServiceError>;
}

/// Offline payment provider (pay on invoice / cash on delivery style): no
/// interaction, no gateway round-trips, validation always passes.
#[derive(Debug, Clone)]
pub struct OfflinePaymentProvider {
    system_name: String,
    summary: String,
}

impl OfflinePaymentProvider {
    pub fn new(system_name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            system_name: system_name.into(),
            summary: summary.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for OfflinePaymentProvider {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn requires_interaction(&self) -> bool {
        false
    }

    fn requires_payment_selection(&self) -> bool {
        false
    }

    async fn validate_payment_data(
        &self,
        _form: &FormData,
    ) -> Result<ValidationResult, ServiceError> {
        Ok(ValidationResult::valid())
    }

    async fn get_payment_info(
        &self,
        cart: &ShoppingCart,
        _form: &FormData,
    ) -> Result<ProcessPaymentRequest, ServiceError> {
        let mut request = ProcessPaymentRequest::for_cart(cart);
        request.payment_method_system_name = self.system_name.clone();
        Ok(request)
    }

    async fn get_payment_summary(&self) -> Result<String, ServiceError> {
        Ok(self.summary.clone())
    }

    async fn create_process_payment_request(
        &self,
        cart: &ShoppingCart,
    ) -> Result<Option<ProcessPaymentRequest>, ServiceError> {
        let mut request = ProcessPaymentRequest::for_cart(cart);
        request.payment_method_system_name = self.system_name.clone();
        Ok(Some(request))
    }
}

/// Fixed provider registry assembled at startup.
#[derive(Clone, Default)]
pub struct StaticPaymentProviderRegistry {
    providers: Vec<Arc<dyn PaymentProvider>>,
}

impl StaticPaymentProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn PaymentProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl PaymentProviderRegistry for StaticPaymentProviderRegistry {
    async fn active_providers(&self) -> Result<Vec<Arc<dyn PaymentProvider>>, ServiceError> {
        Ok(self.providers.clone())
    }

    async fn provider(
        &self,
        system_name: &str,
    ) -> Result<Option<Arc<dyn PaymentProvider>>, ServiceError> {
        Ok(self
            .providers
            .iter()
            .find(|p| p.system_name().eq_ignore_ascii_case(system_name))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, CustomerAttributes};
    use uuid::Uuid;

    fn empty_cart() -> ShoppingCart {
        ShoppingCart {
            store_id: Uuid::new_v4(),
            customer: Customer {
                id: Uuid::new_v4(),
                email: None,
                addresses: vec![],
                attributes: CustomerAttributes::default(),
            },
            items: vec![],
            currency: "USD".into(),
            billing_address: None,
            shipping_address: None,
        }
    }

    #[tokio::test]
    async fn offline_provider_builds_request_from_cart() {
        let provider = OfflinePaymentProvider::new("Payments.Invoice", "Pay by invoice");
        let request = provider
            .create_process_payment_request(&empty_cart())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.payment_method_system_name, "Payments.Invoice");
    }

    #[tokio::test]
    async fn registry_lookup_is_case_insensitive() {
        let registry = StaticPaymentProviderRegistry::new(vec![Arc::new(
            OfflinePaymentProvider::new("Payments.Invoice", "Pay by invoice"),
        )]);
        assert!(registry
            .provider("payments.invoice")
            .await
            .unwrap()
            .is_some());
        assert!(registry.provider("Payments.Card").await.unwrap().is_none());
    }
}
