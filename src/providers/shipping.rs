use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::models::{Address, ShippingOption, ShoppingCart};

/// Options plus any provider-reported problems. Errors are non-fatal to the
/// pipeline; the shipping-method step decides when to surface them.
#[derive(Debug, Clone, Default)]
pub struct ShippingOptionResponse {
    pub options: Vec<ShippingOption>,
    pub errors: Vec<String>,
}

/// Computes shipping options for a cart. Rate computation is expensive, so
/// callers cache the result per checkout session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShippingOptionResolver: Send + Sync {
    async fn shipping_options<'a>(
        &self,
        cart: &ShoppingCart,
        address: Option<&'a Address>,
        provider_filter: Option<&'a str>,
    ) -> Result<ShippingOptionResponse, ServiceError>;
}

/// Resolver backed by a fixed option table, for the demo server and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedRateShippingResolver {
    options: Vec<ShippingOption>,
}

impl FixedRateShippingResolver {
    pub fn new(options: Vec<ShippingOption>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl ShippingOptionResolver for FixedRateShippingResolver {
    async fn shipping_options<'a>(
        &self,
        _cart: &ShoppingCart,
        _address: Option<&'a Address>,
        provider_filter: Option<&'a str>,
    ) -> Result<ShippingOptionResponse, ServiceError> {
        let options: Vec<ShippingOption> = match provider_filter {
            Some(provider) => self
                .options
                .iter()
                .filter(|o| o.provider_system_name.eq_ignore_ascii_case(provider))
                .cloned()
                .collect(),
            None => self.options.clone(),
        };
        let errors = if options.is_empty() {
            vec!["No shipping options are available for this destination".to_string()]
        } else {
            vec![]
        };
        Ok(ShippingOptionResponse { options, errors })
    }
}
