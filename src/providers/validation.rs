use async_trait::async_trait;

use crate::checkout::CheckoutRedirect;
use crate::errors::ServiceError;
use crate::models::ShoppingCart;

/// Structured cart-validation outcome. The override redirect, when present,
/// wins over any warnings; the confirm step checks it first.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub warnings: Vec<String>,
    pub override_redirect: Option<CheckoutRedirect>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self {
            warnings,
            override_redirect: None,
        }
    }

    pub fn redirect(redirect: CheckoutRedirect) -> Self {
        Self {
            warnings: vec![],
            override_redirect: Some(redirect),
        }
    }
}

/// Validates the cart right before order placement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartValidator: Send + Sync {
    async fn validate(&self, cart: &ShoppingCart) -> Result<ValidationOutcome, ServiceError>;
}

/// Baseline validator: an empty cart is sent back to the cart page.
#[derive(Debug, Clone, Default)]
pub struct BasicCartValidator;

#[async_trait]
impl CartValidator for BasicCartValidator {
    async fn validate(&self, cart: &ShoppingCart) -> Result<ValidationOutcome, ServiceError> {
        if cart.is_empty() {
            return Ok(ValidationOutcome::redirect(CheckoutRedirect::Cart));
        }
        Ok(ValidationOutcome::ok())
    }
}
