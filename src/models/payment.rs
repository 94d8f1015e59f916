use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::cart::ShoppingCart;

/// Raw submitted form payload for a checkout step. Multi-valued fields are
/// preserved as posted (hidden-checkbox pairs submit two values).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut form = Self::new();
        for (key, value) in pairs {
            form.append(key, value);
        }
        form
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(key.into()).or_default().push(value.into());
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values(key).first().map(String::as_str)
    }

    /// Checkbox semantics: any posted `true`/`on` value counts as checked.
    pub fn is_truthy(&self, key: &str) -> bool {
        self.values(key).iter().any(|v| v == "true" || v == "on")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Payment request handed to the order-placement service. Assembled by the
/// payment step (via the provider) or freshly from the cart by the confirm
/// step when no cached request exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessPaymentRequest {
    pub customer_id: Uuid,
    pub store_id: Uuid,
    pub payment_method_system_name: String,
    pub order_total: Decimal,
    pub currency: String,
    /// Extra metadata attached straight from the confirm form (customer
    /// comment, newsletter opt-in, consent flags).
    #[serde(default)]
    pub custom_values: HashMap<String, String>,
}

impl ProcessPaymentRequest {
    pub fn for_cart(cart: &ShoppingCart) -> Self {
        Self {
            customer_id: cart.customer.id,
            store_id: cart.store_id,
            payment_method_system_name: cart
                .customer
                .attributes
                .selected_payment_method
                .clone()
                .unwrap_or_default(),
            order_total: cart.total(),
            currency: cart.currency.clone(),
            custom_values: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_data_first_and_values() {
        let form = FormData::from_pairs([("a", "1"), ("a", "2"), ("b", "x")]);
        assert_eq!(form.first("a"), Some("1"));
        assert_eq!(form.values("a").len(), 2);
        assert_eq!(form.first("missing"), None);
        assert!(form.values("missing").is_empty());
    }

    #[test]
    fn is_truthy_handles_checkbox_pairs() {
        let form = FormData::from_pairs([("opt_in", "true"), ("opt_in", "false")]);
        assert!(form.is_truthy("opt_in"));

        let unchecked = FormData::from_pairs([("opt_in", "false")]);
        assert!(!unchecked.is_truthy("opt_in"));
    }
}
