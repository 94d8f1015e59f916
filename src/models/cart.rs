use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::Address;
use super::shipping::ShippingOption;

/// A line in the shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Digital goods and services do not require shipping.
    pub requires_shipping: bool,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Durable customer preferences and the current checkout selections,
/// persisted through the customer repository.
///
/// Preferred values survive across orders and drive quick-checkout
/// defaulting; selected values belong to the checkout in progress and are
/// cleared when the order is placed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerAttributes {
    pub default_billing_address_id: Option<Uuid>,
    pub default_shipping_address_id: Option<Uuid>,
    pub preferred_payment_method: Option<String>,
    pub selected_payment_method: Option<String>,
    pub preferred_shipping_option: Option<ShippingOption>,
    pub selected_shipping_option: Option<ShippingOption>,
}

/// Customer aggregate: identity, saved addresses, persisted attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub attributes: CustomerAttributes,
}

impl Customer {
    /// Looks up a saved address by id; unknown ids are how foreign address
    /// submissions are rejected.
    pub fn address(&self, id: Uuid) -> Option<&Address> {
        self.addresses.iter().find(|a| a.id == id)
    }
}

/// The customer's cart plus the addresses assigned for the checkout in
/// progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub store_id: Uuid,
    pub customer: Customer,
    pub items: Vec<CartItem>,
    pub currency: String,
    pub billing_address: Option<Address>,
    pub shipping_address: Option<Address>,
}

impl ShoppingCart {
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Order total: subtotal plus the rate of the selected shipping option,
    /// when one is selected.
    pub fn total(&self) -> Decimal {
        let shipping = self
            .customer
            .attributes
            .selected_shipping_option
            .as_ref()
            .map(|o| o.rate)
            .unwrap_or_default();
        self.subtotal() + shipping
    }

    /// A cart requires shipping when any line does.
    pub fn requires_shipping(&self) -> bool {
        self.items.iter().any(|i| i.requires_shipping)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
