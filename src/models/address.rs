use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Country reference carried by an address. Whether the country accepts
/// shipments decides if the address may be used as a shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    pub allows_shipping: bool,
}

impl Country {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            allows_shipping: true,
        }
    }

    pub fn without_shipping(mut self) -> Self {
        self.allows_shipping = false;
        self
    }
}

/// A customer address, usable as billing and/or shipping address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub address_line_1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: Country,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// An address qualifies for shipping use only when its country accepts
    /// shipments.
    pub fn allows_shipping(&self) -> bool {
        self.country.allows_shipping
    }
}
