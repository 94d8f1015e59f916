use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Separator inside the composite option key submitted by the
/// shipping-method step: `"<shippingMethodId>___<providerSystemName>"`.
const OPTION_KEY_SEPARATOR: &str = "___";

/// A shipping option computed by a rate provider and offered to the
/// customer. Cached per checkout session since rate computation is
/// expensive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingOption {
    pub shipping_method_id: i32,
    /// Identity of the rate computation provider that produced the option.
    pub provider_system_name: String,
    pub name: String,
    pub rate: Decimal,
}

impl ShippingOption {
    pub fn new(
        shipping_method_id: i32,
        provider_system_name: impl Into<String>,
        name: impl Into<String>,
        rate: Decimal,
    ) -> Self {
        Self {
            shipping_method_id,
            provider_system_name: provider_system_name.into(),
            name: name.into(),
            rate,
        }
    }

    /// Wire key identifying this option in a step submission.
    pub fn composite_key(&self) -> String {
        format!(
            "{}{}{}",
            self.shipping_method_id, OPTION_KEY_SEPARATOR, self.provider_system_name
        )
    }

    /// Parses a submitted composite key. Requires exactly two non-empty
    /// parts with a numeric method id.
    pub fn parse_composite_key(raw: &str) -> Option<(i32, String)> {
        let mut parts = raw.split(OPTION_KEY_SEPARATOR);
        let id = parts.next()?.parse::<i32>().ok()?;
        let provider = parts.next()?;
        if provider.is_empty() || parts.next().is_some() {
            return None;
        }
        Some((id, provider.to_string()))
    }
}
