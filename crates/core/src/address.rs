use serde::{Deserialize, Serialize};

/// Shipping address as collected by the hosted checkout page.
///
/// Every component is optional; the provider sends `null` for fields the
/// customer left blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl ShippingAddress {
    /// Components in display order.
    pub fn components(&self) -> [Option<&str>; 6] {
        [
            self.line1.as_deref(),
            self.line2.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
    }
}

/// Joins the address into a single display line, skipping absent and empty parts.
pub fn format_address(address: &ShippingAddress) -> String {
    join_components(address.components())
}

/// Comma-joins the present, non-empty components in field order.
pub fn join_components<'a, I>(components: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    components
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
