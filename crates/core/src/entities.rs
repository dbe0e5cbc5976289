use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{Validate, ValidationErrors};

/// A tenant of the platform, owned by a single authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Promotional banner shown on storefront pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Billboard {
    pub id: String,
    pub store_id: String,
    pub label: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub store_id: String,
    pub billboard_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalogue item. Archived products are hidden from the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub store_id: String,
    pub category_id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_featured: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub store_id: String,
    pub is_paid: bool,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
}

/// Row of the dashboard's orders table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: String,
    pub is_paid: bool,
    pub phone: String,
    pub address: String,
    pub products: Vec<String>,
    pub total_price_cents: i64,
    pub total_price: String,
    pub created_at: DateTime<Utc>,
}

/// Renders an amount in cents as a US dollar string, e.g. `$1,234.50`.
pub fn format_usd(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (index, digit) in dollars.chars().enumerate() {
        if index > 0 && (dollars.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInput {
    #[serde(default)]
    pub name: String,
}

impl Validate for StoreInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("name", "Name", &self.name);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillboardInput {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub image_url: String,
}

impl Validate for BillboardInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("label", "Label", &self.label);
        errors.require("imageUrl", "Image URL", &self.image_url);
        errors.into_result()
    }
}

impl From<&Billboard> for BillboardInput {
    fn from(value: &Billboard) -> Self {
        Self {
            label: value.label.clone(),
            image_url: value.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub billboard_id: String,
}

impl Validate for CategoryInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("name", "Name", &self.name);
        errors.require("billboardId", "Billboard id", &self.billboard_id);
        errors.into_result()
    }
}

impl From<&Category> for CategoryInput {
    fn from(value: &Category) -> Self {
        Self {
            name: value.name.clone(),
            billboard_id: value.billboard_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_archived: bool,
}

impl Validate for ProductInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.require("name", "Name", &self.name);
        if self.price_cents <= 0 {
            errors.push("priceCents", "Price must be greater than zero");
        }
        errors.require("categoryId", "Category id", &self.category_id);
        errors.into_result()
    }
}

impl From<&Product> for ProductInput {
    fn from(value: &Product) -> Self {
        Self {
            name: value.name.clone(),
            price_cents: value.price_cents,
            category_id: value.category_id.clone(),
            is_featured: value.is_featured,
            is_archived: value.is_archived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billboard_requires_label_and_image() {
        let err = BillboardInput::default()
            .validate()
            .expect_err("empty billboard rejected");
        assert_eq!(err.message_for("label"), Some("Label is required"));
        assert_eq!(err.message_for("imageUrl"), Some("Image URL is required"));
    }

    #[test]
    fn product_rejects_non_positive_price() {
        let input = ProductInput {
            name: "Lamp".to_string(),
            price_cents: 0,
            category_id: "cat-1".to_string(),
            ..ProductInput::default()
        };
        let err = input.validate().expect_err("zero price rejected");
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["priceCents"]);
    }

    #[test]
    fn inputs_use_camel_case_on_the_wire() {
        let input: CategoryInput =
            serde_json::from_str(r#"{"name":"Shoes","billboardId":"bb-1"}"#).expect("json");
        assert_eq!(input.billboard_id, "bb-1");
        assert!(input.validate().is_ok());
    }

    #[test]
    fn formats_usd_with_grouping() {
        assert_eq!(format_usd(0), "$0.00");
        assert_eq!(format_usd(1999), "$19.99");
        assert_eq!(format_usd(123_456_705), "$1,234,567.05");
        assert_eq!(format_usd(-250), "-$2.50");
    }
}
