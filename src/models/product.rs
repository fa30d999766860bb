use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A sellable product.
///
/// `current_stock` is a derived value: the signed sum of all stock movements
/// referencing the product, cached here by the stock ledger. Nothing besides
/// the ledger (and the reconciliation replay) writes it after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    pub unit: String,
    pub trade_price: Decimal,
    pub sale_price: Decimal,
    /// Derived; non-negative by policy, not hard-enforced.
    #[serde(default)]
    pub current_stock: i32,
    #[serde(default)]
    pub min_stock: i32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock
    }
}
