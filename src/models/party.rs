use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A customer. No stored balance: customer debt is always derived by summing
/// `remaining_balance` across the customer's sales, never cached redundantly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A supplier with a running payable balance, mutated only by the purchase
/// lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    #[validate(length(min = 1, message = "Supplier name is required"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}
