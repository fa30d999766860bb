use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
}

/// Canonical purchase line, resolved from [`PurchaseLineInput`] before any
/// ledger effect is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub trade_price: Decimal,
    pub total: Decimal,
}

/// Purchase line as submitted by callers. The `NewProduct` variant covers
/// inline product creation during purchase entry: the product document is
/// created first, then the line behaves like `Existing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseLineInput {
    Existing {
        product_id: Uuid,
        quantity: i32,
        trade_price: Decimal,
    },
    NewProduct {
        name: String,
        unit: String,
        trade_price: Decimal,
        sale_price: Decimal,
        #[serde(default)]
        min_stock: i32,
        quantity: i32,
    },
}

impl PurchaseLineInput {
    pub fn quantity(&self) -> i32 {
        match self {
            Self::Existing { quantity, .. } | Self::NewProduct { quantity, .. } => *quantity,
        }
    }

    pub fn trade_price(&self) -> Decimal {
        match self {
            Self::Existing { trade_price, .. } | Self::NewProduct { trade_price, .. } => {
                *trade_price
            }
        }
    }
}

/// A purchase document, symmetric to `Sale` on the additive side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub status: PurchaseStatus,
    pub items: Vec<PurchaseItem>,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub net_amount: Decimal,
    pub amount_paid: Decimal,
    pub remaining_balance: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDraft {
    pub supplier_id: Uuid,
    pub status: PurchaseStatus,
    pub items: Vec<PurchaseLineInput>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub purchase_date: Option<DateTime<Utc>>,
}

/// Partial update for a purchase; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasePatch {
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<PurchaseStatus>,
    #[serde(default)]
    pub items: Option<Vec<PurchaseLineInput>>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub amount_paid: Option<Decimal>,
    #[serde(default)]
    pub purchase_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn line_input_round_trips_tagged() {
        let line = PurchaseLineInput::NewProduct {
            name: "Osaka P-100".to_string(),
            unit: "pcs".to_string(),
            trade_price: dec!(8200),
            sale_price: dec!(9500),
            min_stock: 4,
            quantity: 10,
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["kind"], "new_product");
        let back: PurchaseLineInput = serde_json::from_value(value).unwrap();
        assert_eq!(back, line);
    }
}
