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
pub enum SaleStatus {
    Completed,
    Returned,
}

/// Scrap-battery consumption carried by a sale item, 1:1.
///
/// `consumption_id` links to the immutable consumption fact once the sale
/// has been completed; reversing that fact is how edits and deletions undo
/// the scrap effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapTradeIn {
    pub name: String,
    pub weight: Decimal,
    pub rate_per_kg: Decimal,
    pub deduction_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption_id: Option<Uuid>,
}

/// Canonical sale line, resolved from [`SaleLineInput`] before any ledger
/// effect is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub sale_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    /// Gross line total (`quantity * sale_price`); discounts are aggregated
    /// at the sale level.
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrap_trade_in: Option<ScrapTradeIn>,
}

/// Scrap data as supplied by the caller; no fact id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapTradeInInput {
    pub name: String,
    pub weight: Decimal,
    pub rate_per_kg: Decimal,
    pub deduction_amount: Decimal,
}

/// Sale line as submitted by callers. A tagged union instead of an optional
/// blob: a line either moves product stock only, or additionally consumes
/// from the old-battery aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SaleLineInput {
    Regular {
        product_id: Uuid,
        quantity: i32,
        sale_price: Decimal,
        #[serde(default)]
        discount: Decimal,
    },
    ScrapTradeIn {
        product_id: Uuid,
        quantity: i32,
        sale_price: Decimal,
        #[serde(default)]
        discount: Decimal,
        scrap: ScrapTradeInInput,
    },
}

impl SaleLineInput {
    pub fn product_id(&self) -> Uuid {
        match self {
            Self::Regular { product_id, .. } | Self::ScrapTradeIn { product_id, .. } => *product_id,
        }
    }

    pub fn quantity(&self) -> i32 {
        match self {
            Self::Regular { quantity, .. } | Self::ScrapTradeIn { quantity, .. } => *quantity,
        }
    }

    pub fn sale_price(&self) -> Decimal {
        match self {
            Self::Regular { sale_price, .. } | Self::ScrapTradeIn { sale_price, .. } => *sale_price,
        }
    }

    pub fn discount(&self) -> Decimal {
        match self {
            Self::Regular { discount, .. } | Self::ScrapTradeIn { discount, .. } => *discount,
        }
    }

    /// Resolves the input into a canonical [`SaleItem`].
    pub fn resolve(&self) -> SaleItem {
        let scrap_trade_in = match self {
            Self::Regular { .. } => None,
            Self::ScrapTradeIn { scrap, .. } => Some(ScrapTradeIn {
                name: scrap.name.clone(),
                weight: scrap.weight,
                rate_per_kg: scrap.rate_per_kg,
                deduction_amount: scrap.deduction_amount,
                consumption_id: None,
            }),
        };
        SaleItem {
            product_id: self.product_id(),
            quantity: self.quantity(),
            sale_price: self.sale_price(),
            discount: self.discount(),
            total: self.sale_price() * Decimal::from(self.quantity()),
            scrap_trade_in,
        }
    }
}

/// A sale document. Monetary fields are all derived at write time:
/// `net_amount = total_amount - discount`,
/// `remaining_balance = net_amount - amount_paid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Option<Uuid>,
    pub status: SaleStatus,
    pub items: Vec<SaleItem>,
    pub total_amount: Decimal,
    pub discount: Decimal,
    pub net_amount: Decimal,
    pub amount_paid: Decimal,
    pub remaining_balance: Decimal,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a sale. The invoice number is sequenced when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDraft {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub status: SaleStatus,
    pub items: Vec<SaleLineInput>,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub sale_date: Option<DateTime<Utc>>,
}

/// Partial update for a sale; `None` fields are left untouched. Supplying
/// `items` is what triggers the item-diff against the prior document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalePatch {
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub items: Option<Vec<SaleLineInput>>,
    #[serde(default)]
    pub amount_paid: Option<Decimal>,
    #[serde(default)]
    pub sale_date: Option<DateTime<Utc>>,
}
