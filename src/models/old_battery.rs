use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document key for an old-battery aggregate. Names are matched
/// case-insensitively and surrounding whitespace is ignored.
pub fn stock_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Aggregated scrap inventory for one battery name, derived from collection
/// facts minus consumption facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldBatteryStock {
    /// Display name as first recorded (the document key is the lowercased
    /// form).
    pub name: String,
    pub total_weight: Decimal,
    pub total_quantity: i32,
    /// Blended rate: simple mean of existing and incoming rates, not a
    /// weighted mean. Compatibility behavior.
    pub rate_per_kg: Decimal,
    /// Per-unit weight captured at first collection so that display and
    /// search keep a sensible weight after quantity drains to zero.
    pub original_unit_weight: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl OldBatteryStock {
    pub fn key(&self) -> String {
        stock_key(&self.name)
    }
}

/// Immutable consumption fact, kept for audit and undo. Reversal flips the
/// flag rather than deleting the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldBatteryConsumption {
    pub id: Uuid,
    pub name: String,
    pub weight: Decimal,
    pub quantity: i32,
    /// The sale (or other document) this consumption is tied to.
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub reversed: bool,
    pub created_at: DateTime<Utc>,
}
