use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Direction-carrying movement classification.
///
/// Purchase, sale-return and transfer-in add to stock; sale, purchase-return
/// and transfer-out subtract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Sale,
    ReturnPurchase,
    ReturnSale,
    TransferIn,
    TransferOut,
}

impl MovementType {
    pub fn is_additive(&self) -> bool {
        matches!(
            self,
            MovementType::Purchase | MovementType::ReturnSale | MovementType::TransferIn
        )
    }

    /// The movement's quantity with its sign applied.
    pub fn signed(&self, quantity: i32) -> i32 {
        if self.is_additive() {
            quantity
        } else {
            -quantity
        }
    }
}

/// An immutable stock-movement fact. Never mutated; an incorrect movement is
/// superseded by emitting a compensating movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    /// Unsigned; direction comes from `movement_type`.
    pub quantity: i32,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub movement_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn signed_quantity(&self) -> i32 {
        self.movement_type.signed(self.quantity)
    }
}

/// Input for [`StockMovement`]; the ledger assigns id and creation time.
#[derive(Debug, Clone)]
pub struct NewStockMovement {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub movement_date: DateTime<Utc>,
}
