use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One slice of a payment applied to a single sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAllocation {
    pub sale_id: Uuid,
    pub invoice_number: String,
    pub applied: Decimal,
}

/// Durable record of one allocation run: which sales a customer payment was
/// distributed across, oldest debt first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub allocations: Vec<PaymentAllocation>,
    pub created_at: DateTime<Utc>,
}
