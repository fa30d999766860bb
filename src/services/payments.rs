use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{PaymentAllocation, PaymentReceipt, Sale},
    store::{collections, TenantStore},
};

/// Oldest-debt-first payment allocator.
///
/// Distributes one customer payment across that customer's outstanding
/// sales, fully settling the earliest-dated sale before touching a later
/// one. The loop is a sequence of independent per-sale writes; a failure
/// mid-loop surfaces as `PartialWrite` and leaves earlier sales updated.
#[derive(Clone)]
pub struct PaymentService {
    store: TenantStore,
    event_sender: Option<Arc<EventSender>>,
}

impl PaymentService {
    pub fn new(store: TenantStore, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Total outstanding debt for a customer, derived by summing
    /// `remaining_balance` across their sales. Never cached.
    pub async fn outstanding_balance(&self, customer_id: Uuid) -> Result<Decimal, ServiceError> {
        Ok(self
            .outstanding_sales(customer_id)
            .await?
            .iter()
            .map(|s| s.remaining_balance)
            .sum())
    }

    /// Allocates a payment. Precondition: `0 < amount <= outstanding`,
    /// validated before any write; the full amount is therefore always
    /// consumed and no sale's balance goes negative.
    #[instrument(skip(self), fields(customer_id = %customer_id, %amount))]
    pub async fn allocate(
        &self,
        customer_id: Uuid,
        amount: Decimal,
    ) -> Result<PaymentReceipt, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidPaymentAmount(format!(
                "payment must be positive, got {}",
                amount
            )));
        }

        let mut sales = self.outstanding_sales(customer_id).await?;
        let outstanding: Decimal = sales.iter().map(|s| s.remaining_balance).sum();
        if amount > outstanding {
            return Err(ServiceError::InvalidPaymentAmount(format!(
                "payment {} exceeds outstanding balance {}",
                amount, outstanding
            )));
        }

        // Oldest debt first; creation time breaks same-day ties.
        sales.sort_by_key(|s| (s.sale_date, s.created_at));

        let mut pool = amount;
        let mut allocations = Vec::new();
        for sale in &mut sales {
            if pool == Decimal::ZERO {
                break;
            }
            let applied = pool.min(sale.remaining_balance);
            sale.amount_paid += applied;
            sale.remaining_balance -= applied;
            pool -= applied;

            self.store
                .merge(
                    collections::SALES,
                    &sale.id.to_string(),
                    json!({
                        "amountPaid": sale.amount_paid,
                        "remainingBalance": sale.remaining_balance,
                    }),
                )
                .await
                .map_err(|e| {
                    ServiceError::PartialWrite(format!(
                        "allocation stopped at sale {}: {} (applied so far: {})",
                        sale.id,
                        e,
                        amount - pool - applied
                    ))
                })?;

            allocations.push(PaymentAllocation {
                sale_id: sale.id,
                invoice_number: sale.invoice_number.clone(),
                applied,
            });
        }

        let receipt = PaymentReceipt {
            id: Uuid::new_v4(),
            customer_id,
            amount,
            allocations,
            created_at: Utc::now(),
        };
        self.store
            .save(collections::PAYMENTS, &receipt.id.to_string(), &receipt)
            .await?;

        info!(
            receipt_id = %receipt.id,
            sales_touched = receipt.allocations.len(),
            "payment allocated"
        );
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::PaymentAllocated {
                    receipt_id: receipt.id,
                    customer_id,
                    amount,
                    sales_touched: receipt.allocations.len(),
                })
                .await
            {
                warn!(error = %e, "failed to send payment event");
            }
        }

        Ok(receipt)
    }

    async fn outstanding_sales(&self, customer_id: Uuid) -> Result<Vec<Sale>, ServiceError> {
        let sales: Vec<Sale> = self.store.list_all(collections::SALES).await?;
        Ok(sales
            .into_iter()
            .filter(|s| {
                s.customer_id == Some(customer_id) && s.remaining_balance > Decimal::ZERO
            })
            .collect())
    }
}
