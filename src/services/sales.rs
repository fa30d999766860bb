use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        MovementType, NewStockMovement, Sale, SaleDraft, SaleItem, SaleLineInput, SalePatch,
        SaleStatus,
    },
    services::invoice_sequencer::{InvoiceSequencer, InvoiceSeries},
    services::item_diff::diff_quantities,
    services::old_battery_stock::OldBatteryStockService,
    services::stock_ledger::StockLedgerService,
    store::{collections, TenantStore},
};

const REFERENCE_TYPE_SALE: &str = "sale";

/// Sale lifecycle manager.
///
/// Owns the create/update/delete orchestration for sale documents and emits
/// the stock-ledger and old-battery operations that keep cached stock in
/// step with the movement log. Only completed sales have stock effects. None of the multi-step
/// procedures here are atomic against the store; the fixed step order is
/// persist parent document first, then item-level side effects.
#[derive(Clone)]
pub struct SaleService {
    store: TenantStore,
    ledger: Arc<StockLedgerService>,
    old_battery: Arc<OldBatteryStockService>,
    sequencer: Arc<InvoiceSequencer>,
    event_sender: Option<Arc<EventSender>>,
}

impl SaleService {
    pub fn new(
        store: TenantStore,
        ledger: Arc<StockLedgerService>,
        old_battery: Arc<OldBatteryStockService>,
        sequencer: Arc<InvoiceSequencer>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            ledger,
            old_battery,
            sequencer,
            event_sender,
        }
    }

    /// Creates a sale. Stock and scrap effects apply only when the draft is
    /// already completed.
    #[instrument(skip(self, draft), fields(status = %draft.status, item_count = draft.items.len()))]
    pub async fn create_sale(&self, draft: SaleDraft) -> Result<Sale, ServiceError> {
        validate_lines(&draft.items)?;
        if draft.amount_paid < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "amount paid cannot be negative".to_string(),
            ));
        }

        let items: Vec<SaleItem> = draft.items.iter().map(SaleLineInput::resolve).collect();
        let has_scrap = items.iter().any(|i| i.scrap_trade_in.is_some());

        let invoice_number = match draft.invoice_number {
            Some(number) if !number.trim().is_empty() => number,
            _ => {
                let series = if has_scrap {
                    InvoiceSeries::OldBattery
                } else {
                    InvoiceSeries::Sale
                };
                self.sequencer.next(series).await?
            }
        };

        let now = Utc::now();
        let mut sale = Sale {
            id: Uuid::new_v4(),
            invoice_number,
            customer_id: draft.customer_id,
            status: draft.status,
            items,
            total_amount: Decimal::ZERO,
            discount: Decimal::ZERO,
            net_amount: Decimal::ZERO,
            amount_paid: draft.amount_paid,
            remaining_balance: Decimal::ZERO,
            sale_date: draft.sale_date.unwrap_or(now),
            created_at: now,
        };
        recompute_totals(&mut sale);

        self.store
            .save(collections::SALES, &sale.id.to_string(), &sale)
            .await?;

        if sale.status == SaleStatus::Completed {
            self.apply_full_effects(&mut sale).await?;
        }

        info!(sale_id = %sale.id, invoice = %sale.invoice_number, "sale created");
        self.emit(Event::SaleCreated(sale.id)).await;
        Ok(sale)
    }

    /// Updates a sale.
    ///
    /// When the sale stays completed and items are supplied, movements are
    /// emitted for the per-product quantity delta only, never the full new
    /// quantity. Transitions in and out of completed apply or reverse the
    /// full item effects.
    #[instrument(skip(self, patch), fields(sale_id = %sale_id))]
    pub async fn update_sale(&self, sale_id: Uuid, patch: SalePatch) -> Result<Sale, ServiceError> {
        let prior: Sale = self
            .store
            .load(collections::SALES, &sale_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {} not found", sale_id)))?;

        let items_supplied = patch.items.is_some();
        if let Some(lines) = &patch.items {
            validate_lines(lines)?;
        }

        let mut sale = prior.clone();
        if let Some(customer_id) = patch.customer_id {
            sale.customer_id = Some(customer_id);
        }
        if let Some(status) = patch.status {
            sale.status = status;
        }
        if let Some(sale_date) = patch.sale_date {
            sale.sale_date = sale_date;
        }
        if let Some(amount_paid) = patch.amount_paid {
            if amount_paid < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "amount paid cannot be negative".to_string(),
                ));
            }
            sale.amount_paid = amount_paid;
        }
        if let Some(lines) = &patch.items {
            sale.items = lines.iter().map(SaleLineInput::resolve).collect();
        }
        recompute_totals(&mut sale);

        self.store
            .save(collections::SALES, &sale.id.to_string(), &sale)
            .await?;

        match (prior.status, sale.status) {
            (SaleStatus::Completed, SaleStatus::Completed) if items_supplied => {
                self.reverse_consumptions(&prior.items).await?;
                self.apply_item_diff(&prior, &mut sale).await?;
                self.record_consumptions(&mut sale).await?;
                self.store
                    .save(collections::SALES, &sale.id.to_string(), &sale)
                    .await?;
            }
            (SaleStatus::Returned, SaleStatus::Completed) => {
                self.apply_full_effects(&mut sale).await?;
            }
            (SaleStatus::Completed, SaleStatus::Returned) => {
                self.reverse_full_effects(&prior).await?;
                for item in &mut sale.items {
                    if let Some(scrap) = &mut item.scrap_trade_in {
                        scrap.consumption_id = None;
                    }
                }
                self.store
                    .save(collections::SALES, &sale.id.to_string(), &sale)
                    .await?;
            }
            _ => {}
        }

        info!(sale_id = %sale.id, "sale updated");
        self.emit(Event::SaleUpdated(sale.id)).await;
        Ok(sale)
    }

    /// Deletes a sale, reversing its stock and scrap effects first when it
    /// was completed.
    #[instrument(skip(self), fields(sale_id = %sale_id))]
    pub async fn delete_sale(&self, sale_id: Uuid) -> Result<(), ServiceError> {
        let sale: Sale = self
            .store
            .load(collections::SALES, &sale_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("sale {} not found", sale_id)))?;

        if sale.status == SaleStatus::Completed {
            self.reverse_full_effects(&sale).await?;
        }

        self.store
            .delete(collections::SALES, &sale_id.to_string())
            .await?;

        info!(sale_id = %sale_id, invoice = %sale.invoice_number, "sale deleted");
        self.emit(Event::SaleDeleted(sale_id)).await;
        Ok(())
    }

    pub async fn get_sale(&self, sale_id: Uuid) -> Result<Option<Sale>, ServiceError> {
        Ok(self
            .store
            .load(collections::SALES, &sale_id.to_string())
            .await?)
    }

    /// All sales, oldest sale date first.
    pub async fn list_sales(&self) -> Result<Vec<Sale>, ServiceError> {
        let mut sales: Vec<Sale> = self.store.list_all(collections::SALES).await?;
        sales.sort_by_key(|s| (s.sale_date, s.created_at));
        Ok(sales)
    }

    pub async fn sales_for_customer(&self, customer_id: Uuid) -> Result<Vec<Sale>, ServiceError> {
        Ok(self
            .list_sales()
            .await?
            .into_iter()
            .filter(|s| s.customer_id == Some(customer_id))
            .collect())
    }

    /// Full forward effect: one sale movement per item plus scrap
    /// consumptions; updates consumption links on the document.
    async fn apply_full_effects(&self, sale: &mut Sale) -> Result<(), ServiceError> {
        for item in &sale.items {
            self.apply_movement(sale.id, item.product_id, MovementType::Sale, item.quantity)
                .await?;
        }
        self.record_consumptions(sale).await?;
        self.store
            .save(collections::SALES, &sale.id.to_string(), sale)
            .await?;
        Ok(())
    }

    /// Full reverse effect: one return movement per item, unconditionally,
    /// plus reversal of any linked scrap consumptions.
    async fn reverse_full_effects(&self, sale: &Sale) -> Result<(), ServiceError> {
        for item in &sale.items {
            self.apply_movement(
                sale.id,
                item.product_id,
                MovementType::ReturnSale,
                item.quantity,
            )
            .await?;
        }
        self.reverse_consumptions(&sale.items).await?;
        Ok(())
    }

    /// Delta-only movements for an edit that keeps the sale completed. This
    /// is what prevents double-application: the old quantity's effect is
    /// subtracted before the new one is counted.
    async fn apply_item_diff(&self, prior: &Sale, sale: &mut Sale) -> Result<(), ServiceError> {
        let deltas = diff_quantities(
            prior.items.iter().map(|i| (i.product_id, i.quantity)),
            sale.items.iter().map(|i| (i.product_id, i.quantity)),
        );
        for delta in deltas {
            if delta.delta > 0 {
                self.apply_movement(sale.id, delta.product_id, MovementType::Sale, delta.delta)
                    .await?;
            } else {
                self.apply_movement(
                    sale.id,
                    delta.product_id,
                    MovementType::ReturnSale,
                    -delta.delta,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Applies one movement, skipping items whose product no longer exists.
    /// A dangling reference must not abort the rest of the sale.
    async fn apply_movement(
        &self,
        sale_id: Uuid,
        product_id: Uuid,
        movement_type: MovementType,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let movement = NewStockMovement {
            product_id,
            movement_type,
            quantity,
            reference_id: Some(sale_id),
            reference_type: Some(REFERENCE_TYPE_SALE.to_string()),
            movement_date: Utc::now(),
        };
        match self.ledger.apply(movement).await {
            Ok(_) => Ok(()),
            Err(ServiceError::ReferenceNotFound(msg)) => {
                warn!(sale_id = %sale_id, product_id = %product_id, %msg, "skipping movement for missing product");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn record_consumptions(&self, sale: &mut Sale) -> Result<(), ServiceError> {
        let sale_id = sale.id;
        for item in &mut sale.items {
            let quantity = item.quantity;
            if let Some(scrap) = &mut item.scrap_trade_in {
                let consumption_id = self
                    .old_battery
                    .record_consumption(&scrap.name, scrap.weight, quantity, Some(sale_id))
                    .await?;
                scrap.consumption_id = Some(consumption_id);
            }
        }
        Ok(())
    }

    async fn reverse_consumptions(&self, items: &[SaleItem]) -> Result<(), ServiceError> {
        for item in items {
            if let Some(consumption_id) = item
                .scrap_trade_in
                .as_ref()
                .and_then(|scrap| scrap.consumption_id)
            {
                self.old_battery.reverse_consumption(consumption_id).await?;
            }
        }
        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send sale event");
            }
        }
    }
}

/// Recomputes the derived monetary fields from the item list:
/// `total_amount` is the gross item sum, `discount` is the per-item
/// discounts plus scrap deduction amounts, and
/// `remaining_balance = net_amount - amount_paid`.
fn recompute_totals(sale: &mut Sale) {
    let total_amount: Decimal = sale.items.iter().map(|i| i.total).sum();
    let item_discounts: Decimal = sale.items.iter().map(|i| i.discount).sum();
    let scrap_deductions: Decimal = sale
        .items
        .iter()
        .filter_map(|i| i.scrap_trade_in.as_ref())
        .map(|s| s.deduction_amount)
        .sum();

    sale.total_amount = total_amount;
    sale.discount = item_discounts + scrap_deductions;
    sale.net_amount = sale.total_amount - sale.discount;
    sale.remaining_balance = sale.net_amount - sale.amount_paid;
}

fn validate_lines(lines: &[SaleLineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a sale requires at least one item".to_string(),
        ));
    }
    for line in lines {
        if line.quantity() <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "item quantity must be positive, got {}",
                line.quantity()
            )));
        }
        if line.sale_price() < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "item price cannot be negative".to_string(),
            ));
        }
        if line.discount() < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "item discount cannot be negative".to_string(),
            ));
        }
        if let SaleLineInput::ScrapTradeIn { scrap, .. } = line {
            if scrap.name.trim().is_empty() {
                return Err(ServiceError::InvalidInput(
                    "scrap battery name is required".to_string(),
                ));
            }
            if scrap.weight <= Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "scrap weight must be positive".to_string(),
                ));
            }
            if scrap.deduction_amount < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "scrap deduction cannot be negative".to_string(),
                ));
            }
        }
    }
    Ok(())
}
