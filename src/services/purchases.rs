use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        MovementType, NewStockMovement, Product, Purchase, PurchaseDraft, PurchaseItem,
        PurchaseLineInput, PurchasePatch, PurchaseStatus, Supplier,
    },
    services::item_diff::diff_quantities,
    services::stock_ledger::StockLedgerService,
    store::{collections, TenantStore},
};

const REFERENCE_TYPE_PURCHASE: &str = "purchase";

/// Purchase lifecycle manager, the additive mirror of the sale manager.
///
/// Completed saves add stock and add the purchase's net amount to the
/// supplier balance. By default the balance contribution is NOT diffed on
/// edits: every completed save re-adds the full net amount, exactly as the
/// system this engine replaces behaved. `diff_supplier_balance_on_edit`
/// switches to diffed contributions.
#[derive(Clone)]
pub struct PurchaseService {
    store: TenantStore,
    ledger: Arc<StockLedgerService>,
    event_sender: Option<Arc<EventSender>>,
}

impl PurchaseService {
    pub fn new(
        store: TenantStore,
        ledger: Arc<StockLedgerService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            ledger,
            event_sender,
        }
    }

    #[instrument(skip(self, draft), fields(supplier_id = %draft.supplier_id, status = %draft.status, item_count = draft.items.len()))]
    pub async fn create_purchase(&self, draft: PurchaseDraft) -> Result<Purchase, ServiceError> {
        validate_lines(&draft.items)?;
        if draft.discount < Decimal::ZERO || draft.amount_paid < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "discount and amount paid cannot be negative".to_string(),
            ));
        }

        let items = self.resolve_lines(&draft.items).await?;
        let now = Utc::now();
        let mut purchase = Purchase {
            id: Uuid::new_v4(),
            supplier_id: draft.supplier_id,
            status: draft.status,
            items,
            total_amount: Decimal::ZERO,
            discount: draft.discount,
            net_amount: Decimal::ZERO,
            amount_paid: draft.amount_paid,
            remaining_balance: Decimal::ZERO,
            purchase_date: draft.purchase_date.unwrap_or(now),
            created_at: now,
        };
        recompute_totals(&mut purchase);

        self.store
            .save(collections::PURCHASES, &purchase.id.to_string(), &purchase)
            .await?;

        if purchase.status == PurchaseStatus::Completed {
            self.apply_movements_full(&purchase, MovementType::Purchase)
                .await?;
            self.adjust_supplier_balance(purchase.supplier_id, purchase.net_amount)
                .await?;
        }

        info!(purchase_id = %purchase.id, "purchase created");
        self.emit(Event::PurchaseCreated(purchase.id)).await;
        Ok(purchase)
    }

    #[instrument(skip(self, patch), fields(purchase_id = %purchase_id))]
    pub async fn update_purchase(
        &self,
        purchase_id: Uuid,
        patch: PurchasePatch,
    ) -> Result<Purchase, ServiceError> {
        let prior: Purchase = self
            .store
            .load(collections::PURCHASES, &purchase_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase {} not found", purchase_id)))?;

        let items_supplied = patch.items.is_some();
        if let Some(lines) = &patch.items {
            validate_lines(lines)?;
        }

        let mut purchase = prior.clone();
        if let Some(supplier_id) = patch.supplier_id {
            purchase.supplier_id = supplier_id;
        }
        if let Some(status) = patch.status {
            purchase.status = status;
        }
        if let Some(purchase_date) = patch.purchase_date {
            purchase.purchase_date = purchase_date;
        }
        if let Some(discount) = patch.discount {
            if discount < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "discount cannot be negative".to_string(),
                ));
            }
            purchase.discount = discount;
        }
        if let Some(amount_paid) = patch.amount_paid {
            if amount_paid < Decimal::ZERO {
                return Err(ServiceError::InvalidInput(
                    "amount paid cannot be negative".to_string(),
                ));
            }
            purchase.amount_paid = amount_paid;
        }
        if let Some(lines) = &patch.items {
            purchase.items = self.resolve_lines(lines).await?;
        }
        recompute_totals(&mut purchase);

        self.store
            .save(collections::PURCHASES, &purchase.id.to_string(), &purchase)
            .await?;

        match (prior.status, purchase.status) {
            (PurchaseStatus::Completed, PurchaseStatus::Completed) => {
                if items_supplied {
                    self.apply_item_diff(&prior, &purchase).await?;
                }
                let contribution = if self.ledger.policy().diff_supplier_balance_on_edit {
                    purchase.net_amount - prior.net_amount
                } else {
                    // Observed behavior: every completed save re-adds the
                    // full net amount.
                    purchase.net_amount
                };
                self.adjust_supplier_balance(purchase.supplier_id, contribution)
                    .await?;
            }
            (PurchaseStatus::Pending, PurchaseStatus::Completed) => {
                self.apply_movements_full(&purchase, MovementType::Purchase)
                    .await?;
                self.adjust_supplier_balance(purchase.supplier_id, purchase.net_amount)
                    .await?;
            }
            (PurchaseStatus::Completed, PurchaseStatus::Pending) => {
                self.apply_movements_full(&prior, MovementType::ReturnPurchase)
                    .await?;
                self.adjust_supplier_balance(prior.supplier_id, -prior.net_amount)
                    .await?;
            }
            (PurchaseStatus::Pending, PurchaseStatus::Pending) => {}
        }

        info!(purchase_id = %purchase.id, "purchase updated");
        self.emit(Event::PurchaseUpdated(purchase.id)).await;
        Ok(purchase)
    }

    /// Deletes a purchase, reversing stock and supplier-balance effects
    /// first when it was completed.
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn delete_purchase(&self, purchase_id: Uuid) -> Result<(), ServiceError> {
        let purchase: Purchase = self
            .store
            .load(collections::PURCHASES, &purchase_id.to_string())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase {} not found", purchase_id)))?;

        if purchase.status == PurchaseStatus::Completed {
            self.apply_movements_full(&purchase, MovementType::ReturnPurchase)
                .await?;
            self.adjust_supplier_balance(purchase.supplier_id, -purchase.net_amount)
                .await?;
        }

        self.store
            .delete(collections::PURCHASES, &purchase_id.to_string())
            .await?;

        info!(purchase_id = %purchase_id, "purchase deleted");
        self.emit(Event::PurchaseDeleted(purchase_id)).await;
        Ok(())
    }

    pub async fn get_purchase(&self, purchase_id: Uuid) -> Result<Option<Purchase>, ServiceError> {
        Ok(self
            .store
            .load(collections::PURCHASES, &purchase_id.to_string())
            .await?)
    }

    pub async fn list_purchases(&self) -> Result<Vec<Purchase>, ServiceError> {
        let mut purchases: Vec<Purchase> = self.store.list_all(collections::PURCHASES).await?;
        purchases.sort_by_key(|p| (p.purchase_date, p.created_at));
        Ok(purchases)
    }

    /// Resolves input lines into canonical items, creating product documents
    /// for `NewProduct` lines before any ledger effect is computed.
    async fn resolve_lines(
        &self,
        lines: &[PurchaseLineInput],
    ) -> Result<Vec<PurchaseItem>, ServiceError> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product_id = match line {
                PurchaseLineInput::Existing { product_id, .. } => *product_id,
                PurchaseLineInput::NewProduct {
                    name,
                    unit,
                    trade_price,
                    sale_price,
                    min_stock,
                    ..
                } => {
                    let product = Product {
                        id: Uuid::new_v4(),
                        name: name.clone(),
                        unit: unit.clone(),
                        trade_price: *trade_price,
                        sale_price: *sale_price,
                        current_stock: 0,
                        min_stock: *min_stock,
                        created_at: Utc::now(),
                    };
                    self.store
                        .save(collections::PRODUCTS, &product.id.to_string(), &product)
                        .await?;
                    info!(product_id = %product.id, name = %product.name, "product created inline from purchase line");
                    self.emit(Event::ProductCreated(product.id)).await;
                    product.id
                }
            };
            items.push(PurchaseItem {
                product_id,
                quantity: line.quantity(),
                trade_price: line.trade_price(),
                total: line.trade_price() * Decimal::from(line.quantity()),
            });
        }
        Ok(items)
    }

    async fn apply_movements_full(
        &self,
        purchase: &Purchase,
        movement_type: MovementType,
    ) -> Result<(), ServiceError> {
        for item in &purchase.items {
            self.apply_movement(purchase.id, item.product_id, movement_type, item.quantity)
                .await?;
        }
        Ok(())
    }

    async fn apply_item_diff(
        &self,
        prior: &Purchase,
        purchase: &Purchase,
    ) -> Result<(), ServiceError> {
        let deltas = diff_quantities(
            prior.items.iter().map(|i| (i.product_id, i.quantity)),
            purchase.items.iter().map(|i| (i.product_id, i.quantity)),
        );
        for delta in deltas {
            if delta.delta > 0 {
                self.apply_movement(
                    purchase.id,
                    delta.product_id,
                    MovementType::Purchase,
                    delta.delta,
                )
                .await?;
            } else {
                self.apply_movement(
                    purchase.id,
                    delta.product_id,
                    MovementType::ReturnPurchase,
                    -delta.delta,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn apply_movement(
        &self,
        purchase_id: Uuid,
        product_id: Uuid,
        movement_type: MovementType,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let movement = NewStockMovement {
            product_id,
            movement_type,
            quantity,
            reference_id: Some(purchase_id),
            reference_type: Some(REFERENCE_TYPE_PURCHASE.to_string()),
            movement_date: Utc::now(),
        };
        match self.ledger.apply(movement).await {
            Ok(_) => Ok(()),
            Err(ServiceError::ReferenceNotFound(msg)) => {
                warn!(purchase_id = %purchase_id, product_id = %product_id, %msg, "skipping movement for missing product");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Adds `delta` to the supplier's running balance. A missing supplier is
    /// skipped with a warning, like missing products in item application.
    async fn adjust_supplier_balance(
        &self,
        supplier_id: Uuid,
        delta: Decimal,
    ) -> Result<(), ServiceError> {
        if delta == Decimal::ZERO {
            return Ok(());
        }
        let supplier: Option<Supplier> = self
            .store
            .load(collections::SUPPLIERS, &supplier_id.to_string())
            .await?;
        let Some(supplier) = supplier else {
            warn!(supplier_id = %supplier_id, "skipping balance update for missing supplier");
            return Ok(());
        };

        let balance = supplier.balance + delta;
        self.store
            .merge(
                collections::SUPPLIERS,
                &supplier_id.to_string(),
                json!({ "balance": balance }),
            )
            .await
            .map_err(|e| {
                ServiceError::PartialWrite(format!(
                    "purchase committed but supplier {} balance update failed: {}",
                    supplier_id, e
                ))
            })?;

        self.emit(Event::SupplierBalanceChanged {
            supplier_id,
            balance,
        })
        .await;
        Ok(())
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send purchase event");
            }
        }
    }
}

fn recompute_totals(purchase: &mut Purchase) {
    purchase.total_amount = purchase.items.iter().map(|i| i.total).sum();
    purchase.net_amount = purchase.total_amount - purchase.discount;
    purchase.remaining_balance = purchase.net_amount - purchase.amount_paid;
}

fn validate_lines(lines: &[PurchaseLineInput]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a purchase requires at least one item".to_string(),
        ));
    }
    for line in lines {
        if line.quantity() <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "item quantity must be positive, got {}",
                line.quantity()
            )));
        }
        if line.trade_price() < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "trade price cannot be negative".to_string(),
            ));
        }
        if let PurchaseLineInput::NewProduct { name, .. } = line {
            if name.trim().is_empty() {
                return Err(ServiceError::InvalidInput(
                    "new product name is required".to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_subtract_discount_and_paid_amount() {
        let mut purchase = Purchase {
            id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            status: PurchaseStatus::Completed,
            items: vec![PurchaseItem {
                product_id: Uuid::new_v4(),
                quantity: 10,
                trade_price: dec!(800),
                total: dec!(8000),
            }],
            total_amount: dec!(0),
            discount: dec!(500),
            net_amount: dec!(0),
            amount_paid: dec!(3000),
            remaining_balance: dec!(0),
            purchase_date: Utc::now(),
            created_at: Utc::now(),
        };
        recompute_totals(&mut purchase);
        assert_eq!(purchase.total_amount, dec!(8000));
        assert_eq!(purchase.net_amount, dec!(7500));
        assert_eq!(purchase.remaining_balance, dec!(4500));
    }

    #[test]
    fn empty_lines_are_invalid() {
        assert!(matches!(
            validate_lines(&[]),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn unnamed_new_product_is_invalid() {
        let line = PurchaseLineInput::NewProduct {
            name: "  ".to_string(),
            unit: "pcs".to_string(),
            trade_price: dec!(100),
            sale_price: dec!(120),
            min_stock: 0,
            quantity: 5,
        };
        assert!(matches!(
            validate_lines(&[line]),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
