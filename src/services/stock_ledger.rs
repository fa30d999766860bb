use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::LedgerPolicy,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{NewStockMovement, Product, StockMovement},
    store::{collections, TenantStore},
};

/// Applies one movement to a cached stock level under the configured policy.
///
/// Additive movements always add. Subtractive movements clamp at zero when
/// `clamp_negative_stock` is on: the system does not block sales that exceed
/// stock, it clamps.
pub(crate) fn apply_delta(
    policy: &LedgerPolicy,
    stock: i32,
    movement_type: crate::models::MovementType,
    quantity: i32,
) -> i32 {
    if movement_type.is_additive() {
        stock + quantity
    } else if policy.clamp_negative_stock {
        (stock - quantity).max(0)
    } else {
        stock - quantity
    }
}

/// The stock-movement ledger.
///
/// `current_stock` on the product document is a derived cache: the signed
/// sum of every movement referencing the product. `apply` writes the
/// immutable movement fact first, then updates the cache; if the second step
/// fails the result is a `PartialWrite` and the recovery path is replay
/// (`ReconciliationService`).
#[derive(Clone)]
pub struct StockLedgerService {
    store: TenantStore,
    event_sender: Option<Arc<EventSender>>,
    policy: LedgerPolicy,
}

impl StockLedgerService {
    pub fn new(
        store: TenantStore,
        event_sender: Option<Arc<EventSender>>,
        policy: LedgerPolicy,
    ) -> Self {
        Self {
            store,
            event_sender,
            policy,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Records a movement fact and updates the product's cached stock.
    #[instrument(skip(self), fields(product_id = %new_movement.product_id, movement_type = %new_movement.movement_type, quantity = new_movement.quantity))]
    pub async fn apply(&self, new_movement: NewStockMovement) -> Result<StockMovement, ServiceError> {
        if new_movement.quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "movement quantity must be positive, got {}",
                new_movement.quantity
            )));
        }

        let product_id = new_movement.product_id;
        let product: Product = self
            .store
            .load(collections::PRODUCTS, &product_id.to_string())
            .await?
            .ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!("product {} does not exist", product_id))
            })?;

        let movement = StockMovement {
            id: Uuid::new_v4(),
            product_id,
            movement_type: new_movement.movement_type,
            quantity: new_movement.quantity,
            reference_id: new_movement.reference_id,
            reference_type: new_movement.reference_type,
            movement_date: new_movement.movement_date,
            created_at: Utc::now(),
        };

        self.store
            .save(collections::STOCK_MOVEMENTS, &movement.id.to_string(), &movement)
            .await?;

        let new_stock = apply_delta(
            &self.policy,
            product.current_stock,
            movement.movement_type,
            movement.quantity,
        );

        // The movement fact is durable at this point; a failure here leaves
        // the cache stale until replayed.
        self.store
            .merge(
                collections::PRODUCTS,
                &product_id.to_string(),
                json!({ "currentStock": new_stock }),
            )
            .await
            .map_err(|e| {
                ServiceError::PartialWrite(format!(
                    "movement {} recorded but stock cache update failed for product {}: {}",
                    movement.id, product_id, e
                ))
            })?;

        info!(
            movement_id = %movement.id,
            old_stock = product.current_stock,
            new_stock,
            "stock movement applied"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::StockMovementApplied {
                    movement_id: movement.id,
                    product_id,
                    movement_type: movement.movement_type,
                    quantity: movement.quantity,
                    new_stock,
                })
                .await
            {
                warn!(error = %e, movement_id = %movement.id, "failed to send stock movement event");
            }
        }

        Ok(movement)
    }

    /// Current cached stock for a product.
    #[instrument(skip(self))]
    pub async fn current_stock(&self, product_id: Uuid) -> Result<i32, ServiceError> {
        let product: Product = self
            .store
            .load(collections::PRODUCTS, &product_id.to_string())
            .await?
            .ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!("product {} does not exist", product_id))
            })?;
        Ok(product.current_stock)
    }

    /// All movements for one product, oldest first.
    pub async fn movements_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<StockMovement>, ServiceError> {
        let mut movements: Vec<StockMovement> = self
            .store
            .list_all(collections::STOCK_MOVEMENTS)
            .await?
            .into_iter()
            .filter(|m: &StockMovement| m.product_id == product_id)
            .collect();
        movements.sort_by_key(|m| m.created_at);
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovementType;
    use crate::store::InMemoryDocumentStore;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn policy(clamp: bool) -> LedgerPolicy {
        LedgerPolicy {
            clamp_negative_stock: clamp,
            diff_supplier_balance_on_edit: false,
        }
    }

    #[rstest::rstest]
    #[case(MovementType::Purchase, 14)]
    #[case(MovementType::ReturnSale, 14)]
    #[case(MovementType::TransferIn, 14)]
    #[case(MovementType::Sale, 6)]
    #[case(MovementType::ReturnPurchase, 6)]
    #[case(MovementType::TransferOut, 6)]
    fn delta_adds_and_subtracts(#[case] movement_type: MovementType, #[case] expected: i32) {
        assert_eq!(apply_delta(&policy(true), 10, movement_type, 4), expected);
    }

    #[test]
    fn delta_clamps_at_zero_when_policy_on() {
        assert_eq!(apply_delta(&policy(true), 3, MovementType::Sale, 10), 0);
        assert_eq!(apply_delta(&policy(false), 3, MovementType::Sale, 10), -7);
    }

    async fn seed_product(store: &TenantStore, stock: i32) -> Uuid {
        let product = Product {
            id: Uuid::new_v4(),
            name: "AGS GR-50".to_string(),
            unit: "pcs".to_string(),
            trade_price: dec!(9500),
            sale_price: dec!(11000),
            current_stock: stock,
            min_stock: 2,
            created_at: Utc::now(),
        };
        store
            .save(collections::PRODUCTS, &product.id.to_string(), &product)
            .await
            .unwrap();
        product.id
    }

    fn ledger(store: &TenantStore) -> StockLedgerService {
        StockLedgerService::new(store.clone(), None, policy(true))
    }

    fn movement(product_id: Uuid, movement_type: MovementType, quantity: i32) -> NewStockMovement {
        NewStockMovement {
            product_id,
            movement_type,
            quantity,
            reference_id: None,
            reference_type: None,
            movement_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn apply_writes_fact_and_updates_cache() {
        let store = TenantStore::new(Arc::new(InMemoryDocumentStore::new()), "t");
        let ledger = ledger(&store);
        let product_id = seed_product(&store, 100).await;

        ledger
            .apply(movement(product_id, MovementType::Sale, 10))
            .await
            .unwrap();

        assert_eq!(ledger.current_stock(product_id).await.unwrap(), 90);
        let movements = ledger.movements_for_product(product_id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].signed_quantity(), -10);
    }

    #[tokio::test]
    async fn apply_rejects_unknown_product() {
        let store = TenantStore::new(Arc::new(InMemoryDocumentStore::new()), "t");
        let ledger = ledger(&store);

        let err = ledger
            .apply(movement(Uuid::new_v4(), MovementType::Sale, 1))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ReferenceNotFound(_));
    }

    #[tokio::test]
    async fn apply_rejects_non_positive_quantity() {
        let store = TenantStore::new(Arc::new(InMemoryDocumentStore::new()), "t");
        let ledger = ledger(&store);
        let product_id = seed_product(&store, 5).await;

        let err = ledger
            .apply(movement(product_id, MovementType::Sale, 0))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidInput(_));
    }

    #[tokio::test]
    async fn oversell_clamps_to_zero() {
        let store = TenantStore::new(Arc::new(InMemoryDocumentStore::new()), "t");
        let ledger = ledger(&store);
        let product_id = seed_product(&store, 3).await;

        ledger
            .apply(movement(product_id, MovementType::Sale, 10))
            .await
            .unwrap();
        assert_eq!(ledger.current_stock(product_id).await.unwrap(), 0);
    }
}
