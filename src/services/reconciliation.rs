use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::LedgerPolicy,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Product, StockMovement},
    services::stock_ledger::apply_delta,
    store::{collections, TenantStore},
};

/// Outcome of replaying one product's movement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub product_id: Uuid,
    pub cached: i32,
    pub replayed: i32,
    pub drifted: bool,
}

/// Maintenance API that turns silent stock-cache drift into an observable,
/// fixable condition.
///
/// `current_stock` is a cache of the signed movement sum; a partial write
/// anywhere in a lifecycle operation can leave it stale. Replay folds the
/// product's movements from zero with the same clamped arithmetic the live
/// ledger uses, so an untouched history reproduces the cached value exactly.
#[derive(Clone)]
pub struct ReconciliationService {
    store: TenantStore,
    event_sender: Option<Arc<EventSender>>,
    policy: LedgerPolicy,
}

impl ReconciliationService {
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

    /// Replays one product and repairs its cached stock when drifted.
    #[instrument(skip(self))]
    pub async fn replay_product(
        &self,
        product_id: Uuid,
    ) -> Result<ReconciliationReport, ServiceError> {
        let product: Product = self
            .store
            .load(collections::PRODUCTS, &product_id.to_string())
            .await?
            .ok_or_else(|| {
                ServiceError::ReferenceNotFound(format!("product {} does not exist", product_id))
            })?;

        let mut movements: Vec<StockMovement> = self
            .store
            .list_all(collections::STOCK_MOVEMENTS)
            .await?
            .into_iter()
            .filter(|m: &StockMovement| m.product_id == product_id)
            .collect();
        movements.sort_by_key(|m| m.created_at);

        let replayed = movements.iter().fold(0i32, |stock, movement| {
            apply_delta(&self.policy, stock, movement.movement_type, movement.quantity)
        });

        let drifted = replayed != product.current_stock;
        if drifted {
            warn!(
                product_id = %product_id,
                cached = product.current_stock,
                replayed,
                "stock cache drift detected, repairing"
            );
            self.store
                .merge(
                    collections::PRODUCTS,
                    &product_id.to_string(),
                    json!({ "currentStock": replayed }),
                )
                .await?;
        } else {
            info!(product_id = %product_id, stock = replayed, "stock cache verified");
        }

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::StockReplayed {
                    product_id,
                    cached: product.current_stock,
                    replayed,
                    drifted,
                })
                .await
            {
                warn!(error = %e, "failed to send replay event");
            }
        }

        Ok(ReconciliationReport {
            product_id,
            cached: product.current_stock,
            replayed,
            drifted,
        })
    }

    /// Replays every product; the repair pass for "retry the whole
    /// operation" recoveries.
    #[instrument(skip(self))]
    pub async fn replay_all(&self) -> Result<Vec<ReconciliationReport>, ServiceError> {
        let products: Vec<Product> = self.store.list_all(collections::PRODUCTS).await?;
        let mut reports = Vec::with_capacity(products.len());
        for product in products {
            reports.push(self.replay_product(product.id).await?);
        }
        Ok(reports)
    }
}
