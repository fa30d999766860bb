use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{stock_key, OldBatteryConsumption, OldBatteryStock},
    store::{collections, TenantStore},
};

/// Old-battery scrap-stock aggregator.
///
/// One aggregate document per battery name (case-insensitive key), derived
/// from collection events minus consumption events. Consumption that would
/// drive the available quantity negative is rejected before any write.
#[derive(Clone)]
pub struct OldBatteryStockService {
    store: TenantStore,
    event_sender: Option<Arc<EventSender>>,
}

impl OldBatteryStockService {
    pub fn new(store: TenantStore, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Adds a scrap collection to the named aggregate.
    ///
    /// The blended rate is the arithmetic mean of the existing and incoming
    /// rate, not a weighted mean; this matches the data the engine
    /// interoperates with.
    #[instrument(skip(self))]
    pub async fn record_collection(
        &self,
        name: &str,
        weight: Decimal,
        rate_per_kg: Decimal,
        quantity: i32,
    ) -> Result<OldBatteryStock, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "battery name is required".to_string(),
            ));
        }
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "collection quantity must be positive, got {}",
                quantity
            )));
        }
        if weight <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "collection weight must be positive".to_string(),
            ));
        }

        let key = stock_key(name);
        let existing: Option<OldBatteryStock> =
            self.store.load(collections::OLD_BATTERIES, &key).await?;

        let stock = match existing {
            Some(mut stock) => {
                stock.total_weight += weight;
                stock.total_quantity += quantity;
                stock.rate_per_kg = (stock.rate_per_kg + rate_per_kg) / Decimal::TWO;
                if stock.original_unit_weight <= Decimal::ZERO {
                    stock.original_unit_weight = weight / Decimal::from(quantity);
                }
                stock.updated_at = Utc::now();
                stock
            }
            None => OldBatteryStock {
                name: name.trim().to_string(),
                total_weight: weight,
                total_quantity: quantity,
                rate_per_kg,
                original_unit_weight: weight / Decimal::from(quantity),
                updated_at: Utc::now(),
            },
        };

        self.store
            .save(collections::OLD_BATTERIES, &key, &stock)
            .await?;

        info!(name = %stock.name, quantity = stock.total_quantity, "old-battery collection recorded");
        self.emit(Event::OldBatteryCollected {
            name: stock.name.clone(),
            quantity,
        })
        .await;

        Ok(stock)
    }

    /// Consumes from the named aggregate.
    ///
    /// Fails with `InsufficientStock` before any write when the requested
    /// quantity exceeds what is available. On success the immutable
    /// consumption fact is stored first, then the aggregate is decremented.
    #[instrument(skip(self))]
    pub async fn record_consumption(
        &self,
        name: &str,
        weight: Decimal,
        quantity: i32,
        reference_id: Option<Uuid>,
    ) -> Result<Uuid, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "consumption quantity must be positive, got {}",
                quantity
            )));
        }

        let key = stock_key(name);
        let mut stock: OldBatteryStock = self
            .store
            .load(collections::OLD_BATTERIES, &key)
            .await?
            .ok_or_else(|| {
                ServiceError::InsufficientStock(format!("no scrap stock recorded for {}", name))
            })?;

        if quantity > stock.total_quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "requested {} of {} but only {} available",
                quantity, stock.name, stock.total_quantity
            )));
        }

        let fact = OldBatteryConsumption {
            id: Uuid::new_v4(),
            name: stock.name.clone(),
            weight,
            quantity,
            reference_id,
            reversed: false,
            created_at: Utc::now(),
        };
        self.store
            .save(
                collections::OLD_BATTERY_CONSUMPTIONS,
                &fact.id.to_string(),
                &fact,
            )
            .await?;

        stock.total_quantity -= quantity;
        stock.total_weight = (stock.total_weight - weight).max(Decimal::ZERO);
        stock.updated_at = Utc::now();
        self.store
            .save(collections::OLD_BATTERIES, &key, &stock)
            .await
            .map_err(|e| {
                ServiceError::PartialWrite(format!(
                    "consumption {} recorded but aggregate update failed for {}: {}",
                    fact.id, stock.name, e
                ))
            })?;

        info!(name = %stock.name, consumption_id = %fact.id, remaining = stock.total_quantity, "old-battery consumption recorded");
        self.emit(Event::OldBatteryConsumed {
            consumption_id: fact.id,
            name: stock.name.clone(),
            quantity,
        })
        .await;

        Ok(fact.id)
    }

    /// Re-adds a previously consumed quantity/weight. Used when the sale
    /// referencing the consumption is edited or deleted. Idempotent for
    /// facts already reversed.
    #[instrument(skip(self))]
    pub async fn reverse_consumption(&self, consumption_id: Uuid) -> Result<(), ServiceError> {
        let mut fact: OldBatteryConsumption = self
            .store
            .load(
                collections::OLD_BATTERY_CONSUMPTIONS,
                &consumption_id.to_string(),
            )
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("consumption fact {} not found", consumption_id))
            })?;

        if fact.reversed {
            return Ok(());
        }

        let key = stock_key(&fact.name);
        let stock = match self
            .store
            .load::<OldBatteryStock>(collections::OLD_BATTERIES, &key)
            .await?
        {
            Some(mut stock) => {
                stock.total_quantity += fact.quantity;
                stock.total_weight += fact.weight;
                stock.updated_at = Utc::now();
                stock
            }
            // Aggregate document missing (e.g. cleaned up at zero); rebuild
            // it from the fact being reversed.
            None => OldBatteryStock {
                name: fact.name.clone(),
                total_weight: fact.weight,
                total_quantity: fact.quantity,
                rate_per_kg: Decimal::ZERO,
                original_unit_weight: fact.weight / Decimal::from(fact.quantity.max(1)),
                updated_at: Utc::now(),
            },
        };

        self.store
            .save(collections::OLD_BATTERIES, &key, &stock)
            .await?;

        fact.reversed = true;
        self.store
            .save(
                collections::OLD_BATTERY_CONSUMPTIONS,
                &consumption_id.to_string(),
                &fact,
            )
            .await
            .map_err(|e| {
                ServiceError::PartialWrite(format!(
                    "aggregate restored but consumption {} could not be flagged reversed: {}",
                    consumption_id, e
                ))
            })?;

        info!(name = %fact.name, consumption_id = %consumption_id, "old-battery consumption reversed");
        self.emit(Event::OldBatteryConsumptionReversed {
            consumption_id,
            name: fact.name.clone(),
        })
        .await;

        Ok(())
    }

    /// Every aggregate, sorted by name.
    pub async fn list(&self) -> Result<Vec<OldBatteryStock>, ServiceError> {
        let mut stocks: Vec<OldBatteryStock> =
            self.store.list_all(collections::OLD_BATTERIES).await?;
        stocks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stocks)
    }

    pub async fn available_quantity(&self, name: &str) -> Result<i32, ServiceError> {
        let stock: Option<OldBatteryStock> = self
            .store
            .load(collections::OLD_BATTERIES, &stock_key(name))
            .await?;
        Ok(stock.map(|s| s.total_quantity).unwrap_or(0))
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send old-battery event");
            }
        }
    }
}
