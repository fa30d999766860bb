use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::MovementType;

/// Async handle used by services to publish lifecycle events.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates an event channel pair with the given buffer capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Consumes and logs events; used when no real subscriber is wired up so
/// that senders never block on a full buffer.
pub fn spawn_drain(mut receiver: mpsc::Receiver<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            debug!(?event, "event drained");
        }
    })
}

// The events emitted by the ledger and lifecycle services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Sale lifecycle
    SaleCreated(Uuid),
    SaleUpdated(Uuid),
    SaleDeleted(Uuid),

    // Purchase lifecycle
    PurchaseCreated(Uuid),
    PurchaseUpdated(Uuid),
    PurchaseDeleted(Uuid),
    ProductCreated(Uuid),
    SupplierBalanceChanged {
        supplier_id: Uuid,
        balance: Decimal,
    },

    // Stock ledger
    StockMovementApplied {
        movement_id: Uuid,
        product_id: Uuid,
        movement_type: MovementType,
        quantity: i32,
        new_stock: i32,
    },
    StockReplayed {
        product_id: Uuid,
        cached: i32,
        replayed: i32,
        drifted: bool,
    },

    // Old-battery aggregate
    OldBatteryCollected {
        name: String,
        quantity: i32,
    },
    OldBatteryConsumed {
        consumption_id: Uuid,
        name: String,
        quantity: i32,
    },
    OldBatteryConsumptionReversed {
        consumption_id: Uuid,
        name: String,
    },

    // Payments
    PaymentAllocated {
        receipt_id: Uuid,
        customer_id: Uuid,
        amount: Decimal,
        sales_touched: usize,
    },
}
