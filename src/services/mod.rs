// Ledger core
pub mod invoice_sequencer;
pub mod old_battery_stock;
pub mod reconciliation;
pub mod stock_ledger;

// Lifecycle managers
pub mod purchases;
pub mod sales;

// Financial
pub mod payments;

pub(crate) mod item_diff;

use std::sync::Arc;

use crate::{config::AppConfig, events::EventSender, store::{DocumentStore, TenantStore}};

pub use invoice_sequencer::{InvoiceSequencer, InvoiceSeries};
pub use old_battery_stock::OldBatteryStockService;
pub use payments::PaymentService;
pub use purchases::PurchaseService;
pub use reconciliation::{ReconciliationReport, ReconciliationService};
pub use sales::SaleService;
pub use stock_ledger::StockLedgerService;

/// All services wired against one tenant store, for dependency injection
/// into callers (UI/report layers).
#[derive(Clone)]
pub struct AppServices {
    pub stock_ledger: Arc<StockLedgerService>,
    pub old_battery: Arc<OldBatteryStockService>,
    pub invoices: Arc<InvoiceSequencer>,
    pub sales: Arc<SaleService>,
    pub purchases: Arc<PurchaseService>,
    pub payments: Arc<PaymentService>,
    pub reconciliation: Arc<ReconciliationService>,
}

impl AppServices {
    pub fn build(
        store: Arc<dyn DocumentStore>,
        config: &AppConfig,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        let tenant_store = TenantStore::new(store, config.tenant_id.clone());

        let stock_ledger = Arc::new(StockLedgerService::new(
            tenant_store.clone(),
            event_sender.clone(),
            config.ledger.clone(),
        ));
        let old_battery = Arc::new(OldBatteryStockService::new(
            tenant_store.clone(),
            event_sender.clone(),
        ));
        let invoices = Arc::new(InvoiceSequencer::new(
            tenant_store.clone(),
            config.invoice.clone(),
        ));
        let sales = Arc::new(SaleService::new(
            tenant_store.clone(),
            stock_ledger.clone(),
            old_battery.clone(),
            invoices.clone(),
            event_sender.clone(),
        ));
        let purchases = Arc::new(PurchaseService::new(
            tenant_store.clone(),
            stock_ledger.clone(),
            event_sender.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            tenant_store.clone(),
            event_sender.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            tenant_store,
            event_sender,
            config.ledger.clone(),
        ));

        Self {
            stock_ledger,
            old_battery,
            invoices,
            sales,
            purchases,
            payments,
            reconciliation,
        }
    }
}
