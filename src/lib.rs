//! voltstock
//!
//! Inventory ledger and transaction reconciliation core for a battery
//! retail application: the stock-movement ledger, the sale/purchase
//! lifecycle managers and their stock side effects, the old-battery
//! scrap-stock aggregator, the oldest-debt-first payment allocator, and
//! the invoice-number sequencer. Persistence is delegated to a narrow
//! document-store gateway; UI, auth and printing live elsewhere.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

pub use config::AppConfig;
pub use errors::ServiceError;
pub use services::AppServices;
pub use store::{DocumentStore, InMemoryDocumentStore};

/// Application state handed to callers: the gateway, configuration, the
/// event channel and the wired services.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: AppConfig,
    pub event_sender: Option<Arc<events::EventSender>>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: AppConfig,
        event_sender: Option<Arc<events::EventSender>>,
    ) -> Self {
        let services = AppServices::build(store.clone(), &config, event_sender.clone());
        Self {
            store,
            config,
            event_sender,
            services,
        }
    }
}
