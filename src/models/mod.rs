pub mod old_battery;
pub mod party;
pub mod payment;
pub mod product;
pub mod purchase;
pub mod sale;
pub mod stock_movement;

pub use old_battery::{stock_key, OldBatteryConsumption, OldBatteryStock};
pub use party::{Customer, Supplier};
pub use payment::{PaymentAllocation, PaymentReceipt};
pub use product::Product;
pub use purchase::{Purchase, PurchaseDraft, PurchaseItem, PurchaseLineInput, PurchasePatch, PurchaseStatus};
pub use sale::{Sale, SaleDraft, SaleItem, SaleLineInput, SalePatch, SaleStatus, ScrapTradeIn, ScrapTradeInInput};
pub use stock_movement::{MovementType, NewStockMovement, StockMovement};
