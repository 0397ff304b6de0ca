pub mod ledger;
pub mod service;

pub use ledger::StockLedger;
pub use service::{InventoryService, StockLevel, StockRequest};
