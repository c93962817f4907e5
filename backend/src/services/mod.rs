//! Correction services for the item correction service

pub mod bin_sync;
pub mod conversion;
pub mod gl_rebalance;
pub mod markers;
pub mod reclassification;
pub mod scope;
pub mod stock_ledger;

pub use conversion::ConversionService;
pub use gl_rebalance::GlRebalanceService;
pub use markers::MarkerService;
pub use reclassification::ReclassificationService;
pub use stock_ledger::StockLedgerService;
