//! Domain models for the item correction service

mod bin;
mod conversion;
mod gl_entry;
mod item;
mod receipt;
mod stock_ledger;

pub use bin::*;
pub use conversion::*;
pub use gl_entry::*;
pub use item::*;
pub use receipt::*;
pub use stock_ledger::*;
