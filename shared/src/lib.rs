//! Shared types and models for the item correction service
//!
//! This crate holds the I/O-free part of the corrections: typed records,
//! the moving-average revaluation, the GL rebalancing planner and name
//! validation. The backend and the WASM preview module both build on it.

pub mod error;
pub mod models;
pub mod rebalance;
pub mod types;
pub mod validation;
pub mod valuation;

pub use error::*;
pub use models::*;
pub use rebalance::*;
pub use types::*;
pub use validation::*;
pub use valuation::*;
