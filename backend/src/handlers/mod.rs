//! HTTP handlers for the item correction service

pub mod conversions;
pub mod corrections;
pub mod health;

pub use conversions::*;
pub use corrections::*;
pub use health::*;
