//! Domain errors raised while building correction records

use rust_decimal::Decimal;
use thiserror::Error;

/// A typed record could not be built from its source row
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{field} must not be empty")]
    MissingField { field: &'static str },

    #[error("{field} must not be negative (got {value})")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("{field} must be positive (got {value})")]
    NonPositive { field: &'static str, value: Decimal },

    #[error("{field} is out of range")]
    Overflow { field: &'static str },

    #[error("a GL leg cannot carry both a debit and a credit")]
    DebitAndCredit,
}

/// A voucher's GL legs cannot be rebalanced safely
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RebalanceError {
    #[error("voucher {voucher_no}: only one side of the asset posting exists ({present})")]
    IncompleteAssetPosting { voucher_no: String, present: String },

    #[error("voucher {voucher_no}: no '{account}' leg to move the amount from")]
    MissingAssetLeg { voucher_no: String, account: String },

    #[error("voucher {voucher_no}: change set is unbalanced by {difference}")]
    UnbalancedChange { voucher_no: String, difference: Decimal },

    #[error(transparent)]
    Record(#[from] RecordError),
}
