//! Common types used across the correction service

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Document status as stored by the ERP (`docstatus` column)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

impl DocStatus {
    pub fn as_i16(&self) -> i16 {
        match self {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(DocStatus::Draft),
            1 => Some(DocStatus::Submitted),
            2 => Some(DocStatus::Cancelled),
            _ => None,
        }
    }
}

/// Posting date and time of a voucher. Ordering is chronological.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostingMoment {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl PostingMoment {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// The kind of source voucher whose GL legs get rebalanced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VoucherType {
    PurchaseReceipt,
    PurchaseInvoice,
}

impl VoucherType {
    /// Name as written into `voucher_type` columns
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherType::PurchaseReceipt => "Purchase Receipt",
            VoucherType::PurchaseInvoice => "Purchase Invoice",
        }
    }
}

impl std::fmt::Display for VoucherType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
