//! Purchase receipt and invoice line models read by the corrections

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DocStatus, PostingMoment};

/// A receipt line joined with its parent receipt header.
///
/// This is the source of both synthesized stock ledger entries and lazily
/// created bins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    /// Line identifier (`voucher_detail_no` on the ledger entry)
    pub name: String,
    /// Parent receipt (`voucher_no` on the ledger entry)
    pub voucher_no: String,
    pub item_code: String,
    pub warehouse: String,
    pub qty: Decimal,
    pub conversion_factor: Decimal,
    pub valuation_rate: Decimal,
    pub stock_uom: Option<String>,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub posting_date: NaiveDate,
    pub posting_time: NaiveTime,
    pub owner: String,
    pub company: String,
    pub business_category: Option<String>,
    pub branch: Option<String>,
    pub project: Option<String>,
    pub fiscal_year: Option<String>,
    pub docstatus: DocStatus,
}

impl ReceiptLine {
    /// Quantity in stock UOM
    pub fn stock_qty(&self) -> Decimal {
        self.qty * self.conversion_factor
    }

    /// Value of the line at its valuation rate
    pub fn stock_value(&self) -> Decimal {
        self.stock_qty() * self.valuation_rate
    }

    pub fn posting(&self) -> PostingMoment {
        PostingMoment::new(self.posting_date, self.posting_time)
    }
}

/// Monetary amount of a voucher line in the two currencies the ERP keeps
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineAmount {
    /// Amount in the voucher's transaction currency
    pub amount: Decimal,
    /// Amount in the company currency
    pub base_amount: Decimal,
}

impl LineAmount {
    /// Build from nullable columns: missing amount is zero, missing base amount
    /// falls back to the transaction amount.
    pub fn from_columns(amount: Option<Decimal>, base_amount: Option<Decimal>) -> Self {
        let amount = amount.unwrap_or(Decimal::ZERO);
        Self {
            amount,
            base_amount: base_amount.unwrap_or(amount),
        }
    }
}

/// A purchase receipt or invoice line that has GL legs to rebalance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherLine {
    pub voucher_no: String,
    pub item_code: String,
    pub amount: LineAmount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn base_amount_falls_back_to_transaction_amount() {
        let amount = LineAmount::from_columns(Some(dec("250.00")), None);
        assert_eq!(amount.base_amount, dec("250.00"));

        let missing = LineAmount::from_columns(None, None);
        assert_eq!(missing.amount, Decimal::ZERO);
        assert_eq!(missing.base_amount, Decimal::ZERO);
    }

    #[test]
    fn stock_qty_applies_conversion_factor() {
        let line = ReceiptLine {
            name: "PRI-0001".into(),
            voucher_no: "PR-0001".into(),
            item_code: "Laptop-A".into(),
            warehouse: "Stores - AOGC".into(),
            qty: dec("2"),
            conversion_factor: dec("12"),
            valuation_rate: dec("5"),
            stock_uom: Some("Nos".into()),
            batch_no: None,
            serial_no: None,
            posting_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            posting_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            owner: "admin@example.com".into(),
            company: "AOGC".into(),
            business_category: None,
            branch: None,
            project: None,
            fiscal_year: Some("2024".into()),
            docstatus: DocStatus::Submitted,
        };

        assert_eq!(line.stock_qty(), dec("24"));
        assert_eq!(line.stock_value(), dec("120"));
    }
}
