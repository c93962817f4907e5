//! Stock ledger entry models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::receipt::ReceiptLine;
use crate::error::RecordError;
use crate::types::{DocStatus, PostingMoment, VoucherType};

/// A stock ledger entry to be inserted for a receipt line that never got one.
///
/// Running aggregates start at zero and are filled in by the revaluation scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStockLedgerEntry {
    pub item_code: String,
    pub warehouse: String,
    pub posting: PostingMoment,
    pub actual_qty: Decimal,
    pub incoming_rate: Decimal,
    pub outgoing_rate: Decimal,
    pub voucher_type: VoucherType,
    pub voucher_no: String,
    pub voucher_detail_no: String,
    pub company: String,
    pub stock_uom: Option<String>,
    pub batch_no: Option<String>,
    pub serial_no: Option<String>,
    pub business_category: Option<String>,
    pub branch: Option<String>,
    pub project: Option<String>,
    pub fiscal_year: Option<String>,
    pub owner: String,
    pub docstatus: DocStatus,
}

impl NewStockLedgerEntry {
    /// Build the ledger entry a submitted receipt line should have produced
    pub fn from_receipt_line(line: &ReceiptLine) -> Result<Self, RecordError> {
        if line.item_code.trim().is_empty() {
            return Err(RecordError::MissingField { field: "item_code" });
        }
        if line.warehouse.trim().is_empty() {
            return Err(RecordError::MissingField { field: "warehouse" });
        }
        if line.conversion_factor <= Decimal::ZERO {
            return Err(RecordError::NonPositive {
                field: "conversion_factor",
                value: line.conversion_factor,
            });
        }
        if line.valuation_rate < Decimal::ZERO {
            return Err(RecordError::NegativeAmount {
                field: "valuation_rate",
                value: line.valuation_rate,
            });
        }

        Ok(Self {
            item_code: line.item_code.clone(),
            warehouse: line.warehouse.clone(),
            posting: line.posting(),
            actual_qty: line.stock_qty(),
            incoming_rate: line.valuation_rate,
            outgoing_rate: Decimal::ZERO,
            voucher_type: VoucherType::PurchaseReceipt,
            voucher_no: line.voucher_no.clone(),
            voucher_detail_no: line.name.clone(),
            company: line.company.clone(),
            stock_uom: line.stock_uom.clone(),
            batch_no: line.batch_no.clone(),
            serial_no: line.serial_no.clone(),
            business_category: line.business_category.clone(),
            branch: line.branch.clone(),
            project: line.project.clone(),
            fiscal_year: line.fiscal_year.clone(),
            owner: line.owner.clone(),
            docstatus: line.docstatus,
        })
    }
}

/// One quantity movement on an item+warehouse timeline, as read back for revaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerMovement {
    pub name: String,
    pub posting: PostingMoment,
    pub actual_qty: Decimal,
    pub incoming_rate: Decimal,
}

/// Running aggregates written back onto a stock ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunningValuation {
    pub name: String,
    pub qty_after_transaction: Decimal,
    pub valuation_rate: Decimal,
    pub stock_value: Decimal,
    pub stock_value_difference: Decimal,
}
