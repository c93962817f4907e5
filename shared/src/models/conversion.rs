//! Asset-to-stock conversion requests, idempotency markers and step outcomes

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{DocStatus, VoucherType};

/// Which correction an idempotency marker records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionKind {
    ItemReclassification,
    PurchaseReceipt,
    PurchaseInvoice,
}

impl CorrectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionKind::ItemReclassification => "item_reclassification",
            CorrectionKind::PurchaseReceipt => "purchase_receipt",
            CorrectionKind::PurchaseInvoice => "purchase_invoice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "item_reclassification" => Some(CorrectionKind::ItemReclassification),
            "purchase_receipt" => Some(CorrectionKind::PurchaseReceipt),
            "purchase_invoice" => Some(CorrectionKind::PurchaseInvoice),
            _ => None,
        }
    }
}

impl From<VoucherType> for CorrectionKind {
    fn from(voucher_type: VoucherType) -> Self {
        match voucher_type {
            VoucherType::PurchaseReceipt => CorrectionKind::PurchaseReceipt,
            VoucherType::PurchaseInvoice => CorrectionKind::PurchaseInvoice,
        }
    }
}

/// Identifying tuple of an idempotency marker.
///
/// Item reclassification is keyed on the item alone, so category and account
/// are empty for that kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    pub item_code: String,
    pub kind: CorrectionKind,
    pub asset_category: String,
    pub asset_account: String,
}

impl MarkerKey {
    pub fn item(item_code: &str) -> Self {
        Self {
            item_code: item_code.to_string(),
            kind: CorrectionKind::ItemReclassification,
            asset_category: String::new(),
            asset_account: String::new(),
        }
    }

    pub fn voucher(target: &AssetTarget, voucher_type: VoucherType) -> Self {
        Self {
            item_code: target.item_code.clone(),
            kind: voucher_type.into(),
            asset_category: target.asset_category.clone(),
            asset_account: target.asset_account.clone(),
        }
    }
}

/// Item plus the asset category and asset account its GL legs were posted under
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct AssetTarget {
    #[serde(alias = "item_name")]
    #[validate(length(min = 1, max = 140, message = "item code is required"))]
    pub item_code: String,
    #[validate(length(min = 1, max = 140, message = "asset category is required"))]
    pub asset_category: String,
    #[validate(length(min = 1, max = 140, message = "asset account is required"))]
    pub asset_account: String,
}

/// Input for the GL correction endpoints; the item comes from the path
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssetAccountInput {
    #[validate(length(min = 1, max = 140, message = "asset category is required"))]
    pub asset_category: String,
    #[validate(length(min = 1, max = 140, message = "asset account is required"))]
    pub asset_account: String,
}

/// Successful result of a correction step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum StepOutcome<R> {
    /// The marker already existed; nothing was touched
    AlreadyProcessed,
    Completed(R),
}

impl<R> StepOutcome<R> {
    pub fn is_already_processed(&self) -> bool {
        matches!(self, StepOutcome::AlreadyProcessed)
    }

    pub fn report(&self) -> Option<&R> {
        match self {
            StepOutcome::AlreadyProcessed => None,
            StepOutcome::Completed(report) => Some(report),
        }
    }
}

/// Counts from the item reclassification step
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReclassificationReport {
    pub item_code: String,
    pub purchase_order_lines_updated: u64,
    pub assets_removed: u64,
    pub asset_rows_removed: u64,
    pub journal_legs_removed: u64,
    pub journal_entries_removed: u64,
    pub ledger_entries_created: u64,
    pub ledger_entries_revalued: u64,
    pub bins_created: u64,
}

/// Counts from one GL rebalancing step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RebalanceReport {
    pub voucher_type: VoucherType,
    pub vouchers: u64,
    pub lines: u64,
    pub legs_created: u64,
    pub legs_adjusted: u64,
}

/// Per-warehouse result of a stand-alone revaluation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WarehouseRevaluation {
    pub warehouse: String,
    pub entries: u64,
    pub qty_after_transaction: rust_decimal::Decimal,
    pub stock_value: rust_decimal::Decimal,
}

/// Status of one step as shown in a conversion summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    AlreadyProcessed,
    Succeeded { detail: String },
    Failed { reason: String },
    /// Not run because an earlier step failed
    Skipped { reason: String },
}

impl StepStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::AlreadyProcessed => write!(f, "Already processed."),
            StepStatus::Succeeded { detail } => write!(f, "Done. {}", detail),
            StepStatus::Failed { reason } => write!(f, "Failed: {}", reason),
            StepStatus::Skipped { reason } => write!(f, "Skipped: {}", reason),
        }
    }
}

impl std::fmt::Display for ReclassificationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} assets removed, {} journal entries removed, {} ledger entries created, {} bins created",
            self.assets_removed,
            self.journal_entries_removed,
            self.ledger_entries_created,
            self.bins_created
        )
    }
}

impl std::fmt::Display for RebalanceReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} vouchers rebalanced ({} legs created, {} adjusted)",
            self.vouchers, self.voucher_type, self.legs_created, self.legs_adjusted
        )
    }
}

/// Combined result of submitting a conversion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionSummary {
    pub item_conversion: StepStatus,
    pub receipt_gl: StepStatus,
    pub invoice_gl: StepStatus,
}

impl ConversionSummary {
    /// Summary of a run stopped by a failed item conversion. The GL steps
    /// never ran, so no asset amounts were moved.
    pub fn item_failed(item_conversion: StepStatus) -> Self {
        let skipped = || StepStatus::Skipped {
            reason: "item conversion failed".to_string(),
        };
        Self {
            item_conversion,
            receipt_gl: skipped(),
            invoice_gl: skipped(),
        }
    }

    /// Submitted once every step succeeded or was already done; otherwise
    /// the request stays a draft and can be submitted again.
    pub fn resulting_docstatus(&self) -> DocStatus {
        if self.has_failures() {
            DocStatus::Draft
        } else {
            DocStatus::Submitted
        }
    }

    pub fn has_failures(&self) -> bool {
        self.item_conversion.is_failed() || self.receipt_gl.is_failed() || self.invoice_gl.is_failed()
    }

    /// One line per step, in execution order
    pub fn message(&self) -> String {
        format!(
            "Item Conversion: {}\nPurchase Receipt GL Updates: {}\nPurchase Invoice GL Updates: {}",
            self.item_conversion, self.receipt_gl, self.invoice_gl
        )
    }
}
