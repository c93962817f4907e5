//! Conversion request tests
//!
//! Tests for the request-level behavior including:
//! - Step summaries and the message shown to the operator
//! - Request input validation
//! - Correction account validation

use shared::{
    validate_asset_account, validate_ledger_accounts, AssetTarget, ConversionSummary, CorrectionKind, DocStatus,
    LedgerAccounts, MarkerKey, RebalanceReport, ReclassificationReport, StepOutcome, StepStatus,
    VoucherType,
};
use validator::Validate;

fn target(item_code: &str, category: &str, account: &str) -> AssetTarget {
    AssetTarget {
        item_code: item_code.into(),
        asset_category: category.into(),
        asset_account: account.into(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A fully successful run lists every step as done
    #[test]
    fn test_summary_all_steps_done() {
        let report = ReclassificationReport {
            item_code: "Laptop-A".into(),
            assets_removed: 2,
            journal_entries_removed: 1,
            ledger_entries_created: 3,
            bins_created: 1,
            ..Default::default()
        };
        let summary = ConversionSummary {
            item_conversion: StepStatus::Succeeded {
                detail: report.to_string(),
            },
            receipt_gl: StepStatus::AlreadyProcessed,
            invoice_gl: StepStatus::Succeeded {
                detail: RebalanceReport {
                    voucher_type: VoucherType::PurchaseInvoice,
                    vouchers: 1,
                    lines: 1,
                    legs_created: 1,
                    legs_adjusted: 1,
                }
                .to_string(),
            },
        };

        assert!(!summary.has_failures());
        let message = summary.message();
        assert!(message.contains("Item Conversion: Done. 2 assets removed"));
        assert!(message.contains("Purchase Receipt GL Updates: Already processed."));
        assert!(message.contains("1 Purchase Invoice vouchers rebalanced"));
    }

    /// A failed item step leaves the GL untouched and the request a draft
    #[test]
    fn test_failed_item_step_skips_gl_and_stays_draft() {
        let summary = ConversionSummary::item_failed(StepStatus::Failed {
            reason: "Item Laptop-A not found".into(),
        });
        assert!(matches!(summary.receipt_gl, StepStatus::Skipped { .. }));
        assert!(matches!(summary.invoice_gl, StepStatus::Skipped { .. }));
        assert_eq!(summary.resulting_docstatus(), DocStatus::Draft);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["receipt_gl"]["status"], "skipped");
        assert_eq!(json["invoice_gl"]["reason"], "item conversion failed");
    }

    /// The stored summary round-trips through its JSON column form
    #[test]
    fn test_summary_json_shape() {
        let summary = ConversionSummary {
            item_conversion: StepStatus::AlreadyProcessed,
            receipt_gl: StepStatus::Failed {
                reason: "voucher PR-0001: no leg".into(),
            },
            invoice_gl: StepStatus::Succeeded {
                detail: "ok".into(),
            },
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["item_conversion"]["status"], "already_processed");
        assert_eq!(json["receipt_gl"]["status"], "failed");
        assert_eq!(json["receipt_gl"]["reason"], "voucher PR-0001: no leg");

        let back: ConversionSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    /// Completed outcomes carry their report under `report`
    #[test]
    fn test_step_outcome_json() {
        let outcome = StepOutcome::Completed(RebalanceReport {
            voucher_type: VoucherType::PurchaseReceipt,
            vouchers: 3,
            lines: 4,
            legs_created: 2,
            legs_adjusted: 10,
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["report"]["vouchers"], 3);
        assert_eq!(json["report"]["voucher_type"], "purchase_receipt");
        assert_eq!(outcome.report().map(|r| r.legs_adjusted), Some(10));
    }

    /// Requests need all three fields
    #[test]
    fn test_request_validation() {
        assert!(target("Laptop-A", "IT Equipment", "Fixed Assets - AOGC")
            .validate()
            .is_ok());

        let errors = target("", "IT Equipment", "Fixed Assets - AOGC")
            .validate()
            .unwrap_err();
        assert!(errors.field_errors().contains_key("item_code"));

        let too_long = "x".repeat(141);
        assert!(target("Laptop-A", &too_long, "Fixed Assets - AOGC")
            .validate()
            .is_err());
    }

    /// The asset account must belong to the correction accounts' company
    #[test]
    fn test_asset_account_validation() {
        let accounts = LedgerAccounts::default();
        assert!(validate_asset_account("Fixed Assets - AOGC", &accounts).is_ok());
        assert!(validate_asset_account("Fixed Assets - OTHER", &accounts).is_err());
        assert!(validate_asset_account("Fixed Assets", &accounts).is_err());
        assert!(validate_asset_account(&accounts.asset_received_not_billed, &accounts).is_err());
    }

    /// Configured accounts must be distinct
    #[test]
    fn test_ledger_accounts_distinct() {
        let accounts = LedgerAccounts {
            stock_received_not_billed: "Stock In Hand - AOGC".into(),
            ..LedgerAccounts::default()
        };
        assert!(validate_ledger_accounts(&accounts).is_err());
        assert!(validate_ledger_accounts(&LedgerAccounts::default()).is_ok());
    }

    /// Marker keys separate kinds and targets
    #[test]
    fn test_marker_keys() {
        let it = target("Laptop-A", "IT Equipment", "Fixed Assets - AOGC");
        let office = target("Laptop-A", "Office Equipment", "Fixed Assets - AOGC");

        let a = MarkerKey::voucher(&it, VoucherType::PurchaseReceipt);
        let b = MarkerKey::voucher(&office, VoucherType::PurchaseReceipt);
        assert_ne!(a, b);
        assert_eq!(a.kind, CorrectionKind::PurchaseReceipt);
        assert_eq!(MarkerKey::item("Laptop-A").kind.as_str(), "item_reclassification");
    }
}
