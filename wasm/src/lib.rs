//! WebAssembly module for the Item Correction Service
//!
//! Lets a client preview corrections before running them:
//! - Moving-average revaluation of a stock ledger timeline
//! - Debit/credit balance of a voucher's GL legs
//! - The GL changes a receipt or invoice line would produce

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use shared::{
    apply_changes, plan_invoice_line, plan_receipt_line, revalue_timeline, validate_document_name,
    GlChange, GlLeg, LedgerAccounts, LedgerMovement, LineAmount, RunningValuation, VoucherContext,
    VoucherTotals, VoucherType,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::debug_1(&JsValue::from_str("item correction preview loaded"));
}

fn js_error(message: String) -> JsValue {
    js_sys::Error::new(&message).into()
}

/// Balance summary of a voucher
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BalanceCheck {
    pub totals: VoucherTotals,
    pub imbalance: rust_decimal::Decimal,
    pub balanced: bool,
}

impl BalanceCheck {
    fn of(legs: &[GlLeg]) -> Self {
        let totals = VoucherTotals::of(legs);
        Self {
            totals,
            imbalance: totals.imbalance(),
            balanced: totals.is_balanced(),
        }
    }
}

/// A line to plan against a voucher's legs
#[derive(Debug, Deserialize)]
pub struct RebalancePreviewRequest {
    pub context: VoucherContext,
    pub legs: Vec<GlLeg>,
    pub amount: LineAmount,
    #[serde(default)]
    pub accounts: Option<LedgerAccounts>,
    /// Required for receipts
    #[serde(default)]
    pub asset_account: Option<String>,
}

/// Planned changes and the voucher as it would look afterwards
#[derive(Debug, Serialize)]
pub struct RebalancePreview {
    pub changes: Vec<GlChange>,
    pub legs: Vec<GlLeg>,
    pub before: BalanceCheck,
    pub after: BalanceCheck,
}

fn revaluation(movements_json: &str) -> Result<Vec<RunningValuation>, String> {
    let movements: Vec<LedgerMovement> = serde_json::from_str(movements_json)
        .map_err(|e| format!("Invalid movements JSON: {}", e))?;
    revalue_timeline(movements).map_err(|e| format!("Revaluation failed: {}", e))
}

fn balance(legs_json: &str) -> Result<BalanceCheck, String> {
    let legs: Vec<GlLeg> =
        serde_json::from_str(legs_json).map_err(|e| format!("Invalid legs JSON: {}", e))?;
    Ok(BalanceCheck::of(&legs))
}

fn rebalance(request_json: &str) -> Result<RebalancePreview, String> {
    let request: RebalancePreviewRequest = serde_json::from_str(request_json)
        .map_err(|e| format!("Invalid request JSON: {}", e))?;
    let accounts = request.accounts.unwrap_or_default();

    let changes = match request.context.voucher_type {
        VoucherType::PurchaseReceipt => {
            let asset_account = request
                .asset_account
                .as_deref()
                .ok_or_else(|| "asset_account is required for receipts".to_string())?;
            plan_receipt_line(
                &request.context,
                &request.legs,
                &request.amount,
                &accounts,
                asset_account,
            )
        }
        VoucherType::PurchaseInvoice => {
            plan_invoice_line(&request.context, &request.legs, &request.amount, &accounts)
        }
    }
    .map_err(|e| e.to_string())?;

    let before = BalanceCheck::of(&request.legs);
    let mut legs = request.legs;
    apply_changes(&mut legs, &changes);
    let after = BalanceCheck::of(&legs);

    Ok(RebalancePreview {
        changes,
        legs,
        before,
        after,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization failed: {}", e))
}

/// Revalue a stock ledger timeline. Takes and returns JSON arrays.
#[wasm_bindgen]
pub fn preview_revaluation(movements_json: &str) -> Result<String, JsValue> {
    revaluation(movements_json)
        .and_then(|result| to_json(&result))
        .map_err(js_error)
}

/// Sum a voucher's GL legs and report whether debits equal credits
#[wasm_bindgen]
pub fn check_voucher_balance(legs_json: &str) -> Result<String, JsValue> {
    balance(legs_json)
        .and_then(|result| to_json(&result))
        .map_err(js_error)
}

/// Plan the GL changes for one receipt or invoice line without writing anything
#[wasm_bindgen]
pub fn preview_rebalance(request_json: &str) -> Result<String, JsValue> {
    rebalance(request_json)
        .and_then(|result| to_json(&result))
        .map_err(js_error)
}

/// Check an item code before sending it to the server
#[wasm_bindgen]
pub fn is_valid_item_code(item_code: &str) -> bool {
    validate_document_name(item_code).is_ok()
}
