//! HTTP handlers for the individual correction steps

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{
    validate_asset_account, validate_document_name, AssetAccountInput, AssetTarget, RebalanceReport,
    ReclassificationReport, StepOutcome,
};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentUser, CORRECTION_RESOURCE};
use crate::services::markers::CorrectionStatus;
use crate::services::stock_ledger::RevaluationOutcome;
use crate::services::{GlRebalanceService, MarkerService, ReclassificationService, StockLedgerService};
use crate::AppState;

fn check_item_code(item_code: &str) -> AppResult<()> {
    validate_document_name(item_code).map_err(|msg| AppError::Validation {
        field: "item_code".to_string(),
        message: msg.to_string(),
    })
}

/// Validate the body of a GL step and combine it with the item from the path
fn asset_target(state: &AppState, item_code: String, input: AssetAccountInput) -> AppResult<AssetTarget> {
    check_item_code(&item_code)?;
    input.validate()?;
    validate_asset_account(&input.asset_account, &state.config.accounts).map_err(|msg| {
        AppError::Validation {
            field: "asset_account".to_string(),
            message: msg.to_string(),
        }
    })?;

    Ok(AssetTarget {
        item_code,
        asset_category: input.asset_category,
        asset_account: input.asset_account,
    })
}

/// Reclassify an item as a stock item
pub async fn reclassify_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_code): Path<String>,
) -> AppResult<Json<StepOutcome<ReclassificationReport>>> {
    user.require(CORRECTION_RESOURCE, "execute")?;
    check_item_code(&item_code)?;

    let service = ReclassificationService::new(state.db);
    let outcome = service.reclassify_item(&item_code, &user.user).await?;
    Ok(Json(outcome))
}

/// Rebalance the item's purchase receipt GL entries
pub async fn rebalance_receipt_gl(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_code): Path<String>,
    Json(input): Json<AssetAccountInput>,
) -> AppResult<Json<StepOutcome<RebalanceReport>>> {
    user.require(CORRECTION_RESOURCE, "execute")?;
    let target = asset_target(&state, item_code, input)?;

    let service = GlRebalanceService::new(state.db, state.config.accounts.clone());
    let outcome = service.rebalance_receipts(&target, &user.user).await?;
    Ok(Json(outcome))
}

/// Rebalance the item's purchase invoice GL entries
pub async fn rebalance_invoice_gl(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_code): Path<String>,
    Json(input): Json<AssetAccountInput>,
) -> AppResult<Json<StepOutcome<RebalanceReport>>> {
    user.require(CORRECTION_RESOURCE, "execute")?;
    let target = asset_target(&state, item_code, input)?;

    let service = GlRebalanceService::new(state.db, state.config.accounts.clone());
    let outcome = service.rebalance_invoices(&target, &user.user).await?;
    Ok(Json(outcome))
}

/// Recompute the item's stock ledger running aggregates
pub async fn revalue_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_code): Path<String>,
) -> AppResult<Json<RevaluationOutcome>> {
    user.require(CORRECTION_RESOURCE, "execute")?;
    check_item_code(&item_code)?;

    let service = StockLedgerService::new(state.db);
    let outcome = service.revalue(&item_code).await?;
    Ok(Json(outcome))
}

/// List the corrections already recorded for an item
pub async fn get_correction_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_code): Path<String>,
) -> AppResult<Json<CorrectionStatus>> {
    user.require(CORRECTION_RESOURCE, "read")?;
    check_item_code(&item_code)?;

    let service = MarkerService::new(state.db);
    let status = service.status_for_item(&item_code).await?;
    Ok(Json(status))
}
