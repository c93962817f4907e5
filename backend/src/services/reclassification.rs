//! Item reclassification: asset item to stock item
//!
//! Flips the item master flags, removes the asset records that were created
//! for the item, then backfills its stock ledger and bins. Everything runs in
//! one transaction guarded by the item's marker.

use shared::{ItemClassification, MarkerKey, ReclassificationReport, StepOutcome};
use sqlx::{PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::services::bin_sync::create_missing_bins;
use crate::services::scope::{claim_marker, open_correction_scope};
use crate::services::stock_ledger::{backfill_receipt_entries, revalue_item};

/// Item reclassification service
#[derive(Clone)]
pub struct ReclassificationService {
    db: PgPool,
}

/// Rows removed while dropping an item's assets
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct AssetCleanup {
    assets: u64,
    dependent_rows: u64,
    journal_legs: u64,
    journal_entries: u64,
}

impl ReclassificationService {
    /// Create a new ReclassificationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Reclassify an item as a stock item.
    ///
    /// Returns `AlreadyProcessed` without touching anything when the item was
    /// reclassified before.
    pub async fn reclassify_item(
        &self,
        item_code: &str,
        user: &str,
    ) -> AppResult<StepOutcome<ReclassificationReport>> {
        tracing::info!("Reclassifying item {} as stock", item_code);

        let mut tx = self.db.begin().await?;

        match run(&mut *tx, item_code, user).await {
            Ok(StepOutcome::AlreadyProcessed) => {
                tx.rollback().await?;
                tracing::info!("Item {} already reclassified", item_code);
                Ok(StepOutcome::AlreadyProcessed)
            }
            Ok(StepOutcome::Completed(report)) => {
                tx.commit().await?;
                tracing::info!("Item {} reclassified: {}", item_code, report);
                Ok(StepOutcome::Completed(report))
            }
            Err(e) => {
                tracing::error!("Reclassification of {} failed: {:?}", item_code, e);
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

async fn run(
    conn: &mut PgConnection,
    item_code: &str,
    user: &str,
) -> AppResult<StepOutcome<ReclassificationReport>> {
    if !claim_marker(conn, &MarkerKey::item(item_code), user).await? {
        return Ok(StepOutcome::AlreadyProcessed);
    }
    open_correction_scope(conn).await?;

    mark_as_stock_item(conn, item_code).await?;

    let purchase_order_lines_updated = sqlx::query(
        "UPDATE purchase_order_items SET is_fixed_asset = FALSE WHERE item_code = $1 AND is_fixed_asset",
    )
    .bind(item_code)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let cleanup = remove_assets(conn, item_code).await?;

    let ledger_entries_created = backfill_receipt_entries(conn, item_code, user).await?;
    let revaluation = revalue_item(conn, item_code).await?;
    let bins_created = create_missing_bins(conn, item_code, user).await?;

    Ok(StepOutcome::Completed(ReclassificationReport {
        item_code: item_code.to_string(),
        purchase_order_lines_updated,
        assets_removed: cleanup.assets,
        asset_rows_removed: cleanup.dependent_rows,
        journal_legs_removed: cleanup.journal_legs,
        journal_entries_removed: cleanup.journal_entries,
        ledger_entries_created,
        ledger_entries_revalued: revaluation.entries_updated,
        bins_created,
    }))
}

async fn mark_as_stock_item(conn: &mut PgConnection, item_code: &str) -> AppResult<()> {
    let flags = ItemClassification::stock();

    let result = sqlx::query(
        r#"
        UPDATE items
        SET is_stock_item = $1, is_fixed_asset = $2, auto_create_assets = $3, is_service = $4,
            asset_category = $5, asset_naming_series = $6, modified = NOW()
        WHERE item_code = $7
        "#,
    )
    .bind(flags.is_stock_item)
    .bind(flags.is_fixed_asset)
    .bind(flags.auto_create_assets)
    .bind(flags.is_service)
    .bind(flags.asset_category)
    .bind(flags.asset_naming_series)
    .bind(item_code)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Item {}", item_code)));
    }
    Ok(())
}

/// Delete the item's assets and everything hanging off them.
///
/// Journal entries are removed only when deleting their asset legs left them
/// empty.
async fn remove_assets(conn: &mut PgConnection, item_code: &str) -> AppResult<AssetCleanup> {
    let assets: Vec<String> =
        sqlx::query_scalar("SELECT name FROM assets WHERE item_code = $1 ORDER BY name FOR UPDATE")
            .bind(item_code)
            .fetch_all(&mut *conn)
            .await?;

    if assets.is_empty() {
        return Ok(AssetCleanup::default());
    }

    let mut cleanup = AssetCleanup::default();

    for table in [
        "asset_activities",
        "asset_depreciation_schedules",
        "asset_movement_items",
    ] {
        cleanup.dependent_rows += sqlx::query(&format!("DELETE FROM {} WHERE asset = ANY($1)", table))
            .bind(&assets)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    let mut parents: Vec<String> = sqlx::query_scalar(
        r#"
        DELETE FROM journal_entry_accounts
        WHERE reference_type = 'Asset' AND reference_name = ANY($1)
        RETURNING parent
        "#,
    )
    .bind(&assets)
    .fetch_all(&mut *conn)
    .await?;
    cleanup.journal_legs = parents.len() as u64;

    parents.sort();
    parents.dedup();

    cleanup.journal_entries = sqlx::query(
        r#"
        DELETE FROM journal_entries je
        WHERE je.name = ANY($1)
          AND NOT EXISTS (SELECT 1 FROM journal_entry_accounts jea WHERE jea.parent = je.name)
        "#,
    )
    .bind(&parents)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    cleanup.assets = sqlx::query("DELETE FROM assets WHERE name = ANY($1)")
        .bind(&assets)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(cleanup)
}
