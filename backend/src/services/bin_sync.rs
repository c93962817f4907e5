//! Lazily create bins for item+warehouse pairs that received stock

use shared::NewBin;
use sqlx::PgConnection;

use crate::error::AppResult;
use crate::services::stock_ledger::{load_receipt_lines, ReceiptLineFilter};

/// Create a bin for every warehouse the item was received into that has none.
///
/// Returns the number of bins created.
pub async fn create_missing_bins(
    conn: &mut PgConnection,
    item_code: &str,
    modified_by: &str,
) -> AppResult<u64> {
    let lines = load_receipt_lines(conn, item_code, ReceiptLineFilter::MissingBin).await?;

    let mut created = 0;
    for bin in NewBin::aggregate(&lines) {
        created += insert_bin(conn, &bin, modified_by).await?;
    }

    tracing::debug!("Created {} bins for {}", created, item_code);
    Ok(created)
}

async fn insert_bin(conn: &mut PgConnection, bin: &NewBin, modified_by: &str) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO bins (
            item_code, warehouse, stock_uom, actual_qty, projected_qty, valuation_rate, stock_value,
            reserved_qty, reserved_qty_for_production, reserved_qty_for_sub_contract,
            reserved_qty_for_production_plan, reserved_stock, indented_qty, ordered_qty,
            docstatus, owner, modified_by, creation
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18::date::timestamp)
        ON CONFLICT (item_code, warehouse) DO NOTHING
        "#,
    )
    .bind(&bin.item_code)
    .bind(&bin.warehouse)
    .bind(&bin.stock_uom)
    .bind(bin.actual_qty)
    .bind(bin.projected_qty)
    .bind(bin.valuation_rate)
    .bind(bin.stock_value)
    .bind(bin.reserved_qty)
    .bind(bin.reserved_qty_for_production)
    .bind(bin.reserved_qty_for_sub_contract)
    .bind(bin.reserved_qty_for_production_plan)
    .bind(bin.reserved_stock)
    .bind(bin.indented_qty)
    .bind(bin.ordered_qty)
    .bind(bin.docstatus.as_i16())
    .bind(&bin.owner)
    .bind(modified_by)
    .bind(bin.created_on)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
