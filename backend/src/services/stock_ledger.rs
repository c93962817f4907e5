//! Stock ledger backfill and moving-average revaluation
//!
//! Receipts posted while the item was an asset never produced stock ledger
//! entries. Once the item is a stock item the missing entries are inserted
//! and every item+warehouse timeline is rescanned so the running aggregates
//! are consistent again.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    revalue_timeline, DocStatus, LedgerMovement, NewStockLedgerEntry, PostingMoment, ReceiptLine,
    RunningValuation, WarehouseRevaluation,
};
use sqlx::{FromRow, PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::services::scope::open_correction_scope;

/// Which receipt lines to load for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptLineFilter {
    /// Lines with no stock ledger entry yet
    MissingLedgerEntry,
    /// Lines whose item+warehouse pair has no bin yet
    MissingBin,
}

impl ReceiptLineFilter {
    fn clause(&self) -> &'static str {
        match self {
            ReceiptLineFilter::MissingLedgerEntry => {
                "AND EXISTS (SELECT 1 FROM items i WHERE i.item_code = pri.item_code AND i.is_stock_item)
                 AND NOT EXISTS (SELECT 1 FROM stock_ledger_entries sle WHERE sle.voucher_detail_no = pri.name)"
            }
            ReceiptLineFilter::MissingBin => {
                "AND NOT EXISTS (SELECT 1 FROM bins b WHERE b.item_code = pri.item_code AND b.warehouse = pri.warehouse)"
            }
        }
    }
}

/// Row for receipt line queries
#[derive(Debug, FromRow)]
struct ReceiptLineRow {
    name: String,
    voucher_no: String,
    item_code: String,
    warehouse: String,
    qty: Decimal,
    conversion_factor: Decimal,
    valuation_rate: Decimal,
    stock_uom: Option<String>,
    batch_no: Option<String>,
    serial_no: Option<String>,
    posting_date: NaiveDate,
    posting_time: NaiveTime,
    owner: String,
    company: String,
    business_category: Option<String>,
    branch: Option<String>,
    project: Option<String>,
    fiscal_year: Option<String>,
    docstatus: i16,
}

impl TryFrom<ReceiptLineRow> for ReceiptLine {
    type Error = AppError;

    fn try_from(row: ReceiptLineRow) -> Result<Self, Self::Error> {
        let docstatus = DocStatus::from_i16(row.docstatus).ok_or_else(|| {
            AppError::Internal(format!("Receipt {} has docstatus {}", row.voucher_no, row.docstatus))
        })?;
        Ok(ReceiptLine {
            name: row.name,
            voucher_no: row.voucher_no,
            item_code: row.item_code,
            warehouse: row.warehouse,
            qty: row.qty,
            conversion_factor: row.conversion_factor,
            valuation_rate: row.valuation_rate,
            stock_uom: row.stock_uom,
            batch_no: row.batch_no,
            serial_no: row.serial_no,
            posting_date: row.posting_date,
            posting_time: row.posting_time,
            owner: row.owner,
            company: row.company,
            business_category: row.business_category,
            branch: row.branch,
            project: row.project,
            fiscal_year: row.fiscal_year,
            docstatus,
        })
    }
}

/// Submitted receipt lines of an item that have a warehouse, in posting order
pub async fn load_receipt_lines(
    conn: &mut PgConnection,
    item_code: &str,
    filter: ReceiptLineFilter,
) -> AppResult<Vec<ReceiptLine>> {
    let sql = format!(
        r#"
        SELECT pri.name, pri.parent AS voucher_no, pri.item_code, pri.warehouse,
               pri.qty, pri.conversion_factor, pri.valuation_rate,
               COALESCE(pri.stock_uom, i.stock_uom) AS stock_uom, pri.batch_no, pri.serial_no,
               pr.posting_date, pr.posting_time, pr.owner, pr.company,
               pr.business_category, pr.branch, pr.project, pr.docstatus,
               (SELECT fy.name FROM fiscal_years fy
                 WHERE pr.posting_date BETWEEN fy.year_start_date AND fy.year_end_date
                 ORDER BY fy.year_start_date DESC
                 LIMIT 1) AS fiscal_year
        FROM purchase_receipt_items pri
        JOIN purchase_receipts pr ON pr.name = pri.parent
        LEFT JOIN items i ON i.item_code = pri.item_code
        WHERE pri.item_code = $1
          AND pr.docstatus = 1
          AND pri.warehouse IS NOT NULL AND pri.warehouse <> ''
          {}
        ORDER BY pr.posting_date, pr.posting_time, pri.parent, pri.idx
        "#,
        filter.clause()
    );

    sqlx::query_as::<_, ReceiptLineRow>(&sql)
        .bind(item_code)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(ReceiptLine::try_from)
        .collect()
}

/// Insert the stock ledger entries missing for an item's receipt lines.
///
/// Returns the number of entries created. Aggregates are left at zero for
/// [`revalue_item`] to fill in.
pub async fn backfill_receipt_entries(
    conn: &mut PgConnection,
    item_code: &str,
    modified_by: &str,
) -> AppResult<u64> {
    let lines = load_receipt_lines(conn, item_code, ReceiptLineFilter::MissingLedgerEntry).await?;

    let mut created = 0;
    for line in &lines {
        let entry = NewStockLedgerEntry::from_receipt_line(line)?;
        insert_entry(conn, &entry, modified_by).await?;
        created += 1;
    }

    tracing::debug!("Backfilled {} stock ledger entries for {}", created, item_code);
    Ok(created)
}

async fn insert_entry(
    conn: &mut PgConnection,
    entry: &NewStockLedgerEntry,
    modified_by: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_ledger_entries (
            item_code, warehouse, posting_date, posting_time, posting_datetime,
            actual_qty, incoming_rate, outgoing_rate,
            voucher_type, voucher_no, voucher_detail_no, company, stock_uom,
            batch_no, serial_no, business_category, branch, project, fiscal_year,
            docstatus, owner, modified_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
        "#,
    )
    .bind(&entry.item_code)
    .bind(&entry.warehouse)
    .bind(entry.posting.date)
    .bind(entry.posting.time)
    .bind(entry.posting.datetime())
    .bind(entry.actual_qty)
    .bind(entry.incoming_rate)
    .bind(entry.outgoing_rate)
    .bind(entry.voucher_type.as_str())
    .bind(&entry.voucher_no)
    .bind(&entry.voucher_detail_no)
    .bind(&entry.company)
    .bind(&entry.stock_uom)
    .bind(&entry.batch_no)
    .bind(&entry.serial_no)
    .bind(&entry.business_category)
    .bind(&entry.branch)
    .bind(&entry.project)
    .bind(&entry.fiscal_year)
    .bind(entry.docstatus.as_i16())
    .bind(&entry.owner)
    .bind(modified_by)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Result of revaluing one item
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevaluationOutcome {
    pub item_code: String,
    /// Entries whose stored aggregates changed
    pub entries_updated: u64,
    pub warehouses: Vec<WarehouseRevaluation>,
}

/// Row for ledger timeline queries
#[derive(Debug, FromRow)]
struct TimelineRow {
    name: String,
    warehouse: String,
    posting_date: NaiveDate,
    posting_time: NaiveTime,
    actual_qty: Decimal,
    incoming_rate: Decimal,
    qty_after_transaction: Decimal,
    valuation_rate: Decimal,
    stock_value: Decimal,
    stock_value_difference: Decimal,
}

impl TimelineRow {
    fn movement(&self) -> LedgerMovement {
        LedgerMovement {
            name: self.name.clone(),
            posting: PostingMoment::new(self.posting_date, self.posting_time),
            actual_qty: self.actual_qty,
            incoming_rate: self.incoming_rate,
        }
    }

    /// Whether the stored aggregates already equal the recomputed ones
    fn is_current(&self, entry: &RunningValuation) -> bool {
        self.qty_after_transaction == entry.qty_after_transaction
            && self.valuation_rate == entry.valuation_rate
            && self.stock_value == entry.stock_value
            && self.stock_value_difference == entry.stock_value_difference
    }
}

/// Recompute the running aggregates of every warehouse timeline of an item.
///
/// Only submitted, non-cancelled entries take part. The caller must have
/// opened the correction scope on `conn`.
pub async fn revalue_item(conn: &mut PgConnection, item_code: &str) -> AppResult<RevaluationOutcome> {
    let rows = sqlx::query_as::<_, TimelineRow>(
        r#"
        SELECT name, warehouse, posting_date, posting_time, actual_qty, incoming_rate,
               qty_after_transaction, valuation_rate, stock_value, stock_value_difference
        FROM stock_ledger_entries
        WHERE item_code = $1 AND docstatus = 1 AND is_cancelled = FALSE
        ORDER BY warehouse, posting_date, posting_time, name
        FOR UPDATE
        "#,
    )
    .bind(item_code)
    .fetch_all(&mut *conn)
    .await?;

    let mut timelines: BTreeMap<String, Vec<TimelineRow>> = BTreeMap::new();
    for row in rows {
        timelines.entry(row.warehouse.clone()).or_default().push(row);
    }

    let mut outcome = RevaluationOutcome {
        item_code: item_code.to_string(),
        ..Default::default()
    };

    for (warehouse, rows) in timelines {
        let stored: BTreeMap<&str, &TimelineRow> = rows.iter().map(|r| (r.name.as_str(), r)).collect();
        let running = revalue_timeline(rows.iter().map(TimelineRow::movement).collect())?;

        for entry in &running {
            if stored
                .get(entry.name.as_str())
                .is_some_and(|row| row.is_current(entry))
            {
                continue;
            }

            sqlx::query(
                r#"
                UPDATE stock_ledger_entries
                SET qty_after_transaction = $1, valuation_rate = $2, stock_value = $3,
                    stock_value_difference = $4, modified = NOW()
                WHERE name = $5
                "#,
            )
            .bind(entry.qty_after_transaction)
            .bind(entry.valuation_rate)
            .bind(entry.stock_value)
            .bind(entry.stock_value_difference)
            .bind(&entry.name)
            .execute(&mut *conn)
            .await?;
            outcome.entries_updated += 1;
        }

        if let Some(last) = running.last() {
            outcome.warehouses.push(WarehouseRevaluation {
                warehouse,
                entries: running.len() as u64,
                qty_after_transaction: last.qty_after_transaction,
                stock_value: last.stock_value,
            });
        }
    }

    Ok(outcome)
}

/// Standalone revaluation, for re-running the scan after manual ledger edits
#[derive(Clone)]
pub struct StockLedgerService {
    db: PgPool,
}

impl StockLedgerService {
    /// Create a new StockLedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Revalue an item in its own transaction
    pub async fn revalue(&self, item_code: &str) -> AppResult<RevaluationOutcome> {
        tracing::info!("Revaluing stock ledger for {}", item_code);

        let mut tx = self.db.begin().await?;
        open_correction_scope(&mut *tx).await?;

        let outcome = match revalue_item(&mut *tx, item_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Revaluation of {} failed: {}", item_code, e);
                tx.rollback().await?;
                return Err(e);
            }
        };

        tx.commit().await?;

        tracing::info!(
            "Revalued {}: {} entries updated across {} warehouses",
            item_code,
            outcome.entries_updated,
            outcome.warehouses.len()
        );
        Ok(outcome)
    }
}
