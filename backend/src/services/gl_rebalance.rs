//! GL rebalancing for purchase receipts and invoices
//!
//! Runs the planner from `shared::rebalance` against the legs stored in
//! `gl_entries` and writes the resulting changes back. Each voucher's legs are
//! locked before they are read, and the voucher's imbalance is compared in
//! SQL before and after the changes.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    apply_change, plan_invoice_line, plan_receipt_line, AssetTarget, GlChange, GlLeg, LedgerAccounts,
    LegAmounts, LineAmount, MarkerKey, RebalanceReport, StepOutcome, VoucherContext, VoucherLine,
    VoucherType,
};
use sqlx::{FromRow, PgConnection, PgPool};

use crate::error::{AppError, AppResult};
use crate::services::scope::{claim_marker, open_correction_scope};

/// GL rebalancing service
#[derive(Clone)]
pub struct GlRebalanceService {
    db: PgPool,
    accounts: LedgerAccounts,
}

/// Row for voucher line queries
#[derive(Debug, FromRow)]
struct VoucherLineRow {
    voucher_no: String,
    item_code: String,
    amount: Option<Decimal>,
    base_amount: Option<Decimal>,
}

impl From<VoucherLineRow> for VoucherLine {
    fn from(row: VoucherLineRow) -> Self {
        Self {
            voucher_no: row.voucher_no,
            item_code: row.item_code,
            amount: LineAmount::from_columns(row.amount, row.base_amount),
        }
    }
}

/// Row for voucher header queries
#[derive(Debug, FromRow)]
struct VoucherHeaderRow {
    name: String,
    posting_date: NaiveDate,
    company: String,
    currency: String,
    conversion_rate: Option<Decimal>,
    cost_center: Option<String>,
    branch: Option<String>,
    owner: String,
    supplier: Option<String>,
    fiscal_year: Option<String>,
}

impl VoucherHeaderRow {
    fn into_context(self, voucher_type: VoucherType) -> VoucherContext {
        VoucherContext {
            voucher_type,
            voucher_no: self.name,
            posting_date: self.posting_date,
            company: self.company,
            currency: self.currency,
            conversion_rate: self.conversion_rate.unwrap_or(Decimal::ONE),
            cost_center: self.cost_center,
            branch: self.branch,
            owner: self.owner,
            fiscal_year: self.fiscal_year,
            supplier: self.supplier,
        }
    }
}

/// Row for GL leg queries
#[derive(Debug, FromRow)]
struct GlLegRow {
    name: String,
    account: String,
    against: Option<String>,
    debit: Decimal,
    debit_in_account_currency: Decimal,
    debit_in_transaction_currency: Decimal,
    credit: Decimal,
    credit_in_account_currency: Decimal,
    credit_in_transaction_currency: Decimal,
}

impl From<GlLegRow> for GlLeg {
    fn from(row: GlLegRow) -> Self {
        Self {
            name: row.name,
            account: row.account,
            against: row.against,
            debit: LegAmounts {
                company: row.debit,
                account_currency: row.debit_in_account_currency,
                transaction_currency: row.debit_in_transaction_currency,
            },
            credit: LegAmounts {
                company: row.credit,
                account_currency: row.credit_in_account_currency,
                transaction_currency: row.credit_in_transaction_currency,
            },
        }
    }
}

/// Counters for one rebalancing run
#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    lines: u64,
    legs_created: u64,
    legs_adjusted: u64,
}

impl GlRebalanceService {
    /// Create a new GlRebalanceService instance
    pub fn new(db: PgPool, accounts: LedgerAccounts) -> Self {
        Self { db, accounts }
    }

    /// Move the receipt-side amounts of `target` from the asset accounts to the stock accounts
    pub async fn rebalance_receipts(
        &self,
        target: &AssetTarget,
        user: &str,
    ) -> AppResult<StepOutcome<RebalanceReport>> {
        self.rebalance(target, VoucherType::PurchaseReceipt, user).await
    }

    /// Move the invoice-side amounts of `target` from Asset to Stock Received But Not Billed
    pub async fn rebalance_invoices(
        &self,
        target: &AssetTarget,
        user: &str,
    ) -> AppResult<StepOutcome<RebalanceReport>> {
        self.rebalance(target, VoucherType::PurchaseInvoice, user).await
    }

    async fn rebalance(
        &self,
        target: &AssetTarget,
        voucher_type: VoucherType,
        user: &str,
    ) -> AppResult<StepOutcome<RebalanceReport>> {
        tracing::info!(
            "Rebalancing {} GL entries for {} ({}, {})",
            voucher_type,
            target.item_code,
            target.asset_category,
            target.asset_account
        );

        let mut tx = self.db.begin().await?;

        match self.run(&mut *tx, target, voucher_type, user).await {
            Ok(StepOutcome::AlreadyProcessed) => {
                tx.rollback().await?;
                tracing::info!("{} GL for {} already processed", voucher_type, target.item_code);
                Ok(StepOutcome::AlreadyProcessed)
            }
            Ok(StepOutcome::Completed(report)) => {
                tx.commit().await?;
                tracing::info!("{} GL for {}: {}", voucher_type, target.item_code, report);
                Ok(StepOutcome::Completed(report))
            }
            Err(e) => {
                tracing::error!(
                    "{} GL rebalancing for {} failed: {:?}",
                    voucher_type,
                    target.item_code,
                    e
                );
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        conn: &mut PgConnection,
        target: &AssetTarget,
        voucher_type: VoucherType,
        user: &str,
    ) -> AppResult<StepOutcome<RebalanceReport>> {
        if !claim_marker(conn, &MarkerKey::voucher(target, voucher_type), user).await? {
            return Ok(StepOutcome::AlreadyProcessed);
        }
        open_correction_scope(conn).await?;

        let lines = load_lines(conn, target, voucher_type).await?;

        let mut by_voucher: BTreeMap<String, Vec<VoucherLine>> = BTreeMap::new();
        for line in lines {
            by_voucher.entry(line.voucher_no.clone()).or_default().push(line);
        }

        let mut counts = Counts::default();
        for (voucher_no, lines) in &by_voucher {
            self.rebalance_voucher(conn, target, voucher_type, voucher_no, lines, &mut counts)
                .await?;
        }

        if voucher_type == VoucherType::PurchaseReceipt {
            sqlx::query(
                r#"
                UPDATE purchase_receipt_items
                SET is_fixed_asset = FALSE, asset_category = NULL
                WHERE item_code = $1 AND asset_category = $2
                "#,
            )
            .bind(&target.item_code)
            .bind(&target.asset_category)
            .execute(&mut *conn)
            .await?;
        }

        Ok(StepOutcome::Completed(RebalanceReport {
            voucher_type,
            vouchers: by_voucher.len() as u64,
            lines: counts.lines,
            legs_created: counts.legs_created,
            legs_adjusted: counts.legs_adjusted,
        }))
    }

    async fn rebalance_voucher(
        &self,
        conn: &mut PgConnection,
        target: &AssetTarget,
        voucher_type: VoucherType,
        voucher_no: &str,
        lines: &[VoucherLine],
        counts: &mut Counts,
    ) -> AppResult<()> {
        let ctx = load_context(conn, voucher_type, voucher_no).await?;
        let mut legs = load_legs(conn, voucher_type, voucher_no).await?;
        let before = voucher_imbalance(conn, voucher_type, voucher_no).await?;

        for line in lines {
            let changes = match voucher_type {
                VoucherType::PurchaseReceipt => plan_receipt_line(
                    &ctx,
                    &legs,
                    &line.amount,
                    &self.accounts,
                    &target.asset_account,
                )?,
                VoucherType::PurchaseInvoice => {
                    plan_invoice_line(&ctx, &legs, &line.amount, &self.accounts)?
                }
            };

            for change in &changes {
                let name = execute_change(conn, &ctx, change).await?;
                match change {
                    GlChange::Insert { .. } => counts.legs_created += 1,
                    GlChange::Adjust { .. } => counts.legs_adjusted += 1,
                    GlChange::SetAgainst { .. } => {}
                }
                apply_change(&mut legs, change, &name);
            }
            counts.lines += 1;
        }

        if voucher_type == VoucherType::PurchaseInvoice {
            let relabel = GlChange::SetAgainst {
                against: self.accounts.invoice_against_label(),
            };
            execute_change(conn, &ctx, &relabel).await?;
            apply_change(&mut legs, &relabel, "");
        }

        let after = voucher_imbalance(conn, voucher_type, voucher_no).await?;
        if before != after {
            return Err(AppError::LedgerImbalance {
                voucher_no: voucher_no.to_string(),
                before,
                after,
            });
        }

        tracing::debug!("Rebalanced {} {} ({} legs)", voucher_type, voucher_no, legs.len());
        Ok(())
    }
}

async fn load_lines(
    conn: &mut PgConnection,
    target: &AssetTarget,
    voucher_type: VoucherType,
) -> AppResult<Vec<VoucherLine>> {
    let rows = match voucher_type {
        VoucherType::PurchaseReceipt => {
            sqlx::query_as::<_, VoucherLineRow>(
                r#"
                SELECT pri.parent AS voucher_no, pri.item_code, pri.amount, pri.base_amount
                FROM purchase_receipt_items pri
                JOIN purchase_receipts pr ON pr.name = pri.parent
                WHERE pri.item_code = $1 AND pri.asset_category = $2 AND pr.docstatus = 1
                ORDER BY pr.posting_date, pri.parent, pri.idx
                "#,
            )
            .bind(&target.item_code)
            .bind(&target.asset_category)
            .fetch_all(&mut *conn)
            .await?
        }
        VoucherType::PurchaseInvoice => {
            sqlx::query_as::<_, VoucherLineRow>(
                r#"
                SELECT pii.parent AS voucher_no, pii.item_code, pii.amount, pii.base_amount
                FROM purchase_invoice_items pii
                JOIN purchase_invoices pi ON pi.name = pii.parent
                WHERE pii.item_code = $1 AND pi.docstatus = 1
                ORDER BY pi.posting_date, pii.parent, pii.idx
                "#,
            )
            .bind(&target.item_code)
            .fetch_all(&mut *conn)
            .await?
        }
    };

    Ok(rows.into_iter().map(VoucherLine::from).collect())
}

async fn load_context(
    conn: &mut PgConnection,
    voucher_type: VoucherType,
    voucher_no: &str,
) -> AppResult<VoucherContext> {
    let sql = match voucher_type {
        VoucherType::PurchaseReceipt => {
            r#"
            SELECT v.name, v.posting_date, v.company, v.currency, v.conversion_rate, v.cost_center,
                   v.branch, v.owner, NULL::TEXT AS supplier,
                   (SELECT fy.name FROM fiscal_years fy
                     WHERE v.posting_date BETWEEN fy.year_start_date AND fy.year_end_date
                     ORDER BY fy.year_start_date DESC LIMIT 1) AS fiscal_year
            FROM purchase_receipts v
            WHERE v.name = $1
            "#
        }
        VoucherType::PurchaseInvoice => {
            r#"
            SELECT v.name, v.posting_date, v.company, v.currency, v.conversion_rate, v.cost_center,
                   v.branch, v.owner, v.supplier,
                   (SELECT fy.name FROM fiscal_years fy
                     WHERE v.posting_date BETWEEN fy.year_start_date AND fy.year_end_date
                     ORDER BY fy.year_start_date DESC LIMIT 1) AS fiscal_year
            FROM purchase_invoices v
            WHERE v.name = $1
            "#
        }
    };

    let row = sqlx::query_as::<_, VoucherHeaderRow>(sql)
        .bind(voucher_no)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", voucher_type, voucher_no)))?;

    Ok(row.into_context(voucher_type))
}

/// Live legs of a voucher ordered by name, locked for the rest of the transaction
async fn load_legs(
    conn: &mut PgConnection,
    voucher_type: VoucherType,
    voucher_no: &str,
) -> AppResult<Vec<GlLeg>> {
    let rows = sqlx::query_as::<_, GlLegRow>(
        r#"
        SELECT name, account, against,
               debit, debit_in_account_currency, debit_in_transaction_currency,
               credit, credit_in_account_currency, credit_in_transaction_currency
        FROM gl_entries
        WHERE voucher_type = $1 AND voucher_no = $2 AND is_cancelled = FALSE
        ORDER BY name
        FOR UPDATE
        "#,
    )
    .bind(voucher_type.as_str())
    .bind(voucher_no)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(GlLeg::from).collect())
}

/// Company-currency debit minus credit over the voucher's live legs
async fn voucher_imbalance(
    conn: &mut PgConnection,
    voucher_type: VoucherType,
    voucher_no: &str,
) -> AppResult<Decimal> {
    let imbalance: Decimal = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(debit), 0) - COALESCE(SUM(credit), 0)
        FROM gl_entries
        WHERE voucher_type = $1 AND voucher_no = $2 AND is_cancelled = FALSE
        "#,
    )
    .bind(voucher_type.as_str())
    .bind(voucher_no)
    .fetch_one(&mut *conn)
    .await?;

    Ok(imbalance)
}

/// Write one change. Returns the name of the leg it created or adjusted.
async fn execute_change(
    conn: &mut PgConnection,
    ctx: &VoucherContext,
    change: &GlChange,
) -> AppResult<String> {
    match change {
        GlChange::Insert { entry } => {
            let name: String = sqlx::query_scalar(
                r#"
                INSERT INTO gl_entries (
                    posting_date, account,
                    debit, debit_in_account_currency, debit_in_transaction_currency,
                    credit, credit_in_account_currency, credit_in_transaction_currency,
                    voucher_type, voucher_no, company, account_currency, transaction_currency,
                    transaction_exchange_rate, cost_center, remarks, branch, against, fiscal_year,
                    docstatus, owner
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, 1, $20)
                RETURNING name
                "#,
            )
            .bind(entry.posting_date)
            .bind(&entry.account)
            .bind(entry.debit.company)
            .bind(entry.debit.account_currency)
            .bind(entry.debit.transaction_currency)
            .bind(entry.credit.company)
            .bind(entry.credit.account_currency)
            .bind(entry.credit.transaction_currency)
            .bind(entry.voucher_type.as_str())
            .bind(&entry.voucher_no)
            .bind(&entry.company)
            .bind(&entry.account_currency)
            .bind(&entry.transaction_currency)
            .bind(entry.transaction_exchange_rate)
            .bind(&entry.cost_center)
            .bind(&entry.remarks)
            .bind(&entry.branch)
            .bind(&entry.against)
            .bind(&entry.fiscal_year)
            .bind(&entry.owner)
            .fetch_one(&mut *conn)
            .await?;
            Ok(name)
        }
        GlChange::Adjust { leg, debit, credit } => {
            sqlx::query(
                r#"
                UPDATE gl_entries
                SET debit = debit + $1,
                    debit_in_account_currency = debit_in_account_currency + $2,
                    debit_in_transaction_currency = debit_in_transaction_currency + $3,
                    credit = credit + $4,
                    credit_in_account_currency = credit_in_account_currency + $5,
                    credit_in_transaction_currency = credit_in_transaction_currency + $6,
                    modified = NOW()
                WHERE name = $7
                "#,
            )
            .bind(debit.company)
            .bind(debit.account_currency)
            .bind(debit.transaction_currency)
            .bind(credit.company)
            .bind(credit.account_currency)
            .bind(credit.transaction_currency)
            .bind(leg)
            .execute(&mut *conn)
            .await?;
            Ok(leg.clone())
        }
        GlChange::SetAgainst { against } => {
            sqlx::query(
                r#"
                UPDATE gl_entries
                SET against = $1, modified = NOW()
                WHERE voucher_type = $2 AND voucher_no = $3 AND is_cancelled = FALSE
                "#,
            )
            .bind(against)
            .bind(ctx.voucher_type.as_str())
            .bind(&ctx.voucher_no)
            .execute(&mut *conn)
            .await?;
            Ok(String::new())
        }
    }
}
