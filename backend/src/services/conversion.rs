//! Asset-to-stock conversion requests
//!
//! A request names the item, asset category and asset account. Submitting it
//! runs the item reclassification and both GL rebalancing steps and stores
//! what each of them did.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    validate_asset_account, AssetTarget, ConversionSummary, DocStatus, LedgerAccounts, StepOutcome,
    StepStatus,
};
use sqlx::{types::Json, FromRow, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{GlRebalanceService, ReclassificationService};

/// Conversion request service
#[derive(Clone)]
pub struct ConversionService {
    db: PgPool,
    accounts: LedgerAccounts,
}

/// Conversion request
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub name: String,
    pub item_code: String,
    pub asset_category: String,
    pub asset_account: String,
    pub docstatus: DocStatus,
    pub summary: Option<ConversionSummary>,
    /// Human readable form of `summary`
    pub message: Option<String>,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Conversion {
    pub fn target(&self) -> AssetTarget {
        AssetTarget {
            item_code: self.item_code.clone(),
            asset_category: self.asset_category.clone(),
            asset_account: self.asset_account.clone(),
        }
    }
}

/// Row for conversion queries
#[derive(Debug, FromRow)]
struct ConversionRow {
    name: String,
    item_code: String,
    asset_category: String,
    asset_account: String,
    docstatus: i16,
    summary: Option<Json<ConversionSummary>>,
    owner: String,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ConversionRow> for Conversion {
    type Error = AppError;

    fn try_from(row: ConversionRow) -> Result<Self, Self::Error> {
        let docstatus = DocStatus::from_i16(row.docstatus).ok_or_else(|| {
            AppError::Internal(format!("Conversion {} has docstatus {}", row.name, row.docstatus))
        })?;
        let summary = row.summary.map(|Json(summary)| summary);
        Ok(Self {
            name: row.name,
            item_code: row.item_code,
            asset_category: row.asset_category,
            asset_account: row.asset_account,
            docstatus,
            message: summary.as_ref().map(ConversionSummary::message),
            summary,
            owner: row.owner,
            created_at: row.created_at,
            submitted_at: row.submitted_at,
        })
    }
}

const CONVERSION_COLUMNS: &str =
    "name, item_code, asset_category, asset_account, docstatus, summary, owner, created_at, submitted_at";

/// Collapse a step result into the status stored on the request
pub fn step_status<R: std::fmt::Display>(result: AppResult<StepOutcome<R>>) -> StepStatus {
    match result {
        Ok(StepOutcome::AlreadyProcessed) => StepStatus::AlreadyProcessed,
        Ok(StepOutcome::Completed(report)) => StepStatus::Succeeded {
            detail: report.to_string(),
        },
        Err(e) => StepStatus::Failed {
            reason: e.to_string(),
        },
    }
}

impl ConversionService {
    /// Create a new ConversionService instance
    pub fn new(db: PgPool, accounts: LedgerAccounts) -> Self {
        Self { db, accounts }
    }

    /// Create a draft conversion request
    pub async fn create(&self, input: AssetTarget, owner: &str) -> AppResult<Conversion> {
        input.validate()?;
        validate_asset_account(&input.asset_account, &self.accounts).map_err(|msg| {
            AppError::Validation {
                field: "asset_account".to_string(),
                message: msg.to_string(),
            }
        })?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM items WHERE item_code = $1)")
                .bind(&input.item_code)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Item {}", input.item_code)));
        }

        let row = sqlx::query_as::<_, ConversionRow>(&format!(
            r#"
            INSERT INTO asset_to_stock_conversions (item_code, asset_category, asset_account, owner)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CONVERSION_COLUMNS
        ))
        .bind(&input.item_code)
        .bind(&input.asset_category)
        .bind(&input.asset_account)
        .bind(owner)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Created conversion request {} for {}", row.name, row.item_code);
        row.try_into()
    }

    /// Get a conversion request by name
    pub async fn get(&self, name: &str) -> AppResult<Conversion> {
        sqlx::query_as::<_, ConversionRow>(&format!(
            "SELECT {} FROM asset_to_stock_conversions WHERE name = $1",
            CONVERSION_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Conversion {}", name)))?
        .try_into()
    }

    /// List conversion requests, newest first
    pub async fn list(&self) -> AppResult<Vec<Conversion>> {
        sqlx::query_as::<_, ConversionRow>(&format!(
            "SELECT {} FROM asset_to_stock_conversions ORDER BY created_at DESC, name DESC",
            CONVERSION_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Conversion::try_from)
        .collect()
    }

    /// Submit a draft request: run the corrections and record the outcome.
    ///
    /// The draft row stays locked while the steps run, so a concurrent submit
    /// waits and then finds the request already submitted. A failed item
    /// conversion skips both GL steps. The request only becomes submitted when
    /// no step failed; otherwise it is left as a draft with the summary of the
    /// attempt, and submitting it again retries the outstanding steps.
    pub async fn submit(&self, name: &str, user: &str) -> AppResult<Conversion> {
        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_as::<_, ConversionRow>(&format!(
            r#"
            SELECT {}
            FROM asset_to_stock_conversions
            WHERE name = $1 AND docstatus = 0
            FOR UPDATE
            "#,
            CONVERSION_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let conversion: Conversion = match locked {
            Some(row) => row.try_into()?,
            None => {
                tx.rollback().await?;
                let existing = self.get(name).await?;
                return Err(AppError::InvalidStateTransition(format!(
                    "Conversion {} is {:?}, only drafts can be submitted",
                    existing.name, existing.docstatus
                )));
            }
        };

        tracing::info!("Submitting conversion {} for {}", conversion.name, conversion.item_code);

        let summary = self.run_steps(&conversion.target(), user).await;
        let docstatus = summary.resulting_docstatus();

        if summary.has_failures() {
            tracing::error!(
                "Conversion {} finished with failures, left as draft:\n{}",
                name,
                summary.message()
            );
        } else {
            tracing::info!("Conversion {} finished:\n{}", name, summary.message());
        }

        let row = sqlx::query_as::<_, ConversionRow>(&format!(
            r#"
            UPDATE asset_to_stock_conversions
            SET docstatus = $1,
                summary = $2,
                submitted_at = CASE WHEN $1::smallint = 1 THEN NOW() END
            WHERE name = $3
            RETURNING {}
            "#,
            CONVERSION_COLUMNS
        ))
        .bind(docstatus.as_i16())
        .bind(Json(&summary))
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn run_steps(&self, target: &AssetTarget, user: &str) -> ConversionSummary {
        let reclassification = ReclassificationService::new(self.db.clone());
        let item_conversion =
            step_status(reclassification.reclassify_item(&target.item_code, user).await);
        if item_conversion.is_failed() {
            return ConversionSummary::item_failed(item_conversion);
        }

        let rebalance = GlRebalanceService::new(self.db.clone(), self.accounts.clone());
        ConversionSummary {
            item_conversion,
            receipt_gl: step_status(rebalance.rebalance_receipts(target, user).await),
            invoice_gl: step_status(rebalance.rebalance_invoices(target, user).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{RebalanceError, RebalanceReport, VoucherType};

    #[test]
    fn completed_step_reports_its_detail() {
        let status = step_status(Ok(StepOutcome::Completed(RebalanceReport {
            voucher_type: VoucherType::PurchaseReceipt,
            vouchers: 2,
            lines: 3,
            legs_created: 2,
            legs_adjusted: 6,
        })));
        assert_eq!(
            status.to_string(),
            "Done. 2 Purchase Receipt vouchers rebalanced (2 legs created, 6 adjusted)"
        );
    }

    #[test]
    fn failed_step_keeps_the_reason() {
        let result: AppResult<StepOutcome<RebalanceReport>> =
            Err(AppError::Rebalance(RebalanceError::MissingAssetLeg {
                voucher_no: "PINV-0001".into(),
                account: "Asset Received But Not Billed - AOGC".into(),
            }));
        let status = step_status(result);
        assert!(status.is_failed());
        assert!(status.to_string().contains("PINV-0001"));
    }

    #[test]
    fn already_processed_step_is_not_a_failure() {
        let status = step_status::<RebalanceReport>(Ok(StepOutcome::AlreadyProcessed));
        assert_eq!(status, StepStatus::AlreadyProcessed);
    }

    #[test]
    fn row_with_summary_renders_message() {
        let summary = ConversionSummary {
            item_conversion: StepStatus::AlreadyProcessed,
            receipt_gl: StepStatus::AlreadyProcessed,
            invoice_gl: StepStatus::AlreadyProcessed,
        };
        let conversion = Conversion::try_from(ConversionRow {
            name: "ATS-00001".into(),
            item_code: "Laptop-A".into(),
            asset_category: "IT Equipment".into(),
            asset_account: "Fixed Assets - AOGC".into(),
            docstatus: 1,
            summary: Some(Json(summary)),
            owner: "admin@example.com".into(),
            created_at: Utc::now(),
            submitted_at: Some(Utc::now()),
        })
        .unwrap();
        assert_eq!(conversion.docstatus, DocStatus::Submitted);
        assert!(conversion
            .message
            .as_deref()
            .unwrap()
            .starts_with("Item Conversion: Already processed."));
    }
}
