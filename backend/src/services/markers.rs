//! Read side of the idempotency markers

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::CorrectionKind;
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

/// Marker service, answers "which corrections already ran for this item"
#[derive(Clone)]
pub struct MarkerService {
    db: PgPool,
}

/// A recorded correction
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionMarker {
    pub item_code: String,
    pub kind: CorrectionKind,
    pub asset_category: Option<String>,
    pub asset_account: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Corrections recorded for one item, grouped by kind
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionStatus {
    pub item_code: String,
    pub item_reclassified: bool,
    pub receipt_gl_processed: bool,
    pub invoice_gl_processed: bool,
    pub markers: Vec<CorrectionMarker>,
}

#[derive(Debug, FromRow)]
struct MarkerRow {
    item_code: String,
    kind: String,
    asset_category: String,
    asset_account: String,
    created_by: String,
    created_at: DateTime<Utc>,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl TryFrom<MarkerRow> for CorrectionMarker {
    type Error = AppError;

    fn try_from(row: MarkerRow) -> Result<Self, Self::Error> {
        let kind = CorrectionKind::parse(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown correction kind: {}", row.kind)))?;
        Ok(Self {
            item_code: row.item_code,
            kind,
            asset_category: non_empty(row.asset_category),
            asset_account: non_empty(row.asset_account),
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

impl CorrectionStatus {
    pub fn from_markers(item_code: &str, markers: Vec<CorrectionMarker>) -> Self {
        let has = |kind: CorrectionKind| markers.iter().any(|m| m.kind == kind);
        Self {
            item_code: item_code.to_string(),
            item_reclassified: has(CorrectionKind::ItemReclassification),
            receipt_gl_processed: has(CorrectionKind::PurchaseReceipt),
            invoice_gl_processed: has(CorrectionKind::PurchaseInvoice),
            markers,
        }
    }
}

impl MarkerService {
    /// Create a new MarkerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Markers recorded for an item, oldest first
    pub async fn status_for_item(&self, item_code: &str) -> AppResult<CorrectionStatus> {
        let rows = sqlx::query_as::<_, MarkerRow>(
            r#"
            SELECT item_code, kind, asset_category, asset_account, created_by, created_at
            FROM asset_to_stock_processed
            WHERE item_code = $1
            ORDER BY created_at, kind
            "#,
        )
        .bind(item_code)
        .fetch_all(&self.db)
        .await?;

        let markers = rows
            .into_iter()
            .map(CorrectionMarker::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(CorrectionStatus::from_markers(item_code, markers))
    }
}
