//! Transaction-level guards shared by the correction steps
//!
//! A correction step first claims its idempotency marker, then opens the
//! ledger-correction scope. Both live and die with the surrounding
//! transaction: a rollback releases the marker and the scope, a commit makes
//! the marker permanent and drops the scope.

use shared::MarkerKey;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;

/// Allow this transaction to touch submitted ledger rows.
///
/// The setting is transaction-local, so it is cleared on commit and on
/// rollback alike.
pub async fn open_correction_scope(conn: &mut PgConnection) -> AppResult<()> {
    sqlx::query("SELECT set_config('icm.allow_ledger_correction', 'on', true)")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Claim the marker for `key`.
///
/// Returns `false` when the key is already processed. A concurrent claim for
/// the same key blocks on the unique index until the other transaction
/// finishes, so at most one caller ever gets `true`.
pub async fn claim_marker(
    conn: &mut PgConnection,
    key: &MarkerKey,
    created_by: &str,
) -> AppResult<bool> {
    let claimed = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO asset_to_stock_processed (item_code, kind, asset_category, asset_account, created_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT ON CONSTRAINT uq_asset_to_stock_processed DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&key.item_code)
    .bind(key.kind.as_str())
    .bind(&key.asset_category)
    .bind(&key.asset_account)
    .bind(created_by)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(claimed.is_some())
}
