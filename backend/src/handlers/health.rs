//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    /// Whether the trigger protecting submitted ledger rows is installed
    pub ledger_guard: bool,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let guard = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM pg_proc WHERE proname = 'guard_submitted_ledger_rows')",
    )
    .fetch_one(&state.db)
    .await;

    let (database, ledger_guard) = match guard {
        Ok(installed) => ("connected", installed),
        Err(e) => {
            tracing::warn!("Health check query failed: {}", e);
            ("disconnected", false)
        }
    };

    Json(HealthResponse {
        status: if ledger_guard { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        ledger_guard,
    })
}
