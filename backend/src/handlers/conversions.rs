//! HTTP handlers for conversion requests

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::AssetTarget;

use crate::error::AppResult;
use crate::middleware::{CurrentUser, CORRECTION_RESOURCE};
use crate::services::conversion::Conversion;
use crate::services::ConversionService;
use crate::AppState;

/// Response for list of conversion requests
#[derive(Serialize)]
pub struct ConversionsResponse {
    pub conversions: Vec<Conversion>,
}

/// Create a draft conversion request
pub async fn create_conversion(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<AssetTarget>,
) -> AppResult<(StatusCode, Json<Conversion>)> {
    user.require(CORRECTION_RESOURCE, "execute")?;

    let service = ConversionService::new(state.db, state.config.accounts.clone());
    let conversion = service.create(input, &user.user).await?;
    Ok((StatusCode::CREATED, Json(conversion)))
}

/// Submit a conversion request, running every correction step
pub async fn submit_conversion(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
) -> AppResult<Json<Conversion>> {
    user.require(CORRECTION_RESOURCE, "execute")?;

    let service = ConversionService::new(state.db, state.config.accounts.clone());
    let conversion = service.submit(&name, &user.user).await?;
    Ok(Json(conversion))
}

/// Get a conversion request
pub async fn get_conversion(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
) -> AppResult<Json<Conversion>> {
    user.require(CORRECTION_RESOURCE, "read")?;

    let service = ConversionService::new(state.db, state.config.accounts.clone());
    let conversion = service.get(&name).await?;
    Ok(Json(conversion))
}

/// List conversion requests
pub async fn list_conversions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<ConversionsResponse>> {
    user.require(CORRECTION_RESOURCE, "read")?;

    let service = ConversionService::new(state.db, state.config.accounts.clone());
    let conversions = service.list().await?;
    Ok(Json(ConversionsResponse { conversions }))
}
