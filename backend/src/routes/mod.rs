//! Route definitions for the item correction service

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes. `state` backs the auth layer, which verifies tokens
/// with the configured JWT secret.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - per-item correction steps
        .nest("/items", item_routes(state.clone()))
        // Protected routes - conversion requests
        .nest("/conversions", conversion_routes(state))
}

/// Item correction routes (protected)
fn item_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:item_code/reclassify", post(handlers::reclassify_item))
        .route("/:item_code/receipt-gl", post(handlers::rebalance_receipt_gl))
        .route("/:item_code/invoice-gl", post(handlers::rebalance_invoice_gl))
        .route("/:item_code/revaluation", post(handlers::revalue_item))
        .route("/:item_code/corrections", get(handlers::get_correction_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Conversion request routes (protected)
fn conversion_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_conversions).post(handlers::create_conversion),
        )
        .route("/:name", get(handlers::get_conversion))
        .route("/:name/submit", post(handlers::submit_conversion))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
