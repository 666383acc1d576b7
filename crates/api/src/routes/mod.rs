pub mod customer;
pub mod health;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /customers                    list, create
/// /customers/batch              bulk create, bulk delete
/// /customers/export             spreadsheet export
/// /customers/import             spreadsheet import (multipart)
/// /customers/{id}               get, partial update
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().nest("/customers", customer::router(config.max_upload_bytes))
}
