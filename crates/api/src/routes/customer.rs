//! Route definitions for the `/customers` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::customer;
use crate::state::AppState;

/// Routes mounted at `/customers`.
///
/// ```text
/// GET    /              -> list
/// POST   /              -> create
/// POST   /batch         -> create_batch
/// DELETE /batch         -> delete_batch
/// GET    /export        -> export
/// POST   /import        -> import (multipart, body limit = max_upload_bytes)
/// GET    /{id}          -> get_by_id
/// PATCH  /{id}          -> update
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(customer::list).post(customer::create))
        .route(
            "/batch",
            post(customer::create_batch).delete(customer::delete_batch),
        )
        .route("/export", get(customer::export))
        .route(
            "/import",
            post(customer::import).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/{id}", get(customer::get_by_id).patch(customer::update))
}
