//! Handlers for the `/customers` resource, including spreadsheet
//! import and export.

use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use roster_core::customer::{CUSTOMER_SHEET, EXPORT_HEADERS};
use roster_core::error::CoreError;
use roster_core::filter::{FilterSpec, ListParams, PageMeta};
use roster_core::ingest::{run_import, IngestConfig};
use roster_core::spreadsheet::{check_extension, read_rows, write_records, XLSX_CONTENT_TYPE};
use roster_core::types::DbId;
use roster_db::models::customer::{CreateCustomer, Customer, UpdateCustomer};
use roster_db::repositories::CustomerRepo;
use roster_db::store::PgCustomerStore;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::{DataResponse, MessageResponse, PaginatedResponse};
use crate::state::AppState;

/// Multipart field carrying the uploaded workbook.
const UPLOAD_FIELD: &str = "file";

// ── Request / response bodies ───────────────────────────────────────

/// Body for `POST /customers/batch`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerBatch {
    #[validate(length(min = 1, message = "customers must not be empty"), nested)]
    pub customers: Vec<CreateCustomer>,
}

/// Body for `DELETE /customers/batch`.
#[derive(Debug, Deserialize, Validate)]
pub struct DeleteCustomers {
    #[validate(length(min = 1, message = "id must not be empty"))]
    pub id: Vec<DbId>,
}

#[derive(Debug, Serialize)]
pub struct CreatedCount {
    pub created: u64,
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

// ── CRUD ────────────────────────────────────────────────────────────

/// POST /api/v1/customers
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateCustomer>,
) -> AppResult<(StatusCode, Json<DataResponse<Customer>>)> {
    input.validate()?;

    if CustomerRepo::exists_by_column(&state.pool, "email", &input.email).await? {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "email '{}' already taken",
            input.email
        ))));
    }

    let customer = CustomerRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: customer })))
}

/// POST /api/v1/customers/batch
///
/// All-or-nothing: one transaction for the whole list.
pub async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<CreateCustomerBatch>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedCount>>)> {
    input.validate()?;

    let created =
        CustomerRepo::insert_batch(&state.pool, &input.customers, state.config.import_batch_size)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedCount { created },
        }),
    ))
}

/// GET /api/v1/customers
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<PaginatedResponse<Customer>>> {
    let spec = FilterSpec::from_params(&params)?;
    let (data, total) = CustomerRepo::list(&state.pool, &spec).await?;
    Ok(Json(PaginatedResponse {
        data,
        meta: PageMeta::new(&spec, total),
    }))
}

/// GET /api/v1/customers/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Customer>>> {
    let customer = CustomerRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Customer",
            id,
        }))?;
    Ok(Json(DataResponse { data: customer }))
}

/// PATCH /api/v1/customers/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateCustomer>,
) -> AppResult<Json<DataResponse<Customer>>> {
    input.validate()?;

    let customer = CustomerRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Customer",
            id,
        }))?;
    Ok(Json(DataResponse { data: customer }))
}

/// DELETE /api/v1/customers/batch
pub async fn delete_batch(
    State(state): State<AppState>,
    Json(input): Json<DeleteCustomers>,
) -> AppResult<Json<DataResponse<DeletedCount>>> {
    input.validate()?;
    if input.id.iter().any(|id| *id <= 0) {
        return Err(AppError::Core(CoreError::Validation(
            "id must contain only positive ids".to_string(),
        )));
    }

    let deleted = CustomerRepo::delete_batch(&state.pool, &input.id).await?;
    if deleted == 0 {
        return Err(AppError::NotFound("No customers matched the given ids".to_string()));
    }

    tracing::info!(requested = input.id.len(), deleted, "Deleted customers");
    Ok(Json(DataResponse {
        data: DeletedCount { deleted },
    }))
}

// ── Spreadsheet export ──────────────────────────────────────────────

/// GET /api/v1/customers/export
///
/// Accepts the listing filters but always exports every matching row.
pub async fn export(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let spec = FilterSpec {
        all: true,
        ..FilterSpec::from_params(&params)?
    };
    let (customers, total) = CustomerRepo::list(&state.pool, &spec).await?;

    let file_name = format!(
        "customer_{}.xlsx",
        chrono::Utc::now().format("%Y-%m-%d_%H%M%S")
    );
    let export_dir = state.config.export_dir.clone();
    let bytes = tokio::task::spawn_blocking(move || write_export(&export_dir, &customers))
        .await
        .map_err(|e| AppError::InternalError(format!("Export task failed: {e}")))??;

    tracing::info!(rows = total, file = %file_name, "Exported customers");
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    ))
}

/// Write the workbook to a staged file in `dir` and read it back.
///
/// The staged file is removed when it goes out of scope.
fn write_export(dir: &FsPath, customers: &[Customer]) -> AppResult<Vec<u8>> {
    let staged = tempfile::Builder::new()
        .prefix("customer_")
        .suffix(".xlsx")
        .tempfile_in(dir)
        .map_err(|e| AppError::InternalError(format!("Failed to stage export: {e}")))?;

    write_records(staged.path(), CUSTOMER_SHEET, EXPORT_HEADERS, customers)?;

    std::fs::read(staged.path())
        .map_err(|e| AppError::InternalError(format!("Failed to read staged export: {e}")))
}

// ── Spreadsheet import ──────────────────────────────────────────────

/// POST /api/v1/customers/import
///
/// Reads the `MST_CUSTOMER` sheet of the uploaded workbook, validates every
/// row and inserts them all in one transaction. Any rule violation rejects
/// the whole file with per-field messages.
pub async fn import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<MessageResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::BadRequest(format!("{UPLOAD_FIELD} is required")))?;
    check_extension(&file_name)?;

    let rows = tokio::task::spawn_blocking(move || read_rows(bytes, CUSTOMER_SHEET))
        .await
        .map_err(|e| AppError::InternalError(format!("Spreadsheet reader failed: {e}")))??;

    let store = PgCustomerStore::new(state.pool.clone(), state.config.import_batch_size);
    let config = IngestConfig {
        max_workers: state.config.import_max_workers,
    };
    let summary = run_import::<CreateCustomer, _>(rows, &store, &config).await?;

    tracing::info!(
        file = %file_name,
        rows = summary.rows,
        inserted = summary.inserted,
        "Customer import finished"
    );
    Ok(Json(MessageResponse {
        message: "Import Successful",
    }))
}
