use crate::types::DbId;
use crate::validation::ValidationReport;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Boxed error raised by a store behind one of the pipeline seams.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can stop a spreadsheet import.
///
/// Input-format variants are fatal before any row is processed,
/// [`ImportError::Validation`] carries every business-rule violation of the
/// batch at once, and [`ImportError::Persistence`] wraps store failures
/// (any partial write has already been rolled back).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid file type '{0}'. Only .xlsx and .xls are allowed")]
    UnsupportedExtension(String),

    #[error("Unreadable spreadsheet: {0}")]
    Unreadable(String),

    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("Malformed row {row}: expected {expected} cells, found {found}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Import rejected: {} validation error(s)", .0.error_count())]
    Validation(ValidationReport),

    #[error("Persistence failure: {0}")]
    Persistence(#[source] StoreError),

    #[error("Import worker failed: {0}")]
    Worker(String),
}

impl ImportError {
    pub fn persistence<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ImportError::Persistence(Box::new(err))
    }

    /// `true` for errors caused by the uploaded file rather than the store.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedExtension(_)
                | ImportError::Unreadable(_)
                | ImportError::MissingSheet(_)
                | ImportError::MalformedRow { .. }
        )
    }
}
