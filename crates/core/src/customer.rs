//! Customer input shape and its spreadsheet rule table.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ImportError;
use crate::ingest::ImportRecord;
use crate::rules::ConstraintKind::{Email, Required, UniqueInBatch, UniqueInStore};
use crate::rules::FieldRule;
use crate::validation::Row;

/// Sheet read on import and written on export.
pub const CUSTOMER_SHEET: &str = "MST_CUSTOMER";

/// Export header row. Import sheets carry the same columns minus `ID`.
pub const EXPORT_HEADERS: &[&str] = &["ID", "Username", "Email", "Phone", "Address"];

/// Import columns in sheet order.
pub const CUSTOMER_RULES: &[FieldRule] = &[
    FieldRule {
        field: "username",
        constraints: &[Required, UniqueInBatch, UniqueInStore],
    },
    FieldRule {
        field: "email",
        constraints: &[Required, Email, UniqueInBatch, UniqueInStore],
    },
    FieldRule {
        field: "phone",
        constraints: &[Required],
    },
    FieldRule {
        field: "address",
        constraints: &[Required],
    },
];

/// DTO for creating a customer, from JSON or from an import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(email(message = "email is not a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
}

/// DTO for a partial update. All fields are optional; present ones are validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCustomer {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: Option<String>,
    #[validate(email(message = "email is not a valid email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "phone must not be empty"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "address must not be empty"))]
    pub address: Option<String>,
}

impl ImportRecord for CreateCustomer {
    const RULES: &'static [FieldRule] = CUSTOMER_RULES;

    fn from_row(row: Row) -> Result<Self, ImportError> {
        let expected = CUSTOMER_RULES.len();
        let found = row.cells.len();
        if found < expected {
            return Err(ImportError::MalformedRow {
                row: row.number,
                expected,
                found,
            });
        }

        let mut cells = row.cells.into_iter();
        let mut next = || cells.next().unwrap_or_default();
        Ok(CreateCustomer {
            username: next(),
            email: next(),
            phone: next(),
            address: next(),
        })
    }
}
