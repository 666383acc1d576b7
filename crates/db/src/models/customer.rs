//! Customer entity model and DTOs.

use roster_core::spreadsheet::{SheetCell, SheetRecord};
use roster_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

pub use roster_core::customer::{CreateCustomer, UpdateCustomer};

/// A customer row from the `customers` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Customer {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SheetRecord for Customer {
    /// `id, username, email, phone, address`.
    fn cells(&self) -> Vec<SheetCell> {
        vec![
            SheetCell::Int(self.id),
            SheetCell::Text(self.username.clone()),
            SheetCell::Text(self.email.clone()),
            SheetCell::Text(self.phone.clone()),
            SheetCell::Text(self.address.clone()),
        ]
    }
}
