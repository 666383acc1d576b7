//! Field rule table types.
//!
//! A rule table is a static, ordered list of [`FieldRule`]s, one per input
//! column. Column position in the spreadsheet is the rule's index in the
//! table; constraints are evaluated in the order they are declared.

use serde::Serialize;

/// A single constraint attached to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// The cell must not be empty.
    Required,
    /// The value must not repeat an earlier row of the same batch.
    UniqueInBatch,
    /// The value must not already exist in the persistent store.
    UniqueInStore,
    /// The value must be a syntactically valid email address.
    Email,
}

/// Ordered constraints for one input column.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub constraints: &'static [ConstraintKind],
}

impl FieldRule {
    pub fn has(&self, kind: ConstraintKind) -> bool {
        self.constraints.contains(&kind)
    }
}
