//! Row validation against a field rule table.
//!
//! [`validate_row`] evaluates every constraint of every column and returns
//! all failures; it never stops at the first one. The only state it touches
//! is the [`BatchTracker`] passed in by the caller.

use std::collections::BTreeMap;

use serde::Serialize;
use validator::ValidateEmail;

use crate::rules::{ConstraintKind, FieldRule};
use crate::uniqueness::{BatchTracker, UniquenessLookup};

/// One data row of the uploaded sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based position in the sheet, header row included.
    pub number: usize,
    /// Raw cell values, positionally aligned to the rule table.
    pub cells: Vec<String>,
}

impl Row {
    pub fn new(number: usize, cells: Vec<String>) -> Self {
        Self { number, cells }
    }

    /// Cell at `index`, or `""` when the row is shorter than the table.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map_or("", String::as_str)
    }
}

/// A single field-scoped failure for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub field: String,
    pub row_number: usize,
    pub message: String,
}

/// All failures of a batch, grouped by field.
///
/// An empty report means the batch is clean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    errors: BTreeMap<String, Vec<RowError>>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: RowError) {
        self.errors
            .entry(error.field.clone())
            .or_default()
            .push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = RowError>) {
        for error in errors {
            self.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of row errors across all fields.
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Errors recorded for `field`, in row order.
    pub fn field(&self, field: &str) -> &[RowError] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    /// Field name to human-readable messages, the shape sent to clients.
    pub fn messages(&self) -> BTreeMap<String, Vec<String>> {
        self.errors
            .iter()
            .map(|(field, errors)| {
                let messages = errors.iter().map(|e| e.message.clone()).collect();
                (field.clone(), messages)
            })
            .collect()
    }
}

/// Validate one row against `rules`.
///
/// `UniqueInBatch` records the value in `tracker` whether or not it was a
/// duplicate, so the first occurrence of a repeated value passes and every
/// later one fails. `UniqueInStore` issues one lookup per non-empty value.
/// Uniqueness and format constraints skip empty cells; `Required` reports
/// those.
pub async fn validate_row<L>(
    rules: &[FieldRule],
    row: &Row,
    tracker: &mut BatchTracker,
    lookup: &L,
) -> Result<Vec<RowError>, L::Error>
where
    L: UniquenessLookup + ?Sized,
{
    let mut errors = Vec::new();

    for (index, rule) in rules.iter().enumerate() {
        let value = row.cell(index);

        for constraint in rule.constraints {
            let failure = match constraint {
                ConstraintKind::Required => {
                    value.is_empty().then(|| required_message(rule.field, row.number))
                }
                ConstraintKind::UniqueInBatch => {
                    if value.is_empty() {
                        None
                    } else {
                        let first = tracker.mark_seen(rule.field, value);
                        (!first).then(|| not_unique_message(rule.field, value, row.number))
                    }
                }
                ConstraintKind::UniqueInStore => {
                    if value.is_empty() {
                        None
                    } else {
                        lookup
                            .exists_in_store(rule.field, value)
                            .await?
                            .then(|| taken_message(rule.field, value))
                    }
                }
                ConstraintKind::Email => {
                    let owned = value.to_string();
                    (!value.is_empty() && !owned.validate_email())
                        .then(|| invalid_email_message(rule.field, value))
                }
            };

            if let Some(message) = failure {
                errors.push(RowError {
                    field: rule.field.to_string(),
                    row_number: row.number,
                    message,
                });
            }
        }
    }

    Ok(errors)
}

fn required_message(field: &str, row: usize) -> String {
    format!("{field} row {row} is required")
}

fn not_unique_message(field: &str, value: &str, row: usize) -> String {
    format!("{field} '{value}' is not unique row {row}")
}

fn taken_message(field: &str, value: &str) -> String {
    format!("{field} '{value}' already taken")
}

fn invalid_email_message(field: &str, value: &str) -> String {
    format!("{field} '{value}' is not a valid email")
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::convert::Infallible;

    use async_trait::async_trait;

    use super::*;
    use ConstraintKind::*;

    const RULES: &[FieldRule] = &[
        FieldRule {
            field: "username",
            constraints: &[Required, UniqueInBatch, UniqueInStore],
        },
        FieldRule {
            field: "email",
            constraints: &[Required, Email, UniqueInBatch],
        },
        FieldRule {
            field: "phone",
            constraints: &[Required],
        },
    ];

    #[derive(Default)]
    struct Existing(HashSet<(String, String)>);

    impl Existing {
        fn with(field: &str, value: &str) -> Self {
            let mut set = HashSet::new();
            set.insert((field.to_string(), value.to_string()));
            Self(set)
        }
    }

    #[async_trait]
    impl UniquenessLookup for Existing {
        type Error = Infallible;

        async fn exists_in_store(&self, field: &str, value: &str) -> Result<bool, Infallible> {
            Ok(self.0.contains(&(field.to_string(), value.to_string())))
        }
    }

    fn row(number: usize, cells: &[&str]) -> Row {
        Row::new(number, cells.iter().map(|c| c.to_string()).collect())
    }

    #[tokio::test]
    async fn clean_row_produces_no_errors() {
        let mut tracker = BatchTracker::new(RULES);
        let errors = validate_row(
            RULES,
            &row(2, &["u1", "u1@example.com", "123"]),
            &mut tracker,
            &Existing::default(),
        )
        .await
        .unwrap();
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn collects_every_failure_in_the_row() {
        let mut tracker = BatchTracker::new(RULES);
        let errors = validate_row(
            RULES,
            &row(4, &["", "not-an-email", ""]),
            &mut tracker,
            &Existing::default(),
        )
        .await
        .unwrap();

        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "username row 4 is required",
                "email 'not-an-email' is not a valid email",
                "phone row 4 is required",
            ]
        );
        assert!(errors.iter().all(|e| e.row_number == 4));
    }

    #[tokio::test]
    async fn short_row_reads_missing_cells_as_empty() {
        let mut tracker = BatchTracker::new(RULES);
        let errors = validate_row(
            RULES,
            &row(2, &["u1", "u1@example.com"]),
            &mut tracker,
            &Existing::default(),
        )
        .await
        .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "phone");
    }

    #[tokio::test]
    async fn only_later_duplicates_are_flagged() {
        let mut tracker = BatchTracker::new(RULES);
        let lookup = Existing::default();
        let mut flagged = Vec::new();
        for (number, email) in [(2, "a@x.io"), (3, "a@x.io"), (4, "b@x.io"), (5, "a@x.io")] {
            let username = format!("user{number}");
            let errors = validate_row(
                RULES,
                &row(number, &[username.as_str(), email, "1"]),
                &mut tracker,
                &lookup,
            )
            .await
            .unwrap();
            flagged.extend(errors.into_iter().map(|e| e.row_number));
        }
        assert_eq!(flagged, vec![3, 5]);
    }

    #[tokio::test]
    async fn store_duplicate_uses_taken_message() {
        let mut tracker = BatchTracker::new(RULES);
        let errors = validate_row(
            RULES,
            &row(2, &["john", "john@example.com", "1"]),
            &mut tracker,
            &Existing::with("username", "john"),
        )
        .await
        .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "username 'john' already taken");
    }

    #[tokio::test]
    async fn empty_cells_skip_uniqueness() {
        let mut tracker = BatchTracker::new(RULES);
        let lookup = Existing::with("username", "");
        for number in [2, 3] {
            let email = format!("e{number}@x.io");
            let errors = validate_row(RULES, &row(number, &["", email.as_str(), "1"]), &mut tracker, &lookup)
                .await
                .unwrap();
            let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
            assert_eq!(messages, vec![format!("username row {number} is required")]);
        }
        assert!(!tracker.seen("username", ""));
    }

    #[test]
    fn report_groups_by_field_and_counts() {
        let mut report = ValidationReport::new();
        assert!(report.is_empty());
        report.push(RowError {
            field: "email".into(),
            row_number: 3,
            message: "email row 3 is required".into(),
        });
        report.push(RowError {
            field: "email".into(),
            row_number: 5,
            message: "email row 5 is required".into(),
        });
        report.push(RowError {
            field: "username".into(),
            row_number: 5,
            message: "username row 5 is required".into(),
        });

        assert!(!report.is_empty());
        assert_eq!(report.error_count(), 3);
        assert_eq!(report.field("email").len(), 2);
        assert!(report.field("phone").is_empty());

        let messages = report.messages();
        assert_eq!(
            messages["email"],
            vec!["email row 3 is required", "email row 5 is required"]
        );
    }
}
