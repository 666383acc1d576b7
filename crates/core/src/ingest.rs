//! Spreadsheet ingestion pipeline.
//!
//! Two phases per import call:
//!
//! 1. A sequential pass runs [`validate_row`] over every row in input order,
//!    sharing one [`BatchTracker`]. Any failure aborts the call with the full
//!    [`ValidationReport`] before anything else happens.
//! 2. Clean rows are fanned out to a bounded set of tasks that each build one
//!    record with no shared mutable state. Results carry their row index and
//!    are put back in input order before being returned.
//!
//! [`run_import`] adds the commit through a [`BatchWriter`]; the pipeline
//! itself never writes to the store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ImportError;
use crate::rules::FieldRule;
use crate::uniqueness::{BatchTracker, UniquenessLookup};
use crate::validation::{validate_row, Row, ValidationReport};

/// Default bound on concurrently running conversion tasks.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// A record type that can be built from one validated spreadsheet row.
pub trait ImportRecord: Sized + Send + 'static {
    /// Column rules, in spreadsheet column order.
    const RULES: &'static [FieldRule];

    /// Build the record from a row that already passed validation.
    ///
    /// Returns [`ImportError::MalformedRow`] when the row shape does not
    /// match the rule table.
    fn from_row(row: Row) -> Result<Self, ImportError>;
}

/// Sole mutation point for imported records.
#[async_trait]
pub trait BatchWriter<R: Send + Sync>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist all `records` atomically. Returns the number inserted.
    async fn commit(&self, records: &[R]) -> Result<u64, Self::Error>;
}

/// Tuning knobs for one import call.
#[derive(Debug, Clone, Copy)]
pub struct IngestConfig {
    /// Maximum number of conversion tasks in flight during phase 2.
    pub max_workers: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Outcome of a committed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    pub inserted: u64,
}

/// Validate `rows` and convert them to records.
///
/// Returns [`ImportError::Validation`] if any row broke a rule, in which case
/// no record is built. A malformed row found during conversion fails the
/// whole call.
pub async fn ingest<R, L>(
    rows: Vec<Row>,
    lookup: &L,
    config: &IngestConfig,
) -> Result<Vec<R>, ImportError>
where
    R: ImportRecord,
    L: UniquenessLookup + ?Sized,
{
    let report = validate_batch(R::RULES, &rows, lookup).await?;
    if !report.is_empty() {
        tracing::info!(
            rows = rows.len(),
            errors = report.error_count(),
            "Import batch rejected by validation"
        );
        return Err(ImportError::Validation(report));
    }

    convert_rows::<R>(rows, config.max_workers).await
}

/// Validate, convert and commit `rows` through `store`.
pub async fn run_import<R, S>(
    rows: Vec<Row>,
    store: &S,
    config: &IngestConfig,
) -> Result<ImportSummary, ImportError>
where
    R: ImportRecord + Sync,
    S: UniquenessLookup + BatchWriter<R>,
{
    let row_count = rows.len();
    let records = ingest::<R, S>(rows, store, config).await?;

    let inserted = store
        .commit(&records)
        .await
        .map_err(ImportError::persistence)?;

    tracing::info!(rows = row_count, inserted, "Import batch committed");
    Ok(ImportSummary {
        rows: row_count,
        inserted,
    })
}

/// Phase 1: sequential validation with a tracker scoped to this call.
async fn validate_batch<L>(
    rules: &[FieldRule],
    rows: &[Row],
    lookup: &L,
) -> Result<ValidationReport, ImportError>
where
    L: UniquenessLookup + ?Sized,
{
    let mut tracker = BatchTracker::new(rules);
    let mut report = ValidationReport::new();

    for row in rows {
        let errors = validate_row(rules, row, &mut tracker, lookup)
            .await
            .map_err(ImportError::persistence)?;
        report.extend(errors);
    }

    Ok(report)
}

/// Phase 2: bounded fan-out of row conversion, fan-in in input order.
async fn convert_rows<R: ImportRecord>(
    rows: Vec<Row>,
    max_workers: usize,
) -> Result<Vec<R>, ImportError> {
    let total = rows.len();
    let workers = max_workers.max(1);
    let permits = Arc::new(Semaphore::new(workers));
    let mut tasks: JoinSet<(usize, Result<R, ImportError>)> = JoinSet::new();
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut failure: Option<ImportError> = None;

    tracing::debug!(rows = total, workers, "Converting validated rows");

    for (index, row) in rows.into_iter().enumerate() {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| ImportError::Worker(e.to_string()))?;

        tasks.spawn(async move {
            let _permit = permit;
            (index, R::from_row(row))
        });

        while let Some(joined) = tasks.try_join_next() {
            collect(joined, &mut slots, &mut failure);
        }
        if failure.is_some() {
            break;
        }
    }

    if failure.is_some() {
        tasks.abort_all();
    }
    while let Some(joined) = tasks.join_next().await {
        collect(joined, &mut slots, &mut failure);
        if failure.is_some() {
            tasks.abort_all();
        }
    }

    if let Some(err) = failure {
        return Err(err);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<R>>>()
        .ok_or_else(|| ImportError::Worker("conversion task produced no record".to_string()))
}

fn collect<R>(
    joined: Result<(usize, Result<R, ImportError>), tokio::task::JoinError>,
    slots: &mut [Option<R>],
    failure: &mut Option<ImportError>,
) {
    match joined {
        Ok((index, Ok(record))) => slots[index] = Some(record),
        Ok((_, Err(err))) => {
            failure.get_or_insert(err);
        }
        Err(err) if err.is_cancelled() => {}
        Err(err) => {
            failure.get_or_insert(ImportError::Worker(err.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::rules::ConstraintKind::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Contact {
        handle: String,
        city: String,
    }

    impl ImportRecord for Contact {
        const RULES: &'static [FieldRule] = &[
            FieldRule {
                field: "handle",
                constraints: &[Required, UniqueInBatch, UniqueInStore],
            },
            FieldRule {
                field: "city",
                constraints: &[Required],
            },
        ];

        fn from_row(row: Row) -> Result<Self, ImportError> {
            if row.cells.len() != 2 {
                return Err(ImportError::MalformedRow {
                    row: row.number,
                    expected: 2,
                    found: row.cells.len(),
                });
            }
            let mut cells = row.cells.into_iter();
            Ok(Contact {
                handle: cells.next().unwrap_or_default(),
                city: cells.next().unwrap_or_default(),
            })
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("store offline")]
    struct Offline;

    #[derive(Default)]
    struct MemoryStore {
        existing: HashSet<String>,
        committed: Mutex<Vec<Contact>>,
        fail_commit: bool,
    }

    #[async_trait]
    impl UniquenessLookup for MemoryStore {
        type Error = Offline;

        async fn exists_in_store(&self, _field: &str, value: &str) -> Result<bool, Offline> {
            Ok(self.existing.contains(value))
        }
    }

    #[async_trait]
    impl BatchWriter<Contact> for MemoryStore {
        type Error = Offline;

        async fn commit(&self, records: &[Contact]) -> Result<u64, Offline> {
            if self.fail_commit {
                return Err(Offline);
            }
            self.committed.lock().unwrap().extend_from_slice(records);
            Ok(records.len() as u64)
        }
    }

    fn rows(data: &[(&str, &str)]) -> Vec<Row> {
        data.iter()
            .enumerate()
            .map(|(i, (handle, city))| Row::new(i + 2, vec![handle.to_string(), city.to_string()]))
            .collect()
    }

    #[tokio::test]
    async fn duplicate_in_batch_rejects_whole_import() {
        let store = MemoryStore::default();
        let result =
            run_import::<Contact, _>(rows(&[("u1", "a1"), ("u1", "a2")]), &store, &IngestConfig::default())
                .await;

        let report = assert_matches!(result, Err(ImportError::Validation(report)) => report);
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.field("handle")[0].row_number, 3);
        assert_eq!(report.field("handle")[0].message, "handle 'u1' is not unique row 3");
        assert!(store.committed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn any_invalid_row_commits_nothing() {
        let store = MemoryStore {
            existing: ["taken".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let result = run_import::<Contact, _>(
            rows(&[("ok1", "x"), ("taken", "y"), ("ok2", ""), ("ok3", "z")]),
            &store,
            &IngestConfig::default(),
        )
        .await;

        let report = assert_matches!(result, Err(ImportError::Validation(report)) => report);
        assert_eq!(report.messages()["handle"], vec!["handle 'taken' already taken"]);
        assert_eq!(report.messages()["city"], vec!["city row 4 is required"]);
        assert!(store.committed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn clean_batch_commits_in_input_order() {
        let store = MemoryStore::default();
        let data: Vec<(String, String)> = (0..200)
            .map(|i| (format!("user{i}"), format!("city{i}")))
            .collect();
        let input: Vec<Row> = data
            .iter()
            .enumerate()
            .map(|(i, (h, c))| Row::new(i + 2, vec![h.clone(), c.clone()]))
            .collect();

        let summary = run_import::<Contact, _>(input, &store, &IngestConfig { max_workers: 3 })
            .await
            .unwrap();

        assert_eq!(summary, ImportSummary { rows: 200, inserted: 200 });
        let committed = store.committed.lock().unwrap();
        let handles: Vec<_> = committed.iter().map(|c| c.handle.clone()).collect();
        let expected: Vec<_> = data.iter().map(|(h, _)| h.clone()).collect();
        assert_eq!(handles, expected);
    }

    #[tokio::test]
    async fn malformed_row_is_a_hard_fault() {
        let store = MemoryStore::default();
        let mut input = rows(&[("a", "1"), ("b", "2"), ("c", "3")]);
        input[1].cells.push("extra".to_string());

        let result = run_import::<Contact, _>(input, &store, &IngestConfig { max_workers: 1 }).await;

        assert_matches!(
            result,
            Err(ImportError::MalformedRow { row: 3, expected: 2, found: 3 })
        );
        assert!(store.committed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_failure_surfaces_as_persistence_error() {
        let store = MemoryStore {
            fail_commit: true,
            ..Default::default()
        };
        let result =
            run_import::<Contact, _>(rows(&[("a", "1")]), &store, &IngestConfig::default()).await;
        assert_matches!(result, Err(ImportError::Persistence(_)));
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = MemoryStore::default();
        let summary = run_import::<Contact, _>(Vec::new(), &store, &IngestConfig::default())
            .await
            .unwrap();
        assert_eq!(summary, ImportSummary { rows: 0, inserted: 0 });
    }

    #[tokio::test]
    async fn zero_workers_still_makes_progress() {
        let store = MemoryStore::default();
        let records: Vec<Contact> =
            ingest(rows(&[("a", "1"), ("b", "2")]), &store, &IngestConfig { max_workers: 0 })
                .await
                .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].handle, "b");
    }

    #[tokio::test]
    async fn tracker_does_not_leak_between_calls() {
        let store = MemoryStore::default();
        let config = IngestConfig::default();
        let first: Vec<Contact> = ingest(rows(&[("u1", "a")]), &store, &config).await.unwrap();
        let second: Vec<Contact> = ingest(rows(&[("u1", "a")]), &store, &config).await.unwrap();
        assert_eq!(first, second);
    }
}
