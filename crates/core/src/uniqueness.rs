//! Two-tier uniqueness tracking for one import call.
//!
//! The in-batch tier is a plain per-field set owned by the caller of the
//! validation pass. The persistent tier is whatever implements
//! [`UniquenessLookup`]; the db crate backs it with an `EXISTS` query.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::rules::{ConstraintKind, FieldRule};

/// Values already seen in the current batch, one set per `UniqueInBatch` field.
///
/// Created empty at the start of an import call and dropped at its end.
#[derive(Debug, Default)]
pub struct BatchTracker {
    seen: HashMap<&'static str, HashSet<String>>,
}

impl BatchTracker {
    /// Start an empty tracker with one set per `UniqueInBatch` column of `rules`.
    pub fn new(rules: &[FieldRule]) -> Self {
        let seen = rules
            .iter()
            .filter(|rule| rule.has(ConstraintKind::UniqueInBatch))
            .map(|rule| (rule.field, HashSet::new()))
            .collect();
        Self { seen }
    }

    pub fn seen(&self, field: &str, value: &str) -> bool {
        self.seen
            .get(field)
            .is_some_and(|values| values.contains(value))
    }

    /// Record `value` for `field`. Returns `true` if it was not seen before.
    pub fn mark_seen(&mut self, field: &'static str, value: &str) -> bool {
        self.seen
            .entry(field)
            .or_default()
            .insert(value.to_string())
    }
}

/// Persistent tier of the uniqueness check.
#[async_trait]
pub trait UniquenessLookup: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the store already holds a record with `field = value`.
    async fn exists_in_store(&self, field: &str, value: &str) -> Result<bool, Self::Error>;
}
