//! Post-upgrade entity count verification.

use crate::config::TablePrefix;
use crate::errors::{HarnessError, Result};
use crate::storage::{count_rows, DbPool};
use std::collections::BTreeMap;

/// Expected row count per entity table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityCounts(BTreeMap<String, i64>);

impl EntityCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `count` rows in `table`
    pub fn expect<T: Into<String>>(mut self, table: T, count: i64) -> Self {
        self.0.insert(table.into(), count);
        self
    }

    pub fn get(&self, table: &str) -> Option<i64> {
        self.0.get(table).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(table, count)| (table.as_str(), *count))
    }
}

impl<T: Into<String>> FromIterator<(T, i64)> for EntityCounts {
    fn from_iter<I: IntoIterator<Item = (T, i64)>>(iter: I) -> Self {
        let counts = iter.into_iter().map(|(table, count)| (table.into(), count));
        Self(counts.collect())
    }
}

/// Actual row counts observed during verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountReport {
    pub actual: BTreeMap<String, i64>,
}

/// Compare expected counts against the tables behind `pool`.
///
/// Every table is counted before failing, so the error names all mismatches.
pub async fn verify_entity_counts(
    pool: &DbPool,
    prefix: &TablePrefix,
    expected: &EntityCounts,
) -> Result<CountReport> {
    let mut report = CountReport::default();
    let mut mismatches = Vec::new();

    for (table, expected_count) in expected.iter() {
        let real_count = count_rows(pool, prefix, table).await?;
        if real_count != expected_count {
            tracing::warn!(table, real_count, expected_count, "Entity count mismatch");
            mismatches.push(format!(
                "Found {} {} entities, expected {}",
                real_count, table, expected_count
            ));
        }
        report.actual.insert(table.to_string(), real_count);
    }

    if mismatches.is_empty() {
        tracing::info!(tables = expected.len(), "Entity counts verified");
        Ok(report)
    } else {
        Err(HarnessError::Verification { mismatches })
    }
}
