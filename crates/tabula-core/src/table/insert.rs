//! Duplicate-aware insert planning.
//!
//! The unique field is a caller-chosen identity key the engine does not
//! enforce. Before an append, the manager reads every existing value of the
//! field and asks [`plan_insert`] which input records are new.

use std::collections::HashSet;

use serde_json::Value;
use tabula_types::error::TableError;
use tabula_types::outcome::AddOutcome;
use tabula_types::record::RecordSet;

/// Reject an empty unique-field name.
pub fn require_unique_field(unique_field: &str) -> Result<(), TableError> {
    if unique_field.trim().is_empty() {
        return Err(TableError::InvalidArgument(
            "unique field must be specified".to_string(),
        ));
    }
    Ok(())
}

/// Identity key for a unique-field value.
///
/// Compact JSON text, so `"1"` and `1` are different identities.
pub fn value_key(value: &Value) -> String {
    value.to_string()
}

/// Records that survive the duplicate check, plus what was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub records: RecordSet,
    pub skipped_existing: usize,
    pub skipped_in_batch: usize,
}

impl InsertPlan {
    /// The outcome reported once `records` has been written.
    pub fn outcome(&self) -> AddOutcome {
        AddOutcome {
            inserted: self.records.len(),
            skipped_existing: self.skipped_existing,
            skipped_in_batch: self.skipped_in_batch,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Keep only records whose unique value is absent from `existing`.
///
/// When the batch itself repeats a unique value, the first occurrence in
/// input order is kept and the rest are counted as `skipped_in_batch`.
pub fn plan_insert(
    records: RecordSet,
    unique_field: &str,
    existing: &HashSet<String>,
) -> Result<InsertPlan, TableError> {
    require_unique_field(unique_field)?;

    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut accepted = RecordSet::new();
    let mut skipped_existing = 0;
    let mut skipped_in_batch = 0;

    for (i, record) in records.into_iter().enumerate() {
        let key = match record.get(unique_field) {
            Some(Value::Null) | None => {
                return Err(TableError::InvalidArgument(format!(
                    "record {i} has no value for unique field '{unique_field}'"
                )));
            }
            Some(value) => value_key(value),
        };

        if existing.contains(&key) {
            skipped_existing += 1;
        } else if !seen.insert(key) {
            skipped_in_batch += 1;
        } else {
            accepted.push(record);
        }
    }

    tracing::debug!(
        accepted = accepted.len(),
        skipped_existing,
        skipped_in_batch,
        "planned duplicate-aware insert"
    );

    Ok(InsertPlan {
        records: accepted,
        skipped_existing,
        skipped_in_batch,
    })
}
