//! Duplicate detection over a column subset.

use serde_json::Value;
use std::collections::HashSet;
use tabula_types::error::TableError;

/// Validate the subset against the schema. An empty subset means all columns.
pub fn resolve_subset(schema_columns: &[String], subset: &[String]) -> Result<Vec<String>, TableError> {
    if subset.is_empty() {
        return Ok(schema_columns.to_vec());
    }
    if let Some(unknown) = subset.iter().find(|c| !schema_columns.contains(c)) {
        return Err(TableError::InvalidArgument(format!(
            "column '{unknown}' is not in the table schema"
        )));
    }
    Ok(subset.to_vec())
}

/// Identity key for one row restricted to the subset columns.
pub fn row_key(values: &[Value]) -> String {
    Value::Array(values.to_vec()).to_string()
}

/// Indices of the rows to keep: the first occurrence of each key.
pub fn first_occurrences<I>(keys: I) -> Vec<usize>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .enumerate()
        .filter_map(|(i, key)| seen.insert(key).then_some(i))
        .collect()
}
