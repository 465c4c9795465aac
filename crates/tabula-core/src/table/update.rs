//! Predicate and literal generation for field-matching updates.
//!
//! Each input record becomes one [`UpdatePlan`]: an equality predicate on the
//! unique field and a list of `column = <sql literal>` assignments for every
//! other field. Plans are built for the whole batch before any write is
//! issued, so malformed input fails without touching the table.

use serde_json::Value;
use tabula_types::error::TableError;
use tabula_types::record::RecordSet;

use super::insert::require_unique_field;

/// Quote a string as an SQL literal, doubling embedded single quotes.
pub fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote a column name for use in a predicate.
///
/// Plain identifiers are left alone; anything else is wrapped in backticks.
pub fn quote_identifier(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Equality predicate matching rows whose `field` equals `value`.
///
/// The value is always string-quoted, so the predicate only matches a string
/// column. Numbers and booleans are written as their text form; callers
/// check the column type before issuing the predicate.
pub fn equality_predicate(field: &str, value: &Value) -> Result<String, TableError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return Err(TableError::InvalidArgument(format!(
                "unique field '{field}' must be a scalar, got {other}"
            )));
        }
    };
    Ok(format!("{} = {}", quote_identifier(field), quote_string(&text)))
}

/// Render a JSON value as an SQL literal expression.
pub fn sql_literal(value: &Value) -> Result<String, TableError> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(quote_string(s)),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| match item {
                    Value::Array(_) | Value::Object(_) => Err(TableError::InvalidArgument(
                        "nested arrays and objects cannot be used as update values".to_string(),
                    )),
                    scalar => sql_literal(scalar),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", parts.join(", ")))
        }
        Value::Object(_) => Err(TableError::InvalidArgument(
            "objects cannot be used as update values".to_string(),
        )),
    }
}

/// One update call: rows matching `predicate` get `assignments` applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub predicate: String,
    /// `(column, sql expression)` pairs.
    pub assignments: Vec<(String, String)>,
}

/// Build one update plan per record.
///
/// Records carrying nothing but the unique field produce no plan.
pub fn plan_updates(records: &RecordSet, unique_field: &str) -> Result<Vec<UpdatePlan>, TableError> {
    require_unique_field(unique_field)?;

    let mut plans = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let unique_value = record.get(unique_field).ok_or_else(|| {
            TableError::InvalidArgument(format!(
                "record {i} is missing unique field '{unique_field}'"
            ))
        })?;
        let predicate = equality_predicate(unique_field, unique_value)?;

        let assignments = record
            .iter()
            .filter(|(k, _)| k.as_str() != unique_field)
            .map(|(k, v)| sql_literal(v).map(|lit| (k.clone(), lit)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| match e {
                TableError::InvalidArgument(msg) => {
                    TableError::InvalidArgument(format!("record {i}: {msg}"))
                }
                other => other,
            })?;

        if assignments.is_empty() {
            tracing::debug!(record = i, "skipping update with no fields to patch");
            continue;
        }

        plans.push(UpdatePlan {
            predicate,
            assignments,
        });
    }
    Ok(plans)
}
