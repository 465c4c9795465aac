//! Record and RecordSet: the normalized input/output form for table rows.
//!
//! A [`Record`] is a mapping from field name to JSON value. A [`RecordSet`]
//! is an ordered batch of records. Every input shape accepted at the API edge
//! (a list of mappings, a single mapping, a JSON document, an Arrow frame in
//! `tabula-infra`) is converted into a `RecordSet` before any table logic runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TableError;

/// A single row: field name to value.
pub type Record = serde_json::Map<String, Value>;

/// An ordered batch of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Values of `field` across all records, in order.
    ///
    /// Records missing the field yield `None`.
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.records.iter().map(move |r| r.get(field))
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl From<Record> for RecordSet {
    fn from(record: Record) -> Self {
        Self {
            records: vec![record],
        }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Accepts a JSON object (one record) or an array of objects.
impl TryFrom<Value> for RecordSet {
    type Error = TableError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(record) => Ok(Self::from(record)),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(TableError::InvalidArgument(format!(
                        "record {i} is not an object: {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::from),
            other => Err(TableError::InvalidArgument(format!(
                "expected an object or an array of objects, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
