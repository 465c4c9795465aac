//! Arrow schema construction from column definitions.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::collections::HashSet;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

use tabula_types::error::TableError;
use tabula_types::query::{DISTANCE_COLUMN, ROW_ID_COLUMN};
use tabula_types::schema::{ColumnSpec, ColumnType};

/// Output width of the default local embedding model (BGESmallENV15).
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Build an Arrow schema from column definitions.
///
/// Column names must be non-empty, unique, and must not shadow the engine's
/// `_rowid` or `_distance` columns.
pub fn arrow_schema(columns: &[ColumnSpec]) -> Result<Schema, TableError> {
    if columns.is_empty() {
        return Err(TableError::InvalidArgument(
            "a table needs at least one column".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let fields = columns
        .iter()
        .map(|column| {
            let name = column.name.trim();
            if name.is_empty() {
                return Err(TableError::InvalidArgument("column name is empty".to_string()));
            }
            if name == ROW_ID_COLUMN || name == DISTANCE_COLUMN {
                return Err(TableError::InvalidArgument(format!(
                    "column name '{name}' is reserved"
                )));
            }
            if !seen.insert(name) {
                return Err(TableError::InvalidArgument(format!(
                    "duplicate column '{name}'"
                )));
            }
            Ok(Field::new(name, data_type(column)?, column.nullable))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Schema::new(fields))
}

fn data_type(column: &ColumnSpec) -> Result<DataType, TableError> {
    let item = |dt| Arc::new(Field::new("item", dt, true));
    Ok(match column.column_type {
        ColumnType::String => DataType::Utf8,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float32 => DataType::Float32,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::FloatList => DataType::List(item(DataType::Float64)),
        ColumnType::StringList => DataType::List(item(DataType::Utf8)),
        ColumnType::Vector => {
            let dimension = column
                .dimension
                .filter(|d| *d > 0)
                .and_then(|d| i32::try_from(d).ok())
                .ok_or_else(|| {
                    TableError::InvalidArgument(format!(
                        "vector column '{}' needs a positive dimension",
                        column.name
                    ))
                })?;
            DataType::FixedSizeList(item(DataType::Float32), dimension)
        }
    })
}

/// Short, user-facing label for a column type (`string`, `vector[384]`, ...).
pub fn type_label(data_type: &DataType) -> String {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "string".to_string(),
        DataType::Boolean => "bool".to_string(),
        DataType::FixedSizeList(item, size) if item.data_type().is_floating() => {
            format!("vector[{size}]")
        }
        DataType::List(item) | DataType::LargeList(item) => {
            format!("list<{}>", type_label(item.data_type()))
        }
        other => other.to_string().to_lowercase(),
    }
}
