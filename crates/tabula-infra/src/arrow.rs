//! Conversion between record sets and Arrow record batches.
//!
//! Writes go through [`records_to_batch`], which builds each column against
//! the table's schema so type mismatches surface as `InvalidArgument` before
//! the engine is called. Reads go through [`batch_to_records`], which turns
//! any supported column into JSON values. Vector columns are
//! `FixedSizeList<Float32|Float64>`; variable-length `List` columns of floats
//! and strings are supported as well.

use std::sync::Arc;

use arrow_array::builder::{FixedSizeListBuilder, ListBuilder, PrimitiveBuilder, StringBuilder};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    ArrowPrimitiveType, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow_array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, RecordBatch, StringArray, UInt32Array, UInt64Array,
};
use arrow_schema::{ArrowError, DataType, Field, FieldRef, Schema, SchemaRef};
use serde_json::{Number, Value};

use tabula_types::error::TableError;
use tabula_types::record::{Record, RecordSet};

pub(crate) fn arrow_error(e: ArrowError) -> TableError {
    TableError::Engine(format!("arrow: {e}"))
}

/// Column names of a schema, in order.
pub fn schema_columns(schema: &Schema) -> Vec<String> {
    schema.fields().iter().map(|f| f.name().clone()).collect()
}

/// Build a record batch matching `schema` from a record set.
///
/// Every record field must exist in the schema. Missing or null values
/// become nulls, which non-nullable fields reject.
pub fn records_to_batch(schema: SchemaRef, records: &RecordSet) -> Result<RecordBatch, TableError> {
    for (row, record) in records.iter().enumerate() {
        if let Some(unknown) = record.keys().find(|k| schema.field_with_name(k).is_err()) {
            return Err(TableError::InvalidArgument(format!(
                "record {row} has field '{unknown}' which is not in the table schema"
            )));
        }
    }

    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            let array = build_column(field, &cells(records, field.name()))?;
            if !field.is_nullable() && array.null_count() > 0 {
                return Err(TableError::InvalidArgument(format!(
                    "field '{}' is required but missing in {} record(s)",
                    field.name(),
                    array.null_count()
                )));
            }
            Ok(array)
        })
        .collect::<Result<Vec<_>, _>>()?;

    RecordBatch::try_new(schema, columns).map_err(arrow_error)
}

/// Rewrite `field` in every record to the value it will have once stored.
///
/// Used before comparing input values against values read back from the
/// table, so `5` bound for a string column compares equal to a stored `"5"`.
pub fn coerce_field(field: &Field, records: RecordSet) -> Result<RecordSet, TableError> {
    let array = build_column(field, &cells(&records, field.name()))?;
    let name = field.name();
    records
        .into_iter()
        .enumerate()
        .map(|(row, mut record)| {
            if record.contains_key(name) {
                record.insert(name.clone(), cell_value(array.as_ref(), row)?);
            }
            Ok(record)
        })
        .collect()
}

/// Convert one record batch into records, one per row.
pub fn batch_to_records(batch: &RecordBatch) -> Result<RecordSet, TableError> {
    let schema = batch.schema();
    (0..batch.num_rows())
        .map(|row| {
            schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, column)| Ok((field.name().clone(), cell_value(column.as_ref(), row)?)))
                .collect::<Result<Record, TableError>>()
        })
        .collect()
}

/// Convert a sequence of record batches (a "frame") into one record set.
pub fn batches_to_records(batches: &[RecordBatch]) -> Result<RecordSet, TableError> {
    let mut records = RecordSet::new();
    for batch in batches {
        for record in batch_to_records(batch)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Read a single cell as a JSON value.
pub fn cell_value(array: &dyn Array, row: usize) -> Result<Value, TableError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Int8 => array.as_primitive::<Int8Type>().value(row).into(),
        DataType::Int16 => array.as_primitive::<Int16Type>().value(row).into(),
        DataType::Int32 => array.as_primitive::<Int32Type>().value(row).into(),
        DataType::Int64 => array.as_primitive::<Int64Type>().value(row).into(),
        DataType::UInt8 => array.as_primitive::<UInt8Type>().value(row).into(),
        DataType::UInt16 => array.as_primitive::<UInt16Type>().value(row).into(),
        DataType::UInt32 => array.as_primitive::<UInt32Type>().value(row).into(),
        DataType::UInt64 => array.as_primitive::<UInt64Type>().value(row).into(),
        DataType::Float32 => float_value(f64::from(array.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => float_value(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Value::String(array.as_string_view().value(row).to_string()),
        DataType::List(_) => list_value(array.as_list::<i32>().value(row).as_ref())?,
        DataType::LargeList(_) => list_value(array.as_list::<i64>().value(row).as_ref())?,
        DataType::FixedSizeList(_, _) => {
            list_value(array.as_fixed_size_list().value(row).as_ref())?
        }
        DataType::Struct(_) => {
            let array = array.as_struct();
            let mut object = Record::new();
            for (field, column) in array.fields().iter().zip(array.columns()) {
                object.insert(field.name().clone(), cell_value(column.as_ref(), row)?);
            }
            Value::Object(object)
        }
        other => {
            return Err(TableError::InvalidArgument(format!(
                "column type {other} cannot be converted to a record value"
            )));
        }
    };
    Ok(value)
}

fn list_value(values: &dyn Array) -> Result<Value, TableError> {
    (0..values.len())
        .map(|i| cell_value(values, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn cells<'a>(records: &'a RecordSet, name: &'a str) -> Vec<Option<&'a Value>> {
    records
        .column(name)
        .map(|v| v.filter(|v| !v.is_null()))
        .collect()
}

fn type_error(field: &str, row: usize, expected: &str, got: &Value) -> TableError {
    TableError::InvalidArgument(format!(
        "field '{field}' row {row}: expected {expected}, got {got}"
    ))
}

fn unsupported(field: &str, data_type: &DataType) -> TableError {
    TableError::InvalidArgument(format!(
        "field '{field}' has unsupported column type {data_type}"
    ))
}

fn build_column(field: &Field, cells: &[Option<&Value>]) -> Result<ArrayRef, TableError> {
    let name = field.name().as_str();
    let array: ArrayRef = match field.data_type() {
        DataType::Utf8 => Arc::new(StringArray::from(scalars(name, cells, "a string", as_text)?)),
        DataType::LargeUtf8 => Arc::new(LargeStringArray::from(scalars(
            name, cells, "a string", as_text,
        )?)),
        DataType::Boolean => Arc::new(BooleanArray::from(scalars(
            name,
            cells,
            "a boolean",
            Value::as_bool,
        )?)),
        DataType::Int32 => Arc::new(Int32Array::from(scalars(
            name,
            cells,
            "a 32-bit integer",
            |v| v.as_i64().and_then(|n| i32::try_from(n).ok()),
        )?)),
        DataType::Int64 => Arc::new(Int64Array::from(scalars(
            name,
            cells,
            "an integer",
            Value::as_i64,
        )?)),
        DataType::UInt32 => Arc::new(UInt32Array::from(scalars(
            name,
            cells,
            "an unsigned 32-bit integer",
            |v| v.as_u64().and_then(|n| u32::try_from(n).ok()),
        )?)),
        DataType::UInt64 => Arc::new(UInt64Array::from(scalars(
            name,
            cells,
            "an unsigned integer",
            Value::as_u64,
        )?)),
        DataType::Float32 => Arc::new(Float32Array::from(scalars(
            name,
            cells,
            "a number",
            |v| v.as_f64().map(|f| f as f32),
        )?)),
        DataType::Float64 => Arc::new(Float64Array::from(scalars(
            name,
            cells,
            "a number",
            Value::as_f64,
        )?)),
        DataType::FixedSizeList(item, size) => match item.data_type() {
            DataType::Float32 => {
                fixed_size_list::<Float32Type>(name, item, *size, cells, |f| f as f32)?
            }
            DataType::Float64 => fixed_size_list::<Float64Type>(name, item, *size, cells, |f| f)?,
            _ => return Err(unsupported(name, field.data_type())),
        },
        DataType::List(item) => match item.data_type() {
            DataType::Float32 => list::<Float32Type>(name, item, cells, |f| f as f32)?,
            DataType::Float64 => list::<Float64Type>(name, item, cells, |f| f)?,
            DataType::Utf8 => string_list(name, item, cells)?,
            _ => return Err(unsupported(name, field.data_type())),
        },
        other => return Err(unsupported(name, other)),
    };
    Ok(array)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalars<T>(
    field: &str,
    cells: &[Option<&Value>],
    expected: &str,
    extract: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>, TableError> {
    cells
        .iter()
        .enumerate()
        .map(|(row, cell)| match cell {
            None => Ok(None),
            Some(v) => extract(v)
                .map(Some)
                .ok_or_else(|| type_error(field, row, expected, v)),
        })
        .collect()
}

fn number_list(field: &str, row: usize, value: &Value) -> Result<Vec<f64>, TableError> {
    let items = value
        .as_array()
        .ok_or_else(|| type_error(field, row, "an array of numbers", value))?;
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| type_error(field, row, "an array of numbers", value))
        })
        .collect()
}

fn fixed_size_list<T: ArrowPrimitiveType>(
    field: &str,
    item: &FieldRef,
    size: i32,
    cells: &[Option<&Value>],
    convert: impl Fn(f64) -> T::Native,
) -> Result<ArrayRef, TableError> {
    let width = usize::try_from(size).map_err(|_| {
        TableError::InvalidArgument(format!("field '{field}' has invalid list size {size}"))
    })?;
    let mut builder = FixedSizeListBuilder::with_capacity(
        PrimitiveBuilder::<T>::with_capacity(cells.len() * width),
        size,
        cells.len(),
    )
    .with_field(Arc::clone(item));

    for (row, cell) in cells.iter().enumerate() {
        match cell {
            Some(value) => {
                let numbers = number_list(field, row, value)?;
                if numbers.len() != width {
                    return Err(TableError::InvalidArgument(format!(
                        "field '{field}' row {row}: expected {width} values, got {}",
                        numbers.len()
                    )));
                }
                for n in numbers {
                    builder.values().append_value(convert(n));
                }
                builder.append(true);
            }
            None => {
                // Null slots still occupy `width` child values.
                for _ in 0..width {
                    builder.values().append_value(T::Native::default());
                }
                builder.append(false);
            }
        }
    }
    Ok(Arc::new(builder.finish()))
}

fn list<T: ArrowPrimitiveType>(
    field: &str,
    item: &FieldRef,
    cells: &[Option<&Value>],
    convert: impl Fn(f64) -> T::Native,
) -> Result<ArrayRef, TableError> {
    let mut builder = ListBuilder::new(PrimitiveBuilder::<T>::new()).with_field(Arc::clone(item));
    for (row, cell) in cells.iter().enumerate() {
        match cell {
            Some(value) => {
                for n in number_list(field, row, value)? {
                    builder.values().append_value(convert(n));
                }
                builder.append(true);
            }
            None => builder.append(false),
        }
    }
    Ok(Arc::new(builder.finish()))
}

fn string_list(field: &str, item: &FieldRef, cells: &[Option<&Value>]) -> Result<ArrayRef, TableError> {
    let mut builder = ListBuilder::new(StringBuilder::new()).with_field(Arc::clone(item));
    for (row, cell) in cells.iter().enumerate() {
        match cell {
            Some(value) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| type_error(field, row, "an array of strings", value))?;
                for item in items {
                    let text =
                        as_text(item).ok_or_else(|| type_error(field, row, "an array of strings", value))?;
                    builder.values().append_value(text);
                }
                builder.append(true);
            }
            None => builder.append(false),
        }
    }
    Ok(Arc::new(builder.finish()))
}
