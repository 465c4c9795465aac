//! Portable column descriptions.
//!
//! Tables are created from a list of [`ColumnSpec`]s, written as JSON or TOML
//! by users who should not have to spell out Arrow types:
//!
//! ```json
//! [
//!   {"name": "id", "type": "string", "nullable": false},
//!   {"name": "text", "type": "string"},
//!   {"name": "vector", "type": "vector", "dimension": 384}
//! ]
//! ```

use serde::{Deserialize, Serialize};

/// Logical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    /// Fixed-dimension float32 embedding vector. Requires `dimension`.
    Vector,
    /// Variable-length list of float64.
    FloatList,
    /// Variable-length list of strings.
    StringList,
}

/// One column of a table to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// Vector width, only for [`ColumnType::Vector`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            dimension: None,
        }
    }

    pub fn vector(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::new(name, ColumnType::Vector)
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}
