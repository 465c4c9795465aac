//! Options for read operations (paginated fetch and vector search).

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Engine-provided row identifier column.
pub const ROW_ID_COLUMN: &str = "_rowid";

/// Engine-provided distance column attached to vector search results.
pub const DISTANCE_COLUMN: &str = "_distance";

/// Shape of the rows returned by fetch and search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Columnar Arrow record batches.
    #[default]
    Frame,
    /// A list of field mappings.
    Records,
}

/// Page size for fetch. `-1` on the wire means [`PageSize::All`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    All,
    Limit(usize),
}

impl PageSize {
    /// Interpret a signed `per_page` value: `-1` is all rows, positive values
    /// are a page size, anything else is rejected.
    pub fn from_per_page(per_page: i64) -> Result<Self, TableError> {
        match per_page {
            -1 => Ok(PageSize::All),
            n if n > 0 => Ok(PageSize::Limit(n as usize)),
            n => Err(TableError::InvalidArgument(format!(
                "per_page must be positive or -1, got {n}"
            ))),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::Limit(10)
    }
}

/// Options for a paginated, column-filtered fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// 1-based page number.
    pub page: usize,
    pub per_page: PageSize,
    /// Engine SQL filter expression, passed through untouched.
    pub filter: Option<String>,
    /// Columns to drop from the projection. Include `_rowid` to omit row ids.
    pub exclude_columns: Vec<String>,
    pub format: OutputFormat,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: PageSize::default(),
            filter: None,
            exclude_columns: Vec::new(),
            format: OutputFormat::default(),
        }
    }
}

/// Options for an embedding-backed similarity search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub exclude_columns: Vec<String>,
    pub format: OutputFormat,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            exclude_columns: Vec::new(),
            format: OutputFormat::default(),
        }
    }
}
