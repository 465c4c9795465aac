//! Pagination and column projection for fetch and search.

use tabula_types::error::TableError;
use tabula_types::query::{PageSize, ROW_ID_COLUMN};

/// Limit/offset pair handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

/// Translate a 1-based page and page size into limit/offset.
///
/// `PageSize::All` requests every row, bounded by `row_count`: an unbounded
/// limit combined with a filter is not honored by the engine.
pub fn paginate(page: usize, per_page: PageSize, row_count: usize) -> Result<Pagination, TableError> {
    if page == 0 {
        return Err(TableError::InvalidArgument(
            "page numbers start at 1".to_string(),
        ));
    }
    match per_page {
        PageSize::All => Ok(Pagination {
            limit: row_count,
            offset: 0,
        }),
        PageSize::Limit(0) => Err(TableError::InvalidArgument(
            "per_page must be positive or -1".to_string(),
        )),
        PageSize::Limit(n) => Ok(Pagination {
            limit: n,
            offset: (page - 1).checked_mul(n).ok_or_else(|| {
                TableError::InvalidArgument(format!("page {page} is out of range"))
            })?,
        }),
    }
}

/// Schema columns minus the excluded ones, in schema order.
pub fn included_columns(schema_columns: &[String], exclude: &[String]) -> Vec<String> {
    schema_columns
        .iter()
        .filter(|c| !exclude.contains(c))
        .cloned()
        .collect()
}

/// Row ids are returned unless the caller excluded `_rowid`.
pub fn wants_row_id(exclude: &[String]) -> bool {
    !exclude.iter().any(|c| c == ROW_ID_COLUMN)
}
