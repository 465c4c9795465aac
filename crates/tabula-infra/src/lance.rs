//! LanceDB connection wrapper for table lifecycle operations.
//!
//! `LanceConnection` owns a `lancedb::Connection` opened against a resolved
//! [`StorageLocation`] and maps engine errors onto [`TableError`] so the
//! manager never sees a raw `lancedb::Error`.

use std::sync::Arc;

use arrow_schema::Schema;
use lancedb::database::CreateTableMode;

use tabula_core::storage::StorageLocation;
use tabula_types::error::TableError;

/// Map a LanceDB error onto the table error taxonomy.
pub fn engine_error(err: lancedb::Error) -> TableError {
    match err {
        lancedb::Error::TableNotFound { name, .. } => TableError::NotFound(name),
        lancedb::Error::TableAlreadyExists { name, .. } => TableError::AlreadyExists(name),
        lancedb::Error::InvalidInput { message } => TableError::InvalidArgument(message),
        other => TableError::Engine(other.to_string()),
    }
}

/// Open handle to one LanceDB database.
#[derive(Clone)]
pub struct LanceConnection {
    db: lancedb::Connection,
    uri: String,
}

impl std::fmt::Debug for LanceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceConnection").field("uri", &self.uri).finish()
    }
}

impl LanceConnection {
    /// Connect to the database at a resolved storage location.
    ///
    /// Storage options (credentials, account names) are passed through to
    /// the object store untouched.
    pub async fn open(location: &StorageLocation) -> Result<Self, TableError> {
        let db = lancedb::connect(&location.uri)
            .storage_options(location.options.iter().cloned())
            .execute()
            .await
            .map_err(engine_error)?;

        Ok(Self {
            db,
            uri: location.uri.clone(),
        })
    }

    pub async fn table_names(&self) -> Result<Vec<String>, TableError> {
        self.db.table_names().execute().await.map_err(engine_error)
    }

    /// Open an existing table. A missing table is `NotFound`.
    pub async fn open_table(&self, name: &str) -> Result<lancedb::Table, TableError> {
        self.db
            .open_table(name)
            .execute()
            .await
            .map_err(|e| match engine_error(e) {
                TableError::Engine(msg) if msg.contains("not found") => {
                    TableError::NotFound(name.to_string())
                }
                other => other,
            })
    }

    /// Open the table if it exists, otherwise create it empty.
    pub async fn ensure_table(
        &self,
        name: &str,
        schema: Arc<Schema>,
    ) -> Result<lancedb::Table, TableError> {
        match self.open_table(name).await {
            Ok(table) => Ok(table),
            Err(TableError::NotFound(_)) => self.create_empty_table(name, schema, false).await,
            Err(e) => Err(e),
        }
    }

    /// Create an empty table. Without `overwrite`, an existing table is
    /// `AlreadyExists`.
    pub async fn create_empty_table(
        &self,
        name: &str,
        schema: Arc<Schema>,
        overwrite: bool,
    ) -> Result<lancedb::Table, TableError> {
        let mode = if overwrite {
            CreateTableMode::Overwrite
        } else {
            CreateTableMode::Create
        };
        self.db
            .create_empty_table(name, schema)
            .mode(mode)
            .execute()
            .await
            .map_err(engine_error)
    }

    /// Drop a table. A missing table is `NotFound`.
    pub async fn drop_table(&self, name: &str) -> Result<(), TableError> {
        self.db.drop_table(name, &[]).await.map_err(engine_error)
    }
}
