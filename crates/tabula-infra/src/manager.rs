//! Table data manager: the public face of Tabula.
//!
//! `TableDataManager` wraps one LanceDB connection and exposes table-level
//! operations over [`RecordSet`]s: duplicate-safe add, predicate updates,
//! paginated fetch, embedding-backed search, and the delete family.
//!
//! Every operation returns a typed `Result`. Failures are logged at ERROR
//! level by the operation's span (`#[instrument(err)]`) and then returned.
//!
//! The embedder is built at most once, on first use, from the configured
//! provider name. Tests and embedding callers can inject a ready one with
//! [`TableDataManager::with_embedder`].

use std::collections::HashSet;

use arrow_array::{ArrayRef, RecordBatch, RecordBatchIterator, UInt64Array};
use arrow_schema::{DataType, SchemaRef};
use arrow_select::concat::concat_batches;
use arrow_select::take::take_record_batch;
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::table::AddDataMode;
use tokio::sync::{OnceCell, RwLock};

use tabula_core::credential::DynCredentialProvider;
use tabula_core::embedding::BoxEmbedder;
use tabula_core::storage::StorageProvider;
use tabula_core::table::dedup::{first_occurrences, resolve_subset, row_key};
use tabula_core::table::insert::{plan_insert, require_unique_field, value_key};
use tabula_core::table::page::{included_columns, paginate, wants_row_id};
use tabula_core::table::update::plan_updates;
use tabula_types::config::TabulaConfig;
use tabula_types::error::TableError;
use tabula_types::outcome::AddOutcome;
use tabula_types::query::{FetchOptions, OutputFormat, PageSize, SearchOptions};
use tabula_types::record::RecordSet;

use crate::arrow::{
    arrow_error, batches_to_records, cell_value, coerce_field, records_to_batch, schema_columns,
};
use crate::embedder::build_embedder;
use crate::lance::{LanceConnection, engine_error};
use crate::schema::type_label;

/// Rows returned by fetch and search.
#[derive(Debug, Clone)]
pub enum Rows {
    /// Arrow record batches as produced by the engine.
    Frame(Vec<RecordBatch>),
    /// One mapping per row.
    Records(RecordSet),
}

impl Rows {
    fn from_batches(batches: Vec<RecordBatch>, format: OutputFormat) -> Result<Self, TableError> {
        match format {
            OutputFormat::Frame => Ok(Rows::Frame(batches)),
            OutputFormat::Records => Ok(Rows::Records(batches_to_records(&batches)?)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Rows::Frame(batches) => batches.iter().map(RecordBatch::num_rows).sum(),
            Rows::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to records regardless of the format that was requested.
    pub fn into_records(self) -> Result<RecordSet, TableError> {
        match self {
            Rows::Frame(batches) => batches_to_records(&batches),
            Rows::Records(records) => Ok(records),
        }
    }
}

/// Manager for the tables of one database.
pub struct TableDataManager<S: StorageProvider> {
    storage: S,
    config: TabulaConfig,
    credentials: Vec<DynCredentialProvider>,
    db: RwLock<LanceConnection>,
    embedder: OnceCell<BoxEmbedder>,
}

impl<S: StorageProvider> TableDataManager<S> {
    /// Resolve the storage location and open the database.
    pub async fn new(
        storage: S,
        config: TabulaConfig,
        credentials: Vec<DynCredentialProvider>,
    ) -> Result<Self, TableError> {
        let location = storage.resolve().await?;
        let db = LanceConnection::open(&location).await?;
        tracing::info!(storage = %storage.describe(), "Table data manager connected");

        Ok(Self {
            storage,
            config,
            credentials,
            db: RwLock::new(db),
            embedder: OnceCell::new(),
        })
    }

    /// Use `embedder` for vector search instead of building one from config.
    pub fn with_embedder(self, embedder: BoxEmbedder) -> Self {
        Self {
            embedder: OnceCell::new_with(Some(embedder)),
            ..self
        }
    }

    async fn conn(&self) -> LanceConnection {
        self.db.read().await.clone()
    }

    /// Reopen the database and replace the current handle.
    ///
    /// Storage credentials are resolved again, so refreshed tokens take
    /// effect. Returns the table names visible through the new handle.
    #[tracing::instrument(name = "connect", skip(self), fields(storage = %self.storage.describe()), err)]
    pub async fn connect(&self) -> Result<Vec<String>, TableError> {
        let location = self.storage.resolve().await?;
        let conn = LanceConnection::open(&location).await?;
        let names = conn.table_names().await?;
        *self.db.write().await = conn;
        tracing::info!(tables = names.len(), "Reconnected");
        Ok(names)
    }

    /// Table names, without logging failures.
    pub async fn table_names(&self) -> Result<Vec<String>, TableError> {
        self.conn().await.table_names().await
    }

    #[tracing::instrument(name = "list_tables", skip(self), err)]
    pub async fn list_tables(&self) -> Result<Vec<String>, TableError> {
        self.table_names().await
    }

    #[tracing::instrument(name = "get_table", skip(self), err)]
    pub async fn get_table(&self, table: &str) -> Result<lancedb::Table, TableError> {
        self.conn().await.open_table(table).await
    }

    #[tracing::instrument(name = "table_schema", skip(self), err)]
    pub async fn table_schema(&self, table: &str) -> Result<SchemaRef, TableError> {
        let table = self.conn().await.open_table(table).await?;
        table.schema().await.map_err(engine_error)
    }

    #[tracing::instrument(name = "count_rows", skip(self), err)]
    pub async fn count_rows(&self, table: &str, filter: Option<&str>) -> Result<usize, TableError> {
        let table = self.conn().await.open_table(table).await?;
        table
            .count_rows(filter.map(str::to_string))
            .await
            .map_err(engine_error)
    }

    /// Create an empty table. Without `overwrite`, an existing table is
    /// `AlreadyExists`.
    #[tracing::instrument(name = "create_table", skip(self, schema), err)]
    pub async fn create_table(
        &self,
        table: &str,
        schema: SchemaRef,
        overwrite: bool,
    ) -> Result<lancedb::Table, TableError> {
        let created = self
            .conn()
            .await
            .create_empty_table(table, schema, overwrite)
            .await?;
        tracing::info!(table, overwrite, "Table created");
        Ok(created)
    }

    /// Open the table, creating it empty if it does not exist.
    #[tracing::instrument(name = "create_schema", skip(self, schema), err)]
    pub async fn create_schema(
        &self,
        table: &str,
        schema: SchemaRef,
    ) -> Result<lancedb::Table, TableError> {
        self.conn().await.ensure_table(table, schema).await
    }

    /// Append the records whose `unique_field` value is not in the table yet.
    ///
    /// Within the batch, the first record carrying a value wins. Returns
    /// what was inserted and skipped; nothing is written when every record
    /// is a duplicate.
    #[tracing::instrument(name = "add_data", skip(self, records), fields(records = records.len()), err)]
    pub async fn add_data(
        &self,
        table: &str,
        records: RecordSet,
        unique_field: &str,
    ) -> Result<AddOutcome, TableError> {
        require_unique_field(unique_field)?;
        if records.is_empty() {
            return Ok(AddOutcome::default());
        }

        let handle = self.conn().await.open_table(table).await?;
        let schema = handle.schema().await.map_err(engine_error)?;
        let field = schema.field_with_name(unique_field).map_err(|_| {
            TableError::InvalidArgument(format!(
                "unique field '{unique_field}' is not in the schema of '{table}'"
            ))
        })?;

        // Compare values the way they will be stored.
        let records = coerce_field(field, records)?;
        let existing = existing_keys(&handle, unique_field).await?;
        let plan = plan_insert(records, unique_field, &existing)?;

        if plan.is_empty() {
            tracing::info!(
                table,
                skipped = plan.outcome().skipped(),
                "No new records to add"
            );
            return Ok(plan.outcome());
        }

        let batch = records_to_batch(schema.clone(), &plan.records)?;
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        handle.add(reader).execute().await.map_err(engine_error)?;

        let outcome = plan.outcome();
        tracing::info!(
            table,
            inserted = outcome.inserted,
            skipped_existing = outcome.skipped_existing,
            skipped_in_batch = outcome.skipped_in_batch,
            "Records added"
        );
        Ok(outcome)
    }

    /// Patch rows matched by each record's `unique_field` value.
    ///
    /// The unique field must be a string column; other types are rejected
    /// before anything is written.
    ///
    /// Returns the number of update calls issued, which is not the number of
    /// rows changed. Calls are not transactional: if one fails, earlier ones
    /// stay applied.
    #[tracing::instrument(name = "update_data", skip(self, records), fields(records = records.len()), err)]
    pub async fn update_data(
        &self,
        table: &str,
        records: &RecordSet,
        unique_field: &str,
    ) -> Result<usize, TableError> {
        let plans = plan_updates(records, unique_field)?;
        let handle = self.conn().await.open_table(table).await?;

        let schema = handle.schema().await.map_err(engine_error)?;
        // Predicates are string-quoted; the engine will not cast them to other types.
        let key_field = schema.field_with_name(unique_field).map_err(|_| {
            TableError::InvalidArgument(format!(
                "unique field '{unique_field}' is not in the schema of '{table}'"
            ))
        })?;
        if !matches!(key_field.data_type(), DataType::Utf8 | DataType::LargeUtf8) {
            return Err(TableError::InvalidArgument(format!(
                "update needs a string unique field, '{unique_field}' is {}",
                type_label(key_field.data_type())
            )));
        }
        for plan in &plans {
            if let Some((column, _)) = plan
                .assignments
                .iter()
                .find(|(column, _)| schema.field_with_name(column).is_err())
            {
                return Err(TableError::InvalidArgument(format!(
                    "column '{column}' is not in the schema of '{table}'"
                )));
            }
        }

        for (applied, plan) in plans.iter().enumerate() {
            let mut update = handle.update().only_if(plan.predicate.clone());
            for (column, expr) in &plan.assignments {
                update = update.column(column.clone(), expr.clone());
            }
            if let Err(e) = update.execute().await {
                tracing::warn!(table, applied, "Update stopped part-way, earlier updates are kept");
                return Err(engine_error(e));
            }
        }

        tracing::info!(table, updates = plans.len(), "Records updated");
        Ok(plans.len())
    }

    /// One page of rows, optionally filtered, with columns excluded.
    #[tracing::instrument(name = "fetch_data", skip(self), err)]
    pub async fn fetch_data(&self, table: &str, options: &FetchOptions) -> Result<Rows, TableError> {
        let handle = self.conn().await.open_table(table).await?;
        let schema = handle.schema().await.map_err(engine_error)?;
        let columns = projection(&schema, &options.exclude_columns)?;

        // Only `PageSize::All` needs the row count, as the limit bound.
        let row_count = match options.per_page {
            PageSize::All => handle.count_rows(None).await.map_err(engine_error)?,
            PageSize::Limit(_) => 0,
        };
        let pagination = paginate(options.page, options.per_page, row_count)?;
        if pagination.limit == 0 {
            return Rows::from_batches(Vec::new(), options.format);
        }

        let mut query = handle
            .query()
            .select(Select::columns(&columns))
            .limit(pagination.limit)
            .offset(pagination.offset);
        if let Some(filter) = &options.filter {
            query = query.only_if(filter.clone());
        }
        if wants_row_id(&options.exclude_columns) {
            query = query.with_row_id();
        }
        tracing::debug!(
            limit = pagination.limit,
            offset = pagination.offset,
            columns = columns.len(),
            "Fetching rows"
        );

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(engine_error)?
            .try_collect()
            .await
            .map_err(engine_error)?;
        Rows::from_batches(batches, options.format)
    }

    /// Embed `query` and return the nearest rows, closest first.
    ///
    /// Each row carries the engine's `_distance` column.
    #[tracing::instrument(name = "vector_search", skip(self, query), err)]
    pub async fn vector_search(
        &self,
        table: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Rows, TableError> {
        if options.limit == 0 {
            return Err(TableError::InvalidArgument(
                "search limit must be positive".to_string(),
            ));
        }

        let handle = self.conn().await.open_table(table).await?;
        let schema = handle.schema().await.map_err(engine_error)?;
        let columns = projection(&schema, &options.exclude_columns)?;

        let embedder = self.ensure_embedder().await?;
        let vector = embedder.embed_one(query).await?;

        let mut search = handle
            .vector_search(vector.as_slice())
            .map_err(engine_error)?
            .select(Select::columns(&columns))
            .limit(options.limit);
        if wants_row_id(&options.exclude_columns) {
            search = search.with_row_id();
        }
        tracing::debug!(limit = options.limit, model = embedder.model_name(), "Searching");

        let batches: Vec<RecordBatch> = search
            .execute()
            .await
            .map_err(engine_error)?
            .try_collect()
            .await
            .map_err(engine_error)?;
        Rows::from_batches(batches, options.format)
    }

    /// The embedder, built from configuration on first call.
    ///
    /// Concurrent first callers wait for a single initialisation. A failed
    /// build is not cached, so the next call tries again.
    pub async fn ensure_embedder(&self) -> Result<&BoxEmbedder, TableError> {
        self.embedder
            .get_or_try_init(|| async {
                let provider = &self.config.database.embedder_provider;
                tracing::info!(provider = %provider, "Initialising embedder");
                build_embedder(provider, &self.config.embedder, &self.credentials).await
            })
            .await
    }

    /// Drop a whole table.
    #[tracing::instrument(name = "delete_table", skip(self), err)]
    pub async fn delete_table(&self, table: &str) -> Result<bool, TableError> {
        self.conn().await.drop_table(table).await?;
        tracing::info!(table, "Table deleted");
        Ok(true)
    }

    /// Delete rows matching an engine predicate.
    #[tracing::instrument(name = "delete_rows", skip(self), err)]
    pub async fn delete_rows(&self, table: &str, condition: &str) -> Result<(), TableError> {
        if condition.trim().is_empty() {
            return Err(TableError::InvalidArgument(
                "delete condition is empty".to_string(),
            ));
        }
        let handle = self.conn().await.open_table(table).await?;
        handle.delete(condition).await.map_err(engine_error)?;
        tracing::info!(table, condition, "Rows deleted");
        Ok(())
    }

    /// Remove rows that repeat an earlier row over `subset` (all columns when
    /// empty). Returns how many rows were removed.
    ///
    /// Reads the whole table into memory and rewrites it when anything is
    /// removed.
    #[tracing::instrument(name = "delete_duplicates", skip(self), err)]
    pub async fn delete_duplicates(
        &self,
        table: &str,
        subset: &[String],
    ) -> Result<usize, TableError> {
        let handle = self.conn().await.open_table(table).await?;
        let schema = handle.schema().await.map_err(engine_error)?;
        let subset = resolve_subset(&schema_columns(&schema), subset)?;

        let row_count = handle.count_rows(None).await.map_err(engine_error)?;
        if row_count == 0 {
            return Ok(0);
        }

        let batches: Vec<RecordBatch> = handle
            .query()
            .limit(row_count)
            .execute()
            .await
            .map_err(engine_error)?
            .try_collect()
            .await
            .map_err(engine_error)?;
        let Some(first) = batches.first() else {
            return Ok(0);
        };
        let all = concat_batches(&first.schema(), &batches).map_err(arrow_error)?;

        let key_columns = subset
            .iter()
            .map(|name| {
                all.column_by_name(name).cloned().ok_or_else(|| {
                    TableError::Engine(format!("column '{name}' missing from scan"))
                })
            })
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        let keys = (0..all.num_rows())
            .map(|row| {
                key_columns
                    .iter()
                    .map(|column| cell_value(column.as_ref(), row))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|values| row_key(&values))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let keep = first_occurrences(keys);
        let removed = all.num_rows() - keep.len();
        if removed == 0 {
            tracing::info!(table, "No duplicate rows found");
            return Ok(0);
        }

        let indices = UInt64Array::from_iter_values(keep.iter().map(|&i| i as u64));
        let deduped = take_record_batch(&all, &indices).map_err(arrow_error)?;
        let deduped_schema = deduped.schema();
        handle
            .add(RecordBatchIterator::new(vec![Ok(deduped)], deduped_schema))
            .mode(AddDataMode::Overwrite)
            .execute()
            .await
            .map_err(engine_error)?;

        tracing::info!(table, removed, kept = keep.len(), "Duplicate rows removed");
        Ok(removed)
    }
}

/// Included columns for a query; excluding every column is an error.
fn projection(schema: &SchemaRef, exclude: &[String]) -> Result<Vec<String>, TableError> {
    let columns = included_columns(&schema_columns(schema), exclude);
    if columns.is_empty() {
        return Err(TableError::InvalidArgument(
            "every column is excluded".to_string(),
        ));
    }
    Ok(columns)
}

/// Identity keys of every non-null `field` value in the table.
async fn existing_keys(
    table: &lancedb::Table,
    field: &str,
) -> Result<HashSet<String>, TableError> {
    let row_count = table.count_rows(None).await.map_err(engine_error)?;
    if row_count == 0 {
        return Ok(HashSet::new());
    }

    let batches: Vec<RecordBatch> = table
        .query()
        .select(Select::columns(&[field]))
        .limit(row_count)
        .execute()
        .await
        .map_err(engine_error)?
        .try_collect()
        .await
        .map_err(engine_error)?;

    let mut keys = HashSet::with_capacity(row_count);
    for batch in &batches {
        let Some(column) = batch.column_by_name(field) else {
            continue;
        };
        for row in 0..batch.num_rows() {
            let value = cell_value(column.as_ref(), row)?;
            if !value.is_null() {
                keys.insert(value_key(&value));
            }
        }
    }
    tracing::debug!(field, existing = keys.len(), "Scanned existing unique values");
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arrow_schema::Schema;
    use serde_json::{Value, json};
    use tabula_core::credential::{CredentialProvider, CredentialScope};
    use tabula_core::embedding::Embedder;
    use tabula_types::query::{DISTANCE_COLUMN, ROW_ID_COLUMN};
    use tabula_types::schema::{ColumnSpec, ColumnType};

    use crate::credential::StaticCredentialProvider;
    use crate::schema::arrow_schema;
    use crate::storage::LocalStorage;

    /// Deterministic embedder: one axis per keyword, plus a constant bias.
    struct KeywordEmbedder {
        calls: Arc<AtomicUsize>,
    }

    const KEYWORDS: [&str; 3] = ["cat", "dog", "fish"];

    fn keyword_vector(text: &str) -> Vec<f32> {
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        v
    }

    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TableError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| keyword_vector(t)).collect())
        }

        fn model_name(&self) -> &str {
            "keyword-test"
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    fn docs_schema() -> SchemaRef {
        Arc::new(
            arrow_schema(&[
                ColumnSpec::new("id", ColumnType::String).required(),
                ColumnSpec::new("text", ColumnType::String),
                ColumnSpec::vector("vector", 4),
            ])
            .unwrap(),
        )
    }

    fn records(value: Value) -> RecordSet {
        RecordSet::try_from(value).unwrap()
    }

    fn doc(id: &str, text: &str) -> Value {
        json!({"id": id, "text": text, "vector": keyword_vector(text)})
    }

    async fn manager(dir: &tempfile::TempDir) -> TableDataManager<LocalStorage> {
        TableDataManager::new(
            LocalStorage::new(dir.path().join("db")),
            TabulaConfig::default(),
            Vec::new(),
        )
        .await
        .expect("Failed to open manager")
    }

    async fn docs_manager(dir: &tempfile::TempDir) -> TableDataManager<LocalStorage> {
        let mgr = manager(dir).await;
        mgr.create_table("docs", docs_schema(), false).await.unwrap();
        mgr
    }

    fn ids(rows: Rows) -> Vec<String> {
        rows.into_records()
            .unwrap()
            .column("id")
            .map(|v| v.and_then(Value::as_str).unwrap_or_default().to_string())
            .collect()
    }

    fn all_rows() -> FetchOptions {
        FetchOptions {
            per_page: PageSize::All,
            format: OutputFormat::Records,
            ..FetchOptions::default()
        }
    }

    #[tokio::test]
    async fn test_connect_lists_tables_and_replaces_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        let names = mgr.connect().await.unwrap();
        assert_eq!(names, vec!["docs"]);
        assert_eq!(mgr.list_tables().await.unwrap(), vec!["docs"]);
        assert!(mgr.get_table("docs").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_missing_table_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(&tmp).await;

        let err = mgr.get_table("ghost").await.unwrap_err();
        assert!(matches!(err, TableError::NotFound(_)));
        let err = mgr
            .add_data("ghost", records(json!([{"id": "a"}])), "id")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_table_and_create_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        let err = mgr.create_table("docs", docs_schema(), false).await.unwrap_err();
        assert!(matches!(err, TableError::AlreadyExists(_)));

        mgr.add_data("docs", records(doc("a", "x")), "id").await.unwrap();
        // create_schema keeps existing data.
        mgr.create_schema("docs", docs_schema()).await.unwrap();
        assert_eq!(mgr.count_rows("docs", None).await.unwrap(), 1);
        // overwrite replaces it.
        mgr.create_table("docs", docs_schema(), true).await.unwrap();
        assert_eq!(mgr.count_rows("docs", None).await.unwrap(), 0);

        let schema = mgr.table_schema("docs").await.unwrap();
        assert_eq!(schema_columns(&schema), vec!["id", "text", "vector"]);
    }

    #[tokio::test]
    async fn test_add_without_overlap_inserts_all() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        let input = records(json!([doc("a", "x"), doc("b", "y"), doc("c", "z")]));
        let outcome = mgr.add_data("docs", input, "id").await.unwrap();

        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.skipped(), 0);
        assert_eq!(mgr.count_rows("docs", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_full_overlap_is_noop_and_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let input = records(json!([doc("a", "x"), doc("b", "y")]));

        mgr.add_data("docs", input.clone(), "id").await.unwrap();
        let again = mgr.add_data("docs", input, "id").await.unwrap();

        assert!(again.is_noop());
        assert_eq!(again.skipped_existing, 2);
        assert_eq!(mgr.count_rows("docs", None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_add_partial_overlap_inserts_only_new() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        mgr.add_data("docs", records(json!([doc("a", "x")])), "id")
            .await
            .unwrap();
        let outcome = mgr
            .add_data("docs", records(json!([doc("a", "x2"), doc("b", "y")])), "id")
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped_existing, 1);
        let rows = mgr.fetch_data("docs", &all_rows()).await.unwrap();
        assert_eq!(ids(rows), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_add_collapses_in_batch_duplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        let input = records(json!([{"id": "a", "text": "x"}, {"id": "a", "text": "y"}]));
        let outcome = mgr.add_data("docs", input, "id").await.unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped_in_batch, 1);
        assert_eq!(mgr.count_rows("docs", Some("id = 'a'")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_requires_unique_field() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        let err = mgr
            .add_data("docs", records(json!([doc("a", "x")])), "")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));

        let err = mgr
            .add_data("docs", records(json!([doc("a", "x")])), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_add_numeric_unique_field_matches_stored_values() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(&tmp).await;
        let schema = Arc::new(Schema::new(vec![
            arrow_schema::Field::new("n", arrow_schema::DataType::Float64, false),
        ]));
        mgr.create_table("nums", schema, false).await.unwrap();

        mgr.add_data("nums", records(json!([{"n": 1}, {"n": 2.5}])), "n")
            .await
            .unwrap();
        let outcome = mgr
            .add_data("nums", records(json!([{"n": 1.0}, {"n": 3}])), "n")
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped_existing, 1);
        assert_eq!(mgr.count_rows("nums", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_patches_matching_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        mgr.add_data("docs", records(json!([doc("a", "x"), doc("b", "y")])), "id")
            .await
            .unwrap();

        let patches = records(json!([
            {"id": "a", "text": "it's new"},
            {"id": "b"},
            {"id": "missing", "text": "nobody"}
        ]));
        let calls = mgr.update_data("docs", &patches, "id").await.unwrap();
        assert_eq!(calls, 2);

        let options = FetchOptions {
            filter: Some("id = 'a'".to_string()),
            ..all_rows()
        };
        let rows = mgr.fetch_data("docs", &options).await.unwrap().into_records().unwrap();
        assert_eq!(rows.records()[0]["text"], "it's new");
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_column_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        mgr.add_data("docs", records(json!([doc("a", "x")])), "id")
            .await
            .unwrap();

        let patches = records(json!([{"id": "a", "text": "changed"}, {"id": "a", "bogus": 1}]));
        let err = mgr.update_data("docs", &patches, "id").await.unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));

        let rows = mgr.fetch_data("docs", &all_rows()).await.unwrap().into_records().unwrap();
        assert_eq!(rows.records()[0]["text"], "x");
    }

    #[tokio::test]
    async fn test_update_rejects_non_string_unique_field() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(&tmp).await;
        let schema = Arc::new(Schema::new(vec![
            arrow_schema::Field::new("k", arrow_schema::DataType::Int64, false),
            arrow_schema::Field::new("t", arrow_schema::DataType::Utf8, true),
        ]));
        mgr.create_table("ints", schema, false).await.unwrap();
        mgr.add_data("ints", records(json!([{"k": 5, "t": "a"}])), "k")
            .await
            .unwrap();

        let err = mgr
            .update_data("ints", &records(json!([{"k": 5, "t": "b"}])), "k")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));

        let rows = mgr.fetch_data("ints", &all_rows()).await.unwrap().into_records().unwrap();
        assert_eq!(rows.records()[0]["t"], "a");
    }

    #[tokio::test]
    async fn test_update_matches_keys_with_quotes() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let input = records(json!([doc("o'brien", "x"), doc("say \"hi\"", "y")]));
        mgr.add_data("docs", input, "id").await.unwrap();

        let patches = records(json!([
            {"id": "o'brien", "text": "patched"},
            {"id": "say \"hi\"", "text": "patched"}
        ]));
        assert_eq!(mgr.update_data("docs", &patches, "id").await.unwrap(), 2);
        assert_eq!(
            mgr.count_rows("docs", Some("text = 'patched'")).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_fetch_pages_are_disjoint_and_cover_table() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let input: Vec<Value> = (0..25).map(|i| doc(&format!("d{i:02}"), "x")).collect();
        mgr.add_data("docs", records(Value::Array(input)), "id")
            .await
            .unwrap();

        let page = |n| FetchOptions {
            page: n,
            per_page: PageSize::Limit(10),
            format: OutputFormat::Records,
            ..FetchOptions::default()
        };
        let first = ids(mgr.fetch_data("docs", &page(1)).await.unwrap());
        let second = ids(mgr.fetch_data("docs", &page(2)).await.unwrap());
        let third = ids(mgr.fetch_data("docs", &page(3)).await.unwrap());

        assert_eq!(first.len(), 10);
        assert_eq!(second.len(), 10);
        assert_eq!(third.len(), 5);
        let mut all: Vec<String> = first.iter().chain(&second).chain(&third).cloned().collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total, "pages overlap");
        assert_eq!(total, 25);
    }

    #[tokio::test]
    async fn test_fetch_all_with_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let input = records(json!([doc("a", "cat"), doc("b", "dog"), doc("c", "cat")]));
        mgr.add_data("docs", input, "id").await.unwrap();

        let everything = mgr.fetch_data("docs", &all_rows()).await.unwrap();
        assert_eq!(everything.len(), 3);

        let options = FetchOptions {
            filter: Some("text = 'cat'".to_string()),
            ..all_rows()
        };
        let cats = ids(mgr.fetch_data("docs", &options).await.unwrap());
        assert_eq!(cats, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_excludes_columns_and_row_id() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        mgr.add_data("docs", records(json!([doc("a", "x")])), "id")
            .await
            .unwrap();

        let options = FetchOptions {
            exclude_columns: vec!["vector".to_string()],
            ..all_rows()
        };
        let rows = mgr.fetch_data("docs", &options).await.unwrap().into_records().unwrap();
        let row = &rows.records()[0];
        assert!(!row.contains_key("vector"));
        assert!(row.contains_key(ROW_ID_COLUMN));

        let options = FetchOptions {
            exclude_columns: vec!["vector".to_string(), ROW_ID_COLUMN.to_string()],
            ..all_rows()
        };
        let rows = mgr.fetch_data("docs", &options).await.unwrap().into_records().unwrap();
        let keys: Vec<&String> = rows.records()[0].keys().collect();
        assert_eq!(keys, vec!["id", "text"]);
    }

    #[tokio::test]
    async fn test_fetch_frame_and_invalid_page() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        let empty = mgr
            .fetch_data("docs", &FetchOptions { per_page: PageSize::All, ..FetchOptions::default() })
            .await
            .unwrap();
        assert!(matches!(empty, Rows::Frame(_)));
        assert!(empty.is_empty());

        let err = mgr
            .fetch_data("docs", &FetchOptions { page: 0, ..FetchOptions::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_vector_search_returns_nearest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mgr = docs_manager(&tmp).await.with_embedder(BoxEmbedder::new(KeywordEmbedder {
            calls: Arc::clone(&calls),
        }));
        let input = records(json!([doc("a", "dog"), doc("b", "cat"), doc("c", "fish")]));
        mgr.add_data("docs", input, "id").await.unwrap();

        let options = SearchOptions {
            limit: 2,
            exclude_columns: vec!["vector".to_string()],
            format: OutputFormat::Records,
        };
        let rows = mgr
            .vector_search("docs", "a small cat", &options)
            .await
            .unwrap()
            .into_records()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows.records()[0]["id"], "b");
        assert!(rows.records()[0].contains_key(DISTANCE_COLUMN));
        assert!(!rows.records()[0].contains_key("vector"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_vector_search_rejects_zero_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let options = SearchOptions {
            limit: 0,
            ..SearchOptions::default()
        };
        let err = mgr.vector_search("docs", "cat", &options).await.unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_embedder_is_initialised_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(&tmp).await.with_embedder(BoxEmbedder::new(KeywordEmbedder {
            calls: Arc::new(AtomicUsize::new(0)),
        }));

        let first = mgr.ensure_embedder().await.unwrap();
        let second = mgr.ensure_embedder().await.unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.model_name(), "keyword-test");
    }

    /// Has an embedding key only after `fail_first` lookups have come back empty.
    struct FlakyKey {
        lookups: AtomicUsize,
        fail_first: usize,
    }

    impl CredentialProvider for FlakyKey {
        async fn api_key(&self, scope: CredentialScope) -> Result<Option<String>, TableError> {
            let n = self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok((scope == CredentialScope::Embedding && n >= self.fail_first)
                .then(|| "sk-test".to_string()))
        }

        async fn bearer_token(&self, _scope: CredentialScope) -> Result<Option<String>, TableError> {
            Ok(None)
        }
    }

    fn openai_config() -> TabulaConfig {
        let mut config = TabulaConfig::default();
        config.database.embedder_provider = "openai".to_string();
        config
    }

    #[tokio::test]
    async fn test_configured_embedder_is_built_once_for_concurrent_callers() {
        let tmp = tempfile::tempdir().unwrap();
        let key: DynCredentialProvider = Arc::new(
            StaticCredentialProvider::new().with_api_key(CredentialScope::Embedding, "sk-test"),
        );
        let mgr = TableDataManager::new(LocalStorage::new(tmp.path()), openai_config(), vec![key])
            .await
            .unwrap();

        let (first, second) = tokio::join!(mgr.ensure_embedder(), mgr.ensure_embedder());
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.model_name(), "text-embedding-3-small");
        assert!(std::ptr::eq(first, mgr.ensure_embedder().await.unwrap()));
    }

    #[tokio::test]
    async fn test_failed_embedder_build_is_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let flaky = Arc::new(FlakyKey {
            lookups: AtomicUsize::new(0),
            fail_first: 1,
        });
        let provider: DynCredentialProvider = flaky.clone();
        let mgr = TableDataManager::new(LocalStorage::new(tmp.path()), openai_config(), vec![provider])
            .await
            .unwrap();

        let err = mgr.ensure_embedder().await.unwrap_err();
        assert!(matches!(err, TableError::Config(_)));

        let embedder = mgr.ensure_embedder().await.unwrap();
        assert_eq!(embedder.model_name(), "text-embedding-3-small");
        assert_eq!(flaky.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_embedder_provider_fails_search() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = TabulaConfig::default();
        config.database.embedder_provider = "nope".to_string();
        let mgr = TableDataManager::new(LocalStorage::new(tmp.path()), config, Vec::new())
            .await
            .unwrap();
        mgr.create_table("docs", docs_schema(), false).await.unwrap();

        let err = mgr
            .vector_search("docs", "cat", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Config(_)));
    }

    #[tokio::test]
    async fn test_delete_table_removes_it_from_list() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;

        assert!(mgr.delete_table("docs").await.unwrap());
        assert!(!mgr.list_tables().await.unwrap().contains(&"docs".to_string()));

        let err = mgr.delete_table("docs").await.unwrap_err();
        assert!(matches!(err, TableError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_rows_by_condition() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let input = records(json!([doc("a", "cat"), doc("b", "dog"), doc("c", "cat")]));
        mgr.add_data("docs", input, "id").await.unwrap();

        mgr.delete_rows("docs", "text = 'cat'").await.unwrap();
        let rows = ids(mgr.fetch_data("docs", &all_rows()).await.unwrap());
        assert_eq!(rows, vec!["b"]);

        let err = mgr.delete_rows("docs", "  ").await.unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_delete_duplicates_over_subset() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        // Distinct ids, so add_data keeps every row; text repeats.
        let input = records(json!([
            doc("a", "cat"),
            doc("b", "dog"),
            doc("c", "cat"),
            doc("d", "fish"),
            doc("e", "cat")
        ]));
        mgr.add_data("docs", input, "id").await.unwrap();

        let removed = mgr
            .delete_duplicates("docs", &["text".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(mgr.count_rows("docs", None).await.unwrap(), 3);

        let rows = mgr.fetch_data("docs", &all_rows()).await.unwrap().into_records().unwrap();
        assert_eq!(rows.column("id").flatten().count(), 3);
        let first = rows.iter().find(|r| r["text"] == "cat").unwrap();
        assert_eq!(first["id"], "a");
        assert_eq!(first["vector"].as_array().map(Vec::len), Some(4));

        assert_eq!(mgr.delete_duplicates("docs", &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_duplicates_unknown_column() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = docs_manager(&tmp).await;
        let err = mgr
            .delete_duplicates("docs", &["nope".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::InvalidArgument(_)));
    }
}
