//! Per-table CRUD operations.
//!
//! `TableApi` is pure orchestration: validation, then statement building, then
//! execution on one pooled connection. It holds no state beyond the table it
//! serves and handles to shared services.

use crate::crud::builder::QueryBuilder;
use crate::crud::validation::{ValidatedRecord, ValidationEngine, WriteMode};
use crate::db::executor::StatementExecutor;
use crate::db::pool::ConnectionManager;
use crate::db::types::param_to_json;
use crate::error::{DbError, DbResult};
use crate::models::{ListPage, QueryParam, QuerySpec, Record, TableDescriptor};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of `delete`; a missing row is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

#[derive(Debug, Clone)]
pub struct TableApi {
    connection_id: String,
    table: String,
    read_only: bool,
    manager: Arc<ConnectionManager>,
    builder: QueryBuilder,
    executor: StatementExecutor,
}

impl TableApi {
    /// Bind the operations for `table` on a registered data source.
    pub async fn new(
        manager: Arc<ConnectionManager>,
        connection_id: &str,
        table: &str,
        max_page_size: u32,
    ) -> DbResult<Self> {
        let config = manager.config(connection_id).await?;
        Ok(Self {
            connection_id: connection_id.to_string(),
            table: table.to_string(),
            read_only: config.is_read_only(),
            builder: QueryBuilder::for_backend(config.backend(), max_page_size),
            executor: StatementExecutor::new(config.statement_timeout()),
            manager,
        })
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn descriptor(&self, cancel: &CancellationToken) -> DbResult<Arc<TableDescriptor>> {
        self.manager
            .describe_table(&self.connection_id, &self.table, cancel)
            .await
    }

    /// One page of matching records plus the total match count.
    pub async fn list(&self, spec: &QuerySpec, cancel: &CancellationToken) -> DbResult<ListPage> {
        let table = self.descriptor(cancel).await?;
        let select = self.builder.build_select(&table, spec)?;
        let count = self.builder.build_count(&table, spec)?;
        debug!(
            connection_id = %self.connection_id,
            table = %self.table,
            filters = spec.filters.len(),
            "Listing records"
        );

        let executor = self.executor;
        self.manager
            .with_connection(&self.connection_id, cancel, "list", move |conn| {
                Box::pin(async move {
                    let total = executor.fetch_count(conn, &count).await?;
                    let records = executor.fetch_records(conn, &select, &table).await?;
                    Ok(ListPage { records, total })
                })
            })
            .await
    }

    /// The record with key `id`, or `None` when no row has it.
    pub async fn get(&self, id: &str, cancel: &CancellationToken) -> DbResult<Option<Record>> {
        let table = self.descriptor(cancel).await?;
        let select = self.builder.build_select_by_id(&table, id)?;

        let executor = self.executor;
        self.manager
            .with_connection(&self.connection_id, cancel, "get", move |conn| {
                Box::pin(async move { executor.fetch_optional(conn, &select, &table).await })
            })
            .await
    }

    /// Insert `record` and return the stored row.
    pub async fn create(&self, record: &Record, cancel: &CancellationToken) -> DbResult<Record> {
        self.ensure_writable("create")?;
        let table = self.descriptor(cancel).await?;
        let prepared = ValidationEngine::prepare(&table, record, WriteMode::Insert)?;
        let insert = self.builder.build_insert(&table, &prepared)?;

        let executor = self.executor;
        let builder = self.builder;
        let created = self
            .manager
            .with_connection(&self.connection_id, cancel, "create", move |conn| {
                Box::pin(async move {
                    if builder.returns_rows() {
                        return executor
                            .fetch_optional(conn, &insert, &table)
                            .await?
                            .ok_or_else(|| DbError::internal("insert returned no row"));
                    }

                    let outcome = executor.execute(conn, &insert).await?;
                    let Some(id) = inserted_key(&table, &prepared, outcome.last_insert_id) else {
                        // Without a usable key the stored row cannot be read back
                        return Ok(echo_record(&prepared));
                    };
                    let select = builder.build_select_by_id(&table, &id)?;
                    Ok(executor
                        .fetch_optional(conn, &select, &table)
                        .await?
                        .unwrap_or_else(|| echo_record(&prepared)))
                })
            })
            .await?;

        info!(connection_id = %self.connection_id, table = %self.table, "Record created");
        Ok(created)
    }

    /// Apply the partial `record` to the row with key `id`.
    ///
    /// Returns `None` when no row has that key. An empty record changes
    /// nothing and returns the current row.
    pub async fn update(
        &self,
        id: &str,
        record: &Record,
        cancel: &CancellationToken,
    ) -> DbResult<Option<Record>> {
        self.ensure_writable("update")?;
        let table = self.descriptor(cancel).await?;
        let prepared = ValidationEngine::prepare(&table, record, WriteMode::Update)?;
        if prepared.is_empty() {
            return self.get(id, cancel).await;
        }
        let update = self.builder.build_update(&table, id, &prepared)?;
        // The key may itself be among the updated columns
        let reread = self
            .builder
            .build_select_by_id(&table, &updated_key(&table, id, &prepared))?;

        let executor = self.executor;
        let builder = self.builder;
        let updated = self
            .manager
            .with_connection(&self.connection_id, cancel, "update", move |conn| {
                Box::pin(async move {
                    if builder.returns_rows() {
                        return executor.fetch_optional(conn, &update, &table).await;
                    }
                    let outcome = executor.execute(conn, &update).await?;
                    debug!(rows_affected = outcome.rows_affected, "Update applied");
                    // Matched-row count; zero means the key addressed nothing
                    if outcome.rows_affected == 0 {
                        return Ok(None);
                    }
                    executor.fetch_optional(conn, &reread, &table).await
                })
            })
            .await?;

        if updated.is_some() {
            info!(connection_id = %self.connection_id, table = %self.table, id = %id, "Record updated");
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &str, cancel: &CancellationToken) -> DbResult<DeleteOutcome> {
        self.ensure_writable("delete")?;
        let table = self.descriptor(cancel).await?;
        let delete = self.builder.build_delete(&table, id)?;

        let executor = self.executor;
        let outcome = self
            .manager
            .with_connection(&self.connection_id, cancel, "delete", move |conn| {
                Box::pin(async move { executor.execute(conn, &delete).await })
            })
            .await?;

        if outcome.rows_affected == 0 {
            return Ok(DeleteOutcome::NotFound);
        }
        info!(connection_id = %self.connection_id, table = %self.table, id = %id, "Record deleted");
        Ok(DeleteOutcome::Deleted)
    }

    fn ensure_writable(&self, operation: &str) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::permission(
                operation,
                format!("data source '{}' is read-only", self.connection_id),
            ));
        }
        Ok(())
    }
}

/// Path text for one key value, as `build_select_by_id` parses it back.
fn key_text(param: &QueryParam) -> String {
    match param {
        QueryParam::Int(i) => i.to_string(),
        QueryParam::String(s) => s.clone(),
        other => match param_to_json(other) {
            JsonValue::String(s) => s,
            value => value.to_string(),
        },
    }
}

/// Key of a freshly inserted row on a backend without `RETURNING`.
fn inserted_key(
    table: &TableDescriptor,
    record: &ValidatedRecord,
    last_insert_id: Option<u64>,
) -> Option<String> {
    let mut parts = Vec::with_capacity(table.primary_key().len());
    for column in table.primary_key_columns() {
        match record.get(&column.name) {
            Some(value) if !value.is_null() => parts.push(key_text(value)),
            _ if column.auto_generated && table.primary_key().len() == 1 => {
                parts.push(last_insert_id?.to_string())
            }
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

/// Key of the row after an update that may have changed key columns.
fn updated_key(table: &TableDescriptor, id: &str, record: &ValidatedRecord) -> String {
    let key_columns: Vec<_> = table.primary_key_columns().collect();
    if !key_columns.iter().any(|c| record.get(&c.name).is_some()) {
        return id.to_string();
    }
    let original: Vec<&str> = if key_columns.len() == 1 {
        vec![id]
    } else {
        id.split(',').collect()
    };
    key_columns
        .iter()
        .enumerate()
        .map(|(i, column)| match record.get(&column.name) {
            Some(value) => key_text(value),
            None => original.get(i).map(|s| s.to_string()).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn echo_record(record: &ValidatedRecord) -> Record {
    record
        .values()
        .iter()
        .map(|(name, value)| (name.clone(), param_to_json(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalType, ColumnDescriptor};
    use serde_json::json;

    fn table(auto: bool) -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", CanonicalType::Integer, "bigint");
        if auto {
            id = id.auto_generated();
        }
        TableDescriptor::new(
            "users",
            vec![
                id,
                ColumnDescriptor::new("name", CanonicalType::String, "varchar(20)"),
            ],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    fn prepared(table: &TableDescriptor, value: JsonValue, mode: WriteMode) -> ValidatedRecord {
        ValidationEngine::prepare(table, value.as_object().unwrap(), mode).unwrap()
    }

    #[test]
    fn test_inserted_key_prefers_supplied_value() {
        let t = table(true);
        let record = prepared(&t, json!({"id": 9, "name": "a"}), WriteMode::Insert);
        assert_eq!(inserted_key(&t, &record, Some(3)).as_deref(), Some("9"));

        let record = prepared(&t, json!({"name": "a"}), WriteMode::Insert);
        assert_eq!(inserted_key(&t, &record, Some(3)).as_deref(), Some("3"));
        assert_eq!(inserted_key(&t, &record, None), None);
    }

    #[test]
    fn test_inserted_key_without_generated_key() {
        let t = table(false);
        let record = prepared(&t, json!({"name": "a"}), WriteMode::Insert);
        assert_eq!(inserted_key(&t, &record, Some(3)), None);
    }

    #[test]
    fn test_updated_key_follows_key_change() {
        let t = table(true);
        let record = prepared(&t, json!({"name": "b"}), WriteMode::Update);
        assert_eq!(updated_key(&t, "4", &record), "4");

        let record = prepared(&t, json!({"id": 12}), WriteMode::Update);
        assert_eq!(updated_key(&t, "4", &record), "12");
    }

    #[test]
    fn test_echo_record() {
        let t = table(false);
        let record = prepared(&t, json!({"id": 1, "name": "Ann"}), WriteMode::Insert);
        assert_eq!(
            JsonValue::Object(echo_record(&record)),
            json!({"id": 1, "name": "Ann"})
        );
    }

    #[test]
    fn test_key_text() {
        assert_eq!(key_text(&QueryParam::Int(-5)), "-5");
        assert_eq!(key_text(&QueryParam::String("a,b".into())), "a,b");
        assert_eq!(key_text(&QueryParam::Bool(true)), "true");
    }
}
