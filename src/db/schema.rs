//! Schema introspection and the per-table schema cache.
//!
//! Catalog statements come from the backend's [`Connector`]; the per-backend
//! submodules only know how to read the catalog rows their engine returns.
//! Everything above this module sees canonical `TableDescriptor`s.

use crate::db::connector::{CatalogQueries, Connector, connector_for, declared_length};
use crate::db::pool::PooledConnection;
use crate::db::types::TypeMapper;
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, CanonicalType, ColumnDescriptor, TableDescriptor};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One column as read from a backend catalog, before type mapping.
#[derive(Debug, Clone, PartialEq)]
struct CatalogColumn {
    name: String,
    native_type: String,
    nullable: bool,
    default_value: Option<String>,
    max_length: Option<i64>,
    auto_generated: bool,
}

/// Schema inspector for database introspection.
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// List the base tables of the connected database.
    pub async fn discover_tables(conn: &mut PooledConnection) -> DbResult<Vec<String>> {
        let catalog = catalog_for(conn.backend())?;
        impl_db_dispatch!(RawConnection, conn.raw_mut(), {
            MySql(c) => mysql::list_tables(c, catalog).await,
            Postgres(c) => postgres::list_tables(c, catalog).await,
            SQLite(c) => sqlite::list_tables(c, catalog).await,
        })
    }

    /// Read one table's columns and primary key from the catalog.
    pub async fn describe_table(
        conn: &mut PooledConnection,
        table_name: &str,
    ) -> DbResult<TableDescriptor> {
        let backend = conn.backend();
        let catalog = catalog_for(backend)?;
        let (columns, primary_key) = impl_db_dispatch!(RawConnection, conn.raw_mut(), {
            MySql(c) => (
                mysql::fetch_columns(c, catalog, table_name).await?,
                mysql::fetch_primary_key(c, catalog, table_name).await?,
            ),
            Postgres(c) => (
                postgres::fetch_columns(c, catalog, table_name).await?,
                postgres::fetch_primary_key(c, catalog, table_name).await?,
            ),
            SQLite(c) => (
                sqlite::fetch_columns(c, catalog, table_name).await?,
                sqlite::fetch_primary_key(c, catalog, table_name).await?,
            ),
        });

        if columns.is_empty() {
            return Err(DbError::table_not_found(table_name));
        }

        debug!(
            table = %table_name,
            columns = columns.len(),
            primary_key = ?primary_key,
            "Introspected table"
        );
        build_descriptor(connector_for(backend), table_name, columns, primary_key)
    }
}

fn catalog_for(backend: BackendKind) -> DbResult<&'static CatalogQueries> {
    connector_for(backend)
        .catalog()
        .ok_or_else(|| DbError::introspection_unsupported(backend.display_name()))
}

fn build_descriptor(
    connector: &dyn Connector,
    table_name: &str,
    columns: Vec<CatalogColumn>,
    primary_key: Vec<String>,
) -> DbResult<TableDescriptor> {
    let sole_primary_key = match primary_key.as_slice() {
        [only] => Some(only.as_str()),
        _ => None,
    };

    let columns = columns
        .into_iter()
        .map(|c| {
            let canonical = TypeMapper::to_canonical(connector.kind(), &c.native_type);
            let mut column = ColumnDescriptor::new(&c.name, canonical, &c.native_type);
            if !c.nullable {
                column = column.not_null();
            }
            if let Some(default) = c.default_value {
                column = column.with_default(default);
            }
            if canonical == CanonicalType::String {
                let length = c
                    .max_length
                    .and_then(|l| u32::try_from(l).ok())
                    .or_else(|| declared_length(&c.native_type));
                if let Some(length) = length {
                    column = column.with_max_length(length);
                }
            }
            let implicit = connector
                .implicit_auto_generated(&c.native_type, sole_primary_key == Some(c.name.as_str()));
            if c.auto_generated || implicit {
                column = column.auto_generated();
            }
            column
        })
        .collect();

    TableDescriptor::new(table_name, columns, primary_key)
        .map_err(|message| DbError::schema(message, table_name))
}

// =============================================================================
// Per-backend catalog readers
// =============================================================================

mod postgres {
    use super::CatalogColumn;
    use crate::db::connector::CatalogQueries;
    use crate::error::DbResult;
    use sqlx::pool::PoolConnection;
    use sqlx::{Postgres, Row};

    pub async fn list_tables(
        conn: &mut PoolConnection<Postgres>,
        catalog: &CatalogQueries,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(catalog.list_tables).fetch_all(&mut **conn).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("table_name").ok())
            .collect())
    }

    pub async fn fetch_columns(
        conn: &mut PoolConnection<Postgres>,
        catalog: &CatalogQueries,
        table_name: &str,
    ) -> DbResult<Vec<CatalogColumn>> {
        let rows = sqlx::query(catalog.columns)
            .bind(table_name)
            .fetch_all(&mut **conn)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogColumn {
                    name: row.try_get("column_name")?,
                    native_type: row.try_get("native_type")?,
                    nullable: row.try_get("nullable")?,
                    default_value: row.try_get("column_default")?,
                    max_length: row.try_get("max_length")?,
                    auto_generated: row.try_get("auto_generated")?,
                })
            })
            .collect()
    }

    pub async fn fetch_primary_key(
        conn: &mut PoolConnection<Postgres>,
        catalog: &CatalogQueries,
        table_name: &str,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(catalog.primary_key)
            .bind(table_name)
            .fetch_all(&mut **conn)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get("column_name")?))
            .collect()
    }
}

mod mysql {
    use super::CatalogColumn;
    use crate::db::connector::CatalogQueries;
    use crate::error::DbResult;
    use sqlx::mysql::MySqlRow;
    use sqlx::pool::PoolConnection;
    use sqlx::{MySql, Row};

    /// Safely get a string from a MySQL row.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &MySqlRow, column: &str) -> String {
        get_optional_string(row, column).unwrap_or_default()
    }

    fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    /// MySQL 5.x reports BIGINT, 8.x may report BIGINT UNSIGNED.
    fn get_optional_i64(row: &MySqlRow, column: &str) -> Option<i64> {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(column) {
            return Some(v);
        }
        row.try_get::<Option<u64>, _>(column)
            .ok()
            .flatten()
            .and_then(|v| i64::try_from(v).ok())
    }

    pub(super) fn is_auto_generated(extra: &str) -> bool {
        let extra = extra.to_ascii_lowercase();
        extra.contains("auto_increment")
            || extra.contains("virtual generated")
            || extra.contains("stored generated")
    }

    pub async fn list_tables(
        conn: &mut PoolConnection<MySql>,
        catalog: &CatalogQueries,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(catalog.list_tables).fetch_all(&mut **conn).await?;
        Ok(rows
            .iter()
            .map(|row| get_string(row, "table_name"))
            .filter(|name| !name.is_empty())
            .collect())
    }

    pub async fn fetch_columns(
        conn: &mut PoolConnection<MySql>,
        catalog: &CatalogQueries,
        table_name: &str,
    ) -> DbResult<Vec<CatalogColumn>> {
        let rows = sqlx::query(catalog.columns)
            .bind(table_name)
            .fetch_all(&mut **conn)
            .await?;

        Ok(rows
            .iter()
            .map(|row| CatalogColumn {
                name: get_string(row, "column_name"),
                native_type: get_string(row, "native_type"),
                nullable: get_string(row, "is_nullable").eq_ignore_ascii_case("YES"),
                default_value: get_optional_string(row, "column_default"),
                max_length: get_optional_i64(row, "max_length"),
                auto_generated: is_auto_generated(&get_string(row, "extra")),
            })
            .collect())
    }

    pub async fn fetch_primary_key(
        conn: &mut PoolConnection<MySql>,
        catalog: &CatalogQueries,
        table_name: &str,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(catalog.primary_key)
            .bind(table_name)
            .fetch_all(&mut **conn)
            .await?;
        Ok(rows
            .iter()
            .map(|row| get_string(row, "column_name"))
            .collect())
    }
}

mod sqlite {
    use super::CatalogColumn;
    use crate::db::connector::CatalogQueries;
    use crate::error::DbResult;
    use sqlx::pool::PoolConnection;
    use sqlx::{Row, Sqlite};

    pub async fn list_tables(
        conn: &mut PoolConnection<Sqlite>,
        catalog: &CatalogQueries,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(catalog.list_tables).fetch_all(&mut **conn).await?;
        rows.iter()
            .map(|row| Ok(row.try_get("table_name")?))
            .collect()
    }

    pub async fn fetch_columns(
        conn: &mut PoolConnection<Sqlite>,
        catalog: &CatalogQueries,
        table_name: &str,
    ) -> DbResult<Vec<CatalogColumn>> {
        let rows = sqlx::query(catalog.columns)
            .bind(table_name)
            .fetch_all(&mut **conn)
            .await?;

        rows.iter()
            .map(|row| {
                let notnull: i64 = row.try_get("notnull")?;
                Ok(CatalogColumn {
                    name: row.try_get("name")?,
                    // Columns declared without a type report ''
                    native_type: row.try_get("type")?,
                    nullable: notnull == 0,
                    default_value: row.try_get("dflt_value")?,
                    max_length: None,
                    auto_generated: false,
                })
            })
            .collect()
    }

    pub async fn fetch_primary_key(
        conn: &mut PoolConnection<Sqlite>,
        catalog: &CatalogQueries,
        table_name: &str,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(catalog.primary_key)
            .bind(table_name)
            .fetch_all(&mut **conn)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get("column_name")?))
            .collect()
    }
}

// =============================================================================
// Schema cache
// =============================================================================

type Slot = Arc<RwLock<Option<Arc<TableDescriptor>>>>;

/// Descriptors keyed by (connection id, table name).
///
/// Each table has its own lock: loading or refreshing one table blocks readers
/// of that table only. The outer map lock is held just long enough to find or
/// insert a slot.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<(String, String), Slot>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, connection_id: &str, table: &str) -> Slot {
        let key = (connection_id.to_string(), table.to_string());
        if let Some(slot) = self.entries.read().await.get(&key) {
            return Arc::clone(slot);
        }
        let mut entries = self.entries.write().await;
        Arc::clone(entries.entry(key).or_default())
    }

    /// Return the cached descriptor, running `load` on a miss.
    ///
    /// Concurrent misses for the same table run `load` once. A failed load
    /// leaves nothing behind.
    pub async fn get_or_load<F, Fut>(
        &self,
        connection_id: &str,
        table: &str,
        load: F,
    ) -> DbResult<Arc<TableDescriptor>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DbResult<TableDescriptor>>,
    {
        let slot = self.slot(connection_id, table).await;
        if let Some(descriptor) = slot.read().await.as_ref() {
            return Ok(Arc::clone(descriptor));
        }

        let mut guard = slot.write().await;
        if let Some(descriptor) = guard.as_ref() {
            return Ok(Arc::clone(descriptor));
        }

        match load().await {
            Ok(descriptor) => {
                debug!(connection_id = %connection_id, table = %table, "Cached table schema");
                let descriptor = Arc::new(descriptor);
                *guard = Some(Arc::clone(&descriptor));
                Ok(descriptor)
            }
            Err(e) => {
                drop(guard);
                self.forget_empty(connection_id, table, &slot).await;
                Err(e)
            }
        }
    }

    /// Replace the table's descriptor with a freshly loaded one.
    ///
    /// Readers of this table wait for the refresh; other tables are
    /// unaffected. A table that no longer exists is evicted; any other failure
    /// keeps the previous descriptor.
    pub async fn refresh<F, Fut>(
        &self,
        connection_id: &str,
        table: &str,
        load: F,
    ) -> DbResult<Arc<TableDescriptor>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DbResult<TableDescriptor>>,
    {
        let slot = self.slot(connection_id, table).await;
        let mut guard = slot.write().await;

        match load().await {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                *guard = Some(Arc::clone(&descriptor));
                Ok(descriptor)
            }
            Err(e) => {
                if matches!(e, DbError::TableNotFound { .. }) {
                    *guard = None;
                }
                drop(guard);
                self.forget_empty(connection_id, table, &slot).await;
                Err(e)
            }
        }
    }

    async fn forget_empty(&self, connection_id: &str, table: &str, slot: &Slot) {
        let key = (connection_id.to_string(), table.to_string());
        let mut entries = self.entries.write().await;
        let unused = entries.get(&key).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && current.try_read().is_ok_and(|g| g.is_none())
        });
        if unused {
            entries.remove(&key);
        }
    }

    /// Cached descriptors for one data source, sorted by table name.
    pub async fn entries(&self, connection_id: &str) -> Vec<Arc<TableDescriptor>> {
        let slots: Vec<Slot> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|((id, _), _)| id == connection_id)
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };

        let mut descriptors = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(descriptor) = slot.read().await.as_ref() {
                descriptors.push(Arc::clone(descriptor));
            }
        }
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        descriptors
    }

    pub async fn invalidate_connection(&self, connection_id: &str) {
        self.entries
            .write()
            .await
            .retain(|(id, _), _| id != connection_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connector::{MySqlConnector, PostgresConnector, SqliteConnector};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn users_table() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", CanonicalType::Integer, "integer"),
                ColumnDescriptor::new("name", CanonicalType::String, "varchar(50)"),
            ],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    fn catalog_column(name: &str, native: &str) -> CatalogColumn {
        CatalogColumn {
            name: name.to_string(),
            native_type: native.to_string(),
            nullable: true,
            default_value: None,
            max_length: None,
            auto_generated: false,
        }
    }

    #[test]
    fn test_build_descriptor_sqlite_rowid() {
        let columns = vec![
            catalog_column("id", "INTEGER"),
            catalog_column("email", "VARCHAR(120)"),
            CatalogColumn {
                nullable: false,
                default_value: Some("'active'".to_string()),
                ..catalog_column("status", "TEXT")
            },
        ];
        let table =
            build_descriptor(&SqliteConnector, "users", columns, vec!["id".to_string()]).unwrap();

        let id = table.column("id").unwrap();
        assert!(id.is_primary_key);
        assert!(id.auto_generated);
        assert_eq!(id.canonical_type, CanonicalType::Integer);

        let email = table.column("email").unwrap();
        assert_eq!(email.canonical_type, CanonicalType::String);
        assert_eq!(email.max_length, Some(120));

        let status = table.column("status").unwrap();
        assert!(!status.nullable);
        assert!(!status.is_required_on_insert());
    }

    #[test]
    fn test_build_descriptor_composite_key_not_auto() {
        let columns = vec![
            catalog_column("order_id", "integer"),
            catalog_column("line", "integer"),
        ];
        let table = build_descriptor(
            &SqliteConnector,
            "order_lines",
            columns,
            vec!["order_id".to_string(), "line".to_string()],
        )
        .unwrap();
        assert!(table.columns().iter().all(|c| !c.auto_generated));
        assert_eq!(table.primary_key().len(), 2);
    }

    #[test]
    fn test_build_descriptor_uses_catalog_length() {
        let columns = vec![CatalogColumn {
            max_length: Some(64),
            auto_generated: true,
            ..catalog_column("code", "varchar")
        }];
        let table = build_descriptor(&PostgresConnector, "codes", columns, vec![]).unwrap();
        let code = table.column("code").unwrap();
        assert_eq!(code.max_length, Some(64));
        assert!(code.auto_generated);
        assert!(!table.has_primary_key());
    }

    #[test]
    fn test_mysql_extra_auto_generated() {
        assert!(mysql::is_auto_generated("auto_increment"));
        assert!(mysql::is_auto_generated("STORED GENERATED"));
        assert!(!mysql::is_auto_generated("DEFAULT_GENERATED"));
        assert!(!mysql::is_auto_generated(""));

        let columns = vec![catalog_column("flag", "tinyint(1)")];
        let table = build_descriptor(&MySqlConnector, "flags", columns, vec![]).unwrap();
        assert_eq!(
            table.column("flag").unwrap().canonical_type,
            CanonicalType::Boolean
        );
    }

    #[test]
    fn test_build_descriptor_unknown_primary_key() {
        let columns = vec![catalog_column("id", "integer")];
        let err =
            build_descriptor(&SqliteConnector, "t", columns, vec!["missing".to_string()]).unwrap_err();
        assert_eq!(err.kind(), "schema_error");
    }

    #[tokio::test]
    async fn test_cache_loads_once() {
        let cache = SchemaCache::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let table = cache
                .get_or_load("main", "users", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(users_table())
                })
                .await
                .unwrap();
            assert_eq!(table.name(), "users");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.entries("main").await.len(), 1);
        assert!(cache.entries("other").await.is_empty());
    }

    #[tokio::test]
    async fn test_cache_failed_load_not_cached() {
        let cache = SchemaCache::new();
        let err = cache
            .get_or_load("main", "ghost", || async { Err(DbError::table_not_found("ghost")) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "table_not_found");
        assert!(cache.entries.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_descriptor() {
        let cache = SchemaCache::new();
        cache
            .get_or_load("main", "users", || async { Ok(users_table()) })
            .await
            .unwrap();

        let refreshed = cache
            .refresh("main", "users", || async {
                TableDescriptor::new(
                    "users",
                    vec![ColumnDescriptor::new("id", CanonicalType::Integer, "integer")],
                    vec!["id".to_string()],
                )
                .map_err(DbError::internal)
            })
            .await
            .unwrap();
        assert_eq!(refreshed.columns().len(), 1);

        let cached = cache
            .get_or_load("main", "users", || async { Ok(users_table()) })
            .await
            .unwrap();
        assert_eq!(cached.columns().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous() {
        let cache = SchemaCache::new();
        cache
            .get_or_load("main", "users", || async { Ok(users_table()) })
            .await
            .unwrap();

        let err = cache
            .refresh("main", "users", || async {
                Err(DbError::timeout("describe_table", 1))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
        assert_eq!(cache.entries("main").await[0].columns().len(), 2);

        cache
            .refresh("main", "users", || async { Err(DbError::table_not_found("users")) })
            .await
            .unwrap_err();
        assert!(cache.entries("main").await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_does_not_block_other_tables() {
        let cache = Arc::new(SchemaCache::new());
        cache
            .get_or_load("main", "orders", || async {
                TableDescriptor::new(
                    "orders",
                    vec![ColumnDescriptor::new("id", CanonicalType::Integer, "integer")],
                    vec!["id".to_string()],
                )
                .map_err(DbError::internal)
            })
            .await
            .unwrap();

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let refreshing = Arc::clone(&cache);
        let refresh = tokio::spawn(async move {
            refreshing
                .refresh("main", "users", || async move {
                    let _ = release_rx.await;
                    Ok(users_table())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // users is locked by the refresh; orders must still be readable
        let orders = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_load("main", "orders", || async {
                Err(DbError::internal("should be cached"))
            }),
        )
        .await
        .expect("orders read blocked by users refresh")
        .unwrap();
        assert_eq!(orders.name(), "orders");

        release_tx.send(()).unwrap();
        refresh.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_connection() {
        let cache = SchemaCache::new();
        cache
            .get_or_load("a", "users", || async { Ok(users_table()) })
            .await
            .unwrap();
        cache
            .get_or_load("b", "users", || async { Ok(users_table()) })
            .await
            .unwrap();
        cache.invalidate_connection("a").await;
        assert!(cache.entries("a").await.is_empty());
        assert_eq!(cache.entries("b").await.len(), 1);
    }
}
