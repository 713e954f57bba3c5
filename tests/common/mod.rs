//! Shared setup for integration tests.

#![allow(dead_code)]

use db_crud_server::config::PoolOptions;
use db_crud_server::crud::TableApi;
use db_crud_server::db::{ConnectionManager, StatementExecutor};
use db_crud_server::models::{ConnectionConfig, Record, Statement};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const USERS_DDL: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name VARCHAR(20) NOT NULL,
    email TEXT UNIQUE,
    age INTEGER,
    active BOOLEAN NOT NULL DEFAULT 1,
    born DATE,
    meta JSON
)";

/// Register a fresh SQLite file database under `id` and run `ddl` on it.
///
/// The returned `TempDir` owns the database file; keep it alive for the
/// duration of the test.
pub async fn sqlite_source(
    id: &str,
    ddl: &[&str],
    pool_options: PoolOptions,
) -> (Arc<ConnectionManager>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("{}.db", id));
    let url = format!("sqlite:{}", path.display());

    let manager = Arc::new(ConnectionManager::new());
    let config = ConnectionConfig::new(id, url, false, Some(id.to_string()), pool_options).unwrap();
    manager.register(config).await.unwrap();

    for statement in ddl {
        execute_sql(&manager, id, statement).await;
    }
    (manager, dir)
}

/// Register `url` under `id`, or `None` when the env var is unset.
pub async fn external_source(env_var: &str, id: &str) -> Option<Arc<ConnectionManager>> {
    let url = match std::env::var(env_var) {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: {} not set", env_var);
            return None;
        }
    };
    let manager = Arc::new(ConnectionManager::new());
    let config = ConnectionConfig::new(id, url, false, None, PoolOptions::default()).unwrap();
    manager.register(config).await.unwrap();
    Some(manager)
}

/// Run a raw statement without parameters (DDL, fixtures).
pub async fn execute_sql(manager: &ConnectionManager, id: &str, sql: &str) {
    let sql = sql.to_string();
    let executor = StatementExecutor::new(Duration::from_secs(10));
    manager
        .with_connection(id, &CancellationToken::new(), "setup", move |conn| {
            Box::pin(async move { executor.execute(conn, &Statement::new(sql, vec![])).await })
        })
        .await
        .unwrap();
}

pub async fn table_api(manager: &Arc<ConnectionManager>, id: &str, table: &str) -> TableApi {
    TableApi::new(manager.clone(), id, table, 100).await.unwrap()
}

pub fn record(value: JsonValue) -> Record {
    value.as_object().cloned().unwrap()
}

/// Unique table name so parallel runs against a shared server do not collide.
pub fn scratch_table(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Full create/get/list/update/delete pass over a `products` style table with
/// columns `id` (generated), `name`, `price`, `active` (default true) and `tags`.
pub async fn exercise_products(manager: &Arc<ConnectionManager>, id: &str, table: &str) {
    use db_crud_server::crud::DeleteOutcome;
    use db_crud_server::models::{QueryFilter, QuerySpec, SortSpec};
    use serde_json::json;

    let api = table_api(manager, id, table).await;
    let cancel = CancellationToken::new();

    let first = api
        .create(
            &record(json!({"name": "Widget", "price": 9.5, "tags": ["a"]})),
            &cancel,
        )
        .await
        .unwrap();
    assert!(first["id"].is_i64(), "generated key missing: {first:?}");
    assert_eq!(first["name"], json!("Widget"));
    assert_eq!(first["price"].as_f64(), Some(9.5));
    assert_eq!(first["active"], json!(true));
    assert_eq!(first["tags"], json!(["a"]));

    let second = api
        .create(
            &record(json!({"name": "Gadget", "price": "20.25", "active": false})),
            &cancel,
        )
        .await
        .unwrap();
    let second_id = second["id"].to_string();

    let fetched = api.get(&second_id, &cancel).await.unwrap().unwrap();
    assert_eq!(fetched, second);

    let spec = QuerySpec::new(table)
        .with_filter(QueryFilter::new("price", "gt", 10).unwrap())
        .with_sort(SortSpec::new("name", "asc").unwrap());
    let page = api.list(&spec, &cancel).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0]["name"], json!("Gadget"));

    let spec = QuerySpec::new(table).with_filter(QueryFilter::new("name", "like", "idg").unwrap());
    let page = api.list(&spec, &cancel).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0]["name"], json!("Widget"));

    let updated = api
        .update(&second_id, &record(json!({"active": true})), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated["active"], json!(true));
    assert_eq!(updated["name"], json!("Gadget"));

    let err = api
        .create(&record(json!({"price": "cheap"})), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_failed");

    assert_eq!(
        api.delete(&second_id, &cancel).await.unwrap(),
        DeleteOutcome::Deleted
    );
    assert!(api.get(&second_id, &cancel).await.unwrap().is_none());
    assert_eq!(
        api.delete(&second_id, &cancel).await.unwrap(),
        DeleteOutcome::NotFound
    );
}
