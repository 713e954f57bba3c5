//! REST route generation.
//!
//! Every table discovered on a data source gets five generated routes:
//!
//! | Method | Path             | Operation |
//! |--------|------------------|-----------|
//! | GET    | `/{table}`       | list      |
//! | POST   | `/{table}`       | create    |
//! | GET    | `/{table}/{id}`  | get       |
//! | PUT    | `/{table}/{id}`  | update    |
//! | DELETE | `/{table}/{id}`  | delete    |
//!
//! Each source also serves `GET /_schema`, `POST /_schema/{table}/refresh` and
//! `GET /_status`. A single source is mounted at `/`; several are nested
//! under `/{connection_id}`.

use crate::crud::{DeleteOutcome, TableApi};
use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::models::{QueryFilter, QuerySpec, Record, SortSpec, TableDescriptor};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Path segments served by every source in addition to its tables.
const RESERVED_SEGMENTS: &[&str] = &["_schema", "_status"];

/// Builds the axum router for every registered data source.
#[derive(Clone)]
pub struct RouteGenerator {
    manager: Arc<ConnectionManager>,
    max_page_size: u32,
    shutdown: CancellationToken,
}

impl RouteGenerator {
    /// `shutdown` is the parent of every per-request cancellation token.
    pub fn new(
        manager: Arc<ConnectionManager>,
        max_page_size: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            max_page_size,
            shutdown,
        }
    }

    /// Introspect every registered source and generate its routes.
    pub async fn build_router(&self) -> DbResult<Router> {
        let connection_ids = self.manager.connection_ids().await;
        let router = match connection_ids.as_slice() {
            [] => {
                return Err(DbError::invalid_input(
                    "no data source is registered; nothing to serve",
                ));
            }
            [only] => self.source_router(only).await?,
            many => {
                let mut router = Router::new();
                for id in many {
                    router = router.nest(&format!("/{}", id), self.source_router(id).await?);
                }
                router.fallback(|uri: Uri| async move { DbError::route_not_found(uri.path()) })
            }
        };

        Ok(router.layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<axum::body::Body>| {
                info_span!(
                    "http_request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        ))
    }

    /// Routes for one data source: its tables plus the schema endpoints.
    pub async fn source_router(&self, connection_id: &str) -> DbResult<Router> {
        let tables = self
            .manager
            .discover_tables(connection_id, &self.shutdown)
            .await?;

        let mut router = Router::new();
        let mut served = Vec::new();
        for table in &tables {
            if !is_routable(table) {
                warn!(
                    connection_id = %connection_id,
                    table = %table,
                    "Table name cannot be used as a path segment, skipping"
                );
                continue;
            }
            // Warm the schema cache; a table that cannot be described is not served
            if let Err(e) = self
                .manager
                .describe_table(connection_id, table, &self.shutdown)
                .await
            {
                warn!(
                    connection_id = %connection_id,
                    table = %table,
                    error = %e,
                    "Introspection failed, skipping table"
                );
                continue;
            }

            let api = TableApi::new(
                self.manager.clone(),
                connection_id,
                table,
                self.max_page_size,
            )
            .await?;
            router = router.merge(table_router(api, self.shutdown.clone()));
            served.push(table.clone());
        }

        info!(
            connection_id = %connection_id,
            tables = served.len(),
            skipped = tables.len() - served.len(),
            "Generated table routes"
        );
        let served = Arc::new(served);

        let state = SourceState {
            manager: self.manager.clone(),
            connection_id: Arc::from(connection_id),
            shutdown: self.shutdown.clone(),
        };
        Ok(router.merge(
            Router::new()
                .route("/_schema", get(list_schema))
                .route("/_schema/{table}/refresh", post(refresh_schema))
                .route("/_status", get(source_status))
                .with_state(state),
        )
        .fallback(move |uri: Uri| {
            let served = served.clone();
            async move { unknown_route(&uri, &served) }
        }))
    }
}

/// The five CRUD routes for one table.
pub fn table_router(api: TableApi, shutdown: CancellationToken) -> Router {
    let collection = format!("/{}", api.table());
    let item = format!("/{}/{{id}}", api.table());
    let state = TableState {
        api: Arc::new(api),
        shutdown,
    };
    Router::new()
        .route(&collection, get(list_records).post(create_record))
        .route(
            &item,
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(state)
}

/// Whether a table name can be mounted as a literal path segment.
fn is_routable(table: &str) -> bool {
    !table.is_empty()
        && !RESERVED_SEGMENTS.contains(&table)
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// =============================================================================
// Table handlers
// =============================================================================

#[derive(Clone)]
struct TableState {
    api: Arc<TableApi>,
    shutdown: CancellationToken,
}

/// Raw list query parameters; parsed by hand so malformed values produce
/// structured errors.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    #[serde(rename = "where")]
    pub filter: Option<String>,
    pub sort: Option<String>,
}

impl ListParams {
    pub fn into_query_spec(self, table: &str) -> DbResult<QuerySpec> {
        let mut spec = QuerySpec::new(table);
        if let Some(limit) = self.limit.as_deref().filter(|s| !s.is_empty()) {
            spec.limit = Some(parse_limit(limit)?);
        }
        if let Some(offset) = self.offset.as_deref().filter(|s| !s.is_empty()) {
            spec.offset = offset.parse().map_err(|_| {
                DbError::invalid_input(format!(
                    "offset must be a non-negative integer, got '{}'",
                    offset
                ))
            })?;
        }
        if let Some(raw) = self.filter.as_deref().filter(|s| !s.is_empty()) {
            spec.filters = QueryFilter::parse_list(raw)?;
        }
        if let Some(raw) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            spec.sort = SortSpec::parse_list(raw)?;
        }
        Ok(spec)
    }
}

/// Oversized limits saturate so the builder clamps them to the page size.
fn parse_limit(raw: &str) -> DbResult<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DbError::invalid_input(format!(
            "limit must be a non-negative integer, got '{}'",
            raw
        )));
    }
    Ok(raw
        .parse::<u64>()
        .ok()
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(u32::MAX))
}

async fn list_records(
    State(state): State<TableState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> DbResult<impl IntoResponse> {
    let Query(params) = params.map_err(|e| DbError::invalid_input(e.body_text()))?;
    let spec = params.into_query_spec(state.api.table())?;
    let page = state
        .api
        .list(&spec, &state.shutdown.child_token())
        .await?;
    Ok(Json(page))
}

async fn get_record(
    State(state): State<TableState>,
    Path(id): Path<String>,
) -> DbResult<impl IntoResponse> {
    match state.api.get(&id, &state.shutdown.child_token()).await? {
        Some(record) => Ok(Json(record)),
        None => Err(DbError::not_found(state.api.table(), id)),
    }
}

async fn create_record(
    State(state): State<TableState>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> DbResult<impl IntoResponse> {
    let record = record_from_body(body)?;
    let created = state
        .api
        .create(&record, &state.shutdown.child_token())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_record(
    State(state): State<TableState>,
    Path(id): Path<String>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> DbResult<impl IntoResponse> {
    let record = record_from_body(body)?;
    match state
        .api
        .update(&id, &record, &state.shutdown.child_token())
        .await?
    {
        Some(updated) => Ok(Json(updated)),
        None => Err(DbError::not_found(state.api.table(), id)),
    }
}

async fn delete_record(
    State(state): State<TableState>,
    Path(id): Path<String>,
) -> DbResult<StatusCode> {
    match state.api.delete(&id, &state.shutdown.child_token()).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(DbError::not_found(state.api.table(), id)),
    }
}

fn record_from_body(body: Result<Json<JsonValue>, JsonRejection>) -> DbResult<Record> {
    let Json(value) = body.map_err(|e| DbError::invalid_input(e.body_text()))?;
    match value {
        JsonValue::Object(record) => Ok(record),
        other => Err(DbError::invalid_input(format!(
            "request body must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

// =============================================================================
// Source handlers
// =============================================================================

#[derive(Clone)]
struct SourceState {
    manager: Arc<ConnectionManager>,
    connection_id: Arc<str>,
    shutdown: CancellationToken,
}

async fn list_schema(State(state): State<SourceState>) -> Json<Vec<TableDescriptor>> {
    let tables = state.manager.cached_tables(&state.connection_id).await;
    Json(tables.iter().map(|t| t.as_ref().clone()).collect())
}

async fn refresh_schema(
    State(state): State<SourceState>,
    Path(table): Path<String>,
) -> DbResult<Json<TableDescriptor>> {
    let descriptor = state
        .manager
        .refresh_table(&state.connection_id, &table, &state.shutdown.child_token())
        .await?;
    Ok(Json(descriptor.as_ref().clone()))
}

async fn source_status(State(state): State<SourceState>) -> DbResult<impl IntoResponse> {
    let config = state.manager.config(&state.connection_id).await?;
    let pool = state.manager.pool_status(&state.connection_id).await?;
    let tables = state.manager.cached_tables(&state.connection_id).await.len();
    debug!(connection_id = %state.connection_id, in_use = pool.in_use(), "Pool status");
    Ok(Json(json!({
        "connection_id": state.connection_id.as_ref(),
        "backend": config.backend(),
        "read_only": config.is_read_only(),
        "pool": pool,
        "tables": tables,
    })))
}

/// A miss under a served table is a bad route; anything else names a
/// table this source does not serve.
fn unknown_route(uri: &Uri, served: &[String]) -> DbError {
    let path = uri.path();
    let segment = path.trim_start_matches('/').split('/').next().unwrap_or_default();
    if segment.is_empty()
        || RESERVED_SEGMENTS.contains(&segment)
        || served.iter().any(|t| t == segment)
    {
        return DbError::route_not_found(path);
    }
    DbError::table_not_found(segment)
}
