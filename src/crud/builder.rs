//! Statement builders.
//!
//! Translates a `QuerySpec` or a validated record into backend-specific SQL.
//! Identifiers come from the introspected `TableDescriptor` and are quoted by
//! the connector; every caller-supplied value becomes a bound parameter.

use crate::crud::validation::ValidatedRecord;
use crate::db::connector::{Connector, base_type_name, connector_for};
use crate::db::types::{TypeMapper, coerce_path_value, coerce_value};
use crate::error::{DbError, DbResult};
use crate::models::{
    BackendKind, CanonicalType, ColumnDescriptor, FilterOperator, QueryFilter, QueryParam,
    QuerySpec, Statement, TableDescriptor,
};
use serde_json::Value as JsonValue;

/// Placeholder text plus the values bound to it, numbered in push order.
struct Params {
    connector: &'static dyn Connector,
    values: Vec<QueryParam>,
}

impl Params {
    fn new(connector: &'static dyn Connector) -> Self {
        Self {
            connector,
            values: Vec::new(),
        }
    }

    /// Bind a value compared against or stored in `column`.
    fn push_for(&mut self, column: &ColumnDescriptor, value: QueryParam) -> String {
        self.values.push(value);
        self.connector
            .placeholder(self.values.len(), Some(column.native_type.as_str()))
    }

    /// Bind a value with no column type attached.
    fn push(&mut self, value: QueryParam) -> String {
        self.values.push(value);
        self.connector.placeholder(self.values.len(), None)
    }

    fn finish(self, sql: String) -> Statement {
        Statement::new(sql, self.values)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    connector: &'static dyn Connector,
    max_page_size: u32,
}

impl QueryBuilder {
    pub fn new(connector: &'static dyn Connector, max_page_size: u32) -> Self {
        Self {
            connector,
            max_page_size,
        }
    }

    pub fn for_backend(backend: BackendKind, max_page_size: u32) -> Self {
        Self::new(connector_for(backend), max_page_size)
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Whether insert and update statements return the stored row.
    pub fn returns_rows(&self) -> bool {
        self.connector.supports_returning()
    }

    /// `SELECT` one page of rows matching every filter.
    pub fn build_select(&self, table: &TableDescriptor, spec: &QuerySpec) -> DbResult<Statement> {
        let mut params = Params::new(self.connector);
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.select_list(table),
            self.connector.quote_ident(table.name())
        );
        sql.push_str(&self.where_clause(table, &spec.filters, &mut params)?);
        sql.push_str(&self.order_clause(table, spec)?);

        let limit = params.push(QueryParam::Int(i64::from(
            spec.effective_limit(self.max_page_size),
        )));
        let offset = params.push(QueryParam::Int(
            i64::try_from(spec.offset).map_err(|_| DbError::invalid_input("offset is too large"))?,
        ));
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));

        Ok(params.finish(sql))
    }

    /// `SELECT COUNT(*)` over the same filters, ignoring sort and paging.
    pub fn build_count(&self, table: &TableDescriptor, spec: &QuerySpec) -> DbResult<Statement> {
        let mut params = Params::new(self.connector);
        let mut sql = format!(
            "SELECT COUNT(*) FROM {}",
            self.connector.quote_ident(table.name())
        );
        sql.push_str(&self.where_clause(table, &spec.filters, &mut params)?);
        Ok(params.finish(sql))
    }

    pub fn build_select_by_id(&self, table: &TableDescriptor, id: &str) -> DbResult<Statement> {
        let mut params = Params::new(self.connector);
        let predicate = self.key_predicate(table, id, &mut params)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            self.select_list(table),
            self.connector.quote_ident(table.name()),
            predicate
        );
        Ok(params.finish(sql))
    }

    /// `INSERT` the record; returns the stored row where the backend supports
    /// `RETURNING`.
    pub fn build_insert(
        &self,
        table: &TableDescriptor,
        record: &ValidatedRecord,
    ) -> DbResult<Statement> {
        let quoted_table = self.connector.quote_ident(table.name());
        let mut params = Params::new(self.connector);

        let mut sql = if record.is_empty() {
            self.connector.insert_defaults(&quoted_table)
        } else {
            let mut columns = Vec::with_capacity(record.len());
            let mut placeholders = Vec::with_capacity(record.len());
            for (name, value) in record.values() {
                let column = self.column(table, name)?;
                columns.push(self.connector.quote_ident(name));
                placeholders.push(params.push_for(column, value.clone()));
            }
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quoted_table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if self.connector.supports_returning() {
            sql.push_str(&format!(" RETURNING {}", self.select_list(table)));
        }
        Ok(params.finish(sql))
    }

    /// `UPDATE` the row identified by `id` with the record's columns.
    pub fn build_update(
        &self,
        table: &TableDescriptor,
        id: &str,
        record: &ValidatedRecord,
    ) -> DbResult<Statement> {
        if record.is_empty() {
            return Err(DbError::invalid_input("update requires at least one column"));
        }

        let mut params = Params::new(self.connector);
        let mut assignments = Vec::with_capacity(record.len());
        for (name, value) in record.values() {
            let column = self.column(table, name)?;
            let placeholder = params.push_for(column, value.clone());
            assignments.push(format!(
                "{} = {}",
                self.connector.quote_ident(name),
                placeholder
            ));
        }
        let predicate = self.key_predicate(table, id, &mut params)?;

        let mut sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.connector.quote_ident(table.name()),
            assignments.join(", "),
            predicate
        );
        if self.connector.supports_returning() {
            sql.push_str(&format!(" RETURNING {}", self.select_list(table)));
        }
        Ok(params.finish(sql))
    }

    pub fn build_delete(&self, table: &TableDescriptor, id: &str) -> DbResult<Statement> {
        let mut params = Params::new(self.connector);
        let predicate = self.key_predicate(table, id, &mut params)?;
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.connector.quote_ident(table.name()),
            predicate
        );
        Ok(params.finish(sql))
    }

    /// `CREATE TABLE IF NOT EXISTS` for the descriptor, with native types
    /// chosen from the canonical ones.
    pub fn build_create_table(&self, table: &TableDescriptor) -> Statement {
        let kind = self.connector.kind();
        let single_key = table.primary_key().len() == 1;

        let mut definitions: Vec<String> = table
            .columns()
            .iter()
            .map(|column| {
                let mut native = TypeMapper::from_canonical(kind, column.canonical_type).to_string();
                if let (CanonicalType::String, Some(length)) =
                    (column.canonical_type, column.max_length)
                {
                    native = format!("{}({})", base_type_name(&native), length);
                }

                let mut definition = format!("{} {}", self.connector.quote_ident(&column.name), native);
                if !column.nullable {
                    definition.push_str(" NOT NULL");
                }
                if let Some(default) = &column.default_value {
                    definition.push_str(&format!(" DEFAULT {}", default));
                }
                if column.auto_generated
                    && column.is_primary_key
                    && single_key
                    && column.canonical_type == CanonicalType::Integer
                {
                    if let Some(clause) = self.connector.auto_increment_clause() {
                        definition.push(' ');
                        definition.push_str(clause);
                    }
                }
                definition
            })
            .collect();

        if table.has_primary_key() {
            let key: Vec<String> = table
                .primary_key()
                .iter()
                .map(|c| self.connector.quote_ident(c))
                .collect();
            definitions.push(format!("PRIMARY KEY ({})", key.join(", ")));
        }

        Statement::new(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                self.connector.quote_ident(table.name()),
                definitions.join(", ")
            ),
            Vec::new(),
        )
    }

    fn select_list(&self, table: &TableDescriptor) -> String {
        table
            .columns()
            .iter()
            .map(|c| self.connector.select_expr(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn column<'t>(&self, table: &'t TableDescriptor, name: &str) -> DbResult<&'t ColumnDescriptor> {
        table
            .column(name)
            .ok_or_else(|| DbError::invalid_input(format!("unknown column '{}'", name)))
    }

    fn where_clause(
        &self,
        table: &TableDescriptor,
        filters: &[QueryFilter],
        params: &mut Params,
    ) -> DbResult<String> {
        if filters.is_empty() {
            return Ok(String::new());
        }
        let predicates = filters
            .iter()
            .map(|f| self.filter_predicate(table, f, params))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(format!(" WHERE {}", predicates.join(" AND ")))
    }

    fn filter_predicate(
        &self,
        table: &TableDescriptor,
        filter: &QueryFilter,
        params: &mut Params,
    ) -> DbResult<String> {
        let column = table.column(&filter.column).ok_or_else(|| {
            DbError::invalid_filter(format!("unknown column '{}'", filter.column))
        })?;
        let quoted = self.connector.quote_ident(&column.name);

        if filter.value.is_null() {
            return match filter.operator {
                FilterOperator::Eq => Ok(format!("{} IS NULL", quoted)),
                FilterOperator::Ne => Ok(format!("{} IS NOT NULL", quoted)),
                op => Err(DbError::invalid_filter(format!(
                    "operator '{}' on '{}' does not accept null",
                    op.as_str(),
                    column.name
                ))),
            };
        }

        match filter.operator {
            FilterOperator::Like => {
                let pattern = match &filter.value {
                    JsonValue::String(s) => s.clone(),
                    JsonValue::Number(n) => n.to_string(),
                    JsonValue::Bool(b) => b.to_string(),
                    _ => {
                        return Err(DbError::invalid_filter(format!(
                            "like on '{}' requires a string pattern",
                            column.name
                        )));
                    }
                };
                let pattern = if pattern.contains('%') {
                    pattern
                } else {
                    format!("%{}%", pattern)
                };
                let placeholder = params.push(QueryParam::String(pattern));
                Ok(self.connector.like_expr(column, &placeholder))
            }
            FilterOperator::In => {
                let items = filter
                    .value
                    .as_array()
                    .filter(|items| !items.is_empty())
                    .ok_or_else(|| {
                        DbError::invalid_filter(format!(
                            "in on '{}' requires a non-empty array",
                            column.name
                        ))
                    })?;
                let placeholders = items
                    .iter()
                    .map(|item| -> DbResult<String> {
                        let value = filter_value(column, item)?;
                        Ok(params.push_for(column, value))
                    })
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(format!("{} IN ({})", quoted, placeholders.join(", ")))
            }
            op => {
                let value = filter_value(column, &filter.value)?;
                let placeholder = params.push_for(column, value);
                Ok(format!("{} {} {}", quoted, op.sql_operator(), placeholder))
            }
        }
    }

    fn order_clause(&self, table: &TableDescriptor, spec: &QuerySpec) -> DbResult<String> {
        let terms: Vec<String> = if spec.sort.is_empty() {
            table
                .primary_key()
                .iter()
                .map(|c| format!("{} ASC", self.connector.quote_ident(c)))
                .collect()
        } else {
            spec.sort
                .iter()
                .map(|s| -> DbResult<String> {
                    table.column(&s.column).ok_or_else(|| {
                        DbError::invalid_sort(format!("unknown sort column '{}'", s.column))
                    })?;
                    Ok(format!(
                        "{} {}",
                        self.connector.quote_ident(&s.column),
                        s.direction.as_sql()
                    ))
                })
                .collect::<DbResult<_>>()?
        };

        if terms.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" ORDER BY {}", terms.join(", ")))
        }
    }

    /// `pk = ?` terms for the `{id}` path segment. Composite keys carry their
    /// values comma-separated in key order.
    fn key_predicate(
        &self,
        table: &TableDescriptor,
        id: &str,
        params: &mut Params,
    ) -> DbResult<String> {
        if !table.has_primary_key() {
            return Err(DbError::schema(
                format!(
                    "Table '{}' has no primary key; rows cannot be addressed by id",
                    table.name()
                ),
                table.name(),
            ));
        }

        let key_columns: Vec<&ColumnDescriptor> = table.primary_key_columns().collect();
        let parts: Vec<&str> = if key_columns.len() == 1 {
            vec![id]
        } else {
            id.split(',').collect()
        };
        if parts.len() != key_columns.len() {
            return Err(DbError::invalid_input(format!(
                "id for '{}' needs {} comma-separated values, got {}",
                table.name(),
                key_columns.len(),
                parts.len()
            )));
        }

        let mut terms = Vec::with_capacity(key_columns.len());
        for (column, raw) in key_columns.into_iter().zip(parts) {
            let value = coerce_path_value(column, raw).map_err(|reason| {
                DbError::invalid_input(format!("id value for '{}' {}", column.name, reason))
            })?;
            let placeholder = params.push_for(column, value);
            terms.push(format!(
                "{} = {}",
                self.connector.quote_ident(&column.name),
                placeholder
            ));
        }
        Ok(terms.join(" AND "))
    }
}

/// Coerce a filter operand to the column type. Length and nullability limits
/// apply to stored values, not to comparisons.
fn filter_value(column: &ColumnDescriptor, value: &JsonValue) -> DbResult<QueryParam> {
    if value.is_null() {
        return Err(DbError::invalid_filter(format!(
            "null is not allowed in the operand list for '{}'",
            column.name
        )));
    }
    let mut relaxed = column.clone();
    relaxed.max_length = None;
    relaxed.nullable = true;
    coerce_value(&relaxed, value)
        .map_err(|reason| DbError::invalid_filter(format!("value for '{}' {}", column.name, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::validation::{ValidationEngine, WriteMode};
    use crate::models::SortSpec;
    use serde_json::json;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", CanonicalType::Integer, "int4").auto_generated(),
                ColumnDescriptor::new("name", CanonicalType::String, "varchar")
                    .not_null()
                    .with_max_length(50),
                ColumnDescriptor::new("age", CanonicalType::Integer, "int4"),
                ColumnDescriptor::new("created", CanonicalType::Datetime, "timestamptz"),
            ],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    fn pg() -> QueryBuilder {
        QueryBuilder::for_backend(BackendKind::PostgreSQL, 100)
    }

    fn sqlite() -> QueryBuilder {
        QueryBuilder::for_backend(BackendKind::SQLite, 100)
    }

    fn prepared(table: &TableDescriptor, body: JsonValue, mode: WriteMode) -> ValidatedRecord {
        let record = body.as_object().unwrap().clone();
        ValidationEngine::prepare(table, &record, mode).unwrap()
    }

    #[test]
    fn test_select_defaults() {
        let stmt = sqlite()
            .build_select(&users(), &QuerySpec::new("users"))
            .unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT "id", "name", "age", "created" FROM "users" ORDER BY "id" ASC LIMIT ? OFFSET ?"#
        );
        assert_eq!(stmt.params, vec![QueryParam::Int(100), QueryParam::Int(0)]);
    }

    #[test]
    fn test_select_clamps_limit() {
        let spec = QuerySpec::new("users").with_limit(10_000).with_offset(20);
        let stmt = sqlite().build_select(&users(), &spec).unwrap();
        assert_eq!(stmt.params, vec![QueryParam::Int(100), QueryParam::Int(20)]);

        let spec = QuerySpec::new("users").with_limit(0);
        let stmt = sqlite().build_select(&users(), &spec).unwrap();
        assert_eq!(stmt.params[0], QueryParam::Int(0));
    }

    #[test]
    fn test_filters_are_conjunctive_and_bound() {
        let spec = QuerySpec::new("users")
            .with_filter(QueryFilter::new("name", "eq", "Ann'; DROP TABLE users; --").unwrap())
            .with_filter(QueryFilter::new("age", "gte", 18).unwrap());
        let stmt = pg().build_select(&users(), &spec).unwrap();
        assert!(stmt.sql.contains(r#"WHERE "name" = $1::"varchar" AND "age" >= $2::"int4""#));
        assert!(stmt.sql.ends_with("LIMIT $3 OFFSET $4"));
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(
            stmt.params[0],
            QueryParam::String("Ann'; DROP TABLE users; --".to_string())
        );
        assert_eq!(stmt.params[1], QueryParam::Int(18));
    }

    #[test]
    fn test_like_wraps_plain_operand() {
        let spec = QuerySpec::new("users")
            .with_filter(QueryFilter::new("name", "like", "An").unwrap())
            .with_filter(QueryFilter::new("name", "like", "A%").unwrap());
        let stmt = sqlite().build_select(&users(), &spec).unwrap();
        assert!(stmt.sql.contains(r#""name" LIKE ? AND "name" LIKE ?"#));
        assert_eq!(stmt.params[0], QueryParam::String("%An%".to_string()));
        assert_eq!(stmt.params[1], QueryParam::String("A%".to_string()));
    }

    #[test]
    fn test_in_expands_placeholders() {
        let spec =
            QuerySpec::new("users").with_filter(QueryFilter::new("age", "in", json!([1, "2", 3])).unwrap());
        let stmt = pg().build_select(&users(), &spec).unwrap();
        assert!(stmt.sql.contains(r#""age" IN ($1::"int4", $2::"int4", $3::"int4")"#));
        assert_eq!(stmt.params[1], QueryParam::Int(2));

        let empty = QuerySpec::new("users").with_filter(QueryFilter::new("age", "in", json!([])).unwrap());
        let err = pg().build_select(&users(), &empty).unwrap_err();
        assert_eq!(err.kind(), "invalid_filter");
    }

    #[test]
    fn test_null_filters() {
        let spec = QuerySpec::new("users")
            .with_filter(QueryFilter::new("age", "eq", JsonValue::Null).unwrap())
            .with_filter(QueryFilter::new("created", "ne", JsonValue::Null).unwrap());
        let stmt = sqlite().build_select(&users(), &spec).unwrap();
        assert!(stmt.sql.contains(r#""age" IS NULL AND "created" IS NOT NULL"#));
        assert_eq!(stmt.params.len(), 2);

        let spec = QuerySpec::new("users").with_filter(QueryFilter::new("age", "gt", JsonValue::Null).unwrap());
        assert_eq!(
            sqlite().build_select(&users(), &spec).unwrap_err().kind(),
            "invalid_filter"
        );
    }

    #[test]
    fn test_unknown_filter_column_rejected() {
        let spec = QuerySpec::new("users").with_filter(QueryFilter::new("nope", "eq", 1).unwrap());
        let err = sqlite().build_select(&users(), &spec).unwrap_err();
        assert_eq!(err.kind(), "invalid_filter");
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_filter_operand_type_checked() {
        let spec = QuerySpec::new("users").with_filter(QueryFilter::new("age", "lt", "old").unwrap());
        let err = sqlite().build_select(&users(), &spec).unwrap_err();
        assert_eq!(err.kind(), "invalid_filter");
    }

    #[test]
    fn test_sort() {
        let spec = QuerySpec::new("users")
            .with_sort(SortSpec::new("age", "desc").unwrap())
            .with_sort(SortSpec::new("name", "asc").unwrap());
        let stmt = sqlite().build_select(&users(), &spec).unwrap();
        assert!(stmt.sql.contains(r#"ORDER BY "age" DESC, "name" ASC"#));

        let spec = QuerySpec::new("users").with_sort(SortSpec::new("missing", "asc").unwrap());
        assert_eq!(
            sqlite().build_select(&users(), &spec).unwrap_err().kind(),
            "invalid_sort"
        );
    }

    #[test]
    fn test_count_ignores_paging() {
        let spec = QuerySpec::new("users")
            .with_filter(QueryFilter::new("age", "gt", 30).unwrap())
            .with_limit(5);
        let stmt = sqlite().build_count(&users(), &spec).unwrap();
        assert_eq!(stmt.sql, r#"SELECT COUNT(*) FROM "users" WHERE "age" > ?"#);
        assert_eq!(stmt.params, vec![QueryParam::Int(30)]);
    }

    #[test]
    fn test_insert_with_returning() {
        let table = users();
        let record = prepared(&table, json!({"name": "Ann", "age": 30}), WriteMode::Insert);
        let stmt = pg().build_insert(&table, &record).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("name", "age") VALUES ($1::"varchar", $2::"int4") RETURNING "id", "name", "age", "created""#
        );
        assert_eq!(
            stmt.params,
            vec![QueryParam::String("Ann".to_string()), QueryParam::Int(30)]
        );
    }

    #[test]
    fn test_insert_mysql_no_returning() {
        let table = users();
        let record = prepared(&table, json!({"name": "Ann"}), WriteMode::Insert);
        let stmt = QueryBuilder::for_backend(BackendKind::MySQL, 100)
            .build_insert(&table, &record)
            .unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `users` (`name`) VALUES (?)");
    }

    #[test]
    fn test_insert_all_defaults() {
        let table = TableDescriptor::new(
            "events",
            vec![ColumnDescriptor::new("id", CanonicalType::Integer, "INTEGER")],
            vec!["id".to_string()],
        )
        .unwrap();
        let record = prepared(&table, json!({}), WriteMode::Insert);
        let stmt = sqlite().build_insert(&table, &record).unwrap();
        assert_eq!(stmt.sql, r#"INSERT INTO "events" DEFAULT VALUES RETURNING "id""#);
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_update_and_delete_by_id() {
        let table = users();
        let record = prepared(&table, json!({"age": 31}), WriteMode::Update);
        let stmt = sqlite().build_update(&table, "7", &record).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "users" SET "age" = ? WHERE "id" = ? RETURNING "id", "name", "age", "created""#
        );
        assert_eq!(stmt.params, vec![QueryParam::Int(31), QueryParam::Int(7)]);

        let stmt = sqlite().build_delete(&table, "7").unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "users" WHERE "id" = ?"#);

        let err = sqlite().build_delete(&table, "seven").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_composite_key() {
        let table = TableDescriptor::new(
            "order_lines",
            vec![
                ColumnDescriptor::new("order_id", CanonicalType::Integer, "integer"),
                ColumnDescriptor::new("sku", CanonicalType::String, "text"),
                ColumnDescriptor::new("qty", CanonicalType::Integer, "integer"),
            ],
            vec!["order_id".to_string(), "sku".to_string()],
        )
        .unwrap();
        let stmt = sqlite().build_select_by_id(&table, "10,AB-1").unwrap();
        assert!(stmt.sql.ends_with(r#"WHERE "order_id" = ? AND "sku" = ?"#));
        assert_eq!(
            stmt.params,
            vec![QueryParam::Int(10), QueryParam::String("AB-1".to_string())]
        );

        let err = sqlite().build_select_by_id(&table, "10").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_no_primary_key_cannot_address_rows() {
        let table = TableDescriptor::new(
            "log",
            vec![ColumnDescriptor::new("line", CanonicalType::Text, "text")],
            vec![],
        )
        .unwrap();
        let err = sqlite().build_select_by_id(&table, "1").unwrap_err();
        assert_eq!(err.kind(), "schema_error");
        // listing still works, just without a default order
        let stmt = sqlite().build_select(&table, &QuerySpec::new("log")).unwrap();
        assert!(!stmt.sql.contains("ORDER BY"));
    }

    #[test]
    fn test_create_table() {
        let table = users();
        let stmt = sqlite().build_create_table(&table);
        assert_eq!(
            stmt.sql,
            r#"CREATE TABLE IF NOT EXISTS "users" ("id" INTEGER NOT NULL, "name" varchar(50) NOT NULL, "age" INTEGER, "created" DATETIME, PRIMARY KEY ("id"))"#
        );

        let stmt = pg().build_create_table(&table);
        assert!(stmt.sql.contains(r#""id" bigint NOT NULL GENERATED BY DEFAULT AS IDENTITY"#));
        assert!(stmt.sql.contains(r#""created" timestamp"#));
    }
}
