//! Parameter binding for parameterized statements.
//!
//! Every value that reaches SQL goes through one of these functions; builders
//! only ever emit placeholders.

use crate::db::types::{format_date, format_naive_datetime, format_utc_datetime};
use crate::models::QueryParam;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
        QueryParam::Date(v) => query.bind(*v),
        QueryParam::Timestamp(v) => query.bind(*v),
        QueryParam::TimestampTz(v) => query.bind(*v),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
        QueryParam::Date(v) => query.bind(*v),
        QueryParam::Timestamp(v) => query.bind(*v),
        QueryParam::TimestampTz(v) => query.bind(*v),
    }
}

/// Bind a parameter to a SQLite query.
///
/// SQLite has no native date or JSON storage; those go in as text in the
/// same format the decoder normalizes to.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(v.to_string()),
        QueryParam::Date(v) => query.bind(format_date(v)),
        QueryParam::Timestamp(v) => query.bind(format_naive_datetime(v)),
        QueryParam::TimestampTz(v) => query.bind(format_utc_datetime(v)),
    }
}
