//! Statement execution.
//!
//! Runs built `Statement`s on a borrowed connection with a per-statement
//! timeout, decodes rows into canonical records and classifies engine errors
//! through the backend's connector.
//!
//! Each backend submodule provides the same interface adapted to its driver.

use crate::db::connector::connector_for;
use crate::db::pool::PooledConnection;
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, Record, Statement, TableDescriptor};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Result of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteOutcome {
    pub rows_affected: u64,
    /// Generated key of the inserted row, where the engine reports one.
    pub last_insert_id: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct StatementExecutor {
    statement_timeout: Duration,
}

impl StatementExecutor {
    pub fn new(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    /// Run a row-returning statement and decode every row against `table`.
    pub async fn fetch_records(
        &self,
        conn: &mut PooledConnection,
        statement: &Statement,
        table: &TableDescriptor,
    ) -> DbResult<Vec<Record>> {
        let start = Instant::now();
        let backend = conn.backend();
        let limit = self.statement_timeout;
        debug!(sql = %statement.sql, params = statement.params.len(), "Fetching rows");

        let result = impl_db_dispatch!(RawConnection, conn.raw_mut(), {
            MySql(c) => timeout(limit, mysql::fetch_records(c, statement, table)).await,
            Postgres(c) => timeout(limit, postgres::fetch_records(c, statement, table)).await,
            SQLite(c) => timeout(limit, sqlite::fetch_records(c, statement, table)).await,
        });

        let records = self.settle(backend, "select", start, result)?;
        debug!(rows = records.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Rows fetched");
        Ok(records)
    }

    /// Run a statement expected to return at most one row.
    pub async fn fetch_optional(
        &self,
        conn: &mut PooledConnection,
        statement: &Statement,
        table: &TableDescriptor,
    ) -> DbResult<Option<Record>> {
        let mut records = self.fetch_records(conn, statement, table).await?;
        if records.len() > 1 {
            warn!(
                table = %table.name(),
                rows = records.len(),
                "Key lookup matched more than one row"
            );
        }
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    /// Run a `SELECT COUNT(*)` statement.
    pub async fn fetch_count(
        &self,
        conn: &mut PooledConnection,
        statement: &Statement,
    ) -> DbResult<u64> {
        let start = Instant::now();
        let backend = conn.backend();
        let limit = self.statement_timeout;
        debug!(sql = %statement.sql, params = statement.params.len(), "Counting rows");

        let result = impl_db_dispatch!(RawConnection, conn.raw_mut(), {
            MySql(c) => timeout(limit, mysql::fetch_count(c, statement)).await,
            Postgres(c) => timeout(limit, postgres::fetch_count(c, statement)).await,
            SQLite(c) => timeout(limit, sqlite::fetch_count(c, statement)).await,
        });

        let count = self.settle(backend, "count", start, result)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Run a statement that returns no rows.
    pub async fn execute(
        &self,
        conn: &mut PooledConnection,
        statement: &Statement,
    ) -> DbResult<ExecuteOutcome> {
        let start = Instant::now();
        let backend = conn.backend();
        let limit = self.statement_timeout;
        debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");

        let result = impl_db_dispatch!(RawConnection, conn.raw_mut(), {
            MySql(c) => timeout(limit, mysql::execute(c, statement)).await,
            Postgres(c) => timeout(limit, postgres::execute(c, statement)).await,
            SQLite(c) => timeout(limit, sqlite::execute(c, statement)).await,
        });

        let outcome = self.settle(backend, "write", start, result)?;
        debug!(
            rows_affected = outcome.rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(outcome)
    }

    fn settle<T>(
        &self,
        backend: BackendKind,
        operation: &str,
        start: Instant,
        result: Result<Result<T, sqlx::Error>, tokio::time::error::Elapsed>,
    ) -> DbResult<T> {
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = classify(backend, e);
                debug!(operation, error = %err, "Statement failed");
                Err(err)
            }
            Err(_) => {
                warn!(
                    operation,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Statement timed out"
                );
                Err(DbError::timeout(
                    operation,
                    self.statement_timeout.as_secs() as u32,
                ))
            }
        }
    }
}

/// Map a driver error to `DbError`, letting the connector interpret engine codes.
fn classify(backend: BackendKind, err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Database(db_err) => connector_for(backend).classify_error(db_err.as_ref()),
        other => DbError::from(other),
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::pool::PoolConnection;
    use sqlx::{Executor, MySql, Row};

    pub async fn fetch_records(
        conn: &mut PoolConnection<MySql>,
        statement: &Statement,
        table: &TableDescriptor,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_mysql_param(query, param);
        }
        let rows = query.fetch_all(&mut **conn).await?;
        Ok(rows.iter().map(|row| row.to_record(table)).collect())
    }

    pub async fn fetch_count(
        conn: &mut PoolConnection<MySql>,
        statement: &Statement,
    ) -> Result<i64, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_mysql_param(query, param);
        }
        query.fetch_one(&mut **conn).await?.try_get(0)
    }

    pub async fn execute(
        conn: &mut PoolConnection<MySql>,
        statement: &Statement,
    ) -> Result<ExecuteOutcome, sqlx::Error> {
        // DDL without parameters goes through the text protocol
        let result = if statement.params.is_empty() {
            (&mut **conn).execute(statement.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&statement.sql);
            for param in &statement.params {
                query = bind_mysql_param(query, param);
            }
            query.execute(&mut **conn).await?
        };
        let last_insert_id = result.last_insert_id();
        Ok(ExecuteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: (last_insert_id != 0).then_some(last_insert_id),
        })
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::pool::PoolConnection;
    use sqlx::{Executor, Postgres, Row};

    pub async fn fetch_records(
        conn: &mut PoolConnection<Postgres>,
        statement: &Statement,
        table: &TableDescriptor,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_postgres_param(query, param);
        }
        let rows = query.fetch_all(&mut **conn).await?;
        Ok(rows.iter().map(|row| row.to_record(table)).collect())
    }

    pub async fn fetch_count(
        conn: &mut PoolConnection<Postgres>,
        statement: &Statement,
    ) -> Result<i64, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_postgres_param(query, param);
        }
        query.fetch_one(&mut **conn).await?.try_get(0)
    }

    pub async fn execute(
        conn: &mut PoolConnection<Postgres>,
        statement: &Statement,
    ) -> Result<ExecuteOutcome, sqlx::Error> {
        let result = if statement.params.is_empty() {
            (&mut **conn).execute(statement.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&statement.sql);
            for param in &statement.params {
                query = bind_postgres_param(query, param);
            }
            query.execute(&mut **conn).await?
        };
        Ok(ExecuteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: None,
        })
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::pool::PoolConnection;
    use sqlx::{Executor, Row, Sqlite};

    pub async fn fetch_records(
        conn: &mut PoolConnection<Sqlite>,
        statement: &Statement,
        table: &TableDescriptor,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_sqlite_param(query, param);
        }
        let rows = query.fetch_all(&mut **conn).await?;
        Ok(rows.iter().map(|row| row.to_record(table)).collect())
    }

    pub async fn fetch_count(
        conn: &mut PoolConnection<Sqlite>,
        statement: &Statement,
    ) -> Result<i64, sqlx::Error> {
        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_sqlite_param(query, param);
        }
        query.fetch_one(&mut **conn).await?.try_get(0)
    }

    pub async fn execute(
        conn: &mut PoolConnection<Sqlite>,
        statement: &Statement,
    ) -> Result<ExecuteOutcome, sqlx::Error> {
        let result = if statement.params.is_empty() {
            (&mut **conn).execute(statement.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&statement.sql);
            for param in &statement.params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&mut **conn).await?
        };
        let rowid = result.last_insert_rowid();
        Ok(ExecuteOutcome {
            rows_affected: result.rows_affected(),
            last_insert_id: u64::try_from(rowid).ok().filter(|id| *id != 0),
        })
    }
}
