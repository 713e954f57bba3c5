//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Backend connectors (dialect, type tables, catalog queries, error codes)
//! - Connection pool management and the schema cache
//! - Statement execution
//! - Schema introspection
//! - Type mappings and value coercion

#[macro_use]
pub mod macros;
pub mod connector;
pub mod executor;
pub mod params;
pub mod pool;
pub mod schema;
pub mod types;

pub use connector::{Connector, connector_for};
pub use executor::{ExecuteOutcome, StatementExecutor};
pub use pool::{ConnectionManager, DbPool, PooledConnection, RawConnection};
pub use schema::{SchemaCache, SchemaIntrospector};
pub use types::TypeMapper;
