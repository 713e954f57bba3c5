//! Data models for the DB CRUD Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{
    BackendKind, ConnectionConfig, ConnectionConfigError, ConnectionInfo, PoolStatus,
};
pub use query::{
    DEFAULT_MAX_PAGE_SIZE, FilterOperator, ListPage, QueryFilter, QueryParam, QuerySpec, Record,
    SortDirection, SortSpec, Statement, ValidationError,
};
pub use schema::{CanonicalType, ColumnDescriptor, TableDescriptor};
