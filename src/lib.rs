//! DB CRUD Server Library
//!
//! Introspects SQL databases (SQLite, PostgreSQL, MySQL) and exposes
//! list/get/create/update/delete operations for every table, both as a
//! library API (`crud::TableApi`) and as generated REST routes.

pub mod config;
pub mod crud;
pub mod db;
pub mod error;
pub mod models;
pub mod transport;

pub use config::Config;
pub use crud::TableApi;
pub use db::ConnectionManager;
pub use error::{DbError, DbResult};
pub use transport::{HttpServer, RouteGenerator};
