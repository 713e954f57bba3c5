//! HTTP surface: generated per-table routes and the server that hosts them.

pub mod http;
pub mod routes;

pub use http::HttpServer;
pub use routes::{ListParams, RouteGenerator, table_router};
