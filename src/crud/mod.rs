//! CRUD layer: statement building, record validation and the per-table API.

pub mod builder;
pub mod table_api;
pub mod validation;

pub use builder::QueryBuilder;
pub use table_api::{DeleteOutcome, TableApi};
pub use validation::{ValidatedRecord, ValidationEngine, WriteMode};
