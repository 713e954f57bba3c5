//! Backend dispatch macro.
//!
//! Per-backend pools and connections are separate enum types with the same
//! variant names. This macro writes the match over them once.

/// Generate match arms over a backend enum declared in `db::pool`.
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($enum:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::pool::$enum::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
