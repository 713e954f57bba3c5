//! Backend connectors.
//!
//! A `Connector` bundles everything that differs between engines: the catalog
//! queries used for introspection, the native type table, statement dialect
//! quirks and the mapping of engine error codes onto `DbError`. Shared logic
//! (builders, validation, routes) only talks to this trait, so a new backend is
//! added by implementing it, not by editing the callers.

use crate::error::DbError;
use crate::models::{BackendKind, CanonicalType, ColumnDescriptor};
use sqlx::error::{DatabaseError, ErrorKind};

/// Catalog statements for one backend. Each takes the table name as its only
/// bound parameter, except `list_tables` which takes none.
#[derive(Debug)]
pub struct CatalogQueries {
    pub list_tables: &'static str,
    pub columns: &'static str,
    pub primary_key: &'static str,
}

pub trait Connector: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Introspection statements, or `None` when the backend cannot be introspected.
    fn catalog(&self) -> Option<&'static CatalogQueries>;

    /// Static native-type table. `native` is already lowercased and stripped of
    /// length/precision modifiers.
    fn lookup_native(&self, native: &str) -> Option<CanonicalType>;

    /// Canonical type for a native type name as reported by the catalog.
    fn native_to_canonical(&self, native: &str) -> Option<CanonicalType> {
        self.lookup_native(&base_type_name(native))
    }

    /// Native type emitted for a canonical type in generated DDL.
    fn canonical_to_native(&self, canonical: CanonicalType) -> &'static str;

    fn quote_ident(&self, ident: &str) -> String;

    /// Placeholder for the `index`-th (1-based) bound parameter. `cast` names
    /// the native column type the value is compared with or stored into.
    fn placeholder(&self, index: usize, cast: Option<&str>) -> String;

    /// Column expression used in select lists and `RETURNING` clauses.
    fn select_expr(&self, column: &ColumnDescriptor) -> String {
        self.quote_ident(&column.name)
    }

    /// `<column> LIKE <placeholder>`, casting non-text columns where needed.
    fn like_expr(&self, column: &ColumnDescriptor, placeholder: &str) -> String {
        format!("{} LIKE {}", self.quote_ident(&column.name), placeholder)
    }

    fn supports_returning(&self) -> bool;

    /// `INSERT` for a row where every column takes its default.
    fn insert_defaults(&self, quoted_table: &str) -> String;

    /// Whether the column holds an engine-generated key (rowid alias etc.) that
    /// the catalog does not flag on its own.
    fn implicit_auto_generated(&self, _native: &str, _sole_primary_key: bool) -> bool {
        false
    }

    /// Column clause that makes a single integer key engine-generated in DDL.
    fn auto_increment_clause(&self) -> Option<&'static str> {
        None
    }

    /// Map an engine error onto the crate taxonomy.
    fn classify_error(&self, err: &dyn DatabaseError) -> DbError;
}

/// The connector serving `kind`.
pub fn connector_for(kind: BackendKind) -> &'static dyn Connector {
    match kind {
        BackendKind::PostgreSQL => &PostgresConnector,
        BackendKind::MySQL => &MySqlConnector,
        BackendKind::SQLite => &SqliteConnector,
    }
}

/// Lowercase a native type and drop `(n)`/`(p,s)` modifiers and MySQL
/// `unsigned`/`zerofill` attributes: `VARCHAR(50)` -> `varchar`,
/// `timestamp(3) with time zone` -> `timestamp with time zone`.
pub fn base_type_name(native: &str) -> String {
    let lower = native.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut depth = 0usize;
    for ch in lower.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace()
        .filter(|w| *w != "unsigned" && *w != "zerofill")
        .collect::<Vec<_>>()
        .join(" ")
}

/// Declared length of a bounded type such as `varchar(50)`.
pub fn declared_length(native: &str) -> Option<u32> {
    let start = native.find('(')?;
    let end = native[start..].find(')')? + start;
    native[start + 1..end].trim().parse().ok()
}

fn quote_with(ident: &str, quote: char) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push(quote);
    for ch in ident.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
    out
}

fn classify_by_kind(err: &dyn DatabaseError) -> DbError {
    let code = err.code().map(|c| c.into_owned());
    let conflict = matches!(
        err.kind(),
        ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation
    );
    DbError::query(err.message(), code, conflict)
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

static POSTGRES_CATALOG: CatalogQueries = CatalogQueries {
    list_tables: r#"
        SELECT table_name::text AS table_name
        FROM information_schema.tables
        WHERE table_schema = current_schema()
          AND table_type = 'BASE TABLE'
        ORDER BY table_name
        "#,
    columns: r#"
        SELECT
            c.column_name::text AS column_name,
            c.udt_name::text AS native_type,
            (c.is_nullable = 'YES') AS nullable,
            c.column_default::text AS column_default,
            c.character_maximum_length::int8 AS max_length,
            (c.is_identity = 'YES'
                OR c.is_generated = 'ALWAYS'
                OR COALESCE(c.column_default, '') LIKE 'nextval(%') AS auto_generated
        FROM information_schema.columns c
        WHERE c.table_schema = current_schema()
          AND c.table_name = $1
        ORDER BY c.ordinal_position
        "#,
    primary_key: r#"
        SELECT kcu.column_name::text AS column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
           AND tc.table_schema = kcu.table_schema
           AND tc.table_name = kcu.table_name
        WHERE tc.constraint_type = 'PRIMARY KEY'
          AND tc.table_schema = current_schema()
          AND tc.table_name = $1
        ORDER BY kcu.ordinal_position
        "#,
};

static POSTGRES_TYPES: &[(&str, CanonicalType)] = &[
    ("varchar", CanonicalType::String),
    ("character varying", CanonicalType::String),
    ("bpchar", CanonicalType::String),
    ("char", CanonicalType::String),
    ("character", CanonicalType::String),
    ("name", CanonicalType::String),
    ("citext", CanonicalType::String),
    ("uuid", CanonicalType::String),
    ("text", CanonicalType::Text),
    ("int2", CanonicalType::Integer),
    ("int4", CanonicalType::Integer),
    ("int8", CanonicalType::Integer),
    ("smallint", CanonicalType::Integer),
    ("integer", CanonicalType::Integer),
    ("bigint", CanonicalType::Integer),
    ("smallserial", CanonicalType::Integer),
    ("serial", CanonicalType::Integer),
    ("bigserial", CanonicalType::Integer),
    ("float4", CanonicalType::Float),
    ("float8", CanonicalType::Float),
    ("real", CanonicalType::Float),
    ("double precision", CanonicalType::Float),
    ("numeric", CanonicalType::Float),
    ("decimal", CanonicalType::Float),
    ("bool", CanonicalType::Boolean),
    ("boolean", CanonicalType::Boolean),
    ("date", CanonicalType::Date),
    ("timestamp", CanonicalType::Datetime),
    ("timestamptz", CanonicalType::Datetime),
    ("timestamp without time zone", CanonicalType::Datetime),
    ("timestamp with time zone", CanonicalType::Datetime),
    ("json", CanonicalType::Json),
    ("jsonb", CanonicalType::Json),
];

// Native types that decode as text without a cast in the select list.
const POSTGRES_TEXT_NATIVES: &[&str] = &[
    "varchar",
    "character varying",
    "bpchar",
    "char",
    "character",
    "name",
    "citext",
    "text",
    "bytea",
];

impl Connector for PostgresConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::PostgreSQL
    }

    fn catalog(&self) -> Option<&'static CatalogQueries> {
        Some(&POSTGRES_CATALOG)
    }

    fn lookup_native(&self, native: &str) -> Option<CanonicalType> {
        POSTGRES_TYPES
            .iter()
            .find(|(name, _)| *name == native)
            .map(|(_, t)| *t)
    }

    fn canonical_to_native(&self, canonical: CanonicalType) -> &'static str {
        match canonical {
            CanonicalType::String => "varchar(255)",
            CanonicalType::Text => "text",
            CanonicalType::Integer => "bigint",
            CanonicalType::Float => "double precision",
            CanonicalType::Boolean => "boolean",
            CanonicalType::Date => "date",
            CanonicalType::Datetime => "timestamp",
            CanonicalType::Json => "jsonb",
        }
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn placeholder(&self, index: usize, cast: Option<&str>) -> String {
        match cast.map(str::trim) {
            // catalog udt names are single identifiers, possibly mixed-case
            Some(native) if !native.contains(['(', ' ']) => {
                format!("${}::{}", index, self.quote_ident(native))
            }
            Some(native) => format!("${}::{}", index, base_type_name(native)),
            None => format!("${}", index),
        }
    }

    fn select_expr(&self, column: &ColumnDescriptor) -> String {
        let quoted = self.quote_ident(&column.name);
        let native = base_type_name(&column.native_type);
        if column.canonical_type.is_textual() && !POSTGRES_TEXT_NATIVES.contains(&native.as_str())
        {
            format!("{}::text AS {}", quoted, quoted)
        } else if native == "numeric" || native == "decimal" {
            format!("{}::float8 AS {}", quoted, quoted)
        } else {
            quoted
        }
    }

    fn like_expr(&self, column: &ColumnDescriptor, placeholder: &str) -> String {
        let quoted = self.quote_ident(&column.name);
        if column.canonical_type.is_textual() {
            format!("{}::text LIKE {}", quoted, placeholder)
        } else {
            format!("CAST({} AS TEXT) LIKE {}", quoted, placeholder)
        }
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn insert_defaults(&self, quoted_table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", quoted_table)
    }

    fn auto_increment_clause(&self) -> Option<&'static str> {
        Some("GENERATED BY DEFAULT AS IDENTITY")
    }

    fn classify_error(&self, err: &dyn DatabaseError) -> DbError {
        let code = err.code().map(|c| c.into_owned()).unwrap_or_default();
        match code.as_str() {
            // undefined_table, undefined_column
            "42P01" | "42703" => DbError::schema(err.message(), err.table().unwrap_or_default()),
            // query_canceled (server-side statement_timeout)
            "57014" => DbError::timeout("statement", 0),
            // serialization_failure, deadlock_detected
            "40001" | "40P01" => DbError::query(err.message(), Some(code), true),
            c if c.starts_with("08") => DbError::connection(
                err.message(),
                "The connection was dropped by the server; retry the request",
            ),
            "53300" => DbError::connection(
                err.message(),
                "The server refused new connections; lower max_connections",
            ),
            _ => classify_by_kind(err),
        }
    }
}

// =============================================================================
// MySQL / MariaDB
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

static MYSQL_CATALOG: CatalogQueries = CatalogQueries {
    list_tables: r#"
        SELECT TABLE_NAME AS table_name
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#,
    columns: r#"
        SELECT
            COLUMN_NAME AS column_name,
            COLUMN_TYPE AS native_type,
            IS_NULLABLE AS is_nullable,
            COLUMN_DEFAULT AS column_default,
            CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS max_length,
            EXTRA AS extra
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
        "#,
    primary_key: r#"
        SELECT COLUMN_NAME AS column_name
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_NAME = ?
          AND CONSTRAINT_NAME = 'PRIMARY'
        ORDER BY ORDINAL_POSITION
        "#,
};

static MYSQL_TYPES: &[(&str, CanonicalType)] = &[
    ("char", CanonicalType::String),
    ("varchar", CanonicalType::String),
    ("enum", CanonicalType::String),
    ("set", CanonicalType::String),
    ("tinytext", CanonicalType::Text),
    ("text", CanonicalType::Text),
    ("mediumtext", CanonicalType::Text),
    ("longtext", CanonicalType::Text),
    ("tinyint", CanonicalType::Integer),
    ("smallint", CanonicalType::Integer),
    ("mediumint", CanonicalType::Integer),
    ("int", CanonicalType::Integer),
    ("integer", CanonicalType::Integer),
    ("bigint", CanonicalType::Integer),
    ("year", CanonicalType::Integer),
    ("float", CanonicalType::Float),
    ("double", CanonicalType::Float),
    ("double precision", CanonicalType::Float),
    ("real", CanonicalType::Float),
    ("decimal", CanonicalType::Float),
    ("numeric", CanonicalType::Float),
    ("bool", CanonicalType::Boolean),
    ("boolean", CanonicalType::Boolean),
    ("date", CanonicalType::Date),
    ("datetime", CanonicalType::Datetime),
    ("timestamp", CanonicalType::Datetime),
    ("json", CanonicalType::Json),
];

const MYSQL_TEXT_NATIVES: &[&str] = &[
    "char",
    "varchar",
    "enum",
    "set",
    "tinytext",
    "text",
    "mediumtext",
    "longtext",
    "binary",
    "varbinary",
    "tinyblob",
    "blob",
    "mediumblob",
    "longblob",
];

impl Connector for MySqlConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::MySQL
    }

    fn catalog(&self) -> Option<&'static CatalogQueries> {
        Some(&MYSQL_CATALOG)
    }

    fn lookup_native(&self, native: &str) -> Option<CanonicalType> {
        MYSQL_TYPES
            .iter()
            .find(|(name, _)| *name == native)
            .map(|(_, t)| *t)
    }

    fn native_to_canonical(&self, native: &str) -> Option<CanonicalType> {
        let base = base_type_name(native);
        if base == "tinyint" && declared_length(native) == Some(1) {
            return Some(CanonicalType::Boolean);
        }
        self.lookup_native(&base)
    }

    fn canonical_to_native(&self, canonical: CanonicalType) -> &'static str {
        match canonical {
            CanonicalType::String => "varchar(255)",
            CanonicalType::Text => "text",
            CanonicalType::Integer => "bigint",
            CanonicalType::Float => "double",
            CanonicalType::Boolean => "tinyint(1)",
            CanonicalType::Date => "date",
            CanonicalType::Datetime => "datetime",
            CanonicalType::Json => "json",
        }
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with(ident, '`')
    }

    fn placeholder(&self, _index: usize, _cast: Option<&str>) -> String {
        "?".to_string()
    }

    fn select_expr(&self, column: &ColumnDescriptor) -> String {
        let quoted = self.quote_ident(&column.name);
        let native = base_type_name(&column.native_type);
        if column.canonical_type.is_textual() && !MYSQL_TEXT_NATIVES.contains(&native.as_str()) {
            format!("CAST({} AS CHAR) AS {}", quoted, quoted)
        } else {
            quoted
        }
    }

    fn like_expr(&self, column: &ColumnDescriptor, placeholder: &str) -> String {
        let quoted = self.quote_ident(&column.name);
        if column.canonical_type.is_textual() {
            format!("{} LIKE {}", quoted, placeholder)
        } else {
            format!("CAST({} AS CHAR) LIKE {}", quoted, placeholder)
        }
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn insert_defaults(&self, quoted_table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", quoted_table)
    }

    fn auto_increment_clause(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn classify_error(&self, err: &dyn DatabaseError) -> DbError {
        let code = err.code().map(|c| c.into_owned()).unwrap_or_default();
        match code.as_str() {
            // ER_NO_SUCH_TABLE, ER_BAD_FIELD_ERROR
            "42S02" | "42S22" => DbError::schema(err.message(), err.table().unwrap_or_default()),
            // ER_LOCK_DEADLOCK
            "40001" => DbError::query(err.message(), Some(code), true),
            "70100" => DbError::cancelled("statement"),
            c if c.starts_with("08") => DbError::connection(
                err.message(),
                "The connection was dropped by the server; retry the request",
            ),
            _ => classify_by_kind(err),
        }
    }
}

// =============================================================================
// SQLite
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

static SQLITE_CATALOG: CatalogQueries = CatalogQueries {
    list_tables: r#"
        SELECT name AS table_name
        FROM sqlite_master
        WHERE type = 'table'
          AND name NOT LIKE 'sqlite_%'
        ORDER BY name
        "#,
    columns: r#"
        SELECT name, type, "notnull", dflt_value, pk
        FROM pragma_table_info(?)
        ORDER BY cid
        "#,
    primary_key: r#"
        SELECT name AS column_name
        FROM pragma_table_info(?)
        WHERE pk > 0
        ORDER BY pk
        "#,
};

static SQLITE_TYPES: &[(&str, CanonicalType)] = &[
    ("varchar", CanonicalType::String),
    ("character varying", CanonicalType::String),
    ("varying character", CanonicalType::String),
    ("char", CanonicalType::String),
    ("character", CanonicalType::String),
    ("nchar", CanonicalType::String),
    ("native character", CanonicalType::String),
    ("nvarchar", CanonicalType::String),
    ("uuid", CanonicalType::String),
    ("text", CanonicalType::Text),
    ("clob", CanonicalType::Text),
    ("integer", CanonicalType::Integer),
    ("int", CanonicalType::Integer),
    ("tinyint", CanonicalType::Integer),
    ("smallint", CanonicalType::Integer),
    ("mediumint", CanonicalType::Integer),
    ("bigint", CanonicalType::Integer),
    ("unsigned big int", CanonicalType::Integer),
    ("int2", CanonicalType::Integer),
    ("int8", CanonicalType::Integer),
    ("real", CanonicalType::Float),
    ("double", CanonicalType::Float),
    ("double precision", CanonicalType::Float),
    ("float", CanonicalType::Float),
    ("numeric", CanonicalType::Float),
    ("decimal", CanonicalType::Float),
    ("boolean", CanonicalType::Boolean),
    ("bool", CanonicalType::Boolean),
    ("date", CanonicalType::Date),
    ("datetime", CanonicalType::Datetime),
    ("timestamp", CanonicalType::Datetime),
    ("json", CanonicalType::Json),
];

impl Connector for SqliteConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::SQLite
    }

    fn catalog(&self) -> Option<&'static CatalogQueries> {
        Some(&SQLITE_CATALOG)
    }

    fn lookup_native(&self, native: &str) -> Option<CanonicalType> {
        SQLITE_TYPES
            .iter()
            .find(|(name, _)| *name == native)
            .map(|(_, t)| *t)
    }

    fn canonical_to_native(&self, canonical: CanonicalType) -> &'static str {
        match canonical {
            CanonicalType::String => "VARCHAR(255)",
            CanonicalType::Text => "TEXT",
            CanonicalType::Integer => "INTEGER",
            CanonicalType::Float => "REAL",
            CanonicalType::Boolean => "BOOLEAN",
            CanonicalType::Date => "DATE",
            CanonicalType::Datetime => "DATETIME",
            CanonicalType::Json => "JSON",
        }
    }

    fn quote_ident(&self, ident: &str) -> String {
        quote_with(ident, '"')
    }

    fn placeholder(&self, _index: usize, _cast: Option<&str>) -> String {
        "?".to_string()
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn insert_defaults(&self, quoted_table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", quoted_table)
    }

    fn implicit_auto_generated(&self, native: &str, sole_primary_key: bool) -> bool {
        // INTEGER PRIMARY KEY aliases the rowid
        sole_primary_key && native.trim().eq_ignore_ascii_case("integer")
    }

    fn classify_error(&self, err: &dyn DatabaseError) -> DbError {
        let message = err.message();
        if let Some(object) = message
            .strip_prefix("no such table: ")
            .or_else(|| message.strip_prefix("no such column: "))
        {
            return DbError::schema(message, object);
        }
        classify_by_kind(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type_name() {
        assert_eq!(base_type_name("VARCHAR(50)"), "varchar");
        assert_eq!(base_type_name("int(10) unsigned"), "int");
        assert_eq!(base_type_name("decimal(10,2)"), "decimal");
        assert_eq!(
            base_type_name("timestamp(3) with time zone"),
            "timestamp with time zone"
        );
        assert_eq!(base_type_name("  Double   Precision "), "double precision");
    }

    #[test]
    fn test_declared_length() {
        assert_eq!(declared_length("varchar(50)"), Some(50));
        assert_eq!(declared_length("CHAR( 8 )"), Some(8));
        assert_eq!(declared_length("decimal(10,2)"), None);
        assert_eq!(declared_length("text"), None);
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(PostgresConnector.quote_ident("users"), "\"users\"");
        assert_eq!(PostgresConnector.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MySqlConnector.quote_ident("or`der"), "`or``der`");
        assert_eq!(SqliteConnector.quote_ident("order"), "\"order\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(PostgresConnector.placeholder(3, None), "$3");
        assert_eq!(PostgresConnector.placeholder(1, Some("int4")), "$1::\"int4\"");
        assert_eq!(PostgresConnector.placeholder(2, Some("Mood")), "$2::\"Mood\"");
        assert_eq!(
            PostgresConnector.placeholder(4, Some("varchar(20)")),
            "$4::varchar"
        );
        assert_eq!(MySqlConnector.placeholder(7, Some("int")), "?");
        assert_eq!(SqliteConnector.placeholder(2, None), "?");
    }

    #[test]
    fn test_postgres_select_expr_casts_non_text_strings() {
        let uuid = ColumnDescriptor::new("id", CanonicalType::String, "uuid");
        assert_eq!(PostgresConnector.select_expr(&uuid), "\"id\"::text AS \"id\"");

        let name = ColumnDescriptor::new("name", CanonicalType::String, "varchar");
        assert_eq!(PostgresConnector.select_expr(&name), "\"name\"");

        let age = ColumnDescriptor::new("age", CanonicalType::Integer, "int4");
        assert_eq!(PostgresConnector.select_expr(&age), "\"age\"");

        let price = ColumnDescriptor::new("price", CanonicalType::Float, "numeric");
        assert_eq!(
            PostgresConnector.select_expr(&price),
            "\"price\"::float8 AS \"price\""
        );
    }

    #[test]
    fn test_mysql_select_expr_casts_time() {
        let at = ColumnDescriptor::new("opens_at", CanonicalType::String, "time");
        assert_eq!(
            MySqlConnector.select_expr(&at),
            "CAST(`opens_at` AS CHAR) AS `opens_at`"
        );
        let blob = ColumnDescriptor::new("data", CanonicalType::String, "blob");
        assert_eq!(MySqlConnector.select_expr(&blob), "`data`");
    }

    #[test]
    fn test_like_expr() {
        let age = ColumnDescriptor::new("age", CanonicalType::Integer, "int4");
        assert_eq!(
            PostgresConnector.like_expr(&age, "$1"),
            "CAST(\"age\" AS TEXT) LIKE $1"
        );
        let name = ColumnDescriptor::new("name", CanonicalType::String, "varchar(20)");
        assert_eq!(SqliteConnector.like_expr(&name, "?"), "\"name\" LIKE ?");
    }

    #[test]
    fn test_insert_defaults() {
        assert_eq!(
            MySqlConnector.insert_defaults("`t`"),
            "INSERT INTO `t` () VALUES ()"
        );
        assert_eq!(
            SqliteConnector.insert_defaults("\"t\""),
            "INSERT INTO \"t\" DEFAULT VALUES"
        );
    }

    #[test]
    fn test_sqlite_rowid_alias() {
        assert!(SqliteConnector.implicit_auto_generated("INTEGER", true));
        assert!(!SqliteConnector.implicit_auto_generated("INT", true));
        assert!(!SqliteConnector.implicit_auto_generated("INTEGER", false));
        assert!(!PostgresConnector.implicit_auto_generated("int4", true));
    }

    #[test]
    fn test_connector_for() {
        for kind in [BackendKind::PostgreSQL, BackendKind::MySQL, BackendKind::SQLite] {
            let connector = connector_for(kind);
            assert_eq!(connector.kind(), kind);
            assert!(connector.catalog().is_some());
        }
    }

    #[test]
    fn test_every_canonical_type_round_trips_through_ddl_names() {
        for kind in [BackendKind::PostgreSQL, BackendKind::MySQL, BackendKind::SQLite] {
            let connector = connector_for(kind);
            for canonical in CanonicalType::ALL {
                let native = connector.canonical_to_native(canonical);
                assert_eq!(
                    connector.native_to_canonical(native),
                    Some(canonical),
                    "{kind} {native}"
                );
            }
        }
    }
}
