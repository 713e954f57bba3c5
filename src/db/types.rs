//! Canonical type mapping.
//!
//! This module converts in both directions between backend values and the
//! canonical type set:
//!
//! 1. `TypeMapper` names the canonical type of a native column type (and the
//!    native type to emit for a canonical one in DDL).
//! 2. `coerce_value` turns an incoming JSON value into a bound parameter,
//!    applying the same rules validation uses.
//! 3. `RowToRecord` decodes result rows into canonical records, one decoder per
//!    backend, driven by the column's canonical type.

use crate::db::connector::connector_for;
use crate::models::{BackendKind, CanonicalType, ColumnDescriptor, QueryParam, Record, TableDescriptor};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const NAIVE_DATETIME_SPACE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const OFFSET_DATETIME_SPACE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

// =============================================================================
// Type Mapper
// =============================================================================

/// Stateless mapping between native and canonical type names.
pub struct TypeMapper;

impl TypeMapper {
    /// Canonical type of a native column type. Unknown types map to `string`
    /// with a warning so that one exotic column does not break introspection.
    pub fn to_canonical(kind: BackendKind, native_type: &str) -> CanonicalType {
        connector_for(kind)
            .native_to_canonical(native_type)
            .unwrap_or_else(|| {
                warn!(
                    backend = %kind,
                    native_type,
                    "Unmapped column type, treating as string"
                );
                CanonicalType::String
            })
    }

    /// Native type used for `canonical` when generating DDL.
    pub fn from_canonical(kind: BackendKind, canonical: CanonicalType) -> &'static str {
        connector_for(kind).canonical_to_native(canonical)
    }
}

// =============================================================================
// Value Coercion
// =============================================================================

/// Coerce a JSON value into a parameter for `column`.
///
/// Returns the human-readable reason on failure. Rules:
/// - `string`/`text`: JSON strings only, bounded by `max_length` (characters)
/// - `integer`: whole numbers, or strings holding one
/// - `float`: numbers, or numeric strings
/// - `boolean`: booleans, or the strings `"true"`/`"false"`
/// - `date`: `YYYY-MM-DD`
/// - `datetime`: RFC 3339, or `YYYY-MM-DDTHH:MM:SS[.f]` without offset
/// - `json`: any JSON value
pub fn coerce_value(column: &ColumnDescriptor, value: &JsonValue) -> Result<QueryParam, String> {
    if value.is_null() {
        return if column.nullable {
            Ok(QueryParam::Null)
        } else {
            Err("must not be null".to_string())
        };
    }

    match column.canonical_type {
        CanonicalType::String | CanonicalType::Text => {
            let s = value
                .as_str()
                .ok_or_else(|| format!("expected a string, got {}", json_kind(value)))?;
            if let Some(max) = column.max_length {
                if s.chars().count() > max as usize {
                    return Err(format!("exceeds maximum length of {}", max));
                }
            }
            Ok(QueryParam::String(s.to_string()))
        }
        CanonicalType::Integer => coerce_integer(value).map(QueryParam::Int),
        CanonicalType::Float => coerce_float(value).map(QueryParam::Float),
        CanonicalType::Boolean => match value {
            JsonValue::Bool(b) => Ok(QueryParam::Bool(*b)),
            JsonValue::String(s) if s == "true" => Ok(QueryParam::Bool(true)),
            JsonValue::String(s) if s == "false" => Ok(QueryParam::Bool(false)),
            _ => Err("must be a boolean or the string \"true\"/\"false\"".to_string()),
        },
        CanonicalType::Date => value
            .as_str()
            .and_then(parse_date)
            .map(QueryParam::Date)
            .ok_or_else(|| "must be a date in YYYY-MM-DD format".to_string()),
        CanonicalType::Datetime => value.as_str().and_then(parse_datetime).ok_or_else(|| {
            "must be an ISO 8601 datetime (YYYY-MM-DDTHH:MM:SS[.fff][Z|+HH:MM])".to_string()
        }),
        CanonicalType::Json => Ok(QueryParam::Json(value.clone())),
    }
}

/// Coerce a raw `{id}` path segment to the key column's type.
pub fn coerce_path_value(column: &ColumnDescriptor, raw: &str) -> Result<QueryParam, String> {
    let value = match column.canonical_type {
        CanonicalType::Json => {
            serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
        }
        _ => JsonValue::String(raw.to_string()),
    };
    coerce_value(column, &value)
}

fn coerce_integer(value: &JsonValue) -> Result<i64, String> {
    const REASON: &str = "must be a whole number";
    match value {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if n.as_u64().is_some() {
                Err("is out of range for a 64-bit integer".to_string())
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                        Ok(f as i64)
                    }
                    _ => Err(REASON.to_string()),
                }
            }
        }
        JsonValue::String(s) => s.trim().parse::<i64>().map_err(|_| REASON.to_string()),
        _ => Err(REASON.to_string()),
    }
}

fn coerce_float(value: &JsonValue) -> Result<f64, String> {
    const REASON: &str = "must be a number";
    match value {
        JsonValue::Number(n) => n.as_f64().ok_or_else(|| REASON.to_string()),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| REASON.to_string()),
        _ => Err(REASON.to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Parse a datetime under the accepted ISO profile.
pub fn parse_datetime(s: &str) -> Option<QueryParam> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(QueryParam::TimestampTz(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(s, NAIVE_DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, NAIVE_DATETIME_SPACE_FORMAT))
        .ok()
        .map(QueryParam::Timestamp)
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub fn format_naive_datetime(dt: &NaiveDateTime) -> String {
    dt.format(NAIVE_DATETIME_FORMAT).to_string()
}

pub fn format_utc_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Canonical form of a datetime stored as text; unparseable text is kept as is.
pub fn normalize_datetime_text(s: &str) -> String {
    if let Some(param) = parse_datetime(s) {
        return param_to_json(&param)
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| s.to_string());
    }
    DateTime::parse_from_str(s, OFFSET_DATETIME_SPACE_FORMAT)
        .map(|dt| format_utc_datetime(&dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| s.to_string())
}

/// The canonical JSON value a bound parameter stands for.
pub fn param_to_json(param: &QueryParam) -> JsonValue {
    match param {
        QueryParam::Null => JsonValue::Null,
        QueryParam::Bool(b) => JsonValue::Bool(*b),
        QueryParam::Int(i) => JsonValue::Number((*i).into()),
        QueryParam::Float(f) => float_to_json(*f),
        QueryParam::String(s) => JsonValue::String(s.clone()),
        QueryParam::Json(v) => v.clone(),
        QueryParam::Date(d) => JsonValue::String(format_date(d)),
        QueryParam::Timestamp(dt) => JsonValue::String(format_naive_datetime(dt)),
        QueryParam::TimestampTz(dt) => JsonValue::String(format_utc_datetime(dt)),
    }
}

fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw MySQL DECIMAL values, which the server sends as text.
/// PostgreSQL NUMERIC columns are cast to float8 in the select list instead.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl RawDecimal {
    fn into_json(self) -> JsonValue {
        match self.0.parse::<f64>() {
            Ok(v) if v.is_finite() => float_to_json(v),
            _ => JsonValue::String(self.0),
        }
    }
}

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Binary values are exposed as base64 strings.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn undecodable(column: &str, canonical: CanonicalType) -> JsonValue {
    warn!(column, canonical_type = %canonical, "Failed to decode column value, returning null");
    JsonValue::Null
}

// =============================================================================
// Row to Record Trait
// =============================================================================

/// Decode a result row into a canonical record using the table's descriptors.
pub trait RowToRecord {
    fn to_record(&self, table: &TableDescriptor) -> Record;
}

impl RowToRecord for MySqlRow {
    fn to_record(&self, table: &TableDescriptor) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let canonical = canonical_of(table, col.name());
                (col.name().to_string(), mysql::decode_column(self, idx, canonical))
            })
            .collect()
    }
}

impl RowToRecord for PgRow {
    fn to_record(&self, table: &TableDescriptor) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let canonical = canonical_of(table, col.name());
                (col.name().to_string(), postgres::decode_column(self, idx, canonical))
            })
            .collect()
    }
}

impl RowToRecord for SqliteRow {
    fn to_record(&self, table: &TableDescriptor) -> Record {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let canonical = canonical_of(table, col.name());
                (col.name().to_string(), sqlite::decode_column(self, idx, canonical))
            })
            .collect()
    }
}

fn canonical_of(table: &TableDescriptor, column: &str) -> CanonicalType {
    table
        .column(column)
        .map(|c| c.canonical_type)
        .unwrap_or(CanonicalType::String)
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, canonical: CanonicalType) -> JsonValue {
        if row.try_get_raw(idx).map_or(true, |v| v.is_null()) {
            return JsonValue::Null;
        }
        let value = match canonical {
            CanonicalType::Integer => decode_integer(row, idx),
            CanonicalType::Float => decode_float(row, idx),
            CanonicalType::Boolean => decode_boolean(row, idx),
            CanonicalType::Date => row
                .try_get::<NaiveDate, _>(idx)
                .ok()
                .map(|d| JsonValue::String(format_date(&d))),
            CanonicalType::Datetime => decode_datetime(row, idx),
            CanonicalType::Json => decode_json(row, idx),
            CanonicalType::String | CanonicalType::Text => decode_text(row, idx),
        };
        value.unwrap_or_else(|| undecodable(row.column(idx).name(), canonical))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        // Try signed types
        if let Ok(v) = row.try_get::<i8, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        // Try unsigned types
        if let Ok(v) = row.try_get::<u8, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<u16, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<u32, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<u64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        None
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<bool, _>(idx)
            .ok()
            .or_else(|| row.try_get::<i8, _>(idx).ok().map(|v| v != 0))
            .map(JsonValue::Bool)
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_to_json(v));
        }
        if let Ok(v) = row.try_get::<f32, _>(idx) {
            return Some(float_to_json(v as f64));
        }
        row.try_get::<RawDecimal, _>(idx).ok().map(RawDecimal::into_json)
    }

    fn decode_datetime(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(JsonValue::String(format_naive_datetime(&v)));
        }
        row.try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .map(|v| JsonValue::String(format_utc_datetime(&v)))
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<JsonValue, _>(idx) {
            return Some(v);
        }
        row.try_get::<String, _>(idx)
            .ok()
            .map(|s| serde_json::from_str(&s).unwrap_or(JsonValue::String(s)))
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Some(JsonValue::String(v));
        }
        // VARBINARY / BLOB
        row.try_get::<Vec<u8>, _>(idx)
            .ok()
            .map(|bytes| decode_binary_value(&bytes))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, canonical: CanonicalType) -> JsonValue {
        if row.try_get_raw(idx).map_or(true, |v| v.is_null()) {
            return JsonValue::Null;
        }
        let value = match canonical {
            CanonicalType::Integer => decode_integer(row, idx),
            CanonicalType::Float => decode_float(row, idx),
            CanonicalType::Boolean => row.try_get::<bool, _>(idx).ok().map(JsonValue::Bool),
            CanonicalType::Date => row
                .try_get::<NaiveDate, _>(idx)
                .ok()
                .map(|d| JsonValue::String(format_date(&d))),
            CanonicalType::Datetime => decode_datetime(row, idx),
            CanonicalType::Json => row.try_get::<JsonValue, _>(idx).ok(),
            CanonicalType::String | CanonicalType::Text => decode_text(row, idx),
        };
        value.unwrap_or_else(|| undecodable(row.column(idx).name(), canonical))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<i16, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i32, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        None
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_to_json(v));
        }
        row.try_get::<f32, _>(idx)
            .ok()
            .map(|v| float_to_json(v as f64))
    }

    fn decode_datetime(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<NaiveDateTime, _>(idx) {
            return Some(JsonValue::String(format_naive_datetime(&v)));
        }
        row.try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .map(|v| JsonValue::String(format_utc_datetime(&v)))
    }

    fn decode_text(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Some(JsonValue::String(v));
        }
        // bytea
        row.try_get::<Vec<u8>, _>(idx)
            .ok()
            .map(|bytes| decode_binary_value(&bytes))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, canonical: CanonicalType) -> JsonValue {
        if row.try_get_raw(idx).map_or(true, |v| v.is_null()) {
            return JsonValue::Null;
        }
        let value = match canonical {
            CanonicalType::Integer => decode_integer(row, idx),
            CanonicalType::Float => decode_float(row, idx),
            CanonicalType::Boolean => row
                .try_get::<bool, _>(idx)
                .ok()
                .or_else(|| row.try_get::<i64, _>(idx).ok().map(|v| v != 0))
                .map(JsonValue::Bool),
            // Dates are stored as text; normalize whatever format was written
            CanonicalType::Date => any_text(row, idx).map(|s| match parse_date(&s) {
                Some(d) => JsonValue::String(format_date(&d)),
                None => JsonValue::String(s),
            }),
            CanonicalType::Datetime => {
                any_text(row, idx).map(|s| JsonValue::String(normalize_datetime_text(&s)))
            }
            CanonicalType::Json => any_text(row, idx)
                .map(|s| serde_json::from_str(&s).unwrap_or(JsonValue::String(s))),
            CanonicalType::String | CanonicalType::Text => decode_text(row, idx),
        };
        value.unwrap_or_else(|| undecodable(row.column(idx).name(), canonical))
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            if v.fract() == 0.0 {
                return Some(JsonValue::Number((v as i64).into()));
            }
            return Some(float_to_json(v));
        }
        any_text(row, idx).map(JsonValue::String)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<f64, _>(idx) {
            return Some(float_to_json(v));
        }
        if let Ok(v) = row.try_get::<i64, _>(idx) {
            return Some(float_to_json(v as f64));
        }
        any_text(row, idx).map(JsonValue::String)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<String, _>(idx) {
            return Some(JsonValue::String(v));
        }
        if let Ok(bytes) = row.try_get::<Vec<u8>, _>(idx) {
            return Some(decode_binary_value(&bytes));
        }
        any_text(row, idx).map(JsonValue::String)
    }

    /// SQLite is dynamically typed; read the value's text rendering regardless
    /// of its storage class.
    fn any_text(row: &SqliteRow, idx: usize) -> Option<String> {
        row.try_get_unchecked::<String, _>(idx).ok()
    }
}
