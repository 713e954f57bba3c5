//! Query-related data models.
//!
//! This module defines the backend-neutral read request (`QuerySpec`), the
//! statements produced from it, and the records exchanged with storage.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default upper bound for a page of `list` results.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// A table row keyed by column name, holding canonical-typed values.
pub type Record = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    /// Stored as i64 for maximum range
    Int(i64),
    Float(f64),
    String(String),
    Json(JsonValue),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl QueryParam {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamptz",
        }
    }
}

/// SQL text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Comparison operators allowed in a `where` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::In => "in",
        }
    }

    /// SQL comparison for the scalar operators.
    pub fn sql_operator(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::In => "IN",
        }
    }
}

impl std::str::FromStr for FilterOperator {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            "like" => Ok(Self::Like),
            "in" => Ok(Self::In),
            other => Err(DbError::invalid_filter(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFilter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: JsonValue,
}

impl QueryFilter {
    /// Build a filter, rejecting operators outside the fixed set.
    pub fn new(
        column: impl Into<String>,
        operator: &str,
        value: impl Into<JsonValue>,
    ) -> DbResult<Self> {
        Ok(Self {
            column: column.into(),
            operator: operator.parse()?,
            value: value.into(),
        })
    }

    /// Parse the JSON `where` parameter: `[{"column", "operator", "value"}, ...]`.
    pub fn parse_list(raw: &str) -> DbResult<Vec<Self>> {
        let entries: Vec<RawFilter> = serde_json::from_str(raw)
            .map_err(|e| DbError::invalid_filter(format!("malformed where parameter: {}", e)))?;
        entries
            .into_iter()
            .map(|f| Self::new(f.column, &f.operator, f.value))
            .collect()
    }
}

#[derive(Deserialize)]
struct RawFilter {
    column: String,
    operator: String,
    #[serde(default)]
    value: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(DbError::invalid_sort(format!(
                "unknown sort direction '{}'",
                s
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: &str) -> DbResult<Self> {
        Ok(Self {
            column: column.into(),
            direction: direction.parse()?,
        })
    }

    /// Parse the JSON `sort` parameter: `[{"column", "direction"}, ...]`.
    /// A missing direction means ascending.
    pub fn parse_list(raw: &str) -> DbResult<Vec<Self>> {
        let entries: Vec<RawSort> = serde_json::from_str(raw)
            .map_err(|e| DbError::invalid_sort(format!("malformed sort parameter: {}", e)))?;
        entries
            .into_iter()
            .map(|s| Self::new(s.column, s.direction.as_deref().unwrap_or("asc")))
            .collect()
    }
}

#[derive(Deserialize)]
struct RawSort {
    column: String,
    direction: Option<String>,
}

/// Backend-neutral description of a read request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub table: String,
    pub filters: Vec<QueryFilter>,
    pub sort: Vec<SortSpec>,
    /// Requested page size, clamped by `effective_limit`
    pub limit: Option<u32>,
    pub offset: u64,
}

impl QuerySpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Page size after clamping to `max_page_size`; defaults to the maximum.
    pub fn effective_limit(&self, max_page_size: u32) -> u32 {
        self.limit
            .map(|l| l.min(max_page_size))
            .unwrap_or(max_page_size)
    }
}

/// One page of `list` results plus the pre-pagination match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub records: Vec<Record>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}
