//! Schema-related data models.
//!
//! This module defines the backend-neutral description of tables produced by
//! introspection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Backend-independent column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalType {
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Json,
}

impl CanonicalType {
    pub const ALL: [CanonicalType; 8] = [
        Self::String,
        Self::Text,
        Self::Integer,
        Self::Float,
        Self::Boolean,
        Self::Date,
        Self::Datetime,
        Self::Json,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Json => "json",
        }
    }

    /// Types that accept a `LIKE` pattern without casting.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Text)
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub canonical_type: CanonicalType,
    /// Type name as reported by the backend catalog
    pub native_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Only set for bounded string types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    pub is_primary_key: bool,
    /// Serial, identity, auto_increment or rowid alias
    pub auto_generated: bool,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        canonical_type: CanonicalType,
        native_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            canonical_type,
            native_type: native_type.into(),
            nullable: true,
            default_value: None,
            max_length: None,
            is_primary_key: false,
            auto_generated: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    /// Whether an insert must supply this column.
    pub fn is_required_on_insert(&self) -> bool {
        !self.nullable && self.default_value.is_none() && !self.auto_generated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
    primary_key: Vec<String>,
}

impl TableDescriptor {
    /// Build a descriptor, rejecting duplicate column names.
    ///
    /// The primary key follows the order of `primary_key`; every name in it must
    /// be one of the columns.
    pub fn new(
        name: impl Into<String>,
        mut columns: Vec<ColumnDescriptor>,
        primary_key: Vec<String>,
    ) -> Result<Self, String> {
        let name = name.into();
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(format!(
                    "duplicate column '{}' in table '{}'",
                    column.name, name
                ));
            }
        }
        for key in &primary_key {
            if !seen.contains(key.as_str()) {
                return Err(format!(
                    "primary key column '{}' is not a column of '{}'",
                    key, name
                ));
            }
        }
        for column in &mut columns {
            if primary_key.contains(&column.name) {
                column.is_primary_key = true;
                column.nullable = false;
            }
        }
        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.primary_key.iter().filter_map(|k| self.column(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", CanonicalType::Integer, "INTEGER").auto_generated(),
                ColumnDescriptor::new("name", CanonicalType::String, "varchar(50)")
                    .not_null()
                    .with_max_length(50),
                ColumnDescriptor::new("age", CanonicalType::Integer, "INTEGER"),
            ],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_type_serialization() {
        let json = serde_json::to_string(&CanonicalType::Datetime).unwrap();
        assert_eq!(json, "\"datetime\"");
        let parsed: CanonicalType = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(parsed, CanonicalType::Json);
    }

    #[test]
    fn test_table_descriptor_marks_primary_key() {
        let table = users();
        let id = table.column("id").unwrap();
        assert!(id.is_primary_key);
        assert!(!id.nullable);
        assert_eq!(table.primary_key(), ["id".to_string()]);
        assert!(!table.column("name").unwrap().is_primary_key);
    }

    #[test]
    fn test_table_descriptor_rejects_duplicate_columns() {
        let result = TableDescriptor::new(
            "t",
            vec![
                ColumnDescriptor::new("a", CanonicalType::Integer, "int"),
                ColumnDescriptor::new("a", CanonicalType::Text, "text"),
            ],
            vec![],
        );
        assert!(result.unwrap_err().contains("duplicate column 'a'"));
    }

    #[test]
    fn test_table_descriptor_rejects_unknown_key() {
        let result = TableDescriptor::new(
            "t",
            vec![ColumnDescriptor::new("a", CanonicalType::Integer, "int")],
            vec!["b".to_string()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_required_on_insert() {
        let table = users();
        assert!(!table.column("id").unwrap().is_required_on_insert());
        assert!(table.column("name").unwrap().is_required_on_insert());
        assert!(!table.column("age").unwrap().is_required_on_insert());

        let with_default = ColumnDescriptor::new("status", CanonicalType::String, "text")
            .not_null()
            .with_default("'active'");
        assert!(!with_default.is_required_on_insert());
    }
}
