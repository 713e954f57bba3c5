//! Record validation.
//!
//! Checks a candidate record against a `TableDescriptor` before any statement
//! is built. All violations are collected; the engine never stops at the
//! first one and never fails on malformed input.

use crate::db::types::coerce_value;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Record, TableDescriptor, ValidationError};
use tracing::debug;

/// Whether a record is inserted whole or applied as a partial update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Update,
}

impl WriteMode {
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Update)
    }
}

/// A record that passed validation, with every value coerced to its column's
/// canonical type. Values are in table column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedRecord {
    values: Vec<(String, QueryParam)>,
}

impl ValidatedRecord {
    pub fn values(&self) -> &[(String, QueryParam)] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&QueryParam> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct ValidationEngine;

impl ValidationEngine {
    /// Every violation in `record`, in rule order: unknown columns, missing
    /// required columns (inserts only), then per-value type checks.
    pub fn validate(
        table: &TableDescriptor,
        record: &Record,
        mode: WriteMode,
    ) -> Vec<ValidationError> {
        Self::check(table, record, mode).1
    }

    /// Validate and coerce in one pass. Fails with `DbError::Validation`
    /// listing every violation.
    pub fn prepare(
        table: &TableDescriptor,
        record: &Record,
        mode: WriteMode,
    ) -> DbResult<ValidatedRecord> {
        let (values, errors) = Self::check(table, record, mode);
        if errors.is_empty() {
            Ok(ValidatedRecord { values })
        } else {
            debug!(
                table = %table.name(),
                violations = errors.len(),
                "Record failed validation"
            );
            Err(DbError::validation(errors))
        }
    }

    fn check(
        table: &TableDescriptor,
        record: &Record,
        mode: WriteMode,
    ) -> (Vec<(String, QueryParam)>, Vec<ValidationError>) {
        let mut errors = Vec::new();

        let mut unknown: Vec<&String> = record
            .keys()
            .filter(|key| table.column(key).is_none())
            .collect();
        unknown.sort();
        for key in unknown {
            errors.push(ValidationError::new(key.as_str(), "unknown column"));
        }

        if !mode.is_update() {
            for column in table.columns() {
                if column.is_required_on_insert() && !record.contains_key(&column.name) {
                    errors.push(ValidationError::new(&column.name, "is required"));
                }
            }
        }

        let mut values = Vec::with_capacity(record.len());
        for column in table.columns() {
            let Some(value) = record.get(&column.name) else {
                continue;
            };
            match coerce_value(column, value) {
                Ok(param) => values.push((column.name.clone(), param)),
                Err(reason) => errors.push(ValidationError::new(&column.name, reason)),
            }
        }

        (values, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalType, ColumnDescriptor};
    use serde_json::json;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                ColumnDescriptor::new("id", CanonicalType::Integer, "integer").auto_generated(),
                ColumnDescriptor::new("name", CanonicalType::String, "varchar(5)")
                    .not_null()
                    .with_max_length(5),
                ColumnDescriptor::new("age", CanonicalType::Integer, "integer"),
                ColumnDescriptor::new("active", CanonicalType::Boolean, "boolean")
                    .not_null()
                    .with_default("1"),
                ColumnDescriptor::new("born", CanonicalType::Date, "date"),
                ColumnDescriptor::new("meta", CanonicalType::Json, "json"),
            ],
            vec!["id".to_string()],
        )
        .unwrap()
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_valid_insert() {
        let errors = ValidationEngine::validate(
            &users(),
            &record(json!({"name": "Ann", "age": "42", "active": "true", "meta": [1, 2]})),
            WriteMode::Insert,
        );
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_missing_required_column_named() {
        let errors =
            ValidationEngine::validate(&users(), &record(json!({"age": 3})), WriteMode::Insert);
        assert_eq!(errors, vec![ValidationError::new("name", "is required")]);

        // partial updates do not need required columns
        let errors =
            ValidationEngine::validate(&users(), &record(json!({"age": 3})), WriteMode::Update);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_reports_every_violation_in_rule_order() {
        let errors = ValidationEngine::validate(
            &users(),
            &record(json!({
                "zeta": 1,
                "alpha": 2,
                "age": 1.5,
                "active": "yes",
                "born": "03/04/2020",
            })),
            WriteMode::Insert,
        );
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["alpha", "zeta", "name", "age", "active", "born"]);
    }

    #[test]
    fn test_null_and_length_rules() {
        let errors = ValidationEngine::validate(
            &users(),
            &record(json!({"name": null, "age": null})),
            WriteMode::Update,
        );
        assert_eq!(errors, vec![ValidationError::new("name", "must not be null")]);

        let errors = ValidationEngine::validate(
            &users(),
            &record(json!({"name": "Annabel"})),
            WriteMode::Update,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.contains("maximum length"));
    }

    #[test]
    fn test_prepare_coerces_in_column_order() {
        let prepared = ValidationEngine::prepare(
            &users(),
            &record(json!({"active": "false", "name": "Bo", "age": "7"})),
            WriteMode::Insert,
        )
        .unwrap();
        let names: Vec<&str> = prepared.values().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["name", "age", "active"]);
        assert_eq!(prepared.get("age"), Some(&QueryParam::Int(7)));
        assert_eq!(prepared.get("active"), Some(&QueryParam::Bool(false)));
    }

    #[test]
    fn test_prepare_fails_with_all_errors() {
        let err = ValidationEngine::prepare(
            &users(),
            &record(json!({"nope": 1, "age": "x"})),
            WriteMode::Insert,
        )
        .unwrap_err();
        match err {
            DbError::Validation { errors } => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}
