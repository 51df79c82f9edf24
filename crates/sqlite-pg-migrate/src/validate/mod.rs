//! Schema compatibility checks between a source table and a pre-existing
//! target table.
//!
//! All checks run and every failure is collected. The comparison is strict:
//! an extra column in the target is a failure, not a tolerated superset.

use std::collections::{BTreeSet, HashSet};

use crate::core::TableSchema;
use crate::typemap::TypeMapper;

/// Outcome of validating one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Compares source and target table schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    mapper: TypeMapper,
}

impl SchemaValidator {
    pub fn new(mapper: TypeMapper) -> Self {
        Self { mapper }
    }

    /// Validate `target` against `source` for `table_name`.
    ///
    /// Checks, in order: missing columns, extra columns, type compatibility
    /// (mapped source type must be a case-insensitive substring of the target's
    /// declared type) and primary key set equality.
    pub fn validate(
        &self,
        source: &TableSchema,
        target: &TableSchema,
        table_name: &str,
    ) -> ValidationResult {
        let mut errors = Vec::new();

        let source_names: HashSet<&str> = source.columns.iter().map(|c| c.name.as_str()).collect();
        let target_names: HashSet<&str> = target.columns.iter().map(|c| c.name.as_str()).collect();

        for col in &source.columns {
            if !target_names.contains(col.name.as_str()) {
                errors.push(format!(
                    "Table '{}': missing column '{}' in target",
                    table_name, col.name
                ));
            }
        }

        for col in &target.columns {
            if !source_names.contains(col.name.as_str()) {
                errors.push(format!(
                    "Table '{}': extra column '{}' in target",
                    table_name, col.name
                ));
            }
        }

        for col in &source.columns {
            let Some(target_col) = target.column(&col.name) else {
                continue;
            };
            let expected = self.mapper.map(&col.declared_type);
            let actual = target_col.declared_type.to_uppercase();
            if !actual.contains(expected) {
                errors.push(format!(
                    "Table '{}', column '{}': type mismatch (expected {}, got {})",
                    table_name, col.name, expected, actual
                ));
            }
        }

        let source_pk = source.primary_key_set();
        let target_pk = target.primary_key_set();
        if source_pk != target_pk {
            errors.push(format!(
                "Table '{}': primary key mismatch (source={}, target={})",
                table_name,
                format_key_set(&source_pk),
                format_key_set(&target_pk)
            ));
        }

        ValidationResult::from_errors(errors)
    }
}

fn format_key_set(keys: &BTreeSet<&str>) -> String {
    format!("[{}]", keys.iter().copied().collect::<Vec<_>>().join(", "))
}
