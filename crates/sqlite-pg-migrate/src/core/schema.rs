//! Schema metadata types for tables and columns.
//!
//! These types are produced by introspection of either endpoint and are
//! immutable once read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared type as reported by the engine (e.g. "INTEGER", "bigint").
    pub declared_type: String,

    /// Whether the column is declared NOT NULL.
    pub not_null: bool,

    /// Default value expression, if any.
    pub default: Option<String>,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
}

impl Column {
    /// Create a nullable, non-key column with no default.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            not_null: false,
            default: None,
            is_primary_key: false,
        }
    }

    /// Mark the column as a primary key member.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Mark the column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Ordered column list for one table.
///
/// Column order is the engine's declaration order and drives the positional
/// layout of every row in a [`Batch`](super::Batch). It is never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Primary key column names in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Primary key column names as an unordered set.
    pub fn primary_key_set(&self) -> BTreeSet<&str> {
        self.primary_key().into_iter().collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSchema {
        TableSchema::new(
            "users",
            vec![
                Column::new("tenant", "INTEGER").primary_key(),
                Column::new("name", "TEXT"),
                Column::new("id", "INTEGER").primary_key().not_null(),
            ],
        )
    }

    #[test]
    fn test_column_order_is_declaration_order() {
        assert_eq!(users().column_names(), vec!["tenant", "name", "id"]);
    }

    #[test]
    fn test_primary_key_views() {
        let schema = users();
        assert_eq!(schema.primary_key(), vec!["tenant", "id"]);
        let set: Vec<&str> = schema.primary_key_set().into_iter().collect();
        assert_eq!(set, vec!["id", "tenant"]);
    }

    #[test]
    fn test_column_lookup() {
        let schema = users();
        assert!(schema.column("id").unwrap().not_null);
        assert!(schema.column("missing").is_none());
    }
}
