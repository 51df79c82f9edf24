//! DDL synthesis for target tables.
//!
//! Generated statements use `CREATE TABLE IF NOT EXISTS` so they can be
//! re-run against a target that already has the table. Identifiers are always
//! double-quoted.

use crate::core::TableSchema;
use crate::typemap::TypeMapper;

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build the `CREATE TABLE IF NOT EXISTS` statement for a source table.
///
/// Columns keep source declaration order. The `PRIMARY KEY` clause is only
/// emitted when at least one column is a key member.
pub fn build_create_table(name: &str, schema: &TableSchema, mapper: &TypeMapper) -> String {
    let mut lines: Vec<String> = schema
        .columns
        .iter()
        .map(|col| format!("  {} {}", quote_ident(&col.name), mapper.map(&col.declared_type)))
        .collect();

    let pk_cols: Vec<String> = schema.primary_key().into_iter().map(quote_ident).collect();
    if !pk_cols.is_empty() {
        lines.push(format!("  PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        quote_ident(name),
        lines.join(",\n")
    )
}

/// Build DDL for several tables as one script, in the given order.
pub fn build_schema_script(schemas: &[TableSchema], mapper: &TypeMapper) -> String {
    schemas
        .iter()
        .map(|s| build_create_table(&s.name, s, mapper))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Column;

    #[test]
    fn test_create_table_with_primary_key() {
        let schema = TableSchema::new(
            "t",
            vec![
                Column::new("id", "INTEGER").primary_key(),
                Column::new("name", "TEXT"),
            ],
        );
        let ddl = build_create_table("t", &schema, &TypeMapper::new());
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"t\" (\n  \"id\" BIGINT,\n  \"name\" TEXT,\n  PRIMARY KEY (\"id\")\n);"
        );
    }

    #[test]
    fn test_column_lines_carry_only_name_and_type() {
        let schema = TableSchema::new(
            "t",
            vec![
                Column::new("id", "INTEGER").primary_key(),
                Column::new("name", "TEXT").not_null(),
            ],
        );
        let ddl = build_create_table("t", &schema, &TypeMapper::new());
        assert!(ddl.contains("  \"name\" TEXT,\n"));
        assert!(!ddl.contains("NOT NULL"));
    }

    #[test]
    fn test_create_table_without_primary_key_omits_clause() {
        let schema = TableSchema::new(
            "events",
            vec![Column::new("at", "DATETIME"), Column::new("payload", "BLOB")],
        );
        let ddl = build_create_table("events", &schema, &TypeMapper::new());
        assert!(!ddl.contains("PRIMARY KEY"));
        assert!(ddl.contains("\"at\" TIMESTAMP"));
        assert!(ddl.contains("\"payload\" TEXT"));
        assert!(ddl.ends_with("\n);"));
    }

    #[test]
    fn test_composite_key_in_declaration_order() {
        let schema = TableSchema::new(
            "m",
            vec![
                Column::new("b", "INT").primary_key(),
                Column::new("a", "INT").primary_key(),
            ],
        );
        let ddl = build_create_table("m", &schema, &TypeMapper::new());
        assert!(ddl.contains("PRIMARY KEY (\"b\", \"a\")"));
    }

    #[test]
    fn test_identifiers_are_quoted_and_escaped() {
        let schema = TableSchema::new("Order", vec![Column::new("sel\"ect", "TEXT")]);
        let ddl = build_create_table("Order", &schema, &TypeMapper::new());
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"Order\" ("));
        assert!(ddl.contains("\"sel\"\"ect\" TEXT"));
    }

    #[test]
    fn test_schema_script_keeps_table_order() {
        let a = TableSchema::new("a", vec![Column::new("x", "INT")]);
        let b = TableSchema::new("b", vec![Column::new("y", "REAL")]);
        let script = build_schema_script(&[b, a], &TypeMapper::new());
        let pos_b = script.find("\"b\"").unwrap();
        let pos_a = script.find("\"a\"").unwrap();
        assert!(pos_b < pos_a);
        assert_eq!(script.matches("CREATE TABLE IF NOT EXISTS").count(), 2);
    }
}
