//! SQL value types for row transfer.
//!
//! SQLite has five storage classes, so a source value is always one of the
//! variants below regardless of the column's declared type. The target
//! coerces them into the mapped PostgreSQL type on write.

/// A single column value read from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// 64-bit signed integer (SQLite INTEGER storage class).
    I64(i64),

    /// 64-bit floating point (SQLite REAL storage class).
    F64(f64),

    /// Text data (SQLite TEXT storage class).
    Text(String),

    /// Binary data (SQLite BLOB storage class).
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row, positionally aligned with its table's column order.
pub type Row = Vec<SqlValue>;

/// A bounded, ordered group of rows read and written together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Rows in scan order.
    pub rows: Vec<Row>,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_conversion() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
        assert!(SqlValue::from(None::<String>).is_null());
    }

    #[test]
    fn test_batch_len() {
        let batch = Batch::new(vec![vec![1i64.into()], vec![2i64.into()]]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(Batch::default().is_empty());
    }
}
