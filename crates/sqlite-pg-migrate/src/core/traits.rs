//! Core traits for the migration engine.
//!
//! - [`SchemaIntrospector`]: table listing and column metadata, both endpoints
//! - [`SourceReader`]: row counting and batched row streaming
//! - [`TargetWriter`]: table creation and batch writes
//!
//! The orchestrator and transfer pipeline only see these traits, so they can
//! be exercised against in-memory implementations in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

use super::schema::TableSchema;
use super::value::Batch;

/// Read table metadata from a database endpoint.
///
/// Every call acquires and releases its own connection; nothing is held
/// between calls.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// List tables in catalog order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Read a table's columns in declaration order.
    ///
    /// Returns an empty schema for a table that does not exist.
    async fn table_schema(&self, table: &str) -> Result<TableSchema>;

    /// Get the database type identifier (e.g., "sqlite", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Read data from the source database.
#[async_trait]
pub trait SourceReader: SchemaIntrospector {
    /// Full `COUNT(*)` of a table.
    async fn count_rows(&self, table: &str) -> Result<i64>;

    /// Stream a table's rows in batches of at most `batch_size`.
    ///
    /// The stream is lazy: nothing is read until it is polled, and each batch
    /// is fetched only when the previous one has been consumed. Rows are
    /// positionally aligned with `schema.columns`. An empty table yields no
    /// batches at all, and no yielded batch is ever empty. Opening a new
    /// stream re-executes the scan from the start.
    fn stream_rows<'a>(
        &'a self,
        schema: &'a TableSchema,
        batch_size: usize,
    ) -> BoxStream<'a, Result<Batch>>;
}

/// Write schema and data to the target database.
#[async_trait]
pub trait TargetWriter: SchemaIntrospector {
    /// Create a table from source metadata if it does not already exist.
    async fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Write one batch atomically using the given column list and order.
    ///
    /// Either every row lands or none does. Returns the number of rows written.
    async fn write_batch(&self, table: &str, cols: &[String], batch: Batch) -> Result<u64>;
}
