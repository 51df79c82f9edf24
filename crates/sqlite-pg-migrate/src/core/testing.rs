//! In-memory source and target used by engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{MigrateError, Result};
use crate::state::JobRegistry;
use crate::typemap::TypeMapper;

use super::schema::{Column, TableSchema};
use super::traits::{SchemaIntrospector, SourceReader, TargetWriter};
use super::value::{Batch, Row};

#[derive(Default)]
pub(crate) struct MemorySource {
    tables: Vec<(TableSchema, Vec<Row>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, schema: TableSchema, rows: Vec<Row>) -> Self {
        self.tables.push((schema, rows));
        self
    }

    fn find(&self, table: &str) -> Option<&(TableSchema, Vec<Row>)> {
        self.tables.iter().find(|(s, _)| s.name == table)
    }
}

#[async_trait]
impl SchemaIntrospector for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|(s, _)| s.name.clone()).collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.find(table).is_some())
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        Ok(self
            .find(table)
            .map(|(s, _)| s.clone())
            .unwrap_or_else(|| TableSchema::new(table, Vec::new())))
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn count_rows(&self, table: &str) -> Result<i64> {
        Ok(self.find(table).map(|(_, r)| r.len() as i64).unwrap_or(0))
    }

    fn stream_rows<'a>(
        &'a self,
        schema: &'a TableSchema,
        batch_size: usize,
    ) -> BoxStream<'a, Result<Batch>> {
        let rows = self.find(&schema.name).map(|(_, r)| r.as_slice()).unwrap_or(&[]);
        stream::iter(rows.chunks(batch_size.max(1)))
            .map(|chunk| Ok(Batch::new(chunk.to_vec())))
            .boxed()
    }
}

/// Cancel `job_id` once this many batches have been written.
pub(crate) struct CancelAfter {
    pub registry: JobRegistry,
    pub job_id: String,
    pub batches: usize,
}

#[derive(Default)]
struct TargetState {
    schemas: Vec<TableSchema>,
    rows: HashMap<String, Vec<Row>>,
    created: Vec<String>,
    batches_written: usize,
}

#[derive(Default)]
pub(crate) struct MemoryTarget {
    state: Mutex<TargetState>,
    mapper: TypeMapper,
    fail_on_batch: Option<usize>,
    cancel_after: Option<CancelAfter>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a table, as if it already existed on the target.
    pub fn with_table(self, schema: TableSchema) -> Self {
        self.lock().schemas.push(schema);
        self
    }

    /// Make the n-th batch write (1-based) fail without storing any rows.
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    pub fn cancelling(mut self, cancel: CancelAfter) -> Self {
        self.cancel_after = Some(cancel);
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    pub fn created_tables(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl SchemaIntrospector for MemoryTarget {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.lock().schemas.iter().map(|s| s.name.clone()).collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.lock().schemas.iter().any(|s| s.name == table))
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        Ok(self
            .lock()
            .schemas
            .iter()
            .find(|s| s.name == table)
            .cloned()
            .unwrap_or_else(|| TableSchema::new(table, Vec::new())))
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let mut state = self.lock();
        if state.schemas.iter().any(|s| s.name == schema.name) {
            return Ok(());
        }
        let columns = schema
            .columns
            .iter()
            .map(|c| Column {
                declared_type: self.mapper.map(&c.declared_type).to_string(),
                ..c.clone()
            })
            .collect();
        state.schemas.push(TableSchema::new(schema.name.clone(), columns));
        state.created.push(schema.name.clone());
        Ok(())
    }

    async fn write_batch(&self, table: &str, cols: &[String], batch: Batch) -> Result<u64> {
        let rows = batch.len() as u64;
        let written = {
            let mut state = self.lock();
            let n = state.batches_written + 1;
            if self.fail_on_batch == Some(n) {
                return Err(MigrateError::transfer(table, "simulated write failure"));
            }
            let schema = state
                .schemas
                .iter()
                .find(|s| s.name == table)
                .cloned()
                .ok_or_else(|| MigrateError::transfer(table, "relation does not exist"))?;
            if schema.column_names() != cols {
                return Err(MigrateError::transfer(table, "column list mismatch"));
            }
            state.rows.entry(table.to_string()).or_default().extend(batch.rows);
            state.batches_written = n;
            n
        };

        if let Some(cancel) = &self.cancel_after {
            if written == cancel.batches {
                cancel.registry.cancel(&cancel.job_id).await?;
            }
        }
        Ok(rows)
    }
}
