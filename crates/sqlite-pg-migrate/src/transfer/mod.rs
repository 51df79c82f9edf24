//! Row transfer pipeline.
//!
//! Moves one table from a [`SourceReader`] to a [`TargetWriter`] in batches.
//! The pipeline is sequential: a batch is read and fully written before the
//! next one is read. Cancellation is polled before each write and stops the
//! table cleanly, without writing the batch in hand.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{debug, info};

use crate::core::{SourceReader, TableSchema, TargetWriter};
use crate::error::Result;

/// Default rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Transfer engine configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Number of rows per batch.
    pub batch_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Statistics from transferring one table.
#[derive(Debug, Clone, Default)]
pub struct TransferStats {
    /// Rows written to the target.
    pub rows: i64,

    /// Batches written to the target.
    pub batches: usize,

    /// Time spent waiting on the source.
    pub read_time: Duration,

    /// Time spent writing.
    pub write_time: Duration,

    /// Stopped early because the job was cancelled.
    pub cancelled: bool,
}

/// Hooks the pipeline calls between batches.
#[async_trait]
pub trait TransferObserver: Send + Sync {
    /// Polled before every batch write.
    async fn is_cancelled(&self) -> Result<bool>;

    /// Called after a batch has been committed to the target.
    async fn batch_written(&self, rows: u64) -> Result<()>;
}

/// Transfer engine for moving one table between two endpoints.
pub struct TransferEngine<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    config: TransferConfig,
}

impl<'a> TransferEngine<'a> {
    pub fn new(
        source: &'a dyn SourceReader,
        target: &'a dyn TargetWriter,
        config: TransferConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Transfer every row of `schema`'s table.
    ///
    /// Read and write errors are returned as-is; batches already written stay
    /// written.
    pub async fn execute(
        &self,
        schema: &TableSchema,
        observer: &dyn TransferObserver,
    ) -> Result<TransferStats> {
        let table = schema.name.as_str();
        let columns = schema.column_names();
        info!(
            "Starting transfer for {} ({} columns, batch size {})",
            table,
            columns.len(),
            self.config.batch_size
        );

        let start = Instant::now();
        let mut stats = TransferStats::default();
        let mut stream = self.source.stream_rows(schema, self.config.batch_size);

        loop {
            let read_start = Instant::now();
            let Some(batch) = stream.try_next().await? else {
                break;
            };
            stats.read_time += read_start.elapsed();

            if observer.is_cancelled().await? {
                info!(
                    "{}: cancelled after {} rows, discarding batch of {}",
                    table,
                    stats.rows,
                    batch.len()
                );
                stats.cancelled = true;
                break;
            }

            let write_start = Instant::now();
            let written = self.target.write_batch(table, &columns, batch).await?;
            stats.write_time += write_start.elapsed();
            stats.rows += written as i64;
            stats.batches += 1;
            debug!("{}: batch {} wrote {} rows", table, stats.batches, written);

            observer.batch_written(written).await?;
        }

        let elapsed = start.elapsed();
        let rows_per_sec = if elapsed.as_secs_f64() > 0.0 {
            (stats.rows as f64 / elapsed.as_secs_f64()) as i64
        } else {
            0
        };
        info!(
            "{}: transferred {} rows in {:?} ({} rows/sec, read: {:?}, write: {:?})",
            table, stats.rows, elapsed, rows_per_sec, stats.read_time, stats.write_time
        );

        Ok(stats)
    }
}
