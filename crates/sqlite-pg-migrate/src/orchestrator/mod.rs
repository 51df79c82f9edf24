//! Migration orchestrator - per-job workflow coordinator.
//!
//! Drives one job from `Running` to a terminal status: counts source rows,
//! then for each table creates or validates the target table and runs the
//! transfer pipeline, publishing every change to the [`JobRegistry`].

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::MigrationRequest;
use crate::core::{SchemaIntrospector, SourceReader, TargetWriter};
use crate::drivers::{PostgresWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::state::{JobRegistry, JobStatus};
use crate::transfer::{TransferConfig, TransferEngine, TransferObserver};
use crate::typemap::TypeMapper;
use crate::validate::SchemaValidator;

/// Summary of one migration pass, before it is folded into the job record.
#[derive(Debug, Clone, Default)]
pub struct MigrationOutcome {
    /// Tables fully transferred.
    pub tables_completed: usize,

    /// Rows written across all tables.
    pub rows_transferred: i64,

    /// Stopped because the job was cancelled.
    pub cancelled: bool,
}

/// Migration orchestrator.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: JobRegistry,
    validator: SchemaValidator,
}

impl Orchestrator {
    pub fn new(registry: JobRegistry) -> Self {
        Self {
            registry,
            validator: SchemaValidator::new(TypeMapper::new()),
        }
    }

    /// Connect to both endpoints and run the job to a terminal status.
    ///
    /// Never returns an error: every failure, including an unreachable
    /// endpoint, is recorded on the job.
    pub async fn run(&self, job_id: &str, request: &MigrationRequest) -> JobStatus {
        info!("Job {}: connecting to endpoints", job_id);

        let source = match SqliteReader::connect(&request.source_location).await {
            Ok(source) => source,
            Err(e) => return self.finish(job_id, Err(e)).await,
        };
        let target = match PostgresWriter::connect(&request.target_location, request.ssl_mode).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return self.finish(job_id, Err(e)).await;
            }
        };

        let batch_size = usize::try_from(request.batch_size).unwrap_or(1).max(1);
        let status = self.execute(job_id, &source, &target, batch_size).await;

        source.close().await;
        target.close().await;
        status
    }

    /// Run the job against already-connected endpoints and finalize it.
    pub async fn execute(
        &self,
        job_id: &str,
        source: &dyn SourceReader,
        target: &dyn TargetWriter,
        batch_size: usize,
    ) -> JobStatus {
        let result = self.migrate(job_id, source, target, batch_size).await;
        self.finish(job_id, result).await
    }

    async fn migrate(
        &self,
        job_id: &str,
        source: &dyn SourceReader,
        target: &dyn TargetWriter,
        batch_size: usize,
    ) -> Result<MigrationOutcome> {
        let started = Instant::now();
        let mut outcome = MigrationOutcome::default();

        let status = self
            .registry
            .modify(job_id, |job| {
                if job.status == JobStatus::Pending {
                    job.mark_running()?;
                }
                Ok(job.status)
            })
            .await?;
        if status != JobStatus::Running {
            info!("Job {} is {}, not starting", job_id, status);
            outcome.cancelled = true;
            return Ok(outcome);
        }

        info!("Job {}: Phase 1: counting source rows", job_id);
        let tables = source.list_tables().await?;
        let mut total_rows = 0i64;
        for table in &tables {
            total_rows += source.count_rows(table).await?;
        }
        self.registry
            .modify(job_id, |job| {
                job.set_total_rows(total_rows);
                Ok(())
            })
            .await?;
        info!(
            "Job {}: found {} tables, {} rows",
            job_id,
            tables.len(),
            total_rows
        );

        info!("Job {}: Phase 2: transferring data", job_id);
        let progress = JobProgress {
            registry: &self.registry,
            job_id,
        };
        let engine = TransferEngine::new(source, target, TransferConfig { batch_size });

        for table in &tables {
            if progress.is_cancelled().await? {
                outcome.cancelled = true;
                break;
            }

            let source_schema = source.table_schema(table).await?;
            if target.table_exists(table).await? {
                let target_schema = target.table_schema(table).await?;
                let result = self.validator.validate(&source_schema, &target_schema, table);
                if !result.valid {
                    return Err(MigrateError::SchemaIncompatible {
                        table: table.clone(),
                        errors: result.errors,
                    });
                }
                info!("{}: target table exists and is compatible", table);
            } else {
                target.create_table(&source_schema).await?;
            }

            let stats = engine.execute(&source_schema, &progress).await?;
            outcome.rows_transferred += stats.rows;
            if stats.cancelled {
                outcome.cancelled = true;
                break;
            }
            outcome.tables_completed += 1;
            info!("{}: completed ({} rows)", table, stats.rows);
        }

        info!(
            "Job {}: {} tables, {} rows in {:?}{}",
            job_id,
            outcome.tables_completed,
            outcome.rows_transferred,
            started.elapsed(),
            if outcome.cancelled { " (cancelled)" } else { "" }
        );
        Ok(outcome)
    }

    /// Fold a migration result into the job's terminal status.
    async fn finish(&self, job_id: &str, result: Result<MigrationOutcome>) -> JobStatus {
        let applied = match result {
            Ok(outcome) if outcome.cancelled => Ok(()),
            Ok(_) => self.registry.modify(job_id, |job| job.mark_completed()).await,
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);
                let message = e.to_string();
                self.registry
                    .modify(job_id, |job| job.mark_failed(message))
                    .await
            }
        };

        if let Err(e) = applied {
            // a cancel landed between the last batch and finalization
            warn!("Job {}: final status not recorded: {}", job_id, e);
        }

        match self.registry.status(job_id).await {
            Ok(status) => {
                info!("Job {} finished: {}", job_id, status);
                status
            }
            Err(e) => {
                warn!("Job {} vanished from registry: {}", job_id, e);
                JobStatus::Failed
            }
        }
    }
}

/// Publishes transfer progress to the registry and reads cancellation from it.
struct JobProgress<'a> {
    registry: &'a JobRegistry,
    job_id: &'a str,
}

#[async_trait]
impl TransferObserver for JobProgress<'_> {
    async fn is_cancelled(&self) -> Result<bool> {
        Ok(self.registry.status(self.job_id).await? != JobStatus::Running)
    }

    async fn batch_written(&self, rows: u64) -> Result<()> {
        self.registry
            .modify(self.job_id, |job| {
                job.record_batch(rows);
                Ok(())
            })
            .await
    }
}
