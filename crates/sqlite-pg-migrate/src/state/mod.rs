//! Job records, the job state machine and the in-memory job registry.
//!
//! Records live only in process memory; nothing here survives a restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::error::{MigrateError, Result};

/// Lifecycle status of a migration job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of one migration job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,

    /// Sum of source row counts; `None` until the counting pass finishes.
    pub total_rows: Option<i64>,

    pub processed_rows: i64,

    /// Percentage with two decimals; `None` while `total_rows` is unknown.
    pub progress: Option<f64>,

    /// Append-only.
    pub errors: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a pending record with a fresh id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            total_rows: None,
            processed_rows: 0,
            progress: None,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Most recent error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.errors.last().map(String::as_str)
    }

    fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(MigrateError::InvalidState {
                job_id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(JobStatus::Running)
    }

    pub fn mark_completed(&mut self) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.total_rows.get_or_insert(self.processed_rows);
        self.progress = Some(100.0);
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.errors.push(message.into());
        Ok(())
    }

    /// Request cancellation. Only a running job can be cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(JobStatus::Cancelled)
    }

    /// Publish the result of the row counting pass.
    pub fn set_total_rows(&mut self, total: i64) {
        self.total_rows = Some(total.max(self.processed_rows));
        self.recompute_progress();
    }

    /// Account for one written batch.
    ///
    /// If the source grew after it was counted, `total_rows` is raised so
    /// `processed_rows` never exceeds it.
    pub fn record_batch(&mut self, rows: u64) {
        self.processed_rows += rows as i64;
        if let Some(total) = self.total_rows {
            if self.processed_rows > total {
                warn!(
                    "Job {}: processed {} rows but counted {}, raising total",
                    self.id, self.processed_rows, total
                );
                self.total_rows = Some(self.processed_rows);
            }
        }
        self.recompute_progress();
    }

    fn recompute_progress(&mut self) {
        self.progress = match self.total_rows {
            None => None,
            Some(0) => Some(0.0),
            Some(total) => {
                let pct = self.processed_rows as f64 / total as f64 * 100.0;
                Some((pct * 100.0).round() / 100.0)
            }
        };
    }
}

impl Default for JobRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Concurrency-safe store of job records keyed by id.
///
/// Every operation takes the map lock for its whole duration, so readers
/// always see a complete snapshot and writers never interleave.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new record. Ids are never reused.
    pub async fn create(&self, record: JobRecord) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.id) {
            return Err(MigrateError::InvalidRequest(format!(
                "job id {} already exists",
                record.id
            )));
        }
        jobs.insert(record.id.clone(), record);
        Ok(())
    }

    /// Snapshot of a record.
    pub async fn get(&self, id: &str) -> Result<JobRecord> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| MigrateError::NotFound(id.to_string()))
    }

    pub async fn status(&self, id: &str) -> Result<JobStatus> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|job| job.status)
            .ok_or_else(|| MigrateError::NotFound(id.to_string()))
    }

    /// Replace the stored snapshot.
    ///
    /// Rejected if the change in status is not an edge of the state machine.
    pub async fn update(&self, mut record: JobRecord) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(&record.id)
            .ok_or_else(|| MigrateError::NotFound(record.id.clone()))?;
        if stored.status != record.status && !stored.status.can_transition_to(record.status) {
            return Err(MigrateError::InvalidState {
                job_id: record.id,
                status: stored.status,
            });
        }
        record.updated_at = Utc::now();
        *stored = record;
        Ok(())
    }

    /// Apply `f` to a record as one atomic read-modify-write.
    ///
    /// The change is committed, with a fresh `updated_at`, only if `f`
    /// succeeds.
    pub async fn modify<T, F>(&self, id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut JobRecord) -> Result<T>,
    {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(id)
            .ok_or_else(|| MigrateError::NotFound(id.to_string()))?;
        let mut next = stored.clone();
        let out = f(&mut next)?;
        next.updated_at = Utc::now();
        *stored = next;
        Ok(out)
    }

    pub async fn cancel(&self, id: &str) -> Result<JobRecord> {
        self.modify(id, |job| {
            job.cancel()?;
            Ok(job.clone())
        })
        .await
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
