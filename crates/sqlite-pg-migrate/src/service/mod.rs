//! Job-level operations exposed to front ends.
//!
//! - [`MigrationService`]: start, status, errors and cancel for migration jobs
//! - [`SchemaService`]: DDL generation and application without moving data

mod schema;

pub use schema::SchemaService;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::MigrationRequest;
use crate::error::{MigrateError, Result};
use crate::orchestrator::Orchestrator;
use crate::state::{JobRecord, JobRegistry, JobStatus};

/// Reply to a job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Status projection of a job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub processed_rows: i64,
    pub total_rows: Option<i64>,
    /// Most recent error, if any.
    pub error: Option<String>,
}

impl From<&JobRecord> for JobStatusView {
    fn from(job: &JobRecord) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            processed_rows: job.processed_rows,
            total_rows: job.total_rows,
            error: job.last_error().map(str::to_string),
        }
    }
}

/// Full error list of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobErrors {
    pub job_id: String,
    pub errors: Vec<String>,
}

/// Runs migration jobs in background tasks and answers queries about them.
#[derive(Debug, Clone, Default)]
pub struct MigrationService {
    registry: JobRegistry,
}

impl MigrationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: JobRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Record a job as `Running` and start it in a background task.
    ///
    /// Returns as soon as the job is recorded. Endpoint problems are only
    /// discovered by the worker and show up as a `Failed` job.
    pub async fn start_job(&self, request: MigrationRequest) -> Result<StartJobResponse> {
        validate_request(&request)?;

        let mut job = JobRecord::new();
        job.mark_running()?;
        let job_id = job.id.clone();
        self.registry.create(job).await?;
        info!("Job {} submitted: {:?}", job_id, request);

        let orchestrator = Orchestrator::new(self.registry.clone());
        let worker_id = job_id.clone();
        tokio::spawn(async move {
            orchestrator.run(&worker_id, &request).await;
        });

        Ok(StartJobResponse {
            job_id,
            status: JobStatus::Running,
            message: "Migration job started successfully".to_string(),
        })
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobStatusView> {
        let job = self.registry.get(job_id).await?;
        Ok(JobStatusView::from(&job))
    }

    pub async fn get_errors(&self, job_id: &str) -> Result<JobErrors> {
        let job = self.registry.get(job_id).await?;
        Ok(JobErrors {
            job_id: job.id,
            errors: job.errors,
        })
    }

    /// Request cancellation; the worker stops before its next batch write.
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobStatusView> {
        let job = self.registry.cancel(job_id).await?;
        info!("Job {} cancellation requested", job_id);
        Ok(JobStatusView::from(&job))
    }
}

fn validate_request(request: &MigrationRequest) -> Result<()> {
    if request.batch_size <= 0 {
        return Err(MigrateError::InvalidRequest(format!(
            "batch_size must be positive, got {}",
            request.batch_size
        )));
    }
    if request.source_location.trim().is_empty() {
        return Err(MigrateError::InvalidRequest(
            "source_location is required".into(),
        ));
    }
    if request.target_location.trim().is_empty() {
        return Err(MigrateError::InvalidRequest(
            "target_location is required".into(),
        ));
    }
    Ok(())
}
