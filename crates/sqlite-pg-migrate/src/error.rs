//! Error types for the migration library.

use thiserror::Error;

use crate::state::JobStatus;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad job submission parameters, rejected before a job exists.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown job id.
    #[error("Job {0} not found")]
    NotFound(String),

    /// Operation not allowed in the job's current status.
    #[error("Job {job_id} is {status}")]
    InvalidState { job_id: String, status: JobStatus },

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message} (while {context})")]
    Pool { message: String, context: String },

    /// Pre-existing target table does not match the source table.
    #[error("{}", .errors.join("; "))]
    SchemaIncompatible { table: String, errors: Vec<String> },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::InvalidRequest(_) => 2,
            MigrateError::NotFound(_) | MigrateError::InvalidState { .. } => 3,
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => 4,
            MigrateError::SchemaIncompatible { .. } | MigrateError::Transfer { .. } => 5,
            MigrateError::Io(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
