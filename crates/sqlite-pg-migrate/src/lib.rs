//! # sqlite-pg-migrate
//!
//! SQLite to PostgreSQL migration library.
//!
//! Copies every table of a SQLite database into a PostgreSQL database as a
//! background job with:
//!
//! - **Type mapping** from SQLite declared types to PostgreSQL types
//! - **Schema validation** against target tables that already exist
//! - **Batched transfers** using PostgreSQL COPY, one transaction per batch
//! - **Progress tracking** through an in-memory job registry
//! - **Cooperative cancellation** between batches
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, MigrationService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let service = MigrationService::new();
//!     let started = service.start_job(config.to_request()).await?;
//!     println!("Started job {}", started.job_id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod ddl;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod service;
pub mod state;
pub mod transfer;
pub mod typemap;
pub mod validate;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, MigrationRequest, SourceConfig, TargetConfig};
pub use crate::core::{Column, TableSchema};
pub use drivers::{PostgresWriter, SqliteReader, SslMode};
pub use error::{MigrateError, Result};
pub use orchestrator::{MigrationOutcome, Orchestrator};
pub use service::{JobErrors, JobStatusView, MigrationService, SchemaService, StartJobResponse};
pub use state::{JobRecord, JobRegistry, JobStatus};
pub use transfer::{TransferConfig, TransferEngine, TransferStats};
pub use typemap::TypeMapper;
pub use validate::{SchemaValidator, ValidationResult};
