//! sqlite-pg-migrate CLI - SQLite to PostgreSQL migration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{
    Config, JobStatus, JobStatusView, MigrateError, MigrationRequest, MigrationService,
    SchemaService, SslMode,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit code for a job that ended `Failed`.
const EXIT_JOB_FAILED: u8 = 5;

/// Exit code for a job that ended `Cancelled`.
const EXIT_JOB_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Migrate a SQLite database into PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Seconds to wait for a cancelled job to stop after SIGINT/SIGTERM
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a migration job and wait for it to finish
    Run {
        /// SQLite database file (overrides source.path)
        #[arg(long)]
        source: Option<String>,

        /// PostgreSQL connection string (overrides the target section)
        #[arg(long)]
        target: Option<String>,

        /// Rows per batch (overrides migration.batch_size)
        #[arg(long)]
        batch_size: Option<i64>,

        /// TLS mode for the target: disable, require, verify-ca, verify-full
        #[arg(long)]
        ssl_mode: Option<String>,

        /// Status polling interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Print CREATE TABLE statements for every source table
    GenerateSchema {
        /// SQLite database file (overrides source.path)
        #[arg(long)]
        source: Option<String>,

        /// Write the script to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Execute a DDL script against the target in one transaction
    ApplySchema {
        /// PostgreSQL connection string (overrides the target section)
        #[arg(long)]
        target: Option<String>,

        /// Script to execute
        #[arg(short, long)]
        file: PathBuf,

        /// TLS mode for the target: disable, require, verify-ca, verify-full
        #[arg(long)]
        ssl_mode: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            Some(config)
        }
        None => None,
    };

    match cli.command {
        Commands::Run {
            source,
            target,
            batch_size,
            ssl_mode,
            poll_interval_ms,
        } => {
            let mut request = resolve_request(config.as_ref(), source, target)?;
            if let Some(size) = batch_size {
                request.batch_size = size;
            }
            if let Some(mode) = ssl_mode {
                request.ssl_mode = SslMode::parse(&mode)?;
            }
            let poll = poll_interval_ms
                .or(config.as_ref().map(|c| c.migration.poll_interval_ms))
                .unwrap_or(500)
                .max(1);

            let cancel_token = setup_signal_handler()?;
            let service = MigrationService::new();
            let view = run_job(
                &service,
                request,
                Duration::from_millis(poll),
                cancel_token,
                Duration::from_secs(cli.shutdown_timeout),
            )
            .await?;
            let errors = service.get_errors(&view.job_id).await?.errors;

            if cli.output_json {
                let out = serde_json::json!({ "job": view, "errors": errors });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_summary(&view, &errors);
            }

            Ok(match view.status {
                JobStatus::Completed => ExitCode::SUCCESS,
                JobStatus::Cancelled => ExitCode::from(EXIT_JOB_CANCELLED),
                _ => ExitCode::from(EXIT_JOB_FAILED),
            })
        }

        Commands::GenerateSchema { source, output } => {
            let source = source
                .or(config.as_ref().map(|c| c.source.path.clone()))
                .ok_or_else(|| MigrateError::Config("--source or a config file is required".into()))?;
            let script = SchemaService::new().generate_schema(&source).await?;

            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{}\n", script))?;
                    info!("Wrote schema to {:?}", path);
                }
                None => println!("{}", script),
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::ApplySchema {
            target,
            file,
            ssl_mode,
        } => {
            let (location, config_mode) = resolve_target(config.as_ref(), target)?;
            let ssl_mode = match ssl_mode {
                Some(mode) => SslMode::parse(&mode)?,
                None => config_mode,
            };
            let sql = std::fs::read_to_string(&file)?;
            SchemaService::new()
                .apply_schema(&location, &sql, ssl_mode)
                .await?;
            println!("Schema applied from {}", file.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Merge command-line endpoints over the config file.
fn resolve_request(
    config: Option<&Config>,
    source: Option<String>,
    target: Option<String>,
) -> Result<MigrationRequest, MigrateError> {
    let mut request = match config {
        Some(config) => config.to_request(),
        None => MigrationRequest::new(String::new(), String::new()),
    };
    if let Some(source) = source {
        request.source_location = source;
    }
    if let Some(target) = target {
        request.target_location = target;
        if config.is_none() {
            request.ssl_mode = SslMode::Disable;
        }
    }
    if request.source_location.is_empty() || request.target_location.is_empty() {
        return Err(MigrateError::Config(
            "source and target are required: pass --source/--target or --config".into(),
        ));
    }
    Ok(request)
}

/// Target location and TLS mode for `apply-schema`. A loaded config always
/// supplies the TLS mode, even when `--target` replaces its location.
fn resolve_target(
    config: Option<&Config>,
    target: Option<String>,
) -> Result<(String, SslMode), MigrateError> {
    match (target, config) {
        (Some(t), Some(c)) => Ok((t, c.target.ssl_mode)),
        (Some(t), None) => Ok((t, SslMode::Disable)),
        (None, Some(c)) => Ok((c.target.connection_string(), c.target.ssl_mode)),
        (None, None) => Err(MigrateError::Config(
            "--target or a config file is required".into(),
        )),
    }
}

/// Start a job and poll it until it reaches a terminal status.
///
/// The first signal cancels the job; the job then has `shutdown_timeout` to
/// stop at its next batch boundary.
async fn run_job(
    service: &MigrationService,
    request: MigrationRequest,
    poll: Duration,
    cancel_token: CancellationToken,
    shutdown_timeout: Duration,
) -> Result<JobStatusView, MigrateError> {
    let started = service.start_job(request).await?;
    let job_id = started.job_id;
    info!("Started job {}", job_id);

    let mut last_rows = -1;
    let mut deadline: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled(), if deadline.is_none() => {
                deadline = Some(tokio::time::Instant::now() + shutdown_timeout);
                match service.cancel_job(&job_id).await {
                    Ok(_) => info!("Cancellation requested for job {}", job_id),
                    Err(e) => warn!("Could not cancel job {}: {}", job_id, e),
                }
            }
            _ = tokio::time::sleep(poll) => {}
        }

        let view = service.get_status(&job_id).await?;
        if view.processed_rows != last_rows {
            last_rows = view.processed_rows;
            match (view.progress, view.total_rows) {
                (Some(pct), Some(total)) => info!(
                    "Job {}: {}/{} rows ({:.2}%)",
                    job_id, view.processed_rows, total, pct
                ),
                _ => info!("Job {}: {} rows", job_id, view.processed_rows),
            }
        }
        if view.status.is_terminal() {
            return Ok(view);
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            return Err(MigrateError::transfer(
                "*",
                format!("job {} did not stop within the shutdown timeout", job_id),
            ));
        }
    }
}

fn print_summary(view: &JobStatusView, errors: &[String]) {
    let headline = match view.status {
        JobStatus::Completed => "Migration completed!",
        JobStatus::Cancelled => "Migration cancelled.",
        _ => "Migration failed.",
    };
    println!("\n{}", headline);
    println!("  Job ID: {}", view.job_id);
    println!("  Status: {}", view.status);
    match view.total_rows {
        Some(total) => println!("  Rows: {}/{}", view.processed_rows, total),
        None => println!("  Rows: {}", view.processed_rows),
    }
    if let Some(pct) = view.progress {
        println!("  Progress: {:.2}%", pct);
    }
    for err in errors {
        println!("  Error: {}", err);
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout is reserved for results (DDL, JSON)
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => eprintln!("\nReceived SIGINT. Cancelling job..."),
            _ = sigterm.recv() => eprintln!("\nReceived SIGTERM. Cancelling job..."),
        }
        token.cancel();
    });

    Ok(cancel_token)
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling job...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "source: {path: a.db}\n\
                          target: {host: h, database: d, user: u, ssl_mode: verify-full}\n";

    #[test]
    fn test_target_override_keeps_config_ssl_mode() {
        let config = Config::from_yaml(CONFIG).unwrap();

        let (location, mode) =
            resolve_target(Some(&config), Some("host=other dbname=x".into())).unwrap();
        assert_eq!(location, "host=other dbname=x");
        assert_eq!(mode, SslMode::VerifyFull);

        let request = resolve_request(Some(&config), None, Some("host=other".into())).unwrap();
        assert_eq!(request.ssl_mode, mode);
    }

    #[test]
    fn test_target_without_config_disables_tls() {
        let (_, mode) = resolve_target(None, Some("host=h".into())).unwrap();
        assert_eq!(mode, SslMode::Disable);
        assert!(matches!(
            resolve_target(None, None),
            Err(MigrateError::Config(_))
        ));
    }

    #[test]
    fn test_config_target_used_when_no_flag() {
        let config = Config::from_yaml(CONFIG).unwrap();
        let (location, _) = resolve_target(Some(&config), None).unwrap();
        assert_eq!(location, config.target.connection_string());
    }
}
