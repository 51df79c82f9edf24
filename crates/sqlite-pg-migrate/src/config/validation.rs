//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.path.trim().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.port == 0 {
        return Err(MigrateError::Config("target.port must be non-zero".into()));
    }

    if let Some(0) = config.migration.batch_size {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.poll_interval_ms == 0 {
        return Err(MigrateError::Config(
            "migration.poll_interval_ms must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::Config;

    fn check(yaml: &str) -> String {
        Config::from_yaml(yaml).unwrap_err().to_string()
    }

    #[test]
    fn test_required_fields() {
        assert!(check("source: {path: ''}\ntarget: {host: h, database: d, user: u}")
            .contains("source.path is required"));
        assert!(check("source: {path: a.db}\ntarget: {host: '', database: d, user: u}")
            .contains("target.host is required"));
        assert!(check("source: {path: a.db}\ntarget: {host: h, database: d, user: ''}")
            .contains("target.user is required"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = check(
            "source: {path: a.db}\ntarget: {host: h, database: d, user: u}\nmigration: {batch_size: 0}",
        );
        assert!(err.contains("migration.batch_size must be at least 1"));
    }

    #[test]
    fn test_unknown_ssl_mode_rejected() {
        let err = check("source: {path: a.db}\ntarget: {host: h, database: d, user: u, ssl_mode: prefer}");
        assert!(err.starts_with("YAML error"));
    }
}
