//! Schema-only operations: render target DDL from a source, or run a DDL
//! script against a target.

use tracing::info;

use crate::core::SchemaIntrospector;
use crate::ddl::build_schema_script;
use crate::drivers::{PostgresWriter, SqliteReader, SslMode};
use crate::error::{MigrateError, Result};
use crate::typemap::TypeMapper;

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaService {
    mapper: TypeMapper,
}

impl SchemaService {
    pub fn new() -> Self {
        Self::default()
    }

    /// `CREATE TABLE IF NOT EXISTS` statements for every table of a SQLite
    /// database, in listing order.
    pub async fn generate_schema(&self, source_location: &str) -> Result<String> {
        if source_location.trim().is_empty() {
            return Err(MigrateError::InvalidRequest(
                "source_location is required".into(),
            ));
        }
        let source = SqliteReader::connect(source_location).await?;
        let script = self.generate_from(&source).await;
        source.close().await;
        script
    }

    /// Render DDL for every table an introspector lists.
    pub async fn generate_from(&self, source: &dyn SchemaIntrospector) -> Result<String> {
        let mut schemas = Vec::new();
        for table in source.list_tables().await? {
            schemas.push(source.table_schema(&table).await?);
        }
        info!("Generated DDL for {} tables", schemas.len());
        Ok(build_schema_script(&schemas, &self.mapper))
    }

    /// Execute a DDL script against the target in a single transaction.
    pub async fn apply_schema(
        &self,
        target_location: &str,
        sql: &str,
        ssl_mode: SslMode,
    ) -> Result<()> {
        if sql.trim().is_empty() {
            return Err(MigrateError::InvalidRequest("schema script is empty".into()));
        }
        let target = PostgresWriter::connect(target_location, ssl_mode).await?;
        let applied = target.execute_script(sql).await;
        target.close().await;
        applied?;
        info!("Applied schema script ({} bytes)", sql.len());
        Ok(())
    }
}
