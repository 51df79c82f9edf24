//! PostgreSQL target writer.
//!
//! Implements [`TargetWriter`] using deadpool-postgres. Each batch is loaded
//! with one text-format `COPY ... FROM STDIN` inside its own transaction, so a
//! batch either lands completely or not at all.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use futures::SinkExt;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::core::schema::{Column, TableSchema};
use crate::core::traits::{SchemaIntrospector, TargetWriter};
use crate::core::value::{Batch, Row, SqlValue};
use crate::ddl::{build_create_table, quote_ident};
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::error::{MigrateError, Result};
use crate::typemap::TypeMapper;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Target pool size; one job writes one batch at a time.
const MAX_CONNECTIONS: usize = 2;

const LIST_TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const TABLE_EXISTS_SQL: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM information_schema.tables
        WHERE table_schema = current_schema() AND table_name = $1
    )
"#;

const TABLE_COLUMNS_SQL: &str = r#"
    SELECT
        a.attname::text AS name,
        upper(format_type(a.atttypid, a.atttypmod)) AS declared_type,
        a.attnotnull AS not_null,
        pg_get_expr(d.adbin, d.adrelid) AS default_expr,
        EXISTS (
            SELECT 1 FROM pg_index i
            WHERE i.indrelid = c.oid AND i.indisprimary AND a.attnum = ANY(i.indkey)
        ) AS is_pk
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
    WHERE n.nspname = current_schema()
      AND c.relname = $1
      AND a.attnum > 0
      AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    mapper: TypeMapper,
}

impl PostgresWriter {
    /// Connect using a libpq-style URL or key=value connection string.
    pub async fn connect(location: &str, ssl_mode: SslMode) -> Result<Self> {
        let mut pg_config: PgConfig = location
            .parse()
            .map_err(|e| MigrateError::pool(e, "parsing PostgreSQL target location"))?;

        pg_config.ssl_mode(if ssl_mode.requires_tls() {
            tokio_postgres::config::SslMode::Require
        } else {
            tokio_postgres::config::SslMode::Disable
        });
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        if pg_config.get_connect_timeout().is_none() {
            pg_config.connect_timeout(CONNECT_TIMEOUT);
        }

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::new(ssl_mode).build()? {
            Some(tls) => Manager::from_config(pg_config.clone(), tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config.clone(), tokio_postgres::NoTls, mgr_config)
            }
        };
        let pool = Pool::builder(mgr)
            .max_size(MAX_CONNECTIONS)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let writer = Self {
            pool,
            mapper: TypeMapper::new(),
        };
        let client = writer.client("testing PostgreSQL target connection").await?;
        client.simple_query("SELECT 1").await?;
        drop(client);

        info!(
            "Connected to PostgreSQL target: {}/{}",
            describe_hosts(&pg_config),
            pg_config.get_dbname().unwrap_or("")
        );
        Ok(writer)
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, context))
    }

    /// Run a multi-statement script in one transaction.
    pub async fn execute_script(&self, sql: &str) -> Result<()> {
        let mut client = self.client("getting PostgreSQL connection").await?;
        let tx = client.transaction().await?;
        tx.batch_execute(sql).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn describe_hosts(config: &PgConfig) -> String {
    use tokio_postgres::config::Host;
    config
        .get_hosts()
        .iter()
        .map(|h| match h {
            Host::Tcp(name) => name.clone(),
            #[cfg(unix)]
            Host::Unix(path) => path.display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl SchemaIntrospector for PostgresWriter {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.client("getting PostgreSQL connection").await?;
        let rows = client.query(LIST_TABLES_SQL, &[]).await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let client = self.client("getting PostgreSQL connection").await?;
        let row = client.query_one(TABLE_EXISTS_SQL, &[&table]).await?;
        Ok(row.get::<_, bool>(0))
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let client = self.client("getting PostgreSQL connection").await?;
        let rows = client.query(TABLE_COLUMNS_SQL, &[&table]).await?;

        let columns = rows
            .iter()
            .map(|row| Column {
                name: row.get("name"),
                declared_type: row.get("declared_type"),
                not_null: row.get("not_null"),
                default: row.get("default_expr"),
                is_primary_key: row.get("is_pk"),
            })
            .collect();
        Ok(TableSchema::new(table, columns))
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let ddl = build_create_table(&schema.name, schema, &self.mapper);
        let client = self.client("getting PostgreSQL connection").await?;
        client.batch_execute(&ddl).await?;
        info!("Created table {}", quote_ident(&schema.name));
        Ok(())
    }

    async fn write_batch(&self, table: &str, cols: &[String], batch: Batch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        let row_count = batch.len() as u64;
        let copy_sql = build_copy_sql(table, cols);
        let data = encode_copy_text(&batch.rows);

        let mut client = self.client("getting PostgreSQL connection").await?;
        let tx = client.transaction().await?;

        let sink = tx
            .copy_in::<_, Bytes>(copy_sql.as_str())
            .await
            .map_err(|e| MigrateError::transfer(table, format!("COPY init: {}", e)))?;
        tokio::pin!(sink);
        sink.send(data.freeze())
            .await
            .map_err(|e| MigrateError::transfer(table, format!("COPY send: {}", e)))?;
        sink.as_mut()
            .finish()
            .await
            .map_err(|e| MigrateError::transfer(table, format!("COPY finish: {}", e)))?;

        tx.commit().await?;
        debug!("{}: copied {} rows", table, row_count);
        Ok(row_count)
    }
}

fn build_copy_sql(table: &str, cols: &[String]) -> String {
    let col_list: Vec<String> = cols.iter().map(|c| quote_ident(c)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
        quote_ident(table),
        col_list.join(", ")
    )
}

/// Encode rows in COPY text format: tab-separated, newline-terminated.
fn encode_copy_text(rows: &[Row]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(rows.len() * 64);
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                buf.put_u8(b'\t');
            }
            write_copy_value(&mut buf, value);
        }
        buf.put_u8(b'\n');
    }
    buf
}

fn write_copy_value(buf: &mut BytesMut, value: &SqlValue) {
    match value {
        SqlValue::Null => buf.put_slice(b"\\N"),
        SqlValue::I64(v) => buf.put_slice(v.to_string().as_bytes()),
        SqlValue::F64(v) if v.is_infinite() => {
            buf.put_slice(if *v > 0.0 { "Infinity" } else { "-Infinity" }.as_bytes())
        }
        SqlValue::F64(v) => buf.put_slice(v.to_string().as_bytes()),
        SqlValue::Text(s) => escape_copy_text(buf, s),
        // bytea hex input; the backslash itself needs COPY escaping
        SqlValue::Bytes(b) => {
            buf.put_slice(b"\\\\x");
            buf.put_slice(hex::encode(b).as_bytes());
        }
    }
}

fn escape_copy_text(buf: &mut BytesMut, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => buf.put_slice(b"\\\\"),
            '\t' => buf.put_slice(b"\\t"),
            '\n' => buf.put_slice(b"\\n"),
            '\r' => buf.put_slice(b"\\r"),
            _ => {
                let mut tmp = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
}
