//! SQLite source reader.
//!
//! Implements [`SourceReader`] over a read-only sqlx pool. Rows are paged by
//! rowid so each batch is an independent short query and no cursor or
//! transaction stays open between batches.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::core::schema::{Column, TableSchema};
use crate::core::traits::{SchemaIntrospector, SourceReader};
use crate::core::value::{Batch, Row, SqlValue};
use crate::ddl::quote_ident;
use crate::error::{MigrateError, Result};

const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Names SQLite accepts for the rowid, unless a user column takes them.
const ROWID_ALIASES: [&str; 3] = ["rowid", "_rowid_", "oid"];

/// Source pool size; the pipeline reads one batch at a time.
const MAX_CONNECTIONS: u32 = 2;

/// SQLite source reader.
pub struct SqliteReader {
    pool: SqlitePool,
    path: String,
}

impl SqliteReader {
    /// Open an existing database file read-only.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::pool(e, "opening SQLite source"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing SQLite source connection"))?;

        info!("Opened SQLite source: {}", path);

        Ok(Self {
            pool,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the table can be paged by `alias` (false for WITHOUT ROWID).
    async fn has_rowid(&self, table: &str, alias: &str) -> Result<bool> {
        let sql = format!("SELECT {} FROM {} LIMIT 0", alias, quote_ident(table));
        match sqlx::query(&sql).fetch_all(&self.pool).await {
            Ok(_) => Ok(true),
            Err(e) if is_no_such_column(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn next_batch(
        &self,
        plan: ScanPlan,
        scan: Scan,
        batch_size: usize,
    ) -> Result<Option<(Batch, (ScanPlan, Scan))>> {
        let scan = match scan {
            Scan::Done => return Ok(None),
            Scan::Start => {
                let keyset = match plan.rowid {
                    Some(alias) => self.has_rowid(&plan.table, alias).await?,
                    None => false,
                };
                if keyset {
                    Scan::Keyset(None)
                } else {
                    debug!("{}: no usable rowid, paging with LIMIT/OFFSET", plan.table);
                    Scan::Offset(0)
                }
            }
            other => other,
        };

        let limit = batch_size as i64;
        let (rows, next) = match scan {
            Scan::Keyset(after) => {
                let sql = plan.keyset_sql(after.is_some());
                let mut query = sqlx::query(&sql);
                if let Some(after) = after {
                    query = query.bind(after);
                }
                let rows = query.bind(limit).fetch_all(&self.pool).await?;
                let last = match rows.last() {
                    Some(row) => Some(row.try_get::<i64, _>(0)?),
                    None => after,
                };
                let decoded = rows
                    .iter()
                    .map(|row| decode_row(row, 1, plan.width))
                    .collect::<Result<Vec<_>>>()?;
                (decoded, Scan::Keyset(last))
            }
            Scan::Offset(offset) => {
                let rows = sqlx::query(&plan.offset_sql())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?;
                let decoded = rows
                    .iter()
                    .map(|row| decode_row(row, 0, plan.width))
                    .collect::<Result<Vec<_>>>()?;
                let next = Scan::Offset(offset + decoded.len() as i64);
                (decoded, next)
            }
            Scan::Start | Scan::Done => return Ok(None),
        };

        if rows.is_empty() {
            return Ok(None);
        }
        let next = if rows.len() < batch_size { Scan::Done } else { next };
        debug!("{}: read batch of {} rows", plan.table, rows.len());
        Ok(Some((Batch::new(rows), (plan, next))))
    }
}

/// Position of a table scan between batches.
#[derive(Debug, Clone, Copy)]
enum Scan {
    Start,
    /// Last rowid read; `None` before the first page.
    Keyset(Option<i64>),
    Offset(i64),
    Done,
}

/// Pre-rendered pieces of the paging queries for one table.
#[derive(Debug, Clone)]
struct ScanPlan {
    table: String,
    /// Rowid alias not shadowed by a user column.
    rowid: Option<&'static str>,
    select_list: String,
    order_by: String,
    width: usize,
}

impl ScanPlan {
    fn new(schema: &TableSchema) -> Self {
        let select_list = schema
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let pk = schema.primary_key();
        let order_by = if pk.is_empty() {
            String::new()
        } else {
            let cols = pk.into_iter().map(quote_ident).collect::<Vec<_>>();
            format!(" ORDER BY {}", cols.join(", "))
        };
        let rowid = ROWID_ALIASES.into_iter().find(|alias| {
            !schema
                .columns
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(alias))
        });
        Self {
            table: schema.name.clone(),
            rowid,
            select_list,
            order_by,
            width: schema.columns.len(),
        }
    }

    fn keyset_sql(&self, after: bool) -> String {
        let rowid = self.rowid.unwrap_or("rowid");
        let filter = if after {
            format!(" WHERE {} > ?", rowid)
        } else {
            String::new()
        };
        format!(
            "SELECT {rowid}, {} FROM {}{} ORDER BY {rowid} LIMIT ?",
            self.select_list,
            quote_ident(&self.table),
            filter
        )
    }

    fn offset_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}{} LIMIT ? OFFSET ?",
            self.select_list,
            quote_ident(&self.table),
            self.order_by
        )
    }
}

fn is_no_such_column(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.message().contains("no such column"))
}

fn decode_row(row: &SqliteRow, offset: usize, width: usize) -> Result<Row> {
    (offset..offset + width)
        .map(|i| decode_value(row, i))
        .collect()
}

/// Decode by the value's storage class, not the column's declared type.
fn decode_value(row: &SqliteRow, i: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let value = match raw.type_info().name() {
        "INTEGER" => SqlValue::I64(row.try_get_unchecked(i)?),
        "REAL" => SqlValue::F64(row.try_get_unchecked(i)?),
        "BLOB" => SqlValue::Bytes(row.try_get_unchecked(i)?),
        _ => SqlValue::Text(row.try_get_unchecked(i)?),
    };
    Ok(value)
}

#[async_trait]
impl SchemaIntrospector for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>(0)? > 0)
    }

    async fn table_schema(&self, table: &str) -> Result<TableSchema> {
        let rows = sqlx::query(
            "SELECT name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(Column {
                name: row.try_get("name")?,
                declared_type: row.try_get::<Option<String>, _>("type")?.unwrap_or_default(),
                not_null: row.try_get::<i64, _>("notnull")? != 0,
                default: row.try_get("dflt_value")?,
                is_primary_key: row.try_get::<i64, _>("pk")? > 0,
            });
        }

        debug!("{}: {} columns", table, columns.len());
        Ok(TableSchema::new(table, columns))
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    fn stream_rows<'a>(
        &'a self,
        schema: &'a TableSchema,
        batch_size: usize,
    ) -> BoxStream<'a, Result<Batch>> {
        if schema.columns.is_empty() {
            return stream::empty::<Result<Batch>>().boxed();
        }
        let batch_size = batch_size.max(1);
        let state = (ScanPlan::new(schema), Scan::Start);
        stream::try_unfold(state, move |(plan, scan)| async move {
            self.next_batch(plan, scan, batch_size).await
        })
        .boxed()
    }
}
