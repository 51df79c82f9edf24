//! Database drivers implementing the core traits.
//!
//! - [`sqlite`]: source side, read-only
//! - [`postgres`]: target side
//! - [`common`]: shared helpers (TLS)

pub mod common;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};
pub use postgres::PostgresWriter;
pub use sqlite::SqliteReader;
