//! PostgreSQL driver.
//!
//! - [`PostgresWriter`]: target introspection, table creation and COPY writes

mod writer;

pub use writer::PostgresWriter;
