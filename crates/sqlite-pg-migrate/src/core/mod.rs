//! Core abstractions shared by the drivers and the engine.
//!
//! - [`schema`]: table and column metadata
//! - [`value`]: SQL values, rows and batches
//! - [`traits`]: reader/writer traits implemented by the drivers

pub mod schema;
pub mod traits;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use schema::{Column, TableSchema};
pub use traits::{SchemaIntrospector, SourceReader, TargetWriter};
pub use value::{Batch, Row, SqlValue};
